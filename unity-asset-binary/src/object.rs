//! Decoded Unity objects: an `ObjectEntry`'s directory metadata plus its
//! TypeTree-decoded property map.

use crate::error::{BinaryError, Result};
use crate::reader::{BinaryReader, ByteOrder};
use crate::serialized_file::{ObjectEntry, SerializedFile};
use crate::unity_objects::{GameObject, Transform};
use indexmap::IndexMap;
use unity_asset_core::UnityValue;

/// A Unity object decoded from its SerializedFile slice via its type tree.
#[derive(Debug, Clone)]
pub struct UnityObject {
    pub path_id: i64,
    pub class_id: i32,
    pub byte_size: u32,
    pub properties: IndexMap<String, UnityValue>,
    /// The byte order its parent SerializedFile was written in, needed by
    /// decoders (e.g. Mesh) that reinterpret raw byte arrays pulled out of
    /// the property map.
    pub byte_order: ByteOrder,
}

impl UnityObject {
    /// Decode `entry`'s byte slice from `file` against its type tree. Bubbles
    /// up `ObjectOutOfRange` from `slice_for` unchanged so callers can decide
    /// whether to warn-and-skip.
    pub fn decode(file: &SerializedFile, entry: &ObjectEntry) -> Result<Self> {
        let data = file.slice_for(entry)?;
        let byte_order = file.header.byte_order();
        let mut reader = BinaryReader::new(data, byte_order);

        let properties = match file.type_tree_for(entry) {
            Some(tree) => tree.decode(&mut reader)?,
            None => IndexMap::new(),
        };

        Ok(Self {
            path_id: entry.path_id,
            class_id: entry.class_id,
            byte_size: entry.byte_size,
            properties,
            byte_order,
        })
    }

    pub fn class_name(&self) -> String {
        unity_asset_core::get_class_name(self.class_id).unwrap_or_else(|| format!("Class_{}", self.class_id))
    }

    pub fn name(&self) -> Option<String> {
        match self.properties.get("m_Name") {
            Some(UnityValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&UnityValue> {
        self.properties.get(key)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn property_names(&self) -> Vec<&String> {
        self.properties.keys().collect()
    }

    pub fn is_gameobject(&self) -> bool {
        self.class_id == 1
    }

    pub fn is_transform(&self) -> bool {
        self.class_id == 4
    }

    pub fn is_mesh(&self) -> bool {
        self.class_id == 43
    }

    pub fn as_gameobject(&self) -> Result<GameObject> {
        if !self.is_gameobject() {
            return Err(BinaryError::invalid_argument(format!(
                "object {} is class {}, not GameObject",
                self.path_id, self.class_id
            )));
        }
        GameObject::from_typetree(&self.properties)
    }

    pub fn as_transform(&self) -> Result<Transform> {
        if !self.is_transform() {
            return Err(BinaryError::invalid_argument(format!(
                "object {} is class {}, not Transform",
                self.path_id, self.class_id
            )));
        }
        Transform::from_typetree(&self.properties)
    }

    pub fn describe(&self) -> String {
        let name = self.name().unwrap_or_else(|| "<unnamed>".to_string());
        format!(
            "{} '{}' (ClassID:{}, PathID:{})",
            self.class_name(),
            name,
            self.class_id,
            self.path_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_known_and_unknown() {
        let obj = UnityObject {
            path_id: 1,
            class_id: 1,
            byte_size: 0,
            properties: IndexMap::new(),
            byte_order: ByteOrder::Little,
        };
        assert_eq!(obj.class_name(), "GameObject");

        let obj = UnityObject {
            path_id: 1,
            class_id: 999_999,
            byte_size: 0,
            properties: IndexMap::new(),
            byte_order: ByteOrder::Little,
        };
        assert_eq!(obj.class_name(), "Class_999999");
    }

    #[test]
    fn test_as_gameobject_rejects_wrong_class() {
        let obj = UnityObject {
            path_id: 1,
            class_id: 4,
            byte_size: 0,
            properties: IndexMap::new(),
            byte_order: ByteOrder::Little,
        };
        assert!(obj.as_gameobject().is_err());
    }

    #[test]
    fn test_describe_unnamed() {
        let obj = UnityObject {
            path_id: 7,
            class_id: 1,
            byte_size: 0,
            properties: IndexMap::new(),
            byte_order: ByteOrder::Little,
        };
        assert!(obj.describe().contains("<unnamed>"));
        assert!(obj.describe().contains("PathID:7"));
    }
}
