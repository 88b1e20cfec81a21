//! Semantic convenience views over TypeDecoder output
//!
//! `GameObject` and `Transform` are opportunistic projections of the two most
//! commonly consumed class ids (1 and 4) built atop the generic property map;
//! a missing or malformed field degrades to a default value rather than a
//! parse failure.

use crate::error::Result;
use crate::serialized_file::PPtr;
use indexmap::IndexMap;
use unity_asset_core::UnityValue;

/// 3D Vector
#[derive(Debug, Clone, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Quaternion for rotations
#[derive(Debug, Clone, Default)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Unity GameObject (class id 1)
#[derive(Debug, Clone)]
pub struct GameObject {
    pub name: String,
    pub components: Vec<PPtr>,
    pub layer: i32,
    pub tag: String,
    pub is_active: bool,
}

impl GameObject {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            components: Vec::new(),
            layer: 0,
            tag: "Untagged".to_string(),
            is_active: true,
        }
    }

    /// Parse a GameObject out of a decoded property map. Missing fields fall
    /// back to defaults rather than failing.
    pub fn from_typetree(properties: &IndexMap<String, UnityValue>) -> Result<Self> {
        let mut game_object = Self::new();

        if let Some(UnityValue::String(name)) = properties.get("m_Name") {
            game_object.name = name.clone();
        }

        if let Some(UnityValue::Integer(layer)) = properties.get("m_Layer") {
            game_object.layer = *layer as i32;
        }

        if let Some(UnityValue::String(tag)) = properties.get("m_Tag") {
            game_object.tag = tag.clone();
        }

        if let Some(UnityValue::Bool(active)) = properties.get("m_IsActive") {
            game_object.is_active = *active;
        }

        if let Some(UnityValue::Array(components_array)) = properties.get("m_Component") {
            for component in components_array {
                if let Some(pptr) = parse_pptr(component) {
                    game_object.components.push(pptr);
                }
            }
        }

        Ok(game_object)
    }
}

impl Default for GameObject {
    fn default() -> Self {
        Self::new()
    }
}

/// Unity Transform component (class id 4)
#[derive(Debug, Clone)]
pub struct Transform {
    pub local_position: Vector3,
    pub local_rotation: Quaternion,
    pub local_scale: Vector3,
    pub parent: PPtr,
    pub children: Vec<PPtr>,
}

impl Transform {
    pub fn new() -> Self {
        Self {
            local_position: Vector3::default(),
            local_rotation: Quaternion::identity(),
            local_scale: Vector3::new(1.0, 1.0, 1.0),
            parent: PPtr {
                file_id: 0,
                path_id: 0,
            },
            children: Vec::new(),
        }
    }

    /// Parse a Transform out of a decoded property map.
    pub fn from_typetree(properties: &IndexMap<String, UnityValue>) -> Result<Self> {
        let mut transform = Self::new();

        if let Some(value) = properties.get("m_LocalPosition") {
            transform.local_position = parse_vector3(value);
        }
        if let Some(value) = properties.get("m_LocalRotation") {
            transform.local_rotation = parse_quaternion(value);
        }
        if let Some(value) = properties.get("m_LocalScale") {
            transform.local_scale = parse_vector3(value);
        }
        if let Some(value) = properties.get("m_Father") {
            if let Some(pptr) = parse_pptr(value) {
                transform.parent = pptr;
            }
        }
        if let Some(UnityValue::Array(children_array)) = properties.get("m_Children") {
            for child in children_array {
                if let Some(pptr) = parse_pptr(child) {
                    transform.children.push(pptr);
                }
            }
        }

        Ok(transform)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

fn float_field(obj: &IndexMap<String, UnityValue>, key: &str) -> f32 {
    match obj.get(key) {
        Some(UnityValue::Float(f)) => *f as f32,
        Some(UnityValue::Integer(i)) => *i as f32,
        _ => 0.0,
    }
}

fn parse_vector3(value: &UnityValue) -> Vector3 {
    match value {
        UnityValue::Object(obj) => Vector3::new(float_field(obj, "x"), float_field(obj, "y"), float_field(obj, "z")),
        _ => Vector3::default(),
    }
}

fn parse_quaternion(value: &UnityValue) -> Quaternion {
    match value {
        UnityValue::Object(obj) => {
            let w = match obj.get("w") {
                Some(UnityValue::Float(f)) => *f as f32,
                Some(UnityValue::Integer(i)) => *i as f32,
                _ => 1.0,
            };
            Quaternion::new(float_field(obj, "x"), float_field(obj, "y"), float_field(obj, "z"), w)
        }
        _ => Quaternion::identity(),
    }
}

fn parse_pptr(value: &UnityValue) -> Option<PPtr> {
    let UnityValue::Object(obj) = value else {
        return None;
    };
    let file_id = match obj.get("m_FileID").or_else(|| obj.get("fileID")) {
        Some(UnityValue::Integer(id)) => *id as i32,
        _ => 0,
    };
    let path_id = match obj.get("m_PathID").or_else(|| obj.get("pathID")) {
        Some(UnityValue::Integer(id)) => *id,
        _ => 0,
    };
    let pptr = PPtr { file_id, path_id };
    if pptr.is_null() {
        None
    } else {
        Some(pptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gameobject_defaults() {
        let game_object = GameObject::new();
        assert_eq!(game_object.name, "");
        assert_eq!(game_object.layer, 0);
        assert_eq!(game_object.tag, "Untagged");
        assert!(game_object.is_active);
        assert!(game_object.components.is_empty());
    }

    #[test]
    fn test_transform_defaults() {
        let transform = Transform::new();
        assert_eq!(transform.local_position.x, 0.0);
        assert_eq!(transform.local_rotation.w, 1.0);
        assert_eq!(transform.local_scale.x, 1.0);
        assert!(transform.parent.is_null());
        assert!(transform.children.is_empty());
    }

    #[test]
    fn test_gameobject_from_typetree() {
        let mut props = IndexMap::new();
        props.insert("m_Name".to_string(), UnityValue::String("Player".to_string()));
        props.insert("m_Layer".to_string(), UnityValue::Integer(8));
        props.insert("m_IsActive".to_string(), UnityValue::Bool(false));

        let go = GameObject::from_typetree(&props).unwrap();
        assert_eq!(go.name, "Player");
        assert_eq!(go.layer, 8);
        assert!(!go.is_active);
    }

    #[test]
    fn test_parse_pptr_from_component_entry() {
        let mut component = IndexMap::new();
        component.insert("m_FileID".to_string(), UnityValue::Integer(0));
        component.insert("m_PathID".to_string(), UnityValue::Integer(42));
        let pptr = parse_pptr(&UnityValue::Object(component)).unwrap();
        assert_eq!(pptr.path_id, 42);
    }
}
