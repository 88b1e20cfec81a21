//! TypeTree parsing and dynamic decoding
//!
//! A TypeTree is a self-describing schema embedded in a SerializedFile; it
//! drives decoding of an object's bytes into a tagged value tree without the
//! reader needing any compiled-in knowledge of that object's class.

use crate::common_strings;
use crate::error::{BinaryError, Result};
use crate::reader::BinaryReader;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use unity_asset_core::UnityValue;

const ALIGN_FLAG: i32 = 0x4000;
const MAX_ARRAY_ELEMENTS: usize = 1_000_000;

/// A node in the Unity TypeTree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeTreeNode {
    pub type_name: String,
    pub name: String,
    pub byte_size: i32,
    pub index: i32,
    pub type_flags: i32,
    pub version: i32,
    pub meta_flags: i32,
    pub level: i32,
    pub type_str_offset: u32,
    pub name_str_offset: u32,
    pub ref_type_hash: u64,
    pub children: Vec<TypeTreeNode>,
}

impl TypeTreeNode {
    pub fn new() -> Self {
        Self {
            type_name: String::new(),
            name: String::new(),
            byte_size: 0,
            index: 0,
            type_flags: 0,
            version: 0,
            meta_flags: 0,
            level: 0,
            type_str_offset: 0,
            name_str_offset: 0,
            ref_type_hash: 0,
            children: Vec::new(),
        }
    }

    pub fn is_array(&self) -> bool {
        self.type_name == "Array" || self.type_name.starts_with("vector")
    }

    /// Whether the stream should be 4-byte aligned after this node's value is read.
    pub fn requires_alignment(&self) -> bool {
        (self.meta_flags & ALIGN_FLAG) != 0
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self.type_name.as_str(),
            "bool"
                | "char"
                | "SInt8"
                | "UInt8"
                | "SInt16"
                | "UInt16"
                | "short"
                | "unsigned short"
                | "SInt32"
                | "UInt32"
                | "int"
                | "unsigned int"
                | "Type*"
                | "SInt64"
                | "UInt64"
                | "long long"
                | "unsigned long long"
                | "FileSize"
                | "float"
                | "double"
        )
    }

    pub fn find_child(&self, name: &str) -> Option<&TypeTreeNode> {
        self.children.iter().find(|child| child.name == name)
    }
}

impl Default for TypeTreeNode {
    fn default() -> Self {
        Self::new()
    }
}

/// A complete TypeTree: a flat node list reassembled into a hierarchy by `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeTree {
    pub nodes: Vec<TypeTreeNode>,
    pub string_buffer: Vec<u8>,
    pub version: u32,
}

impl TypeTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            string_buffer: Vec::new(),
            version: 0,
        }
    }

    /// Legacy recursive wire form (SerializedFile version < 12).
    pub fn from_reader(reader: &mut BinaryReader, version: u32) -> Result<Self> {
        let mut tree = Self::new();
        tree.version = version;

        let node_count = reader.read_u32()? as usize;
        let string_buffer_size = reader.read_u32()? as usize;

        for _ in 0..node_count {
            let mut node = TypeTreeNode::new();
            node.type_str_offset = reader.read_u32()?;
            node.name_str_offset = reader.read_u32()?;
            node.byte_size = reader.read_i32()?;
            node.index = reader.read_i32()?;
            node.type_flags = reader.read_i32()?;
            node.version = reader.read_i32()?;
            node.meta_flags = reader.read_i32()?;
            node.level = reader.read_i32()?;
            tree.nodes.push(node);
        }

        tree.string_buffer = reader.read_bytes(string_buffer_size)?;
        tree.resolve_strings()?;
        tree.build_hierarchy();
        Ok(tree)
    }

    /// Modern blob wire form (SerializedFile version >= 12).
    pub fn from_reader_blob(reader: &mut BinaryReader, version: u32) -> Result<Self> {
        let mut tree = Self::new();
        tree.version = version;

        let node_count = reader.read_i32()? as usize;
        let string_buffer_size = reader.read_i32()? as usize;

        for _ in 0..node_count {
            let mut node = TypeTreeNode::new();
            node.version = reader.read_u16()? as i32;
            node.level = reader.read_u8()? as i32;
            node.type_flags = reader.read_u8()? as i32;
            node.type_str_offset = reader.read_u32()?;
            node.name_str_offset = reader.read_u32()?;
            node.byte_size = reader.read_i32()?;
            node.index = reader.read_i32()?;
            node.meta_flags = reader.read_i32()?;
            if version >= 19 {
                node.ref_type_hash = reader.read_u64()?;
            }
            tree.nodes.push(node);
        }

        tree.string_buffer = reader.read_bytes(string_buffer_size)?;
        tree.resolve_strings()?;
        tree.build_hierarchy();
        Ok(tree)
    }

    fn resolve_strings(&mut self) -> Result<()> {
        let offsets: Vec<(u32, u32)> = self
            .nodes
            .iter()
            .map(|n| (n.type_str_offset, n.name_str_offset))
            .collect();

        for (i, (type_offset, name_offset)) in offsets.iter().enumerate() {
            self.nodes[i].type_name = self.get_string(*type_offset)?;
            self.nodes[i].name = self.get_string(*name_offset)?;
        }
        Ok(())
    }

    /// Resolve a string offset: high bit set refers to the shared common
    /// table, otherwise it is an offset into this tree's local buffer.
    fn get_string(&self, offset: u32) -> Result<String> {
        if let Some(s) = common_strings::resolve_raw(offset) {
            return Ok(s.to_string());
        }

        let offset = offset as usize;
        if offset >= self.string_buffer.len() {
            return Ok(String::new());
        }
        let end = self.string_buffer[offset..]
            .iter()
            .position(|&b| b == 0)
            .map(|pos| offset + pos)
            .unwrap_or(self.string_buffer.len());

        Ok(String::from_utf8(self.string_buffer[offset..end].to_vec())?)
    }

    /// Reassemble the flat, level-tagged node list into a tree in place.
    fn build_hierarchy(&mut self) {
        if self.nodes.is_empty() {
            return;
        }

        let mut parent_child: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
        let mut stack: Vec<usize> = Vec::new();

        for i in 0..self.nodes.len() {
            let level = self.nodes[i].level;
            while let Some(&top) = stack.last() {
                if self.nodes[top].level < level {
                    break;
                }
                stack.pop();
            }
            if let Some(&parent) = stack.last() {
                parent_child.entry(parent).or_default().push(i);
            }
            stack.push(i);
        }

        // Attach bottom-up: every child index is strictly greater than its
        // parent's (the flat list is a preorder traversal), so walking
        // indices in descending order guarantees a node's own children are
        // already moved into place before it is, in turn, moved into its
        // parent. `mem::take` lets each node move exactly once.
        for i in (0..self.nodes.len()).rev() {
            if let Some(child_indices) = parent_child.remove(&i) {
                self.nodes[i].children = child_indices
                    .into_iter()
                    .map(|c| std::mem::take(&mut self.nodes[c]))
                    .collect();
            }
        }
    }

    /// The level-0 node, the entry point for decoding an object's bytes.
    pub fn root(&self) -> Option<&TypeTreeNode> {
        self.nodes.iter().find(|n| n.level == 0)
    }

    /// Decode `reader`'s remaining bytes against this tree's root into a
    /// tagged value tree, preserving field order.
    pub fn decode(&self, reader: &mut BinaryReader) -> Result<IndexMap<String, UnityValue>> {
        let mut properties = IndexMap::new();
        let Some(root) = self.root() else {
            return Ok(properties);
        };

        for child in &root.children {
            if child.name.is_empty() {
                continue;
            }
            let value = self.decode_node(reader, child)?;
            properties.insert(child.name.clone(), value);
        }

        Ok(properties)
    }

    fn decode_node(&self, reader: &mut BinaryReader, node: &TypeTreeNode) -> Result<UnityValue> {
        let value = match node.type_name.as_str() {
            "SInt8" | "char" => UnityValue::Integer(reader.read_i8()? as i64),
            "SInt16" | "short" => UnityValue::Integer(reader.read_i16()? as i64),
            "SInt32" | "int" => UnityValue::Integer(reader.read_i32()? as i64),
            "SInt64" | "long long" => UnityValue::Integer(reader.read_i64()?),
            "UInt8" => UnityValue::Integer(reader.read_u8()? as i64),
            "UInt16" | "unsigned short" => UnityValue::Integer(reader.read_u16()? as i64),
            "UInt32" | "unsigned int" | "Type*" => UnityValue::Integer(reader.read_u32()? as i64),
            "UInt64" | "unsigned long long" | "FileSize" => UnityValue::Integer(reader.read_u64()? as i64),
            "float" => UnityValue::Float(reader.read_f32()? as f64),
            "double" => UnityValue::Float(reader.read_f64()?),
            "bool" => UnityValue::Bool(reader.read_bool()?),
            "string" => UnityValue::String(self.decode_string(reader, node)?),
            "pair" if node.children.len() == 2 => {
                let first = self.decode_node(reader, &node.children[0])?;
                let second = self.decode_node(reader, &node.children[1])?;
                UnityValue::Array(vec![first, second])
            }
            _ if node.children.iter().any(|c| c.type_name == "Array") => self.decode_array(reader, node)?,
            _ => self.decode_struct(reader, node)?,
        };

        if node.requires_alignment() {
            reader.align_to(4, false)?;
        }

        Ok(value)
    }

    /// `string` is itself a length-prefixed `Array<char>`; its `Array` child
    /// (when present) carries the real alignment flag.
    fn decode_string(&self, reader: &mut BinaryReader, node: &TypeTreeNode) -> Result<String> {
        let s = reader.read_length_prefixed_string()?;
        if let Some(array_node) = node.find_child("Array") {
            if array_node.requires_alignment() {
                reader.align_to(4, false)?;
            }
        }
        Ok(s)
    }

    fn decode_array(&self, reader: &mut BinaryReader, node: &TypeTreeNode) -> Result<UnityValue> {
        let array_node = node
            .children
            .iter()
            .find(|c| c.type_name == "Array")
            .ok_or_else(|| BinaryError::invalid_argument("Array node missing its Array child"))?;

        if array_node.children.len() < 2 {
            return Ok(UnityValue::Array(Vec::new()));
        }

        let size = reader.read_i32()?;
        if size < 0 {
            return Err(BinaryError::invalid_argument(format!(
                "array size is negative: {size}"
            )));
        }
        let size = size as usize;
        if size > MAX_ARRAY_ELEMENTS {
            return Err(BinaryError::invalid_argument(format!(
                "array size {size} exceeds the sanity cap of {MAX_ARRAY_ELEMENTS}"
            )));
        }

        let element_node = &array_node.children[1];
        let mut elements = Vec::with_capacity(size.min(4096));
        for _ in 0..size {
            elements.push(self.decode_node(reader, element_node)?);
        }

        if array_node.requires_alignment() {
            reader.align_to(4, false)?;
        }

        Ok(UnityValue::Array(elements))
    }

    fn decode_struct(&self, reader: &mut BinaryReader, node: &TypeTreeNode) -> Result<UnityValue> {
        if node.children.is_empty() {
            // An unknown leaf type with a known byte_size: skip it rather
            // than fail the whole object.
            if node.byte_size > 0 {
                reader.read_bytes(node.byte_size as usize)?;
            }
            return Ok(UnityValue::Null);
        }

        let mut fields = IndexMap::new();
        for child in &node.children {
            if child.name.is_empty() {
                continue;
            }
            let value = self.decode_node(reader, child)?;
            fields.insert(child.name.clone(), value);
        }
        Ok(UnityValue::Object(fields))
    }
}

impl Default for TypeTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ByteOrder;

    fn leaf(type_name: &str, name: &str, level: i32, meta_flags: i32) -> TypeTreeNode {
        let mut n = TypeTreeNode::new();
        n.type_name = type_name.to_string();
        n.name = name.to_string();
        n.level = level;
        n.meta_flags = meta_flags;
        n
    }

    #[test]
    fn test_is_array_detection() {
        let mut node = TypeTreeNode::new();
        node.type_name = "Array".to_string();
        assert!(node.is_array());
        node.type_name = "int".to_string();
        assert!(!node.is_array());
    }

    #[test]
    fn test_requires_alignment_flag() {
        let node = leaf("int", "m_Value", 1, 0x4000);
        assert!(node.requires_alignment());
        let node = leaf("int", "m_Value", 1, 0);
        assert!(!node.requires_alignment());
    }

    #[test]
    fn test_decode_simple_struct() {
        let mut tree = TypeTree::new();
        let mut root = leaf("MonoBehaviour", "Base", 0, 0);
        root.children = vec![leaf("int", "m_Value", 1, 0), leaf("bool", "m_Flag", 1, 0x4000)];
        tree.nodes = vec![root];

        let mut data = Vec::new();
        data.extend_from_slice(&42i32.to_le_bytes());
        data.push(1); // bool true
        data.extend_from_slice(&[0, 0, 0]); // alignment padding

        let mut reader = BinaryReader::new(&data, ByteOrder::Little);
        let decoded = tree.decode(&mut reader).unwrap();
        assert_eq!(decoded.get("m_Value").unwrap().as_i64(), Some(42));
        assert_eq!(decoded.get("m_Flag").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn test_common_string_resolution() {
        let mut tree = TypeTree::new();
        let name = common_strings::resolve(0).unwrap();
        assert_eq!(tree.get_string(0x8000_0000).unwrap(), name);
        tree.string_buffer = b"local\0".to_vec();
        assert_eq!(tree.get_string(0).unwrap(), "local");
    }

    #[test]
    fn test_build_hierarchy_from_levels() {
        let mut tree = TypeTree::new();
        tree.nodes = vec![leaf("Base", "root", 0, 0), leaf("int", "a", 1, 0), leaf("int", "b", 1, 0)];
        tree.build_hierarchy();
        assert_eq!(tree.root().unwrap().children.len(), 2);
    }

    /// Grandchildren must survive `build_hierarchy`: a naive attach-from-a-
    /// pre-clone-snapshot implementation loses everything below depth 1.
    #[test]
    fn test_build_hierarchy_preserves_grandchildren() {
        let mut tree = TypeTree::new();
        tree.nodes = vec![
            leaf("Base", "root", 0, 0),        // 0
            leaf("VertexData", "m_VertexData", 1, 0), // 1, child of root
            leaf("Array", "m_Channels", 2, 0), // 2, child of m_VertexData
            leaf("ChannelInfo", "data", 3, 0), // 3, child of m_Channels (Array)
            leaf("UInt8", "stream", 4, 0),     // 4, child of ChannelInfo
            leaf("UInt8", "format", 4, 0),     // 5, sibling of stream
            leaf("int", "m_VertexCount", 1, 0), // 6, second child of root
        ];
        tree.build_hierarchy();

        let root = tree.root().unwrap();
        assert_eq!(root.children.len(), 2);

        let vertex_data = root.find_child("m_VertexData").unwrap();
        assert_eq!(vertex_data.children.len(), 1);

        let channels = vertex_data.find_child("m_Channels").unwrap();
        assert_eq!(channels.children.len(), 1);

        let channel_info = &channels.children[0];
        assert_eq!(channel_info.name, "data");
        assert_eq!(channel_info.children.len(), 2);
        assert_eq!(channel_info.children[0].name, "stream");
        assert_eq!(channel_info.children[1].name, "format");
    }
}
