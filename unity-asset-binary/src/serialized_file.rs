//! SerializedFile parsing: Unity's binary object-graph format.
//!
//! A `SerializedFile` borrows its backing bytes from the container entry (or
//! raw buffer) it was parsed from; it never owns a second copy of the data.

use crate::error::{BinaryError, Result};
use crate::reader::{BinaryReader, ByteOrder};
use crate::typetree::TypeTree;

/// Fields common to both the 32-bit and 64-bit (version >= 22) header shapes.
#[derive(Debug, Clone)]
pub struct SerializedFileHeader {
    pub metadata_size: u64,
    pub file_size: u64,
    pub version: u32,
    pub data_offset: u64,
    pub endian: u8,
}

impl SerializedFileHeader {
    fn from_reader(reader: &mut BinaryReader) -> Result<Self> {
        let mut metadata_size = reader.read_u32()? as u64;
        let mut file_size = reader.read_u32()? as u64;
        let version = reader.read_u32()?;
        let mut data_offset = reader.read_u32()? as u64;

        let endian = if version >= 9 {
            let e = reader.read_u8()?;
            reader.read_bytes(3)?; // reserved
            e
        } else {
            let current_pos = reader.position();
            let legacy_endian_pos = file_size.checked_sub(metadata_size).ok_or_else(|| {
                BinaryError::container_malformed("file_size smaller than metadata_size in legacy header")
            })?;
            reader.set_position(legacy_endian_pos)?;
            let e = reader.read_u8()?;
            reader.set_position(current_pos)?;
            e
        };

        if version >= 22 {
            metadata_size = reader.read_u32()? as u64;
            file_size = reader.read_u64()?;
            data_offset = reader.read_u64()?;
            reader.read_u64()?; // unknown
        }

        Ok(Self {
            metadata_size,
            file_size,
            version,
            data_offset,
            endian,
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        if self.endian == 0 {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

/// One entry in the type table: a class id plus (optionally) its type tree.
#[derive(Debug, Clone)]
pub struct SerializedType {
    pub class_id: i32,
    pub is_stripped_type: bool,
    pub script_type_index: Option<i16>,
    pub script_id: [u8; 16],
    pub old_type_hash: [u8; 16],
    pub type_tree: Option<TypeTree>,
}

impl SerializedType {
    fn from_reader(reader: &mut BinaryReader, version: u32, enable_type_tree: bool) -> Result<Self> {
        let class_id = reader.read_i32()?;

        let mut is_stripped_type = false;
        if version >= 16 {
            is_stripped_type = reader.read_bool()?;
        }

        let mut script_type_index = None;
        if version >= 17 {
            script_type_index = Some(reader.read_i16()?);
        }

        let mut script_id = [0u8; 16];
        let mut old_type_hash = [0u8; 16];
        if version >= 13 {
            let needs_script_id = if version < 16 {
                class_id < 0
            } else {
                class_id == 114 // MonoBehaviour
            };
            if needs_script_id {
                script_id.copy_from_slice(&reader.read_bytes(16)?);
            }
            old_type_hash.copy_from_slice(&reader.read_bytes(16)?);
        }

        let type_tree = if enable_type_tree {
            Some(if version >= 12 {
                TypeTree::from_reader_blob(reader, version)?
            } else {
                TypeTree::from_reader(reader, version)?
            })
        } else {
            None
        };

        Ok(Self {
            class_id,
            is_stripped_type,
            script_type_index,
            script_id,
            old_type_hash,
            type_tree,
        })
    }
}

/// A cross-file object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PPtr {
    pub file_id: i32,
    pub path_id: i64,
}

impl PPtr {
    pub fn is_null(&self) -> bool {
        self.file_id == 0 && self.path_id == 0
    }
}

/// An object's directory entry: where it lives and what it is, not its bytes.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub path_id: i64,
    pub byte_start: u64,
    pub byte_size: u32,
    pub type_id: i32,
    pub class_id: i32,
    pub is_destroyed: bool,
    pub script_type_index: Option<i16>,
}

/// Reference to another serialized file, by GUID and logical path.
#[derive(Debug, Clone)]
pub struct FileIdentifier {
    pub asset_path: String,
    pub guid: [u8; 16],
    pub type_: i32,
    pub path_name: String,
}

impl FileIdentifier {
    fn from_reader(reader: &mut BinaryReader, version: u32) -> Result<Self> {
        let asset_path = if version >= 6 {
            reader.read_cstring()?
        } else {
            String::new()
        };

        let mut guid = [0u8; 16];
        let mut type_ = 0;
        if version >= 5 {
            guid.copy_from_slice(&reader.read_bytes(16)?);
            type_ = reader.read_i32()?;
        }

        let path_name = reader.read_cstring()?;

        Ok(Self {
            asset_path,
            guid,
            type_,
            path_name,
        })
    }
}

/// A reference to an externally-defined script type.
#[derive(Debug, Clone, Copy)]
pub struct ScriptReference {
    pub file_id: i32,
    pub path_id: i64,
}

/// A parsed SerializedFile, borrowing its bytes from the caller.
#[derive(Debug)]
pub struct SerializedFile<'a> {
    pub header: SerializedFileHeader,
    pub unity_version: String,
    pub target_platform: i32,
    pub enable_type_tree: bool,
    pub types: Vec<SerializedType>,
    pub objects: Vec<ObjectEntry>,
    pub script_refs: Vec<ScriptReference>,
    pub externals: Vec<FileIdentifier>,
    pub ref_types: Vec<SerializedType>,
    pub user_information: String,
    data: &'a [u8],
}

impl<'a> SerializedFile<'a> {
    /// Parse a SerializedFile from a borrowed buffer.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data, ByteOrder::Big);
        let header = SerializedFileHeader::from_reader(&mut reader)?;

        if header.version == 0 || header.version > 22 {
            return Err(BinaryError::UnsupportedSerializedFileVersion {
                version: header.version,
            });
        }

        reader.set_byte_order(header.byte_order());

        let mut file = Self {
            header,
            unity_version: String::new(),
            target_platform: 0,
            enable_type_tree: false,
            types: Vec::new(),
            objects: Vec::new(),
            script_refs: Vec::new(),
            externals: Vec::new(),
            ref_types: Vec::new(),
            user_information: String::new(),
            data,
        };

        file.parse_metadata(&mut reader)?;
        Ok(file)
    }

    fn parse_metadata(&mut self, reader: &mut BinaryReader) -> Result<()> {
        let version = self.header.version;

        if version >= 7 {
            self.unity_version = reader.read_cstring()?;
        }
        if version >= 8 {
            self.target_platform = reader.read_i32()?;
        }
        if version >= 13 {
            self.enable_type_tree = reader.read_bool()?;
        }

        let type_count = reader.read_u32()?;
        for _ in 0..type_count {
            self.types
                .push(SerializedType::from_reader(reader, version, self.enable_type_tree)?);
        }

        let object_count = reader.read_u32()?;
        for _ in 0..object_count {
            let entry = self.parse_object_entry(reader)?;
            self.objects.push(entry);
        }

        if version >= 11 {
            let script_count = reader.read_u32()?;
            for _ in 0..script_count {
                reader.align_to(4, false)?;
                let file_id = reader.read_i32()?;
                let path_id = if version >= 14 {
                    reader.read_i64()?
                } else {
                    reader.read_i32()? as i64
                };
                self.script_refs.push(ScriptReference { file_id, path_id });
            }
        }

        let external_count = reader.read_u32()?;
        for _ in 0..external_count {
            self.externals.push(FileIdentifier::from_reader(reader, version)?);
        }

        if version >= 20 {
            let ref_type_count = reader.read_u32()?;
            for _ in 0..ref_type_count {
                self.ref_types
                    .push(SerializedType::from_reader(reader, version, self.enable_type_tree)?);
            }
        }

        if version >= 5 {
            self.user_information = reader.read_cstring()?;
        }

        Ok(())
    }

    fn parse_object_entry(&self, reader: &mut BinaryReader) -> Result<ObjectEntry> {
        let version = self.header.version;
        reader.align_to(4, false)?;

        let path_id = if version >= 14 {
            reader.read_i64()?
        } else {
            reader.read_i32()? as i64
        };

        let byte_start = if version >= 22 {
            reader.read_u64()?
        } else {
            reader.read_u32()? as u64
        };

        let byte_size = reader.read_u32()?;
        let type_id = reader.read_i32()?;

        let mut class_id = 0;
        if version < 16 {
            class_id = reader.read_u16()? as i32;
        } else if type_id >= 0 && (type_id as usize) < self.types.len() {
            class_id = self.types[type_id as usize].class_id;
        }

        let mut is_destroyed = false;
        if (11..=16).contains(&version) {
            is_destroyed = reader.read_u16()? != 0;
        }

        let mut script_type_index = None;
        if version >= 17 {
            script_type_index = Some(reader.read_i16()?);
        }

        Ok(ObjectEntry {
            path_id,
            byte_start,
            byte_size,
            type_id,
            class_id,
            is_destroyed,
            script_type_index,
        })
    }

    /// Iterate objects of a given class id, in directory order.
    pub fn objects_by_class(&self, class_id: i32) -> impl Iterator<Item = &ObjectEntry> {
        self.objects.iter().filter(move |o| o.class_id == class_id)
    }

    /// The byte range for an object, relative to `data_offset`. Fails with
    /// `ObjectOutOfRange` when the range extends past the file; callers
    /// (typically `AssetContext`) should demote this to a warning and skip
    /// the object rather than aborting the whole file.
    pub fn slice_for(&self, object: &ObjectEntry) -> Result<&'a [u8]> {
        let start = self
            .header
            .data_offset
            .checked_add(object.byte_start)
            .ok_or(BinaryError::ObjectOutOfRange {
                path_id: object.path_id,
            })? as usize;
        let end = start
            .checked_add(object.byte_size as usize)
            .ok_or(BinaryError::ObjectOutOfRange {
                path_id: object.path_id,
            })?;

        if end as u64 > self.header.file_size || end > self.data.len() {
            return Err(BinaryError::ObjectOutOfRange {
                path_id: object.path_id,
            });
        }

        Ok(&self.data[start..end])
    }

    /// The type tree for an object, looked up through its `type_id`.
    pub fn type_tree_for(&self, object: &ObjectEntry) -> Option<&TypeTree> {
        self.types
            .get(object.type_id as usize)
            .and_then(|t| t.type_tree.as_ref())
    }

    /// Read a `PPtr` using this file's version-gated path_id width, aligning
    /// to 4 bytes afterward.
    pub fn read_pptr(&self, reader: &mut BinaryReader) -> Result<PPtr> {
        let file_id = reader.read_i32()?;
        let path_id = if self.header.version >= 14 {
            reader.read_i64()?
        } else {
            reader.read_i32()? as i64
        };
        reader.align_to(4, false)?;
        Ok(PPtr { file_id, path_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_header(version: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&64u32.to_be_bytes()); // metadata_size
        data.extend_from_slice(&1000u32.to_be_bytes()); // file_size
        data.extend_from_slice(&version.to_be_bytes());
        data.extend_from_slice(&128u32.to_be_bytes()); // data_offset
        if version >= 9 {
            data.push(0); // endian = little
            data.extend_from_slice(&[0, 0, 0]); // reserved
        }
        data
    }

    #[test]
    fn test_header_version_out_of_range_rejected() {
        let mut data = build_minimal_header(23);
        data.extend_from_slice(&[0u8; 64]);
        let err = SerializedFile::parse(&data).unwrap_err();
        assert!(matches!(
            err,
            BinaryError::UnsupportedSerializedFileVersion { version: 23 }
        ));
    }

    #[test]
    fn test_pptr_width_by_version() {
        let data = build_minimal_header(17);
        // Incomplete metadata after header; only testing header parse + byte order switch.
        let mut reader = BinaryReader::new(&data, ByteOrder::Big);
        let header = SerializedFileHeader::from_reader(&mut reader).unwrap();
        assert_eq!(header.version, 17);
        assert_eq!(header.byte_order(), ByteOrder::Little);
    }

    #[test]
    fn test_file_identifier_version_gates() {
        // version 4: no asset_path, no guid/type, just path_name
        let mut data = Vec::new();
        data.extend_from_slice(b"foo.txt\0");
        let mut reader = BinaryReader::new(&data, ByteOrder::Big);
        let id = FileIdentifier::from_reader(&mut reader, 4).unwrap();
        assert_eq!(id.asset_path, "");
        assert_eq!(id.path_name, "foo.txt");

        data.clear();
        data.extend_from_slice(b"Assets/foo.cs\0");
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&3i32.to_be_bytes());
        data.extend_from_slice(b"foo.cs\0");
        let mut reader = BinaryReader::new(&data, ByteOrder::Big);
        let id = FileIdentifier::from_reader(&mut reader, 7).unwrap();
        assert_eq!(id.asset_path, "Assets/foo.cs");
        assert_eq!(id.type_, 3);
        assert_eq!(id.path_name, "foo.cs");
    }

    #[test]
    fn test_pptr_is_null() {
        let p = PPtr {
            file_id: 0,
            path_id: 0,
        };
        assert!(p.is_null());
        let q = PPtr {
            file_id: 0,
            path_id: 5,
        };
        assert!(!q.is_null());
    }
}
