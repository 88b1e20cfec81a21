//! Top-level container parsing: UnityFS asset bundles, legacy UnityWeb/UnityRaw
//! bundles, and `.unitypackage` tar archives.
//!
//! A container's job stops at producing named byte ranges (`ContainerEntry`);
//! turning a given entry into a `SerializedFile` is the caller's job (see
//! `context.rs`), so that a malformed embedded file becomes a recorded warning
//! rather than a silently dropped entry.

use crate::compression::{self, CompressionType};
use crate::error::{BinaryError, Result};
use crate::reader::{BinaryReader, ByteOrder};
use std::io::Read;

const COMPRESSION_TYPE_MASK: u32 = 0x3F;
const BLOCKS_INFO_AT_END: u32 = 0x80;
const BLOCK_INFO_PADDING_AT_START: u32 = 0x200;

/// UnityFS bundle header fields, all big-endian on the wire.
#[derive(Debug, Clone)]
pub struct UnityFsHeader {
    pub signature: String,
    pub version: u32,
    pub unity_version: String,
    pub unity_revision: String,
    pub file_size: i64,
    pub compressed_blocks_info_size: u32,
    pub uncompressed_blocks_info_size: u32,
    pub flags: u32,
}

impl UnityFsHeader {
    fn from_reader(reader: &mut BinaryReader) -> Result<Self> {
        let signature = reader.read_cstring()?;
        let version = reader.read_u32()?;
        let unity_version = reader.read_cstring()?;
        let unity_revision = reader.read_cstring()?;
        let file_size = reader.read_i64()?;
        let compressed_blocks_info_size = reader.read_u32()?;
        let uncompressed_blocks_info_size = reader.read_u32()?;
        let flags = reader.read_u32()?;

        Ok(Self {
            signature,
            version,
            unity_version,
            unity_revision,
            file_size,
            compressed_blocks_info_size,
            uncompressed_blocks_info_size,
            flags,
        })
    }

    fn compression_id(&self) -> u32 {
        self.flags & COMPRESSION_TYPE_MASK
    }

    fn blocks_info_at_end(&self) -> bool {
        self.flags & BLOCKS_INFO_AT_END != 0
    }

    fn padding_at_start(&self) -> bool {
        self.flags & BLOCK_INFO_PADDING_AT_START != 0
    }
}

#[derive(Debug, Clone)]
struct CompressionBlockInfo {
    uncompressed_size: u32,
    compressed_size: u32,
    #[allow(dead_code)]
    flags: u16,
}

/// A logical file stored inside a container, addressed by name.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// A parsed container: the logical, decompressed view of its entries.
#[derive(Debug, Clone)]
pub struct Container {
    pub unity_version: Option<String>,
    pub entries: Vec<ContainerEntry>,
}

impl Container {
    /// Detect format by leading magic and parse accordingly.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.starts_with(b"UnityFS\0") {
            tracing::debug!("container magic UnityFS");
            Self::parse_unity_fs(data)
        } else if data.starts_with(b"UnityWeb") || data.starts_with(b"UnityRaw") {
            tracing::debug!("container magic UnityWeb/UnityRaw");
            Self::parse_unity_web_raw(data)
        } else if looks_like_tar(data) {
            tracing::debug!("container magic ustar");
            Self::parse_unity_package(data)
        } else {
            Err(BinaryError::container_malformed(
                "unrecognized container magic: expected UnityFS, UnityWeb, UnityRaw, or a ustar archive",
            ))
        }
    }

    /// Candidate entries worth attempting as a `SerializedFile`: those
    /// without a recognizable external-asset extension.
    pub fn serialized_file_candidates(&self) -> impl Iterator<Item = &ContainerEntry> {
        self.entries.iter().filter(|e| looks_like_serialized_file(&e.name))
    }

    pub fn entry(&self, name: &str) -> Option<&ContainerEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn parse_unity_fs(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data, ByteOrder::Big);
        let header = UnityFsHeader::from_reader(&mut reader)?;

        if header.version >= 7 {
            reader.align_to(16, false)?;
        }

        let pos_after_header = reader.position();

        let blocks_info_data = if header.blocks_info_at_end() {
            let file_len = reader.len() as u64;
            let start = file_len
                .checked_sub(header.compressed_blocks_info_size as u64)
                .ok_or_else(|| {
                    BinaryError::container_malformed("compressed_blocks_info_size exceeds file length")
                })?;
            reader.set_position(start)?;
            let data = reader.read_bytes(header.compressed_blocks_info_size as usize)?;
            reader.set_position(pos_after_header)?;
            data
        } else {
            reader.read_bytes(header.compressed_blocks_info_size as usize)?
        };

        let blocks_info = compression::decompress(
            &blocks_info_data,
            header.uncompressed_blocks_info_size as usize,
            header.compression_id(),
        )?;

        let mut info_reader = BinaryReader::new(&blocks_info, ByteOrder::Big);
        info_reader.read_bytes(16)?; // content hash, unused

        let block_count = info_reader.read_u32()?;
        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let uncompressed_size = info_reader.read_u32()?;
            let compressed_size = info_reader.read_u32()?;
            let flags = info_reader.read_u16()?;
            blocks.push(CompressionBlockInfo {
                uncompressed_size,
                compressed_size,
                flags,
            });
        }

        let node_count = info_reader.read_u32()?;
        let mut nodes = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            let offset = info_reader.read_i64()?;
            let size = info_reader.read_i64()?;
            let flags = info_reader.read_u32()?;
            let path = info_reader.read_cstring()?;
            nodes.push((offset, size, flags, path));
        }

        if !header.blocks_info_at_end() && header.padding_at_start() {
            reader.align_to(16, false)?;
        }

        let mut logical = Vec::new();
        for block in &blocks {
            let compressed = reader.read_bytes(block.compressed_size as usize)?;
            let compression_id = block.flags as u32 & COMPRESSION_TYPE_MASK;
            let decompressed =
                compression::decompress(&compressed, block.uncompressed_size as usize, compression_id)?;
            logical.extend_from_slice(&decompressed);
        }

        let mut entries = Vec::with_capacity(nodes.len());
        for (offset, size, _flags, path) in nodes {
            let start = offset as usize;
            let end = start
                .checked_add(size as usize)
                .ok_or_else(|| BinaryError::container_malformed("node size overflow"))?;
            if end > logical.len() {
                tracing::warn!(code = "CONTAINER_MALFORMED", node = %path, "node range exceeds logical block data, skipping");
                continue;
            }
            entries.push(ContainerEntry {
                name: path,
                data: logical[start..end].to_vec(),
            });
        }

        Ok(Self {
            unity_version: Some(header.unity_version),
            entries,
        })
    }

    /// Legacy UnityWeb/UnityRaw: a single compressed (UnityWeb) or raw
    /// (UnityRaw) directory blob preceding a flat list of named entries.
    fn parse_unity_web_raw(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data, ByteOrder::Big);
        let signature = reader.read_cstring()?;
        let version = reader.read_u32()?;
        let _unity_version = reader.read_cstring()?;
        let _unity_revision = reader.read_cstring()?;

        if version >= 4 {
            reader.read_bytes(16)?; // MD5 hash
            reader.read_u32()?; // CRC
        }

        reader.read_u32()?; // minimum_streamed_bytes
        let header_size = reader.read_u32()?;
        reader.read_u32()?; // number_of_levels_to_download
        let level_count = reader.read_i32()?;
        if level_count > 1 {
            reader.read_bytes((level_count - 1) as usize * 8)?;
        }

        let compressed_size = reader.read_u32()?;
        let uncompressed_size = reader.read_u32()?;
        if version >= 2 {
            reader.read_u32()?; // complete_file_size
        }
        if version >= 3 {
            reader.read_u32()?; // file_info_header_size
        }

        reader.set_position(header_size as u64)?;
        let compressed_data = reader.read_bytes(compressed_size as usize)?;
        let directory_data = if signature == "UnityWeb" {
            compression::decompress(&compressed_data, uncompressed_size as usize, CompressionType::Lzma as u32)?
        } else {
            compressed_data
        };

        let mut dir_reader = BinaryReader::new(&directory_data, ByteOrder::Big);
        dir_reader.set_position(header_size as u64)?;

        let node_count = dir_reader.read_i32()?;
        let mut entries = Vec::with_capacity(node_count.max(0) as usize);
        for _ in 0..node_count {
            let name = dir_reader.read_cstring()?;
            let offset = dir_reader.read_u32()? as usize;
            let size = dir_reader.read_u32()? as usize;
            let end = offset
                .checked_add(size)
                .ok_or_else(|| BinaryError::container_malformed("entry size overflow"))?;
            if end > directory_data.len() {
                tracing::warn!(code = "CONTAINER_MALFORMED", entry = %name, "entry range exceeds directory data, skipping");
                continue;
            }
            entries.push(ContainerEntry {
                name,
                data: directory_data[offset..end].to_vec(),
            });
        }

        Ok(Self {
            unity_version: None,
            entries,
        })
    }

    /// `.unitypackage`: a POSIX ustar stream with `<guid>/{asset, asset.meta,
    /// pathname}` records per logical asset.
    fn parse_unity_package(data: &[u8]) -> Result<Self> {
        use std::collections::HashMap;

        let mut archive = tar::Archive::new(data);
        let mut assets: HashMap<String, Vec<u8>> = HashMap::new();
        let mut pathnames: HashMap<String, String> = HashMap::new();

        for entry in archive
            .entries()
            .map_err(|e| BinaryError::container_malformed(format!("invalid ustar stream: {e}")))?
        {
            let mut entry = entry.map_err(|e| BinaryError::container_malformed(e.to_string()))?;
            let path = entry
                .path()
                .map_err(|e| BinaryError::container_malformed(e.to_string()))?
                .to_string_lossy()
                .into_owned();

            let Some((guid, rest)) = path.split_once('/') else {
                continue;
            };

            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| BinaryError::container_malformed(e.to_string()))?;

            match rest {
                "asset" => {
                    assets.insert(guid.to_string(), buf);
                }
                "pathname" => {
                    let name = String::from_utf8_lossy(&buf).trim().to_string();
                    pathnames.insert(guid.to_string(), name);
                }
                _ => {}
            }
        }

        let mut entries = Vec::with_capacity(assets.len());
        for (guid, data) in assets {
            let name = pathnames.remove(&guid).unwrap_or(guid);
            entries.push(ContainerEntry { name, data });
        }

        Ok(Self {
            unity_version: None,
            entries,
        })
    }
}

/// Heuristic matching the donor's: an entry without a conventional external
/// asset extension is worth attempting as a `SerializedFile`.
fn looks_like_serialized_file(name: &str) -> bool {
    !name.contains('.') || name.ends_with(".assets") || name.ends_with(".unity") || name.ends_with(".sharedAssets")
}

fn looks_like_tar(data: &[u8]) -> bool {
    data.len() >= 512 && &data[257..262] == b"ustar"
}
