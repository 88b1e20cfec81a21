//! Unity Binary Asset Parser
//!
//! This crate ingests opaque container bytes (a UnityFS bundle, a raw
//! SerializedFile, or a `.unitypackage` tar archive) and produces a
//! structured, navigable representation of the Unity objects inside —
//! sufficient to extract meshes and auxiliary assets. Export/rendering is a
//! separate, out-of-scope stage; this crate's job ends at `AssetContext`.
//!
//! # Example
//!
//! ```rust,no_run
//! use unity_asset_binary::AssetContext;
//! use std::fs;
//!
//! let data = fs::read("example.bundle")?;
//! let mut ctx = AssetContext::new();
//! ctx.ingest(&data, "example.bundle")?;
//!
//! for file in &ctx.serialized_files {
//!     println!("{}: {} objects", file.source_name, file.objects.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod common_strings;
pub mod compression;
pub mod container;
pub mod context;
pub mod error;
pub mod mesh;
pub mod object;
pub mod packed_bit_vector;
pub mod reader;
pub mod serialized_file;
pub mod typetree;
pub mod unity_objects;
pub mod unity_version;

pub use compression::{decompress, CompressionType};
pub use container::{Container, ContainerEntry, UnityFsHeader};
pub use context::{
    AssetContext, ObjectRef, ParsedSerializedFile, SemanticGameObject, SemanticMesh,
    SemanticTransform, Warning,
};
pub use error::{BinaryError, Result};
pub use mesh::{
    ChannelInfo, CompressedMesh, ExpandedCompressedMesh, Mesh, StreamInfo, SubMesh, Topology, AABB,
};
pub use object::UnityObject;
pub use packed_bit_vector::PackedBitVector;
pub use reader::{BinaryReader, ByteOrder};
pub use serialized_file::{
    FileIdentifier, ObjectEntry, PPtr, ScriptReference, SerializedFile, SerializedFileHeader,
    SerializedType,
};
pub use typetree::{TypeTree, TypeTreeNode};
pub use unity_objects::{GameObject, Quaternion, Transform, Vector3};
pub use unity_version::{UnityFeature, UnityVersion, UnityVersionType, VersionCompatibility};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_empty_input_records_warning_not_panic() {
        let mut ctx = AssetContext::new();
        let result = ctx.ingest(&[], "empty.bundle");
        assert!(result.is_ok());
        assert!(ctx.serialized_files.is_empty());
        assert!(!ctx.warnings.is_empty());
    }
}
