//! `AssetContext`: the write-once aggregator populated during a parse.
//!
//! A context owns every container, serialized file, and decoded object that
//! comes out of a parse. It is the only place cross-file `PPtr`s get
//! resolved, since that requires seeing every serialized file a batch of
//! inputs produced, not just the one a given object lives in.

use crate::container::Container;
use crate::error::Result;
use crate::mesh::Mesh;
use crate::object::UnityObject;
use crate::serialized_file::{FileIdentifier, ObjectEntry, PPtr, SerializedFile};
use crate::unity_objects::{GameObject, Transform};
use crate::unity_version::UnityVersion;
use indexmap::IndexMap;

/// A recoverable issue recorded during parsing; never aborts the parse.
#[derive(Debug, Clone)]
pub struct Warning {
    pub code: &'static str,
    pub message: String,
}

/// One SerializedFile's directory plus its fully decoded objects. Unlike
/// `SerializedFile<'a>`, this owns everything it needs and carries no
/// borrowed byte slices, so it can live in `AssetContext` for as long as the
/// context itself.
#[derive(Debug)]
pub struct ParsedSerializedFile {
    pub source_name: String,
    pub version: u32,
    pub unity_version: String,
    pub target_platform: i32,
    pub big_endian: bool,
    pub externals: Vec<FileIdentifier>,
    /// Directory metadata for every object, including ones that failed to
    /// decode (see `objects` for which of these actually have a value).
    pub entries: Vec<ObjectEntry>,
    /// Successfully decoded objects, keyed by `path_id`.
    pub objects: IndexMap<i64, UnityObject>,
}

impl ParsedSerializedFile {
    pub fn object(&self, path_id: i64) -> Option<&UnityObject> {
        self.objects.get(&path_id)
    }

    pub fn objects_by_class(&self, class_id: i32) -> impl Iterator<Item = &UnityObject> {
        self.objects.values().filter(move |o| o.class_id == class_id)
    }
}

/// A handle to a decoded object somewhere in the context: which serialized
/// file it lives in, plus its `path_id` within that file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef {
    pub file_index: usize,
    pub path_id: i64,
}

/// One GameObject's decoded semantic view, plus where it came from.
#[derive(Debug, Clone)]
pub struct SemanticGameObject {
    pub object_ref: ObjectRef,
    pub value: GameObject,
}

/// One Transform's decoded semantic view, plus where it came from.
#[derive(Debug, Clone)]
pub struct SemanticTransform {
    pub object_ref: ObjectRef,
    pub value: Transform,
}

/// One Mesh's decoded semantic view, plus where it came from.
#[derive(Debug, Clone)]
pub struct SemanticMesh {
    pub object_ref: ObjectRef,
    pub value: Mesh,
}

/// The write-once aggregator a parse populates. `ingest` is the single entry
/// point; once it (and any subsequent `ingest` calls for other inputs in the
/// same batch) returns, everything here is safe to read concurrently.
#[derive(Debug, Default)]
pub struct AssetContext {
    pub containers: Vec<Container>,
    pub serialized_files: Vec<ParsedSerializedFile>,
    pub semantic_game_objects: Vec<SemanticGameObject>,
    pub semantic_transforms: Vec<SemanticTransform>,
    pub semantic_meshes: Vec<SemanticMesh>,
    pub warnings: Vec<Warning>,
}

const CLASS_GAME_OBJECT: i32 = 1;
const CLASS_TRANSFORM: i32 = 4;
const CLASS_MESH: i32 = 43;

impl AssetContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, code: &'static str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(code, %message, "asset context warning");
        self.warnings.push(Warning { code, message });
    }

    /// Ingest one top-level input (a UnityFS bundle, a `.unitypackage` tar, or
    /// a raw SerializedFile) under `source_name`. Fatal container/format
    /// errors abort and propagate; anything recoverable is downgraded to a
    /// warning and the rest of the input keeps parsing.
    pub fn ingest(&mut self, data: &[u8], source_name: &str) -> Result<()> {
        if is_raw_serialized_file(data) {
            self.ingest_serialized_file(data, source_name);
            return Ok(());
        }

        let container = Container::parse(data)?;
        let candidate_names: Vec<(String, Vec<u8>)> = container
            .serialized_file_candidates()
            .map(|e| (e.name.clone(), e.data.clone()))
            .collect();

        self.containers.push(container);

        for (name, bytes) in candidate_names {
            self.ingest_serialized_file(&bytes, &name);
        }

        Ok(())
    }

    fn ingest_serialized_file(&mut self, data: &[u8], source_name: &str) {
        let file = match SerializedFile::parse(data) {
            Ok(f) => f,
            Err(e) => {
                self.add_warning(
                    e.code(),
                    format!("{source_name}: failed to parse as SerializedFile: {e}"),
                );
                return;
            }
        };

        let file_index = self.serialized_files.len();
        let unity_version = file.unity_version.clone();
        let parsed_version =
            UnityVersion::parse_version(&unity_version).unwrap_or_default();

        let mut objects = IndexMap::new();
        for entry in &file.objects {
            match UnityObject::decode(&file, entry) {
                Ok(obj) => {
                    self.index_semantic_view(file_index, entry, &obj, &parsed_version);
                    objects.insert(entry.path_id, obj);
                }
                Err(e) => {
                    self.add_warning(
                        e.code(),
                        format!(
                            "{source_name}: object path_id={} (class {}) skipped: {e}",
                            entry.path_id, entry.class_id
                        ),
                    );
                }
            }
        }

        self.serialized_files.push(ParsedSerializedFile {
            source_name: source_name.to_string(),
            version: file.header.version,
            unity_version,
            target_platform: file.target_platform,
            big_endian: file.header.endian != 0,
            externals: file.externals.clone(),
            entries: file.objects.clone(),
            objects,
        });
    }

    fn index_semantic_view(
        &mut self,
        file_index: usize,
        entry: &ObjectEntry,
        obj: &UnityObject,
        version: &UnityVersion,
    ) {
        let object_ref = ObjectRef {
            file_index,
            path_id: entry.path_id,
        };
        match entry.class_id {
            CLASS_GAME_OBJECT => {
                if let Ok(value) = GameObject::from_typetree(&obj.properties) {
                    self.semantic_game_objects.push(SemanticGameObject { object_ref, value });
                }
            }
            CLASS_TRANSFORM => {
                if let Ok(value) = Transform::from_typetree(&obj.properties) {
                    self.semantic_transforms.push(SemanticTransform { object_ref, value });
                }
            }
            CLASS_MESH => match Mesh::decode(obj, version) {
                Ok(value) => self.semantic_meshes.push(SemanticMesh { object_ref, value }),
                Err(e) => self.add_warning(
                    e.code(),
                    format!("mesh path_id={} failed to decode: {e}", entry.path_id),
                ),
            },
            _ => {}
        }
    }

    /// Resolve a `PPtr` seen while reading `current_file`'s objects into the
    /// object it targets. `file_id == 0` means same-file; otherwise the
    /// target file is looked up through `current_file`'s `externals` table by
    /// matching `path_name` against a known serialized file's `source_name`.
    pub fn resolve(&self, pptr: PPtr, current_file: usize) -> Option<ObjectRef> {
        if pptr.is_null() {
            return None;
        }

        let target_file_index = if pptr.file_id == 0 {
            current_file
        } else {
            let current = self.serialized_files.get(current_file)?;
            let external = current.externals.get((pptr.file_id - 1) as usize)?;
            self.serialized_files
                .iter()
                .position(|f| f.source_name == external.path_name)?
        };

        let target = self.serialized_files.get(target_file_index)?;
        target.objects.get(&pptr.path_id)?;
        Some(ObjectRef {
            file_index: target_file_index,
            path_id: pptr.path_id,
        })
    }

    /// Dereference a previously resolved `ObjectRef`.
    pub fn get(&self, object_ref: ObjectRef) -> Option<&UnityObject> {
        self.serialized_files.get(object_ref.file_index)?.object(object_ref.path_id)
    }
}

/// A raw SerializedFile has no container magic; its header starts directly
/// with a big-endian `metadata_size: u32` we can't distinguish from a UnityFS
/// signature by value alone, so we instead rule out every known container
/// magic and fall back to "probably a bare SerializedFile".
fn is_raw_serialized_file(data: &[u8]) -> bool {
    !(data.starts_with(b"UnityFS\0")
        || data.starts_with(b"UnityWeb")
        || data.starts_with(b"UnityRaw")
        || (data.len() >= 512 && &data[257..262] == b"ustar"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_null_pptr_is_none() {
        let ctx = AssetContext::new();
        let pptr = PPtr { file_id: 0, path_id: 0 };
        assert!(ctx.resolve(pptr, 0).is_none());
    }

    #[test]
    fn test_ingest_malformed_container_is_fatal() {
        let mut ctx = AssetContext::new();
        let err = ctx.ingest(b"not-a-container-and-too-short", "bad.bundle");
        // Too short to even look like a raw SerializedFile header either way,
        // so this surfaces as a parse failure via the serialized-file path
        // (recorded as a warning, not fatal) since it doesn't match any
        // container magic.
        assert!(err.is_ok());
        assert_eq!(ctx.serialized_files.len(), 0);
        assert!(!ctx.warnings.is_empty());
    }

    #[test]
    fn test_add_warning_records_code_and_message() {
        let mut ctx = AssetContext::new();
        ctx.add_warning("OBJECT_OUT_OF_RANGE", "object 7 out of range");
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].code, "OBJECT_OUT_OF_RANGE");
    }
}
