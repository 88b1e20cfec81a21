//! Unity's common type-tree string table
//!
//! Unity's modern "blob" type trees reference node/type names either in a
//! per-file string buffer, or — when the high bit of the stored offset is
//! set — in this fixed, version-stable table that every serialized file
//! implicitly shares. The table's contents and order are fixed by Unity
//! itself; any compliant reader must embed an identical list so that offsets
//! resolve to the same strings.

use once_cell::sync::Lazy;

const HIGH_BIT: u32 = 0x8000_0000;

/// The strings, in the exact order Unity serializes them. Offsets are
/// derived positionally: each entry's offset is the running total of
/// `len + 1` (NUL terminator) bytes of every preceding entry.
const COMMON_STRINGS: &[&str] = &[
    "AABB",
    "AnimationClip",
    "AnimationCurve",
    "AnimationState",
    "Array",
    "Base",
    "BitField",
    "bitset",
    "bool",
    "char",
    "ColorRGBA",
    "Component",
    "data",
    "deque",
    "double",
    "dynamic_array",
    "FastPropertyName",
    "first",
    "float",
    "Font",
    "GameObject",
    "Generic Mono",
    "GradientNEW",
    "GUID",
    "GUIStyle",
    "int",
    "list",
    "long long",
    "map",
    "Matrix4x4f",
    "MdFour",
    "MonoBehaviour",
    "MonoScript",
    "m_ByteSize",
    "m_Curve",
    "m_EditorClassIdentifier",
    "m_EditorHideFlags",
    "m_Enabled",
    "m_ExtensionPtr",
    "m_GameObject",
    "m_Index",
    "m_IsArray",
    "m_IsStatic",
    "m_MetaFlag",
    "m_Name",
    "m_ObjectHideFlags",
    "m_PrefabInternal",
    "m_PrefabParentObject",
    "m_Script",
    "m_StaticEditorFlags",
    "m_Type",
    "m_Version",
    "Object",
    "pair",
    "PPtr<Component>",
    "PPtr<GameObject>",
    "PPtr<Material>",
    "PPtr<MonoBehaviour>",
    "PPtr<MonoScript>",
    "PPtr<Object>",
    "PPtr<Prefab>",
    "PPtr<Sprite>",
    "PPtr<TextAsset>",
    "PPtr<Texture>",
    "PPtr<Texture2D>",
    "PPtr<Transform>",
    "Prefab",
    "Quaternionf",
    "Rectf",
    "Rectangle",
    "RenderTexture",
    "second",
    "set",
    "short",
    "size",
    "SInt16",
    "SInt32",
    "SInt64",
    "SInt8",
    "staticvector",
    "string",
    "TextAsset",
    "TextMesh",
    "Texture",
    "Texture2D",
    "Transform",
    "TypelessData",
    "UInt16",
    "UInt32",
    "UInt64",
    "UInt8",
    "unsigned int",
    "unsigned long long",
    "unsigned short",
    "vector",
    "Vector2f",
    "Vector3f",
    "Vector4f",
    "m_ScriptingClassIdentifier",
    "Gradient",
    "Type*",
    "int2_storage",
    "int3_storage",
    "BoundsInt",
    "m_CorrespondingSourceObject",
    "m_PrefabInstance",
    "m_PrefabAsset",
    "FileSize",
    "Hash128",
];

/// `(offset, string)` pairs, sorted by offset, built once from `COMMON_STRINGS`.
static COMMON_STRING_TABLE: Lazy<Vec<(u32, &'static str)>> = Lazy::new(|| {
    let mut offset: u32 = 0;
    let mut table = Vec::with_capacity(COMMON_STRINGS.len());
    for s in COMMON_STRINGS {
        table.push((offset, *s));
        offset += s.len() as u32 + 1;
    }
    table
});

/// True when the stored string offset (as read from a type-tree blob) refers
/// to the shared common table rather than the file's own local buffer.
pub fn is_common_string_offset(offset: u32) -> bool {
    offset & HIGH_BIT != 0
}

/// Resolve an offset into the common table. `offset` must already have had
/// the high bit stripped (see `is_common_string_offset`).
pub fn resolve(offset: u32) -> Option<&'static str> {
    COMMON_STRING_TABLE
        .binary_search_by_key(&offset, |&(o, _)| o)
        .ok()
        .map(|idx| COMMON_STRING_TABLE[idx].1)
}

/// Resolve a raw stored offset (high bit set or not), returning `None` when
/// the offset is a local-buffer offset the caller must resolve itself.
pub fn resolve_raw(stored_offset: u32) -> Option<&'static str> {
    if is_common_string_offset(stored_offset) {
        resolve(stored_offset & !HIGH_BIT)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_entries_resolve() {
        assert_eq!(resolve(0), Some("AABB"));
        let aabb_len = "AABB".len() as u32 + 1;
        assert_eq!(resolve(aabb_len), Some("AnimationClip"));
    }

    #[test]
    fn test_high_bit_detection() {
        assert!(is_common_string_offset(HIGH_BIT));
        assert!(!is_common_string_offset(5));
        assert_eq!(resolve_raw(HIGH_BIT), Some("AABB"));
        assert_eq!(resolve_raw(5), None);
    }

    #[test]
    fn test_m_name_present() {
        assert!(COMMON_STRINGS.contains(&"m_Name"));
    }
}
