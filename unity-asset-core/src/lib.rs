//! Unity Asset Core
//!
//! Core data structures and types for Unity asset parsing. This crate provides
//! the fundamental building blocks shared by the binary deserializer and the
//! command-line front end: the dynamic `UnityValue` object model used to hold
//! TypeTree-decoded object properties, and the Unity class-id registry. Fallible
//! operations live in `unity_asset_binary::error`, the crate that actually does
//! the parsing; this crate's types are infallible by construction.

pub mod constants;
pub mod unity_value;

// Re-export main types
pub use constants::*;
pub use unity_value::UnityValue;

/// Get Unity class name from class ID
pub fn get_class_name(class_id: i32) -> Option<String> {
    GLOBAL_CLASS_ID_MAP.get_class_name(class_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_class_name_known_and_unknown() {
        assert_eq!(get_class_name(1).as_deref(), Some("GameObject"));
        assert_eq!(get_class_name(43).as_deref(), Some("Mesh"));
        assert_eq!(get_class_name(999_999), None);
    }
}
