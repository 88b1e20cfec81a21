//! Cross-module integration tests: synthesize a minimal UnityFS bundle byte
//! stream and verify the container → entry pipeline recovers it exactly.

use unity_asset_binary::{AssetContext, Container};

fn write_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// Builds a single-block, uncompressed UnityFS bundle containing one entry
/// named `entry_name` with byte contents `entry_data`.
fn build_unity_fs(entry_name: &str, entry_data: &[u8]) -> Vec<u8> {
    // Blocks-info: content hash (16 bytes) + block directory + node directory.
    let mut blocks_info = Vec::new();
    blocks_info.extend_from_slice(&[0u8; 16]); // content hash, unused by the parser

    blocks_info.extend_from_slice(&1u32.to_be_bytes()); // block_count
    blocks_info.extend_from_slice(&(entry_data.len() as u32).to_be_bytes()); // uncompressed_size
    blocks_info.extend_from_slice(&(entry_data.len() as u32).to_be_bytes()); // compressed_size (no compression)
    blocks_info.extend_from_slice(&0u16.to_be_bytes()); // flags: compression id 0 (None)

    blocks_info.extend_from_slice(&1u32.to_be_bytes()); // node_count
    blocks_info.extend_from_slice(&0i64.to_be_bytes()); // offset
    blocks_info.extend_from_slice(&(entry_data.len() as i64).to_be_bytes()); // size
    blocks_info.extend_from_slice(&0u32.to_be_bytes()); // flags
    write_cstring(&mut blocks_info, entry_name);

    let mut data = Vec::new();
    write_cstring(&mut data, "UnityFS");
    data.extend_from_slice(&6u32.to_be_bytes()); // version >= 7 would require 16-byte alignment after header
    write_cstring(&mut data, "2019.4.0f1");
    write_cstring(&mut data, "abcdef0123456");
    data.extend_from_slice(&0i64.to_be_bytes()); // file_size, unused by the parser
    data.extend_from_slice(&(blocks_info.len() as u32).to_be_bytes()); // compressed_blocks_info_size
    data.extend_from_slice(&(blocks_info.len() as u32).to_be_bytes()); // uncompressed_blocks_info_size
    data.extend_from_slice(&0u32.to_be_bytes()); // flags: compression 0, blocks-info inline, no padding

    data.extend_from_slice(&blocks_info);
    data.extend_from_slice(entry_data);
    data
}

#[test]
fn test_unity_fs_roundtrip_recovers_entry_bytes() {
    let payload = b"synthetic serialized file bytes, not a real SerializedFile".to_vec();
    let bundle = build_unity_fs("CAB-0123456789abcdef", &payload);

    let container = Container::parse(&bundle).expect("container should parse");
    assert_eq!(container.unity_version.as_deref(), Some("2019.4.0f1"));
    assert_eq!(container.entries.len(), 1);
    assert_eq!(container.entries[0].name, "CAB-0123456789abcdef");
    assert_eq!(container.entries[0].data, payload);
}

#[test]
fn test_unity_fs_entry_is_a_serialized_file_candidate() {
    let payload = b"irrelevant".to_vec();
    let bundle = build_unity_fs("CAB-0123456789abcdef", &payload);
    let container = Container::parse(&bundle).unwrap();
    let candidates: Vec<_> = container.serialized_file_candidates().collect();
    assert_eq!(candidates.len(), 1);
}

#[test]
fn test_ingest_unity_fs_with_garbage_payload_records_warning_not_panic() {
    // The entry's bytes aren't a real SerializedFile, so ingest should
    // downgrade the failure to a warning and keep the container around
    // rather than propagating a fatal error.
    let payload = b"not a serialized file".to_vec();
    let bundle = build_unity_fs("CAB-0123456789abcdef", &payload);

    let mut ctx = AssetContext::new();
    ctx.ingest(&bundle, "test.bundle").expect("container-level parse should succeed");

    assert_eq!(ctx.containers.len(), 1);
    assert!(ctx.serialized_files.is_empty());
    assert!(!ctx.warnings.is_empty());
}

#[test]
fn test_ingest_truncated_unity_fs_signature_is_fatal() {
    // Carries the UnityFS magic (so it's routed through Container::parse,
    // not the raw-SerializedFile fallback) but is truncated right after it,
    // so header parsing itself fails.
    let mut ctx = AssetContext::new();
    let truncated = b"UnityFS\0".to_vec();
    let result = ctx.ingest(&truncated, "truncated.bundle");
    assert!(result.is_err());
}

#[test]
fn test_ingest_non_magic_bytes_is_treated_as_raw_serialized_file_attempt() {
    // No recognized container magic: ingest optimistically tries this as a
    // bare SerializedFile. It fails to parse as one, which is recoverable —
    // recorded as a warning rather than propagated as a fatal error.
    let mut ctx = AssetContext::new();
    let garbage = vec![0xFFu8; 600];
    let result = ctx.ingest(&garbage, "garbage.bin");
    assert!(result.is_ok());
    assert!(ctx.containers.is_empty());
    assert!(!ctx.warnings.is_empty());
}
