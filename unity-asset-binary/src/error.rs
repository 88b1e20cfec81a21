//! Error types for Unity binary parsing

use thiserror::Error;

/// Result type for Unity binary operations
pub type Result<T> = std::result::Result<T, BinaryError>;

/// Errors that can occur during Unity binary parsing
#[derive(Error, Debug)]
pub enum BinaryError {
    /// I/O error surfaced from an underlying reader/writer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read would exceed the current slice
    #[error("out of bounds: {message}")]
    OutOfBounds { message: String },

    /// A programmer error: null/negative size/non-power-of-two alignment, etc.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A string's bytes are not valid UTF-8
    #[error("UTF-8 decoding error at offset {offset}: {message}")]
    Utf8DecodingError { offset: u64, message: String },

    /// `align(n, validate_padding=true)` found a non-zero skipped byte
    #[error("alignment validation failed at offset {offset}: expected padding, found {byte:#04x}")]
    AlignmentValidationError { offset: u64, byte: u8 },

    /// `read_utf8_nul_terminated` exceeded its `max_len` without finding a terminator
    #[error("string exceeded maximum length {max_len} without a NUL terminator")]
    StringTooLong { max_len: usize },

    /// Uncompressed block length did not match the declared size
    #[error("decompression size mismatch: expected {expected}, got {actual}")]
    DecompressionSizeMismatch { expected: usize, actual: usize },

    /// LZMA input shorter than the 5-byte Unity properties header
    #[error("LZMA stream too short: need at least 5 bytes, got {actual}")]
    LzmaTooShort { actual: usize },

    /// LZMA properties byte decodes to `lc + lp > 4`
    #[error("invalid LZMA properties byte {byte:#04x}")]
    LzmaInvalidProperties { byte: u8 },

    /// LZMA decompressed size did not match the expected size
    #[error("LZMA size mismatch: expected {expected}, got {actual}")]
    LzmaSizeMismatch { expected: usize, actual: usize },

    /// LZ4/LZ4HC block decode failed
    #[error("LZ4 decode error: {message}")]
    Lz4DecodeError { message: String },

    /// Compression input exceeded the 512 MiB cap
    #[error("compression input too large: {size} bytes exceeds the {limit} byte cap")]
    CompressionInputTooLarge { size: usize, limit: usize },

    /// Compression id not among `{0, 1, 2, 3}`
    #[error("unsupported compression id {id}")]
    UnsupportedCompression { id: u32 },

    /// A container-level structural invariant was violated
    #[error("container malformed: {message}")]
    ContainerMalformed { message: String },

    /// SerializedFile version is outside the supported `[1, 22]` range
    #[error("unsupported SerializedFile version {version}")]
    UnsupportedSerializedFileVersion { version: u32 },

    /// An object's byte range extends past `file_size`
    #[error("object {path_id} out of range: byte range extends past file size")]
    ObjectOutOfRange { path_id: i64 },

    /// `PackedBitVector::unpack_ints`/`unpack_floats` called with `bit_size == 0`
    #[error("PackedBitVector bit_size is unset")]
    BitSizeUnset,

    /// A Mesh object had no `vertex_data` and no `compressed_mesh`
    #[error("mesh is missing vertex data")]
    MeshMissingVertexData,

    /// A cooperative cancellation token was observed during a decode/decompress step
    #[error("operation cancelled")]
    Cancelled,
}

impl BinaryError {
    /// Stable SCREAMING_SNAKE code identifying this error kind, used for the
    /// error/warning wire format and as the key consumers match against.
    pub fn code(&self) -> &'static str {
        match self {
            BinaryError::Io(_) => "IO_ERROR",
            BinaryError::OutOfBounds { .. } => "OUT_OF_BOUNDS",
            BinaryError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            BinaryError::Utf8DecodingError { .. } => "UTF8_DECODING_ERROR",
            BinaryError::AlignmentValidationError { .. } => "ALIGNMENT_VALIDATION_ERROR",
            BinaryError::StringTooLong { .. } => "STRING_TOO_LONG",
            BinaryError::DecompressionSizeMismatch { .. } => "DECOMPRESSION_SIZE_MISMATCH",
            BinaryError::LzmaTooShort { .. } => "LZMA_TOO_SHORT",
            BinaryError::LzmaInvalidProperties { .. } => "LZMA_INVALID_PROPERTIES",
            BinaryError::LzmaSizeMismatch { .. } => "LZMA_SIZE_MISMATCH",
            BinaryError::Lz4DecodeError { .. } => "LZ4_DECODE_ERROR",
            BinaryError::CompressionInputTooLarge { .. } => "COMPRESSION_INPUT_TOO_LARGE",
            BinaryError::UnsupportedCompression { .. } => "UNSUPPORTED_COMPRESSION",
            BinaryError::ContainerMalformed { .. } => "CONTAINER_MALFORMED",
            BinaryError::UnsupportedSerializedFileVersion { .. } => {
                "UNSUPPORTED_SERIALIZED_FILE_VERSION"
            }
            BinaryError::ObjectOutOfRange { .. } => "OBJECT_OUT_OF_RANGE",
            BinaryError::BitSizeUnset => "BIT_SIZE_UNSET",
            BinaryError::MeshMissingVertexData => "MESH_MISSING_VERTEX_DATA",
            BinaryError::Cancelled => "CANCELLED",
        }
    }

    /// Whether a caller can reasonably skip the offending unit of work (an
    /// object, a container entry) and keep parsing, per §7's propagation policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BinaryError::ObjectOutOfRange { .. } | BinaryError::UnsupportedCompression { .. }
        )
    }

    pub fn out_of_bounds<S: Into<String>>(message: S) -> Self {
        Self::OutOfBounds {
            message: message.into(),
        }
    }

    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn container_malformed<S: Into<String>>(message: S) -> Self {
        Self::ContainerMalformed {
            message: message.into(),
        }
    }

    pub fn lz4_decode_error<S: Into<String>>(message: S) -> Self {
        Self::Lz4DecodeError {
            message: message.into(),
        }
    }
}

impl From<lz4_flex::block::DecompressError> for BinaryError {
    fn from(err: lz4_flex::block::DecompressError) -> Self {
        Self::lz4_decode_error(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for BinaryError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::Utf8DecodingError {
            offset: 0,
            message: err.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for BinaryError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Utf8DecodingError {
            offset: 0,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_stability() {
        assert_eq!(
            BinaryError::ObjectOutOfRange { path_id: 7 }.code(),
            "OBJECT_OUT_OF_RANGE"
        );
        assert_eq!(
            BinaryError::MeshMissingVertexData.code(),
            "MESH_MISSING_VERTEX_DATA"
        );
        assert_eq!(
            BinaryError::UnsupportedCompression { id: 9 }.code(),
            "UNSUPPORTED_COMPRESSION"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(BinaryError::ObjectOutOfRange { path_id: 0 }.is_recoverable());
        assert!(!BinaryError::ContainerMalformed {
            message: "bad block".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_display_messages() {
        let err = BinaryError::LzmaTooShort { actual: 2 };
        assert!(err.to_string().contains("5 bytes"));
    }
}
