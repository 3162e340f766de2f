//! Conversion of list elements to and from bytes.

use crate::{hash::HASH_SIZE, HashCode};

/// A value that can be stored in a list.
///
/// Leaves hash the bytes returned by [`to_bytes`](Self::to_bytes), so the
/// encoding must be deterministic.
pub trait StorageValue: Sized {
    /// Serialize the value.
    fn to_bytes(&self) -> Vec<u8>;

    /// Deserialize a value produced by [`to_bytes`](Self::to_bytes).
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Bytes that do not decode to the expected type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot decode {type_name}: {reason}")]
pub struct CodecError {
    type_name: &'static str,
    reason: String,
}

impl CodecError {
    /// Decoding `type_name` failed for `reason`.
    pub fn new(type_name: &'static str, reason: impl Into<String>) -> Self {
        CodecError {
            type_name,
            reason: reason.into(),
        }
    }
}

impl StorageValue for Vec<u8> {
    fn to_bytes(&self) -> Vec<u8> {
        self.clone()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bytes.to_vec())
    }
}

impl StorageValue for String {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::new("String", e.to_string()))
    }
}

impl StorageValue for u64 {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_be_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        <[u8; 8]>::try_from(bytes)
            .map(u64::from_be_bytes)
            .map_err(|_| CodecError::new("u64", format!("expected 8 bytes, got {}", bytes.len())))
    }
}

impl StorageValue for HashCode {
    fn to_bytes(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        HashCode::from_slice(bytes).ok_or_else(|| {
            CodecError::new(
                "HashCode",
                format!("expected {} bytes, got {}", HASH_SIZE, bytes.len()),
            )
        })
    }
}
