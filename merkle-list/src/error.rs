use thiserror::Error;

use crate::HashCode;

/// Reasons a proof is rejected.
///
/// Verification never panics; every malformed input maps to one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// The proof is well-formed but authenticates a different root.
    #[error("root hash mismatch: expected {expected}, got {actual}")]
    RootHashMismatch {
        /// Trusted root passed by the caller.
        expected: HashCode,
        /// Root recomputed from the proof.
        actual: HashCode,
    },
    /// The proof structure is inconsistent with its own length.
    #[error("malformed proof: {0}")]
    Malformed(String),
    /// The proof or a proven value could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// List index errors.
#[cfg(feature = "full")]
#[derive(Debug, Error)]
pub enum Error {
    /// `index` is not below the list length.
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: u64,
        /// List length.
        len: u64,
    },
    /// `[from, to)` is not a valid range of the list.
    #[error("range [{from}, {to}) out of range for list of length {len}")]
    InvalidRange {
        /// Range start.
        from: u64,
        /// Range end, exclusive.
        to: u64,
        /// List length.
        len: u64,
    },
    /// Error from the underlying view.
    #[error(transparent)]
    Storage(#[from] proofdb_storage::Error),
    /// A stored element does not decode.
    #[error(transparent)]
    Codec(#[from] crate::CodecError),
    /// Stored tree data is inconsistent.
    #[error("data corruption error: {0}")]
    CorruptedData(String),
}

#[cfg(feature = "full")]
impl Error {
    /// `true` for the index-out-of-range class of errors.
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Error::IndexOutOfRange { .. } | Error::InvalidRange { .. }
        )
    }
}
