//! Inclusion and range proofs for the Merkle list.
//!
//! A `ListProof` proves that the contiguous elements in `entries` sit at
//! their indices in a list of `length` elements with a given root hash. The
//! `nodes` hold the hashes of the subtrees bordering the proven range, keyed
//! by `(level, index)`, which is all a verifier needs to fold the entries
//! back into the root.

use bincode::{Decode, Encode};

use crate::{HashCode, ProofError, ProofListKey};

/// Upper bound on the encoded size of a proof accepted by
/// [`ListProof::decode_from_slice`].
const MAX_ENCODED_PROOF_SIZE: usize = 100 * 1024 * 1024;

/// Proof of a contiguous range of list elements.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ListProof {
    /// Length of the list the proof was made for.
    pub length: u64,
    /// Proven `(index, value bytes)` pairs, in index order.
    pub entries: Vec<(u64, Vec<u8>)>,
    /// Hashes of the subtrees adjoining the proven range, sorted by key.
    pub nodes: Vec<(ProofListKey, HashCode)>,
}

impl ListProof {
    /// `true` if the proof reveals no element.
    pub fn is_empty_range(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode to bytes using bincode.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, ProofError> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_no_limit();
        bincode::encode_to_vec(self, config)
            .map_err(|e| ProofError::Decode(format!("encode error: {}", e)))
    }

    /// Decode from bytes using bincode.
    pub fn decode_from_slice(bytes: &[u8]) -> Result<Self, ProofError> {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_limit::<MAX_ENCODED_PROOF_SIZE>();
        let (proof, read): (Self, usize) = bincode::decode_from_slice(bytes, config)
            .map_err(|e| ProofError::Decode(format!("decode error: {}", e)))?;
        if read != bytes.len() {
            return Err(ProofError::Decode(format!(
                "{} trailing bytes after proof",
                bytes.len() - read
            )));
        }
        Ok(proof)
    }
}
