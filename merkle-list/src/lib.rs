//! Append-only Merkle list with inclusion and range proofs, using Blake3.
//!
//! Elements are the leaves of a binary hash tree. Leaf `i` hashes the
//! element's bytes, an internal node hashes the concatenation of its two
//! children, and a node without a right sibling is promoted to the next level
//! unchanged:
//!
//! ```text
//! leaf(i)        = blake3(bytes(v_i))
//! node(l + 1, j) = blake3(node(l, 2j) || node(l, 2j + 1))   if node(l, 2j + 1) exists
//!                = node(l, 2j)                               otherwise
//! ```
//!
//! The root sits on level `ceil(log2(len))`. The root of an empty list is the
//! all-zero hash.
//!
//! With the `full` feature (default) the crate provides [`ProofListIndex`],
//! which stores the list in a [`proofdb_storage`] view and builds proofs.
//! The `verify` feature alone provides [`ListProof`] and its verifier, with
//! no storage dependency.

#![warn(missing_docs)]

mod codec;
mod error;
mod hash;
mod key;
mod proof;
mod verify;

#[cfg(feature = "full")]
mod index;
#[cfg(feature = "full")]
mod iter;

#[cfg(all(test, feature = "full"))]
mod tests;

pub use codec::{CodecError, StorageValue};
#[cfg(feature = "full")]
pub use error::Error;
pub use error::ProofError;
pub use hash::{HashCode, HASH_SIZE, HASH_SIZE_BITS};
#[cfg(feature = "full")]
pub use index::ProofListIndex;
#[cfg(feature = "full")]
pub use iter::ListIter;
pub use key::{level_len, root_level, ProofListKey};
pub use proof::ListProof;
pub use verify::{ProvenEntries, MAX_PROOF_ELEMENTS};
