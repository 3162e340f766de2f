//! Blake3 node hashing.

use std::fmt;

use bincode::{Decode, Encode};

/// Digest width in bytes.
pub const HASH_SIZE: usize = 32;

/// Digest width in bits.
pub const HASH_SIZE_BITS: usize = HASH_SIZE * 8;

/// A Merkle node hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Encode, Decode)]
pub struct HashCode([u8; HASH_SIZE]);

impl HashCode {
    /// Wrap raw digest bytes.
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        HashCode(bytes)
    }

    /// The all-zero hash, root of an empty list.
    pub const fn zero() -> Self {
        HashCode([0; HASH_SIZE])
    }

    /// Parse a hash from a slice of exactly [`HASH_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; HASH_SIZE]>::try_from(bytes).ok().map(HashCode)
    }

    /// `true` for the all-zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; HASH_SIZE]
    }

    /// Digest width in bits.
    pub fn bits(&self) -> usize {
        HASH_SIZE_BITS
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_SIZE]> for HashCode {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        HashCode(bytes)
    }
}

impl AsRef<[u8]> for HashCode {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashCode({})", self.to_hex())
    }
}

/// Hash of a leaf: `blake3(value_bytes)`.
pub(crate) fn leaf_hash(value_bytes: &[u8]) -> HashCode {
    HashCode(*blake3::hash(value_bytes).as_bytes())
}

/// Hash of an internal node: `blake3(left || right)`.
pub(crate) fn branch_hash(left: &HashCode, right: &HashCode) -> HashCode {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&left.0);
    hasher.update(&right.0);
    HashCode(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash() {
        let zero = HashCode::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.bits(), 256);
        assert_eq!(zero.to_hex(), "0".repeat(64));
    }

    #[test]
    fn test_branch_hash_is_ordered() {
        let a = leaf_hash(b"a");
        let b = leaf_hash(b"b");
        assert_ne!(branch_hash(&a, &b), branch_hash(&b, &a));

        let mut concat = Vec::new();
        concat.extend_from_slice(a.as_bytes());
        concat.extend_from_slice(b.as_bytes());
        assert_eq!(branch_hash(&a, &b), leaf_hash(&concat));
    }

    #[test]
    fn test_from_slice_checks_width() {
        assert_eq!(HashCode::from_slice(&[7; 32]), Some(HashCode::new([7; 32])));
        assert_eq!(HashCode::from_slice(&[7; 31]), None);
        assert_eq!(HashCode::from_slice(&[7; 33]), None);
    }
}
