//! Proof verification.
//!
//! Pure functions of the proof: no storage is required. The root is
//! recomputed from the proven entries and the proof nodes, level by level,
//! and compared to the trusted root.

use std::collections::BTreeMap;

use crate::{
    hash::{branch_hash, leaf_hash},
    key::{level_len, root_level},
    HashCode, ListProof, ProofError, ProofListKey, StorageValue,
};

/// Maximum number of elements per proof field (entries, nodes).
pub const MAX_PROOF_ELEMENTS: usize = 100_000;

/// Entries proven by a successful verification.
pub type ProvenEntries = Vec<(u64, Vec<u8>)>;

impl ListProof {
    /// Verify the proof against a trusted root hash.
    ///
    /// Returns the proven `(index, value bytes)` pairs on success.
    ///
    /// The root commits to the tree shape only through its hashes: `length`
    /// is not authenticated, and leaves and branches hash without a domain
    /// tag. A proof may therefore present the 64-byte concatenation of two
    /// child hashes as one "element" of a shorter list and still match the
    /// root. Callers that know the element type should use
    /// [`verify_values`](Self::verify_values), which rejects entries that do
    /// not decode, and should check `length` against a trusted source when
    /// the element encoding can be 64 bytes long.
    pub fn verify(&self, expected_root: &HashCode) -> Result<ProvenEntries, ProofError> {
        let (computed_root, entries) = self.verify_and_get_root()?;
        if &computed_root != expected_root {
            return Err(ProofError::RootHashMismatch {
                expected: *expected_root,
                actual: computed_root,
            });
        }
        Ok(entries)
    }

    /// Like [`verify`](Self::verify), decoding the proven values as `T`.
    pub fn verify_values<T: StorageValue>(
        &self,
        expected_root: &HashCode,
    ) -> Result<Vec<(u64, T)>, ProofError> {
        self.verify(expected_root)?
            .into_iter()
            .map(|(index, bytes)| {
                T::from_bytes(&bytes)
                    .map(|value| (index, value))
                    .map_err(|e| ProofError::Decode(format!("entry {}: {}", index, e)))
            })
            .collect()
    }

    /// Check the proof structure and recompute the root it authenticates,
    /// without comparing against a trusted root.
    pub fn verify_and_get_root(&self) -> Result<(HashCode, ProvenEntries), ProofError> {
        if self.entries.len() > MAX_PROOF_ELEMENTS || self.nodes.len() > MAX_PROOF_ELEMENTS {
            return Err(ProofError::Malformed(format!(
                "proof contains too many elements (max {} per field)",
                MAX_PROOF_ELEMENTS
            )));
        }

        if self.length == 0 {
            if !self.entries.is_empty() || !self.nodes.is_empty() {
                return Err(ProofError::Malformed(
                    "proof for an empty list must not carry entries or nodes".to_owned(),
                ));
            }
            return Ok((HashCode::zero(), Vec::new()));
        }

        let mut nodes = self.node_map()?;
        let top = root_level(self.length);

        let Some(&(first, _)) = self.entries.first() else {
            let root_key = ProofListKey::new(top, 0);
            return match (nodes.remove(&root_key), nodes.is_empty()) {
                (Some(root), true) => Ok((root, Vec::new())),
                _ => Err(ProofError::Malformed(
                    "empty range proof must carry exactly the root node".to_owned(),
                )),
            };
        };
        self.check_entries(first)?;

        // Fold the proven range upwards. `level_hashes` holds the hashes of
        // nodes `[from, from + level_hashes.len())` on the current level.
        let mut from = first;
        let mut level_hashes: Vec<HashCode> = self
            .entries
            .iter()
            .map(|(_, value)| leaf_hash(value))
            .collect();

        for level in 0..top {
            let to = from + level_hashes.len() as u64;
            let count = level_len(self.length, level);

            if from & 1 == 1 {
                let left = take_node(&mut nodes, ProofListKey::new(level, from - 1))?;
                level_hashes.insert(0, left);
                from -= 1;
            }
            if (to - 1) & 1 == 0 && to < count {
                let right = take_node(&mut nodes, ProofListKey::new(level, to))?;
                level_hashes.push(right);
            }

            let mut parents = Vec::with_capacity(level_hashes.len().div_ceil(2));
            let mut pairs = level_hashes.chunks_exact(2);
            for pair in &mut pairs {
                parents.push(branch_hash(&pair[0], &pair[1]));
            }
            // a node without a right sibling is promoted unchanged
            if let [orphan] = pairs.remainder() {
                parents.push(*orphan);
            }
            level_hashes = parents;
            from >>= 1;
        }

        if !nodes.is_empty() {
            return Err(ProofError::Malformed(format!(
                "{} proof nodes were not used",
                nodes.len()
            )));
        }
        match level_hashes.as_slice() {
            [root] if from == 0 => Ok((*root, self.entries.clone())),
            _ => Err(ProofError::Malformed(
                "proof does not fold into a single root".to_owned(),
            )),
        }
    }

    /// Index the proof nodes by key, rejecting duplicates and nodes that
    /// cannot exist in a list of `self.length` elements.
    fn node_map(&self) -> Result<BTreeMap<ProofListKey, HashCode>, ProofError> {
        let top = root_level(self.length);
        let mut nodes = BTreeMap::new();
        for (key, hash) in &self.nodes {
            if key.level() > top || key.index() >= level_len(self.length, key.level()) {
                return Err(ProofError::Malformed(format!(
                    "node ({}, {}) is outside a list of length {}",
                    key.level(),
                    key.index(),
                    self.length
                )));
            }
            if nodes.insert(*key, *hash).is_some() {
                return Err(ProofError::Malformed(format!(
                    "duplicate node ({}, {})",
                    key.level(),
                    key.index()
                )));
            }
        }
        Ok(nodes)
    }

    /// Entries must be contiguous, ascending and inside the list.
    fn check_entries(&self, first: u64) -> Result<(), ProofError> {
        for (offset, (index, _)) in self.entries.iter().enumerate() {
            let expected = first.checked_add(offset as u64);
            if expected != Some(*index) {
                return Err(ProofError::Malformed(format!(
                    "entry {} breaks the contiguous range starting at {}",
                    index, first
                )));
            }
            if *index >= self.length {
                return Err(ProofError::Malformed(format!(
                    "entry {} is outside a list of length {}",
                    index, self.length
                )));
            }
        }
        Ok(())
    }
}

fn take_node(
    nodes: &mut BTreeMap<ProofListKey, HashCode>,
    key: ProofListKey,
) -> Result<HashCode, ProofError> {
    nodes.remove(&key).ok_or_else(|| {
        ProofError::Malformed(format!(
            "missing node ({}, {})",
            key.level(),
            key.index()
        ))
    })
}
