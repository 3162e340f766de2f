//! Addressing of tree nodes by `(level, index)`.

use bincode::{Decode, Encode};

/// Position of a node in the list's hash tree.
///
/// Leaves are on level 0. Node `index` on level `l + 1` is the parent of
/// nodes `2 * index` and `2 * index + 1` on level `l`. An even index marks a
/// left child, an odd index a right child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct ProofListKey {
    level: u8,
    index: u64,
}

impl ProofListKey {
    /// Key of node `index` on `level`.
    pub const fn new(level: u8, index: u64) -> Self {
        ProofListKey { level, index }
    }

    /// Key of leaf `index`.
    pub const fn leaf(index: u64) -> Self {
        ProofListKey { level: 0, index }
    }

    /// Level of the node, 0 for leaves.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Index of the node within its level.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// `true` if the node is the left child of its parent.
    pub fn is_left(&self) -> bool {
        self.index & 1 == 0
    }

    /// The other child of the same parent.
    pub fn sibling(&self) -> Self {
        ProofListKey {
            level: self.level,
            index: self.index ^ 1,
        }
    }

    /// The parent node.
    pub fn parent(&self) -> Self {
        ProofListKey {
            level: self.level + 1,
            index: self.index >> 1,
        }
    }
}

/// Level of the root of a list with `len` elements: `ceil(log2(len))`, and
/// 0 for lists with at most one element.
pub fn root_level(len: u64) -> u8 {
    if len <= 1 {
        0
    } else {
        (u64::BITS - (len - 1).leading_zeros()) as u8
    }
}

/// Number of nodes on `level` of a list with `len` elements:
/// `ceil(len / 2^level)`.
pub fn level_len(len: u64, level: u8) -> u64 {
    if level >= 64 {
        return u64::from(len > 0);
    }
    let shifted = len >> level;
    if len & ((1u64 << level) - 1) != 0 {
        shifted + 1
    } else {
        shifted
    }
}
