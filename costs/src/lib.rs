#![deny(missing_docs)]
//! Cost accounting shared by the proofdb crates.
//!
//! Every operation that touches storage or hashes nodes reports what it did
//! as an [`OperationCost`] next to its result. Costs are informational: they
//! never change the outcome of an operation.

mod context;

use std::ops::{Add, AddAssign};

pub use context::{CostContext, CostResult, CostsExt};

/// Approximate resources consumed by an operation.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct OperationCost {
    /// Number of storage lookups.
    pub seek_count: u32,
    /// Bytes handed to storage for writing (keys and values).
    pub storage_written_bytes: u64,
    /// Bytes loaded from storage.
    pub storage_loaded_bytes: u64,
    /// Bytes released by removals.
    pub storage_freed_bytes: u64,
    /// Number of Merkle node hash computations.
    pub hash_node_calls: u32,
}

impl OperationCost {
    /// Cost of `seek_count` lookups and nothing else.
    pub fn with_seek_count(seek_count: u32) -> Self {
        OperationCost {
            seek_count,
            ..Default::default()
        }
    }

    /// Cost of `hash_node_calls` node hashes and nothing else.
    pub fn with_hash_node_calls(hash_node_calls: u32) -> Self {
        OperationCost {
            hash_node_calls,
            ..Default::default()
        }
    }

    /// Cost of a single read that returned `loaded` bytes.
    pub fn for_read(loaded: usize) -> Self {
        OperationCost {
            seek_count: 1,
            storage_loaded_bytes: loaded as u64,
            ..Default::default()
        }
    }

    /// Cost of a single write of `key_len + value_len` bytes.
    pub fn for_write(key_len: usize, value_len: usize) -> Self {
        OperationCost {
            seek_count: 1,
            storage_written_bytes: (key_len + value_len) as u64,
            ..Default::default()
        }
    }

    /// `true` if nothing was accounted.
    pub fn is_nothing(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for OperationCost {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for OperationCost {
    fn add_assign(&mut self, rhs: Self) {
        self.seek_count += rhs.seek_count;
        self.storage_written_bytes += rhs.storage_written_bytes;
        self.storage_loaded_bytes += rhs.storage_loaded_bytes;
        self.storage_freed_bytes += rhs.storage_freed_bytes;
        self.hash_node_calls += rhs.hash_node_calls;
    }
}

/// Works like `?` for `CostResult`: on error returns early with the costs
/// accumulated so far, on success yields the value and adds its cost to the
/// accumulator.
#[macro_export]
macro_rules! cost_return_on_error {
    ( &mut $cost:ident, $($body:tt)+ ) => {
        {
            use $crate::CostsExt;
            let result_with_cost = { $($body)+ };
            let result = result_with_cost.unwrap_add_cost(&mut $cost);
            match result {
                Ok(x) => x,
                Err(e) => return Err(e.into()).wrap_with_cost($cost),
            }
        }
    };
}

/// Same as [`cost_return_on_error`] but for a plain `Result`: nothing is
/// added to the accumulator.
#[macro_export]
macro_rules! cost_return_on_error_no_add {
    ( &$cost:ident, $($body:tt)+ ) => {
        {
            use $crate::CostsExt;
            let result = { $($body)+ };
            match result {
                Ok(x) => x,
                Err(e) => return Err(e.into()).wrap_with_cost($cost),
            }
        }
    };
}
