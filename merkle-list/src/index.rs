//! Merkle list bound to a storage view.
//!
//! Element `i` and every tree node are stored as separate entries in the
//! list's collection, so appending touches only the new leaf and its
//! ancestors:
//!
//! | key                               | value                    |
//! |-----------------------------------|--------------------------|
//! | `0x00 ++ index (u64 BE)`          | element bytes            |
//! | `0x01 ++ level ++ index (u64 BE)` | 32-byte node hash        |
//! | `0x02`                            | list length (u64 BE)     |

use std::marker::PhantomData;

use proofdb_costs::{
    cost_return_on_error, cost_return_on_error_no_add, CostResult, CostsExt, OperationCost,
};
use proofdb_storage::View;

use crate::{
    hash::{branch_hash, leaf_hash},
    key::{level_len, root_level},
    Error, HashCode, ListIter, ListProof, ProofListKey, StorageValue,
};

const VALUE_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;
const LENGTH_KEY: [u8; 1] = [0x02];

fn value_key(index: u64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = VALUE_PREFIX;
    key[1..].copy_from_slice(&index.to_be_bytes());
    key
}

fn node_key(node: ProofListKey) -> [u8; 10] {
    let mut key = [0u8; 10];
    key[0] = NODE_PREFIX;
    key[1] = node.level();
    key[2..].copy_from_slice(&node.index().to_be_bytes());
    key
}

/// Append-only list of `T` authenticated by a Merkle root.
///
/// The list lives in the collection `name` of the view it is bound to. Reads
/// work on any view; mutations need a [`Fork`](proofdb_storage::Fork) and
/// fail with [`ReadOnlyView`](proofdb_storage::Error::ReadOnlyView) on
/// snapshots.
#[derive(Debug)]
pub struct ProofListIndex<'v, T> {
    view: View<'v>,
    name: String,
    _value: PhantomData<fn() -> T>,
}

impl<'v, T: StorageValue> ProofListIndex<'v, T> {
    /// Bind the list stored in collection `name` to `view`.
    pub fn new<V: Into<View<'v>>>(name: impl Into<String>, view: V) -> Self {
        ProofListIndex {
            view: view.into(),
            name: name.into(),
            _value: PhantomData,
        }
    }

    /// Collection the list is stored in.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// View the list is bound to.
    pub fn view(&self) -> View<'v> {
        self.view
    }

    /// Number of elements.
    pub fn len(&self) -> CostResult<u64, Error> {
        let mut cost = OperationCost::default();
        let stored = cost_return_on_error!(&mut cost, self.view.get(&self.name, LENGTH_KEY));
        let len = match stored {
            None => 0,
            Some(bytes) => cost_return_on_error_no_add!(&cost, decode_length(&bytes)),
        };
        Ok(len).wrap_with_cost(cost)
    }

    /// `true` if the list has no elements.
    pub fn is_empty(&self) -> CostResult<bool, Error> {
        self.len().map_ok(|len| len == 0)
    }

    /// Element at `index`.
    pub fn get(&self, index: u64) -> CostResult<T, Error> {
        let mut cost = OperationCost::default();
        let len = cost_return_on_error!(&mut cost, self.len());
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len }).wrap_with_cost(cost);
        }
        self.read_element(index).add_cost(cost)
    }

    /// Last element, `None` for an empty list.
    pub fn last(&self) -> CostResult<Option<T>, Error> {
        let mut cost = OperationCost::default();
        let len = cost_return_on_error!(&mut cost, self.len());
        if len == 0 {
            return Ok(None).wrap_with_cost(cost);
        }
        self.read_element(len - 1).map_ok(Some).add_cost(cost)
    }

    /// Append `value` and update the hashes on its path to the root.
    pub fn push(&self, value: T) -> CostResult<(), Error> {
        let mut cost = OperationCost::default();
        let index = cost_return_on_error!(&mut cost, self.len());
        let new_len = cost_return_on_error_no_add!(
            &cost,
            index
                .checked_add(1)
                .ok_or_else(|| Error::CorruptedData("list length overflow".to_owned()))
        );

        let bytes = value.to_bytes();
        cost_return_on_error!(
            &mut cost,
            self.view.put(&self.name, value_key(index), &bytes)
        );

        let mut node = ProofListKey::leaf(index);
        let mut hash = leaf_hash(&bytes);
        cost.hash_node_calls += 1;
        cost_return_on_error!(&mut cost, self.write_node(node, &hash));

        // The new leaf is the last node on every level: right children are
        // combined with their left sibling, left children have no sibling
        // yet and are promoted unchanged.
        for _ in 0..root_level(new_len) {
            if !node.is_left() {
                let left = cost_return_on_error!(&mut cost, self.read_node(node.sibling()));
                hash = branch_hash(&left, &hash);
                cost.hash_node_calls += 1;
            }
            node = node.parent();
            cost_return_on_error!(&mut cost, self.write_node(node, &hash));
        }

        cost_return_on_error!(
            &mut cost,
            self.view
                .put(&self.name, LENGTH_KEY, &new_len.to_be_bytes())
        );
        tracing::trace!(
            target: "proofdb::merkle_list",
            list = %self.name,
            index,
            root = %hash,
            "element appended"
        );
        Ok(()).wrap_with_cost(cost)
    }

    /// Append every value of `values`, in order.
    pub fn extend<I>(&self, values: I) -> CostResult<(), Error>
    where
        I: IntoIterator<Item = T>,
    {
        let mut cost = OperationCost::default();
        for value in values {
            cost_return_on_error!(&mut cost, self.push(value));
        }
        Ok(()).wrap_with_cost(cost)
    }

    /// Remove all elements and tree nodes.
    pub fn clear(&self) -> CostResult<(), Error> {
        self.view.clear(&self.name).map_err(Error::from)
    }

    /// Root hash of the list; all zeros for an empty list.
    pub fn root_hash(&self) -> CostResult<HashCode, Error> {
        let mut cost = OperationCost::default();
        let len = cost_return_on_error!(&mut cost, self.len());
        if len == 0 {
            return Ok(HashCode::zero()).wrap_with_cost(cost);
        }
        self.read_node(ProofListKey::new(root_level(len), 0))
            .add_cost(cost)
    }

    /// Proof for the element at `index`.
    pub fn get_proof(&self, index: u64) -> CostResult<ListProof, Error> {
        let mut cost = OperationCost::default();
        let len = cost_return_on_error!(&mut cost, self.len());
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len }).wrap_with_cost(cost);
        }
        self.build_proof(index, index + 1, len).add_cost(cost)
    }

    /// Proof for the elements `[from, to)`.
    ///
    /// For `from == to` the proof reveals no element and authenticates the
    /// root alone.
    pub fn get_range_proof(&self, from: u64, to: u64) -> CostResult<ListProof, Error> {
        let mut cost = OperationCost::default();
        let len = cost_return_on_error!(&mut cost, self.len());
        if from > to || to > len {
            return Err(Error::InvalidRange { from, to, len }).wrap_with_cost(cost);
        }
        self.build_proof(from, to, len).add_cost(cost)
    }

    /// Iterate over all elements.
    pub fn iter(&self) -> Result<ListIter<'_, 'v, T>, Error> {
        self.iter_from(0)
    }

    /// Iterate over the elements starting at `from`.
    ///
    /// The iterator captures the generation of the view and stops with an
    /// error once the view was modified or disposed.
    pub fn iter_from(&self, from: u64) -> Result<ListIter<'_, 'v, T>, Error> {
        let generation = self.view.generation()?;
        let (len, cost) = {
            let ctx = self.len();
            (ctx.value?, ctx.cost)
        };
        if from > len {
            return Err(Error::InvalidRange {
                from,
                to: len,
                len,
            });
        }
        Ok(ListIter::new(self, from, len, generation, cost))
    }

    pub(crate) fn read_element(&self, index: u64) -> CostResult<T, Error> {
        let mut cost = OperationCost::default();
        let stored = cost_return_on_error!(&mut cost, self.view.get(&self.name, value_key(index)));
        let bytes = cost_return_on_error_no_add!(
            &cost,
            stored.ok_or_else(|| Error::CorruptedData(format!(
                "list {} has no element at index {}",
                self.name, index
            )))
        );
        let value = cost_return_on_error_no_add!(&cost, T::from_bytes(&bytes));
        Ok(value).wrap_with_cost(cost)
    }

    fn read_raw_element(&self, index: u64) -> CostResult<Vec<u8>, Error> {
        let mut cost = OperationCost::default();
        let stored = cost_return_on_error!(&mut cost, self.view.get(&self.name, value_key(index)));
        stored
            .ok_or_else(|| {
                Error::CorruptedData(format!(
                    "list {} has no element at index {}",
                    self.name, index
                ))
            })
            .wrap_with_cost(cost)
    }

    fn read_node(&self, node: ProofListKey) -> CostResult<HashCode, Error> {
        let mut cost = OperationCost::default();
        let stored = cost_return_on_error!(&mut cost, self.view.get(&self.name, node_key(node)));
        let hash = match stored {
            Some(bytes) => HashCode::from_slice(&bytes),
            None => None,
        };
        hash.ok_or_else(|| {
            Error::CorruptedData(format!(
                "list {} has no valid hash for node ({}, {})",
                self.name,
                node.level(),
                node.index()
            ))
        })
        .wrap_with_cost(cost)
    }

    fn write_node(&self, node: ProofListKey, hash: &HashCode) -> CostResult<(), Error> {
        self.view
            .put(&self.name, node_key(node), hash.as_bytes())
            .map_err(Error::from)
    }

    /// Collect `[from, to)` and the hashes of the subtrees bordering it on
    /// every level below the root.
    fn build_proof(&self, from: u64, to: u64, len: u64) -> CostResult<ListProof, Error> {
        let mut cost = OperationCost::default();
        let top = root_level(len);

        let mut entries = Vec::with_capacity((to - from) as usize);
        for index in from..to {
            let bytes = cost_return_on_error!(&mut cost, self.read_raw_element(index));
            entries.push((index, bytes));
        }

        let mut nodes = Vec::new();
        if from == to {
            if len > 0 {
                let root = ProofListKey::new(top, 0);
                let hash = cost_return_on_error!(&mut cost, self.read_node(root));
                nodes.push((root, hash));
            }
        } else {
            let (mut first, mut last) = (from, to - 1);
            for level in 0..top {
                if first & 1 == 1 {
                    let left = ProofListKey::new(level, first - 1);
                    let hash = cost_return_on_error!(&mut cost, self.read_node(left));
                    nodes.push((left, hash));
                }
                if last & 1 == 0 && last + 1 < level_len(len, level) {
                    let right = ProofListKey::new(level, last + 1);
                    let hash = cost_return_on_error!(&mut cost, self.read_node(right));
                    nodes.push((right, hash));
                }
                first >>= 1;
                last >>= 1;
            }
        }

        tracing::trace!(
            target: "proofdb::merkle_list",
            list = %self.name,
            from,
            to,
            length = len,
            nodes = nodes.len(),
            "proof built"
        );
        Ok(ListProof {
            length: len,
            entries,
            nodes,
        })
        .wrap_with_cost(cost)
    }
}

fn decode_length(bytes: &[u8]) -> Result<u64, Error> {
    <[u8; 8]>::try_from(bytes)
        .map(u64::from_be_bytes)
        .map_err(|_| {
            Error::CorruptedData(format!(
                "list length must be 8 bytes, got {}",
                bytes.len()
            ))
        })
}
