//! Cursor over list elements.

use proofdb_costs::OperationCost;
use proofdb_storage::Generation;

use crate::{Error, ProofListIndex, StorageValue};

/// Iterator over the elements of a [`ProofListIndex`].
///
/// Created by [`ProofListIndex::iter`] and [`ProofListIndex::iter_from`]. The
/// iterator is bound to the view generation observed at creation: once the
/// view is mutated or disposed, the next call yields the error and the
/// iterator is exhausted.
#[derive(Debug)]
pub struct ListIter<'a, 'v, T> {
    list: &'a ProofListIndex<'v, T>,
    next: u64,
    end: u64,
    generation: Generation,
    cost: OperationCost,
    done: bool,
}

impl<'a, 'v, T: StorageValue> ListIter<'a, 'v, T> {
    pub(crate) fn new(
        list: &'a ProofListIndex<'v, T>,
        from: u64,
        end: u64,
        generation: Generation,
        cost: OperationCost,
    ) -> Self {
        ListIter {
            list,
            next: from,
            end,
            generation,
            cost,
            done: false,
        }
    }

    /// Generation of the view the iterator was created at.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Storage cost accumulated so far.
    pub fn cost(&self) -> OperationCost {
        self.cost
    }
}

impl<T: StorageValue> Iterator for ListIter<'_, '_, T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next >= self.end {
            return None;
        }
        if let Err(e) = self.list.view().check_generation(self.generation) {
            tracing::warn!(
                target: "proofdb::merkle_list",
                list = self.list.name(),
                error = %e,
                "list cursor invalidated"
            );
            self.done = true;
            return Some(Err(e.into()));
        }

        let index = self.next;
        self.next += 1;
        let item = self.list.read_element(index).unwrap_add_cost(&mut self.cost);
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (0, Some(remaining))
    }
}
