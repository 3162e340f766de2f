//! Committed state, the change overlay kept by forks, and the layout of
//! entries in the backing store.

use std::{collections::BTreeMap, sync::Arc};

use crate::Error;

type Collection = BTreeMap<Vec<u8>, Vec<u8>>;

/// Size of the collection name length that prefixes every store key.
const NAME_LEN_SIZE: usize = 4;

/// Store key of `key` in `collection`: big-endian name length, name, key.
pub(crate) fn store_key(collection: &str, key: &[u8]) -> Vec<u8> {
    let mut prefixed = Vec::with_capacity(NAME_LEN_SIZE + collection.len() + key.len());
    prefixed.extend_from_slice(&(collection.len() as u32).to_be_bytes());
    prefixed.extend_from_slice(collection.as_bytes());
    prefixed.extend_from_slice(key);
    prefixed
}

/// Inverse of [`store_key`].
pub(crate) fn split_store_key(prefixed: &[u8]) -> Result<(&str, &[u8]), Error> {
    let corrupted =
        || Error::CorruptedData(format!("malformed store key {}", hex::encode(prefixed)));
    if prefixed.len() < NAME_LEN_SIZE {
        return Err(corrupted());
    }
    let (len, rest) = prefixed.split_at(NAME_LEN_SIZE);
    let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
    if rest.len() < len {
        return Err(corrupted());
    }
    let (name, key) = rest.split_at(len);
    let name = std::str::from_utf8(name).map_err(|_| corrupted())?;
    Ok((name, key))
}

/// Committed key-value state, grouped by collection name.
///
/// Collections are shared behind `Arc`s: applying a patch clones only the
/// collections it touches, and only if a snapshot still refers to them.
#[derive(Debug, Default, Clone)]
pub(crate) struct Collections {
    inner: BTreeMap<String, Arc<Collection>>,
}

impl Collections {
    pub(crate) fn get(&self, collection: &str, key: &[u8]) -> Option<&[u8]> {
        self.inner
            .get(collection)
            .and_then(|c| c.get(key))
            .map(Vec::as_slice)
    }

    /// Insert an entry read back from the store.
    pub(crate) fn insert(&mut self, collection: &str, key: Vec<u8>, value: Vec<u8>) {
        Arc::make_mut(self.inner.entry(collection.to_owned()).or_default()).insert(key, value);
    }

    /// Every entry, ordered by collection name, then key.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &[u8], &[u8])> {
        self.inner.iter().flat_map(|(name, collection)| {
            collection
                .iter()
                .map(move |(key, value)| (name.as_str(), key.as_slice(), value.as_slice()))
        })
    }

    /// Number of non-empty collections.
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    /// Apply a fork's changes, returning the number of bytes written.
    ///
    /// Every resulting store write is reported to `sink`, with `None` for a
    /// deletion.
    pub(crate) fn apply(
        &mut self,
        patch: Patch,
        mut sink: impl FnMut(&str, &[u8], Option<&[u8]>),
    ) -> u64 {
        let mut written = 0;
        for (name, changes) in patch.changes {
            let collection = Arc::make_mut(self.inner.entry(name.clone()).or_default());
            if changes.cleared {
                for key in collection.keys() {
                    sink(name.as_str(), key.as_slice(), None);
                }
                collection.clear();
            }
            for (key, value) in changes.data {
                match value {
                    Some(value) => {
                        written += (key.len() + value.len()) as u64;
                        sink(name.as_str(), key.as_slice(), Some(value.as_slice()));
                        collection.insert(key, value);
                    }
                    None => {
                        if collection.remove(&key).is_some() {
                            sink(name.as_str(), key.as_slice(), None);
                        }
                    }
                }
            }
            if collection.is_empty() {
                self.inner.remove(&name);
            }
        }
        written
    }
}

/// Pending changes of a single collection.
#[derive(Debug, Default, Clone)]
struct CollectionChanges {
    cleared: bool,
    /// `None` marks a removal.
    data: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl CollectionChanges {
    fn len(&self) -> usize {
        self.data.len() + usize::from(self.cleared)
    }
}

/// Changes accumulated by a fork, ready to be merged into the database.
#[derive(Debug, Default)]
pub struct Patch {
    changes: BTreeMap<String, CollectionChanges>,
}

impl Patch {
    /// Number of recorded operations.
    pub fn len(&self) -> usize {
        self.changes.values().map(CollectionChanges::len).sum()
    }

    /// `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the collections the patch touches.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }
}

/// Fork resource: committed base plus buffered changes.
#[derive(Debug)]
pub(crate) struct ForkData {
    base: Arc<Collections>,
    patch: Patch,
}

impl ForkData {
    pub(crate) fn new(base: Arc<Collections>) -> Self {
        ForkData {
            base,
            patch: Patch::default(),
        }
    }

    pub(crate) fn get(&self, collection: &str, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(changes) = self.patch.changes.get(collection) {
            if let Some(value) = changes.data.get(key) {
                return value.clone();
            }
            if changes.cleared {
                return None;
            }
        }
        self.base.get(collection, key).map(<[u8]>::to_vec)
    }

    pub(crate) fn put(&mut self, collection: &str, key: Vec<u8>, value: Vec<u8>) {
        self.changes_mut(collection).data.insert(key, Some(value));
    }

    /// Returns the size of the removed value, if there was one.
    pub(crate) fn remove(&mut self, collection: &str, key: &[u8]) -> Option<usize> {
        let previous = self.get(collection, key).map(|v| v.len());
        self.changes_mut(collection).data.insert(key.to_vec(), None);
        previous
    }

    pub(crate) fn clear(&mut self, collection: &str) {
        let changes = self.changes_mut(collection);
        changes.cleared = true;
        changes.data.clear();
    }

    pub(crate) fn take_patch(&mut self) -> Patch {
        std::mem::take(&mut self.patch)
    }

    fn changes_mut(&mut self, collection: &str) -> &mut CollectionChanges {
        self.patch
            .changes
            .entry(collection.to_owned())
            .or_default()
    }
}
