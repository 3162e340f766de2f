// MIT LICENSE
//
// Copyright (c) 2021 Dash Core Group
//
// Permission is hereby granted, free of charge, to any
// person obtaining a copy of this software and associated
// documentation files (the "Software"), to deal in the
// Software without restriction, including without
// limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software
// is furnished to do so, subject to the following
// conditions:
//
// The above copyright notice and this permission notice
// shall be included in all copies or substantial portions
// of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF
// ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED
// TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A
// PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
// SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR
// IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Database: committed state, view factory and checkpoints.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use proofdb_costs::{cost_return_on_error_no_add, CostResult, CostsExt, OperationCost};
use rocksdb::{
    checkpoint::Checkpoint, IteratorMode, OptimisticTransactionDB, OptimisticTransactionOptions,
    WriteOptions,
};

use crate::{
    collections::{split_store_key, store_key, Collections, ForkData},
    handle::{HandleRegistry, Resource},
    DatabaseOptions, Error, Fork, ModificationTracker, Snapshot,
};

/// Store writes of one merge: prefixed key and new value, `None` to delete.
type StoreBatch = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// Key-value database handing out snapshots and forks.
///
/// Committed state is only changed by [`merge`](Self::merge). Snapshots taken
/// before a merge keep reading the state they were created from.
///
/// A database opened from a directory is backed by RocksDB: every merge is
/// committed to the store in one transaction before it becomes visible to new
/// views. Views read a copy-on-write image of the committed state loaded on
/// open.
pub struct Database {
    state: RwLock<Arc<Collections>>,
    store: Option<OptimisticTransactionDB>,
    handles: Arc<HandleRegistry>,
    tracker: Arc<ModificationTracker>,
    options: DatabaseOptions,
    path: Option<PathBuf>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("options", &self.options)
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Database {
    /// Empty in-memory database using the process-wide tracker.
    pub fn in_memory() -> Self {
        Self::with_tracker(ModificationTracker::global())
    }

    /// Empty in-memory database registering its views in `tracker`.
    pub fn with_tracker(tracker: Arc<ModificationTracker>) -> Self {
        Database {
            state: RwLock::new(Arc::new(Collections::default())),
            store: None,
            handles: Arc::new(HandleRegistry::default()),
            tracker,
            options: DatabaseOptions::default(),
            path: None,
        }
    }

    /// Open the RocksDB database in directory `path`, using the process-wide
    /// tracker.
    pub fn open<P: AsRef<Path>>(path: P, options: DatabaseOptions) -> Result<Self, Error> {
        Self::open_with_tracker(path, options, ModificationTracker::global())
    }

    /// Open the RocksDB database in directory `path`, registering views in
    /// `tracker`.
    pub fn open_with_tracker<P: AsRef<Path>>(
        path: P,
        options: DatabaseOptions,
        tracker: Arc<ModificationTracker>,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let store = OptimisticTransactionDB::open(&rocksdb_options(options.create_if_missing), path)?;
        let state = load_state(&store)?;
        tracing::debug!(
            target: "proofdb::storage",
            path = %path.display(),
            collections = state.len(),
            "database opened"
        );

        Ok(Database {
            state: RwLock::new(Arc::new(state)),
            store: Some(store),
            handles: Arc::new(HandleRegistry::default()),
            tracker,
            options,
            path: Some(path.to_path_buf()),
        })
    }

    /// Point-in-time read view of the committed state.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read().clone();
        Snapshot::new(
            Resource::Snapshot(state),
            self.handles.clone(),
            self.tracker.clone(),
        )
    }

    /// Read-write view over the committed state.
    pub fn fork(&self) -> Fork {
        let state = self.state.read().clone();
        Fork::new(
            ForkData::new(state),
            self.handles.clone(),
            self.tracker.clone(),
        )
    }

    /// Apply the changes of an owning `fork` to the committed state and
    /// dispose it.
    ///
    /// Changes are applied in one step: readers see either none or all of
    /// them, and a store-backed database commits them before they become
    /// visible. Conflicts between forks are not detected; the last merge
    /// wins. Forks of another database are rejected with
    /// [`Error::ForeignView`].
    pub fn merge(&self, fork: Fork) -> CostResult<(), Error> {
        let cost = OperationCost::default();
        let view = fork.id();
        if !fork.is_from(&self.handles) {
            return Err(Error::ForeignView(view)).wrap_with_cost(cost);
        }
        let patch = cost_return_on_error_no_add!(&cost, fork.into_patch());
        let operations = patch.len();

        let written = {
            let mut state = self.state.write();
            let mut next = Collections::clone(&state);
            let mut batch = StoreBatch::new();
            let written = next.apply(patch, |collection, key, value| {
                batch.push((store_key(collection, key), value.map(<[u8]>::to_vec)));
            });
            if let Some(store) = &self.store {
                cost_return_on_error_no_add!(
                    &cost,
                    commit(store, batch, self.options.sync_writes)
                );
            }
            *state = Arc::new(next);
            written
        };
        tracing::debug!(
            target: "proofdb::storage",
            %view,
            operations,
            written,
            "fork merged"
        );

        Ok(()).wrap_with_cost(OperationCost {
            seek_count: operations as u32,
            storage_written_bytes: written,
            ..Default::default()
        })
    }

    /// Write the committed state as a new RocksDB database at `path`.
    ///
    /// The checkpoint can be opened with [`open`](Self::open). Fails if
    /// `path` already exists.
    pub fn create_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::StorageIo(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        match &self.store {
            Some(store) => Checkpoint::new(store)?.create_checkpoint(path)?,
            None => {
                let target = OptimisticTransactionDB::open(&rocksdb_options(true), path)?;
                let batch = self
                    .state
                    .read()
                    .entries()
                    .map(|(collection, key, value)| {
                        (store_key(collection, key), Some(value.to_vec()))
                    })
                    .collect();
                commit(&target, batch, self.options.sync_writes)?;
                target.flush()?;
            }
        }
        tracing::debug!(
            target: "proofdb::storage",
            path = %path.display(),
            "checkpoint created"
        );
        Ok(())
    }

    /// Flush the store's memtables to disk. Merges are durable without it;
    /// in-memory databases have nothing to flush.
    pub fn flush(&self) -> Result<(), Error> {
        if let Some(store) = &self.store {
            store.flush()?;
        }
        Ok(())
    }

    /// Registry of resources behind this database's views.
    pub fn handles(&self) -> &Arc<HandleRegistry> {
        &self.handles
    }

    /// Tracker this database's views register in.
    pub fn tracker(&self) -> &Arc<ModificationTracker> {
        &self.tracker
    }

    /// Options the database was opened with.
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Directory the database was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn rocksdb_options(create_if_missing: bool) -> rocksdb::Options {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(create_if_missing);
    opts.set_atomic_flush(true);
    opts
}

fn load_state(store: &OptimisticTransactionDB) -> Result<Collections, Error> {
    let mut state = Collections::default();
    for item in store.iterator(IteratorMode::Start) {
        let (prefixed, value) = item?;
        let (collection, key) = split_store_key(&prefixed)?;
        state.insert(collection, key.to_vec(), value.into_vec());
    }
    Ok(state)
}

fn commit(store: &OptimisticTransactionDB, batch: StoreBatch, sync: bool) -> Result<(), Error> {
    let mut write_options = WriteOptions::default();
    write_options.set_sync(sync);
    let transaction = store.transaction_opt(&write_options, &OptimisticTransactionOptions::new());
    for (key, value) in batch {
        match value {
            Some(value) => transaction.put(key, value)?,
            None => transaction.delete(key)?,
        }
    }
    transaction.commit()?;
    Ok(())
}
