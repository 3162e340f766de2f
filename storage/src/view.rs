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

//! Snapshot and fork views.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use proofdb_costs::{cost_return_on_error_no_add, CostResult, CostsExt, OperationCost};

use crate::{
    collections::ForkData,
    handle::{Handle, HandleRegistry, Resource},
    tracker::{Generation, ModificationTracker, ViewId},
    Error, Patch,
};

/// Whether a view releases its resource on disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The view releases the resource when disposed.
    Owning,
    /// The resource belongs to another view; disposal leaves it alone.
    Borrowed,
}

/// State shared by snapshots and forks.
#[derive(Debug)]
struct ViewCore {
    id: ViewId,
    handle: Handle,
    ownership: Ownership,
    handles: Arc<HandleRegistry>,
    tracker: Arc<ModificationTracker>,
    disposed: AtomicBool,
}

impl ViewCore {
    /// Register `resource` and open the view owning it.
    fn owning(
        resource: Resource,
        handles: Arc<HandleRegistry>,
        tracker: Arc<ModificationTracker>,
    ) -> Self {
        let id = ViewId::next();
        let handle = handles.allocate(resource, id);
        Self::open(id, handle, Ownership::Owning, handles, tracker)
    }

    fn borrow(&self) -> Result<ViewCore, Error> {
        self.ensure_open()?;
        let id = ViewId::next();
        self.handles.attach(self.handle, id)?;
        Ok(Self::open(
            id,
            self.handle,
            Ownership::Borrowed,
            self.handles.clone(),
            self.tracker.clone(),
        ))
    }

    fn open(
        id: ViewId,
        handle: Handle,
        ownership: Ownership,
        handles: Arc<HandleRegistry>,
        tracker: Arc<ModificationTracker>,
    ) -> Self {
        tracker.register(id);
        tracing::debug!(target: "proofdb::storage", view = %id, %handle, ?ownership, "view opened");
        ViewCore {
            id,
            handle,
            ownership,
            handles,
            tracker,
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.disposed.load(Ordering::Acquire) {
            Err(Error::UseAfterDispose(self.id))
        } else {
            Ok(())
        }
    }

    fn resource(&self) -> Result<Arc<Resource>, Error> {
        self.ensure_open()?;
        self.handles.resolve(self.handle)
    }

    fn generation(&self) -> Result<Generation, Error> {
        self.ensure_open()?;
        self.tracker
            .current_generation(self.id)
            .ok_or(Error::UseAfterDispose(self.id))
    }

    fn check_generation(&self, captured: Generation) -> Result<(), Error> {
        self.ensure_open()?;
        self.tracker.check(self.id, captured)
    }

    fn get(&self, collection: &str, key: &[u8]) -> CostResult<Option<Vec<u8>>, Error> {
        let cost = OperationCost::default();
        let resource = cost_return_on_error_no_add!(&cost, self.resource());
        resource
            .get(collection, key)
            .wrap_fn_cost(|value| OperationCost::for_read(value.as_ref().map_or(0, Vec::len)))
            .map(Ok)
    }

    /// Deregisters from the tracker and, for owning views, releases the
    /// resource. Both steps run even if the first one fails.
    fn dispose(&self) -> Result<(), Error> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(Error::UseAfterDispose(self.id));
        }
        let deregistered = self.tracker.remove(self.id).map(drop);
        let released = match self.ownership {
            Ownership::Owning => self.handles.free(self.handle).map(drop),
            Ownership::Borrowed => {
                self.handles.detach(self.handle, self.id);
                Ok(())
            }
        };
        tracing::debug!(
            target: "proofdb::storage",
            view = %self.id,
            handle = %self.handle,
            ownership = ?self.ownership,
            "view disposed"
        );
        deregistered.and(released)
    }
}

impl Drop for ViewCore {
    fn drop(&mut self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = self.dispose() {
            tracing::warn!(target: "proofdb::storage", view = %self.id, error = %e, "view disposal failed");
        }
    }
}

macro_rules! impl_view_common {
    ($view:ident) => {
        impl $view {
            /// Identity of this view in the modification tracker.
            pub fn id(&self) -> ViewId {
                self.core.id
            }

            /// Handle of the resource this view reads from.
            pub fn handle(&self) -> Handle {
                self.core.handle
            }

            /// Whether this view releases its resource on disposal.
            pub fn ownership(&self) -> Ownership {
                self.core.ownership
            }

            /// `true` once [`dispose`](Self::dispose) ran.
            pub fn is_disposed(&self) -> bool {
                self.core.disposed.load(Ordering::Acquire)
            }

            /// Current modification generation.
            pub fn generation(&self) -> Result<Generation, Error> {
                self.core.generation()
            }

            /// Read `key` from `collection`.
            pub fn get<K: AsRef<[u8]>>(
                &self,
                collection: &str,
                key: K,
            ) -> CostResult<Option<Vec<u8>>, Error> {
                self.core.get(collection, key.as_ref())
            }

            /// Dispose the view: deregister it from the modification tracker
            /// and release the resource if this view owns it. Any later
            /// operation fails with [`Error::UseAfterDispose`].
            pub fn dispose(&self) -> Result<(), Error> {
                self.core.dispose()
            }
        }
    };
}

/// Immutable read window.
///
/// Owning snapshots read the committed state as of their creation. Borrowed
/// snapshots created with [`Fork::readonly`] read through a fork, including
/// its uncommitted changes.
#[derive(Debug)]
pub struct Snapshot {
    core: ViewCore,
}

impl_view_common!(Snapshot);

impl Snapshot {
    pub(crate) fn new(
        resource: Resource,
        handles: Arc<HandleRegistry>,
        tracker: Arc<ModificationTracker>,
    ) -> Self {
        Snapshot {
            core: ViewCore::owning(resource, handles, tracker),
        }
    }

    /// A non-owning snapshot over the same resource.
    pub fn borrowed(&self) -> Result<Snapshot, Error> {
        Ok(Snapshot {
            core: self.core.borrow()?,
        })
    }
}

/// Read-write overlay over a snapshot of the committed state.
///
/// Changes stay in the fork until it is merged into the database. A fork
/// must not be mutated from several threads at once; serializing writers is
/// up to the transaction manager.
#[derive(Debug)]
pub struct Fork {
    core: ViewCore,
}

impl_view_common!(Fork);

impl Fork {
    pub(crate) fn new(
        data: ForkData,
        handles: Arc<HandleRegistry>,
        tracker: Arc<ModificationTracker>,
    ) -> Self {
        Fork {
            core: ViewCore::owning(
                Resource::Fork(parking_lot::RwLock::new(data)),
                handles,
                tracker,
            ),
        }
    }

    /// A non-owning fork writing to the same changes.
    pub fn borrowed(&self) -> Result<Fork, Error> {
        Ok(Fork {
            core: self.core.borrow()?,
        })
    }

    /// A non-owning, read-only view of this fork's current state.
    ///
    /// Views over the same fork share invalidation: a write through any of
    /// them raises the generation of all of them.
    pub fn readonly(&self) -> Result<Snapshot, Error> {
        Ok(Snapshot {
            core: self.core.borrow()?,
        })
    }

    /// Put `value` under `key` in `collection`.
    pub fn put<K: AsRef<[u8]>>(
        &self,
        collection: &str,
        key: K,
        value: &[u8],
    ) -> CostResult<(), Error> {
        let key = key.as_ref();
        let cost = OperationCost::for_write(key.len(), value.len());
        self.modify(|data| data.put(collection, key.to_vec(), value.to_vec()))
            .wrap_with_cost(cost)
    }

    /// Remove `key` from `collection`.
    pub fn remove<K: AsRef<[u8]>>(&self, collection: &str, key: K) -> CostResult<(), Error> {
        let key = key.as_ref();
        self.modify(|data| data.remove(collection, key))
            .wrap_fn_cost(|removed| OperationCost {
                seek_count: 1,
                storage_freed_bytes: match removed {
                    Ok(Some(len)) => (key.len() + len) as u64,
                    _ => 0,
                },
                ..Default::default()
            })
            .map_ok(drop)
    }

    /// Remove every entry of `collection`.
    pub fn clear(&self, collection: &str) -> CostResult<(), Error> {
        self.modify(|data| data.clear(collection))
            .wrap_with_cost(OperationCost::with_seek_count(1))
    }

    fn modify<R>(&self, f: impl FnOnce(&mut ForkData) -> R) -> Result<R, Error> {
        let resource = self.core.resource()?;
        let result = match resource.as_ref() {
            Resource::Fork(data) => f(&mut data.write()),
            Resource::Snapshot(_) => return Err(Error::ReadOnlyView(self.core.id)),
        };
        // every view over these changes, not just the writer
        let views = self.core.handles.views(self.core.handle);
        self.core.tracker.increment_all(&views);
        Ok(result)
    }

    /// `true` if the fork's resource lives in `handles`.
    pub(crate) fn is_from(&self, handles: &Arc<HandleRegistry>) -> bool {
        Arc::ptr_eq(&self.core.handles, handles)
    }

    /// Take the accumulated changes and dispose the fork.
    pub(crate) fn into_patch(self) -> Result<Patch, Error> {
        if self.core.ownership != Ownership::Owning {
            return Err(Error::NotOwner(self.core.id));
        }
        let resource = self.core.resource()?;
        let patch = match resource.as_ref() {
            Resource::Fork(data) => data.write().take_patch(),
            Resource::Snapshot(_) => return Err(Error::ReadOnlyView(self.core.id)),
        };
        drop(resource);
        self.core.dispose()?;
        Ok(patch)
    }
}

/// A view an index is bound to: either variant, borrowed.
///
/// Reads dispatch to the underlying view; writes succeed only on forks and
/// fail with [`Error::ReadOnlyView`] on snapshots.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
    /// Read-only view.
    Snapshot(&'a Snapshot),
    /// Read-write view.
    Fork(&'a Fork),
}

impl<'a> View<'a> {
    fn core(&self) -> &'a ViewCore {
        match *self {
            View::Snapshot(snapshot) => &snapshot.core,
            View::Fork(fork) => &fork.core,
        }
    }

    /// Identity of the underlying view.
    pub fn id(&self) -> ViewId {
        self.core().id
    }

    /// `true` for snapshots.
    pub fn is_read_only(&self) -> bool {
        matches!(self, View::Snapshot(_))
    }

    /// Current modification generation of the underlying view.
    pub fn generation(&self) -> Result<Generation, Error> {
        self.core().generation()
    }

    /// Dispose the underlying view.
    pub fn dispose(&self) -> Result<(), Error> {
        self.core().dispose()
    }

    /// Fails unless the view is open and still at generation `captured`.
    pub fn check_generation(&self, captured: Generation) -> Result<(), Error> {
        self.core().check_generation(captured)
    }

    /// Read `key` from `collection`.
    pub fn get<K: AsRef<[u8]>>(
        &self,
        collection: &str,
        key: K,
    ) -> CostResult<Option<Vec<u8>>, Error> {
        self.core().get(collection, key.as_ref())
    }

    /// Put `value` under `key`; forks only.
    pub fn put<K: AsRef<[u8]>>(
        &self,
        collection: &str,
        key: K,
        value: &[u8],
    ) -> CostResult<(), Error> {
        match self {
            View::Fork(fork) => fork.put(collection, key, value),
            View::Snapshot(snapshot) => {
                Err(Error::ReadOnlyView(snapshot.id())).wrap_with_cost(Default::default())
            }
        }
    }

    /// Remove `key`; forks only.
    pub fn remove<K: AsRef<[u8]>>(&self, collection: &str, key: K) -> CostResult<(), Error> {
        match self {
            View::Fork(fork) => fork.remove(collection, key),
            View::Snapshot(snapshot) => {
                Err(Error::ReadOnlyView(snapshot.id())).wrap_with_cost(Default::default())
            }
        }
    }

    /// Clear `collection`; forks only.
    pub fn clear(&self, collection: &str) -> CostResult<(), Error> {
        match self {
            View::Fork(fork) => fork.clear(collection),
            View::Snapshot(snapshot) => {
                Err(Error::ReadOnlyView(snapshot.id())).wrap_with_cost(Default::default())
            }
        }
    }
}

impl<'a> From<&'a Snapshot> for View<'a> {
    fn from(snapshot: &'a Snapshot) -> Self {
        View::Snapshot(snapshot)
    }
}

impl<'a> From<&'a Fork> for View<'a> {
    fn from(fork: &'a Fork) -> Self {
        View::Fork(fork)
    }
}
