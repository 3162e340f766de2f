//! Native resources behind views and the registry that owns them.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;

use crate::{
    collections::{Collections, ForkData},
    Error, ViewId,
};

/// Opaque reference to a resource registered in a [`HandleRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", hex::encode(self.0.to_be_bytes()))
    }
}

/// The state a view reads from (and, for forks, writes to).
#[derive(Debug)]
pub(crate) enum Resource {
    Snapshot(Arc<Collections>),
    Fork(RwLock<ForkData>),
}

impl Resource {
    pub(crate) fn get(&self, collection: &str, key: &[u8]) -> Option<Vec<u8>> {
        match self {
            Resource::Snapshot(state) => state.get(collection, key).map(<[u8]>::to_vec),
            Resource::Fork(data) => data.read().get(collection, key),
        }
    }
}

#[derive(Debug)]
struct Entry {
    resource: Arc<Resource>,
    /// Open views reading this resource, owner included.
    views: Vec<ViewId>,
}

/// Registry of live view resources.
///
/// A resource stays live until its owning view releases it. Views that borrow
/// a resource look it up by handle on every access, so a borrowed view whose
/// owner is gone fails with [`Error::HandleNotLive`] instead of reaching
/// released state.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    next: AtomicU64,
    live: RwLock<HashMap<Handle, Entry>>,
    released: AtomicU64,
}

impl HandleRegistry {
    /// Register `resource`, owned by `owner`.
    pub(crate) fn allocate(&self, resource: Resource, owner: ViewId) -> Handle {
        let handle = Handle(self.next.fetch_add(1, Ordering::Relaxed));
        self.live.write().insert(
            handle,
            Entry {
                resource: Arc::new(resource),
                views: vec![owner],
            },
        );
        handle
    }

    pub(crate) fn resolve(&self, handle: Handle) -> Result<Arc<Resource>, Error> {
        self.live
            .read()
            .get(&handle)
            .map(|entry| entry.resource.clone())
            .ok_or(Error::HandleNotLive(handle))
    }

    /// Record `view` as a reader of the resource behind `handle`.
    pub(crate) fn attach(&self, handle: Handle, view: ViewId) -> Result<(), Error> {
        let mut live = self.live.write();
        let entry = live.get_mut(&handle).ok_or(Error::HandleNotLive(handle))?;
        entry.views.push(view);
        Ok(())
    }

    /// Forget `view`. A no-op once the resource is released.
    pub(crate) fn detach(&self, handle: Handle, view: ViewId) {
        if let Some(entry) = self.live.write().get_mut(&handle) {
            entry.views.retain(|v| *v != view);
        }
    }

    /// Views currently reading the resource behind `handle`.
    pub fn views(&self, handle: Handle) -> Vec<ViewId> {
        self.live
            .read()
            .get(&handle)
            .map(|entry| entry.views.clone())
            .unwrap_or_default()
    }

    /// Release the resource behind `handle`. Releasing twice is an error.
    pub(crate) fn free(&self, handle: Handle) -> Result<Arc<Resource>, Error> {
        let entry = self
            .live
            .write()
            .remove(&handle)
            .ok_or(Error::HandleNotLive(handle))?;
        self.released.fetch_add(1, Ordering::Relaxed);
        Ok(entry.resource)
    }

    /// `true` if `handle` refers to a resource that was not released yet.
    pub fn is_live(&self, handle: Handle) -> bool {
        self.live.read().contains_key(&handle)
    }

    /// Number of live resources.
    pub fn live_count(&self) -> usize {
        self.live.read().len()
    }

    /// Number of resources released so far.
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }
}
