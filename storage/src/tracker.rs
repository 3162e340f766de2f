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

//! Per-view modification generations.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::Error;

/// Generation counter value. Starts at zero when a view is registered.
pub type Generation = u64;

/// Process-unique identity of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    pub(crate) fn next() -> Self {
        static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(1);
        ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

lazy_static! {
    static ref GLOBAL_TRACKER: Arc<ModificationTracker> = Arc::new(ModificationTracker::new());
}

/// Generation counters for live views.
///
/// Each mutation through a fork raises the fork's generation by one. Derived
/// objects (iterators, cursors) capture the generation they were created at
/// and refuse to proceed once it moved on, or once the view was removed on
/// disposal. All accesses go through a single lock, so increments, removals
/// and reads from other threads are linearizable.
#[derive(Debug, Default)]
pub struct ModificationTracker {
    generations: Mutex<HashMap<ViewId, Generation>>,
}

impl ModificationTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide tracker used by databases that were not given one.
    pub fn global() -> Arc<Self> {
        GLOBAL_TRACKER.clone()
    }

    pub(crate) fn register(&self, view: ViewId) {
        self.generations.lock().insert(view, 0);
    }

    /// Raise the generation of `view` by one.
    ///
    /// Views that are no longer registered have nothing to invalidate, so
    /// this is a no-op for them.
    pub fn increment(&self, view: ViewId) {
        if let Some(generation) = self.generations.lock().get_mut(&view) {
            *generation += 1;
            tracing::trace!(
                target: "proofdb::tracker",
                %view,
                generation = *generation,
                "generation bumped"
            );
        }
    }

    /// Raise the generation of every view in `views` at once, so no reader
    /// observes some of them bumped and others not.
    pub fn increment_all(&self, views: &[ViewId]) {
        let mut generations = self.generations.lock();
        for view in views {
            if let Some(generation) = generations.get_mut(view) {
                *generation += 1;
                tracing::trace!(
                    target: "proofdb::tracker",
                    %view,
                    generation = *generation,
                    "generation bumped"
                );
            }
        }
    }

    /// Deregister `view`, returning its last generation.
    ///
    /// Each view is removed exactly once; a second removal is reported as
    /// [`Error::ViewNotRegistered`].
    pub fn remove(&self, view: ViewId) -> Result<Generation, Error> {
        self.generations
            .lock()
            .remove(&view)
            .ok_or(Error::ViewNotRegistered(view))
    }

    /// Current generation of `view`, `None` once it was removed.
    pub fn current_generation(&self, view: ViewId) -> Option<Generation> {
        self.generations.lock().get(&view).copied()
    }

    /// `true` if `view` is still registered and has not been modified since
    /// `captured`.
    pub fn is_valid(&self, view: ViewId, captured: Generation) -> bool {
        self.current_generation(view) == Some(captured)
    }

    /// Like [`is_valid`](Self::is_valid), but explains why a cursor became
    /// unusable.
    pub fn check(&self, view: ViewId, captured: Generation) -> Result<(), Error> {
        match self.current_generation(view) {
            None => Err(Error::UseAfterDispose(view)),
            Some(current) if current != captured => Err(Error::StaleGeneration {
                view,
                captured,
                current,
            }),
            Some(_) => Ok(()),
        }
    }

    /// `true` if `view` is registered.
    pub fn is_tracked(&self, view: ViewId) -> bool {
        self.generations.lock().contains_key(&view)
    }

    /// Number of registered views.
    pub fn len(&self) -> usize {
        self.generations.lock().len()
    }

    /// `true` if no view is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
