//! Storage errors

use crate::{Generation, Handle, ViewId};

/// Storage and view lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The view was disposed and can no longer be used
    #[error("{0} used after disposal")]
    UseAfterDispose(ViewId),
    /// A cursor captured a generation that the view has since moved past
    #[error("{view} was modified at generation {current}, cursor captured {captured}")]
    StaleGeneration {
        /// View the cursor was derived from
        view: ViewId,
        /// Generation observed when the cursor was created
        captured: Generation,
        /// Generation of the view now
        current: Generation,
    },
    /// Write attempted through a read-only view
    #[error("{0} is read-only")]
    ReadOnlyView(ViewId),
    /// The tracker has no generation for this view
    #[error("{0} is not registered in the modification tracker")]
    ViewNotRegistered(ViewId),
    /// The native resource behind a handle is already released
    #[error("{0} is not live")]
    HandleNotLive(Handle),
    /// Only the owning view may hand its changes over
    #[error("{0} does not own its resource")]
    NotOwner(ViewId),
    /// The fork was created by another database
    #[error("{0} belongs to another database")]
    ForeignView(ViewId),
    /// Rocks DB error
    #[error("rocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    /// Filesystem precondition of a checkpoint failed
    #[error("storage io error: {0}")]
    StorageIo(#[from] std::io::Error),
    /// Persisted data could not be decoded
    #[error("data corruption error: {0}")]
    CorruptedData(String),
}
