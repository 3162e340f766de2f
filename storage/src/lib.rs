#![deny(missing_docs)]

//! Storage layer for proofdb.
//!
//! A [`Database`] owns the committed key-value state, organised in named
//! collections, either in memory or persisted in RocksDB. Reads and writes
//! go through views:
//!
//! - [`Snapshot`]: immutable, point-in-time read window. Any number of
//!   snapshots may be read concurrently.
//! - [`Fork`]: read-write overlay that buffers uncommitted changes until it
//!   is merged into the database with [`Database::merge`].
//!
//! Every view is backed by a resource registered in the database's
//! [`HandleRegistry`] and owns a generation counter in the
//! [`ModificationTracker`]. A view either owns its resource (and releases it
//! when disposed) or borrows a resource owned by another view.

mod collections;
mod database;
mod error;
mod handle;
mod options;
mod tracker;
mod view;


pub use collections::Patch;
pub use database::Database;
pub use error::Error;
pub use handle::{Handle, HandleRegistry};
pub use options::DatabaseOptions;
pub use proofdb_costs::{CostContext, CostResult, CostsExt, OperationCost};
pub use tracker::{Generation, ModificationTracker, ViewId};
pub use view::{Fork, Ownership, Snapshot, View};
