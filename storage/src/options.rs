//! Database options

/// Options used when opening a [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DatabaseOptions {
    /// Create the database directory if it does not exist.
    pub create_if_missing: bool,
    /// Sync the write-ahead log before a merge returns.
    pub sync_writes: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        DatabaseOptions {
            create_if_missing: true,
            sync_writes: true,
        }
    }
}

impl DatabaseOptions {
    /// Fail on open if the database directory is missing.
    pub fn must_exist(mut self) -> Self {
        self.create_if_missing = false;
        self
    }

    /// Let merges return before the write-ahead log reaches the disk.
    pub fn without_sync(mut self) -> Self {
        self.sync_writes = false;
        self
    }
}
