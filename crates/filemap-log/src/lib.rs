//! # filemap log
//!
//! The append-only line log underneath every filemap store.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of filemap.**
//!
//! Users should depend on the main `filemap` crate instead, which provides
//! the stable public API.
//!
//! ## File Format
//!
//! ```text
//! <keyToken>\t<valueToken>\n
//! <keyToken>\t<valueToken>\n
//! # comment lines and blank lines are ignored
//! <keyToken>\tnull\n              <- tombstone
//! ```
//!
//! The file only grows. A record's offset is the byte position where its
//! line starts and stays valid until the log is cleared.

#![warn(missing_docs)]
#![warn(clippy::all)]

use filemap_core::{Error, Result};

pub mod accessor;
pub mod record;
pub mod store;

pub use accessor::{BufferedAccessor, DEFAULT_BUFFER_SIZE};
pub use record::LineRecord;
pub use store::{LogStore, ReplayStats, ScanStep};

/// Log store configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// When to fsync the log file
    pub sync_mode: SyncMode,
    /// What replay does with lines that are not valid records
    pub malformed_lines: MalformedLinePolicy,
    /// Chunk size of the accessor's read buffer
    pub buffer_size: usize,
    /// Create missing parent directories on open
    pub create_dirs: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::None,
            malformed_lines: MalformedLinePolicy::Skip,
            buffer_size: DEFAULT_BUFFER_SIZE,
            create_dirs: true,
        }
    }
}

impl StoreConfig {
    /// Set the sync mode
    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    /// Set the malformed line policy
    pub fn with_malformed_lines(mut self, policy: MalformedLinePolicy) -> Self {
        self.malformed_lines = policy;
        self
    }

    /// Set the read buffer chunk size
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Enable or disable creation of missing parent directories
    pub fn with_create_dirs(mut self, create: bool) -> Self {
        self.create_dirs = create;
        self
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sync mode for log writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Never fsync; durability is whatever the OS page cache provides
    None,
    /// fsync after every append (strongest durability)
    Always,
    /// fsync on close and after clear
    OnClose,
}

/// Replay behaviour for lines without a usable tab separator or with invalid UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedLinePolicy {
    /// Log a warning and continue; the line is not counted as a record
    Skip,
    /// Fail the open with [`Error::CorruptLog`]
    Fail,
}
