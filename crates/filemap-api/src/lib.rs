//! # filemap
//!
//! Embedded, file-backed key-value maps. Every `put` and `remove` appends one
//! human-readable line to a log file; opening a map replays that log to
//! rebuild its in-memory state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filemap::{CachedStore, KeyValueStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let map: CachedStore<String, u32> = CachedStore::open("./scores.jkv")?;
//!
//!     map.put("alice".to_string(), 42)?;
//!     assert_eq!(map.get(&"alice".to_string())?, Some(42));
//!
//!     map.remove(&"alice".to_string())?;
//!     map.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Map Variants
//!
//! - [`CachedStore`] keeps every key and value in memory. Reads never touch
//!   the file.
//! - [`IndexedStore`] keeps only `key -> offset` in memory and reads values
//!   from the file on demand, so it can hold far more data than fits in RAM.
//!
//! Both variants share the same file format, so a file written by one can be
//! opened by the other.
//!
//! ## Durability
//!
//! Writes go straight to the file with no fsync by default; see
//! [`SyncMode`] to change that. The log only grows: overwritten and removed
//! entries stay on disk until [`KeyValueStore::clear`] truncates the file.
//! [`KeyValueStore::fragmentation`] estimates how much of the file is
//! obsolete.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cached;
pub mod indexed;
pub mod logging;

use std::path::Path;

// Re-export core types
pub use filemap_core::{Codec, Error, JsonCodec, Result};

// Log components
pub use filemap_log::{MalformedLinePolicy, ReplayStats, StoreConfig, SyncMode};

pub use cached::CachedStore;
pub use indexed::{Entries, IndexedStore};

/// Current version of filemap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A keyed map persisted to an append-only log file.
///
/// All methods take `&self`; implementations serialize access with a single
/// lock per store, so a store handle can be shared between threads.
pub trait KeyValueStore<K, V> {
    /// Returns the value stored for `key`.
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Inserts or replaces the value for `key`.
    ///
    /// The record is appended to the file before memory is updated; if the
    /// append fails the map is left untouched.
    fn put(&self, key: K, value: V) -> Result<()>;

    /// Removes `key` by appending a tombstone record.
    fn remove(&self, key: &K) -> Result<()>;

    /// Applies each entry through [`KeyValueStore::put`].
    ///
    /// Not atomic: a failure or crash part-way leaves a prefix applied.
    fn put_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        Self: Sized,
    {
        for (key, value) in entries {
            self.put(key, value)?;
        }
        Ok(())
    }

    /// Returns true if `key` is present.
    fn contains_key(&self, key: &K) -> Result<bool>;

    /// Number of live keys.
    fn len(&self) -> Result<usize>;

    /// Returns true if the map holds no keys.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All live keys, in no particular order.
    fn keys(&self) -> Result<Vec<K>>;

    /// All live values, in no particular order.
    fn values(&self) -> Result<Vec<V>>;

    /// Returns true if some key maps to `value`.
    fn contains_value(&self, value: &V) -> Result<bool>;

    /// All live entries, in no particular order.
    fn entries(&self) -> Result<Vec<(K, V)>>;

    /// Truncates the file and empties the map.
    fn clear(&self) -> Result<()>;

    /// Size of the backing file in bytes.
    fn disk_size(&self) -> Result<u64>;

    /// Estimated fraction of the file taken by obsolete records:
    /// `1 - live keys / records written`. NaN before the first write.
    fn fragmentation(&self) -> Result<f64>;

    /// Forces written records to the storage device.
    fn sync(&self) -> Result<()>;

    /// Path of the backing file.
    fn path(&self) -> &Path;

    /// Releases the file. Every later operation fails with [`Error::Closed`].
    fn close(&self) -> Result<()>;
}
