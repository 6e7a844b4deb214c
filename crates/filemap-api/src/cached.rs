//! Fully cached map.
//!
//! Keys and values live in a `HashMap`; the file is only a replay log for
//! crash recovery and is never read after open.

use crate::KeyValueStore;
use filemap_core::{Codec, Error, JsonCodec, Result};
use filemap_log::{LogStore, ReplayStats, StoreConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A map held entirely in memory and persisted to an append-only log.
///
/// Cloning the handle is cheap; clones share the same map and file.
///
/// # Examples
///
/// ```rust,no_run
/// use filemap::{CachedStore, KeyValueStore};
///
/// let map: CachedStore<String, String> = CachedStore::open("./cache.jkv")?;
/// map.put("greeting".to_string(), "hello".to_string())?;
/// drop(map);
///
/// // the log is replayed on open
/// let map: CachedStore<String, String> = CachedStore::open("./cache.jkv")?;
/// assert_eq!(map.get(&"greeting".to_string())?, Some("hello".to_string()));
/// # Ok::<(), filemap::Error>(())
/// ```
pub struct CachedStore<K, V, C: Codec = JsonCodec> {
    inner: Arc<Mutex<CachedInner<K, V, C>>>,
    path: PathBuf,
}

struct CachedInner<K, V, C: Codec> {
    log: LogStore<C>,
    cache: HashMap<K, V>,
}

impl<K, V> CachedStore<K, V>
where
    K: Serialize + DeserializeOwned + Eq + Hash,
    V: Serialize + DeserializeOwned,
{
    /// Opens or creates the map at `path` with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens or creates the map at `path` with a custom configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Self::with_codec(path, config, JsonCodec)
    }
}

impl<K, V, C> CachedStore<K, V, C>
where
    K: Serialize + DeserializeOwned + Eq + Hash,
    V: Serialize + DeserializeOwned,
    C: Codec,
{
    /// Opens or creates the map at `path` using `codec` for every token.
    ///
    /// Replay decodes both key and value of every record; a token the codec
    /// rejects fails the open with [`Error::Decode`].
    pub fn with_codec(path: impl AsRef<Path>, config: StoreConfig, codec: C) -> Result<Self> {
        let mut cache: HashMap<K, V> = HashMap::new();
        let log = LogStore::open(path, config, codec, |codec, _, record| {
            let key: K = record.decode_key(codec)?;
            match record.decode_value(codec)? {
                Some(value) => {
                    cache.insert(key, value);
                }
                None => {
                    cache.remove(&key);
                }
            }
            Ok(())
        })?;

        debug!(path = %log.path().display(), keys = cache.len(), "cached store ready");
        let path = log.path().to_path_buf();
        Ok(Self {
            inner: Arc::new(Mutex::new(CachedInner { log, cache })),
            path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, CachedInner<K, V, C>>> {
        self.inner.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Records appended since the file was created or last cleared.
    pub fn entries_written(&self) -> Result<u64> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.log.entries_written())
    }

    /// What the replay on open found.
    pub fn replay_stats(&self) -> Result<ReplayStats> {
        Ok(self.lock()?.log.replay_stats().clone())
    }
}

impl<K, V, C> KeyValueStore<K, V> for CachedStore<K, V, C>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned + Clone + PartialEq,
    C: Codec,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.cache.get(key).cloned())
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        let mut inner = self.lock()?;
        inner.log.write(&key, &value)?;
        inner.cache.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<()> {
        let mut inner = self.lock()?;
        inner.log.write_tombstone(key)?;
        inner.cache.remove(key);
        Ok(())
    }

    fn contains_key(&self, key: &K) -> Result<bool> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.cache.contains_key(key))
    }

    fn len(&self) -> Result<usize> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.cache.len())
    }

    fn keys(&self) -> Result<Vec<K>> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.cache.keys().cloned().collect())
    }

    fn values(&self) -> Result<Vec<V>> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.cache.values().cloned().collect())
    }

    fn contains_value(&self, value: &V) -> Result<bool> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.cache.values().any(|v| v == value))
    }

    fn entries(&self) -> Result<Vec<(K, V)>> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner
            .cache
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.log.clear()?;
        inner.cache.clear();
        Ok(())
    }

    fn disk_size(&self) -> Result<u64> {
        self.lock()?.log.disk_size()
    }

    fn fragmentation(&self) -> Result<f64> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.log.fragmentation(inner.cache.len()))
    }

    fn sync(&self) -> Result<()> {
        self.lock()?.log.sync()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn close(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.log.close()?;
        inner.cache = HashMap::new();
        Ok(())
    }
}

impl<K, V, C: Codec> Clone for CachedStore<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            path: self.path.clone(),
        }
    }
}

impl<K, V, C: Codec> std::fmt::Debug for CachedStore<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
