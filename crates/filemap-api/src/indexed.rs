//! Offset-indexed map.
//!
//! Only keys are kept in memory, each mapped to the offset of its latest
//! record. Values are read back from the file on every `get`, which lets the
//! map hold far more data than fits in memory.
//!
//! Value enumeration is a capability gap of this variant: [`values`],
//! [`contains_value`] and [`entries`] fail with [`Error::NotSupported`].
//! Use [`IndexedStore::iter`] to walk the live entries in file order, or a
//! [`CachedStore`](crate::CachedStore) when those operations are needed.
//!
//! [`values`]: KeyValueStore::values
//! [`contains_value`]: KeyValueStore::contains_value
//! [`entries`]: KeyValueStore::entries

use crate::KeyValueStore;
use filemap_core::{Codec, Error, JsonCodec, Result};
use filemap_log::{LogStore, ReplayStats, ScanStep, StoreConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A map that keeps `key -> offset` in memory and values on disk.
///
/// Cloning the handle is cheap; clones share the same index and file.
pub struct IndexedStore<K, V, C: Codec = JsonCodec> {
    inner: Arc<Mutex<IndexedInner<K, C>>>,
    path: PathBuf,
    _value: PhantomData<fn() -> V>,
}

struct IndexedInner<K, C: Codec> {
    log: LogStore<C>,
    /// Latest record offset per live key
    offsets: HashMap<K, u64>,
}

impl<K, V> IndexedStore<K, V>
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

impl<K, V, C> IndexedStore<K, V, C>
where
    K: Serialize + DeserializeOwned + Eq + Hash,
    V: Serialize + DeserializeOwned,
    C: Codec,
{
    /// Opens or creates the map at `path` using `codec` for every token.
    ///
    /// Replay decodes keys only; values are not looked at until read.
    pub fn with_codec(path: impl AsRef<Path>, config: StoreConfig, codec: C) -> Result<Self> {
        let mut offsets: HashMap<K, u64> = HashMap::new();
        let log = LogStore::open(path, config, codec, |codec, offset, record| {
            let key: K = record.decode_key(codec)?;
            if record.is_tombstone(codec) {
                offsets.remove(&key);
            } else {
                offsets.insert(key, offset);
            }
            Ok(())
        })?;

        debug!(path = %log.path().display(), keys = offsets.len(), "indexed store ready");
        let path = log.path().to_path_buf();
        Ok(Self {
            inner: Arc::new(Mutex::new(IndexedInner { log, offsets })),
            path,
            _value: PhantomData,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexedInner<K, C>>> {
        self.inner.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Offset of the record currently holding `key`'s value.
    pub fn offset_of(&self, key: &K) -> Result<Option<u64>> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.offsets.get(key).copied())
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

    /// Walks the live entries in file order.
    ///
    /// Each call starts a fresh scan from offset 0. Records whose offset no
    /// longer matches the index (overwritten or removed keys) are skipped.
    /// The store lock is taken once per line, so writers are not blocked for
    /// the whole scan; writes that land ahead of the cursor are observed.
    /// A `clear` during iteration ends it.
    pub fn iter(&self) -> Entries<K, V, C> {
        Entries {
            inner: Arc::clone(&self.inner),
            cursor: 0,
            generation: None,
            done: false,
            _value: PhantomData,
        }
    }
}

impl<K, V, C> KeyValueStore<K, V> for IndexedStore<K, V, C>
where
    K: Serialize + DeserializeOwned + Eq + Hash + Clone,
    V: Serialize + DeserializeOwned,
    C: Codec,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        let mut inner = self.lock()?;
        inner.log.ensure_open()?;
        let offset = match inner.offsets.get(key) {
            Some(offset) => *offset,
            None => return Ok(None),
        };

        // seek and read under the same guard
        match inner.log.record_at(offset)? {
            Some(record) => record.decode_value(inner.log.codec()),
            None => Err(Error::CorruptLog {
                offset,
                reason: "indexed record is missing".to_string(),
            }),
        }
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        let mut inner = self.lock()?;
        let offset = inner.log.write(&key, &value)?;
        inner.offsets.insert(key, offset);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<()> {
        let mut inner = self.lock()?;
        inner.log.write_tombstone(key)?;
        inner.offsets.remove(key);
        Ok(())
    }

    fn contains_key(&self, key: &K) -> Result<bool> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.offsets.contains_key(key))
    }

    fn len(&self) -> Result<usize> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.offsets.len())
    }

    fn keys(&self) -> Result<Vec<K>> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.offsets.keys().cloned().collect())
    }

    fn values(&self) -> Result<Vec<V>> {
        Err(Error::NotSupported("values"))
    }

    fn contains_value(&self, _value: &V) -> Result<bool> {
        Err(Error::NotSupported("contains_value"))
    }

    fn entries(&self) -> Result<Vec<(K, V)>> {
        Err(Error::NotSupported("entries"))
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.log.clear()?;
        inner.offsets.clear();
        Ok(())
    }

    fn disk_size(&self) -> Result<u64> {
        self.lock()?.log.disk_size()
    }

    fn fragmentation(&self) -> Result<f64> {
        let inner = self.lock()?;
        inner.log.ensure_open()?;
        Ok(inner.log.fragmentation(inner.offsets.len()))
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
        inner.offsets = HashMap::new();
        Ok(())
    }
}

impl<K, V, C: Codec> Clone for IndexedStore<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            path: self.path.clone(),
            _value: PhantomData,
        }
    }
}

impl<K, V, C: Codec> std::fmt::Debug for IndexedStore<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Lazy file-order iterator over the live entries of an [`IndexedStore`].
///
/// Created by [`IndexedStore::iter`]. Yields `Err` once and then stops if a
/// read or decode fails.
pub struct Entries<K, V, C: Codec = JsonCodec> {
    inner: Arc<Mutex<IndexedInner<K, C>>>,
    /// Offset of the next line to visit
    cursor: u64,
    /// Log generation seen on the first step
    generation: Option<u64>,
    done: bool,
    _value: PhantomData<fn() -> V>,
}

enum Step<K, V> {
    End,
    Obsolete,
    Live(K, V),
}

impl<K, V, C> Entries<K, V, C>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
    C: Codec,
{
    /// Visits one line under the store lock.
    fn step(&mut self) -> Result<Step<K, V>> {
        let mut guard = self.inner.lock().map_err(|_| Error::LockPoisoned)?;
        let inner = &mut *guard;

        let generation = inner.log.generation();
        match self.generation {
            None => self.generation = Some(generation),
            Some(seen) if seen != generation => return Ok(Step::End),
            Some(_) => {}
        }

        match inner.log.scan_from(self.cursor)? {
            ScanStep::End => Ok(Step::End),
            ScanStep::Skipped { next, .. } => {
                self.cursor = next;
                Ok(Step::Obsolete)
            }
            ScanStep::Record {
                offset,
                next,
                record,
            } => {
                self.cursor = next;
                let codec = inner.log.codec();
                let key: K = record.decode_key(codec)?;
                if inner.offsets.get(&key) != Some(&offset) {
                    return Ok(Step::Obsolete);
                }
                match record.decode_value(codec)? {
                    Some(value) => Ok(Step::Live(key, value)),
                    None => Ok(Step::Obsolete),
                }
            }
        }
    }
}

impl<K, V, C> Iterator for Entries<K, V, C>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
    C: Codec,
{
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.step() {
                Ok(Step::Live(key, value)) => return Some(Ok((key, value))),
                Ok(Step::Obsolete) => continue,
                Ok(Step::End) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl<K, V, C: Codec> std::iter::FusedIterator for Entries<K, V, C>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_store() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("indexed.jkv");
        (temp_dir, path)
    }

    fn collect_sorted(map: &IndexedStore<String, u32>) -> Vec<(String, u32)> {
        let mut entries: Vec<_> = map
            .iter()
            .collect::<Result<Vec<_>>>()
            .expect("Iteration failed");
        entries.sort();
        entries
    }

    #[test]
    fn test_get_reads_value_from_file() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, String> = IndexedStore::open(&path).unwrap();

        map.put("k".to_string(), "v1".to_string()).unwrap();
        map.put("other".to_string(), "x".to_string()).unwrap();
        map.put("k".to_string(), "v2".to_string()).unwrap();

        assert_eq!(map.get(&"k".to_string()).unwrap(), Some("v2".to_string()));
        assert_eq!(map.get(&"missing".to_string()).unwrap(), None);
        assert_eq!(map.len().unwrap(), 2);
    }

    #[test]
    fn test_offsets_point_at_latest_record() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();

        map.put("a".to_string(), 1).unwrap();
        assert_eq!(map.offset_of(&"a".to_string()).unwrap(), Some(0));

        map.put("a".to_string(), 2).unwrap();
        assert_eq!(
            map.offset_of(&"a".to_string()).unwrap(),
            Some("\"a\"\t1\n".len() as u64)
        );

        map.remove(&"a".to_string()).unwrap();
        assert_eq!(map.offset_of(&"a".to_string()).unwrap(), None);
    }

    #[test]
    fn test_iter_skips_obsolete_records() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();

        map.put("a".to_string(), 1).unwrap();
        map.put("a".to_string(), 2).unwrap();
        map.put("b".to_string(), 3).unwrap();

        assert_eq!(
            collect_sorted(&map),
            vec![("a".to_string(), 2), ("b".to_string(), 3)]
        );
    }

    #[test]
    fn test_iter_skips_removed_keys() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();

        map.put("a".to_string(), 1).unwrap();
        map.put("b".to_string(), 2).unwrap();
        map.remove(&"a".to_string()).unwrap();

        assert_eq!(collect_sorted(&map), vec![("b".to_string(), 2)]);
    }

    #[test]
    fn test_iter_is_restartable() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        for i in 0..10 {
            map.put(format!("k{}", i), i).unwrap();
        }

        assert_eq!(map.iter().count(), 10);
        assert_eq!(map.iter().count(), 10);
    }

    #[test]
    fn test_iter_sees_writes_ahead_of_cursor() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        map.put("a".to_string(), 1).unwrap();
        map.put("b".to_string(), 2).unwrap();

        let mut iter = map.iter();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first, ("a".to_string(), 1));

        // overwrite b (behind the cursor its old record becomes obsolete)
        // and add c after the cursor
        map.put("b".to_string(), 20).unwrap();
        map.put("c".to_string(), 3).unwrap();

        let rest: Vec<_> = iter.map(|e| e.unwrap()).collect();
        assert_eq!(rest, vec![("b".to_string(), 20), ("c".to_string(), 3)]);
    }

    #[test]
    fn test_iter_interleaved_with_get() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        for i in 0..20 {
            map.put(format!("k{:02}", i), i).unwrap();
        }

        let mut seen = 0;
        for entry in map.iter() {
            let (key, value) = entry.unwrap();
            // moves the shared accessor somewhere else between steps
            assert_eq!(map.get(&"k00".to_string()).unwrap(), Some(0));
            assert_eq!(map.get(&key).unwrap(), Some(value));
            seen += 1;
        }
        assert_eq!(seen, 20);
    }

    #[test]
    fn test_clear_ends_iteration() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        map.put("a".to_string(), 1).unwrap();
        map.put("b".to_string(), 2).unwrap();

        let mut iter = map.iter();
        assert!(iter.next().is_some());
        map.clear().unwrap();
        map.put("c".to_string(), 3).unwrap();
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_value_enumeration_not_supported() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        map.put("a".to_string(), 1).unwrap();

        assert!(matches!(map.values(), Err(Error::NotSupported(_))));
        assert!(matches!(
            map.contains_value(&1),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(map.entries(), Err(Error::NotSupported(_))));
    }

    #[test]
    fn test_decode_failure_surfaces_on_get() {
        let (_temp_dir, path) = setup_test_store();
        std::fs::write(&path, "\"a\"\t\"not a number\"\n").unwrap();

        // replay only decodes keys, so the open succeeds
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        assert!(matches!(map.get(&"a".to_string()), Err(Error::Decode(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_append_leaves_index_untouched() {
        // every write to /dev/full fails with ENOSPC
        let map: IndexedStore<String, u32> = IndexedStore::open("/dev/full").unwrap();

        assert!(matches!(
            map.put("k".to_string(), 1),
            Err(Error::Io { op: "append", key: Some(_), .. })
        ));
        assert_eq!(map.get(&"k".to_string()).unwrap(), None);
        assert_eq!(map.offset_of(&"k".to_string()).unwrap(), None);
        assert_eq!(map.entries_written().unwrap(), 0);

        assert!(matches!(
            map.remove(&"k".to_string()),
            Err(Error::Io { op: "append", key: Some(_), .. })
        ));
        assert_eq!(map.entries_written().unwrap(), 0);
        assert_eq!(map.len().unwrap(), 0);
    }

    #[test]
    fn test_get_after_external_truncation() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        map.put("a".to_string(), 1).unwrap();
        map.put("b".to_string(), 2).unwrap();

        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .expect("Failed to open map file");
        file.set_len(0).expect("Failed to truncate map file");

        match map.get(&"a".to_string()) {
            Err(Error::CorruptLog { offset, .. }) => assert_eq!(offset, 0),
            other => panic!("expected CorruptLog, got {:?}", other),
        }
    }

    #[test]
    fn test_closed_store() {
        let (_temp_dir, path) = setup_test_store();
        let map: IndexedStore<String, u32> = IndexedStore::open(&path).unwrap();
        map.put("a".to_string(), 1).unwrap();
        let mut iter = map.iter();
        map.close().unwrap();

        assert!(matches!(map.get(&"a".to_string()), Err(Error::Closed)));
        assert!(matches!(map.remove(&"a".to_string()), Err(Error::Closed)));
        assert!(matches!(map.disk_size(), Err(Error::Closed)));
        assert!(matches!(iter.next(), Some(Err(Error::Closed))));
        assert!(iter.next().is_none());
    }
}
