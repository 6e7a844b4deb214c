// Common test utilities for map integration tests

use filemap::{CachedStore, IndexedStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Structured value type used across the map tests
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub owner: String,
    pub balance: i64,
    pub tags: Vec<String>,
}

#[allow(dead_code)]
impl Account {
    pub fn new(owner: &str, balance: i64) -> Self {
        Self {
            owner: owner.to_string(),
            balance,
            tags: Vec::new(),
        }
    }
}

/// Test fixture that owns a temporary directory holding one map file
pub struct MapTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub map_path: PathBuf,
}

impl MapTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let map_path = temp_dir.path().join("map.jkv");

        Self { temp_dir, map_path }
    }

    #[allow(dead_code)]
    pub fn cached<V>(&self) -> CachedStore<String, V>
    where
        V: Serialize + serde::de::DeserializeOwned,
    {
        CachedStore::open(&self.map_path).expect("Failed to open cached map")
    }

    #[allow(dead_code)]
    pub fn indexed<V>(&self) -> IndexedStore<String, V>
    where
        V: Serialize + serde::de::DeserializeOwned,
    {
        IndexedStore::open(&self.map_path).expect("Failed to open indexed map")
    }

    #[allow(dead_code)]
    pub fn file_len(&self) -> u64 {
        fs::metadata(&self.map_path)
            .expect("Failed to stat map file")
            .len()
    }

    #[allow(dead_code)]
    pub fn read_raw(&self) -> String {
        fs::read_to_string(&self.map_path).expect("Failed to read map file")
    }

    /// Appends raw bytes, e.g. to simulate a torn write
    #[allow(dead_code)]
    pub fn append_raw(&self, contents: &[u8]) {
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.map_path)
            .expect("Failed to open map file");
        file.write_all(contents).expect("Failed to append");
    }
}

impl Default for MapTestFixture {
    fn default() -> Self {
        Self::new()
    }
}
