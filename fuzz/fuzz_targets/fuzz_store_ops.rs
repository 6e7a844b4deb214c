#![no_main]

use arbitrary::Arbitrary;
use filemap::{IndexedStore, KeyValueStore};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

#[derive(Arbitrary, Debug)]
enum MapOp {
    Put { key: String, value: String },
    Get { key: String },
    Remove { key: String },
    Reopen,
}

fuzz_target!(|ops: Vec<MapOp>| {
    let Ok(temp_dir) = tempfile::TempDir::new() else {
        return;
    };
    let path = temp_dir.path().join("fuzz.jkv");
    let mut map: IndexedStore<String, String> =
        IndexedStore::open(&path).expect("Failed to open map");
    let mut model: HashMap<String, String> = HashMap::new();

    // Limit operations to prevent timeout
    for op in ops.into_iter().take(100) {
        match op {
            MapOp::Put { key, value } => {
                if key.len() <= 1024 && value.len() <= 1024 {
                    map.put(key.clone(), value.clone()).expect("Failed to put");
                    model.insert(key, value);
                }
            }
            MapOp::Get { key } => {
                assert_eq!(map.get(&key).expect("Failed to get"), model.get(&key).cloned());
            }
            MapOp::Remove { key } => {
                map.remove(&key).expect("Failed to remove");
                model.remove(&key);
            }
            MapOp::Reopen => {
                map.close().expect("Failed to close");
                map = IndexedStore::open(&path).expect("Failed to reopen");
            }
        }
    }

    assert_eq!(map.len().expect("Failed to count"), model.len());
});
