#![no_main]

use filemap::{CachedStore, IndexedStore, KeyValueStore};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1_000_000 {
        return;
    }
    let Ok(temp_dir) = tempfile::TempDir::new() else {
        return;
    };
    let path = temp_dir.path().join("fuzz.jkv");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    // Replaying arbitrary bytes may fail, but must never panic
    if let Ok(map) = IndexedStore::<String, serde_json::Value>::open(&path) {
        for entry in map.iter() {
            if entry.is_err() {
                break;
            }
        }
        let _ = map.put("fuzz".to_string(), serde_json::Value::from(1));
        let _ = map.close();
    }

    if let Ok(map) = CachedStore::<String, serde_json::Value>::open(&path) {
        let _ = map.len();
        let _ = map.close();
    }
});
