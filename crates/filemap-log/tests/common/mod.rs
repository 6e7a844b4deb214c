// Common test utilities for log integration tests

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture that owns a temporary directory holding one log file
pub struct LogTestFixture {
    #[allow(dead_code)]
    pub temp_dir: TempDir,
    pub log_path: PathBuf,
}

impl LogTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log_path = temp_dir.path().join("store.jkv");

        Self { temp_dir, log_path }
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Overwrites the log file with raw contents
    #[allow(dead_code)]
    pub fn write_raw(&self, contents: &[u8]) {
        fs::write(&self.log_path, contents).expect("Failed to write log file");
    }

    /// Appends raw bytes, e.g. to simulate a torn write
    #[allow(dead_code)]
    pub fn append_raw(&self, contents: &[u8]) {
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .expect("Failed to open log file");
        file.write_all(contents).expect("Failed to append");
    }

    #[allow(dead_code)]
    pub fn read_raw(&self) -> String {
        fs::read_to_string(&self.log_path).expect("Failed to read log file")
    }
}

impl Default for LogTestFixture {
    fn default() -> Self {
        Self::new()
    }
}
