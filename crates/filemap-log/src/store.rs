//! Replay, append and clear over one log file.
//
// The log store is shared by every map variant:
// 1. Open - create the file if needed and replay every record once
// 2. Append - encode a key/value pair and write it at the end of the file
// 3. Scan - step through the file one line at a time from any offset
// 4. Clear - truncate the file to zero bytes
//
// The store is not synchronized. Map variants keep it behind their own lock.

use crate::accessor::BufferedAccessor;
use crate::record::{self, LineRecord, TERMINATOR};
use crate::{MalformedLinePolicy, StoreConfig, SyncMode};
use filemap_core::{Codec, Error, JsonCodec, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Outcome of replaying a log on open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records handed to the replay callback
    pub records: u64,
    /// Malformed lines skipped under [`MalformedLinePolicy::Skip`]
    pub skipped: u64,
    /// Bytes of an unterminated trailing line removed from the file
    pub torn_bytes: u64,
}

/// One step of a file-order scan
#[derive(Debug)]
pub enum ScanStep {
    /// No complete line starts at the requested offset
    End,
    /// Blank line, comment, or malformed line skipped by policy
    Skipped {
        /// Offset of the following line
        next: u64,
        /// True when the line was malformed rather than inert
        malformed: bool,
    },
    /// A well-formed record
    Record {
        /// Offset where the record's line starts
        offset: u64,
        /// Offset of the following line
        next: u64,
        /// The parsed line
        record: LineRecord,
    },
}

/// Append-only key/value log backed by a single file.
#[derive(Debug)]
pub struct LogStore<C: Codec = JsonCodec> {
    path: PathBuf,
    accessor: Option<BufferedAccessor>,
    codec: C,
    config: StoreConfig,
    /// Records appended since the file was created, rebuilt by replay
    entries_written: u64,
    /// Bumped by every clear so stale scan cursors can tell
    generation: u64,
    replay_stats: ReplayStats,
}

impl<C: Codec> LogStore<C> {
    /// Opens (creating if absent) the log at `path` and replays it.
    ///
    /// `replay` is called once per record, in file order, with the record's
    /// offset. Errors returned by the callback abort the open.
    pub fn open<F>(path: impl AsRef<Path>, config: StoreConfig, codec: C, mut replay: F) -> Result<Self>
    where
        F: FnMut(&C, u64, &LineRecord) -> Result<()>,
    {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let file = Self::open_file(&path, &config)?;
        let accessor = BufferedAccessor::with_buffer_size(file, config.buffer_size)
            .map_err(|e| Error::io("open", e))?;

        debug!(path = %path.display(), bytes = accessor.length(), "opening log");

        let mut store = Self {
            path,
            accessor: Some(accessor),
            codec,
            config,
            entries_written: 0,
            generation: 0,
            replay_stats: ReplayStats::default(),
        };
        store.replay(&mut replay)?;
        Ok(store)
    }

    fn open_file(path: &Path, config: &StoreConfig) -> Result<File> {
        if config.create_dirs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| Error::io("open", e))?;
            }
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io("open", e))
    }

    fn replay<F>(&mut self, replay: &mut F) -> Result<()>
    where
        F: FnMut(&C, u64, &LineRecord) -> Result<()>,
    {
        let mut stats = ReplayStats::default();
        let mut cursor = 0;

        loop {
            match self.scan_from(cursor)? {
                ScanStep::End => break,
                ScanStep::Skipped { next, malformed } => {
                    if malformed {
                        stats.skipped += 1;
                    }
                    cursor = next;
                }
                ScanStep::Record {
                    offset,
                    next,
                    record,
                } => {
                    replay(&self.codec, offset, &record)?;
                    stats.records += 1;
                    cursor = next;
                }
            }
        }

        let accessor = self.accessor_mut()?;
        let length = accessor.length();
        if cursor < length {
            // a crash mid-append left an unterminated line behind
            warn!(offset = cursor, bytes = length - cursor, "truncating torn trailing line");
            accessor
                .truncate(cursor)
                .map_err(|e| Error::io("truncate", e))?;
            stats.torn_bytes = length - cursor;
        }

        self.entries_written = stats.records;
        info!(
            path = %self.path.display(),
            records = stats.records,
            skipped = stats.skipped,
            bytes = cursor,
            "replayed log"
        );
        self.replay_stats = stats;
        Ok(())
    }

    /// Reads the line starting at `offset`.
    ///
    /// Seeking to the offset where the previous step ended reuses the read
    /// buffer, so consecutive steps scan the file without extra syscalls.
    pub fn scan_from(&mut self, offset: u64) -> Result<ScanStep> {
        let policy = self.config.malformed_lines;
        let accessor = self.accessor_mut()?;
        accessor.seek(offset).map_err(|e| Error::io("read", e))?;

        let mut bytes = match accessor
            .read_until(TERMINATOR as u8)
            .map_err(|e| Error::io("read", e))?
        {
            Some(bytes) => bytes,
            None => return Ok(ScanStep::End),
        };
        let next = accessor.pos();
        // hand-edited files may use CRLF endings
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }

        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(_) => return Self::malformed(policy, offset, next, "invalid UTF-8"),
        };
        if record::is_inert(&line) {
            return Ok(ScanStep::Skipped {
                next,
                malformed: false,
            });
        }

        match LineRecord::parse(line) {
            Ok(record) => Ok(ScanStep::Record {
                offset,
                next,
                record,
            }),
            Err(reason) => Self::malformed(policy, offset, next, reason),
        }
    }

    fn malformed(
        policy: MalformedLinePolicy,
        offset: u64,
        next: u64,
        reason: &'static str,
    ) -> Result<ScanStep> {
        match policy {
            MalformedLinePolicy::Skip => {
                warn!(offset, reason, "skipping malformed log line");
                Ok(ScanStep::Skipped {
                    next,
                    malformed: true,
                })
            }
            MalformedLinePolicy::Fail => Err(Error::CorruptLog {
                offset,
                reason: reason.to_string(),
            }),
        }
    }

    /// Reads the record whose line starts at `offset`.
    ///
    /// Returns `None` if no record starts there.
    pub fn record_at(&mut self, offset: u64) -> Result<Option<LineRecord>> {
        match self.scan_from(offset)? {
            ScanStep::Record { record, .. } => Ok(Some(record)),
            ScanStep::Skipped { .. } | ScanStep::End => Ok(None),
        }
    }

    /// Appends a live record and returns the offset its line starts at.
    pub fn write<K, V>(&mut self, key: &K, value: &V) -> Result<u64>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let key_token = self.codec.encode(key)?;
        let value_token = self.codec.encode(value)?;
        if self.codec.is_tombstone(&value_token) {
            return Err(Error::Encode(format!(
                "value for key {} encodes to the tombstone token",
                key_token
            )));
        }
        self.append(&key_token, &value_token)
    }

    /// Appends a tombstone for `key` and returns its offset.
    pub fn write_tombstone<K: Serialize + ?Sized>(&mut self, key: &K) -> Result<u64> {
        let key_token = self.codec.encode(key)?;
        let tombstone = self.codec.tombstone().to_string();
        self.append(&key_token, &tombstone)
    }

    fn append(&mut self, key_token: &str, value_token: &str) -> Result<u64> {
        let line = LineRecord::format(key_token, value_token)?;
        let sync = self.config.sync_mode == SyncMode::Always;
        let accessor = self.accessor_mut()?;

        let offset = accessor.length();
        accessor
            .seek(offset)
            .map_err(|e| Error::io_with_key("append", key_token, e))?;
        if let Err(e) = accessor.write(line.as_bytes()) {
            // cut off whatever part of the line made it to disk
            if let Err(rollback) = accessor.truncate(offset) {
                warn!(offset, error = %rollback, "failed to roll back partial append");
            }
            return Err(Error::io_with_key("append", key_token, e));
        }
        if sync {
            accessor
                .sync()
                .map_err(|e| Error::io_with_key("sync", key_token, e))?;
        }

        self.entries_written += 1;
        trace!(offset, bytes = line.len(), "appended record");
        Ok(offset)
    }

    /// Truncates the log to zero bytes and resets the write counter.
    ///
    /// In-memory state built on top of the log is the caller's to reset.
    pub fn clear(&mut self) -> Result<()> {
        let sync = self.config.sync_mode != SyncMode::None;
        let accessor = self.accessor_mut()?;
        accessor.seek(0).map_err(|e| Error::io("truncate", e))?;
        accessor.truncate(0).map_err(|e| Error::io("truncate", e))?;
        if sync {
            accessor.sync().map_err(|e| Error::io("sync", e))?;
        }
        self.entries_written = 0;
        self.generation += 1;
        debug!(path = %self.path.display(), "cleared log");
        Ok(())
    }

    /// Estimated fraction of records that are obsolete.
    ///
    /// `live` is the number of keys currently present. The result is NaN when
    /// nothing has been written since the file was created or cleared.
    pub fn fragmentation(&self, live: usize) -> f64 {
        1.0 - (live as f64 / self.entries_written as f64)
    }

    /// Current file size in bytes.
    pub fn disk_size(&self) -> Result<u64> {
        Ok(self.accessor()?.length())
    }

    /// Flushes the log file to the storage device.
    pub fn sync(&mut self) -> Result<()> {
        self.accessor_mut()?
            .sync()
            .map_err(|e| Error::io("sync", e))
    }

    /// Releases the file handle. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut accessor) = self.accessor.take() {
            if self.config.sync_mode != SyncMode::None {
                accessor.sync().map_err(|e| Error::io("sync", e))?;
            }
            debug!(path = %self.path.display(), "closed log");
        }
        Ok(())
    }

    /// Fails with [`Error::Closed`] once the store has been closed.
    pub fn ensure_open(&self) -> Result<()> {
        self.accessor().map(|_| ())
    }

    /// Returns true once [`LogStore::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.accessor.is_none()
    }

    /// Records appended since the file was created or last cleared.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Number of clears performed since open.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// What the replay on open found.
    pub fn replay_stats(&self) -> &ReplayStats {
        &self.replay_stats
    }

    /// The codec used for every token in this log.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn accessor(&self) -> Result<&BufferedAccessor> {
        self.accessor.as_ref().ok_or(Error::Closed)
    }

    fn accessor_mut(&mut self) -> Result<&mut BufferedAccessor> {
        self.accessor.as_mut().ok_or(Error::Closed)
    }
}
