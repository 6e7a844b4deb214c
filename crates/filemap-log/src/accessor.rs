//! Line-oriented and offset-oriented access to one file.
//
// The accessor handles:
// 1. Position and length bookkeeping without asking the OS on every call
// 2. Delimiter scanning over a buffer that grows chunk by chunk, so a
//    multi-byte character split across two reads is never cut in half
// 3. Writes and truncation that keep the buffer and counters consistent

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Default read chunk size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Buffered random-access view of a single file.
///
/// `pos`, `length` and `is_eof` are answered from counters; only `seek` to a
/// different position, buffer refills, writes and truncation reach the OS.
/// The accessor is not synchronized; callers share it behind one lock.
#[derive(Debug)]
pub struct BufferedAccessor {
    file: File,
    /// OS cursor position: the offset just past the last buffered byte
    file_pos: u64,
    /// Tracked file length
    length: u64,
    /// Bytes read from the file, ending at `file_pos`
    buffer: Vec<u8>,
    /// Next unconsumed byte in `buffer`
    buffer_pos: usize,
    chunk_size: usize,
}

impl BufferedAccessor {
    /// Wraps `file` using the default chunk size.
    pub fn new(file: File) -> io::Result<Self> {
        Self::with_buffer_size(file, DEFAULT_BUFFER_SIZE)
    }

    /// Wraps `file` reading `chunk_size` bytes per refill.
    pub fn with_buffer_size(mut file: File, chunk_size: usize) -> io::Result<Self> {
        let length = file.metadata()?.len();
        let file_pos = file.stream_position()?;
        Ok(Self {
            file,
            file_pos,
            length,
            buffer: Vec::with_capacity(chunk_size),
            buffer_pos: 0,
            chunk_size: chunk_size.max(1),
        })
    }

    /// Logical position: the offset of the next byte a read would return.
    pub fn pos(&self) -> u64 {
        self.file_pos - (self.buffer.len() - self.buffer_pos) as u64
    }

    /// Tracked file length.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Returns true when no bytes remain after the logical position.
    pub fn is_eof(&self) -> bool {
        self.pos() >= self.length
    }

    /// Moves the logical position to `offset`.
    ///
    /// Seeking to the current position is a no-op and keeps buffered bytes.
    pub fn seek(&mut self, offset: u64) -> io::Result<()> {
        if offset == self.pos() {
            return Ok(());
        }
        self.clear_buffer();
        self.file.seek(SeekFrom::Start(offset))?;
        self.file_pos = offset;
        Ok(())
    }

    /// Reads up to (not including) the next `delimiter` and consumes it.
    ///
    /// Returns `None` at end of file. Bytes after the last delimiter form an
    /// incomplete record: they are not returned and the position is left at
    /// their start.
    pub fn read_until(&mut self, delimiter: u8) -> io::Result<Option<Vec<u8>>> {
        match self.find(delimiter)? {
            Some(end) => {
                let bytes = self.buffer[self.buffer_pos..end].to_vec();
                self.buffer_pos = end + 1;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    /// Reads the next `\n`-terminated line as UTF-8, without the newline.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.read_until(b'\n')? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            None => Ok(None),
        }
    }

    /// Advances past the next `delimiter` without copying the skipped bytes.
    ///
    /// Returns false if the end of file was reached first; the position is
    /// then the end of file.
    pub fn skip_until(&mut self, delimiter: u8) -> io::Result<bool> {
        loop {
            if self.buffer_pos == self.buffer.len() {
                self.clear_buffer();
                if self.extend_buffer()? == 0 {
                    return Ok(false);
                }
            }
            let unread = &self.buffer[self.buffer_pos..];
            match unread.iter().position(|&b| b == delimiter) {
                Some(i) => {
                    self.buffer_pos += i + 1;
                    return Ok(true);
                }
                None => self.buffer_pos = self.buffer.len(),
            }
        }
    }

    /// Writes `bytes` at the logical position.
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.discard_buffer()?;
        if let Err(e) = self.file.write_all(bytes) {
            // a partial write moved the OS cursor by an unknown amount
            self.file_pos = self.file.stream_position()?;
            self.length = self.length.max(self.file_pos);
            return Err(e);
        }
        self.file_pos += bytes.len() as u64;
        if self.length < self.file_pos {
            self.length = self.file_pos;
        }
        Ok(())
    }

    /// Sets the file length to `len`, clamping the position if needed.
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.discard_buffer()?;
        self.file.set_len(len)?;
        self.length = len;
        if self.file_pos > len {
            self.file.seek(SeekFrom::Start(len))?;
            self.file_pos = len;
        }
        Ok(())
    }

    /// Flushes file data to the storage device.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    /// Number of buffered bytes not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.buffer_pos
    }

    /// Index of the next `delimiter` in the buffer, reading more chunks
    /// onto the end of the buffer until one shows up or the file ends.
    fn find(&mut self, delimiter: u8) -> io::Result<Option<usize>> {
        self.compact();
        let mut from = self.buffer_pos;
        loop {
            if let Some(i) = self.buffer[from..].iter().position(|&b| b == delimiter) {
                return Ok(Some(from + i));
            }
            from = self.buffer.len();
            if self.extend_buffer()? == 0 {
                return Ok(None);
            }
        }
    }

    /// Drops consumed bytes once a long line has grown the buffer.
    fn compact(&mut self) {
        if self.buffer_pos == self.buffer.len() {
            self.clear_buffer();
        } else if self.buffer_pos > 0 && self.buffer.len() > self.chunk_size {
            self.buffer.drain(..self.buffer_pos);
            self.buffer_pos = 0;
        }
    }

    /// Appends up to one chunk from the file to the buffer.
    ///
    /// Never reads past the tracked length. Returns the number of bytes added;
    /// a short count means the end of the data was reached.
    fn extend_buffer(&mut self) -> io::Result<usize> {
        let remaining = self.length.saturating_sub(self.file_pos);
        let want = (self.chunk_size as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }

        let start = self.buffer.len();
        self.buffer.resize(start + want, 0);
        let mut filled = 0;
        let result = loop {
            if filled == want {
                break Ok(());
            }
            match self.file.read(&mut self.buffer[start + filled..]) {
                Ok(0) => break Ok(()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.buffer.truncate(start + filled);
        self.file_pos += filled as u64;
        result.map(|_| filled)
    }

    /// Puts the OS cursor back at the logical position and empties the buffer.
    fn discard_buffer(&mut self) -> io::Result<()> {
        let pos = self.pos();
        self.clear_buffer();
        if pos != self.file_pos {
            self.file.seek(SeekFrom::Start(pos))?;
            self.file_pos = pos;
        }
        Ok(())
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.buffer_pos = 0;
    }
}
