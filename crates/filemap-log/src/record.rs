//! The on-disk shape of one key/value record.
//
// Record format (UTF-8, one per line):
// ┌────────────┬─────┬──────────────┬─────┐
// │ key token  │ \t  │ value token  │ \n  │
// └────────────┴─────┴──────────────┴─────┘
//
// Blank lines and lines starting with '#' are inert and never indexed.

use filemap_core::{Codec, Error, Result};
use serde::de::DeserializeOwned;

/// Separates the key token from the value token
pub const SEPARATOR: char = '\t';

/// Terminates every record
pub const TERMINATOR: char = '\n';

/// Lines starting with this character are comments
pub const COMMENT_PREFIX: char = '#';

/// Returns true for lines replay and iteration must ignore.
pub fn is_inert(line: &str) -> bool {
    line.is_empty() || line.starts_with(COMMENT_PREFIX)
}

/// A parsed record line, holding the raw tokens undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    line: String,
    tab: usize,
}

impl LineRecord {
    /// Splits `line` (without its newline) on the first tab.
    ///
    /// Fails with a short reason when the tab is missing or the key token is
    /// empty.
    pub fn parse(line: String) -> std::result::Result<Self, &'static str> {
        match line.find(SEPARATOR) {
            Some(0) => Err("empty key token"),
            Some(tab) => Ok(Self { line, tab }),
            None => Err("missing tab separator"),
        }
    }

    /// Builds the full line, newline included, for a key and value token.
    pub fn format(key_token: &str, value_token: &str) -> Result<String> {
        if key_token.is_empty() {
            return Err(Error::Encode("key encodes to an empty token".to_string()));
        }
        if key_token.contains([SEPARATOR, TERMINATOR]) {
            return Err(Error::Encode(format!(
                "key token contains a tab or newline: {:?}",
                key_token
            )));
        }
        if value_token.contains(TERMINATOR) {
            return Err(Error::Encode(format!(
                "value token contains a newline: {:?}",
                value_token
            )));
        }

        let mut line = String::with_capacity(key_token.len() + value_token.len() + 2);
        line.push_str(key_token);
        line.push(SEPARATOR);
        line.push_str(value_token);
        line.push(TERMINATOR);
        Ok(line)
    }

    /// The encoded key.
    pub fn key_token(&self) -> &str {
        &self.line[..self.tab]
    }

    /// The encoded value.
    pub fn value_token(&self) -> &str {
        &self.line[self.tab + 1..]
    }

    /// Whether this record marks its key as deleted.
    pub fn is_tombstone<C: Codec>(&self, codec: &C) -> bool {
        codec.is_tombstone(self.value_token())
    }

    /// Decodes only the key.
    pub fn decode_key<K: DeserializeOwned, C: Codec>(&self, codec: &C) -> Result<K> {
        codec.decode(self.key_token())
    }

    /// Decodes only the value; tombstones decode to `None`.
    pub fn decode_value<V: DeserializeOwned, C: Codec>(&self, codec: &C) -> Result<Option<V>> {
        if self.is_tombstone(codec) {
            return Ok(None);
        }
        codec.decode(self.value_token()).map(Some)
    }

    /// The raw line without its newline.
    pub fn as_str(&self) -> &str {
        &self.line
    }
}
