//! Key/value codecs.
//!
//! A codec turns keys and values into single-line text tokens and back.
//! Tokens produced for keys must never contain a tab, and no token may
//! contain a newline; the log layer rejects tokens that break this rule.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts typed keys and values to and from text tokens.
///
/// Implementations hold no shared mutable state, so a single value can be
/// used by any number of stores.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a value into a token.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>;

    /// Decodes a token produced by [`Codec::encode`].
    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T>;

    /// Value token that marks a deletion.
    fn tombstone(&self) -> &str;

    /// Returns true if `token` is the deletion marker.
    fn is_tombstone(&self, token: &str) -> bool {
        token == self.tombstone()
    }
}

/// Compact JSON codec.
///
/// JSON escapes control characters inside strings and compact output never
/// emits raw whitespace, so tokens are always single-line and tab-free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        serde_json::from_str(token).map_err(|e| Error::Decode(format!("{}: {}", e, token)))
    }

    fn tombstone(&self) -> &str {
        "null"
    }
}
