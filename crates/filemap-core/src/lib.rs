//! # filemap core
//!
//! Error and codec types shared by the filemap crates.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of filemap.**
//!
//! Users should depend on the main `filemap` crate instead, which re-exports
//! everything needed from here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;

pub use codec::{Codec, JsonCodec};
pub use error::{Error, Result};
