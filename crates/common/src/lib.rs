//! Shared error types and protocol definitions for `colseal` crates.
//!
//! Kept free of crypto dependencies so that a persistence layer can name the
//! codec's error and summary types without pulling in the cipher stack.

pub mod error;
pub mod protocol;

pub use error::CodecError;
