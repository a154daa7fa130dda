//! Structured logging setup.
//!
//! # Telemetry invariants
//!
//! - **No secret, key material or column value** may appear in any log field.
//!   Columns are identified by path and rows by line number only.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`); `RUST_LOG`
//!   takes precedence when set.

pub mod init;

pub use init::init;
