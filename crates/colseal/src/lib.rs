//! `colseal` — transparent encryption for persisted string columns.
//!
//! A process secret is hashed into a 32-byte key ([`keys`]), the key drives an
//! AES-256-GCM-SIV context ([`crypto`]), and [`codec::EncryptedString`] exposes
//! it to a persistence layer as a pair of write/read hooks. [`row`] applies a
//! codec to configured columns of JSON rows, and [`migrate`] backfills stored
//! rows onto the current key.
//!
//! ```no_run
//! use colseal::{codec::{ColumnCodec, EncryptedString}, config::Config, keys::KeyManager};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cfg = Config::from_env()?;
//! let keys = KeyManager::from_config(&cfg)?;
//! let api_key = EncryptedString::with_mode(keys, cfg.decrypt_mode);
//!
//! let stored = api_key.before_write(Some("sk-abcdef1234567890"))?;
//! let loaded = api_key.after_read(stored.as_deref())?;
//! assert_eq!(loaded.as_deref(), Some("sk-abcdef1234567890"));
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod keys;
pub mod migrate;
pub mod row;
pub mod telemetry;

pub use codec::{ColumnCodec, EncryptedString, PlainString};
pub use config::Config;
pub use keys::KeyManager;
pub use row::{ColumnPath, RowCodec};
