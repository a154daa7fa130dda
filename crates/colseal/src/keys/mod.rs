//! Column key derivation, keyring, and the injected key manager.
//!
//! # Lifecycle
//!
//! 1. At startup, [`KeyManager::from_config`] derives the primary key from
//!    `SECRET_KEY` as `sha256(secret)` and builds one [`FieldCipher`] for it,
//!    plus one per `PREVIOUS_SECRET_KEYS` entry.
//! 2. The resulting [`Keyring`] is immutable and shared through an `ArcSwap`.
//! 3. Codecs take a snapshot per operation; [`KeyManager::rotate`] publishes a
//!    new keyring whose previous primary is kept for opening old tokens. At
//!    most [`MAX_RETIRED_KEYS`] retired keys are kept; the oldest is dropped
//!    first.
//!
//! # Security invariants
//!
//! - Secrets and derived key bytes are never logged or persisted.
//! - An empty secret is fatal in production. Elsewhere the publicly known
//!   [`INSECURE_DEV_SECRET`] is used and a warning is emitted.
//!
//! [`FieldCipher`]: crate::crypto::FieldCipher

pub mod derive;
pub mod manager;
pub mod ring;

pub use derive::{resolve_secret, DerivedKey, INSECURE_DEV_SECRET, PRODUCTION};
pub use manager::KeyManager;
pub use ring::{Keyring, TokenState, MAX_RETIRED_KEYS};

use common::CodecError;
use thiserror::Error;

use crate::crypto::CipherError;

/// Errors produced by the key layer.
#[derive(Debug, Error)]
pub enum KeyError {
    /// No secret is configured where one is mandatory.
    #[error("SECRET_KEY must be set in production")]
    MissingSecret,

    /// The derived key could not be turned into a cipher context.
    #[error("failed to build cipher: {0}")]
    Cipher(#[from] CipherError),
}

impl From<KeyError> for CodecError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::MissingSecret => CodecError::Config(e.to_string()),
            KeyError::Cipher(_) => CodecError::Internal(e.to_string()),
        }
    }
}
