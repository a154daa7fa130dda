//! [`KeyManager`]: the injected owner of the current [`Keyring`].

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{info, warn};

use super::derive::{resolve_secret, DerivedKey, INSECURE_DEV_SECRET};
use super::ring::{Keyring, MAX_RETIRED_KEYS};
use super::KeyError;
use crate::config::Config;
use crate::crypto::FieldCipher;

/// Shared handle to the process keyring.
///
/// Built once at startup and cloned into every codec that needs it. Readers
/// take a lock-free snapshot via [`KeyManager::keyring`]; [`KeyManager::rotate`]
/// atomically swaps in a new keyring without blocking them.
#[derive(Clone, Debug)]
pub struct KeyManager {
    inner: Arc<ArcSwap<Keyring>>,
}

impl KeyManager {
    /// Wrap an already-built keyring.
    pub fn new(keyring: Keyring) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(keyring)),
        }
    }

    /// Build the keyring described by `cfg`.
    ///
    /// The primary key comes from `SECRET_KEY` (or the insecure development
    /// fallback outside production); each non-empty `PREVIOUS_SECRET_KEYS`
    /// entry becomes a retired key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingSecret`] if `SECRET_KEY` is empty in production.
    pub fn from_config(cfg: &Config) -> Result<Self, KeyError> {
        let secret = resolve_secret(cfg.secret_key.expose(), &cfg.environment)?;
        if secret == INSECURE_DEV_SECRET {
            warn!(
                environment = %cfg.environment,
                "SECRET_KEY is not set; using the insecure development fallback"
            );
        }

        let mut keyring = Keyring::new(cipher_for(secret)?);
        for previous in cfg.previous_secret_keys.iter().filter(|s| !s.is_empty()) {
            keyring = keyring.with_retired(cipher_for(previous.expose())?);
        }

        info!(retired_keys = keyring.retired_len(), "column keyring initialised");
        Ok(Self::new(keyring))
    }

    /// Build a manager for a single secret with no retired keys.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingSecret`] if `secret` is empty.
    pub fn from_secret(secret: &str) -> Result<Self, KeyError> {
        if secret.is_empty() {
            return Err(KeyError::MissingSecret);
        }
        Ok(Self::new(Keyring::new(cipher_for(secret)?)))
    }

    /// Snapshot of the current keyring.
    ///
    /// The snapshot stays valid (and unchanged) even if a rotation happens
    /// while it is held.
    pub fn keyring(&self) -> Arc<Keyring> {
        self.inner.load_full()
    }

    /// Make `new_secret` the primary key; the previous primary keeps opening
    /// existing tokens as a retired key. If [`MAX_RETIRED_KEYS`] keys were
    /// already retired, the oldest one is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MissingSecret`] if `new_secret` is empty.
    pub fn rotate(&self, new_secret: &str) -> Result<(), KeyError> {
        if new_secret.is_empty() {
            return Err(KeyError::MissingSecret);
        }
        let primary = Arc::new(cipher_for(new_secret)?);
        let previous = self.inner.rcu(|current| current.promote(Arc::clone(&primary)));
        if previous.retired_len() >= MAX_RETIRED_KEYS {
            warn!(
                max_retired_keys = MAX_RETIRED_KEYS,
                "oldest retired column key dropped; tokens only it could open are now unreadable"
            );
        }
        info!(
            retired_keys = self.inner.load().retired_len(),
            "column key rotated"
        );
        Ok(())
    }
}

fn cipher_for(secret: &str) -> Result<FieldCipher, KeyError> {
    Ok(FieldCipher::new(&DerivedKey::from_secret(secret))?)
}
