//! The column codec: the write/read hooks a persistence layer registers for an
//! encrypted string column.
//!
//! Every write goes through [`ColumnCodec::before_write`] and every read
//! through [`ColumnCodec::after_read`]. `NULL` passes through both untouched,
//! and so does the empty string, so rows written before encryption was
//! introduced keep their meaning.

use common::{protocol::DecryptMode, CodecError};
use tracing::debug;

use crate::crypto::has_token_marker;
use crate::keys::KeyManager;

/// Transform hooks for one column's storage representation.
pub trait ColumnCodec: Send + Sync {
    /// Called just before a value is written. `None` is SQL `NULL`.
    fn before_write(&self, value: Option<&str>) -> Result<Option<String>, CodecError>;

    /// Called just after a value is read. `None` is SQL `NULL`.
    fn after_read(&self, value: Option<&str>) -> Result<Option<String>, CodecError>;
}

/// Stores the value exactly as given. For columns that are not encrypted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainString;

impl ColumnCodec for PlainString {
    fn before_write(&self, value: Option<&str>) -> Result<Option<String>, CodecError> {
        Ok(value.map(str::to_owned))
    }

    fn after_read(&self, value: Option<&str>) -> Result<Option<String>, CodecError> {
        Ok(value.map(str::to_owned))
    }
}

/// Encrypted string column type.
///
/// Holds no key material of its own; each call takes a snapshot of the
/// injected [`KeyManager`]'s keyring.
#[derive(Debug, Clone)]
pub struct EncryptedString {
    keys: KeyManager,
    mode: DecryptMode,
}

impl EncryptedString {
    /// Encrypted column with lenient decryption.
    pub fn new(keys: KeyManager) -> Self {
        Self::with_mode(keys, DecryptMode::Lenient)
    }

    /// Encrypted column with an explicit [`DecryptMode`].
    pub fn with_mode(keys: KeyManager, mode: DecryptMode) -> Self {
        Self { keys, mode }
    }

    /// The configured decrypt mode.
    pub fn mode(&self) -> DecryptMode {
        self.mode
    }

    /// Seal `value` under the primary key. The empty string is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::EncryptionFailure`] if the AEAD layer fails, which
    /// does not happen with a valid key.
    pub fn encrypt(&self, value: &str) -> Result<String, CodecError> {
        if value.is_empty() {
            return Ok(String::new());
        }
        self.keys
            .keyring()
            .seal(value)
            .map_err(|e| CodecError::EncryptionFailure(e.to_string()))
    }

    /// Open `value` if it is a token any configured key opens.
    ///
    /// The empty string is returned as is. Anything that does not open is
    /// returned exactly as stored, unless the codec is strict and the value
    /// carries the token marker.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedCiphertext`] only in
    /// [`DecryptMode::Strict`].
    pub fn decrypt(&self, value: &str) -> Result<String, CodecError> {
        if value.is_empty() {
            return Ok(String::new());
        }
        match self.keys.keyring().open(value) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) if has_token_marker(value) => match self.mode {
                DecryptMode::Strict => Err(CodecError::MalformedCiphertext(e.to_string())),
                DecryptMode::Lenient => {
                    debug!(error = %e, "token did not open; returning value as stored");
                    Ok(value.to_owned())
                }
            },
            Err(_) => Ok(value.to_owned()),
        }
    }
}

impl ColumnCodec for EncryptedString {
    fn before_write(&self, value: Option<&str>) -> Result<Option<String>, CodecError> {
        value.map(|v| self.encrypt(v)).transpose()
    }

    fn after_read(&self, value: Option<&str>) -> Result<Option<String>, CodecError> {
        value.map(|v| self.decrypt(v)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> EncryptedString {
        EncryptedString::new(KeyManager::from_secret("test-secret-key").unwrap())
    }

    fn strict() -> EncryptedString {
        EncryptedString::with_mode(
            KeyManager::from_secret("test-secret-key").unwrap(),
            DecryptMode::Strict,
        )
    }

    #[test]
    fn round_trip() {
        let c = codec();
        let token = c.encrypt("sk-abcdef1234567890").unwrap();
        assert!(token.len() > "sk-abcdef1234567890".len());
        assert_eq!(c.decrypt(&token).unwrap(), "sk-abcdef1234567890");
    }

    #[test]
    fn repeated_encryptions_differ() {
        let c = codec();
        assert_ne!(c.encrypt("same").unwrap(), c.encrypt("same").unwrap());
    }

    #[test]
    fn empty_string_passthrough() {
        let c = codec();
        assert_eq!(c.encrypt("").unwrap(), "");
        assert_eq!(c.decrypt("").unwrap(), "");
        assert_eq!(strict().decrypt("").unwrap(), "");
    }

    #[test]
    fn legacy_plaintext_passthrough() {
        assert_eq!(codec().decrypt("plain-legacy-text").unwrap(), "plain-legacy-text");
        assert_eq!(strict().decrypt("plain-legacy-text").unwrap(), "plain-legacy-text");
    }

    #[test]
    fn foreign_token_passthrough_when_lenient() {
        let other = EncryptedString::new(KeyManager::from_secret("other").unwrap());
        let token = other.encrypt("value").unwrap();
        assert_eq!(codec().decrypt(&token).unwrap(), token);
    }

    #[test]
    fn strict_raises_on_corrupt_token() {
        let s = strict();
        let token = s.encrypt("value").unwrap();
        let last = if token.ends_with('A') { 'B' } else { 'A' };
        let corrupted = format!("{}{last}", &token[..token.len() - 1]);
        assert!(matches!(
            s.decrypt(&corrupted),
            Err(CodecError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            s.decrypt("v1.not-a-token"),
            Err(CodecError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn null_passes_through_hooks() {
        let c = codec();
        assert_eq!(c.before_write(None).unwrap(), None);
        assert_eq!(c.after_read(None).unwrap(), None);
    }

    #[test]
    fn hooks_round_trip() {
        let c = codec();
        let stored = c.before_write(Some("secret")).unwrap().unwrap();
        assert_ne!(stored, "secret");
        assert_eq!(c.after_read(Some(&stored)).unwrap().as_deref(), Some("secret"));
    }

    #[test]
    fn plain_codec_is_identity() {
        assert_eq!(PlainString.before_write(Some("x")).unwrap().as_deref(), Some("x"));
        assert_eq!(PlainString.after_read(None).unwrap(), None);
    }

    #[test]
    fn default_mode_is_lenient() {
        assert_eq!(codec().mode(), DecryptMode::Lenient);
        assert_eq!(strict().mode(), DecryptMode::Strict);
    }
}
