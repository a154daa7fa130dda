//! AES-256-GCM-SIV encryption and decryption of column values.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant,
//! so an accidental nonce repeat leaks only plaintext equality instead of the
//! key stream. A fresh random nonce is still drawn for every value, which makes
//! two seals of the same plaintext differ.

use aes_gcm_siv::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

use crate::keys::DerivedKey;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Version tag that appears at the start of every token.
pub const VERSION_PREFIX: &str = "v1";

/// Returns `true` if `value` starts with the token marker (`v1.`).
///
/// A `true` result says nothing about whether the token is well formed.
pub fn has_token_marker(value: &str) -> bool {
    value
        .strip_prefix(VERSION_PREFIX)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// A parsed, sealed column value.
///
/// The string representation is `v1.<base64url(nonce)>.<base64url(ciphertext+tag)>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedToken {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl SealedToken {
    /// Encode this value to its canonical string representation.
    pub fn to_string_repr(&self) -> String {
        format!(
            "{}.{}.{}",
            VERSION_PREFIX,
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        )
    }

    /// Parse a token string back into a [`SealedToken`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidFormat`] if the string does not match the
    /// expected `v1.<nonce>.<ciphertext>` structure.
    pub fn parse(s: &str) -> Result<Self, CipherError> {
        let parts: Vec<&str> = s.splitn(3, '.').collect();
        if parts.len() != 3 || parts[0] != VERSION_PREFIX {
            return Err(CipherError::InvalidFormat);
        }
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| CipherError::InvalidFormat)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CipherError::InvalidFormat);
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&nonce_bytes);

        let ciphertext = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| CipherError::InvalidFormat)?;

        Ok(Self { nonce, ciphertext })
    }
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The token string does not match the expected format.
    #[error("invalid token format")]
    InvalidFormat,

    /// The token opened but its plaintext is not valid UTF-8.
    #[error("decrypted value is not valid UTF-8")]
    NotUtf8,
}

/// A ready-to-use AEAD context built from one key.
///
/// Construct once and share; the context is immutable and `Send + Sync`.
pub struct FieldCipher {
    aead: Aes256GcmSiv,
}

impl FieldCipher {
    /// Build a cipher context from a [`DerivedKey`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if the key does not decode to
    /// [`KEY_LEN`] bytes.
    pub fn new(key: &DerivedKey) -> Result<Self, CipherError> {
        Self::from_key_bytes(key.as_bytes())
    }

    /// Build a cipher context directly from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength);
        }
        let aead = Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?;
        Ok(Self { aead })
    }

    /// Seal `plaintext` under a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::AeadFailure`] on an internal AEAD error (should be
    /// unreachable with a valid key and nonce).
    pub fn seal_bytes(&self, plaintext: &[u8]) -> Result<SealedToken, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .aead
            .encrypt(nonce, plaintext)
            .map_err(|_| CipherError::AeadFailure)?;

        Ok(SealedToken {
            nonce: nonce_bytes,
            ciphertext,
        })
    }

    /// Open a parsed [`SealedToken`] back to plaintext bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key or
    /// tampered data).
    pub fn open_token(&self, token: &SealedToken) -> Result<Vec<u8>, CipherError> {
        let nonce = Nonce::from_slice(&token.nonce);
        self.aead
            .decrypt(nonce, token.ciphertext.as_ref())
            .map_err(|_| CipherError::AeadFailure)
    }

    /// Seal a string and return its printable token.
    pub fn seal(&self, plaintext: &str) -> Result<String, CipherError> {
        Ok(self.seal_bytes(plaintext.as_bytes())?.to_string_repr())
    }

    /// Parse and open a printable token.
    pub fn open(&self, token: &str) -> Result<String, CipherError> {
        let parsed = SealedToken::parse(token)?;
        let bytes = self.open_token(&parsed)?;
        String::from_utf8(bytes).map_err(|_| CipherError::NotUtf8)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipher([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_cipher() -> FieldCipher {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        FieldCipher::from_key_bytes(&key).unwrap()
    }

    #[test]
    fn seal_open_round_trip() {
        let cipher = random_cipher();
        let token = cipher.seal("sk-abcdef1234567890").unwrap();
        assert_eq!(cipher.open(&token).unwrap(), "sk-abcdef1234567890");
    }

    #[test]
    fn repeated_seals_differ() {
        let cipher = random_cipher();
        let a = cipher.seal("same").unwrap();
        let b = cipher.seal("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let token = random_cipher().seal("secret").unwrap();
        assert!(matches!(
            random_cipher().open(&token),
            Err(CipherError::AeadFailure)
        ));
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            FieldCipher::from_key_bytes(&[0u8; 16]),
            Err(CipherError::InvalidKeyLength)
        ));
    }

    #[test]
    fn string_repr_round_trip() {
        let cipher = random_cipher();
        let sealed = cipher.seal_bytes(b"hello").unwrap();
        let s = sealed.to_string_repr();
        assert!(s.starts_with("v1."));
        let parsed = SealedToken::parse(&s).unwrap();
        assert_eq!(parsed, sealed);
    }

    #[test]
    fn parse_rejects_bad_prefix() {
        assert!(SealedToken::parse("v2.abc.def").is_err());
    }

    #[test]
    fn parse_rejects_too_few_parts() {
        assert!(SealedToken::parse("v1.abc").is_err());
    }

    #[test]
    fn parse_rejects_bad_base64() {
        assert!(SealedToken::parse("v1.!!!.abc").is_err());
    }

    #[test]
    fn parse_rejects_short_nonce() {
        assert!(SealedToken::parse("v1.AAAA.AAAA").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let cipher = random_cipher();
        let mut sealed = cipher.seal_bytes(b"tamper me").unwrap();
        sealed.ciphertext[0] ^= 0xFF;
        assert!(cipher.open_token(&sealed).is_err());
    }

    #[test]
    fn non_utf8_plaintext_reported() {
        let cipher = random_cipher();
        let token = cipher.seal_bytes(&[0xff, 0xfe]).unwrap().to_string_repr();
        assert!(matches!(cipher.open(&token), Err(CipherError::NotUtf8)));
    }

    #[test]
    fn token_marker_detection() {
        assert!(has_token_marker("v1.abc.def"));
        assert!(has_token_marker("v1."));
        assert!(!has_token_marker("v1"));
        assert!(!has_token_marker("v10.abc"));
        assert!(!has_token_marker("plain-legacy-text"));
        assert!(!has_token_marker(""));
    }

    #[test]
    fn debug_is_redacted() {
        assert_eq!(format!("{:?}", random_cipher()), "FieldCipher([REDACTED])");
    }
}
