//! [`Keyring`]: the primary cipher plus ciphers for retired secrets.

use std::sync::Arc;

use crate::crypto::{has_token_marker, CipherError, FieldCipher, SealedToken};

/// Most retired keys a [`Keyring`] keeps.
///
/// Every retired key is one more AEAD attempt when a token fails to open under
/// the primary. On rotation past this limit the oldest retired key is dropped
/// and tokens only it could open become unreadable; run the migration after
/// each rotation so no row depends on it.
pub const MAX_RETIRED_KEYS: usize = 8;

/// What a stored value turns out to be when checked against a [`Keyring`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// The empty string; never sealed.
    Empty,
    /// No token marker; a value written before encryption was introduced.
    Plaintext,
    /// A token the primary key opens.
    Current,
    /// A token only a retired key opens. Carries the recovered plaintext.
    Retired(String),
    /// Carries the token marker, but no key opens it.
    Unreadable,
}

/// Immutable set of cipher contexts.
///
/// Sealing always uses the primary. Opening tries the primary first, then
/// each retired cipher in order.
#[derive(Debug, Clone)]
pub struct Keyring {
    primary: Arc<FieldCipher>,
    retired: Vec<Arc<FieldCipher>>,
}

impl Keyring {
    /// Create a keyring with no retired keys.
    pub fn new(primary: FieldCipher) -> Self {
        Self {
            primary: Arc::new(primary),
            retired: Vec::new(),
        }
    }

    /// Append a retired cipher, tried after the primary and earlier retirees.
    ///
    /// Once [`MAX_RETIRED_KEYS`] are held, further ciphers are not added.
    pub fn with_retired(mut self, cipher: FieldCipher) -> Self {
        if self.retired.len() < MAX_RETIRED_KEYS {
            self.retired.push(Arc::new(cipher));
        }
        self
    }

    /// Return a keyring with `primary` in front and the current primary demoted
    /// to the head of the retired list. The oldest retired key falls off once
    /// the list exceeds [`MAX_RETIRED_KEYS`].
    pub fn promote(&self, primary: Arc<FieldCipher>) -> Self {
        let mut retired = Vec::with_capacity(MAX_RETIRED_KEYS);
        retired.push(Arc::clone(&self.primary));
        retired.extend(self.retired.iter().take(MAX_RETIRED_KEYS - 1).cloned());
        Self { primary, retired }
    }

    /// Number of retired keys still accepted for opening.
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }

    /// Seal `plaintext` under the primary key.
    pub fn seal(&self, plaintext: &str) -> Result<String, CipherError> {
        self.primary.seal(plaintext)
    }

    /// Open `token` with the first key that authenticates it.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidFormat`] if `token` is not a token,
    /// [`CipherError::AeadFailure`] if no key opens it, and
    /// [`CipherError::NotUtf8`] if it opens to bytes that are not UTF-8.
    pub fn open(&self, token: &str) -> Result<String, CipherError> {
        let parsed = SealedToken::parse(token)?;
        let (bytes, _) = self.open_parsed(&parsed)?;
        String::from_utf8(bytes).map_err(|_| CipherError::NotUtf8)
    }

    /// Classify a stored value without raising.
    pub fn classify(&self, value: &str) -> TokenState {
        if value.is_empty() {
            return TokenState::Empty;
        }
        if !has_token_marker(value) {
            return TokenState::Plaintext;
        }
        let Ok(parsed) = SealedToken::parse(value) else {
            return TokenState::Unreadable;
        };
        match self.open_parsed(&parsed) {
            Ok((_, true)) => TokenState::Current,
            Ok((bytes, false)) => match String::from_utf8(bytes) {
                Ok(plaintext) => TokenState::Retired(plaintext),
                Err(_) => TokenState::Unreadable,
            },
            Err(_) => TokenState::Unreadable,
        }
    }

    /// Returns the plaintext and whether the primary key opened it.
    fn open_parsed(&self, token: &SealedToken) -> Result<(Vec<u8>, bool), CipherError> {
        if let Ok(bytes) = self.primary.open_token(token) {
            return Ok((bytes, true));
        }
        self.retired
            .iter()
            .find_map(|cipher| cipher.open_token(token).ok())
            .map(|bytes| (bytes, false))
            .ok_or(CipherError::AeadFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DerivedKey;

    fn cipher(secret: &str) -> FieldCipher {
        FieldCipher::new(&DerivedKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn opens_with_primary() {
        let ring = Keyring::new(cipher("a"));
        let token = ring.seal("value").unwrap();
        assert_eq!(ring.open(&token).unwrap(), "value");
        assert_eq!(ring.classify(&token), TokenState::Current);
    }

    #[test]
    fn opens_with_retired() {
        let old = Keyring::new(cipher("old"));
        let token = old.seal("value").unwrap();

        let ring = old.promote(Arc::new(cipher("new")));
        assert_eq!(ring.retired_len(), 1);
        assert_eq!(ring.open(&token).unwrap(), "value");
        assert_eq!(ring.classify(&token), TokenState::Retired("value".into()));
    }

    #[test]
    fn with_retired_appends() {
        let token = Keyring::new(cipher("old")).seal("value").unwrap();
        let ring = Keyring::new(cipher("new")).with_retired(cipher("old"));
        assert_eq!(ring.open(&token).unwrap(), "value");
    }

    #[test]
    fn repeated_promotion_keeps_newest_retirees() {
        let first = Keyring::new(cipher("key-0"));
        let oldest = first.seal("oldest").unwrap();
        let mut ring = first;
        for i in 1..=MAX_RETIRED_KEYS {
            ring = ring.promote(Arc::new(cipher(&format!("key-{i}"))));
        }
        assert_eq!(ring.retired_len(), MAX_RETIRED_KEYS);
        assert_eq!(ring.open(&oldest).unwrap(), "oldest");

        let previous = ring.seal("previous").unwrap();
        let ring = ring.promote(Arc::new(cipher("key-next")));
        assert_eq!(ring.retired_len(), MAX_RETIRED_KEYS);
        assert_eq!(ring.classify(&previous), TokenState::Retired("previous".into()));
        assert_eq!(ring.classify(&oldest), TokenState::Unreadable);
    }

    #[test]
    fn with_retired_stops_at_limit() {
        let mut ring = Keyring::new(cipher("primary"));
        for i in 0..MAX_RETIRED_KEYS + 3 {
            ring = ring.with_retired(cipher(&format!("old-{i}")));
        }
        assert_eq!(ring.retired_len(), MAX_RETIRED_KEYS);
    }

    #[test]
    fn unknown_key_is_unreadable() {
        let token = Keyring::new(cipher("other")).seal("value").unwrap();
        let ring = Keyring::new(cipher("a"));
        assert!(matches!(ring.open(&token), Err(CipherError::AeadFailure)));
        assert_eq!(ring.classify(&token), TokenState::Unreadable);
    }

    #[test]
    fn classify_plain_and_empty() {
        let ring = Keyring::new(cipher("a"));
        assert_eq!(ring.classify(""), TokenState::Empty);
        assert_eq!(ring.classify("plain-legacy-text"), TokenState::Plaintext);
        assert_eq!(ring.classify("v1.garbage"), TokenState::Unreadable);
    }

    #[test]
    fn open_rejects_non_token() {
        let ring = Keyring::new(cipher("a"));
        assert!(matches!(
            ring.open("plain-legacy-text"),
            Err(CipherError::InvalidFormat)
        ));
    }
}
