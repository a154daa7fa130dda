//! [`DerivedKey`]: the 32-byte column key derived from the process secret.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use super::KeyError;
use crate::crypto::KEY_LEN;

/// Publicly known secret substituted outside production when none is configured.
///
/// Anything sealed under it is readable by anyone who has seen this source.
pub const INSECURE_DEV_SECRET: &str = "default-insecure-secret-key-for-dev";

/// Deployment name under which a missing secret is fatal.
pub const PRODUCTION: &str = "production";

/// Pick the secret to derive from.
///
/// Returns `configured` when it is non-empty. Otherwise returns
/// [`INSECURE_DEV_SECRET`], unless `environment` is `"production"`.
///
/// # Errors
///
/// Returns [`KeyError::MissingSecret`] if the secret is empty in production.
pub fn resolve_secret<'a>(configured: &'a str, environment: &str) -> Result<&'a str, KeyError> {
    if !configured.is_empty() {
        return Ok(configured);
    }
    if environment == PRODUCTION {
        return Err(KeyError::MissingSecret);
    }
    Ok(INSECURE_DEV_SECRET)
}

/// Fixed-size key derived as `sha256(utf8(secret))`.
///
/// When this type is dropped the key bytes are overwritten with zeroes.
pub struct DerivedKey(Box<[u8; KEY_LEN]>);

impl DerivedKey {
    /// Derive the key for `secret`. Identical secrets always yield identical keys.
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(digest.as_slice());
        Self(buf)
    }

    /// Raw key bytes, as consumed by [`FieldCipher`](crate::crypto::FieldCipher).
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }

    /// URL-safe base64 (padded) form of the key: 44 printable characters.
    ///
    /// This is the interchange format for handing the key to other tooling.
    /// Treat the result as secret.
    pub fn to_urlsafe_base64(&self) -> String {
        URL_SAFE.encode(&self.0[..])
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.0.as_mut_slice().zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_matches_known_vector() {
        let key = DerivedKey::from_secret("test-secret-key");
        assert_eq!(
            key.to_urlsafe_base64(),
            "LOrG82NjxiRqZMyoBc1DynoBsU6y_MUyzuw_YPL33xw="
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = DerivedKey::from_secret("same secret");
        let b = DerivedKey::from_secret("same secret");
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), DerivedKey::from_secret("other").as_bytes());
    }

    #[test]
    fn encoded_key_is_44_chars() {
        let encoded = DerivedKey::from_secret("x").to_urlsafe_base64();
        assert_eq!(encoded.len(), 44);
        assert!(!encoded.contains('+') && !encoded.contains('/'));
    }

    #[test]
    fn configured_secret_wins() {
        assert_eq!(resolve_secret("s3cret", PRODUCTION).unwrap(), "s3cret");
        assert_eq!(resolve_secret("s3cret", "development").unwrap(), "s3cret");
    }

    #[test]
    fn empty_secret_fatal_in_production() {
        assert!(matches!(
            resolve_secret("", PRODUCTION),
            Err(KeyError::MissingSecret)
        ));
    }

    #[test]
    fn empty_secret_falls_back_elsewhere() {
        assert_eq!(resolve_secret("", "development").unwrap(), INSECURE_DEV_SECRET);
        assert_eq!(resolve_secret("", "staging").unwrap(), INSECURE_DEV_SECRET);
        assert_eq!(
            DerivedKey::from_secret(INSECURE_DEV_SECRET).to_urlsafe_base64(),
            "-T1wm7w-0TbWM9K855PMyynEc2diqyTFlojhmPDdTzQ="
        );
    }

    #[test]
    fn debug_is_redacted() {
        let key = DerivedKey::from_secret("test-secret-key");
        assert!(format!("{key:?}").contains("REDACTED"));
    }
}
