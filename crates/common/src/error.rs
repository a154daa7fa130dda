//! Common error types shared across crates.

use thiserror::Error;

/// Top-level codec error type.
///
/// Variants map to process exit codes used by the `colseal` binaries
/// (values follow `sysexits.h`):
/// - [`CodecError::Config`] → 78 (`EX_CONFIG`)
/// - [`CodecError::MalformedCiphertext`] → 65 (`EX_DATAERR`)
/// - [`CodecError::EncryptionFailure`] → 70 (`EX_SOFTWARE`)
/// - [`CodecError::Internal`] → 70 (`EX_SOFTWARE`)
#[derive(Debug, Error)]
pub enum CodecError {
    /// The secret or another setting is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Sealing a value failed in the crypto layer.
    #[error("encryption failure: {0}")]
    EncryptionFailure(String),

    /// A value carries the ciphertext marker but no available key opens it.
    ///
    /// Only raised when strict decryption is enabled; the lenient default
    /// returns such values unchanged.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CodecError {
    /// Returns the process exit code that a binary should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            CodecError::Config(_) => 78,
            CodecError::MalformedCiphertext(_) => 65,
            CodecError::EncryptionFailure(_) => 70,
            CodecError::Internal(_) => 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CodecError::Config("x".into()).exit_code(), 78);
        assert_eq!(CodecError::MalformedCiphertext("x".into()).exit_code(), 65);
        assert_eq!(CodecError::EncryptionFailure("x".into()).exit_code(), 70);
        assert_eq!(CodecError::Internal("x".into()).exit_code(), 70);
    }

    #[test]
    fn display_includes_message() {
        let e = CodecError::Config("SECRET_KEY must be set in production".into());
        assert!(e.to_string().contains("SECRET_KEY must be set"));
    }
}
