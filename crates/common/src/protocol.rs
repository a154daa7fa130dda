//! Types exchanged between the codec and the programs that drive it.
//!
//! These types are serialised as JSON: [`DecryptMode`] is read from
//! configuration and [`MigrationSummary`] is emitted by the migration tool.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Decrypt mode
// ---------------------------------------------------------------------------

/// How the read path treats values that cannot be decrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecryptMode {
    /// Any value that does not open is returned exactly as stored.
    ///
    /// Legacy plaintext rows keep working, but a corrupted token is
    /// indistinguishable from plaintext.
    #[default]
    Lenient,
    /// Values carrying the ciphertext marker must open; failures are errors.
    /// Values without the marker are still treated as legacy plaintext.
    Strict,
}

// ---------------------------------------------------------------------------
// Migration summary
// ---------------------------------------------------------------------------

/// Counters reported at the end of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// Input lines read, including rejected ones.
    pub rows_read: usize,
    /// Rows in which at least one value was rewritten.
    pub rows_changed: usize,
    /// Legacy plaintext values that were encrypted.
    pub fields_encrypted: usize,
    /// Tokens sealed under a retired secret that were re-sealed.
    pub fields_rekeyed: usize,
    /// Values already sealed under the current secret, or empty.
    pub fields_unchanged: usize,
    /// Values that carry the ciphertext marker but no key opens.
    pub fields_unreadable: usize,
    /// 1-based line numbers that were not JSON objects; passed through as-is.
    pub rejected_lines: Vec<usize>,
}

impl MigrationSummary {
    /// Returns `true` if the run finished without unreadable values or
    /// rejected lines.
    pub fn is_clean(&self) -> bool {
        self.fields_unreadable == 0 && self.rejected_lines.is_empty()
    }
}
