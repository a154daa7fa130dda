//! AES-256-GCM-SIV sealing of individual column values.
//!
//! This module knows nothing about configuration or persistence. It turns a
//! 32-byte key into a reusable [`FieldCipher`] and defines the token format
//! stored in encrypted columns.
//!
//! # Token format
//!
//! ```text
//! v1.<base64url-no-pad(nonce)>.<base64url-no-pad(ciphertext+tag)>
//! ```
//!
//! Every token is printable ASCII so it round-trips through any text column.
//! The `v1.` marker lets the read path tell sealed values apart from legacy
//! plaintext, and leaves room for a future algorithm or format change.

pub mod cipher;

pub use cipher::{has_token_marker, CipherError, FieldCipher, SealedToken, KEY_LEN};
