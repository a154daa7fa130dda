//! Configuration loading and validation for the column codec.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use anyhow::{Context, Result};
use common::protocol::DecryptMode;
use serde::Deserialize;
use zeroize::Zeroize;

use crate::keys::MAX_RETIRED_KEYS;
use crate::row::ColumnPath;

/// A configuration string that must never be printed.
///
/// `Debug` is redacted and the buffer is zeroed on drop.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Borrow the secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if no secret was supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

/// Validated codec configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Process secret the column key is derived from. Required in production.
    pub secret_key: SecretString,

    /// Deployment name; `"production"` makes an empty secret fatal.
    pub environment: String,

    /// Earlier secrets whose tokens must still open.
    pub previous_secret_keys: Vec<SecretString>,

    /// Whether undecryptable tokens are returned as stored or raised.
    pub decrypt_mode: DecryptMode,

    /// Encrypted column paths, e.g. `api_key` or `providers[].api_key`.
    pub encrypted_columns: Vec<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    pub log_level: String,
}

/// Environment variables exactly as supplied.
///
/// Every value stays a string: a secret such as `007123` or `TRUE` must reach
/// key derivation byte for byte. The two list variables are split in
/// [`Config::normalise`].
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    secret_key: SecretString,
    #[serde(default = "default_environment")]
    environment: String,
    /// Comma separated.
    #[serde(default)]
    previous_secret_keys: SecretString,
    #[serde(default)]
    decrypt_mode: DecryptMode,
    /// Comma separated.
    #[serde(default)]
    encrypted_columns: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_environment() -> String {
    "development".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_key: SecretString::default(),
            environment: default_environment(),
            previous_secret_keys: Vec::new(),
            decrypt_mode: DecryptMode::default(),
            encrypted_columns: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

/// Unprefixed environment source. No type coercion is applied.
fn environment() -> config::Environment {
    config::Environment::default()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        Self::load(environment())
    }

    fn load(source: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to build configuration from environment")?;

        let raw: RawConfig = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        let c = Self::normalise(raw);
        c.validate()?;
        Ok(c)
    }

    /// Split the comma-separated lists, dropping empty entries produced by
    /// trailing or doubled separators. Secrets are kept verbatim; column
    /// paths are trimmed.
    fn normalise(raw: RawConfig) -> Self {
        let previous_secret_keys = raw
            .previous_secret_keys
            .expose()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(SecretString::from)
            .collect();
        let encrypted_columns = raw
            .encrypted_columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_owned)
            .collect();
        Self {
            secret_key: raw.secret_key,
            environment: raw.environment,
            previous_secret_keys,
            decrypt_mode: raw.decrypt_mode,
            encrypted_columns,
            log_level: raw.log_level,
        }
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            anyhow::bail!("LOG_LEVEL must not be empty");
        }
        if !self.secret_key.is_empty()
            && self.previous_secret_keys.iter().any(|p| p == &self.secret_key)
        {
            anyhow::bail!("PREVIOUS_SECRET_KEYS must not repeat SECRET_KEY");
        }
        if self.previous_secret_keys.len() > MAX_RETIRED_KEYS {
            anyhow::bail!("PREVIOUS_SECRET_KEYS accepts at most {MAX_RETIRED_KEYS} entries");
        }
        self.column_paths()?;
        Ok(())
    }

    /// Returns `true` when running in the production deployment.
    pub fn is_production(&self) -> bool {
        self.environment == crate::keys::PRODUCTION
    }

    /// Parse [`Config::encrypted_columns`] into column paths.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first malformed path.
    pub fn column_paths(&self) -> Result<Vec<ColumnPath>> {
        self.encrypted_columns
            .iter()
            .map(|raw| {
                raw.parse::<ColumnPath>()
                    .with_context(|| format!("ENCRYPTED_COLUMNS entry {raw:?} is invalid"))
            })
            .collect()
    }
}
