//! `colseal-migrate` — backfill binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured JSON logging (stderr).
//! 3. Build the [`KeyManager`] from `SECRET_KEY` / `PREVIOUS_SECRET_KEYS`.
//! 4. Stream JSON-lines rows from stdin to stdout, sealing every configured
//!    column under the current key.
//! 5. Print the [`MigrationSummary`] as JSON on stderr.
//!
//! Exit status is 0 for a clean run, 65 if values were unreadable or lines
//! were rejected, and the [`CodecError::exit_code`] of any fatal error.

use std::io::{self, BufWriter};
use std::process::ExitCode;

use colseal::{config::Config, keys::KeyManager, migrate, telemetry};
use common::{protocol::MigrationSummary, CodecError};
use tracing::{error, info};

fn main() -> ExitCode {
    match run() {
        Ok(summary) => {
            match serde_json::to_string(&summary) {
                Ok(json) => eprintln!("{json}"),
                Err(e) => error!(error = %e, "failed to serialise summary"),
            }
            if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(65)
            }
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn run() -> Result<MigrationSummary, CodecError> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    // Telemetry is not yet up; errors are reported on stderr by `main`.
    let cfg = Config::from_env().map_err(|e| CodecError::Config(format!("{e:#}")))?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init(&cfg.log_level).map_err(|e| CodecError::Internal(e.to_string()))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %cfg.environment,
        production = cfg.is_production(),
        decrypt_mode = ?cfg.decrypt_mode,
        "colseal-migrate starting"
    );

    // -----------------------------------------------------------------------
    // 3. Keys
    // -----------------------------------------------------------------------
    let keys = KeyManager::from_config(&cfg)?;

    let columns = cfg
        .column_paths()
        .map_err(|e| CodecError::Config(format!("{e:#}")))?;
    if columns.is_empty() {
        return Err(CodecError::Config(
            "ENCRYPTED_COLUMNS must name at least one column to migrate".into(),
        ));
    }

    // -----------------------------------------------------------------------
    // 4. Migration
    // -----------------------------------------------------------------------
    let stdin = io::stdin();
    let stdout = io::stdout();
    migrate::run(stdin.lock(), BufWriter::new(stdout.lock()), &keys, &columns)
        .map_err(|e| CodecError::Internal(format!("{e:#}")))
}
