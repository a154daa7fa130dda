//! Bring stored rows up to the current primary key.
//!
//! Input is JSON lines, one row object per line. For every configured column:
//!
//! | stored value                   | action                 |
//! |--------------------------------|------------------------|
//! | empty, `null`, current token   | left alone             |
//! | legacy plaintext               | sealed                 |
//! | token from a retired secret    | opened and re-sealed   |
//! | marker but no key opens it     | left alone, counted    |
//!
//! Lines that are not UTF-8 JSON objects are written through byte for byte and
//! their line numbers recorded. Output preserves input order one line per line.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use common::protocol::MigrationSummary;
use serde_json::Value;
use tracing::{info, warn};

use crate::crypto::CipherError;
use crate::keys::{KeyManager, Keyring, TokenState};
use crate::row::ColumnPath;

/// Run a migration from `input` to `output`.
///
/// One keyring snapshot is used for the whole run, so a concurrent rotation
/// does not split the output across keys.
///
/// # Errors
///
/// Returns an error on I/O failure or if sealing fails.
pub fn run<R, W>(
    mut input: R,
    mut output: W,
    keys: &KeyManager,
    columns: &[ColumnPath],
) -> Result<MigrationSummary>
where
    R: BufRead,
    W: Write,
{
    let keyring = keys.keyring();
    let mut summary = MigrationSummary::default();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        let read = input
            .read_until(b'\n', &mut buf)
            .with_context(|| format!("failed to read input line {}", line_no + 1))?;
        if read == 0 {
            break;
        }
        line_no += 1;
        let raw = strip_line_ending(&buf);

        let Ok(line) = std::str::from_utf8(raw) else {
            summary.rows_read += 1;
            warn!(line = line_no, "line is not valid UTF-8; passing it through");
            summary.rejected_lines.push(line_no);
            output.write_all(raw)?;
            writeln!(output)?;
            continue;
        };
        if line.trim().is_empty() {
            writeln!(output, "{line}")?;
            continue;
        }
        summary.rows_read += 1;

        let mut row = match serde_json::from_str::<Value>(line) {
            Ok(row @ Value::Object(_)) => row,
            _ => {
                warn!(line = line_no, "line is not a JSON object; passing it through");
                summary.rejected_lines.push(line_no);
                writeln!(output, "{line}")?;
                continue;
            }
        };

        let changed = migrate_row(&keyring, &mut row, columns, line_no, &mut summary)
            .with_context(|| format!("failed to seal a value on line {line_no}"))?;
        if changed {
            summary.rows_changed += 1;
            serde_json::to_writer(&mut output, &row)?;
            writeln!(output)?;
        } else {
            writeln!(output, "{line}")?;
        }
    }
    output.flush()?;

    info!(
        rows_read = summary.rows_read,
        rows_changed = summary.rows_changed,
        fields_encrypted = summary.fields_encrypted,
        fields_rekeyed = summary.fields_rekeyed,
        fields_unreadable = summary.fields_unreadable,
        rejected = summary.rejected_lines.len(),
        "migration finished"
    );
    Ok(summary)
}

/// `line` without its trailing `\n` or `\r\n`.
fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Migrate one row in place. Returns whether any value changed.
fn migrate_row(
    keyring: &Keyring,
    row: &mut Value,
    columns: &[ColumnPath],
    line_no: usize,
    summary: &mut MigrationSummary,
) -> Result<bool, CipherError> {
    let mut changed = false;
    for column in columns {
        column.visit(row, |leaf| {
            let Value::String(stored) = leaf else {
                return Ok(());
            };
            match keyring.classify(stored.as_str()) {
                TokenState::Empty | TokenState::Current => summary.fields_unchanged += 1,
                TokenState::Plaintext => {
                    *stored = keyring.seal(stored.as_str())?;
                    summary.fields_encrypted += 1;
                    changed = true;
                }
                // Empty plaintext is stored as empty, never sealed.
                TokenState::Retired(plaintext) if plaintext.is_empty() => {
                    stored.clear();
                    summary.fields_rekeyed += 1;
                    changed = true;
                }
                TokenState::Retired(plaintext) => {
                    *stored = keyring.seal(&plaintext)?;
                    summary.fields_rekeyed += 1;
                    changed = true;
                }
                TokenState::Unreadable => {
                    warn!(
                        line = line_no,
                        column = column.as_str(),
                        "value carries the token marker but no key opens it"
                    );
                    summary.fields_unreadable += 1;
                }
            }
            Ok::<(), CipherError>(())
        })?;
    }
    Ok(changed)
}
