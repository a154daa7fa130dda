//! Applying a [`ColumnCodec`] to the encrypted columns of a JSON row.
//!
//! Column paths use dot notation; a `[]` suffix expands into every element of
//! an array, e.g. `providers[].api_key`.

use std::str::FromStr;

use common::CodecError;
use serde_json::Value;
use thiserror::Error;

use crate::codec::ColumnCodec;

/// Errors from parsing a column path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The path is empty.
    #[error("column path is empty")]
    Empty,

    /// A segment between two dots is empty.
    #[error("column path {0:?} has an empty segment")]
    EmptySegment(String),

    /// Brackets appear anywhere other than a trailing `[]`.
    #[error("column path {0:?} has a misplaced array marker")]
    MisplacedArrayMarker(String),
}

/// Segments of a dot-notation column path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    /// Navigate into an object property by name.
    Key(String),
    /// Expand into every element of a JSON array.
    ArrayItem,
}

/// A parsed column path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl ColumnPath {
    /// The path as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Visit every string or null leaf this path reaches in `row`.
    pub fn visit<E, F>(&self, row: &mut Value, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&mut Value) -> Result<(), E>,
    {
        visit_leaves(row, &self.segments, &mut visit)
    }
}

impl FromStr for ColumnPath {
    type Err = PathError;

    /// `"orders[].card_number"` → `[Key("orders"), ArrayItem, Key("card_number")]`.
    fn from_str(path: &str) -> Result<Self, Self::Err> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments = Vec::new();
        for part in path.split('.') {
            let (key, array) = match part.strip_suffix("[]") {
                Some(key) => (key, true),
                None => (part, false),
            };
            if key.is_empty() {
                return Err(PathError::EmptySegment(path.to_owned()));
            }
            if key.contains(['[', ']']) {
                return Err(PathError::MisplacedArrayMarker(path.to_owned()));
            }
            segments.push(PathSegment::Key(key.to_owned()));
            if array {
                segments.push(PathSegment::ArrayItem);
            }
        }
        Ok(Self {
            raw: path.to_owned(),
            segments,
        })
    }
}

/// Recursively navigate `value` following `segments` and hand every string or
/// null leaf at the end of the path to `visit`. Other leaf types and missing
/// fields are skipped.
fn visit_leaves<E, F>(value: &mut Value, segments: &[PathSegment], visit: &mut F) -> Result<(), E>
where
    F: FnMut(&mut Value) -> Result<(), E>,
{
    let Some((first, rest)) = segments.split_first() else {
        if matches!(value, Value::String(_) | Value::Null) {
            visit(value)?;
        }
        return Ok(());
    };

    match first {
        PathSegment::Key(key) => {
            if let Value::Object(map) = value {
                if let Some(child) = map.get_mut(key) {
                    visit_leaves(child, rest, visit)?;
                }
            }
        }
        PathSegment::ArrayItem => {
            if let Value::Array(arr) = value {
                for item in arr.iter_mut() {
                    visit_leaves(item, rest, visit)?;
                }
            }
        }
    }
    Ok(())
}

/// Runs a [`ColumnCodec`] over a fixed set of columns in each row.
#[derive(Debug, Clone)]
pub struct RowCodec<C> {
    codec: C,
    columns: Vec<ColumnPath>,
}

impl<C: ColumnCodec> RowCodec<C> {
    /// Create a row codec that transforms `columns` with `codec`.
    pub fn new(codec: C, columns: Vec<ColumnPath>) -> Self {
        Self { codec, columns }
    }

    /// The configured columns.
    pub fn columns(&self) -> &[ColumnPath] {
        &self.columns
    }

    /// Apply [`ColumnCodec::before_write`] to every configured column.
    pub fn encode_row(&self, row: &mut Value) -> Result<(), CodecError> {
        self.apply(row, |codec, v| codec.before_write(v))
    }

    /// Apply [`ColumnCodec::after_read`] to every configured column.
    pub fn decode_row(&self, row: &mut Value) -> Result<(), CodecError> {
        self.apply(row, |codec, v| codec.after_read(v))
    }

    fn apply<F>(&self, row: &mut Value, hook: F) -> Result<(), CodecError>
    where
        F: Fn(&C, Option<&str>) -> Result<Option<String>, CodecError>,
    {
        for column in &self.columns {
            column.visit(row, |leaf| {
                let next = hook(&self.codec, leaf.as_str())?;
                *leaf = next.map_or(Value::Null, Value::String);
                Ok::<(), CodecError>(())
            })?;
        }
        Ok(())
    }
}
