//! String encoding of values.
//!
//! Scalars use their plain textual form: `true`/`false`, decimal integers, the
//! text itself, and UTF-8 paths. A list is a JSON array holding the encoding
//! of each element, so any element text round-trips unchanged.

use std::{num::ParseIntError, path::PathBuf};

use crate::domain::{Value, ValueKind};

/// Errors raised while encoding a value.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The value does not conform to the kind it is encoded as.
    #[error("cannot encode a {found} value as {expected}")]
    WrongType {
        /// The kind the value was encoded as.
        expected: ValueKind,
        /// A description of the value's actual kind.
        found: String,
    },

    /// Paths must be valid UTF-8 to be encoded.
    #[error("path '{}' is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),

    /// A list could not be written as JSON.
    #[error("failed to encode list")]
    List(#[from] serde_json::Error),
}

/// Errors raised while decoding a value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Booleans are `true` or `false`.
    #[error("'{0}' is not a boolean")]
    InvalidBoolean(String),

    /// Integers are signed 64-bit decimals.
    #[error("'{raw}' is not an integer")]
    InvalidInteger {
        /// The text that failed to parse.
        raw: String,
        /// The underlying parse failure.
        source: ParseIntError,
    },

    /// Lists are JSON arrays of strings.
    #[error("'{raw}' is not a list")]
    InvalidList {
        /// The text that failed to parse.
        raw: String,
        /// The underlying parse failure.
        source: serde_json::Error,
    },
}

/// Encode `value` as a value of `kind`.
///
/// # Errors
///
/// Fails if the value does not conform to `kind` or contains a non-UTF-8
/// path.
pub fn encode(kind: &ValueKind, value: &Value) -> Result<String, EncodeError> {
    match (kind, value) {
        (ValueKind::Boolean, Value::Boolean(value)) => Ok(value.to_string()),
        (ValueKind::Integer, Value::Integer(value)) => Ok(value.to_string()),
        (ValueKind::Text, Value::Text(value)) => Ok(value.clone()),
        (ValueKind::Path, Value::Path(path)) => path
            .to_str()
            .map(ToString::to_string)
            .ok_or_else(|| EncodeError::NonUtf8Path(path.clone())),
        (ValueKind::List(element), Value::List(items)) => {
            let encoded = items
                .iter()
                .map(|item| encode(element, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(serde_json::to_string(&encoded)?)
        }
        _ => Err(EncodeError::WrongType {
            expected: kind.clone(),
            found: value.describe_kind(),
        }),
    }
}

/// Decode a value of `kind` from `raw`.
///
/// # Errors
///
/// Fails if `raw` is not a valid encoding for `kind`.
pub fn decode(kind: &ValueKind, raw: &str) -> Result<Value, DecodeError> {
    match kind {
        ValueKind::Boolean => match raw {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(DecodeError::InvalidBoolean(raw.to_string())),
        },
        ValueKind::Integer => raw
            .parse()
            .map(Value::Integer)
            .map_err(|source| DecodeError::InvalidInteger {
                raw: raw.to_string(),
                source,
            }),
        ValueKind::Text => Ok(Value::Text(raw.to_string())),
        ValueKind::Path => Ok(Value::Path(PathBuf::from(raw))),
        ValueKind::List(element) => {
            let items: Vec<String> = serde_json::from_str(raw)
                .map_err(|source| DecodeError::InvalidList {
                    raw: raw.to_string(),
                    source,
                })?;
            items
                .iter()
                .map(|item| decode(element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
    }
}
