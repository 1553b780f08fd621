//! Entity model: sources, pieces, and volunteers.
//!
//! Entities are built from definitions-file JSON and deduplicated with
//! [`Combine`] when the same identity (source name, piece title, volunteer
//! email) appears more than once.

pub mod piece;
pub mod source;
pub mod volunteer;

pub use piece::Piece;
pub use source::Source;
pub use volunteer::Volunteer;

use serde_json::{Map, Value};

use crate::diagnostics::{Location, Warnings};
use crate::error::ErrorCode;

/// Fold a repeated definition of the same entity into this one.
///
/// Combining an entity with an identical copy of itself is a no-op.
pub trait Combine {
    fn combine(&mut self, other: Self, at: &Location, warnings: &mut Warnings);
}

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("key \"{0}\" not found")]
    MissingField(&'static str),
    #[error("\"{field}\" must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error("bar count must be positive (got {0})")]
    InvalidBarCount(i64),
    #[error("source {index}: {cause}")]
    Source {
        index: usize,
        #[source]
        cause: Box<EntityError>,
    },
}

impl EntityError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotAnObject | Self::InvalidField { .. } => ErrorCode::InvalidFieldValue,
            Self::MissingField(_) => ErrorCode::MissingField,
            Self::InvalidBarCount(_) => ErrorCode::InvalidBarCount,
            Self::Source { cause, .. } => cause.code(),
        }
    }
}

pub(crate) fn object(raw: &Value) -> Result<&Map<String, Value>, EntityError> {
    raw.as_object().ok_or(EntityError::NotAnObject)
}

pub(crate) fn required<'a>(
    map: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a Value, EntityError> {
    map.get(key).ok_or(EntityError::MissingField(key))
}

pub(crate) fn required_str(
    map: &Map<String, Value>,
    key: &'static str,
) -> Result<String, EntityError> {
    required(map, key)?
        .as_str()
        .map(str::to_string)
        .ok_or(EntityError::InvalidField {
            field: key,
            expected: "a string",
        })
}

pub(crate) fn optional_str(
    map: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, EntityError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(EntityError::InvalidField {
            field: key,
            expected: "a string or null",
        }),
    }
}

/// Optional `barCount`: absent or null is `None`, non-positive is rejected.
pub(crate) fn optional_bar_count(map: &Map<String, Value>) -> Result<Option<u32>, EntityError> {
    let value = match map.get("barCount") {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let n = value.as_i64().ok_or(EntityError::InvalidField {
        field: "barCount",
        expected: "an integer",
    })?;
    if n <= 0 {
        return Err(EntityError::InvalidBarCount(n));
    }
    u32::try_from(n)
        .map(Some)
        .map_err(|_| EntityError::InvalidField {
            field: "barCount",
            expected: "an integer below 2^32",
        })
}

/// Larger of two optional values.
pub(crate) fn max_opt(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn max_opt_handles_missing_values() {
        assert_eq!(max_opt(None, None), None);
        assert_eq!(max_opt(Some(3), None), Some(3));
        assert_eq!(max_opt(None, Some(4)), Some(4));
        assert_eq!(max_opt(Some(5), Some(4)), Some(5));
    }

    #[test]
    fn bar_count_parsing() {
        let map = |v: Value| v.as_object().cloned().unwrap();
        assert_eq!(optional_bar_count(&map(json!({}))).unwrap(), None);
        assert_eq!(optional_bar_count(&map(json!({"barCount": null}))).unwrap(), None);
        assert_eq!(optional_bar_count(&map(json!({"barCount": 8}))).unwrap(), Some(8));
        assert!(matches!(
            optional_bar_count(&map(json!({"barCount": 0}))),
            Err(EntityError::InvalidBarCount(0))
        ));
        assert!(matches!(
            optional_bar_count(&map(json!({"barCount": "8"}))),
            Err(EntityError::InvalidField { .. })
        ));
    }

    #[test]
    fn nested_source_error_reports_index() {
        let err = EntityError::Source {
            index: 2,
            cause: Box::new(EntityError::MissingField("link")),
        };
        assert_eq!(err.to_string(), "source 2: key \"link\" not found");
        assert_eq!(err.code(), ErrorCode::MissingField);
    }
}
