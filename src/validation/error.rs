//! Structured validation failures
//!
//! A [`ValidationError`] always carries every field-level failure found in a single pass, so a
//! caller can report everything wrong with the input at once.
use serde::Serialize;
use std::fmt;

/// Why a single field failed validation.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FailureReason {
    /// A required field was not supplied.
    #[error("field is required")]
    Missing,

    /// The value could not be read as the declared type.
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    /// The value has the right type but breaks a declared constraint.
    #[error("{message}")]
    Refinement { message: String },

    /// The field is not declared by a closed schema.
    #[error("unexpected field")]
    Unexpected,

    /// The declared shape and the target type disagree.
    #[error("{message}")]
    SchemaMismatch { message: String },
}

/// A single `{ field, reason }` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Dotted path of the field, e.g. `filter.status` or `tags[1]`.
    pub field: String,
    #[serde(flatten)]
    pub reason: FailureReason,
    /// Human readable rendering of `reason`.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: FailureReason) -> Self {
        let message = reason.to_string();
        Self {
            field: field.into(),
            reason,
            message,
        }
    }
}

/// The aggregated failure returned by [`crate::validation::validate`].
///
/// Never empty: a `ValidationError` is only constructed when at least one field failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    pub(crate) fn from_errors(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    pub(crate) fn single(field: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            errors: vec![FieldError::new(field, reason)],
        }
    }

    /// All field failures, in schema order followed by unexpected fields.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// The failure recorded for `field`, if any.
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }

    /// Field names that failed, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.field.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid parameters: ")?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_error_serializes_flat() {
        let error = FieldError::new(
            "page",
            FailureReason::WrongType {
                expected: "integer",
                found: "string",
            },
        );
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({
                "field": "page",
                "code": "wrong_type",
                "expected": "integer",
                "found": "string",
                "message": "expected integer, found string"
            })
        );
    }

    #[test]
    fn test_display_lists_every_field() {
        let error = ValidationError::from_errors(vec![
            FieldError::new("a", FailureReason::Missing),
            FieldError::new("b", FailureReason::Unexpected),
        ])
        .unwrap();
        assert_eq!(
            error.to_string(),
            "invalid parameters: a: field is required; b: unexpected field"
        );
    }

    #[test]
    fn test_no_errors_is_not_an_error() {
        assert!(ValidationError::from_errors(Vec::new()).is_none());
    }
}
