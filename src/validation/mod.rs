//! Typed request-parameter validation
//!
//! Route and query parameters arrive as an untyped [`RawParameters`] bag. A [`Schema`] declares
//! the expected shape (field types, optional/required, refinements such as ranges or patterns)
//! and [`validate`] turns the raw bag into a strongly typed value, or a [`ValidationError`]
//! listing every field that failed.
//!
//! # Usage
//!
//! ```ignore
//! use stride::validation::{Field, FieldType, RawParameters, Schema, Shape, validate};
//!
//! #[derive(serde::Deserialize)]
//! struct Page { page: i64 }
//!
//! let schema: Schema<Page> =
//!     Schema::new(Shape::open().with(Field::required("page", FieldType::Integer)));
//! let page = validate(&schema, &RawParameters::from_query("page=2"))?;
//! ```
//!
//! Handlers normally use the [`ValidatedPath`] and [`ValidatedQuery`] extractors instead, which
//! reject the request with a 400 before the handler runs.

mod error;
mod extract;
mod raw;
mod schema;

pub use error::{FailureReason, FieldError, ValidationError};
pub use extract::{ValidatedPath, ValidatedQuery};
pub use raw::RawParameters;
pub use schema::{
    Field, FieldType, ParameterSchema, Presence, Refinement, Schema, Shape, coerce,
};

use serde::de::DeserializeOwned;

/// Validates `raw` against `schema`.
///
/// Pure: the same inputs always give the same result.
pub fn validate<S: ParameterSchema>(
    schema: &S,
    raw: &RawParameters,
) -> Result<S::Output, ValidationError> {
    schema.validate(raw)
}

/// A type with a schema declared once for the lifetime of the process.
///
/// Implementors usually keep the schema in a `static LazyLock<Schema<Self>>`.
pub trait Validated: DeserializeOwned + Send + 'static {
    fn schema() -> &'static Schema<Self>;

    /// Shorthand for `validate(Self::schema(), raw)`.
    fn from_raw(raw: &RawParameters) -> Result<Self, ValidationError> {
        Self::schema().validate(raw)
    }
}
