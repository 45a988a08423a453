//! Axum extractors that validate parameters before a handler sees them
use super::{RawParameters, Validated};
use crate::errors::AppError;
use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use std::collections::HashMap;
use tracing::debug;

/// Query parameters validated against `T`'s schema.
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

/// Path segments validated against `T`'s schema.
#[derive(Debug, Clone)]
pub struct ValidatedPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: Validated,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = RawParameters::from_query(parts.uri.query().unwrap_or_default());
        let value = T::from_raw(&raw).inspect_err(|e| {
            debug!(path = %parts.uri.path(), error = %e, "Rejected query parameters");
        })?;
        Ok(Self(value))
    }
}

impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: Validated,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(segments) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let raw = RawParameters::from_path(segments);
        let value = T::from_raw(&raw).inspect_err(|e| {
            debug!(path = %parts.uri.path(), error = %e, "Rejected path parameters");
        })?;
        Ok(Self(value))
    }
}
