//! Request-level errors and their HTTP rendering
//!
//! Every handler returns `Result<_, AppError>`. Error bodies share one shape:
//! `{ "error": { "type", "message", "fields"? } }`, where `fields` lists each
//! `{ field, code, message }` for validation failures.
use crate::auth::AuthLookupError;
use crate::tracker::StoreError;
use crate::validation::ValidationError;
use crate::webhook::WebhookError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    AuthLookup(#[from] AuthLookupError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AuthLookup(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Webhook(WebhookError::Unverified(_)) => StatusCode::UNAUTHORIZED,
            AppError::Webhook(WebhookError::Malformed(_)) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::BadRequest(_) => "invalid_request_error",
            AppError::Unauthenticated => "authentication_error",
            AppError::Forbidden(_) => "permission_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::AuthLookup(_) => "authentication_unavailable",
            AppError::Webhook(_) => "webhook_error",
            AppError::Store(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            match self {
                AppError::AuthLookup(_) => "Authentication service is unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
            self.to_string()
        };

        let mut body = json!({
            "error": {
                "type": self.error_type(),
                "message": message,
            }
        });
        if let AppError::Validation(validation) = &self {
            body["error"]["fields"] = json!(validation.errors());
        }

        (status, Json(body)).into_response()
    }
}
