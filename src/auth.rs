/// Authentication context and the lookup seam to the identity provider
use crate::AppState;
use crate::errors::AppError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Name of the cookie the identity provider's frontend SDK stores the session token in.
pub const SESSION_COOKIE: &str = "__session";

/// A wrapper around String that uses constant-time equality comparison
/// to prevent timing attacks on session token lookups.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstantTimeString(String);

impl From<String> for ConstantTimeString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConstantTimeString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl PartialEq for ConstantTimeString {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for ConstantTimeString {}

impl Hash for ConstantTimeString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Who is calling, as resolved by the identity provider for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationContext {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl AuthenticationContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// The active organization, treating an empty identifier as none.
    pub fn active_organization(&self) -> Option<&str> {
        self.organization_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn user(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Checks that the caller is signed in and is acting for `organization_id`.
    pub fn require_member(&self, organization_id: &str) -> Result<&str, AppError> {
        let user = self.user().ok_or(AppError::Unauthenticated)?;
        if self.active_organization() != Some(organization_id) {
            return Err(AppError::Forbidden(format!(
                "not a member of organization {organization_id}"
            )));
        }
        Ok(user)
    }
}

/// The identity provider could not answer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthLookupError {
    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("identity provider returned status {0}")]
    Status(u16),

    #[error("identity provider returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// Resolves a session token into an [`AuthenticationContext`].
///
/// A missing or unknown token is not an error: it yields an anonymous context. Errors are
/// reserved for the provider itself failing, and are never retried here.
#[async_trait]
pub trait AuthProvider: Send + Sync + std::fmt::Debug {
    async fn authenticate(
        &self,
        token: Option<&str>,
    ) -> Result<AuthenticationContext, AuthLookupError>;
}

/// Pulls the session token from `Authorization: Bearer`, falling back to the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty())
    {
        return Some(token);
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

/// The resolved caller for the current request.
#[derive(Debug, Clone)]
pub struct Caller(pub AuthenticationContext);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers);
        let context = state.auth.authenticate(token).await?;
        debug!(
            user_id = ?context.user_id,
            organization_id = ?context.organization_id,
            "Resolved caller"
        );
        Ok(Caller(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_bearer_token_preferred_over_cookie() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer sess_header"),
            (header::COOKIE, "__session=sess_cookie"),
        ]);
        assert_eq!(session_token(&map), Some("sess_header"));
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        for value in ["bearer sess_lower", "BEARER sess_lower", "BeArEr sess_lower"] {
            let map = headers(&[
                (header::AUTHORIZATION, value),
                (header::COOKIE, "__session=sess_cookie"),
            ]);
            assert_eq!(session_token(&map), Some("sess_lower"), "{value}");
        }
    }

    #[test]
    fn test_cookie_token_among_others() {
        let map = headers(&[(header::COOKIE, "theme=dark; __session=sess_1; lang=en")]);
        assert_eq!(session_token(&map), Some("sess_1"));
    }

    #[test]
    fn test_no_token() {
        let map = headers(&[
            (header::AUTHORIZATION, "Basic abc"),
            (header::COOKIE, "__session="),
        ]);
        assert_eq!(session_token(&map), None);
    }

    #[test]
    fn test_empty_organization_is_absent() {
        let context = AuthenticationContext {
            user_id: Some("user_1".into()),
            organization_id: Some(String::new()),
        };
        assert_eq!(context.active_organization(), None);
    }

    #[test]
    fn test_require_member() {
        let context = AuthenticationContext {
            user_id: Some("user_1".into()),
            organization_id: Some("org_1".into()),
        };
        assert_eq!(context.require_member("org_1").unwrap(), "user_1");
        assert!(matches!(
            context.require_member("org_2"),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            AuthenticationContext::anonymous().require_member("org_1"),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_constant_time_string_equality() {
        assert_eq!(
            ConstantTimeString::from("sess_1"),
            ConstantTimeString::from("sess_1".to_string())
        );
        assert_ne!(
            ConstantTimeString::from("sess_1"),
            ConstantTimeString::from("sess_2")
        );
    }
}
