//! Session lookups against the hosted identity provider
//!
//! The provider owns the session protocol; this module only forwards the caller's session token
//! to its "current session" endpoint and reads back the user and active organization.
use crate::auth::{AuthLookupError, AuthProvider, AuthenticationContext};
use crate::client::HttpClient;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use bon::Builder;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

const CURRENT_SESSION_PATH: &str = "v1/sessions/current";

/// Largest session document we are willing to read.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Builder)]
pub struct HostedIdentityProvider<T: HttpClient> {
    client: T,
    /// Base URL of the provider's API, e.g. `https://identity.example.com/`.
    base_url: Url,
    /// Upper bound for the whole lookup, including reading the body.
    #[builder(default = Duration::from_secs(5))]
    timeout: Duration,
}

impl<T: HttpClient> HostedIdentityProvider<T> {
    fn session_url(&self) -> Result<Url, AuthLookupError> {
        self.base_url
            .join(CURRENT_SESSION_PATH)
            .map_err(|e| AuthLookupError::Transport(e.to_string()))
    }

    async fn lookup(&self, token: &str) -> Result<AuthenticationContext, AuthLookupError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.session_url()?.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .map_err(|e| AuthLookupError::Transport(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| AuthLookupError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => {
                debug!("Identity provider does not recognise the session");
                return Ok(AuthenticationContext::anonymous());
            }
            status => return Err(AuthLookupError::Status(status.as_u16())),
        }

        let bytes = axum::body::to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| AuthLookupError::InvalidResponse(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| AuthLookupError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl<T: HttpClient> AuthProvider for HostedIdentityProvider<T> {
    #[instrument(skip_all)]
    async fn authenticate(
        &self,
        token: Option<&str>,
    ) -> Result<AuthenticationContext, AuthLookupError> {
        let Some(token) = token else {
            return Ok(AuthenticationContext::anonymous());
        };
        match tokio::time::timeout(self.timeout, self.lookup(token)).await {
            Ok(result) => result.inspect_err(|e| warn!(error = %e, "Session lookup failed")),
            Err(_) => {
                warn!(timeout = ?self.timeout, "Session lookup timed out");
                Err(AuthLookupError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockHttpClient;

    fn provider(client: MockHttpClient) -> HostedIdentityProvider<MockHttpClient> {
        HostedIdentityProvider::builder()
            .client(client)
            .base_url("https://identity.example.com/".parse().unwrap())
            .timeout(Duration::from_millis(50))
            .build()
    }

    #[tokio::test]
    async fn test_resolves_context_and_forwards_token() {
        let client = MockHttpClient::new(
            StatusCode::OK,
            r#"{"user_id": "user_1", "organization_id": "org_123"}"#,
        );
        let context = provider(client.clone())
            .authenticate(Some("sess_abc"))
            .await
            .unwrap();
        assert_eq!(context.user_id.as_deref(), Some("user_1"));
        assert_eq!(context.organization_id.as_deref(), Some("org_123"));

        let requests = client.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].uri,
            "https://identity.example.com/v1/sessions/current"
        );
        assert!(
            requests[0]
                .headers
                .iter()
                .any(|(k, v)| k == "authorization" && v == "Bearer sess_abc")
        );
    }

    #[tokio::test]
    async fn test_no_token_skips_the_provider() {
        let client = MockHttpClient::new(StatusCode::INTERNAL_SERVER_ERROR, "");
        let context = provider(client.clone()).authenticate(None).await.unwrap();
        assert_eq!(context, AuthenticationContext::anonymous());
        assert!(client.get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_anonymous() {
        let client = MockHttpClient::new(StatusCode::UNAUTHORIZED, "");
        let context = provider(client).authenticate(Some("sess_x")).await.unwrap();
        assert_eq!(context, AuthenticationContext::anonymous());
    }

    #[tokio::test]
    async fn test_provider_failures_propagate() {
        let client = MockHttpClient::new(StatusCode::BAD_GATEWAY, "");
        let err = provider(client)
            .authenticate(Some("sess_x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthLookupError::Status(502)));

        let client = MockHttpClient::new(StatusCode::OK, "<html>");
        let err = provider(client)
            .authenticate(Some("sess_x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthLookupError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let client = MockHttpClient::new(StatusCode::OK, r#"{"user_id": "user_1"}"#)
            .with_delay(Duration::from_millis(500));
        let err = provider(client)
            .authenticate(Some("sess_x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthLookupError::Timeout(_)));
    }
}
