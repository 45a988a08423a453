//! Stride - an organization-scoped training progress tracker
//!
//! This library provides the HTTP surface of the tracker: typed validation of route and query
//! parameters, the post-sign-in routing decision, organization-scoped athlete and session pages,
//! and the identity provider's webhook endpoint.

use axum::Router;
use axum::routing::{get, post};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use bon::Builder;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, instrument};

pub mod auth;
pub mod client;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod params;
pub mod session_router;
pub mod sessions;
pub mod tracker;
pub mod validation;
pub mod webhook;

use auth::AuthProvider;
use session_router::RedirectPaths;
use tracker::TrackerStore;
use webhook::WebhookVerifier;

/// The main application state: the external collaborators each request talks to.
#[derive(Clone, Debug, Builder)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub store: Arc<dyn TrackerStore>,
    pub webhooks: Arc<dyn WebhookVerifier>,
    #[builder(default)]
    pub redirects: RedirectPaths,
}

/// Build the main router
/// This creates routes for:
/// - `/` - Redirects to the caller's organization or to onboarding
/// - `/onboarding` - Onboarding page
/// - `/org/{organization_id}/...` - Organization-scoped pages
/// - `/api/webhooks` - Identity provider webhooks
#[instrument(skip(state))]
pub fn build_router(state: AppState) -> Router {
    info!("Building router");
    Router::new()
        .route("/", get(handlers::root))
        .route("/onboarding", get(handlers::onboarding))
        .route("/org/{organization_id}", get(handlers::dashboard))
        .route("/org/{organization_id}/athletes", get(handlers::athletes))
        .route(
            "/org/{organization_id}/athletes/{athlete_id}",
            get(handlers::athlete),
        )
        .route("/org/{organization_id}/sessions", get(handlers::sessions))
        .route("/api/webhooks", post(handlers::webhook))
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Builds a layer and handle for prometheus metrics collection.
///
/// Endpoints are labelled by their route pattern so organization identifiers do not end up in
/// metric labels.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::MatchedPath)
        .with_default_metrics()
        .build_pair()
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::auth::{AuthLookupError, AuthenticationContext};
    use crate::client::HttpClient;
    use crate::sessions::{SessionDirectory, SessionsFile};
    use crate::tracker::{Athlete, InMemoryStore, SeedFile, SessionStatus, TrainingSession};
    use crate::webhook::SharedSecretVerifier;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;

    pub const WEBHOOK_SECRET: &str = "whsec_test";

    pub struct MockHttpClient {
        pub requests: Arc<Mutex<Vec<MockRequest>>>,
        response_builder: Arc<dyn Fn() -> axum::response::Response + Send + Sync>,
        delay: Option<Duration>,
    }

    #[derive(Debug, Clone)]
    pub struct MockRequest {
        pub method: String,
        pub uri: String,
        pub headers: Vec<(String, String)>,
    }

    impl MockHttpClient {
        pub fn new(status: StatusCode, body: &str) -> Self {
            let body = body.to_string();
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder: Arc::new(move || {
                    axum::response::Response::builder()
                        .status(status)
                        .body(axum::body::Body::from(body.clone()))
                        .unwrap()
                }),
                delay: None,
            }
        }

        /// Delays every response, for exercising timeouts.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn get_requests(&self) -> Vec<MockRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl std::fmt::Debug for MockHttpClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockHttpClient")
                .field("requests", &self.requests)
                .field("response_builder", &"<closure>")
                .field("delay", &self.delay)
                .finish()
        }
    }

    impl Clone for MockHttpClient {
        fn clone(&self) -> Self {
            Self {
                requests: Arc::clone(&self.requests),
                response_builder: Arc::clone(&self.response_builder),
                delay: self.delay,
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            req: axum::extract::Request,
        ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
            let mock_request = MockRequest {
                method: req.method().to_string(),
                uri: req.uri().to_string(),
                headers: req
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                    .collect(),
            };
            self.requests.lock().unwrap().push(mock_request);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            Ok((self.response_builder)())
        }
    }

    /// An identity provider that is always down.
    #[derive(Debug)]
    pub struct UnavailableAuthProvider;

    #[async_trait]
    impl AuthProvider for UnavailableAuthProvider {
        async fn authenticate(
            &self,
            _token: Option<&str>,
        ) -> Result<AuthenticationContext, AuthLookupError> {
            Err(AuthLookupError::Transport("connection refused".into()))
        }
    }

    /// Sessions: `sess_coach` (org_1), `sess_rival` (org_2), `sess_new` (no organization).
    pub fn sessions() -> SessionDirectory {
        let context = |user: &str, org: Option<&str>| AuthenticationContext {
            user_id: Some(user.to_string()),
            organization_id: org.map(String::from),
        };
        SessionDirectory::from_sessions(SessionsFile {
            sessions: [
                ("sess_coach".to_string(), context("user_coach", Some("org_1"))),
                ("sess_rival".to_string(), context("user_rival", Some("org_2"))),
                ("sess_new".to_string(), context("user_new", None)),
            ]
            .into_iter()
            .collect(),
        })
    }

    pub fn store() -> InMemoryStore {
        let session = |id: &str, athlete: &str, date: &str, status: SessionStatus| {
            TrainingSession::builder()
                .id(id)
                .organization_id("org_1")
                .athlete_id(athlete)
                .date(date)
                .kind("intervals")
                .status(status)
                .duration_minutes(60)
                .build()
        };
        InMemoryStore::from_seed(SeedFile {
            athletes: vec![
                Athlete::builder()
                    .id("ath_1")
                    .organization_id("org_1")
                    .name("Ada")
                    .sport("rowing")
                    .build(),
                Athlete::builder()
                    .id("ath_2")
                    .organization_id("org_1")
                    .name("Grace")
                    .build(),
                Athlete::builder()
                    .id("ath_9")
                    .organization_id("org_2")
                    .name("Linus")
                    .build(),
            ],
            sessions: vec![
                session("s1", "ath_1", "2024-05-01", SessionStatus::Completed),
                session("s2", "ath_1", "2024-05-02", SessionStatus::Planned),
                session("s3", "ath_2", "2024-05-03", SessionStatus::Completed),
            ],
        })
    }

    pub fn app_state() -> AppState {
        AppState::builder()
            .auth(Arc::new(sessions()))
            .store(Arc::new(store()))
            .webhooks(Arc::new(SharedSecretVerifier::new(WEBHOOK_SECRET)))
            .build()
    }
}
