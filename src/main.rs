mod config;

use clap::Parser as _;
use config::Config;
use std::sync::Arc;
use std::time::Duration;
use stride::{
    AppState, build_metrics_layer_and_handle, build_metrics_router, build_router,
    auth::AuthProvider,
    client::create_hyper_client,
    identity::HostedIdentityProvider,
    session_router::RedirectPaths,
    sessions::{SessionDirectory, WatchedFile},
    tracker::InMemoryStore,
    webhook::SharedSecretVerifier,
};
use tokio::net::TcpListener;
use tracing::{info, instrument};

async fn auth_provider(config: &Config) -> anyhow::Result<Arc<dyn AuthProvider>> {
    if let Some(base_url) = &config.identity_url {
        info!("Using hosted identity provider at {}", base_url);
        let client = create_hyper_client(
            Duration::from_secs(config.pool_idle_timeout_secs),
            config.pool_max_idle_per_host,
        );
        let provider = HostedIdentityProvider::builder()
            .client(client)
            .base_url(base_url.clone())
            .timeout(Duration::from_millis(config.identity_timeout_ms))
            .build();
        return Ok(Arc::new(provider));
    }

    let path = config
        .sessions
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No authentication source configured"))?;
    let directory = SessionDirectory::from_file(&path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load sessions: {}", e))?;

    if config.watch {
        directory.receive_updates(WatchedFile(path)).await?;
    }
    Ok(Arc::new(directory))
}

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!(
        port = config.port,
        identity_url = ?config.identity_url,
        sessions = ?config.sessions,
        data = ?config.data,
        "Starting Stride"
    );

    let redirects = RedirectPaths::new(&config.organization_path, &config.onboarding_path)?;

    let store = match &config.data {
        Some(path) => InMemoryStore::from_seed_file(path).await?,
        None => InMemoryStore::new(),
    };

    let app_state = AppState::builder()
        .auth(auth_provider(&config).await?)
        .store(Arc::new(store))
        .webhooks(Arc::new(SharedSecretVerifier::new(config.webhook_secret.clone())))
        .redirects(redirects)
        .build();
    let mut router = build_router(app_state);

    if config.metrics {
        let (metrics_layer, handle) = build_metrics_layer_and_handle(config.metrics_prefix.clone());
        router = router.layer(metrics_layer);

        let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
        let metrics_listener = TcpListener::bind(&metrics_addr).await?;
        info!("Metrics listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                tracing::error!("Metrics server failed: {}", e);
            }
        });
    }

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Stride listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
