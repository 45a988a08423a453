//! Configuration parsing and validation for the tracker server
//!
//! This module handles command-line argument parsing and validation using clap.
//! Every option can also be supplied through a `STRIDE_*` environment variable.
use anyhow::anyhow;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the server will listen.
    #[arg(short = 'p', long, env = "STRIDE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// The port on which the metrics server will listen.
    #[arg(long, env = "STRIDE_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(
        short = 'm',
        long,
        env = "STRIDE_METRICS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, env = "STRIDE_METRICS_PREFIX", default_value = "stride")]
    pub metrics_prefix: String,

    /// Base URL of the hosted identity provider's API.
    #[arg(long, env = "STRIDE_IDENTITY_URL", conflicts_with = "sessions")]
    pub identity_url: Option<Url>,

    /// Upper bound (in milliseconds) for a single session lookup at the identity provider.
    #[arg(long, env = "STRIDE_IDENTITY_TIMEOUT_MS", default_value_t = 5000)]
    pub identity_timeout_ms: u64,

    /// A JSON file of session tokens, used instead of the identity provider.
    #[arg(short = 's', long, env = "STRIDE_SESSIONS")]
    pub sessions: Option<PathBuf>,

    /// Whether we should continue watching the sessions file for changes.
    #[arg(short = 'w', long, env = "STRIDE_WATCH", default_value_t = true, action = ArgAction::Set)]
    pub watch: bool,

    /// A JSON file of athletes and training sessions to start with.
    #[arg(short = 'd', long, env = "STRIDE_DATA")]
    pub data: Option<PathBuf>,

    /// Shared secret expected on identity provider webhooks.
    #[arg(long, env = "STRIDE_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    /// Where signed-in members of an organization are sent. Must contain `{organization_id}`.
    #[arg(long, env = "STRIDE_ORGANIZATION_PATH", default_value = "/org/{organization_id}")]
    pub organization_path: String,

    /// Where callers without an organization are sent.
    #[arg(long, env = "STRIDE_ONBOARDING_PATH", default_value = "/onboarding")]
    pub onboarding_path: String,

    /// Maximum number of idle connections to keep alive to the identity provider.
    #[arg(long, default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle identity provider connections alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        match (&self.identity_url, &self.sessions) {
            (None, None) => {
                return Err(anyhow!(
                    "One of --identity-url or --sessions must be provided"
                ));
            }
            (_, Some(sessions)) if !sessions.exists() => {
                return Err(anyhow!(
                    "Sessions file '{}' does not exist",
                    sessions.display()
                ));
            }
            _ => {}
        }
        if let Some(data) = &self.data
            && !data.exists()
        {
            return Err(anyhow!("Data file '{}' does not exist", data.display()));
        }
        if self.webhook_secret.is_empty() {
            return Err(anyhow!("Webhook secret must not be empty"));
        }
        Ok(self)
    }
}
