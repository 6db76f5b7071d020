//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use starchat_coze::{CozeClient, CozeError};

use crate::config::Config;
use crate::error::ServerError;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Upstream client; `None` until the token and bot id are configured.
    pub coze: Option<CozeClient>,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self, CozeError> {
        let coze = if config.coze_configured() {
            Some(
                CozeClient::builder(&config.coze_base_url, &config.coze_token, &config.coze_bot_id)
                    .set_poll_attempts(config.poll_attempts)
                    .set_poll_interval(config.poll_interval)
                    .set_timeout(config.upstream_timeout)
                    .build()?,
            )
        } else {
            None
        };
        Ok(Self {
            config: Arc::new(config),
            coze,
        })
    }

    /// The upstream client, or [`ServerError::NotConfigured`].
    pub fn coze(&self) -> Result<&CozeClient, ServerError> {
        self.coze.as_ref().ok_or(ServerError::NotConfigured)
    }
}
