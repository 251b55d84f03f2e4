//! Application state.

use std::sync::Arc;
use std::time::Duration;

use nutricoach_store::Store;

use crate::ai::AiClient;
use crate::config::ServiceConfig;
use crate::notify::Notifier;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Language model client (optional).
    pub ai: Option<Arc<AiClient>>,

    /// Bot API notifier (optional).
    pub notifier: Option<Arc<Notifier>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let ai = config.ai_api_key.as_ref().and_then(|key| {
            match AiClient::new(
                &config.ai_base_url,
                key,
                config.ai_models.clone(),
                Duration::from_secs(config.ai_timeout_seconds),
            ) {
                Ok(client) => {
                    tracing::info!(
                        base_url = %config.ai_base_url,
                        models = ?config.ai_models,
                        "AI integration enabled"
                    );
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create AI client");
                    None
                }
            }
        });

        if ai.is_none() {
            tracing::warn!("AI not configured - ask and lab analysis will return 503");
        }

        let notifier = if config.bot_secret.is_empty() {
            None
        } else {
            match Notifier::new(&config.telegram_api_url, &config.bot_secret) {
                Ok(notifier) => Some(Arc::new(notifier)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Telegram notifier");
                    None
                }
            }
        };

        if notifier.is_none() {
            tracing::warn!("Telegram notifier not configured - referral messages disabled");
        }

        Self {
            store,
            config,
            ai,
            notifier,
        }
    }

    /// Check if the AI client is configured.
    #[must_use]
    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }
}
