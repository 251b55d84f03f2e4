//! Telegram Bot API notifications.
//!
//! Notifications are side effects of already-committed state changes. They
//! are sent at most once from a spawned task; failures are logged and never
//! reach the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use nutricoach_core::{UserId, REFERRAL_BONUS_DAYS};

/// Error sending a message.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Bot API rejected the message.
    #[error("Bot API error: {0}")]
    Api(u16),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Sends bot messages to users.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    api_url: String,
    bot_token: String,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("api_url", &self.api_url)
            .field("bot_token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Create a notifier for `bot_token` against the Bot API at `api_url`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Configuration` if the HTTP client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        })
    }

    /// Send `text` to `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the Bot API answers non-2xx.
    pub async fn send_message(&self, chat_id: UserId, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: chat_id.get(),
                text,
            })
            .send()
            .await
            // The URL embeds the bot token.
            .map_err(reqwest::Error::without_url)?;

        if !response.status().is_success() {
            return Err(NotifyError::Api(response.status().as_u16()));
        }
        Ok(())
    }

    /// Tell an inviter they earned the referral bonus. Returns immediately.
    pub fn referral_bonus(self: &Arc<Self>, inviter: UserId) -> tokio::task::JoinHandle<()> {
        let notifier = Arc::clone(self);
        tokio::spawn(async move {
            let text = format!(
                "A friend joined with your link: +{REFERRAL_BONUS_DAYS} days of subscription!"
            );
            match notifier.send_message(inviter, &text).await {
                Ok(()) => tracing::debug!(%inviter, "Referral notification sent"),
                Err(e) => tracing::warn!(%inviter, error = %e, "Referral notification failed"),
            }
        })
    }
}
