//! Chat-completion wire types.

use serde::{Deserialize, Serialize};

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    /// Model id.
    pub model: &'a str,
    /// Conversation, system prompt first.
    pub messages: Vec<ChatMessage<'a>>,
    /// Sampling temperature.
    pub temperature: f32,
}

/// One message in a chat request.
#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    /// `system` or `user`.
    pub role: &'a str,
    /// Message text.
    pub content: &'a str,
}

/// Response body of a chat completion.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Generated choices; the first one is used.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A generated choice.
#[derive(Debug, Deserialize)]
pub struct Choice {
    /// The generated message.
    pub message: ChoiceMessage,
}

/// Message of a generated choice.
#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    /// Text content; some providers send `null`.
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// The first choice's text, trimmed, if non-empty.
    #[must_use]
    pub fn text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
    }
}
