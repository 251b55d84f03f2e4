//! Telegram Mini-App init data verification.
//!
//! The Mini-App sends its launch parameters as a URL query string. Every field
//! except `hash` is signed: the fields are sorted by key, rendered as
//! `key=value` lines joined with `\n`, and signed with HMAC-SHA256 under a key
//! derived from the bot token (see [`webapp_secret`]).
//!
//! [`verify`] is pure and never touches storage.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use serde_json::Value;

use nutricoach_core::UserId;

use crate::crypto::{constant_time_eq, hmac_sha256_hex, webapp_secret};

/// Why an init data payload was rejected.
///
/// The display strings are returned to clients as the 401 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `hash` field, or an empty one.
    #[error("Missing hash")]
    MissingHash,

    /// The signature does not match.
    #[error("Invalid hash")]
    InvalidHash,

    /// The payload could not be decoded, or carries no usable user id.
    #[error("Malformed payload")]
    MalformedPayload,
}

/// Identity extracted from a verified payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustedIdentity {
    /// Telegram user id, when the `user` field carried one.
    pub user_id: Option<UserId>,
    /// Telegram username, as sent.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// `auth_date` as sent (unix seconds).
    pub auth_date: Option<String>,
    /// Every signed field, decoded.
    pub raw_fields: BTreeMap<String, String>,
}

/// Verify `init_data` against `bot_token`.
///
/// Duplicate keys keep their last value.
///
/// # Errors
///
/// - [`AuthError::MalformedPayload`] if the query string cannot be decoded.
/// - [`AuthError::MissingHash`] if `hash` is absent or empty.
/// - [`AuthError::InvalidHash`] if the signature does not match.
pub fn verify(init_data: &str, bot_token: &str) -> Result<TrustedIdentity, AuthError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(init_data).map_err(|_| AuthError::MalformedPayload)?;
    let mut fields: BTreeMap<String, String> = pairs.into_iter().collect();

    let received = fields
        .remove("hash")
        .filter(|hash| !hash.is_empty())
        .ok_or(AuthError::MissingHash)?;

    let calculated = signature(&fields, bot_token);
    if !constant_time_eq(&calculated, &received.to_ascii_lowercase()) {
        return Err(AuthError::InvalidHash);
    }

    let user = fields.get("user").map(|raw| parse_user(raw)).unwrap_or_default();
    let text = |key: &str| user.get(key).and_then(Value::as_str).map(str::to_string);

    Ok(TrustedIdentity {
        user_id: user.get("id").and_then(Value::as_i64).map(UserId::new),
        username: text("username"),
        first_name: text("first_name"),
        last_name: text("last_name"),
        auth_date: fields.get("auth_date").cloned(),
        raw_fields: fields,
    })
}

/// Build a signed init data query string from `fields`.
///
/// Used by clients that mint their own launch parameters, such as tests and
/// local tooling.
#[must_use]
pub fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let signed: BTreeMap<String, String> = fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let hash = signature(&signed, bot_token);

    let mut pairs: Vec<(&str, &str)> = fields.to_vec();
    pairs.push(("hash", &hash));
    // Serializing plain string pairs cannot fail.
    serde_urlencoded::to_string(pairs).unwrap_or_default()
}

fn signature(fields: &BTreeMap<String, String>, bot_token: &str) -> String {
    let check_string = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");
    hmac_sha256_hex(&webapp_secret(bot_token), check_string.as_bytes())
}

/// Parse the `user` field. Some clients percent-encode it twice, so one more
/// decoding pass is tried before giving up.
fn parse_user(raw: &str) -> serde_json::Map<String, Value> {
    let parsed = serde_json::from_str::<Value>(raw).ok().or_else(|| {
        percent_decode_str(raw)
            .decode_utf8()
            .ok()
            .and_then(|decoded| serde_json::from_str::<Value>(&decoded).ok())
    });
    match parsed {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}
