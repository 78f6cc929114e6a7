//! Advisory JWT inspection.
//!
//! Tokens are decoded WITHOUT signature verification. The claims are a UI
//! convenience only (restoring a user id, guessing expiry) and must never be
//! used for authorization decisions; the backend remains the authority.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

/// Claims the client cares about. Unknown claims are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Claims {
    #[serde(default, deserialize_with = "optional_subject")]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn optional_subject<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Decodes the payload segment of a compact token.
///
/// Returns `None` unless there are exactly three dot-separated segments and
/// the middle one is base64url JSON.
pub fn decode(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }
    // Some encoders keep the padding; the URL-safe no-pad engine rejects it.
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// True when the token is undecodable, has no `exp`, or `now >= exp`.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp_millis())
}

/// [`is_expired`] against an explicit clock, in epoch milliseconds.
pub fn is_expired_at(token: &str, now_ms: i64) -> bool {
    match decode(token).and_then(|claims| claims.exp) {
        Some(exp) => now_ms >= exp.saturating_mul(1000),
        None => true,
    }
}

/// Subject claim, if the token decodes and carries one.
pub fn user_id(token: &str) -> Option<String> {
    decode(token)?.sub
}

/// Seconds until `exp`, if the token decodes, has an `exp` and is still live.
pub fn remaining_lifetime_secs(token: &str) -> Option<u64> {
    let exp = decode(token)?.exp?;
    let remaining = exp - Utc::now().timestamp();
    u64::try_from(remaining).ok().filter(|secs| *secs > 0)
}
