use thiserror::Error;

const NETWORK_MESSAGE: &str =
    "Unable to reach the server. Please check your connection and try again.";
const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Single client-side error value. Every variant renders a human-readable
/// message, so callers only ever need `to_string()` or [`AppError::user_message`].
#[derive(Debug, Error)]
pub enum AppError {
    // ── Validation errors ────────────────────────────────────────────────────
    #[error("Field '{field_name}' cannot be empty")]
    EmptyField { field_name: String },

    #[error("Field '{field_name}' exceeds max length of {max_length} (actual: {actual_length})")]
    FieldTooLong { field_name: String, max_length: usize, actual_length: usize },

    #[error("Field '{field_name}' is invalid: {reason}")]
    InvalidField { field_name: String, reason: String },

    // ── Authentication errors ────────────────────────────────────────────────
    #[error("Session expired. Please log in again.")]
    SessionExpired,

    // ── API errors ───────────────────────────────────────────────────────────
    /// Non-2xx response. `message` is the server's `detail` when present,
    /// otherwise `HTTP <status>`.
    #[error("{message}")]
    Api { status: u16, message: String },

    // ── Transport / parsing errors ───────────────────────────────────────────
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // ── Local errors ─────────────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ── OAuth errors ─────────────────────────────────────────────────────────
    #[error("Sign-in with the identity provider failed: {description}")]
    OAuth { code: String, description: String },

    // ── System errors ────────────────────────────────────────────────────────
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn empty_field(field_name: impl Into<String>) -> Self {
        AppError::EmptyField { field_name: field_name.into() }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::EmptyField { .. }
                | AppError::FieldTooLong { .. }
                | AppError::InvalidField { .. }
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::SessionExpired | AppError::Api { status: 401, .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, AppError::Network(_))
    }

    /// Message suitable for showing to an end user.
    ///
    /// Transport failures collapse to a generic connectivity message and
    /// parse/unexpected failures to a generic fallback; everything else is
    /// shown as-is.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(_) => NETWORK_MESSAGE.to_string(),
            AppError::Parse(_) | AppError::Unexpected(_) => FALLBACK_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
