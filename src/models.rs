use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Prefix carried by every client-generated message id. Server ids are numeric,
/// so the two can never collide.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Labels shown progressively on the assistant placeholder while a reply is pending.
pub const THINKING_STAGES: [&str; 4] = [
    "Reading your message",
    "Reviewing your nutrition log",
    "Consulting nutrition guidelines",
    "Writing a reply",
];

/// Accepts ids encoded either as JSON numbers or strings.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "id_string")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl User {
    /// Minimal user rebuilt from nothing but a token subject.
    pub fn from_subject(subject: impl Into<String>) -> Self {
        Self {
            id: subject.into(),
            email: String::new(),
            username: String::new(),
            full_name: None,
        }
    }
}

/// Credentials handed to the token store after a login or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

pub(crate) fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    pub user: User,
}

impl AuthResponse {
    pub fn token_pair(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_in: self.expires_in,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

// ── Conversations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub unread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSummary {
    #[serde(deserialize_with = "id_string")]
    pub conversation_id: String,
    pub summary: String,
    #[serde(default)]
    pub message_count: u64,
}

// ── Messages ─────────────────────────────────────────────────────────────────

/// Delivery state of a message. Server payloads are matched case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MessageStatus {
    Pending,
    Thinking,
    #[default]
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Thinking => "thinking",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MessageStatus {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MessageStatus::Pending),
            "thinking" => Ok(MessageStatus::Thinking),
            "sent" => Ok(MessageStatus::Sent),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(format!("Unknown message status: {other}")),
        }
    }
}

/// Progress through [`THINKING_STAGES`] on an assistant placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingProgress {
    pub stages: Vec<String>,
    pub current_stage: usize,
}

impl ThinkingProgress {
    pub fn new() -> Self {
        Self {
            stages: THINKING_STAGES.iter().map(|s| s.to_string()).collect(),
            current_stage: 0,
        }
    }

    pub fn current_label(&self) -> Option<&str> {
        self.stages.get(self.current_stage).map(String::as_str)
    }
}

impl Default for ThinkingProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub conversation_id: String,
    pub is_user_message: bool,
    pub content: String,
    #[serde(default)]
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingProgress>,
}

impl Message {
    /// Client-side user message awaiting server confirmation.
    pub fn pending_user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{TEMP_ID_PREFIX}user-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            is_user_message: true,
            content: content.into(),
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
            thinking: None,
        }
    }

    /// Client-side assistant placeholder shown while the reply is generated.
    pub fn thinking_assistant(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: format!("{TEMP_ID_PREFIX}assistant-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            is_user_message: false,
            content: String::new(),
            status: MessageStatus::Thinking,
            created_at: now,
            updated_at: now,
            thinking: Some(ThinkingProgress::new()),
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub total_count: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "optional_id_string")]
    pub conversation_id: Option<String>,
    pub user_message: Message,
    pub ai_message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_ids_both_deserialize() {
        let user: User =
            serde_json::from_str(r#"{"id": 42, "email": "a@b.c", "username": "ann"}"#).unwrap();
        assert_eq!(user.id, "42");
        let user: User = serde_json::from_str(r#"{"id": "u-1"}"#).unwrap();
        assert_eq!(user.id, "u-1");
        assert_eq!(user.full_name, None);
    }

    #[test]
    fn temporary_ids_are_prefixed() {
        let user_msg = Message::pending_user("", "hi");
        let assistant = Message::thinking_assistant("");
        assert!(user_msg.is_temporary());
        assert!(assistant.is_temporary());
        assert_ne!(user_msg.id, assistant.id);
        assert_eq!(assistant.status, MessageStatus::Thinking);
        assert_eq!(
            assistant.thinking.as_ref().and_then(|t| t.current_label()),
            Some(THINKING_STAGES[0])
        );
    }

    #[test]
    fn server_message_defaults_to_sent() {
        let msg: Message = serde_json::from_str(
            r#"{"id": 7, "conversation_id": 3, "is_user_message": false, "content": "ok",
                "created_at": "2024-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.id, "7");
        assert_eq!(msg.conversation_id, "3");
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(!msg.is_temporary());
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(MessageStatus::try_from("FAILED".to_string()), Ok(MessageStatus::Failed));
        assert!(MessageStatus::try_from("read".to_string()).is_err());
        assert_eq!(MessageStatus::Thinking.to_string(), "thinking");
    }

    #[test]
    fn status_is_read_case_insensitively_and_unknown_is_rejected() {
        let status: MessageStatus = serde_json::from_str(r#""Failed""#).unwrap();
        assert_eq!(status, MessageStatus::Failed);
        assert!(serde_json::from_str::<MessageStatus>(r#""read""#).is_err());
        assert_eq!(serde_json::to_string(&MessageStatus::Pending).unwrap(), r#""pending""#);
    }
}
