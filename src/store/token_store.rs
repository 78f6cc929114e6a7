use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::store::KvStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";

/// Snapshot of the persisted credentials. `expires_at_ms` is absolute epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at_ms: i64,
}

/// Sole owner of the persisted access/refresh token pair.
/// Pure local persistence: no validation and no network.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn KvStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self { backend }
    }

    /// Underlying key-value store, shared with other persisted session data.
    pub fn backend(&self) -> &Arc<dyn KvStore> {
        &self.backend
    }

    /// Persists both tokens and an absolute expiry of now + `expires_in_secs`.
    /// The three fields are written together; on error none of them changed.
    pub fn set_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_in_secs: u64,
    ) -> Result<(), AppError> {
        let lifetime_ms = i64::try_from(expires_in_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(lifetime_ms);

        let expires_at_raw = expires_at.to_string();
        self.backend.set_many(&[
            (ACCESS_TOKEN_KEY, access_token),
            (REFRESH_TOKEN_KEY, refresh_token),
            (TOKEN_EXPIRY_KEY, &expires_at_raw),
        ])?;
        debug!("Stored token pair expiring at {expires_at}");
        Ok(())
    }

    pub fn access_token(&self) -> Option<String> {
        self.backend.get(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.backend.get(REFRESH_TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn expires_at_ms(&self) -> Option<i64> {
        self.backend.get(TOKEN_EXPIRY_KEY).and_then(|raw| raw.parse().ok())
    }

    /// All three persisted fields, or `None` if any is missing.
    pub fn tokens(&self) -> Option<StoredTokens> {
        Some(StoredTokens {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token()?,
            expires_at_ms: self.expires_at_ms()?,
        })
    }

    /// Removes every token field. Failures are logged and the remaining keys
    /// are still attempted, so a partial clear never leaves the access token behind.
    pub fn clear_tokens(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_EXPIRY_KEY] {
            if let Err(e) = self.backend.remove(key) {
                warn!("Failed to clear {key}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileStore, MemoryStore};

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn set_tokens_computes_absolute_expiry() {
        let tokens = store();
        let before = Utc::now().timestamp_millis();
        tokens.set_tokens("access", "refresh", 3600).unwrap();
        let after = Utc::now().timestamp_millis();

        let stored = tokens.tokens().unwrap();
        assert_eq!(stored.access_token, "access");
        assert_eq!(stored.refresh_token, "refresh");
        assert!(stored.expires_at_ms >= before + 3_600_000);
        assert!(stored.expires_at_ms <= after + 3_600_000);
    }

    #[test]
    fn clear_removes_every_field() {
        let tokens = store();
        tokens.set_tokens("a", "r", 60).unwrap();
        tokens.clear_tokens();
        assert_eq!(tokens.access_token(), None);
        assert_eq!(tokens.refresh_token(), None);
        assert_eq!(tokens.expires_at_ms(), None);
        assert_eq!(tokens.tokens(), None);
    }

    #[test]
    fn failed_persist_keeps_previous_pair() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let tokens = TokenStore::new(Arc::new(FileStore::open(&path)));
        tokens.set_tokens("old-access", "old-refresh", 60).unwrap();

        // A directory in place of the state file makes the next write fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(tokens.set_tokens("new-access", "new-refresh", 60).is_err());
        assert_eq!(tokens.access_token().as_deref(), Some("old-access"));
        assert_eq!(tokens.refresh_token().as_deref(), Some("old-refresh"));
    }

    #[test]
    fn missing_token_reads_as_none() {
        assert_eq!(store().access_token(), None);
    }
}
