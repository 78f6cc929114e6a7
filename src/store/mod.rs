//! Key-value persistence standing in for browser local storage.
//!
//! All reads and writes are synchronous and last-write-wins. There is no
//! cross-process coordination.

pub mod file_store;
pub mod token_store;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::errors::AppError;

pub use file_store::FileStore;
pub use token_store::{StoredTokens, TokenStore};

/// Persistence contract used by [`TokenStore`] and the session controller.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Writes every pair or none of them.
    fn set_many(&self, pairs: &[(&str, &str)]) -> Result<(), AppError>;

    fn remove(&self, key: &str) -> Result<(), AppError>;

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.set_many(&[(key, value)])
    }
}

/// In-process store, used by tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> Result<(), AppError> {
        let mut entries = self.entries();
        for (key, value) in pairs {
            entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries().remove(key);
        Ok(())
    }
}
