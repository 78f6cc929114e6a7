use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};

use crate::api;
use crate::chat::{CacheKey, MessageCache, MessageList};
use crate::errors::AppError;
use crate::http::ApiClient;
use crate::models::{ChatRequest, ChatResponse, ConversationPage, ConversationSummary, MessageStatus};

const MAX_MESSAGE_LENGTH: usize = 8000;
const MESSAGE_PAGE_SIZE: u32 = 50;
pub const CONVERSATION_PAGE_SIZE: u32 = 20;

/// Chat flows on top of [`MessageCache`]: optimistic sends, cached reads and
/// conversation management. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct ChatService {
    api: ApiClient,
    cache: Arc<MessageCache>,
    active_conversation: Arc<Mutex<Option<String>>>,
}

impl ChatService {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            cache: Arc::new(MessageCache::new()),
            active_conversation: Arc::new(Mutex::new(None)),
        }
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    fn active(&self) -> MutexGuard<'_, Option<String>> {
        self.active_conversation.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active_conversation(&self) -> Option<String> {
        self.active().clone()
    }

    pub fn select_conversation(&self, conversation_id: Option<String>) {
        *self.active() = conversation_id;
    }

    fn validate(message: &str) -> Result<(), AppError> {
        if message.trim().is_empty() {
            return Err(AppError::empty_field("message"));
        }
        let length = message.chars().count();
        if length > MAX_MESSAGE_LENGTH {
            return Err(AppError::FieldTooLong {
                field_name: "message".to_string(),
                max_length: MAX_MESSAGE_LENGTH,
                actual_length: length,
            });
        }
        Ok(())
    }

    /// Sends a message with optimistic placeholders.
    ///
    /// Without an explicit `conversation_id` the message goes to the active
    /// conversation; call `select_conversation(None)` first to start a new one.
    /// The placeholders are in the cache before the request is dispatched.
    /// After the call settles, the resolved conversation's list (and the
    /// conversation list, for a new conversation) is invalidated.
    pub async fn send_message(
        &self,
        content: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatResponse, AppError> {
        Self::validate(content)?;

        let captured = self.active_conversation();
        let mut mutation = self.cache.apply_send(content, conversation_id, captured.as_deref());

        // The request must address the list the placeholders went into.
        let request = ChatRequest {
            message: content.to_string(),
            conversation_id: mutation.resolved_conversation_id().map(str::to_string),
        };
        let result = api::chat::send_message(&self.api, &request).await;

        match &result {
            Ok(response) => self.cache.confirm(&mut mutation, response),
            Err(e) => {
                error!("Failed to send chat message: {e}");
                self.cache.roll_back(&mut mutation);
            }
        }

        let resolved = self.cache.settle(&mutation);
        if result.is_ok() && resolved.is_some() {
            *self.active() = resolved;
        }
        result
    }

    /// Removes a failed placeholder and sends its content again.
    pub async fn retry_failed(
        &self,
        key: &CacheKey,
        message_id: &str,
    ) -> Result<ChatResponse, AppError> {
        let failed = self
            .cache
            .messages(key)
            .and_then(|list| list.messages.into_iter().find(|m| m.id == message_id))
            .filter(|m| m.status == MessageStatus::Failed)
            .ok_or_else(|| AppError::Unexpected(format!("No failed message {message_id} to retry")))?;

        self.cache.take_message(key, message_id);
        let conversation_id = match key {
            CacheKey::Conversation(id) => Some(id.as_str()),
            CacheKey::Draft => None,
        };
        info!("Retrying failed message {message_id}");
        self.send_message(&failed.content, conversation_id).await
    }

    /// Messages of a conversation, served from cache unless stale.
    pub async fn messages(&self, conversation_id: &str) -> Result<MessageList, AppError> {
        let key = CacheKey::Conversation(conversation_id.to_string());
        if !self.cache.needs_fetch(&key) {
            if let Some(list) = self.cache.messages(&key) {
                return Ok(list);
            }
        }

        let ticket = self.cache.begin_fetch(&key);
        let page = api::chat::list_messages(&self.api, conversation_id, 1, MESSAGE_PAGE_SIZE)
            .await
            .inspect_err(|e| error!("Failed to load messages for {conversation_id}: {e}"))?;
        let fetched = MessageList::from(page);
        if !self.cache.store_fetched(&key, fetched.clone(), ticket) {
            debug!("Message list for {conversation_id} changed during fetch");
        }
        Ok(self.cache.messages(&key).unwrap_or(fetched))
    }

    /// One page of conversations, served from cache unless stale.
    pub async fn conversations(&self, page: u32) -> Result<ConversationPage, AppError> {
        if !self.cache.conversations_need_fetch(page) {
            if let Some(cached) = self.cache.conversations(page) {
                return Ok(cached);
            }
        }
        let ticket = self.cache.begin_conversations_fetch();
        let fetched = api::chat::list_conversations(&self.api, page, CONVERSATION_PAGE_SIZE).await?;
        self.cache.store_conversations(fetched.clone(), ticket);
        Ok(fetched)
    }

    pub async fn rename_conversation(&self, conversation_id: &str, title: &str) -> Result<(), AppError> {
        if title.trim().is_empty() {
            return Err(AppError::empty_field("title"));
        }
        api::chat::update_conversation(&self.api, conversation_id, title.trim()).await?;
        self.cache.invalidate_conversations();
        Ok(())
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), AppError> {
        api::chat::delete_conversation(&self.api, conversation_id).await?;
        self.cache.remove(&CacheKey::Conversation(conversation_id.to_string()));
        self.cache.invalidate_conversations();
        let mut active = self.active();
        if active.as_deref() == Some(conversation_id) {
            *active = None;
        }
        Ok(())
    }

    pub async fn mark_read(&self, conversation_id: &str) -> Result<(), AppError> {
        api::chat::mark_read(&self.api, conversation_id).await?;
        self.cache.invalidate_conversations();
        Ok(())
    }

    pub async fn summary(&self, conversation_id: &str) -> Result<ConversationSummary, AppError> {
        api::chat::conversation_summary(&self.api, conversation_id).await
    }

    /// Drops every cached list, e.g. after sign-out.
    pub fn reset(&self) {
        self.cache.clear();
        *self.active() = None;
    }
}
