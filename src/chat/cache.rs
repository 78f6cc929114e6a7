//! Client-side cache of conversation message lists with two-phase optimistic sends.
//!
//! A send goes through an explicit [`SendMutation`]:
//! `apply_send` (speculative insert) → remote call → `confirm` or `roll_back`
//! → `settle` (invalidate what the server now owns).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, warn};

use crate::models::{ChatResponse, ConversationPage, Message, MessagePage, MessageStatus};

/// Cache slot for a conversation's messages. `Draft` holds a conversation the
/// server has not assigned an id to yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Draft,
    Conversation(String),
}

impl CacheKey {
    pub fn for_conversation(conversation_id: Option<&str>) -> Self {
        match conversation_id {
            Some(id) => CacheKey::Conversation(id.to_string()),
            None => CacheKey::Draft,
        }
    }
}

/// Ordered message list plus the server's total count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageList {
    pub messages: Vec<Message>,
    pub total_count: u64,
}

impl From<MessagePage> for MessageList {
    fn from(page: MessagePage) -> Self {
        Self { messages: page.messages, total_count: page.total_count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Applied,
    Confirmed,
    RolledBack,
}

/// One in-flight optimistic send. Created by [`MessageCache::apply_send`].
#[derive(Debug, Clone)]
pub struct SendMutation {
    target: CacheKey,
    user_temp_id: String,
    assistant_temp_id: String,
    request_conversation_id: Option<String>,
    captured_conversation_id: Option<String>,
    server_conversation_id: Option<String>,
    phase: MutationPhase,
}

impl SendMutation {
    pub fn target(&self) -> &CacheKey {
        &self.target
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    pub fn user_temp_id(&self) -> &str {
        &self.user_temp_id
    }

    pub fn assistant_temp_id(&self) -> &str {
        &self.assistant_temp_id
    }

    /// True when no conversation id existed when the send started.
    pub fn starts_new_conversation(&self) -> bool {
        self.request_conversation_id.is_none() && self.captured_conversation_id.is_none()
    }

    /// Server-returned id, else the id sent with the request, else the id
    /// captured when the mutation started.
    pub fn resolved_conversation_id(&self) -> Option<&str> {
        self.server_conversation_id
            .as_deref()
            .or(self.request_conversation_id.as_deref())
            .or(self.captured_conversation_id.as_deref())
    }
}

#[derive(Debug, Default)]
struct Entry {
    list: MessageList,
    stale: bool,
    version: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    conversations: HashMap<u32, ConversationPage>,
    conversations_stale: bool,
    conversations_version: u64,
}

impl CacheState {
    fn entry_mut(&mut self, key: &CacheKey) -> &mut Entry {
        self.entries.entry(key.clone()).or_default()
    }
}

/// Token returned by `begin_*_fetch`; a fetch whose token is outdated by
/// the time it lands is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Default)]
pub struct MessageCache {
    state: Mutex<CacheState>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn messages(&self, key: &CacheKey) -> Option<MessageList> {
        self.state().entries.get(key).map(|e| e.list.clone())
    }

    /// True when the entry is missing or has been invalidated.
    pub fn needs_fetch(&self, key: &CacheKey) -> bool {
        self.state().entries.get(key).map_or(true, |e| e.stale)
    }

    pub fn conversations(&self, page: u32) -> Option<ConversationPage> {
        self.state().conversations.get(&page).cloned()
    }

    pub fn conversations_need_fetch(&self, page: u32) -> bool {
        let state = self.state();
        state.conversations_stale || !state.conversations.contains_key(&page)
    }

    // ── Fetch bookkeeping ────────────────────────────────────────────────────

    /// Never creates the entry, so a fetch that fails leaves it missing or stale.
    pub fn begin_fetch(&self, key: &CacheKey) -> FetchTicket {
        FetchTicket(self.state().entries.get(key).map_or(0, |e| e.version))
    }

    /// Stores a fetched list unless the entry changed since `ticket` was taken.
    /// Locally failed temporary messages survive so they can still be retried.
    pub fn store_fetched(&self, key: &CacheKey, list: MessageList, ticket: FetchTicket) -> bool {
        let mut state = self.state();
        let entry = state.entry_mut(key);
        if entry.version != ticket.0 {
            debug!("Discarding stale message fetch for {key:?}");
            return false;
        }

        let failed: Vec<Message> = entry
            .list
            .messages
            .iter()
            .filter(|m| m.is_temporary() && m.status == MessageStatus::Failed)
            .cloned()
            .collect();

        entry.list = list;
        entry.list.messages.extend(failed);
        entry.stale = false;
        entry.version += 1;
        true
    }

    pub fn begin_conversations_fetch(&self) -> FetchTicket {
        FetchTicket(self.state().conversations_version)
    }

    pub fn store_conversations(&self, page: ConversationPage, ticket: FetchTicket) -> bool {
        let mut state = self.state();
        if state.conversations_version != ticket.0 {
            debug!("Discarding stale conversation list fetch");
            return false;
        }
        if state.conversations_stale {
            state.conversations.clear();
            state.conversations_stale = false;
        }
        state.conversations.insert(page.page, page);
        state.conversations_version += 1;
        true
    }

    // ── Invalidation ─────────────────────────────────────────────────────────

    pub fn invalidate(&self, key: &CacheKey) {
        let mut state = self.state();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.stale = true;
            entry.version += 1;
        }
    }

    pub fn invalidate_conversations(&self) {
        let mut state = self.state();
        state.conversations_stale = true;
        state.conversations_version += 1;
    }

    pub fn remove(&self, key: &CacheKey) {
        self.state().entries.remove(key);
    }

    pub fn clear(&self) {
        *self.state() = CacheState::default();
    }

    // ── Optimistic send ──────────────────────────────────────────────────────

    /// Appends a pending user message and a thinking assistant placeholder to
    /// the target list and bumps its total count by two.
    ///
    /// The target is `request_conversation_id`, else `captured_conversation_id`,
    /// else the draft slot.
    pub fn apply_send(
        &self,
        content: &str,
        request_conversation_id: Option<&str>,
        captured_conversation_id: Option<&str>,
    ) -> SendMutation {
        let target_id = request_conversation_id.or(captured_conversation_id);
        let target = CacheKey::for_conversation(target_id);
        let placeholder_conversation = target_id.unwrap_or_default();

        let user_message = Message::pending_user(placeholder_conversation, content);
        let assistant = Message::thinking_assistant(placeholder_conversation);

        let mut state = self.state();
        let entry = state.entry_mut(&target);
        entry.list.messages.push(user_message.clone());
        entry.list.messages.push(assistant.clone());
        entry.list.total_count += 2;
        entry.version += 1;

        debug!("Applied optimistic send to {target:?}");
        SendMutation {
            target,
            user_temp_id: user_message.id,
            assistant_temp_id: assistant.id,
            request_conversation_id: request_conversation_id.map(str::to_string),
            captured_conversation_id: captured_conversation_id.map(str::to_string),
            server_conversation_id: None,
            phase: MutationPhase::Applied,
        }
    }

    /// Swaps the placeholders for the server's records. A draft list moves
    /// under the conversation id the server assigned.
    pub fn confirm(&self, mutation: &mut SendMutation, response: &ChatResponse) {
        if mutation.phase != MutationPhase::Applied {
            warn!("Ignoring confirm for a mutation in phase {:?}", mutation.phase);
            return;
        }
        mutation.server_conversation_id = response
            .conversation_id
            .clone()
            .or_else(|| Some(response.ai_message.conversation_id.clone()))
            .filter(|id| !id.is_empty());
        mutation.phase = MutationPhase::Confirmed;

        let mut state = self.state();
        let Some(mut entry) = state.entries.remove(&mutation.target) else {
            return;
        };
        for message in entry.list.messages.iter_mut() {
            if message.id == mutation.user_temp_id {
                *message = response.user_message.clone();
            } else if message.id == mutation.assistant_temp_id {
                *message = response.ai_message.clone();
            }
        }
        entry.version += 1;

        let destination = match (&mutation.target, mutation.resolved_conversation_id()) {
            (CacheKey::Draft, Some(id)) => CacheKey::Conversation(id.to_string()),
            (target, _) => target.clone(),
        };
        state.entries.insert(destination, entry);
    }

    /// Undoes this mutation only: its assistant placeholder is dropped, its
    /// user message stays in place marked failed so it can be retried, and
    /// the two counted messages come off the total. Other sends to the same
    /// list are untouched.
    pub fn roll_back(&self, mutation: &mut SendMutation) {
        if mutation.phase != MutationPhase::Applied {
            warn!("Ignoring rollback for a mutation in phase {:?}", mutation.phase);
            return;
        }
        mutation.phase = MutationPhase::RolledBack;

        let mut state = self.state();
        let Some(entry) = state.entries.get_mut(&mutation.target) else {
            return;
        };
        let before = entry.list.messages.len();
        entry.list.messages.retain(|m| m.id != mutation.assistant_temp_id);
        let mut found = entry.list.messages.len() != before;
        if let Some(message) = entry
            .list
            .messages
            .iter_mut()
            .find(|m| m.id == mutation.user_temp_id)
        {
            message.status = MessageStatus::Failed;
            message.updated_at = Utc::now();
            found = true;
        }
        if found {
            entry.list.total_count = entry.list.total_count.saturating_sub(2);
        }
        entry.version += 1;
        debug!("Rolled back optimistic send on {:?}", mutation.target);
    }

    /// Invalidates the resolved conversation's list, and the conversation
    /// list when the send started a new conversation. Runs on every outcome.
    pub fn settle(&self, mutation: &SendMutation) -> Option<String> {
        let resolved = mutation.resolved_conversation_id().map(str::to_string);
        if let Some(id) = &resolved {
            self.invalidate(&CacheKey::Conversation(id.clone()));
        }
        if mutation.starts_new_conversation() {
            self.invalidate_conversations();
        }
        resolved
    }

    // ── Placeholder helpers ──────────────────────────────────────────────────

    /// Moves a thinking placeholder to its next stage label, stopping at the last.
    pub fn advance_thinking_stage(&self, key: &CacheKey, message_id: &str) -> Option<usize> {
        let mut state = self.state();
        let entry = state.entries.get_mut(key)?;
        let message = entry
            .list
            .messages
            .iter_mut()
            .find(|m| m.id == message_id && m.status == MessageStatus::Thinking)?;
        let progress = message.thinking.as_mut()?;
        if progress.current_stage + 1 < progress.stages.len() {
            progress.current_stage += 1;
        }
        Some(progress.current_stage)
    }

    /// Removes one message, returning it. Used to take a failed message back out for retry.
    pub fn take_message(&self, key: &CacheKey, message_id: &str) -> Option<Message> {
        let mut state = self.state();
        let entry = state.entries.get_mut(key)?;
        let index = entry.list.messages.iter().position(|m| m.id == message_id)?;
        entry.version += 1;
        Some(entry.list.messages.remove(index))
    }
}
