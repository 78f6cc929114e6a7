use serde_json::json;

use crate::errors::AppError;
use crate::http::{ApiClient, RequestOptions};
use crate::models::{
    ChatRequest, ChatResponse, Conversation, ConversationPage, ConversationSummary, MessagePage,
};

/// Sends a chat message. Without a `conversation_id` the server starts a new conversation.
pub async fn send_message(client: &ApiClient, request: &ChatRequest) -> Result<ChatResponse, AppError> {
    client.request_json("/chat/message", RequestOptions::post().json(request)?).await
}

pub async fn list_conversations(
    client: &ApiClient,
    page: u32,
    page_size: u32,
) -> Result<ConversationPage, AppError> {
    let options = RequestOptions::get().query("page", page).query("page_size", page_size);
    client.request_json("/chat/conversations", options).await
}

pub async fn create_conversation(
    client: &ApiClient,
    title: Option<&str>,
) -> Result<Conversation, AppError> {
    let options = RequestOptions::post().json(&json!({ "title": title }))?;
    client.request_json("/chat/conversations", options).await
}

pub async fn update_conversation(
    client: &ApiClient,
    conversation_id: &str,
    title: &str,
) -> Result<Conversation, AppError> {
    let options = RequestOptions::put().json(&json!({ "title": title }))?;
    client
        .request_json(&format!("/chat/conversations/{conversation_id}"), options)
        .await
}

pub async fn delete_conversation(client: &ApiClient, conversation_id: &str) -> Result<(), AppError> {
    client
        .request(&format!("/chat/conversations/{conversation_id}"), RequestOptions::delete())
        .await?;
    Ok(())
}

/// Fetches one page of a conversation's messages, oldest first.
pub async fn list_messages(
    client: &ApiClient,
    conversation_id: &str,
    page: u32,
    page_size: u32,
) -> Result<MessagePage, AppError> {
    let options = RequestOptions::get().query("page", page).query("page_size", page_size);
    client
        .request_json(&format!("/chat/conversations/{conversation_id}/messages"), options)
        .await
}

pub async fn mark_read(client: &ApiClient, conversation_id: &str) -> Result<(), AppError> {
    client
        .request(&format!("/chat/conversations/{conversation_id}/read"), RequestOptions::post())
        .await?;
    Ok(())
}

pub async fn conversation_summary(
    client: &ApiClient,
    conversation_id: &str,
) -> Result<ConversationSummary, AppError> {
    client
        .request_json(
            &format!("/chat/conversations/{conversation_id}/summary"),
            RequestOptions::get(),
        )
        .await
}
