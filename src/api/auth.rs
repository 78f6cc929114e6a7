use serde_json::json;

use crate::errors::AppError;
use crate::http::{ApiClient, RequestOptions};
use crate::models::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest, User};

/// Exchanges credentials for a token pair and the signed-in user.
/// A 401 here means bad credentials, so no refresh is attempted.
pub async fn login(client: &ApiClient, request: &LoginRequest) -> Result<AuthResponse, AppError> {
    client
        .request_json("/auth/login", RequestOptions::post().json(request)?.without_refresh())
        .await
}

/// Asks the server to invalidate the current session.
pub async fn logout(client: &ApiClient) -> Result<(), AppError> {
    client.request("/auth/logout", RequestOptions::post()).await?;
    Ok(())
}

pub async fn register(
    client: &ApiClient,
    request: &RegisterRequest,
) -> Result<MessageResponse, AppError> {
    client
        .request_json("/auth/register", RequestOptions::post().json(request)?.without_refresh())
        .await
}

/// Confirms an email address with the token from the verification mail.
pub async fn verify_email(client: &ApiClient, token: &str) -> Result<MessageResponse, AppError> {
    let options = RequestOptions::post().json(&json!({ "token": token }))?.without_refresh();
    client.request_json("/auth/verify-email", options).await
}

/// Profile of the user owning the current access token.
pub async fn current_user(client: &ApiClient) -> Result<User, AppError> {
    client.request_json("/auth/me", RequestOptions::get()).await
}
