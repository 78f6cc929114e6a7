use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::errors::AppError;
use crate::models::{RefreshResponse, TokenPair};
use crate::store::TokenStore;

const REFRESH_PATH: &str = "/auth/refresh";

/// Per-request settings for [`ApiClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Whether a 401 may trigger the one-shot refresh-and-retry.
    pub refresh_on_unauthorized: bool,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self { method, query: Vec::new(), body: None, refresh_on_unauthorized: true }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, AppError> {
        let value = serde_json::to_value(body)
            .map_err(|e| AppError::Unexpected(format!("Serialize error: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Used by auth endpoints, whose 401s mean bad credentials rather than a stale token.
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: TokenStore,
    /// Single-flight gate: concurrent 401s wait here and reuse one refresh.
    refresh_gate: Mutex<()>,
}

/// REST client that attaches the bearer token and performs at most one
/// refresh-and-retry per call. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, tokens: TokenStore) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            inner: Arc::new(Inner { http, config, tokens, refresh_gate: Mutex::new(()) }),
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Issues a request and returns the parsed JSON body, or `{"success": true}`
    /// for non-JSON responses.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, AppError> {
        let sent_token = self.inner.tokens.access_token();
        let response = self.send(path, &options, sent_token.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && options.refresh_on_unauthorized
            && self.inner.tokens.refresh_token().is_some()
        {
            debug!("{} {path} returned 401, refreshing token", options.method);
            let fresh_token = self.refresh_after_unauthorized(sent_token.as_deref()).await?;
            let retried = self.send(path, &options, Some(&fresh_token)).await?;
            return read_response(retried).await;
        }

        read_response(response).await
    }

    /// [`request`](Self::request) followed by typed deserialization.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, AppError> {
        let value = self.request(path, options).await?;
        serde_json::from_value(value).map_err(|e| {
            error!("Unexpected response shape from {path}: {e}");
            AppError::Parse(format!("Unexpected response from {path}: {e}"))
        })
    }

    async fn send(
        &self,
        path: &str,
        options: &RequestOptions,
        access_token: Option<&str>,
    ) -> Result<Response, AppError> {
        let url = self.inner.config.endpoint_url(path);
        let mut builder = self.inner.http.request(options.method.clone(), &url);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(token) = access_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            error!("{} {url} failed before a response arrived: {e}", options.method);
            AppError::Network(e.to_string())
        })
    }

    /// Returns an access token to retry with, refreshing at most once across
    /// concurrent callers. On refresh failure all tokens are cleared.
    async fn refresh_after_unauthorized(&self, stale_token: Option<&str>) -> Result<String, AppError> {
        let _gate = self.inner.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited on the gate.
        if let Some(current) = self.inner.tokens.access_token() {
            if stale_token != Some(current.as_str()) {
                debug!("Token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.inner.tokens.refresh_token() else {
            self.inner.tokens.clear_tokens();
            return Err(AppError::SessionExpired);
        };

        match self.refresh_tokens(&refresh_token).await {
            Ok(pair) => {
                self.inner
                    .tokens
                    .set_tokens(&pair.access_token, &pair.refresh_token, pair.expires_in)?;
                info!("Access token refreshed");
                Ok(pair.access_token)
            }
            Err(e) => {
                warn!("Token refresh failed, clearing session: {e}");
                self.inner.tokens.clear_tokens();
                Err(AppError::SessionExpired)
            }
        }
    }

    /// Exchanges a refresh token for a new pair. Keeps the old refresh token
    /// when the server does not rotate it.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let options = RequestOptions::post()
            .json(&json!({ "refresh_token": refresh_token }))?
            .without_refresh();
        let response = self.send(REFRESH_PATH, &options, None).await?;
        let value = read_response(response).await?;
        let refreshed: RefreshResponse = serde_json::from_value(value)
            .map_err(|e| AppError::Parse(format!("Unexpected refresh response: {e}")))?;

        Ok(TokenPair {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.unwrap_or_else(|| refresh_token.to_string()),
            expires_in: refreshed.expires_in,
        })
    }
}

async fn read_response(response: Response) -> Result<Value, AppError> {
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    let body = response
        .text()
        .await
        .map_err(|e| AppError::Network(format!("Failed to read response body: {e}")))?;

    if !status.is_success() {
        let message = extract_error_detail(&body)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        warn!("Request failed with HTTP {}: {message}", status.as_u16());
        return Err(AppError::Api { status: status.as_u16(), message });
    }

    if !is_json || body.trim().is_empty() {
        return Ok(json!({ "success": true }));
    }

    serde_json::from_str(&body).map_err(|e| {
        error!("Failed to parse JSON response: {e}");
        AppError::Parse(e.to_string())
    })
}

/// Pulls a human-readable message out of an error body's `detail` field.
///
/// Accepts a plain string or a list of `{ "msg": ... }` validation entries.
pub fn extract_error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        Value::Object(obj) => obj.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_detail_is_used_verbatim() {
        assert_eq!(
            extract_error_detail(r#"{"detail": "Incorrect email or password"}"#).as_deref(),
            Some("Incorrect email or password")
        );
    }

    #[test]
    fn validation_detail_list_is_joined() {
        let body = r#"{"detail": [{"loc": ["body", "email"], "msg": "field required"},
                                  {"loc": ["body", "password"], "msg": "too short"}]}"#;
        assert_eq!(extract_error_detail(body).as_deref(), Some("field required; too short"));
    }

    #[test]
    fn missing_or_unusable_detail_yields_none() {
        assert_eq!(extract_error_detail("<html>oops</html>"), None);
        assert_eq!(extract_error_detail(r#"{"error": "x"}"#), None);
        assert_eq!(extract_error_detail(r#"{"detail": ""}"#), None);
        assert_eq!(extract_error_detail(r#"{"detail": []}"#), None);
    }

    #[test]
    fn request_options_builders() {
        let options = RequestOptions::get().query("page", 2).without_refresh();
        assert_eq!(options.method, Method::GET);
        assert_eq!(options.query, vec![("page".to_string(), "2".to_string())]);
        assert!(!options.refresh_on_unauthorized);
        assert!(RequestOptions::delete().refresh_on_unauthorized);
    }
}
