//! Identity-provider completion delivered through URL query parameters.

use url::Url;

use crate::errors::AppError;

/// Every query parameter this callback consumes; all are stripped afterwards.
const CALLBACK_PARAMS: [&str; 12] = [
    "access_token",
    "refresh_token",
    "user_id",
    "email",
    "username",
    "provider",
    "expires_in",
    "is_first_login",
    "is_profile_complete",
    "is_new_user",
    "error",
    "error_description",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSuccess {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub provider: Option<String>,
    pub expires_in: Option<u64>,
    pub is_first_login: bool,
    pub is_profile_complete: bool,
    pub is_new_user: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthCallback {
    Success(OAuthSuccess),
    Failure { code: String, description: String },
}

impl OAuthCallback {
    pub fn into_result(self) -> Result<OAuthSuccess, AppError> {
        match self {
            OAuthCallback::Success(success) => Ok(success),
            OAuthCallback::Failure { code, description } => Err(AppError::OAuth { code, description }),
        }
    }
}

fn param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn flag(url: &Url, name: &str) -> bool {
    param(url, name).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1"))
}

/// Reads the callback parameters. `None` when the URL carries neither an
/// error nor a complete token set (an ordinary page load).
pub fn parse(url: &Url) -> Option<OAuthCallback> {
    if let Some(code) = param(url, "error") {
        let description = param(url, "error_description").unwrap_or_else(|| code.clone());
        return Some(OAuthCallback::Failure { code, description });
    }

    let access_token = param(url, "access_token")?;
    let refresh_token = param(url, "refresh_token")?;
    let user_id = param(url, "user_id")?;

    Some(OAuthCallback::Success(OAuthSuccess {
        access_token,
        refresh_token,
        user_id,
        email: param(url, "email").unwrap_or_default(),
        username: param(url, "username").unwrap_or_default(),
        provider: param(url, "provider"),
        expires_in: param(url, "expires_in").and_then(|v| v.parse().ok()),
        is_first_login: flag(url, "is_first_login"),
        is_profile_complete: flag(url, "is_profile_complete"),
        is_new_user: flag(url, "is_new_user"),
    }))
}

/// Copy of `url` without any callback parameter. Unrelated parameters and
/// the fragment are preserved.
pub fn strip(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !CALLBACK_PARAMS.contains(&&**key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned
}

/// Parses a raw callback URL and returns what it carried plus the cleaned URL.
pub fn consume(raw_url: &str) -> Result<(Option<OAuthCallback>, Url), AppError> {
    let url = Url::parse(raw_url).map_err(|e| AppError::InvalidField {
        field_name: "url".to_string(),
        reason: e.to_string(),
    })?;
    Ok((parse(&url), strip(&url)))
}
