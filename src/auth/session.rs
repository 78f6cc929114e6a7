use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::api;
use crate::auth::jwt;
use crate::errors::AppError;
use crate::http::ApiClient;
use crate::models::{LoginRequest, TokenPair, User};
use crate::routes::oauth_callback::OAuthSuccess;
use crate::routes::ENTRY_ROUTE;
use crate::store::TokenStore;

/// Persisted JSON blob of the signed-in [`User`].
pub const USER_DATA_KEY: &str = "user_data";

const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Initializing,
    Authenticated(User),
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

/// Owns the login/logout lifecycle and the current session user.
#[derive(Clone)]
pub struct SessionController {
    api: ApiClient,
    state: Arc<RwLock<AuthState>>,
}

impl SessionController {
    /// Starts in [`AuthState::Initializing`]; call [`initialize`](Self::initialize) next.
    pub fn new(api: ApiClient) -> Self {
        Self { api, state: Arc::new(RwLock::new(AuthState::Initializing)) }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn tokens(&self) -> &TokenStore {
        self.api.tokens()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, AuthState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> AuthState {
        self.read_state().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        match &*self.read_state() {
            AuthState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    /// Restores the session from persisted tokens without touching the network.
    ///
    /// A live access token restores the persisted user, or a minimal user
    /// derived from the token subject. Anything else clears the tokens.
    pub fn initialize(&self) -> AuthState {
        let restored = match self.tokens().access_token() {
            Some(token) if !jwt::is_expired(&token) => self.restore_user(&token),
            Some(_) => {
                debug!("Persisted access token has expired");
                None
            }
            None => None,
        };

        let next = match restored {
            Some(user) => {
                info!("Restored session for user {}", user.id);
                AuthState::Authenticated(user)
            }
            None => {
                self.tokens().clear_tokens();
                AuthState::Unauthenticated
            }
        };
        *self.write_state() = next.clone();
        next
    }

    fn restore_user(&self, token: &str) -> Option<User> {
        let persisted = self
            .tokens()
            .backend()
            .get(USER_DATA_KEY)
            .and_then(|raw| match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!("Ignoring unreadable persisted user data: {e}");
                    None
                }
            });
        persisted.or_else(|| jwt::user_id(token).map(User::from_subject))
    }

    /// Records a successful authentication: tokens, user data, state.
    pub fn login(&self, user: User, tokens: TokenPair) -> Result<(), AppError> {
        self.tokens()
            .set_tokens(&tokens.access_token, &tokens.refresh_token, tokens.expires_in)?;
        let user_json = serde_json::to_string(&user)
            .map_err(|e| AppError::Unexpected(format!("Failed to serialize user: {e}")))?;
        self.tokens().backend().set(USER_DATA_KEY, &user_json)?;

        info!("User {} signed in", user.id);
        *self.write_state() = AuthState::Authenticated(user);
        Ok(())
    }

    /// Validates the form, calls the login endpoint and records the session.
    /// Nothing is persisted when the server rejects the credentials.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, AppError> {
        if email.trim().is_empty() {
            return Err(AppError::empty_field("email"));
        }
        if password.is_empty() {
            return Err(AppError::empty_field("password"));
        }

        let request = LoginRequest { email: email.trim().to_string(), password: password.to_string() };
        let response = api::auth::login(&self.api, &request).await?;
        let tokens = response.token_pair();
        self.login(response.user.clone(), tokens)?;
        Ok(response.user)
    }

    /// Completes a sign-in delivered through the identity-provider callback.
    pub fn complete_oauth(&self, success: &OAuthSuccess) -> Result<User, AppError> {
        let expires_in = success
            .expires_in
            .or_else(|| jwt::remaining_lifetime_secs(&success.access_token))
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let user = User {
            id: success.user_id.clone(),
            email: success.email.clone(),
            username: success.username.clone(),
            full_name: None,
        };
        let tokens = TokenPair {
            access_token: success.access_token.clone(),
            refresh_token: success.refresh_token.clone(),
            expires_in,
        };
        self.login(user.clone(), tokens)?;
        Ok(user)
    }

    /// Ends the session. The server call is best-effort; local state is
    /// always cleared. Returns the route to navigate to.
    pub async fn logout(&self) -> &'static str {
        if self.tokens().access_token().is_some() {
            if let Err(e) = api::auth::logout(&self.api).await {
                warn!("Server-side logout failed, signing out locally anyway: {e}");
            }
        }
        self.clear_local_session();
        info!("Signed out");
        ENTRY_ROUTE
    }

    fn clear_local_session(&self) {
        self.tokens().clear_tokens();
        if let Err(e) = self.tokens().backend().remove(USER_DATA_KEY) {
            warn!("Failed to clear persisted user data: {e}");
        }
        *self.write_state() = AuthState::Unauthenticated;
    }

    /// True iff an access token exists and has not expired.
    pub fn check_auth_status(&self) -> bool {
        self.tokens()
            .access_token()
            .is_some_and(|token| !jwt::is_expired(&token))
    }

    /// Downgrades to unauthenticated when the stored token vanished or expired.
    pub fn sync_with_tokens(&self) -> AuthState {
        if self.state().is_authenticated() && !self.check_auth_status() {
            debug!("Access token gone or expired, ending session");
            self.clear_local_session();
        }
        self.state()
    }

    /// Lets callers feed API errors back so an expired session ends locally.
    pub fn observe_error(&self, error: &AppError) {
        if matches!(error, AppError::SessionExpired) {
            self.clear_local_session();
        }
    }
}
