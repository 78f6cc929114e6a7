use crate::auth::{AuthState, SessionController};
use crate::routes::{DEFAULT_ROUTE, ENTRY_ROUTE};

/// Outcome of gating a navigation on session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session restore has not finished; show a loading state.
    Pending,
    Allow,
    /// Navigate to `to`. `from` is the originally requested path, kept for
    /// the post-login redirect.
    Redirect { to: String, from: Option<String> },
}

/// Gate for pages that require a signed-in user.
pub fn protected(session: &SessionController, requested_path: &str) -> GuardDecision {
    if session.state() == AuthState::Initializing {
        return GuardDecision::Pending;
    }
    if session.check_auth_status() {
        GuardDecision::Allow
    } else {
        session.sync_with_tokens();
        GuardDecision::Redirect {
            to: ENTRY_ROUTE.to_string(),
            from: Some(requested_path.to_string()),
        }
    }
}

/// Gate for entry-only pages (login, register). Signed-in users are sent on
/// to `remembered_from`, or the default destination.
pub fn public_only(session: &SessionController, remembered_from: Option<&str>) -> GuardDecision {
    if session.state() == AuthState::Initializing {
        return GuardDecision::Pending;
    }
    if session.check_auth_status() {
        GuardDecision::Redirect { to: post_login_destination(remembered_from), from: None }
    } else {
        GuardDecision::Allow
    }
}

/// Where to go after a successful login. Entry-only paths and anything that
/// is not a local absolute path fall back to [`DEFAULT_ROUTE`].
pub fn post_login_destination(remembered_from: Option<&str>) -> String {
    match remembered_from {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && path != ENTRY_ROUTE =>
        {
            path.to_string()
        }
        _ => DEFAULT_ROUTE.to_string(),
    }
}
