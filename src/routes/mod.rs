pub mod guards;
pub mod oauth_callback;

/// Where unauthenticated visitors land.
pub const ENTRY_ROUTE: &str = "/login";

/// Where authenticated visitors land when no destination was remembered.
pub const DEFAULT_ROUTE: &str = "/dashboard";
