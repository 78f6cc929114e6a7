//! Client library for the BiteWise nutrition-tracking backend.
//!
//! Persists the session locally, keeps tokens fresh, and caches chat
//! conversations with optimistic sends.

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;

pub use auth::{AuthState, SessionController};
pub use config::ClientConfig;
pub use errors::AppError;
pub use http::ApiClient;
pub use service::ChatService;
pub use store::{FileStore, KvStore, MemoryStore, TokenStore};
