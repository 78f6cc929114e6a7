//! Typed wrappers over the backend REST endpoints.

pub mod auth;
pub mod chat;
pub mod dishes;
pub mod intake;
pub mod stats;
