pub mod client;

pub use client::{extract_error_detail, ApiClient, RequestOptions};
