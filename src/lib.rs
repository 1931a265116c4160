pub mod auth;
pub mod config;
pub mod content;
pub mod error;
pub mod grades;
pub mod models;
pub mod openapi;
pub mod progress;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod security;
pub mod upload;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
