//! Outfit studio API library.

pub mod ai;
pub mod api;
pub mod auth;
pub mod backends;
pub mod billing;
pub mod clock;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod storage;
pub mod uploads;

pub use config::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
