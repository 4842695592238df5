//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware layers, graceful shutdown)
//!     → [api route handler]
//!         → wrap.rs (timing, outcome log, error boundary)
//!         → body.rs (parse + validate JSON)
//!         → error.rs (ApiError taxonomy → status)
//!     → envelope.rs ({ok, data} | {ok, error})
//!     → Send to client
//! ```

pub mod body;
pub mod envelope;
pub mod error;
pub mod server;
pub mod state;
pub mod wrap;

pub use error::ApiError;
pub use server::HttpServer;
pub use state::AppState;
pub use wrap::wrap;
