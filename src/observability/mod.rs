//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request wrapper and subsystems produce:
//!     → logging.rs (structured log events, one per request outcome)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request outcomes are log events, never persisted
//! - Error causes reach the logs only, never the client
//! - Request ID flows through the trace layer

pub mod logging;
pub mod metrics;
