//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (derive rate-limit identity from proxy headers)
//!     → rate_limit.rs (fixed-window admission per route scope)
//!     → [identity provider resolves the session]
//!     → access.rs (ownership prefix checks before any collaborator call)
//!     → route business logic
//! ```
//!
//! # Design Decisions
//! - Admission is a tagged result, not an exception
//! - Rate-limit state is injected, not global
//! - Ownership checks fail closed with 403

pub mod access;
pub mod client_ip;
pub mod rate_limit;

pub use client_ip::client_ip;
pub use rate_limit::{Decision, RateLimitStore, RateLimiter, RateWindow};
