#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # turnstile
//!
//! Fixed-window admission control for HTTP APIs. Every request is counted against a
//! `(client, route)` key; once a key exceeds its policy inside the current window, further
//! requests are answered with `429 Too Many Requests` until the window ends.
//!
//! ## Features
//!
//! - **Fixed-window counting** per client address and route
//! - **Tower middleware** that short-circuits denied requests with a ready-made 429
//! - **Background sweep** of expired counters, cancellable on shutdown
//! - **Per-route policies** loaded from JSON config
//! - **Schema-validated handlers** answering 400 on bad bodies
//!
//! ## Quick Start
//!
//! ```rust
//! use turnstile::{FixedWindow, Policy};
//!
//! let limiter = FixedWindow::new(Policy::from_millis(60_000, 5).unwrap());
//! for _ in 0..5 {
//!     assert!(limiter.admit("1.2.3.4", "/api/test").is_allowed());
//! }
//! let denied = limiter.admit("1.2.3.4", "/api/test");
//! assert!(denied.retry_after().is_some());
//! ```
//!
//! Counters live in process memory. Several processes behind a load balancer each enforce their
//! own independent limit.

pub mod clock;
pub mod config;
pub mod error;
pub mod handle;
pub mod identity;
pub mod prelude;
pub mod presets;
pub mod rate_limit;
pub mod response;
pub mod validation;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{LimiterConfig, RouteLimits, RouteLimitsConfig};
pub use error::{ConfigError, PolicyError};
pub use handle::{create_limiter, LimiterBuilder, LimiterHandle};
pub use rate_limit::{
    AdmissionControl, Decision, FixedWindow, Policy, RateKey, RateLimitLayer, RateLimitService,
    WindowCounter,
};
pub use response::DenyResponse;
pub use validation::{Rejection, Validated, Violation};
