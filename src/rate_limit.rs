//! Fixed-window rate limiting primitives.
//!
//! This module provides the building blocks for admission control:
//! - [`AdmissionControl`]: The core trait deciding whether a request may proceed.
//! - [`FixedWindow`]: Fixed-window counting keyed by client and route.
//! - [`RateLimitLayer`]: Tower middleware that enforces the limit on `http` requests.
//! - [`Decision`]: The result of an admission check (Allow/Deny).
//!
//! # Architecture
//!
//! - **Middleware**: `RateLimitLayer` wraps your service. It doesn't know *how* limiting works,
//!   only that it should ask an `AdmissionControl` and answer 429 on deny.
//! - **Logic**: `FixedWindow` (in `strategies` module) decides allow/deny from a counter snapshot.
//! - **Storage**: `WindowStore` (in `store` module) owns the per-key counters and performs the
//!   read-modify-write for one key atomically.
//! - **Cleanup**: `SweepTask` (in `sweeper` module) periodically drops expired counters.
//!
//! Counters live in process memory only. Several processes behind a load balancer each enforce
//! their own independent limit.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PolicyError;
use crate::response::DenyResponse;

pub mod middleware;
pub mod store;
pub mod strategies;
pub mod sweeper;
pub use middleware::{RateLimitLayer, RateLimitService};
pub use store::{InMemoryWindowStore, WindowStore};
pub use strategies::FixedWindow;
pub use sweeper::SweepTask;

/// Identifies one independently throttled stream of requests: a client on a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateKey {
    client: String,
    route: String,
}

impl RateKey {
    /// Both parts are opaque; they are compared, never parsed.
    pub fn new(client: impl Into<String>, route: impl Into<String>) -> Self {
        Self { client: client.into(), route: route.into() }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn route(&self) -> &str {
        &self.route
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.client, self.route)
    }
}

/// Per-key window state.
///
/// `count` is the number of requests seen since the current window began (denied ones included);
/// `reset_at` is the exclusive end of that window on the limiter's clock, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounter {
    pub count: u64,
    pub reset_at: u64,
}

impl WindowCounter {
    /// Counter for the first request of a window starting at `now`.
    pub fn open(now: u64, window_millis: u64) -> Self {
        Self { count: 1, reset_at: now.saturating_add(window_millis) }
    }

    /// A request arriving exactly at `reset_at` belongs to the next window.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.reset_at
    }
}

/// Validated, immutable limiter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    window: Duration,
    max_requests: u32,
}

impl Policy {
    /// Create a policy. Errors if `window` is shorter than 1ms or `max_requests` is 0.
    ///
    /// # Examples
    /// ```
    /// use turnstile::Policy;
    /// use std::time::Duration;
    /// let policy = Policy::new(Duration::from_secs(60), 100).unwrap();
    /// assert_eq!(policy.max_requests(), 100);
    /// ```
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, PolicyError> {
        if window.as_millis() == 0 {
            return Err(PolicyError::ZeroWindow(window));
        }
        if max_requests == 0 {
            return Err(PolicyError::ZeroMaxRequests { provided: max_requests });
        }
        Ok(Self { window, max_requests })
    }

    /// Create a policy from a window length in milliseconds.
    pub fn from_millis(window_duration_ms: u64, max_requests: u32) -> Result<Self, PolicyError> {
        Self::new(Duration::from_millis(window_duration_ms), max_requests)
    }

    /// Skips validation; only for compile-time constants known to be valid.
    pub(crate) const fn new_unchecked(window: Duration, max_requests: u32) -> Self {
        Self { window, max_requests }
    }

    /// Length of one window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Requests admitted per key per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub(crate) fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

/// The decision returned by an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow {
        /// Requests still admissible in this window.
        /// Useful for `X-RateLimit-Remaining` headers.
        remaining: u32,
        /// Time until the current window ends.
        reset_after: Duration,
    },
    /// The request must be rejected.
    Deny {
        /// How long the caller should wait before the window resets.
        /// Useful for `Retry-After` headers.
        retry_after: Duration,
        /// Requests counted for the key in this window, this one included.
        attempts: u64,
    },
}

impl Decision {
    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// Retry hint, present only on deny.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Deny { retry_after, .. } => Some(*retry_after),
            Decision::Allow { .. } => None,
        }
    }

    /// `None` means "proceed"; `Some` is a complete 429 to return as-is.
    pub fn into_deny_response(self) -> Option<DenyResponse> {
        self.retry_after().map(DenyResponse::new)
    }
}

/// Core interface for admission decisions.
///
/// The check is synchronous and never suspends: implementations perform an in-memory
/// read-modify-write and must serialize it per key, so concurrent callers on one key are all
/// counted and never both observe the same pre-increment count.
pub trait AdmissionControl: Send + Sync {
    /// Count one request from `client` on `route` and decide whether it may proceed.
    fn admit(&self, client: &str, route: &str) -> Decision;
}

impl<T: AdmissionControl + ?Sized> AdmissionControl for Arc<T> {
    fn admit(&self, client: &str, route: &str) -> Decision {
        (**self).admit(client, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_rejects_zero_max_requests() {
        let err = Policy::new(Duration::from_secs(1), 0).expect_err("zero max should be invalid");
        assert!(matches!(err, PolicyError::ZeroMaxRequests { provided: 0 }));
    }

    #[test]
    fn policy_rejects_sub_millisecond_window() {
        let err = Policy::new(Duration::from_micros(999), 1).expect_err("window too short");
        assert!(matches!(err, PolicyError::ZeroWindow(_)));
        assert!(Policy::from_millis(0, 1).is_err());
    }

    #[test]
    fn policy_from_millis_round_trips_window() {
        let policy = Policy::from_millis(60_000, 5).unwrap();
        assert_eq!(policy.window(), Duration::from_secs(60));
        assert_eq!(policy.window_millis(), 60_000);
    }

    #[test]
    fn counter_expires_exactly_at_reset() {
        let counter = WindowCounter::open(1_000, 500);
        assert_eq!(counter.reset_at, 1_500);
        assert!(!counter.is_expired(1_499));
        assert!(counter.is_expired(1_500));
    }

    #[test]
    fn counter_reset_saturates() {
        let counter = WindowCounter::open(u64::MAX - 1, 10);
        assert_eq!(counter.reset_at, u64::MAX);
    }

    #[test]
    fn deny_converts_to_response() {
        let deny = Decision::Deny { retry_after: Duration::from_secs(3), attempts: 7 };
        assert!(!deny.is_allowed());
        let response = deny.into_deny_response().expect("deny yields a response");
        assert_eq!(response.retry_after(), Duration::from_secs(3));

        let allow = Decision::Allow { remaining: 1, reset_after: Duration::from_secs(1) };
        assert!(allow.is_allowed());
        assert!(allow.into_deny_response().is_none());
    }

    #[test]
    fn rate_key_display_and_accessors() {
        let key = RateKey::new("1.2.3.4", "/api/products");
        assert_eq!(key.client(), "1.2.3.4");
        assert_eq!(key.route(), "/api/products");
        assert_eq!(key.to_string(), "1.2.3.4 /api/products");
    }
}
