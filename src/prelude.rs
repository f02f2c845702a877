//! Convenient re-exports for common turnstile types.
pub use crate::{
    config::{LimiterConfig, RouteLimits, RouteLimitsConfig},
    handle::{create_limiter, LimiterBuilder, LimiterHandle},
    rate_limit::{
        AdmissionControl, Decision, FixedWindow, InMemoryWindowStore, Policy, RateKey,
        RateLimitLayer, WindowStore,
    },
    response::DenyResponse,
    validation::{Rejection, Validated},
    ConfigError, PolicyError,
};
