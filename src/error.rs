//! Error types for limiter construction and configuration.
//!
//! Nothing here is produced on the request path: a request over its limit is a
//! [`Decision::Deny`](crate::rate_limit::Decision), not an error.
use std::time::Duration;

/// Malformed limiter setup. Returned from constructors; fatal to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Windows are tracked in whole milliseconds, so they must be at least 1ms long.
    #[error("window must be at least 1ms (got {0:?})")]
    ZeroWindow(Duration),
    /// At least one request per window must be admissible.
    #[error("max_requests must be >= 1 (got {provided})")]
    ZeroMaxRequests {
        /// Value provided by caller.
        provided: u32,
    },
    /// Sweep interval must be non-zero.
    #[error("sweep interval must be non-zero")]
    ZeroSweepInterval,
    /// The JSON schema handed to the validation helper did not compile.
    #[error("invalid JSON schema: {0}")]
    InvalidSchema(String),
    /// The background sweeper needs a tokio runtime to run on.
    #[error("no tokio runtime available to drive the sweeper")]
    NoRuntime,
}

/// Errors raised while loading limiter configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration document is not valid JSON for the expected shape.
    #[error("failed to parse limiter config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A route's policy values are invalid.
    #[error("invalid policy for route '{route}': {source}")]
    Route {
        /// Route the policy was declared for (`"*"` for the default).
        route: String,
        /// Underlying validation failure.
        #[source]
        source: PolicyError,
    },
}
