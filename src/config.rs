//! Serializable limiter configuration and per-route policy tables.
//!
//! Different routes can carry independent limiters with different policies (e.g. payment-intent
//! creation tighter than product listing). Counters are never shared across routes even when
//! two routes use equal policies.

use crate::error::{ConfigError, PolicyError};
use crate::handle::LimiterHandle;
use crate::rate_limit::{AdmissionControl, Decision, Policy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Wire form of a [`Policy`], plus the optional sweep interval.
///
/// ```json
/// { "window_duration_ms": 60000, "max_requests": 5 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimiterConfig {
    pub window_duration_ms: u64,
    pub max_requests: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_ms: Option<u64>,
}

impl LimiterConfig {
    /// Validate into a [`Policy`].
    pub fn policy(&self) -> Result<Policy, PolicyError> {
        Policy::from_millis(self.window_duration_ms, self.max_requests)
    }

    /// Check the policy and the sweep interval without starting anything.
    pub fn validate(&self) -> Result<Policy, PolicyError> {
        let policy = self.policy()?;
        if self.sweep_interval_ms == Some(0) {
            return Err(PolicyError::ZeroSweepInterval);
        }
        Ok(policy)
    }

    /// Build a running limiter. Must run inside a tokio runtime.
    pub fn build(&self) -> Result<LimiterHandle, PolicyError> {
        let mut builder = LimiterHandle::builder(self.policy()?);
        if let Some(ms) = self.sweep_interval_ms {
            builder = builder.sweep_interval(Duration::from_millis(ms));
        }
        builder.build()
    }
}

impl From<Policy> for LimiterConfig {
    fn from(policy: Policy) -> Self {
        Self {
            window_duration_ms: u64::try_from(policy.window().as_millis()).unwrap_or(u64::MAX),
            max_requests: policy.max_requests(),
            sweep_interval_ms: None,
        }
    }
}

impl TryFrom<LimiterConfig> for Policy {
    type Error = PolicyError;

    fn try_from(config: LimiterConfig) -> Result<Self, Self::Error> {
        config.policy()
    }
}

/// A default policy plus per-route overrides, keyed by exact request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteLimitsConfig {
    pub default: LimiterConfig,
    #[serde(default)]
    pub routes: BTreeMap<String, LimiterConfig>,
}

impl RouteLimitsConfig {
    /// Parse from JSON.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate every entry without starting anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default.validate().map_err(|source| route_error("*", source))?;
        for (route, config) in &self.routes {
            config.validate().map_err(|source| route_error(route, source))?;
        }
        Ok(())
    }

    /// Start one limiter per entry. Must run inside a tokio runtime.
    pub fn build(&self) -> Result<RouteLimits, ConfigError> {
        self.validate()?;
        let default = self.default.build().map_err(|source| route_error("*", source))?;
        let mut limits = RouteLimits::new(default);
        for (route, config) in &self.routes {
            let handle = config.build().map_err(|source| route_error(route, source))?;
            limits = limits.with_route(route.clone(), handle);
        }
        Ok(limits)
    }
}

fn route_error(route: &str, source: PolicyError) -> ConfigError {
    ConfigError::Route { route: route.to_string(), source }
}

/// Per-route limiters behind one [`AdmissionControl`].
///
/// Routes without an override share the default limiter; its keys still include the route, so
/// each route is counted separately.
#[derive(Debug, Clone)]
pub struct RouteLimits {
    default: LimiterHandle,
    routes: HashMap<String, LimiterHandle>,
}

impl RouteLimits {
    pub fn new(default: LimiterHandle) -> Self {
        Self { default, routes: HashMap::new() }
    }

    /// Give `route` its own limiter, replacing any previous one.
    pub fn with_route(mut self, route: impl Into<String>, limiter: LimiterHandle) -> Self {
        self.routes.insert(route.into(), limiter);
        self
    }

    /// Limiter responsible for `route`.
    pub fn limiter_for(&self, route: &str) -> &LimiterHandle {
        self.routes.get(route).unwrap_or(&self.default)
    }

    /// Stop every sweeper.
    pub async fn shutdown(&self) {
        self.default.shutdown().await;
        for limiter in self.routes.values() {
            limiter.shutdown().await;
        }
    }
}

impl AdmissionControl for RouteLimits {
    fn admit(&self, client: &str, route: &str) -> Decision {
        self.limiter_for(route).admit(client, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "default": { "window_duration_ms": 60000, "max_requests": 100 },
        "routes": {
            "/api/create-payment-intent": { "window_duration_ms": 60000, "max_requests": 2, "sweep_interval_ms": 30000 }
        }
    }"#;

    #[test]
    fn parses_route_table() {
        let config = RouteLimitsConfig::from_json(RAW).unwrap();
        assert_eq!(config.default.max_requests, 100);
        let payment = config.routes["/api/create-payment-intent"];
        assert_eq!(payment.sweep_interval_ms, Some(30_000));
        assert_eq!(payment.policy().unwrap().max_requests(), 2);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = RouteLimitsConfig::from_json(
            r#"{"default": {"window_duration_ms": 1, "max_requests": 1, "burst": 3}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_names_the_bad_route() {
        let mut config = RouteLimitsConfig::from_json(RAW).unwrap();
        config.routes.insert(
            "/api/orders".into(),
            LimiterConfig { window_duration_ms: 0, max_requests: 1, sweep_interval_ms: None },
        );
        match config.validate().unwrap_err() {
            ConfigError::Route { route, source } => {
                assert_eq!(route, "/api/orders");
                assert!(matches!(source, PolicyError::ZeroWindow(_)));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn validate_rejects_zero_sweep_interval() {
        let zero = LimiterConfig { window_duration_ms: 1_000, max_requests: 1, sweep_interval_ms: Some(0) };
        assert_eq!(zero.validate(), Err(PolicyError::ZeroSweepInterval));

        let mut config = RouteLimitsConfig::from_json(RAW).unwrap();
        config.default = zero;
        match config.validate().unwrap_err() {
            ConfigError::Route { route, source } => {
                assert_eq!(route, "*");
                assert_eq!(source, PolicyError::ZeroSweepInterval);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn policy_converts_both_ways() {
        let policy = Policy::from_millis(1_500, 7).unwrap();
        let config = LimiterConfig::from(policy);
        assert_eq!(config.window_duration_ms, 1_500);
        assert_eq!(Policy::try_from(config).unwrap(), policy);
    }

    #[tokio::test]
    async fn route_limits_apply_per_route_policy() {
        let limits = RouteLimitsConfig::from_json(RAW).unwrap().build().unwrap();
        let payment = "/api/create-payment-intent";

        assert!(limits.admit("1.2.3.4", payment).is_allowed());
        assert!(limits.admit("1.2.3.4", payment).is_allowed());
        assert!(!limits.admit("1.2.3.4", payment).is_allowed());

        // Same client, default-policy route: unaffected.
        assert!(limits.admit("1.2.3.4", "/api/products").is_allowed());
        assert_eq!(limits.limiter_for("/api/products").policy().max_requests(), 100);

        limits.shutdown().await;
    }
}
