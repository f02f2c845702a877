use crate::clock::{Clock, MonotonicClock};
use crate::rate_limit::store::{InMemoryWindowStore, WindowStore};
use crate::rate_limit::{AdmissionControl, Decision, Policy, RateKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// A fixed-window rate limiter.
///
/// Time is cut into consecutive windows of `policy.window()` per key, starting at the first
/// request the key sends. Each window admits `policy.max_requests()` requests; later ones are
/// denied until the window ends.
///
/// Clones share the same store, so one instance (or its clones) can be handed to every route
/// that shares a policy.
#[derive(Debug)]
pub struct FixedWindow<S = InMemoryWindowStore> {
    store: Arc<S>,
    policy: Policy,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for FixedWindow<S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), policy: self.policy, clock: self.clock.clone() }
    }
}

impl FixedWindow<InMemoryWindowStore> {
    /// Create a limiter backed by a fresh in-memory store.
    ///
    /// # Examples
    /// ```
    /// use turnstile::{FixedWindow, Policy};
    /// let limiter = FixedWindow::new(Policy::from_millis(60_000, 2).unwrap());
    /// assert!(limiter.admit("1.2.3.4", "/api/test").is_allowed());
    /// assert!(limiter.admit("1.2.3.4", "/api/test").is_allowed());
    /// assert!(!limiter.admit("1.2.3.4", "/api/test").is_allowed());
    /// ```
    pub fn new(policy: Policy) -> Self {
        Self::with_store(policy, InMemoryWindowStore::new())
    }
}

impl<S> FixedWindow<S>
where
    S: WindowStore + 'static,
{
    /// Create a limiter backed by `store`.
    pub fn with_store(policy: Policy, store: S) -> Self {
        Self { store: Arc::new(store), policy, clock: Arc::new(MonotonicClock::default()) }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(self, clock: C) -> Self {
        self.with_shared_clock(Arc::new(clock))
    }

    /// Override the clock with one that is already shared.
    pub fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count one request from `client` on `route` and decide.
    pub fn admit(&self, client: &str, route: &str) -> Decision {
        self.admit_key(&RateKey::new(client, route))
    }

    /// Count one request for `key` and decide.
    pub fn admit_key(&self, key: &RateKey) -> Decision {
        let now = self.clock.now_millis();
        let counter = self.store.hit(key, now, self.policy.window_millis());
        let max = u64::from(self.policy.max_requests());
        let until_reset = Duration::from_millis(counter.reset_at.saturating_sub(now));

        if counter.count <= max {
            trace!(
                target: "turnstile::rate_limit",
                client = key.client(),
                route = key.route(),
                count = counter.count,
                "request admitted"
            );
            Decision::Allow { remaining: (max - counter.count) as u32, reset_after: until_reset }
        } else {
            debug!(
                target: "turnstile::rate_limit",
                client = key.client(),
                route = key.route(),
                count = counter.count,
                retry_after_ms = until_reset.as_millis() as u64,
                "request denied"
            );
            Decision::Deny { retry_after: until_reset, attempts: counter.count }
        }
    }

    /// Drop counters whose window has ended. Returns how many were removed.
    ///
    /// Never changes the outcome of a later `admit`: an expired counter and a missing one both
    /// open a fresh window.
    pub fn sweep(&self) -> usize {
        let removed = self.store.sweep(self.clock.now_millis());
        if removed > 0 {
            trace!(target: "turnstile::rate_limit", removed, remaining = self.store.len(), "swept expired windows");
        }
        removed
    }
}

impl<S> AdmissionControl for FixedWindow<S>
where
    S: WindowStore + 'static,
{
    fn admit(&self, client: &str, route: &str) -> Decision {
        FixedWindow::admit(self, client, route)
    }
}
