//! Construction API: a limiter plus the sweep task that keeps its store bounded.

use crate::clock::Clock;
use crate::error::PolicyError;
use crate::identity;
use crate::rate_limit::store::{InMemoryWindowStore, WindowStore};
use crate::rate_limit::{AdmissionControl, Decision, FixedWindow, Policy, SweepTask};
use crate::response::DenyResponse;
use http::Request;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::info;

/// Create a limiter for `policy` and start its sweeper on the current tokio runtime.
///
/// The sweep runs once per window. Use [`LimiterHandle::builder`] to change that or to inject a
/// clock.
///
/// # Examples
/// ```
/// # #[tokio::main]
/// # async fn main() {
/// use turnstile::{create_limiter, Policy};
/// use http::Request;
///
/// let limiter = create_limiter(Policy::from_millis(60_000, 5).unwrap()).unwrap();
/// let req = Request::get("/api/products").header("x-forwarded-for", "1.2.3.4").body(()).unwrap();
/// assert!(limiter.check(&req).is_none());
/// limiter.shutdown().await;
/// # }
/// ```
pub fn create_limiter(policy: Policy) -> Result<LimiterHandle, PolicyError> {
    LimiterHandle::builder(policy).build()
}

/// Shared handle to a running limiter.
///
/// Clones share the counters and the sweeper. The sweeper stops on [`LimiterHandle::shutdown`]
/// or when the last clone is dropped.
#[derive(Debug)]
pub struct LimiterHandle<S = InMemoryWindowStore> {
    limiter: FixedWindow<S>,
    sweeper: Arc<Mutex<Option<SweepTask>>>,
}

impl<S> Clone for LimiterHandle<S> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), sweeper: self.sweeper.clone() }
    }
}

impl LimiterHandle<InMemoryWindowStore> {
    pub fn builder(policy: Policy) -> LimiterBuilder {
        LimiterBuilder::new(policy)
    }
}

impl<S> LimiterHandle<S>
where
    S: WindowStore + 'static,
{
    /// Wrap an existing limiter and start sweeping it every `sweep_interval`.
    pub fn start(limiter: FixedWindow<S>, sweep_interval: Duration) -> Result<Self, PolicyError> {
        let sweeper = SweepTask::spawn(limiter.clone(), sweep_interval)?;
        info!(
            target: "turnstile::limiter",
            window_ms = limiter.policy().window().as_millis() as u64,
            max_requests = limiter.policy().max_requests(),
            "limiter started"
        );
        Ok(Self { limiter, sweeper: Arc::new(Mutex::new(Some(sweeper))) })
    }

    pub fn limiter(&self) -> &FixedWindow<S> {
        &self.limiter
    }

    pub fn policy(&self) -> &Policy {
        self.limiter.policy()
    }

    /// Count one request from `client` on `route` and decide.
    pub fn admit(&self, client: &str, route: &str) -> Decision {
        self.limiter.admit(client, route)
    }

    /// Check an inbound request.
    ///
    /// `None` means "proceed with normal handling"; `Some` is a complete 429 response the caller
    /// returns without further processing.
    pub fn check<B>(&self, request: &Request<B>) -> Option<DenyResponse> {
        self.limiter
            .admit(identity::client_identity(request.headers()), identity::route(request))
            .into_deny_response()
    }

    /// Stop the sweeper and wait for it to exit. Later calls are no-ops.
    ///
    /// Counting keeps working after shutdown; only the periodic cleanup stops.
    pub async fn shutdown(&self) {
        let task = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            task.shutdown().await;
            info!(target: "turnstile::limiter", "limiter sweeper shut down");
        }
    }

    /// Whether the sweeper is still running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl<S> AdmissionControl for LimiterHandle<S>
where
    S: WindowStore + 'static,
{
    fn admit(&self, client: &str, route: &str) -> Decision {
        LimiterHandle::admit(self, client, route)
    }
}

/// Builder for [`LimiterHandle`].
#[derive(Debug)]
pub struct LimiterBuilder {
    policy: Policy,
    sweep_interval: Option<Duration>,
    clock: Option<Arc<dyn Clock>>,
}

impl LimiterBuilder {
    fn new(policy: Policy) -> Self {
        Self { policy, sweep_interval: None, clock: None }
    }

    /// How often expired counters are dropped. Defaults to the policy window.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build the limiter and start its sweeper. Must run inside a tokio runtime.
    pub fn build(self) -> Result<LimiterHandle, PolicyError> {
        let mut limiter = FixedWindow::new(self.policy);
        if let Some(clock) = self.clock {
            limiter = limiter.with_shared_clock(clock);
        }
        let interval = self.sweep_interval.unwrap_or_else(|| self.policy.window());
        LimiterHandle::start(limiter, interval)
    }
}
