//! Periodic cleanup of expired window counters.
//!
//! Without a sweep, every client that ever sent a request keeps an entry forever. The sweep
//! bounds memory only; `admit` treats an expired entry and a missing one the same way.

use crate::error::PolicyError;
use crate::rate_limit::store::WindowStore;
use crate::rate_limit::strategies::FixedWindow;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Handle to a running sweep task.
///
/// Stop it with [`SweepTask::shutdown`]; dropping the handle aborts the task so no timer
/// outlives its owner.
#[derive(Debug)]
pub struct SweepTask {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SweepTask {
    /// Spawn a task on the current tokio runtime that sweeps `limiter` every `interval`.
    ///
    /// Errors with [`PolicyError::NoRuntime`] outside a runtime and
    /// [`PolicyError::ZeroSweepInterval`] for a zero interval.
    pub fn spawn<S>(limiter: FixedWindow<S>, interval: Duration) -> Result<Self, PolicyError>
    where
        S: WindowStore + 'static,
    {
        if interval.is_zero() {
            return Err(PolicyError::ZeroSweepInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PolicyError::NoRuntime)?;
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing can have expired yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        limiter.sweep();
                    }
                }
            }
            debug!(target: "turnstile::sweeper", "sweeper stopped");
        });

        debug!(target: "turnstile::sweeper", interval_ms = interval.as_millis() as u64, "sweeper started");
        Ok(Self { stop: Some(stop), handle: Some(handle) })
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
