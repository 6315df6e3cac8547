//! The process-wide lifecycle state holder.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::LifecycleError;
use crate::identity::ServiceIdentity;
use crate::liveness::Liveness;
use crate::metrics;
use crate::state::LifecycleState;

/// Snapshot of the probe-relevant state, computed when asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// `None` if the state byte could not be decoded.
    pub state: Option<LifecycleState>,
    pub ready: bool,
    pub alive: bool,
}

/// How the in-flight work ended once draining started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every connection finished before the grace period.
    Clean { elapsed: Duration },
    /// The grace period expired, `abandoned` connections were dropped.
    TimedOut { elapsed: Duration, abandoned: usize },
}

/// Owns the single `LifecycleState` of the process.
///
/// Cloning is cheap and every clone observes the same state. The state can only
/// be changed through the transition methods, each of which is a single
/// compare-and-swap, so readers never see a half-applied transition and probe
/// reads never take a lock.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    identity: ServiceIdentity,
    state: AtomicU8,
    startup_fault: OnceLock<(String, String)>,
    started_at: Instant,
    heartbeat_ms: AtomicU64,
    liveness_deadline: Option<Duration>,
    draining: CancellationToken,
    stopped: CancellationToken,
}

impl Runtime {
    /// A runtime in `Starting`, with liveness based on the state only.
    pub fn new(identity: ServiceIdentity) -> Self {
        Self::with_liveness_deadline(identity, None)
    }

    /// A runtime in `Starting`. When `liveness_deadline` is set, liveness also fails
    /// once the heartbeat is older than the deadline.
    pub fn with_liveness_deadline(
        identity: ServiceIdentity,
        liveness_deadline: Option<Duration>,
    ) -> Self {
        info!(identity = %identity, "lifecycle: starting");
        Self {
            inner: Arc::new(RuntimeInner {
                identity,
                state: AtomicU8::new(LifecycleState::Starting.into()),
                startup_fault: OnceLock::new(),
                started_at: Instant::now(),
                heartbeat_ms: AtomicU64::new(0),
                liveness_deadline: liveness_deadline.filter(|d| !d.is_zero()),
                draining: CancellationToken::new(),
                stopped: CancellationToken::new(),
            }),
        }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.inner.identity
    }

    /// Consistent snapshot of the current state.
    pub fn state(&self) -> Result<LifecycleState, LifecycleError> {
        LifecycleState::try_from(self.inner.state.load(Ordering::SeqCst))
    }

    /// True iff the instance is `Ready`. Never blocks.
    pub fn readiness(&self) -> bool {
        matches!(self.state(), Ok(LifecycleState::Ready))
    }

    /// Alive unless the state is corrupted or the heartbeat stalled. Never blocks.
    pub fn liveness(&self) -> Liveness {
        if let Err(e) = self.state() {
            return Liveness::Dead(e.to_string());
        }

        if let Some(deadline) = self.inner.liveness_deadline {
            let last = self.inner.heartbeat_ms.load(Ordering::Relaxed);
            let now = self.elapsed_ms();
            let stale_for = Duration::from_millis(now.saturating_sub(last));
            if stale_for > deadline {
                return Liveness::Dead(format!("heartbeat stalled for {stale_for:?}"));
            }
        }

        Liveness::Alive
    }

    pub fn health_report(&self) -> HealthReport {
        let state = self.state().ok();
        HealthReport {
            state,
            ready: state == Some(LifecycleState::Ready),
            alive: self.liveness().is_alive(),
        }
    }

    /// The recorded startup fault, as `(check, reason)`.
    pub fn startup_fault(&self) -> Option<(&str, &str)> {
        self.inner
            .startup_fault
            .get()
            .map(|(check, reason)| (check.as_str(), reason.as_str()))
    }

    /// `Starting -> Ready`. Refused once a startup fault has been recorded.
    pub fn mark_ready(&self) -> Result<(), LifecycleError> {
        if let Some((check, reason)) = self.inner.startup_fault.get() {
            return Err(LifecycleError::StartupFault {
                check: check.clone(),
                reason: reason.clone(),
            });
        }
        self.transition(LifecycleState::Starting, LifecycleState::Ready)
    }

    /// Latch a startup fault. The instance stays `Starting` (alive, never ready)
    /// so the orchestrator's restart policy can act. Only the first fault is kept.
    pub fn record_startup_fault(&self, check: &str, reason: impl Into<String>) {
        let reason = reason.into();
        error!(check, reason = %reason, "lifecycle: startup fault, instance will not become ready");
        metrics::emit_startup_fault(self.inner.identity.name(), check);
        if self
            .inner
            .startup_fault
            .set((check.to_owned(), reason))
            .is_err()
        {
            debug!(check, "lifecycle: startup fault already recorded");
        }
    }

    /// `Ready -> Draining`. Readiness reports false before this returns.
    ///
    /// Idempotent: returns true only for the call that started the drain. Calls
    /// while `Starting` or `Stopped` are logged and ignored.
    pub fn begin_drain(&self) -> bool {
        match self.transition(LifecycleState::Ready, LifecycleState::Draining) {
            Ok(()) => {
                self.inner.draining.cancel();
                true
            }
            Err(_) => {
                match self.state() {
                    Ok(LifecycleState::Draining) => debug!("lifecycle: drain already in progress"),
                    Ok(state) => warn!(state = %state, "lifecycle: ignoring drain request"),
                    Err(e) => error!(error = %e, "lifecycle: ignoring drain request"),
                }
                false
            }
        }
    }

    /// Record how draining ended and move to `Stopped`.
    pub fn complete_drain(&self, outcome: DrainOutcome) -> Result<(), LifecycleError> {
        let name = self.inner.identity.name();
        match outcome {
            DrainOutcome::Clean { elapsed } => {
                info!(elapsed = ?elapsed, "lifecycle: drain completed");
                metrics::emit_drain_duration(name, true, elapsed.as_secs_f64());
            }
            DrainOutcome::TimedOut { elapsed, abandoned } => {
                warn!(
                    elapsed = ?elapsed,
                    abandoned,
                    "lifecycle: drain timed out, dropping remaining connections"
                );
                metrics::emit_drain_duration(name, false, elapsed.as_secs_f64());
            }
        }
        self.mark_stopped()
    }

    /// `Draining -> Stopped`, or `Starting -> Stopped` when the instance never
    /// admitted traffic. Nothing leaves `Stopped`.
    pub fn mark_stopped(&self) -> Result<(), LifecycleError> {
        self.transition(LifecycleState::Draining, LifecycleState::Stopped)
            .or_else(|_| self.transition(LifecycleState::Starting, LifecycleState::Stopped))?;

        // Stopping from Starting skips Draining, release anything waiting on it.
        self.inner.draining.cancel();
        self.inner.stopped.cancel();
        Ok(())
    }

    /// Resolves once `Draining` (or `Stopped`) has been entered.
    pub fn drain_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.inner.draining.clone();
        async move { token.cancelled().await }
    }

    /// Resolves once `Stopped` has been entered.
    pub fn stopped_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.inner.stopped.clone();
        async move { token.cancelled().await }
    }

    /// Refresh the liveness heartbeat.
    pub fn heartbeat(&self) {
        self.inner
            .heartbeat_ms
            .store(self.elapsed_ms(), Ordering::Relaxed);
    }

    /// Refresh the heartbeat every `interval` until the runtime stops. A stalled
    /// executor stops this task first, which is what the liveness deadline detects.
    pub fn spawn_heartbeat(&self, interval: Duration) -> JoinHandle<()> {
        let runtime = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = runtime.inner.stopped.cancelled() => break,
                    _ = ticker.tick() => runtime.heartbeat(),
                }
            }
        })
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.inner.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleError> {
        match self.inner.state.compare_exchange(
            from.into(),
            to.into(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                info!(from = %from, to = %to, "lifecycle: state changed");
                metrics::emit_transition(self.inner.identity.name(), from, to);
                Ok(())
            }
            Err(actual) => Err(match LifecycleState::try_from(actual) {
                Ok(actual) => LifecycleError::InvalidTransition { from: actual, to },
                Err(corrupt) => corrupt,
            }),
        }
    }
}
