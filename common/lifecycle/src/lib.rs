//! Service lifecycle shared by every fleet member: the `Starting -> Ready ->
//! Draining -> Stopped` state machine, liveness and readiness probes for the
//! orchestrator, startup checks gating readiness, and termination signals.

mod error;
mod identity;
mod liveness;
mod metrics;
mod readiness;
mod runtime;
mod signals;
mod startup;
mod state;

pub use error::LifecycleError;
pub use identity::{generate_instance_id, ServiceIdentity};
pub use liveness::{Liveness, LivenessHandler};
pub use readiness::{Readiness, ReadinessHandler};
pub use runtime::{DrainOutcome, HealthReport, Runtime};
pub use signals::ShutdownSignal;
pub use startup::{bootstrap, StartupCheck};
pub use state::LifecycleState;
