//! Lifecycle error types.

use std::time::Duration;

use thiserror::Error;

use crate::state::LifecycleState;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The identity a runtime was built with is unusable.
    #[error("invalid service identity: {0}")]
    InvalidIdentity(String),

    /// A transition was requested from a state that does not allow it.
    #[error("cannot transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// The stored state byte does not decode to a known state.
    #[error("lifecycle state is corrupted (raw value {0})")]
    CorruptState(u8),

    /// A startup check failed, the instance will never become ready.
    #[error("startup check '{check}' failed: {reason}")]
    StartupFault { check: String, reason: String },

    /// A startup check did not finish in time.
    #[error("startup check '{check}' timed out after {timeout:?}")]
    StartupTimeout { check: String, timeout: Duration },
}
