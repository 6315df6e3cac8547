//! Readiness probe handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::runtime::Runtime;
use crate::state::LifecycleState;

/// Result of a readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Not admitting traffic; `None` when the state could not be decoded.
    NotReady(Option<LifecycleState>),
}

impl IntoResponse for Readiness {
    /// 200 `OK` when ready, 503 with the state name otherwise.
    fn into_response(self) -> Response {
        match self {
            Readiness::Ready => (StatusCode::OK, "OK").into_response(),
            Readiness::NotReady(Some(state)) => {
                (StatusCode::SERVICE_UNAVAILABLE, state.as_str()).into_response()
            }
            Readiness::NotReady(None) => {
                (StatusCode::SERVICE_UNAVAILABLE, "unknown").into_response()
            }
        }
    }
}

/// Axum-compatible readiness probe; ready iff the runtime is `Ready`.
///
/// The check reads the lifecycle state from a single atomic and never waits on
/// I/O or locks, so it cannot outlast the orchestrator's probe timeout. A state
/// that cannot be decoded reports not ready.
#[derive(Clone)]
pub struct ReadinessHandler {
    runtime: Runtime,
}

impl ReadinessHandler {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn check(&self) -> Readiness {
        let report = self.runtime.health_report();
        if report.ready {
            Readiness::Ready
        } else {
            Readiness::NotReady(report.state)
        }
    }
}
