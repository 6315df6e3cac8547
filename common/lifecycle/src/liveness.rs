//! Liveness probe handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::runtime::Runtime;

/// Result of a liveness check. `Dead` means the orchestrator should restart the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead(String),
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Liveness::Alive)
    }
}

impl IntoResponse for Liveness {
    fn into_response(self) -> Response {
        match self {
            Liveness::Alive => (StatusCode::OK, "alive").into_response(),
            Liveness::Dead(reason) => {
                tracing::warn!(reason = %reason, "liveness check failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "dead").into_response()
            }
        }
    }
}

/// Axum-compatible liveness probe. Liveness is independent of readiness: a
/// starting or draining instance is still alive.
#[derive(Clone)]
pub struct LivenessHandler {
    runtime: Runtime,
}

impl LivenessHandler {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn check(&self) -> Liveness {
        self.runtime.liveness()
    }
}
