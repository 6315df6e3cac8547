use lifecycle::LifecycleError;
use thiserror::Error;

use crate::routes::RouteError;

/// Errors that stop a service process from running.
///
/// A failed startup check is not one of them: the instance keeps serving its
/// probes as not-ready, and the orchestrator decides when to restart it.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid configuration: {0}")]
    Config(#[from] envconfig::Error),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("server task failed: {0}")]
    ServerTask(#[from] tokio::task::JoinError),
}
