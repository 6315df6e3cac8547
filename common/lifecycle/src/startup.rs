//! Initialization steps that gate the `Starting -> Ready` transition.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::LifecycleError;
use crate::runtime::Runtime;

/// A step that must succeed before the instance may admit traffic, e.g. loading
/// configuration or checking that a dependency answers.
#[async_trait]
pub trait StartupCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self) -> anyhow::Result<()>;
}

/// Run every check in order, each bounded by `timeout`, then mark the runtime ready.
///
/// The first failure, timeout or panic is recorded as a startup fault and
/// returned; the runtime then stays `Starting` for the rest of the process.
pub async fn bootstrap(
    runtime: &Runtime,
    checks: &[Arc<dyn StartupCheck>],
    timeout: Duration,
) -> Result<(), LifecycleError> {
    for check in checks {
        let name = check.name().to_owned();
        debug!(check = %name, "running startup check");

        let task = {
            let check = check.clone();
            tokio::spawn(async move { check.check().await })
        };
        let abort = task.abort_handle();

        let error = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(()))) => continue,
            Ok(Ok(Err(e))) => LifecycleError::StartupFault {
                check: name,
                reason: format!("{e:#}"),
            },
            Ok(Err(join_error)) => LifecycleError::StartupFault {
                check: name,
                reason: join_error.to_string(),
            },
            Err(_) => {
                abort.abort();
                LifecycleError::StartupTimeout {
                    check: name,
                    timeout,
                }
            }
        };

        let check_name = match &error {
            LifecycleError::StartupFault { check, .. }
            | LifecycleError::StartupTimeout { check, .. } => check.as_str(),
            _ => "unknown",
        };
        runtime.record_startup_fault(check_name, error.to_string());
        return Err(error);
    }

    runtime.mark_ready()?;
    info!(checks = checks.len(), "startup complete, instance is ready");
    Ok(())
}
