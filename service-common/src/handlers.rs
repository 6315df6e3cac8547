use lifecycle::{LivenessHandler, ReadinessHandler, Runtime};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::routes::{RouteError, RouteTable, RouteTableBuilder};

/// The routes every fleet member serves, independent of its business routes:
///
/// - `GET /` identity line, answered for as long as the process is up
/// - `GET /health` and `GET /_readiness` readiness probe
/// - `GET /_liveness` liveness probe
/// - `GET /metrics` Prometheus exposition, when a recorder is installed
pub fn contract_routes(
    runtime: &Runtime,
    metrics: Option<PrometheusHandle>,
) -> Result<RouteTableBuilder, RouteError> {
    let index_body = format!("{} is running!", runtime.identity().name());
    let readiness = ReadinessHandler::new(runtime.clone());
    let liveness = LivenessHandler::new(runtime.clone());

    let routes = RouteTable::builder()
        .get("/", move |_| std::future::ready(index_body.clone()))?
        .get("/health", {
            let readiness = readiness.clone();
            move |_| std::future::ready(readiness.check())
        })?
        .get("/_readiness", move |_| std::future::ready(readiness.check()))?
        .get("/_liveness", move |_| std::future::ready(liveness.check()))?;

    match metrics {
        Some(recorder_handle) => {
            routes.get("/metrics", move |_| std::future::ready(recorder_handle.render()))
        }
        None => Ok(routes),
    }
}
