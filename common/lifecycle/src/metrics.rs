use crate::state::LifecycleState;

pub(crate) const METRIC_TRANSITIONS: &str = "lifecycle_transitions_total";
pub(crate) const METRIC_STATE: &str = "lifecycle_state";
pub(crate) const METRIC_STARTUP_FAULTS: &str = "lifecycle_startup_faults_total";
pub(crate) const METRIC_DRAIN_DURATION: &str = "lifecycle_drain_duration_seconds";

pub(crate) fn emit_transition(service_name: &str, from: LifecycleState, to: LifecycleState) {
    metrics::counter!(
        METRIC_TRANSITIONS,
        "service_name" => service_name.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    metrics::gauge!(METRIC_STATE, "service_name" => service_name.to_string())
        .set(f64::from(u8::from(to)));
}

pub(crate) fn emit_startup_fault(service_name: &str, check: &str) {
    metrics::counter!(
        METRIC_STARTUP_FAULTS,
        "service_name" => service_name.to_string(),
        "check" => check.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_drain_duration(service_name: &str, clean: bool, duration_secs: f64) {
    let result = if clean { "clean" } else { "timeout" };
    metrics::histogram!(
        METRIC_DRAIN_DURATION,
        "service_name" => service_name.to_string(),
        "result" => result
    )
    .record(duration_secs);
}
