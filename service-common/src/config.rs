use std::str::FromStr;
use std::time;

use envconfig::Envconfig;
use lifecycle::generate_instance_id;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,

    // Explicit override, otherwise the pod name the orchestrator puts in HOSTNAME.
    pub instance_id: Option<String>,

    #[envconfig(from = "HOSTNAME")]
    pub hostname: Option<String>,

    #[envconfig(default = "30000")]
    pub shutdown_grace_period_ms: EnvMsDuration,

    #[envconfig(default = "10000")]
    pub startup_check_timeout_ms: EnvMsDuration,

    #[envconfig(default = "1000")]
    pub liveness_interval_ms: EnvMsDuration,

    #[envconfig(default = "10000")]
    pub liveness_deadline_ms: EnvMsDuration,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}

impl Config {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `None` when the deadline is set to 0, which disables heartbeat checking.
    pub fn liveness_deadline(&self) -> Option<time::Duration> {
        Some(self.liveness_deadline_ms.0).filter(|d| !d.is_zero())
    }

    /// Generates a fresh id on every call when none is configured, so resolve it once.
    pub fn instance_id(&self) -> String {
        self.instance_id
            .iter()
            .chain(self.hostname.iter())
            .map(|id| id.trim())
            .find(|id| !id.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(generate_instance_id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}
