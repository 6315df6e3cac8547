use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use envconfig::Envconfig;
use lifecycle::ServiceIdentity;
use service_common::{Config, RunningService, Service};
use tokio::net::TcpListener;

pub fn test_config(grace_period: Duration) -> Config {
    let env: HashMap<String, String> = [
        ("BIND_HOST", "127.0.0.1".to_string()),
        ("BIND_PORT", "0".to_string()),
        ("INSTANCE_ID", "integration-test".to_string()),
        (
            "SHUTDOWN_GRACE_PERIOD_MS",
            grace_period.as_millis().to_string(),
        ),
        ("STARTUP_CHECK_TIMEOUT_MS", "5000".to_string()),
        ("EXPORT_PROMETHEUS", "false".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Config::init_from_hashmap(&env).expect("invalid test config")
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    pub service: RunningService,
}

impl ServerHandle {
    pub async fn start(service: Service, config: Config) -> ServerHandle {
        let listener = TcpListener::bind(config.bind()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let identity = ServiceIdentity::new(
            service_name(&service),
            config.instance_id(),
            addr,
        )
        .unwrap();
        let service = service.start(listener, identity, &config).unwrap();
        ServerHandle { addr, service }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// GET on a fresh connection, so pooled connections never hide a closed listener.
    pub async fn get(&self, path: &str) -> reqwest::Result<(reqwest::StatusCode, String)> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;
        let response = client.get(self.url(path)).send().await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }
}

fn service_name(service: &Service) -> &'static str {
    service.kind().display_name()
}

pub async fn assert_or_retry<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(check().await)
}
