//! The service contract shared by every fleet member.
//!
//! A service is parameterized only by its [`ServiceKind`]. It serves the
//! contract routes (identity line, readiness, liveness, metrics) plus any
//! business routes, becomes ready once its startup checks pass, and drains on
//! SIGTERM/SIGINT before exiting.

use std::sync::Arc;

use envconfig::Envconfig;
use lifecycle::{
    bootstrap, DrainOutcome, LifecycleState, Runtime, ServiceIdentity, ShutdownSignal,
    StartupCheck,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod handlers;
pub mod kind;
pub mod logging;
pub mod metrics;
pub mod routes;
pub mod server;

pub use config::Config;
pub use error::ServiceError;
pub use kind::ServiceKind;
pub use routes::{Dispatch, RouteEntry, RouteError, RouteTable, RouteTableBuilder};

type RouteSetup =
    Box<dyn FnOnce(RouteTableBuilder) -> Result<RouteTableBuilder, RouteError> + Send>;

pub struct Service {
    kind: ServiceKind,
    checks: Vec<Arc<dyn StartupCheck>>,
    routes: Vec<RouteSetup>,
}

impl Service {
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            checks: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Add a check that must pass before the instance reports ready.
    pub fn with_startup_check(mut self, check: impl StartupCheck + 'static) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    /// Register business routes next to the contract routes.
    pub fn with_routes<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(RouteTableBuilder) -> Result<RouteTableBuilder, RouteError> + Send + 'static,
    {
        self.routes.push(Box::new(setup));
        self
    }

    /// Load configuration from the environment and run until terminated.
    pub async fn run(self) -> Result<(), ServiceError> {
        let config = Config::init_from_env()?;
        self.run_with_config(config).await
    }

    pub async fn run_with_config(self, config: Config) -> Result<(), ServiceError> {
        let instance_id = config.instance_id();
        logging::init(self.kind.slug(), &instance_id)?;

        let bind = config.bind();
        let listener = TcpListener::bind(&bind)
            .await
            .map_err(|source| ServiceError::Bind { addr: bind, source })?;
        let identity = ServiceIdentity::new(
            self.kind.display_name(),
            instance_id,
            listener.local_addr()?,
        )?;

        // Before anything is spawned, so an early SIGTERM still drains.
        let shutdown = ShutdownSignal::install()?;
        let running = self.start(listener, identity, &config)?;

        shutdown.recv().await;
        running.terminate();

        let outcome = running.wait().await?;
        info!(outcome = ?outcome, "service stopped");
        Ok(())
    }

    /// Start serving on `listener` and run the startup checks in the background.
    /// The instance answers probes right away and reports ready once every check passed.
    pub fn start(
        self,
        listener: TcpListener,
        identity: ServiceIdentity,
        config: &Config,
    ) -> Result<RunningService, ServiceError> {
        let runtime = Runtime::with_liveness_deadline(identity, config.liveness_deadline());
        runtime.spawn_heartbeat(config.liveness_interval_ms.0);

        let recorder_handle = if config.export_prometheus {
            Some(metrics::setup_metrics_recorder()?)
        } else {
            None
        };

        let mut routes = handlers::contract_routes(&runtime, recorder_handle)?;
        for setup in self.routes {
            routes = setup(routes)?;
        }
        let app = routes.build().into_router();

        let server = tokio::spawn(server::serve(
            listener,
            app,
            runtime.clone(),
            config.shutdown_grace_period_ms.0,
        ));

        let startup = {
            let runtime = runtime.clone();
            let checks = self.checks;
            let timeout = config.startup_check_timeout_ms.0;
            tokio::spawn(async move {
                if let Err(e) = bootstrap(&runtime, &checks, timeout).await {
                    warn!(error = %e, "startup did not complete, instance stays not ready");
                }
            })
        };

        Ok(RunningService {
            runtime,
            server,
            startup,
        })
    }
}

/// A started service instance.
pub struct RunningService {
    runtime: Runtime,
    server: JoinHandle<Result<DrainOutcome, ServiceError>>,
    startup: JoinHandle<()>,
}

impl RunningService {
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Handle a termination request: drain a ready instance, or stop one that
    /// never became ready since it has no traffic to drain.
    pub fn terminate(&self) {
        loop {
            if self.runtime.begin_drain() {
                return;
            }
            match self.runtime.state() {
                Ok(LifecycleState::Starting) => {
                    info!("terminated before becoming ready");
                    // Fails only if startup completed in the meantime, then drain instead.
                    if self.runtime.mark_stopped().is_ok() {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// Wait for the server to finish draining.
    pub async fn wait(self) -> Result<DrainOutcome, ServiceError> {
        let outcome = self.server.await?;
        self.startup.abort();
        outcome
    }
}
