use std::time::{Duration, Instant};

use axum::Router;
use futures::FutureExt;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use lifecycle::{DrainOutcome, LifecycleState, Runtime};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower::Service;

use crate::error::ServiceError;

/// Serve `app` on `listener` until the runtime starts draining, then drain.
///
/// Once draining begins the listener is closed, so no new connection is
/// accepted. Connections already open may finish their in-flight requests until
/// `grace_period` expires, after which they are dropped. If the runtime is still
/// `Draining` at that point it is moved to `Stopped`.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    runtime: Runtime,
    grace_period: Duration,
) -> Result<DrainOutcome, ServiceError> {
    tracing::info!("listening on {:?}", listener.local_addr()?);

    let builder = AutoBuilder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut connections = JoinSet::new();

    let drain = runtime.drain_signal();
    tokio::pin!(drain);

    loop {
        tokio::select! {
            // Checked first: once draining, a pending connection must not be accepted.
            biased;

            _ = &mut drain => {
                tracing::info!("drain started, stopping accept loop");
                break;
            }
            result = listener.accept() => {
                let (socket, _) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("failed to accept connection: {}", e);
                        continue;
                    }
                };

                // Match axum default: set TCP_NODELAY for low-latency
                if let Err(e) = socket.set_nodelay(true) {
                    tracing::warn!("failed to set TCP_NODELAY: {}", e);
                }

                let app = app.clone();
                let service = hyper::service::service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                    let mut app = app.clone();
                    async move { app.call(req.map(axum::body::Body::new)).await }
                });

                let conn = builder.serve_connection_with_upgrades(TokioIo::new(socket), service);
                let conn = graceful.watch(conn.into_owned());

                connections.spawn(async move {
                    if let Err(e) = conn.await {
                        tracing::debug!("connection closed: {}", e);
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);

    let started = Instant::now();
    let outcome = match tokio::time::timeout(
        grace_period,
        wait_for_connections(graceful, &mut connections),
    )
    .await
    {
        Ok(()) => DrainOutcome::Clean {
            elapsed: started.elapsed(),
        },
        Err(_) => {
            // Connections that closed during the grace period are done, not abandoned.
            while let Some(Some(_)) = connections.join_next().now_or_never() {}
            let abandoned = connections.len();
            connections.shutdown().await;
            DrainOutcome::TimedOut {
                elapsed: started.elapsed(),
                abandoned,
            }
        }
    };

    if runtime.state()? == LifecycleState::Draining {
        runtime.complete_drain(outcome)?;
    }

    Ok(outcome)
}

async fn wait_for_connections(graceful: GracefulShutdown, connections: &mut JoinSet<()>) {
    graceful.shutdown().await;
    while connections.join_next().await.is_some() {}
}
