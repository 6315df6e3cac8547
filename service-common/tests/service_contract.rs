use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use lifecycle::{DrainOutcome, LifecycleState, StartupCheck};
use service_common::{Service, ServiceKind};
use tokio::sync::Notify;

mod common;
use common::{assert_or_retry, test_config, ServerHandle};

/// One unit of time for the drain scenarios.
const UNIT: Duration = Duration::from_millis(200);

/// Holds startup until released.
struct Gate(Arc<Notify>);

#[async_trait]
impl StartupCheck for Gate {
    fn name(&self) -> &str {
        "gate"
    }

    async fn check(&self) -> anyhow::Result<()> {
        self.0.notified().await;
        Ok(())
    }
}

struct Broken;

#[async_trait]
impl StartupCheck for Broken {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> anyhow::Result<()> {
        anyhow::bail!("connection refused")
    }
}

/// A service with a `/slow` route that signals `entered` and then takes `duration`.
fn slow_service(entered: Arc<Notify>, duration: Duration) -> Service {
    Service::new(ServiceKind::Order).with_routes(move |routes| {
        routes.get("/slow", move |_| {
            let entered = entered.clone();
            async move {
                entered.notify_one();
                tokio::time::sleep(duration).await;
                "done"
            }
        })
    })
}

/// `/slow` outlives any grace period used here, `/quick` finishes well within it.
fn mixed_speed_service(slow_entered: Arc<Notify>, quick_entered: Arc<Notify>) -> Service {
    Service::new(ServiceKind::Restaurant).with_routes(move |routes| {
        routes
            .get("/slow", move |_| {
                let entered = slow_entered.clone();
                async move {
                    entered.notify_one();
                    tokio::time::sleep(UNIT * 10).await;
                    "slow"
                }
            })?
            .get("/quick", move |_| {
                let entered = quick_entered.clone();
                async move {
                    entered.notify_one();
                    tokio::time::sleep(UNIT / 2).await;
                    "quick"
                }
            })
    })
}

async fn wait_until_ready(server: &ServerHandle) {
    let runtime = server.service.runtime().clone();
    assert_or_retry(|| {
        let runtime = runtime.clone();
        async move { runtime.readiness() }
    })
    .await;
}

#[tokio::test]
async fn user_instance_is_not_ready_until_initialized() {
    let release = Arc::new(Notify::new());
    let service = Service::new(ServiceKind::User).with_startup_check(Gate(release.clone()));
    let server = ServerHandle::start(service, test_config(UNIT)).await;

    let (status, body) = server.get("/").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "User Service is running!");

    let (status, body) = server.get("/health").await.unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_ne!(body, "OK");

    let (status, _) = server.get("/_liveness").await.unwrap();
    assert_eq!(status, StatusCode::OK);

    release.notify_one();
    let probe = &server;
    assert_or_retry(|| async move {
        matches!(probe.get("/health").await, Ok((StatusCode::OK, ref body)) if body == "OK")
    })
    .await;

    server.service.terminate();
    let outcome = server.service.wait().await.unwrap();
    assert!(matches!(outcome, DrainOutcome::Clean { .. }));
}

#[tokio::test]
async fn startup_fault_keeps_instance_alive_but_not_ready() {
    let service = Service::new(ServiceKind::Restaurant).with_startup_check(Broken);
    let server = ServerHandle::start(service, test_config(UNIT)).await;

    let runtime = server.service.runtime().clone();
    assert_or_retry(|| {
        let runtime = runtime.clone();
        async move { runtime.startup_fault().is_some() }
    })
    .await;

    for _ in 0..5 {
        let (status, _) = server.get("/health").await.unwrap();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = server.get("/_liveness").await.unwrap();
        assert_eq!(status, StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, body) = server.get("/").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Restaurant Service is running!");

    // Never admitted traffic, so termination stops without draining.
    server.service.terminate();
    assert_eq!(
        server.service.runtime().state().unwrap(),
        LifecycleState::Stopped
    );
    server.service.wait().await.unwrap();
}

#[tokio::test]
async fn routing_misses_are_distinguishable() {
    let service = Service::new(ServiceKind::Order).with_routes(|routes| {
        routes.route(Method::POST, "/orders", |_| async { StatusCode::ACCEPTED })
    });
    let server = ServerHandle::start(service, test_config(UNIT)).await;

    let (status, _) = server.get("/nope").await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.get("/orders").await.unwrap();
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let response = reqwest::Client::new()
        .post(server.url("/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn drain_lets_in_flight_request_finish_within_grace_period() {
    let entered = Arc::new(Notify::new());
    let service = slow_service(entered.clone(), UNIT);
    let server = ServerHandle::start(service, test_config(UNIT * 2)).await;
    wait_until_ready(&server).await;

    let in_flight = {
        let url = server.url("/slow");
        tokio::spawn(async move { reqwest::get(url).await?.text().await })
    };
    entered.notified().await;

    server.service.terminate();
    assert!(!server.service.runtime().readiness());

    // The listener is closed as soon as draining starts.
    assert!(server.get("/").await.is_err());

    assert_eq!(in_flight.await.unwrap().unwrap(), "done");

    let outcome = server.service.wait().await.unwrap();
    match outcome {
        DrainOutcome::Clean { elapsed } => assert!(elapsed < UNIT * 2),
        other => panic!("expected a clean drain, got {other:?}"),
    }
}

#[tokio::test]
async fn drain_abandons_in_flight_request_at_grace_period() {
    let entered = Arc::new(Notify::new());
    let service = slow_service(entered.clone(), UNIT * 10);
    let server = ServerHandle::start(service, test_config(UNIT * 2)).await;
    wait_until_ready(&server).await;

    let in_flight = {
        let url = server.url("/slow");
        tokio::spawn(async move { reqwest::get(url).await?.text().await })
    };
    entered.notified().await;

    server.service.terminate();
    assert!(server.get("/health").await.is_err());

    let runtime = server.service.runtime().clone();
    let outcome = server.service.wait().await.unwrap();
    match outcome {
        DrainOutcome::TimedOut { elapsed, abandoned } => {
            assert_eq!(abandoned, 1);
            assert!(elapsed >= UNIT * 2);
            assert!(elapsed < UNIT * 10);
        }
        other => panic!("expected the drain to time out, got {other:?}"),
    }

    assert!(in_flight.await.unwrap().is_err());
    assert_eq!(runtime.state().unwrap(), LifecycleState::Stopped);
}

#[tokio::test]
async fn timed_out_drain_counts_only_unfinished_connections() {
    let slow_entered = Arc::new(Notify::new());
    let quick_entered = Arc::new(Notify::new());
    let service = mixed_speed_service(slow_entered.clone(), quick_entered.clone());
    let server = ServerHandle::start(service, test_config(UNIT * 2)).await;
    wait_until_ready(&server).await;

    let slow = {
        let url = server.url("/slow");
        tokio::spawn(async move { reqwest::get(url).await?.text().await })
    };
    let quick = {
        let url = server.url("/quick");
        tokio::spawn(async move { reqwest::get(url).await?.text().await })
    };
    slow_entered.notified().await;
    quick_entered.notified().await;

    server.service.terminate();

    assert_eq!(quick.await.unwrap().unwrap(), "quick");

    let outcome = server.service.wait().await.unwrap();
    match outcome {
        DrainOutcome::TimedOut { abandoned, .. } => assert_eq!(abandoned, 1),
        other => panic!("expected the drain to time out, got {other:?}"),
    }
    assert!(slow.await.unwrap().is_err());
}

#[tokio::test]
async fn repeated_termination_requests_drain_once() {
    let server = ServerHandle::start(Service::new(ServiceKind::User), test_config(UNIT)).await;
    wait_until_ready(&server).await;

    for _ in 0..3 {
        server.service.terminate();
        // With nothing in flight the drain may already have finished.
        assert!(matches!(
            server.service.runtime().state().unwrap(),
            LifecycleState::Draining | LifecycleState::Stopped
        ));
        assert!(!server.service.runtime().readiness());
    }

    let runtime = server.service.runtime().clone();
    server.service.wait().await.unwrap();
    assert_eq!(runtime.state().unwrap(), LifecycleState::Stopped);
}
