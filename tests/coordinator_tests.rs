use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guntamatic_biostar::{BiostarClient, Program, SensorValue, UpdateCoordinator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> BiostarClient {
    let addr = server.address();
    BiostarClient::builder(format!("{}:{}", addr.ip(), addr.port()), "read-key").build()
}

fn writable_client(server: &MockServer) -> BiostarClient {
    let addr = server.address();
    BiostarClient::builder(format!("{}:{}", addr.ip(), addr.port()), "read-key")
        .write_key("write-key")
        .build()
}

async fn mount_status(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(server)
        .await;
}

async fn mount_legacy_failing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/daqdesc.cgi"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/daqdata.cgi"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

async fn status_request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/status.cgi")
        .count()
}

#[tokio::test]
async fn refresh_populates_caches() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        serde_json::json!({
            "temp": 72.0,
            "meta": {"sw_version": "3.2d", "sn": "B1", "typ": "Biostar 15"},
            "heat_circ": [{"nr": 1, "name": "Main", "day_temp": 21.0}],
            "heat_constraints": {"min": 12.0, "max": 28.0, "inc": 0.5}
        }),
    )
    .await;
    mount_legacy_failing(&server).await;

    let coordinator = UpdateCoordinator::builder(client_for(&server)).build();
    assert!(coordinator.snapshot().is_none());
    assert!(!coordinator.last_update_success());

    let snapshot = coordinator.refresh().await.expect("refresh should succeed");
    assert_eq!(
        snapshot.get("_Température chaudière").unwrap().value,
        SensorValue::Float(72.0)
    );

    assert!(coordinator.last_update_success());
    assert_eq!(
        coordinator.device_meta().unwrap().model.as_deref(),
        Some("Biostar 15")
    );
    assert_eq!(coordinator.heating_circuits().len(), 1);
    assert_eq!(coordinator.heat_constraints().min, 12.0);
}

#[tokio::test]
async fn failed_refresh_preserves_cached_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&serde_json::json!({
            "temp": 72.0,
            "heat_constraints": {"min": 12.0, "max": 28.0, "inc": 0.5}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_legacy_failing(&server).await;

    let coordinator = UpdateCoordinator::builder(client_for(&server)).build();
    coordinator.refresh().await.expect("first refresh should succeed");
    let before = coordinator.snapshot().unwrap();

    coordinator.refresh().await.expect_err("second refresh should fail");

    assert!(!coordinator.last_update_success());
    assert!(coordinator.last_error().is_some());
    // Last-known-good data stays visible.
    let after = coordinator.snapshot().unwrap();
    assert_eq!(*before, *after);
    assert_eq!(coordinator.heat_constraints().min, 12.0);
}

#[tokio::test]
async fn default_constraints_apply_until_device_reports() {
    let server = MockServer::start().await;
    let coordinator = UpdateCoordinator::builder(client_for(&server)).build();
    let constraints = coordinator.heat_constraints();
    assert_eq!(constraints.min, 15.0);
    assert_eq!(constraints.max, 30.0);
    assert_eq!(constraints.step, 0.5);
}

#[tokio::test]
async fn refresh_timeout_is_a_failure_not_a_hang() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&serde_json::json!({"temp": 1.0}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    mount_legacy_failing(&server).await;

    let coordinator = UpdateCoordinator::builder(client_for(&server))
        .refresh_timeout(Duration::from_millis(100))
        .build();
    let err = coordinator.refresh().await.unwrap_err();
    assert!(matches!(err, guntamatic_biostar::Error::Timeout));
    assert!(coordinator.snapshot().is_none());
}

#[tokio::test]
async fn concurrent_refreshes_coalesce_into_one_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(&serde_json::json!({"temp": 72.0}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    mount_legacy_failing(&server).await;

    let coordinator = Arc::new(UpdateCoordinator::builder(client_for(&server)).build());
    let a = {
        let c = coordinator.clone();
        tokio::spawn(async move { c.refresh().await })
    };
    let b = {
        let c = coordinator.clone();
        tokio::spawn(async move { c.refresh().await })
    };

    let snap_a = a.await.unwrap().expect("refresh a should succeed");
    let snap_b = b.await.unwrap().expect("refresh b should succeed");
    assert_eq!(*snap_a, *snap_b);

    assert_eq!(
        status_request_count(&server).await,
        1,
        "second caller should re-use the in-flight refresh"
    );
}

#[tokio::test]
async fn successful_write_triggers_one_follow_up_refresh() {
    let server = MockServer::start().await;
    mount_status(&server, serde_json::json!({"temp": 72.0})).await;
    mount_legacy_failing(&server).await;
    Mock::given(method("GET"))
        .and(path("/ext/parset.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ack": ""}"#))
        .mount(&server)
        .await;

    let coordinator = UpdateCoordinator::builder(writable_client(&server))
        .update_interval(Duration::from_secs(60))
        .build();
    coordinator.start();

    // First tick fires immediately; let it finish.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let before = status_request_count(&server).await;
    assert_eq!(before, 1, "startup refresh should have run once");

    coordinator.set_program(Program::Heat).await.expect("write should succeed");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        status_request_count(&server).await,
        before + 1,
        "write should schedule exactly one extra refresh"
    );
}

#[tokio::test]
async fn failed_write_does_not_schedule_a_refresh() {
    let server = MockServer::start().await;
    mount_status(&server, serde_json::json!({"temp": 72.0})).await;
    mount_legacy_failing(&server).await;
    Mock::given(method("GET"))
        .and(path("/ext/parset.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"err": "nope"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/parset.cgi"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let coordinator = UpdateCoordinator::builder(writable_client(&server))
        .update_interval(Duration::from_secs(60))
        .build();
    coordinator.start();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let before = status_request_count(&server).await;

    coordinator.set_program(Program::Heat).await.expect_err("write should fail");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(status_request_count(&server).await, before);
}

#[tokio::test]
async fn stop_halts_the_update_loop() {
    let server = MockServer::start().await;
    mount_status(&server, serde_json::json!({"temp": 72.0})).await;
    mount_legacy_failing(&server).await;

    let coordinator = UpdateCoordinator::builder(client_for(&server))
        .update_interval(Duration::from_millis(100))
        .build();
    coordinator.start();
    tokio::time::sleep(Duration::from_millis(350)).await;
    coordinator.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let after_stop = status_request_count(&server).await;
    assert!(after_stop >= 2, "loop should have ticked while running");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        status_request_count(&server).await,
        after_stop,
        "no refreshes after stop"
    );

    // Cached data remains readable after shutdown.
    assert!(coordinator.snapshot().is_some());
}

#[tokio::test]
async fn snapshot_and_failure_callbacks_fire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&serde_json::json!({"temp": 72.0})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status.cgi"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_legacy_failing(&server).await;

    let snapshots = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let s = snapshots.clone();
    let f = failures.clone();

    let coordinator = UpdateCoordinator::builder(client_for(&server))
        .on_snapshot(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        })
        .on_update_failed(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    coordinator.refresh().await.expect("first refresh should succeed");
    coordinator.refresh().await.expect_err("second refresh should fail");

    assert_eq!(snapshots.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}
