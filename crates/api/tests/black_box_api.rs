use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, routing::post};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use web2wire_infra::BrokerConfig;

const SECRET: &str = "test-callback-secret";

type Seen = Arc<Mutex<Vec<Value>>>;

/// Stand-in for the physical device: records job bodies, answers with a fixed status.
struct FakeDevice {
    url: String,
    seen: Seen,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeDevice {
    async fn spawn(status: u16, delay: Duration) -> Self {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let status = axum::http::StatusCode::from_u16(status).unwrap();

        let app = Router::new()
            .route(
                "/api/job/start",
                post(move |State(seen): State<Seen>, Json(body): Json<Value>| async move {
                    seen.lock().unwrap().push(body);
                    tokio::time::sleep(delay).await;
                    status
                }),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind device port");
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, seen, handle }
    }

    fn calls(&self) -> Vec<Value> {
        self.seen.lock().unwrap().clone()
    }

    async fn wait_for_calls(&self, n: usize) -> Vec<Value> {
        for _ in 0..500 {
            let calls = self.calls();
            if calls.len() >= n {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("device did not receive {n} job(s) in time");
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
    shutdown: CancellationToken,
}

impl TestServer {
    async fn spawn(device_url: &str, extra: &[(&str, &str)]) -> Self {
        let mut env = vec![
            ("CALLBACK_SECRET".to_string(), SECRET.to_string()),
            ("DEVICE_URL".to_string(), device_url.to_string()),
            ("DISPATCH_POLL_SECS".to_string(), "1".to_string()),
        ];
        env.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        // Later entries override the defaults above.
        let config = BrokerConfig::from_lookup(|key| {
            env.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .expect("test config");

        let shutdown = CancellationToken::new();
        let services = web2wire_api::app::services::build_services(&config, shutdown.clone())
            .await
            .expect("services");
        // Same router as prod, bound to an ephemeral port.
        let app = web2wire_api::app::build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            handle,
            shutdown,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

async fn submit(client: &reqwest::Client, server: &TestServer, name: &str) -> (StatusCode, Value) {
    let res = client
        .post(server.url("/request/new"))
        .json(&json!({ "name": name, "country": "Portugal", "payload_code": "pt" }))
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

async fn queue_status(client: &reqwest::Client, server: &TestServer) -> Value {
    let res = client.get(server.url("/queue/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn health(client: &reqwest::Client, server: &TestServer) -> Value {
    let res = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_store_and_limits() {
    let device = FakeDevice::spawn(202, Duration::ZERO).await;
    let server = TestServer::spawn(&device.url, &[]).await;
    let client = reqwest::Client::new();

    let body = health(&client, &server).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "connected");
    assert_eq!(body["device_url"], device.url.as_str());
    assert_eq!(body["max_queue_size"], 10);
    assert_eq!(body["dispatcher"]["dispatched"], 0);

    // Same endpoint under the firmware prefix.
    let res = client.get(server.url("/api/queue/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "queue_size": 0, "device_state": "IDLE" }));
}

#[tokio::test]
async fn invalid_submissions_are_rejected() {
    let device = FakeDevice::spawn(202, Duration::ZERO).await;
    let server = TestServer::spawn(&device.url, &[]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/request/new"))
        .json(&json!({ "name": "Ana", "country": "PT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("payload_code"));

    let res = client
        .post(server.url("/request/new"))
        .json(&json!({ "name": "  ", "country": "PT", "payload_code": "PT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/request/new"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert_eq!(queue_status(&client, &server).await["queue_size"], 0);
    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn submission_is_dispatched_and_next_waits_for_completion() {
    let device = FakeDevice::spawn(202, Duration::ZERO).await;
    let server = TestServer::spawn(&device.url, &[]).await;
    let client = reqwest::Client::new();

    let (status, body) = submit(&client, &server, "Ana").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queue_size"], 1);
    assert_eq!(body["message"], "Pulse request accepted for Ana from Portugal.");

    let calls = device.wait_for_calls(1).await;
    assert_eq!(calls[0]["name"], "Ana");
    assert_eq!(calls[0]["payload_code"], "PT");
    assert_eq!(calls[0]["sequence_id"], 1);

    assert_eq!(
        queue_status(&client, &server).await,
        json!({ "queue_size": 0, "device_state": "PROCESSING" })
    );

    let (status, body) = submit(&client, &server, "Bruno").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["queue_size"], 1);

    // Busy device: Bruno stays queued.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(device.calls().len(), 1);
    assert_eq!(queue_status(&client, &server).await["queue_size"], 1);

    let res = client
        .post(server.url("/api/job/complete"))
        .bearer_auth(SECRET)
        .json(&json!({ "status": "completed", "sequence_id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Job completion acknowledged.");

    let calls = device.wait_for_calls(2).await;
    assert_eq!(calls[1]["name"], "Bruno");
    assert_eq!(calls[1]["sequence_id"], 2);

    let stats = health(&client, &server).await["dispatcher"].clone();
    assert_eq!(stats["dispatched"], 2);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["in_flight"], 2);
}

#[tokio::test]
async fn completion_callback_requires_credential() {
    let device = FakeDevice::spawn(202, Duration::ZERO).await;
    let server = TestServer::spawn(&device.url, &[]).await;
    let client = reqwest::Client::new();
    let done = json!({ "status": "completed" });

    let res = client
        .post(server.url("/job/complete"))
        .json(&done)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(server.url("/job/complete"))
        .header("authorization", format!("Basic {SECRET}"))
        .json(&done)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(server.url("/job/complete"))
        .bearer_auth(format!("{SECRET}x"))
        .json(&done)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let res = client
        .post(server.url("/job/complete"))
        .bearer_auth(SECRET)
        .json(&json!({ "status": "failed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/job/complete"))
        .bearer_auth(SECRET)
        .json(&done)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["device_state"], "IDLE");
}

#[tokio::test]
async fn queue_is_bounded_while_device_is_busy() {
    let device = FakeDevice::spawn(202, Duration::ZERO).await;
    let server = TestServer::spawn(&device.url, &[]).await;
    let client = reqwest::Client::new();

    // First job goes straight to the device and never completes.
    submit(&client, &server, "first").await;
    device.wait_for_calls(1).await;

    for i in 1..=10 {
        let (status, body) = submit(&client, &server, &format!("pending-{i}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["queue_size"], i);
    }

    let (status, body) = submit(&client, &server, "overflow").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["queue_size"], 10);
    assert_eq!(
        body["message"],
        "Queue is full. Current size is 10. Please try again later."
    );

    assert_eq!(
        queue_status(&client, &server).await,
        json!({ "queue_size": 10, "device_state": "PROCESSING" })
    );
}

#[tokio::test]
async fn device_timeout_frees_the_device() {
    let device = FakeDevice::spawn(202, Duration::from_secs(10)).await;
    let server = TestServer::spawn(&device.url, &[("DEVICE_TIMEOUT_SECS", "1")]).await;
    let client = reqwest::Client::new();

    submit(&client, &server, "Ana").await;
    device.wait_for_calls(1).await;

    let mut stats = Value::Null;
    for _ in 0..40 {
        stats = health(&client, &server).await["dispatcher"].clone();
        if stats["dropped"] == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(stats["failed"], 1);
    assert_eq!(stats["dropped"], 1);
    assert_eq!(stats["in_flight"], Value::Null);

    assert_eq!(
        queue_status(&client, &server).await,
        json!({ "queue_size": 0, "device_state": "IDLE" })
    );
}

#[tokio::test]
async fn rejected_job_is_requeued_when_configured() {
    let device = FakeDevice::spawn(500, Duration::ZERO).await;
    let server = TestServer::spawn(&device.url, &[("REQUEUE_ON_DEVICE_FAILURE", "true")]).await;
    let client = reqwest::Client::new();

    submit(&client, &server, "Ana").await;

    // The device keeps refusing: the same job comes back, once per poll tick.
    let calls = device.wait_for_calls(2).await;
    assert!(calls.iter().all(|c| c["sequence_id"] == 1));
    assert!(device.calls().len() <= 3);

    let stats = health(&client, &server).await["dispatcher"].clone();
    assert!(stats["requeued"].as_u64().unwrap() >= 1);
    assert_eq!(stats["dropped"], 0);
}

#[tokio::test]
async fn unreachable_store_degrades_instead_of_failing() {
    let device = FakeDevice::spawn(202, Duration::ZERO).await;
    // Nothing listens on port 1; startup must still succeed.
    let server = TestServer::spawn(&device.url, &[("REDIS_URL", "redis://127.0.0.1:1")]).await;
    let client = reqwest::Client::new();

    assert_eq!(
        queue_status(&client, &server).await,
        json!({ "queue_size": 0, "device_state": "OFFLINE" })
    );

    let (status, body) = submit(&client, &server, "Ana").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "store_unavailable");

    let res = client
        .post(server.url("/job/complete"))
        .bearer_auth(SECRET)
        .json(&json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = health(&client, &server).await;
    assert_eq!(body["store"], "disconnected");
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["dispatcher"]["dispatched"], 0);

    assert!(device.calls().is_empty());
}
