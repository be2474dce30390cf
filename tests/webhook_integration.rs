//! Integration tests for the webhook relay.
//!
//! Each test spins up the Axum server on a random port with wiremock standing
//! in for the Anthropic API and the downstream intake service, then drives the
//! real HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mail_relay::config::RelayConfig;
use mail_relay::llm::create_provider;
use mail_relay::pipeline::IntakePipeline;
use mail_relay::webhook::{WEBHOOK_PATH, webhook_routes};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Anthropic Messages API reply wrapping `text`.
fn anthropic_reply(text: &str) -> Value {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 120, "output_tokens": 40}
    })
}

async fn mock_llm(status: u16, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

async fn mock_downstream() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/intake"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"received": true})))
        .mount(&server)
        .await;
    server
}

/// Start the relay on a random port, return the port.
async fn start_server(llm: &MockServer, downstream: &MockServer) -> u16 {
    let config = RelayConfig::new("sk-ant-test")
        .with_llm_base_url(llm.uri())
        .with_downstream_url(format!("{}/intake", downstream.uri()))
        .with_classify_timeout(Duration::from_secs(5));
    let provider = create_provider(&config).unwrap();
    let pipeline = Arc::new(IntakePipeline::from_config(&config, provider).unwrap());
    let app = webhook_routes(pipeline, config.max_body_bytes);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    port
}

/// Wait until `server` has seen `count` requests, returning them.
async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    loop {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn plumber_email() -> Value {
    json!({
        "Subject": "Need plumber",
        "From": "a@b.com",
        "body-plain": "Need a plumber tomorrow at 9am in Austin"
    })
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn rest_health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let llm = mock_llm(200, anthropic_reply("{}")).await;
        let downstream = mock_downstream().await;
        let port = start_server(&llm, &downstream).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    })
    .await
    .expect("test timed out");
}

// ── Webhook ──────────────────────────────────────────────────────────

#[tokio::test]
async fn job_request_is_forwarded_downstream() {
    timeout(TEST_TIMEOUT, async {
        let verdict = r#"```json
{"isJobRequest": true, "confidence": 85, "extractedData": {"location": "Austin", "date": "tomorrow", "time": "9am", "jobType": "plumbing", "techsNeeded": 1}, "reasoning": "Direct booking request"}
```"#;
        let llm = mock_llm(200, anthropic_reply(verdict)).await;
        let downstream = mock_downstream().await;
        let port = start_server(&llm, &downstream).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}{WEBHOOK_PATH}"))
            .json(&plumber_email())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let ack: Value = resp.json().await.unwrap();
        assert_eq!(ack["message"], "Webhook received successfully");

        let forwarded = wait_for_requests(&downstream, 1).await;
        let body: Value = serde_json::from_slice(&forwarded[0].body).unwrap();
        assert_eq!(body["subject"], "Need plumber");
        assert_eq!(body["from"], "a@b.com");
        assert_eq!(body["to"], "");
        assert_eq!(body["body-plain"], "Need a plumber tomorrow at 9am in Austin");
        assert_eq!(body["aiAnalysis"]["isJobRequest"], true);
        assert_eq!(body["aiAnalysis"]["confidence"], 85.0);
        assert_eq!(body["aiAnalysis"]["extractedData"]["location"], "Austin");
        assert_eq!(body["aiAnalysis"]["extractedData"]["techsNeeded"], "1");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn form_encoded_delivery_is_classified() {
    timeout(TEST_TIMEOUT, async {
        let llm = mock_llm(
            200,
            anthropic_reply(r#"{"isJobRequest": true, "confidence": 90}"#),
        )
        .await;
        let downstream = mock_downstream().await;
        let port = start_server(&llm, &downstream).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}{WEBHOOK_PATH}"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("subject=Install+AC&sender=ops%40acme.com&stripped-text=Two+techs+Friday")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let forwarded = wait_for_requests(&downstream, 1).await;
        let body: Value = serde_json::from_slice(&forwarded[0].body).unwrap();
        assert_eq!(body["subject"], "Install AC");
        assert_eq!(body["from"], "ops@acme.com");
        assert_eq!(body["body-plain"], "Two techs Friday");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oracle_failure_filters_email() {
    timeout(TEST_TIMEOUT, async {
        let llm = mock_llm(500, json!({"error": "overloaded"})).await;
        let downstream = mock_downstream().await;
        let port = start_server(&llm, &downstream).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}{WEBHOOK_PATH}"))
            .json(&plumber_email())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // Classification was attempted; give the task time to finish gating.
        wait_for_requests(&llm, 1).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(downstream.received_requests().await.unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn empty_payload_makes_no_outbound_calls() {
    timeout(TEST_TIMEOUT, async {
        let llm = mock_llm(
            200,
            anthropic_reply(r#"{"isJobRequest": true, "confidence": 99}"#),
        )
        .await;
        let downstream = mock_downstream().await;
        let port = start_server(&llm, &downstream).await;

        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}{WEBHOOK_PATH}"))
            .json(&json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(llm.received_requests().await.unwrap().is_empty());
        assert!(downstream.received_requests().await.unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_oracle_does_not_delay_acknowledgement() {
    timeout(TEST_TIMEOUT, async {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(anthropic_reply(r#"{"isJobRequest": false, "confidence": 10}"#))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&llm)
            .await;
        let downstream = mock_downstream().await;
        let port = start_server(&llm, &downstream).await;

        let started = std::time::Instant::now();
        let resp = reqwest::Client::new()
            .post(format!("http://127.0.0.1:{port}{WEBHOOK_PATH}"))
            .json(&plumber_email())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(started.elapsed() < Duration::from_secs(1));
    })
    .await
    .expect("test timed out");
}
