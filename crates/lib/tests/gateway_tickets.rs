//! Integration tests: start the gateway on a free port and drive it over HTTP.
//! No Ollama needed; extraction degrades when the backend is unreachable, so
//! tickets without contact details land in missing_identity deterministically.

use lib::config::Config;
use lib::gateway;
use serde_json::json;
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

async fn start_gateway() -> (u16, reqwest::Client) {
    let port = free_port();
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();

    tokio::spawn(async move {
        let _ = gateway::run_gateway(config).await;
    });

    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/", port);
    for _ in 0..100 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return (port, client);
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway did not come up on port {} within 5s", port);
}

#[tokio::test]
async fn health_responds_with_running() {
    let (port, client) = start_gateway().await;

    let resp = client
        .get(format!("http://127.0.0.1:{}/", port))
        .send()
        .await
        .expect("GET /");
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(body.get("runtime").and_then(|v| v.as_str()), Some("running"));
    assert_eq!(body.get("port").and_then(|v| v.as_u64()), Some(port as u64));
}

#[tokio::test]
async fn identity_reply_without_thread_id_is_bad_request() {
    let (port, client) = start_gateway().await;

    let resp = client
        .post(format!("http://127.0.0.1:{}/tickets", port))
        .json(&json!({ "message": "Schmidt, Anna, anna@example.com" }))
        .send()
        .await
        .expect("POST /tickets");

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.expect("parse JSON");
    assert!(body.get("detail").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn ticket_without_identity_parks_then_holds_on_invalid_reply() {
    let (port, client) = start_gateway().await;
    let url = format!("http://127.0.0.1:{}/tickets", port);

    let resp = client
        .post(&url)
        .json(&json!({
            "message": "Mein Drucker druckt nicht mehr.",
            "threadId": "thread-42"
        }))
        .send()
        .await
        .expect("POST /tickets");
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(
        body.get("status").and_then(|v| v.as_str()),
        Some("missing_identity")
    );
    assert_eq!(
        body.pointer("/metadata/session_token").and_then(|v| v.as_str()),
        Some("thread-42")
    );

    // Anything but the strict identity format keeps the thread parked.
    let resp = client
        .post(&url)
        .json(&json!({
            "message": "Es ist wirklich dringend!",
            "threadId": "thread-42"
        }))
        .send()
        .await
        .expect("POST /tickets");
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.expect("parse JSON");
    assert_eq!(
        body.get("status").and_then(|v| v.as_str()),
        Some("waiting_for_identity")
    );
    assert_eq!(
        body.pointer("/metadata/original_message").and_then(|v| v.as_str()),
        Some("Mein Drucker druckt nicht mehr.")
    );
}
