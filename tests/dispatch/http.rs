//! Inbound HTTP API tests.
//!
//! Starts the broker router and exercises it with reqwest.

use std::sync::Arc;

use broker_rust::dispatch::Dispatcher;
use broker_rust::http;
use serde_json::{json, Value};

use crate::support::{rpc_log, start_fake, start_rpc_logger, Collaborators, Fake};

/// Bind to port 0 and return the base URL.
async fn start_broker(dispatcher: Dispatcher) -> String {
    let app = http::router(Arc::new(dispatcher));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn probe_hits_the_broker() {
    let base = start_broker(Collaborators::none().dispatcher().await).await;

    let resp = reqwest::Client::new().post(&base).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": false, "message": "Hit the broker" }));
}

#[tokio::test]
async fn ping_answers() {
    let base = start_broker(Collaborators::none().dispatcher().await).await;

    let resp = reqwest::get(format!("{base}/ping")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), ".");
}

#[tokio::test]
async fn unknown_action_is_400() {
    let base = start_broker(Collaborators::none().dispatcher().await).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/handle"))
        .json(&json!({ "action": "payment" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": true, "message": "unknown action" }));
}

#[tokio::test]
async fn malformed_body_is_400_json() {
    let base = start_broker(Collaborators::none().dispatcher().await).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/handle"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], true);
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn log_action_is_accepted() {
    let (addr, written) = start_rpc_logger().await;
    let dispatcher = Collaborators {
        log: Some(rpc_log(&addr)),
        ..Collaborators::none()
    }
    .dispatcher()
    .await;
    let base = start_broker(dispatcher).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/handle"))
        .json(&json!({
            "action": "log",
            "log": { "name": "order-service", "data": "order #42 created" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], false);
    assert_eq!(written.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn auth_rejection_is_401() {
    let url = start_fake("/authenticate", Fake::new(401, json!({}))).await;
    let dispatcher = Collaborators {
        auth: Some(url),
        ..Collaborators::none()
    }
    .dispatcher()
    .await;
    let base = start_broker(dispatcher).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/handle"))
        .json(&json!({
            "action": "auth",
            "auth": { "email": "admin@example.com", "password": "wrong" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": true, "message": "invalid authorization" }));
}

#[tokio::test]
async fn mail_success_is_202_with_recipient() {
    let url = start_fake("/send", Fake::new(202, json!({}))).await;
    let dispatcher = Collaborators {
        mail: Some(url),
        ..Collaborators::none()
    }
    .dispatcher()
    .await;
    let base = start_broker(dispatcher).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/handle"))
        .json(&json!({
            "action": "mail",
            "mail": {
                "from": "me@example.com",
                "to": "you@there.com",
                "subject": "Test email",
                "message": "Hello world!"
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": false, "message": "Message sent to you@there.com" }));
}

#[tokio::test]
async fn downstream_failure_is_generic_400() {
    let base = start_broker(Collaborators::none().dispatcher().await).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/handle"))
        .json(&json!({
            "action": "mail",
            "mail": { "from": "a", "to": "b", "subject": "c", "message": "d" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], true);
}
