use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use broker_rust::dispatch::transport::{
    http_client, AuthTransport, BinaryRpcLogTransport, DirectCall, HttpLogTransport,
    MailTransport, LOG_INFO,
};
use broker_rust::dispatch::{Dispatcher, Transport};
use broker_rust::rpc::RpcServer;
use broker_rust::LogEvent;
use serde_json::Value;
use tokio::net::TcpListener;

pub const TIMEOUT: Duration = Duration::from_millis(500);

/// What a fake downstream endpoint answers, and what it was sent.
#[derive(Clone)]
pub struct Fake {
    status: StatusCode,
    body: Value,
    delay: Duration,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl Fake {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body,
            delay: Duration::ZERO,
            received: Arc::default(),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn fake_handler(State(fake): State<Fake>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    fake.received.lock().unwrap().push(body);
    if !fake.delay.is_zero() {
        tokio::time::sleep(fake.delay).await;
    }
    (fake.status, Json(fake.body.clone()))
}

/// Serve `fake` at `path` on port 0; returns the full endpoint URL.
pub async fn start_fake(path: &str, fake: Fake) -> String {
    let app = Router::new()
        .route(path, post(fake_handler))
        .with_state(fake);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}{path}")
}

/// An address nothing listens on.
pub async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

pub fn direct(url: &str, service: &'static str) -> DirectCall {
    DirectCall::new(http_client(TIMEOUT).unwrap(), url, service, TIMEOUT)
}

pub fn auth(url: &str) -> Arc<dyn Transport<broker_rust::AuthRequest>> {
    Arc::new(AuthTransport::new(direct(url, "auth service")))
}

pub fn mail(url: &str) -> Arc<dyn Transport<broker_rust::MailRequest>> {
    Arc::new(MailTransport::new(direct(url, "mail service")))
}

pub fn http_log(url: &str) -> Arc<dyn Transport<LogEvent>> {
    Arc::new(HttpLogTransport::new(direct(url, "log service")))
}

pub fn rpc_log(addr: &str) -> Arc<dyn Transport<LogEvent>> {
    Arc::new(BinaryRpcLogTransport::new(addr, TIMEOUT))
}

/// A dispatcher whose collaborators all live at `dead` except those given.
pub struct Collaborators {
    pub auth: Option<String>,
    pub mail: Option<String>,
    pub log: Option<Arc<dyn Transport<LogEvent>>>,
}

impl Collaborators {
    pub fn none() -> Self {
        Self {
            auth: None,
            mail: None,
            log: None,
        }
    }

    pub async fn dispatcher(self) -> Dispatcher {
        let dead = format!("http://{}", dead_addr().await);
        Dispatcher::new(
            auth(&self.auth.unwrap_or_else(|| dead.clone())),
            self.log.unwrap_or_else(|| http_log(&dead)),
            mail(&self.mail.unwrap_or(dead)),
        )
    }
}

/// Entries written through the in-process `LogInfo` procedure.
pub type Written = Arc<Mutex<Vec<LogEvent>>>;

/// Binary RPC log collaborator on port 0.
pub async fn start_rpc_logger() -> (String, Written) {
    let written: Written = Arc::default();
    let store = Arc::clone(&written);
    let server = RpcServer::new().method(LOG_INFO, move |entry: LogEvent| {
        let store = Arc::clone(&store);
        async move {
            let reply = format!("Processed payload via RPC: {}", entry.name);
            store.lock().unwrap().push(entry);
            Ok::<_, String>(reply)
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(server.serve(listener));
    (addr, written)
}
