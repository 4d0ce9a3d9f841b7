//! Typed RPC log transport against an in-process tonic `LogService`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use broker_rust::dispatch::transport::{TypedRpcLogTransport, TYPED_RPC_DEADLINE};
use broker_rust::dispatch::{ActionRequest, DispatchError, Dispatcher, ErrorKind, Transport};
use broker_rust::rpc::grpc::{LogRequest, LogResponse, LogService, LogServiceServer};
use broker_rust::LogEvent;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status};

use crate::support::{auth, dead_addr, http_log, mail};

struct Logger {
    written: Arc<Mutex<Vec<LogEvent>>>,
    delay: Duration,
}

#[tonic::async_trait]
impl LogService for Logger {
    async fn write_log(
        &self,
        request: Request<LogRequest>,
    ) -> Result<Response<LogResponse>, Status> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let entry = request
            .into_inner()
            .log_entry
            .ok_or_else(|| Status::invalid_argument("missing log entry"))?;
        self.written.lock().unwrap().push(entry.into());
        Ok(Response::new(LogResponse {
            result: "logged!".into(),
        }))
    }
}

/// Bind to port 0, spawn the gRPC server, and return its endpoint.
async fn start_logger(delay: Duration) -> (String, Arc<Mutex<Vec<LogEvent>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let service = LogServiceServer::new(Logger {
        written: Arc::clone(&written),
        delay,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    (format!("http://{addr}"), written)
}

async fn dispatcher_with(typed: TypedRpcLogTransport) -> Dispatcher {
    let dead = format!("http://{}", dead_addr().await);
    Dispatcher::new(auth(&dead), http_log(&dead), mail(&dead)).with_typed_log(Arc::new(typed))
}

#[tokio::test]
async fn writes_log_through_typed_rpc() {
    let (endpoint, written) = start_logger(Duration::ZERO).await;
    let dispatcher = dispatcher_with(TypedRpcLogTransport::new(endpoint)).await;

    let request = ActionRequest::log(LogEvent::new("order-service", "order #42 created"));
    let outcome = dispatcher.dispatch_typed_log(&request).await;

    assert!(!outcome.failed, "{}", outcome.message);
    assert_eq!(outcome.message, "logged!");
    assert_eq!(
        *written.lock().unwrap(),
        vec![LogEvent::new("order-service", "order #42 created")]
    );
}

#[tokio::test]
async fn deadline_bounds_a_slow_service() {
    let (endpoint, _) = start_logger(Duration::from_secs(5)).await;
    let transport = TypedRpcLogTransport::new(endpoint);

    let started = Instant::now();
    let err = transport
        .deliver(&LogEvent::new("a", "b"))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Timeout(d) if d == TYPED_RPC_DEADLINE));
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn expired_deadline_cancels_the_remote_write() {
    let delay = Duration::from_secs(2);
    let (endpoint, written) = start_logger(delay).await;
    let transport = TypedRpcLogTransport::new(endpoint);

    for _ in 0..3 {
        let err = transport
            .deliver(&LogEvent::new("a", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport, "{err:?}");
    }

    // Long enough for any surviving server-side handler to finish its write.
    tokio::time::sleep(delay + Duration::from_millis(500)).await;
    assert!(written.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_service_fails() {
    let endpoint = format!("http://{}", dead_addr().await);
    let dispatcher = dispatcher_with(TypedRpcLogTransport::new(endpoint)).await;

    let outcome = dispatcher
        .dispatch_typed_log(&ActionRequest::log(LogEvent::new("a", "b")))
        .await;
    assert!(outcome.failed);
    assert!(!outcome.message.is_empty());
}

#[tokio::test]
async fn missing_log_payload_fails() {
    let (endpoint, written) = start_logger(Duration::ZERO).await;
    let dispatcher = dispatcher_with(TypedRpcLogTransport::new(endpoint)).await;

    let err = dispatcher
        .try_dispatch_typed_log(&ActionRequest {
            action: "log".into(),
            ..ActionRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::MissingPayload("log")));
    assert!(written.lock().unwrap().is_empty());
}
