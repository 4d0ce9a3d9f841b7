//! HTTP transport for the broker: maps inbound requests to dispatch.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /` — probe, `200 { "error": false, "message": "Hit the broker" }`.
//! - `GET /ping` — heartbeat, `200 .`
//! - `POST /handle` — dispatch an `ActionRequest`. `202` on success, else
//!   the error's status code with `{ "error": true, "message": ... }`.
//! - `POST /log-grpc` — write the request's `log` payload over typed RPC.
//!
//! Request bodies are capped at 1 MiB.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::dispatch::{ActionRequest, DispatchError, Dispatcher, JsonResponse, Outcome, Reply};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build an axum `Router` that dispatches through `dispatcher`.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", post(probe_handler))
        .route("/ping", get(ping_handler))
        .route("/handle", post(handle_handler))
        .route("/log-grpc", post(log_grpc_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(dispatcher)
}

/// Serve the broker API at `addr` (e.g. `"0.0.0.0:80"`).
pub async fn serve(dispatcher: Arc<Dispatcher>, addr: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "broker listening");
    axum::serve(listener, router(dispatcher)).await
}

async fn probe_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(JsonResponse::ok("Hit the broker")))
}

async fn ping_handler() -> &'static str {
    "."
}

/// `POST /handle` — dispatch by action tag.
async fn handle_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(request)) => respond(dispatcher.try_dispatch(&request).await),
        Err(rejection) => bad_body(rejection),
    }
}

/// `POST /log-grpc` — typed RPC log write.
async fn log_grpc_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(request)) => respond(dispatcher.try_dispatch_typed_log(&request).await),
        Err(rejection) => bad_body(rejection),
    }
}

fn respond(result: Result<Reply, DispatchError>) -> Response {
    let status = match &result {
        Ok(_) => StatusCode::ACCEPTED,
        Err(e) => StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_REQUEST),
    };
    let body = JsonResponse::from(Outcome::from(result));
    (status, Json(body)).into_response()
}

fn bad_body(rejection: JsonRejection) -> Response {
    let body = JsonResponse::from(Outcome::failure(rejection.body_text()));
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
