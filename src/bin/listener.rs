//! Listener process: consumes log events and writes them to the log service.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use broker_rust::bus::{AmqpDialer, ConnectionManager, Consumer};
use broker_rust::config::ListenerConfig;
use broker_rust::dispatch::transport::{http_client, DirectCall, HttpLogTransport};
use broker_rust::listener::{log_router, LogWriter};

#[tokio::main]
async fn main() -> ExitCode {
    let config = ListenerConfig::parse();
    config.telemetry.init();

    let manager = ConnectionManager::new(AmqpDialer, &config.amqp_url);
    let connection = match manager.connect().await {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "could not connect to message broker");
            return ExitCode::FAILURE;
        }
    };

    let client = match http_client(config.call_timeout()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not build http client");
            return ExitCode::FAILURE;
        }
    };
    let writer = LogWriter::new(Arc::new(HttpLogTransport::new(DirectCall::new(
        client,
        &config.log_url,
        "log service",
        config.call_timeout(),
    ))));
    let router = log_router(Arc::new(writer));

    let consumer = Consumer::with_exchange(connection.as_ref(), config.exchange_spec())
        .with_prefetch(config.prefetch);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    let code = match consumer
        .listen_until(&config.patterns(), router, shutdown)
        .await
    {
        Ok(stats) => {
            info!(?stats, "listener stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "could not subscribe");
            ExitCode::FAILURE
        }
    };

    if let Err(e) = manager.close().await {
        warn!(error = %e, "closing broker connection");
    }
    code
}
