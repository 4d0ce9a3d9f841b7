//! Broker process: inbound HTTP API in front of the dispatcher.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use broker_rust::bus::{AmqpDialer, ConnectionManager};
use broker_rust::config::BrokerConfig;
use broker_rust::{http, Dispatcher};

#[tokio::main]
async fn main() -> ExitCode {
    let config = BrokerConfig::parse();
    config.telemetry.init();

    info!(
        listen_addr = %config.listen_addr,
        log_transport = ?config.dispatch.log_transport,
        "starting broker"
    );

    let manager = ConnectionManager::new(AmqpDialer, &config.amqp_url);
    let connection = match manager.connect().await {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "could not connect to message broker");
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = match Dispatcher::from_config(&config.dispatch, connection) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            error!(error = %e, "could not build http client");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = http::serve(dispatcher, &config.listen_addr).await {
        error!(error = %e, "http server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
