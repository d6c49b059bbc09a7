//! # Lease-Keeper Service
//!
//! Binary entry point for the Lease-Keeper HTTP service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Starts the HTTP server from lease-keeper-api and runs until SIGINT/SIGTERM
//!
//! Exit codes: 1 bind failure, 2 server failure, 3 configuration error.

mod settings;

use lease_keeper_api::{start_server, LoggingConfig, ServiceError};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let explicit_path = std::env::var(settings::CONFIG_FILE_ENV).ok();

    let service_config = match settings::load_service_config(explicit_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            settings::init_logging(&LoggingConfig::default());
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    settings::init_logging(&service_config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %service_config.server.host,
        port = service_config.server.port,
        lease_duration_seconds = service_config.broker.lease_duration_seconds,
        max_delivery_count = service_config.broker.max_delivery_count,
        "Starting Lease-Keeper Service"
    );

    if let Err(e) = start_server(service_config).await {
        error!(error = %e, "Server terminated with error");

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }
}
