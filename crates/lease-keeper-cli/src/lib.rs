//! # Lease-Keeper CLI
//!
//! Command-line client for the Lease-Keeper message broker.
//!
//! This module provides commands for:
//! - Issuing and revoking tenant API keys
//! - Publishing, claiming and acknowledging messages
//! - Inspecting queue statistics

pub mod client;

pub use client::BrokerClient;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Structure
// ============================================================================

/// Lease-Keeper CLI - client for the multi-tenant message broker
#[derive(Parser, Debug)]
#[command(name = "lease-keeper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the Lease-Keeper message broker")]
#[command(
    long_about = "Lease-Keeper is an in-memory message broker with leased, at-least-once delivery"
)]
pub struct Cli {
    /// Broker base URL
    #[arg(short, long, env = "LK_SERVER", default_value = "http://localhost:8080")]
    pub server: String,

    /// API key used for authenticated commands
    #[arg(short = 'k', long, env = "LK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Logging level (written to stderr)
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an API key for a tenant
    CreateKey {
        /// Tenant the key is bound to
        #[arg(short, long)]
        tenant: String,
    },

    /// Publish a message
    Publish {
        /// Target queue
        #[arg(short, long)]
        queue: String,

        /// Payload given inline
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,

        /// Read the payload from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Claim the next message, waiting for the server's claim window
    Claim {
        /// Queue to claim from
        #[arg(short, long)]
        queue: String,
    },

    /// Acknowledge a claimed message
    Ack {
        /// Queue the message was claimed from
        #[arg(short, long)]
        queue: String,

        /// Id returned by claim
        #[arg(short, long)]
        message_id: String,
    },

    /// Show queue statistics
    Stats {
        /// Queue to inspect
        #[arg(short, long)]
        queue: String,
    },

    /// Revoke one of this tenant's API keys
    RevokeKey {
        /// Key id (the part of the token before the '.')
        #[arg(long)]
        key_id: String,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// Errors
// ============================================================================

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Missing API key: pass --api-key or set LK_API_KEY")]
    MissingApiKey,

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Server { status: 404, .. } => 3,
            Self::Server { .. } => 2,
            Self::Http(_) => 1,
            Self::MissingApiKey | Self::InvalidArgument { .. } => 4,
            Self::Io(_) => 5,
            Self::Serialization(_) => 6,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Parse arguments, run the command and print its output
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli.log_level);

    let output = execute(cli).await?;
    println!("{}", output);
    Ok(())
}

/// Install a stderr subscriber so stdout carries only command output
fn initialize_logging(level: &str) {
    let filter = EnvFilter::try_new(format!("lease_keeper_cli={}", level))
        .unwrap_or_else(|_| EnvFilter::new("lease_keeper_cli=warn"));

    // A subscriber may already be set when embedded; that is not an error here
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Execute a parsed command and render its result
pub async fn execute(cli: Cli) -> Result<String, CliError> {
    let client = BrokerClient::new(cli.server.clone(), cli.api_key.clone())?;
    let format = cli.format;

    match cli.command {
        Commands::CreateKey { tenant } => {
            let created = client.create_key(&tenant).await?;
            info!(tenant = %created.tenant, "Created API key");
            render(format, &created, |c| {
                format!("tenant: {}\napi_key: {}", c.tenant, c.api_key)
            })
        }
        Commands::Publish { queue, data, file } => {
            let payload = read_payload(data, file).await?;
            let published = client.publish(&queue, payload).await?;
            render(format, &published, |p| format!("message_id: {}", p.message_id))
        }
        Commands::Claim { queue } => {
            let claimed = client.claim(&queue).await?;
            render(format, &claimed, |c| {
                format!("message_id: {}\npayload: {}", c.message_id, c.payload)
            })
        }
        Commands::Ack { queue, message_id } => {
            let status = client.ack(&queue, &message_id).await?;
            render(format, &status, |s| s.status.clone())
        }
        Commands::Stats { queue } => {
            let stats = client.stats(&queue).await?;
            render(format, &stats, |s| {
                format!(
                    "pending: {}\nin_flight: {}\ndead_letter: {}",
                    s.pending, s.in_flight, s.dead_letter
                )
            })
        }
        Commands::RevokeKey { key_id } => {
            let status = client.revoke_key(&key_id).await?;
            render(format, &status, |s| s.status.clone())
        }
    }
}

async fn read_payload(data: Option<String>, file: Option<PathBuf>) -> Result<Vec<u8>, CliError> {
    let payload = match (data, file) {
        (Some(data), _) => data.into_bytes(),
        (None, Some(path)) => tokio::fs::read(&path).await?,
        (None, None) => {
            return Err(CliError::InvalidArgument {
                arg: "data".to_string(),
                message: "either --data or --file is required".to_string(),
            })
        }
    };

    if payload.is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "data".to_string(),
            message: "payload must not be empty".to_string(),
        });
    }

    Ok(payload)
}

fn render<T, F>(format: OutputFormat, value: &T, text: F) -> Result<String, CliError>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => Ok(text(value)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
