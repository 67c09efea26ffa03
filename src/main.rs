//! CLI Entry Point for the telemetry gateway
//!
//! # Usage
//!
//! Use the configured serial port:
//! ```bash
//! telemetry_gateway
//! ```
//!
//! Override the serial port:
//! ```bash
//! telemetry_gateway /dev/ttyUSB0
//! ```
//!
//! Other settings come from `config/gateway.toml` and `GATEWAY_*` environment
//! variables, e.g. `GATEWAY_DELIVERY__HOST=10.0.0.7`.

use anyhow::{Context, Result};
use clap::Parser;
use telemetry_gateway::config::GatewayConfig;
use telemetry_gateway::{gateway, logging};
use tracing::error;

#[derive(Parser)]
#[command(name = "telemetry_gateway")]
#[command(about = "Serial-to-HTTP telemetry gateway", long_about = None)]
struct Cli {
    /// Serial port path, overriding the configured one
    port: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GatewayConfig::load().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.serial.port = port;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    logging::init_from_config(&config).map_err(|e| anyhow::anyhow!(e))?;

    let mut scheduler = gateway::build(&config).map_err(|e| {
        error!(error = %e, "initialisation failed");
        e
    })?;

    scheduler.run().map_err(|e| {
        error!(error = %e, "gateway stopped");
        anyhow::Error::from(e)
    })
}
