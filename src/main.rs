use anyhow::{Context, Result};
use clap::Parser;
use gcslink_client::udp::UdpTransport;
use gcslink_client::{OutboundTransport, OutputList};
use gcslink_core::config::{AppConfig, LogFormat};
use gcslink_core::types::Direction;
use gcslink_discovery::{HostLoop, MdnsBackend, Pipeline, SelectTable};
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// gcslink - automatic discovery of MAVLink ground control stations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/gcslink.yaml")]
    config: PathBuf,

    /// Override the DNS-SD registration type to browse for
    #[arg(long)]
    reg_type: Option<String>,

    /// Override the log level
    #[arg(long, env = "GCSLINK_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::from_config_builder(&args.config)
        .with_context(|| format!("Failed to load config: {:?}", args.config))?;

    if let Some(reg_type) = &args.reg_type {
        config.discovery.reg_type = reg_type.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.logging.filter_directives())
        .context("Invalid log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.logging.file_line)
        .with_line_number(config.logging.file_line);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config)?;

    info!("Configuration loaded from {:?}", args.config);

    let transport = UdpTransport::default();
    let outputs = OutputList::new();

    for endpoint in &config.outputs.static_outputs {
        match transport.open_outbound(endpoint, config.discovery.baud, Direction::Output) {
            Ok(stream) => {
                info!(endpoint = %endpoint, "Opened static output");
                outputs.push(stream);
            }
            Err(e) => warn!(endpoint = %endpoint, error = %e, "Failed to open static output"),
        }
    }

    if !config.discovery.enabled {
        info!("GCS discovery disabled; waiting for shutdown");
        shutdown_signal().await;
        return Ok(());
    }

    let backend = MdnsBackend::new().context("Failed to start mDNS daemon")?;
    let table = SelectTable::new();
    let pipeline = Pipeline::new(
        config.discovery.clone(),
        backend,
        table.clone(),
        transport,
        outputs.clone(),
    );

    info!(reg_type = %config.discovery.reg_type, "GCS discovery module loaded");

    let mut host = HostLoop::new(table, pipeline);
    let result = host.run(shutdown_signal()).await;

    if let Err(e) = host.pipeline().backend().shutdown() {
        warn!(error = %e, "mDNS daemon did not shut down cleanly");
    }

    match result {
        Ok(stats) => {
            info!(
                connections = stats.connections,
                duplicates = stats.duplicates,
                swallowed_errors = stats.swallowed_errors(),
                outputs = outputs.len(),
                "Shutdown complete"
            );
            Ok(())
        }
        Err(e) => {
            error!("Discovery error: {}", e);
            Err(e.into())
        }
    }
}
