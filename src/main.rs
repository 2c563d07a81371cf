//! Dongle Link Monitor - Entry Point
//!
//! Loads the configuration, then runs the blocking connection monitor on a
//! worker thread until Ctrl+C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dongle_link_monitor::{
    core::config::Config,
    hid::{HidTransport, HidapiTransport, StopHandle},
    CommandAction, ConnectionMonitor,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "dongle-link-monitor",
    about = "Runs an action when a wireless keyboard links to or unlinks from its dongle"
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the HID interfaces of the configured dongle
    ListDevices,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(Commands::ListDevices) = cli.command {
        return list_devices(&config);
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(run(config))
}

/// Run the monitor on a blocking thread and stop it on Ctrl+C
async fn run(config: Config) -> Result<()> {
    let stop = StopHandle::new();
    let monitor_stop = stop.clone();

    let mut monitor_task = tokio::task::spawn_blocking(move || -> Result<()> {
        let transport = HidapiTransport::new().context("Failed to initialize HID API")?;
        let action = CommandAction::new(&config.action);
        let mut monitor = ConnectionMonitor::new(transport, action, config.device, config.timing)
            .with_stop_handle(monitor_stop);
        monitor.run();
        Ok(())
    });

    tokio::select! {
        result = &mut monitor_task => {
            return result.context("Monitor thread panicked")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping...");
            stop.stop();
        }
    }

    monitor_task.await.context("Monitor thread panicked")?
}

/// Print every interface of the configured dongle with its role
fn list_devices(config: &Config) -> Result<()> {
    let mut transport = HidapiTransport::new().context("Failed to initialize HID API")?;
    let identity = config.device.identity();
    let interfaces = transport
        .enumerate(identity)
        .context("Failed to enumerate HID devices")?;

    if interfaces.is_empty() {
        println!(
            "No interfaces found for {:04X}:{:04X}",
            identity.vendor_id, identity.product_id
        );
        return Ok(());
    }

    for iface in interfaces {
        let role = if iface.usage_page == config.device.command_usage_page {
            "command"
        } else if iface.usage_page == config.device.event_usage_page {
            "event"
        } else {
            "-"
        };
        println!(
            "{:<8} page=0x{:04X} usage=0x{:04X} interface={} product={} path={}",
            role,
            iface.usage_page,
            iface.usage,
            iface.interface_number,
            iface.product.as_deref().unwrap_or("?"),
            iface.display_path()
        );
    }
    Ok(())
}
