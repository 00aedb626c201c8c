//! # Link Budget Monitor
//!
//! Watches transmitter telemetry arriving on a serial port and reports the RF
//! link budget against a fixed receiver location.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use link_budget_monitor::config::{Config, ConfigReloader, LoggingConfig, OutputFormat, SerialConfig};
use link_budget_monitor::dashboard::{Dashboard, DashboardSnapshot, OperatorControls};
use link_budget_monitor::serial::{self, reader, SerialLink, DEFAULT_DEVICE_PATHS};

/// Real-time link budget analysis from serial telemetry
#[derive(Debug, Parser)]
#[command(name = "link-budget-monitor", version, about)]
struct Cli {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Serial port, overriding the configuration ("auto" to probe)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overriding the configuration
    #[arg(short, long)]
    baud: Option<u32>,

    /// Output format, overriding the configuration
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

/// Main entry point for Link Budget Monitor
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and apply command-line overrides
///    - Set up logging with tracing subscriber
///    - Connect the serial link (reader task starts)
///
/// 2. **Main Loop** (every `refresh_interval_ms`)
///    - Apply configuration file edits (receiver location, link parameters)
///    - Drain the ingestion channel into the history buffer
///    - Reconnect if the reader died and auto-reconnect is enabled
///    - Print a dashboard snapshot
///
/// 3. **Graceful Shutdown** on Ctrl+C
///    - Close the serial link and join the reader
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_ports {
        return print_ports();
    }

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    apply_overrides(&mut config, &cli);
    config.validate().context("Invalid command-line override")?;

    let _log_guard = init_logging(&config.logging);
    info!("Link Budget Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let (tx, rx) = reader::ingest_channel();
    let mut link = SerialLink::new(tx, config.serial.reader_settings());

    let receiver = config.initial_receiver(None);
    info!(
        "Receiver at {:.6}, {:.6} ({})",
        receiver.latitude, receiver.longitude, receiver.label
    );
    let (mut dashboard, controls) = Dashboard::new(
        rx,
        Some(receiver),
        config.link,
        config.dashboard.settings(),
    );

    connect(&mut link, &config.serial).await;

    let mut reloader = ConfigReloader::new(&cli.config);
    let format = config.dashboard.format;
    let reconnect_every = Duration::from_millis(config.serial.reconnect_interval_ms);
    let mut last_connect_attempt = Instant::now();

    let mut refresh = interval(Duration::from_millis(config.dashboard.refresh_interval_ms));
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                if let Some(reloaded) = reloader.poll() {
                    apply_reload(&controls, reloaded);
                }

                let drained = dashboard.drain();
                debug!("Drained {} items", drained);

                if !link.is_connected()
                    && config.serial.auto_reconnect
                    && last_connect_attempt.elapsed() >= reconnect_every
                {
                    last_connect_attempt = Instant::now();
                    connect(&mut link, &config.serial).await;
                }

                let port = if link.is_connected() { link.port_name() } else { None };
                let snapshot = dashboard
                    .snapshot(config.dashboard.history_rows)
                    .with_connection(port);
                present(&snapshot, format)?;
            }

            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    link.disconnect().await;
    dashboard.drain();
    let stats = dashboard.stats();
    info!(
        "Total samples accepted: {}, rejected: {}",
        stats.accepted, stats.rejected
    );

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(port) = &cli.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(format) = cli.format {
        config.dashboard.format = format;
    }
}

/// Console logging, plus a daily-rotated file when `file_dir` is set.
///
/// The returned guard must live until exit so buffered file output is flushed.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let console = fmt::layer().with_writer(std::io::stderr);

    match &logging.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "link-budget-monitor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}

/// Connect using the configured port, probing default paths for "auto".
async fn connect(link: &mut SerialLink, serial: &SerialConfig) {
    let result = if serial.is_auto_port() {
        link.connect_first(DEFAULT_DEVICE_PATHS, serial.baud_rate)
            .await
            .map(|_| ())
    } else {
        link.connect(&serial.port, serial.baud_rate).await
    };

    if let Err(e) = result {
        warn!("Connection failed: {}", e);
    }
}

fn apply_reload(controls: &OperatorControls, reloaded: link_budget_monitor::error::Result<Config>) {
    match reloaded {
        Ok(config) => {
            if let Some(receiver) = config.receiver {
                if controls.receiver().as_ref() != Some(&receiver) {
                    controls.set_receiver(receiver);
                }
            }
            if let Err(e) = controls.set_parameters(config.link) {
                warn!("Ignoring link parameters from reloaded configuration: {}", e);
            }
            info!("Configuration reloaded");
        }
        Err(e) => warn!("Ignoring invalid configuration edit: {}", e),
    }
}

fn present(snapshot: &DashboardSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", snapshot.render_text()),
        OutputFormat::Json => println!("{}", snapshot.to_json_line()?),
    }
    Ok(())
}

fn print_ports() -> Result<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for (name, description) in ports {
            println!("  {} - {}", name, description);
        }
    }
    Ok(())
}
