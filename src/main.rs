//! # Turret Link
//!
//! Runs one node of a two-node laser turret link, or both of them in one
//! process over a simulated radio.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load the configuration
//!    - Set up logging (stdout, plus a daily log file with `--log-dir`)
//!    - Open the radio and wrap it in the configured link strategy
//!
//! 2. **Main Loop**
//!    - `turret`: answer commands, run the auto-scan when triggered
//!    - `controller`: stream gamepad input, show telemetry
//!    - `simulate`: both, with a scripted operator
//!
//! 3. **Graceful Shutdown**
//!    - Ctrl+C ends the loop and prints the link counters
//!
//! # Examples
//!
//! ```bash
//! turret-link --config config/turret-link.toml turret
//! RUST_LOG=debug turret-link controller
//! turret-link simulate
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use turret_link::config::{Config, RadioBackend, RadioConfig};
use turret_link::controller::display::TracingDisplay;
use turret_link::controller::gamepad::GamepadInput;
use turret_link::controller::ControllerNode;
use turret_link::cue::TracingBuzzer;
use turret_link::link;
use turret_link::radio::serial::SerialRadio;
use turret_link::radio::sim::Ether;
use turret_link::radio::RadioPort;
use turret_link::simulation;
use turret_link::telemetry::TelemetryLogger;
use turret_link::turret::actuators::TracingActuators;
use turret_link::turret::TurretNode;

#[derive(Parser, Debug)]
#[command(name = "turret-link", version, about = "Laser turret command and telemetry link")]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Run the turret node
    Turret,
    /// Run the handheld controller node
    Controller,
    /// Run both nodes over a simulated radio with a scripted operator
    Simulate,
}

/// `RUST_LOG` directives when set and valid, otherwise `info`.
fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Set up stdout logging and, if asked, a log file.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    let filter = build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "turret-link.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Open the radio this node talks through.
fn open_radio(config: &RadioConfig) -> Result<Box<dyn RadioPort>> {
    match config.backend {
        RadioBackend::Serial => {
            let radio = SerialRadio::open(config)?;
            info!("Radio modem opened at: {}", radio.device_path());
            Ok(Box::new(radio))
        }
        RadioBackend::Simulated => {
            // A lone simulated radio hears nothing, but lets a node run
            // without hardware
            info!("Using an unconnected simulated radio");
            Ok(Box::new(Ether::new().radio()))
        }
    }
}

fn open_logger(config: &Config) -> Result<Option<TelemetryLogger>> {
    if !config.telemetry.enabled {
        return Ok(None);
    }
    let logger = TelemetryLogger::new(&config.telemetry)
        .context("Failed to create telemetry log directory")?;
    Ok(Some(logger))
}

async fn run_turret(config: &Config) -> Result<()> {
    let radio = open_radio(&config.radio)?;
    let link = link::turret_link(radio, &config.radio, &config.link).await?;
    info!("Turret 0x{:02X} on {:?} link", config.node.device_id, config.link.strategy);

    TurretNode::new(config, link, TracingActuators::new())
        .run()
        .await?;
    Ok(())
}

async fn run_controller(config: &Config) -> Result<()> {
    let radio = open_radio(&config.radio)?;
    let link = link::controller_link(radio, &config.radio, &config.link).await?;
    let gamepad = GamepadInput::open(&config.controller)?;
    info!("Gamepad opened at: {}", gamepad.device_path());
    info!(
        "Controller 0x{:02X} on {:?} link",
        config.node.device_id, config.link.strategy
    );

    ControllerNode::new(
        config,
        link,
        gamepad,
        TracingDisplay::new(),
        TracingBuzzer::new("controller"),
        open_logger(config)?,
    )
    .run()
    .await?;
    Ok(())
}

async fn run_simulation(config: &Config) -> Result<()> {
    let report = simulation::run(config, open_logger(config)?).await?;
    info!(
        "Simulation ended: turret {} at ({}, {}), laser {}, controller {:?}, {} frames lost",
        report.turret.mode.name(),
        report.turret.angle_h,
        report.turret.angle_v,
        if report.turret.laser_on { "on" } else { "off" },
        report.controller_state,
        report.frames_lost
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_dir.as_ref());

    info!("Turret Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Turret => run_turret(&config).await,
        Command::Controller => run_controller(&config).await,
        Command::Simulate => run_simulation(&config).await,
    }
}
