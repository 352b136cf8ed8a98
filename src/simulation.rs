//! # Simulation
//!
//! Runs a turret and a controller in one process, connected through a
//! simulated ether, with the `[simulation] script` playing the operator.
//!
//! Both nodes run as their own tokio task, exactly as they would on two
//! separate hosts; only the radios and the peripherals are simulated.

use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::Config;
use crate::controller::display::TracingDisplay;
use crate::controller::input::InputState;
use crate::controller::scripted::ScriptedInput;
use crate::controller::ControllerNode;
use crate::cue::TracingBuzzer;
use crate::error::{Result, TurretLinkError};
use crate::link;
use crate::protocol::packet::TelemetryPacket;
use crate::radio::sim::Ether;
use crate::telemetry::TelemetryLogger;
use crate::turret::actuators::TracingActuators;
use crate::turret::{TurretNode, TurretState};

/// Where both nodes ended up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationReport {
    pub turret: TurretState,
    pub controller_state: InputState,
    /// Latest telemetry the controller received
    pub controller_telemetry: TelemetryPacket,
    /// Frames that found no listener or were dropped on purpose
    pub frames_lost: u64,
}

/// Resolves once `stop` flips to true or its sender goes away.
async fn stopped(mut stop: watch::Receiver<bool>) {
    if stop.wait_for(|stop| *stop).await.is_err() {
        debug!("Simulation stop signal dropped");
    }
}

/// Run both nodes until `shutdown` resolves or the controller fails.
///
/// # Errors
///
/// Returns error if a link cannot be set up or either node fails.
pub async fn run_until<F>(
    config: &Config,
    logger: Option<TelemetryLogger>,
    shutdown: F,
) -> Result<SimulationReport>
where
    F: Future<Output = ()>,
{
    let ether = Ether::new();
    let turret_link = link::turret_link(Box::new(ether.radio()), &config.radio, &config.link).await?;
    let controller_link =
        link::controller_link(Box::new(ether.radio()), &config.radio, &config.link).await?;

    let mut turret = TurretNode::new(config, turret_link, TracingActuators::new());
    let mut controller = ControllerNode::new(
        config,
        controller_link,
        ScriptedInput::new(config.simulation.script.clone()),
        TracingDisplay::new(),
        TracingBuzzer::new("controller"),
        logger,
    );

    info!(
        "Simulating {:?} link with {} script segments",
        config.link.strategy,
        config.simulation.script.len()
    );

    let (stop_tx, stop_rx) = watch::channel(false);

    let turret_stop = stop_rx.clone();
    let turret_task = tokio::spawn(async move {
        turret.run_until(stopped(turret_stop)).await?;
        Ok::<_, TurretLinkError>(turret)
    });

    let mut controller_task = tokio::spawn(async move {
        controller.run_until(stopped(stop_rx)).await?;
        Ok::<_, TurretLinkError>(controller)
    });

    tokio::pin!(shutdown);
    let finished = tokio::select! {
        joined = &mut controller_task => Some(joined),
        _ = &mut shutdown => None,
    };

    // Stop whichever node is still running
    let _ = stop_tx.send(true);
    let controller = match finished {
        Some(joined) => joined,
        None => controller_task.await,
    };
    let turret = turret_task.await??;
    let controller = controller??;

    Ok(SimulationReport {
        turret: *turret.state(),
        controller_state: controller.state(),
        controller_telemetry: *controller.telemetry(),
        frames_lost: ether.frames_lost(),
    })
}

/// Run both nodes until Ctrl+C.
///
/// # Errors
///
/// See [`run_until`].
pub async fn run(config: &Config, logger: Option<TelemetryLogger>) -> Result<SimulationReport> {
    run_until(config, logger, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
    })
    .await
}
