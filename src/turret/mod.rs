//! # Turret Module
//!
//! The turret node: two-axis servo gimbal, laser and buzzer.
//!
//! This module handles:
//! - Interpreting inbound commands (laser, joystick nudge, auto trigger)
//! - Mapping angles to calibrated servo positions
//! - Running the auto-scan sequence while keeping telemetry flowing
//! - Reporting state back to the controller after every change

pub mod actuators;
pub mod interpreter;
pub mod motion;
pub mod reporter;
pub mod sequencer;

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::{Config, ScanConfig};
use crate::cue::{self, Cue};
use crate::error::Result;
use crate::link::TurretLink;
use crate::protocol::packet::{CommandPacket, Mode, TelemetryPacket};
use actuators::Actuators;
use interpreter::{CommandInterpreter, Outcome};
use motion::MotionController;
use reporter::TelemetryReporter;
use sequencer::AutoScanSequencer;

/// Everything the turret remembers between commands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurretState {
    /// Accumulated manual horizontal angle
    pub manual_h: f32,
    /// Accumulated manual vertical angle
    pub manual_v: f32,
    /// Angle pair last commanded and reported
    pub angle_h: i32,
    pub angle_v: i32,
    pub mode: Mode,
    pub laser_on: bool,
}

impl Default for TurretState {
    fn default() -> Self {
        Self {
            manual_h: 0.0,
            manual_v: 0.0,
            angle_h: 0,
            angle_v: 0,
            mode: Mode::Manual,
            laser_on: false,
        }
    }
}

impl TurretState {
    /// Telemetry describing this state.
    #[must_use]
    pub fn telemetry(&self, device_id: u8) -> TelemetryPacket {
        TelemetryPacket::new(device_id, self.angle_h, self.angle_v, self.mode, self.laser_on)
    }

    /// Set the reported position and mode.
    pub fn point(&mut self, angle_h: i32, angle_v: i32, mode: Mode) {
        self.angle_h = angle_h;
        self.angle_v = angle_v;
        self.mode = mode;
    }
}

/// The turret's main loop and everything it owns
pub struct TurretNode<A: Actuators> {
    link: TurretLink,
    actuators: A,
    motion: MotionController,
    interpreter: CommandInterpreter,
    reporter: TelemetryReporter,
    state: TurretState,
    scan: ScanConfig,
    poll_interval: Duration,
    commands_handled: u64,
    commands_drained: u64,
}

impl<A: Actuators> TurretNode<A> {
    #[must_use]
    pub fn new(config: &Config, link: TurretLink, actuators: A) -> Self {
        Self {
            link,
            actuators,
            motion: MotionController::from_config(&config.turret),
            interpreter: CommandInterpreter::new(config.node.device_id, &config.turret),
            reporter: TelemetryReporter::new(config.node.device_id),
            state: TurretState::default(),
            scan: config.scan.clone(),
            poll_interval: Duration::from_millis(config.turret.poll_interval_ms),
            commands_handled: 0,
            commands_drained: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &TurretState {
        &self.state
    }

    /// Telemetry most recently handed to the link.
    #[must_use]
    pub fn last_report(&self) -> TelemetryPacket {
        self.reporter.last()
    }

    /// Centre the gimbal, publish the initial telemetry and beep.
    pub async fn start(&mut self) {
        self.motion.set_angle(&mut self.actuators, 0, 0);
        self.actuators.set_laser(false);
        self.reporter.report(self.link.as_mut(), &self.state).await;
        cue::play(&mut self.actuators, Cue::TurretStartup).await;
        info!("Turret ready");
    }

    /// Wait up to one poll interval for a command and handle it.
    ///
    /// Returns true if a command arrived. A trigger runs the whole scan
    /// before this returns.
    pub async fn poll_once(&mut self) -> bool {
        match self.link.try_receive(self.poll_interval).await {
            Some(command) => {
                self.handle(&command).await;
                true
            }
            None => false,
        }
    }

    async fn handle(&mut self, command: &CommandPacket) {
        self.commands_handled += 1;
        let outcome =
            self.interpreter
                .apply(command, &mut self.state, &self.motion, &mut self.actuators);

        match outcome {
            Outcome::Manual => {
                self.reporter.report(self.link.as_mut(), &self.state).await;
            }
            Outcome::StartAuto => self.run_auto().await,
            Outcome::Ignored => {}
        }
    }

    /// Run the auto-scan sequence to completion.
    pub async fn run_auto(&mut self) {
        info!("Auto-scan started");
        let started = Instant::now();
        let mut sequencer = AutoScanSequencer::new(self.scan.clone());
        let mut mode = self.state.mode;

        while let Some(step) = sequencer.next_step(&mut self.state) {
            self.motion.set_angle(&mut self.actuators, step.angle_h, step.angle_v);
            self.actuators.set_laser(step.laser_on);
            if let Some(cue) = step.cue {
                cue::play(&mut self.actuators, cue).await;
            }
            self.reporter.report(self.link.as_mut(), &self.state).await;

            if self.state.mode != mode {
                mode = self.state.mode;
                info!("Scan phase: {}", mode.name());
            }
            trace!("Scan step ({}, {}), hold {:?}", step.angle_h, step.angle_v, step.dwell);

            self.hold(step.dwell).await;
        }

        info!("Auto-scan complete in {:.1}s", started.elapsed().as_secs_f32());
    }

    /// Wait `duration`, answering every command that arrives meanwhile with
    /// the current telemetry. The commands themselves are discarded.
    async fn hold(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let window = (deadline - now).min(self.poll_interval);
            if let Some(command) = self.link.try_receive(window).await {
                self.commands_drained += 1;
                trace!("Drained command during scan: {:?}", command.action);
                self.reporter.repeat(self.link.as_mut()).await;
            }
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Reserved for fatal runtime faults; radio errors inside the loop are
    /// absorbed by the link.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = self.poll_once() => {}

                _ = &mut shutdown => {
                    info!("Turret shutting down");
                    break;
                }
            }
        }

        debug!(
            "Commands handled: {}, drained during scans: {}, telemetry sent: {}, failed: {}",
            self.commands_handled,
            self.commands_drained,
            self.reporter.sent(),
            self.reporter.failed()
        );
        debug!("Last report: {:?}", self.reporter.last());
        Ok(())
    }

    /// Run until Ctrl+C.
    ///
    /// # Errors
    ///
    /// See [`TurretNode::run_until`].
    pub async fn run(mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C");
        })
        .await
    }
}
