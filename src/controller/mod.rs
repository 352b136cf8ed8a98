//! # Controller Module
//!
//! The handheld controller node.
//!
//! This module handles:
//! - Reading the joystick and button (evdev gamepad or a scripted operator)
//! - Turning short presses into laser toggles and long presses into the
//!   auto-scan trigger
//! - Streaming commands and collecting the turret's telemetry
//! - Showing the manual or auto view and playing the operator cues
//! - Logging received telemetry to disk

pub mod display;
pub mod gamepad;
pub mod input;
pub mod scripted;

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::cue::{self, Buzzer, Cue};
use crate::error::Result;
use crate::link::ControllerLink;
use crate::protocol::packet::{Action, CommandPacket, Mode, TelemetryPacket, JOYSTICK_CENTER};
use crate::telemetry::TelemetryLogger;
use display::{mode_label, Display, ManualView};
use input::{InputEvent, InputSource, InputState, InputStateMachine};

/// How long the splash stays up before the controller starts talking
pub const SPLASH_HOLD: Duration = Duration::from_millis(1000);

/// How long the "AUTO START!" banner stays up
pub const AUTO_BANNER_HOLD: Duration = Duration::from_millis(1500);

/// Pause between the ready report and the completion cue
pub const FINISH_DELAY: Duration = Duration::from_millis(500);

/// The controller's main loop and everything it owns
pub struct ControllerNode<I: InputSource, D: Display, B: Buzzer> {
    link: ControllerLink,
    input: I,
    display: D,
    buzzer: B,
    logger: Option<TelemetryLogger>,
    machine: InputStateMachine,
    device_id: u8,
    telemetry: TelemetryPacket,
    reply_timeout: Duration,
    loop_interval: Duration,
    poll_gap: Duration,
    display_refresh: Duration,
    last_refresh: Option<Instant>,
    last_mode: Option<Mode>,
    commands_sent: u64,
    commands_acked: u64,
    telemetry_received: u64,
}

impl<I: InputSource, D: Display, B: Buzzer> ControllerNode<I, D, B> {
    #[must_use]
    pub fn new(
        config: &Config,
        link: ControllerLink,
        input: I,
        display: D,
        buzzer: B,
        logger: Option<TelemetryLogger>,
    ) -> Self {
        let controller = &config.controller;
        Self {
            link,
            input,
            display,
            buzzer,
            logger,
            machine: InputStateMachine::new(Duration::from_millis(controller.long_press_ms)),
            device_id: config.node.device_id,
            telemetry: TelemetryPacket::blank(),
            reply_timeout: Duration::from_millis(config.link.reply_timeout_ms),
            loop_interval: Duration::from_millis(controller.loop_interval_ms),
            poll_gap: Duration::from_millis(controller.auto_poll_gap_ms),
            display_refresh: Duration::from_millis(controller.display_refresh_ms),
            last_refresh: None,
            last_mode: None,
            commands_sent: 0,
            commands_acked: 0,
            telemetry_received: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> InputState {
        self.machine.state()
    }

    /// Latest telemetry from the turret, blank until the first reply.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryPacket {
        &self.telemetry
    }

    /// Show the splash, then beep.
    ///
    /// # Errors
    ///
    /// Returns error if the display cannot be initialised.
    pub async fn start(&mut self) -> Result<()> {
        self.display.splash()?;
        sleep(SPLASH_HOLD).await;
        cue::play(&mut self.buzzer, Cue::ControllerStartup).await;
        info!("Controller ready");
        Ok(())
    }

    /// Run one loop iteration of the current state.
    ///
    /// # Errors
    ///
    /// Returns error if the input source fails.
    pub async fn step(&mut self) -> Result<()> {
        match self.machine.state() {
            InputState::AutoDisplay => self.auto_step().await,
            InputState::IdleManual | InputState::ArmedLongPress { .. } => self.manual_step().await,
        }
    }

    async fn manual_step(&mut self) -> Result<()> {
        let sample = self.input.sample().await?;

        match self.machine.on_button(sample.button, Instant::now()) {
            Some(InputEvent::AutoTriggered) => {
                self.trigger_auto().await;
                return Ok(());
            }
            Some(InputEvent::LaserToggled(on)) => {
                info!("Laser {}", if on { "on" } else { "off" });
                cue::play(&mut self.buzzer, Cue::LaserToggle).await;
            }
            _ => {}
        }

        let command = CommandPacket::new(
            self.device_id,
            sample.joy_x,
            sample.joy_y,
            self.machine.manual_action(),
        );
        self.exchange(&command).await;

        self.display.show_manual(&ManualView {
            laser_on: self.machine.laser_on(),
            joy_x: sample.joy_x,
            joy_y: sample.joy_y,
            telemetry: self.telemetry,
        });

        sleep(self.loop_interval).await;
        Ok(())
    }

    /// Send the trigger exactly once and announce it.
    ///
    /// An unacknowledged trigger never reached the turret, so the controller
    /// falls back to manual and waits for the next long press.
    async fn trigger_auto(&mut self) {
        info!("Long press: starting auto-scan");
        let trigger = CommandPacket::new(
            self.device_id,
            JOYSTICK_CENTER,
            JOYSTICK_CENTER,
            Action::TriggerAuto,
        );
        let acked = self.send_command(&trigger).await;
        self.receive_reply().await;

        if !acked {
            warn!("Auto-scan trigger not acknowledged, back to manual");
            self.machine.cancel_auto();
            return;
        }

        cue::play(&mut self.buzzer, Cue::AutoStart).await;
        self.display.banner("AUTO START!");
        self.last_refresh = None;
        self.last_mode = None;
        sleep(AUTO_BANNER_HOLD).await;
    }

    async fn auto_step(&mut self) -> Result<()> {
        // Still sampled, so that a release during the scan is seen
        let sample = self.input.sample().await?;
        self.machine.on_button(sample.button, Instant::now());

        let keep_alive = CommandPacket::keep_alive(self.device_id);
        let first = self.exchange(&keep_alive).await;
        sleep(self.poll_gap).await;
        let second = self.exchange(&keep_alive).await;

        let now = Instant::now();
        let refresh_due = self
            .last_refresh
            .map_or(true, |at| now.duration_since(at) >= self.display_refresh);
        if refresh_due {
            self.display.show_auto(&self.telemetry);
            self.last_refresh = Some(now);
        }

        for telemetry in [first, second].into_iter().flatten() {
            if self.last_mode != Some(telemetry.mode) {
                self.last_mode = Some(telemetry.mode);
                info!("Turret phase: {}", mode_label(telemetry.mode));
            }

            if self.machine.observe(&telemetry) == Some(InputEvent::AutoFinished) {
                self.finish_auto(&telemetry).await;
                break;
            }
        }
        Ok(())
    }

    async fn finish_auto(&mut self, ready: &TelemetryPacket) {
        info!("Auto-scan finished, turret ready");
        self.display.show_auto(ready);
        sleep(FINISH_DELAY).await;
        cue::play(&mut self.buzzer, Cue::AutoFinished).await;
    }

    /// Send `command` and collect the reply, if any.
    ///
    /// Returns the telemetry if a fresh packet arrived.
    async fn exchange(&mut self, command: &CommandPacket) -> Option<TelemetryPacket> {
        self.send_command(command).await;
        self.receive_reply().await
    }

    async fn send_command(&mut self, command: &CommandPacket) -> bool {
        self.commands_sent += 1;
        let acked = self.link.send(command).await;
        if acked {
            self.commands_acked += 1;
        } else {
            trace!("Command not acknowledged: {:?}", command.action);
        }
        acked
    }

    async fn receive_reply(&mut self) -> Option<TelemetryPacket> {
        let telemetry = self.link.try_receive(self.reply_timeout).await?;
        if telemetry.device_id != self.device_id {
            debug!("Ignoring telemetry from device 0x{:02X}", telemetry.device_id);
            return None;
        }

        self.telemetry_received += 1;
        self.telemetry = telemetry;
        trace!("Telemetry: {:?}", telemetry);

        if let Some(logger) = self.logger.as_mut() {
            if let Err(e) = logger.log(&telemetry) {
                warn!("Failed to log telemetry: {}", e);
            }
        }
        Some(telemetry)
    }

    /// Run until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns error if the display cannot be initialised or the input
    /// source fails.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.step() => result?,

                _ = &mut shutdown => {
                    info!("Controller shutting down");
                    break;
                }
            }
        }

        if let Some(logger) = self.logger.as_mut() {
            logger.flush()?;
        }

        debug!(
            "Commands sent: {}, acknowledged: {}, telemetry received: {}",
            self.commands_sent, self.commands_acked, self.telemetry_received
        );
        Ok(())
    }

    /// Run until Ctrl+C.
    ///
    /// # Errors
    ///
    /// See [`ControllerNode::run_until`].
    pub async fn run(mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C");
        })
        .await
    }
}
