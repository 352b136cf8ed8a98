//! # Command Interpreter
//!
//! Applies one received [`CommandPacket`] to the turret state.
//!
//! Processing order:
//! 1. `LaserOn` / `LaserOff` switch the laser, then the joystick is applied
//! 2. `TriggerAuto` starts the scan; the joystick fields are not used
//! 3. Joystick dead-zone nudge: at most one degree per axis per command
//!
//! Joystick values strictly between the dead-zone thresholds leave the
//! angle untouched, so re-sending a centred command is idempotent.

use tracing::{debug, trace};

use crate::config::TurretConfig;
use crate::protocol::packet::{Action, CommandPacket, Mode, ANGLE_LIMIT};
use crate::turret::actuators::Actuators;
use crate::turret::motion::MotionController;
use crate::turret::TurretState;

/// What the node must do after a command was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State updated in manual mode; report it
    Manual,
    /// Run the auto-scan sequence
    StartAuto,
    /// Command was not addressed to this turret
    Ignored,
}

/// Dead-zone thresholds and identity used to interpret commands
#[derive(Debug, Clone, Copy)]
pub struct CommandInterpreter {
    device_id: u8,
    dead_zone_low: u8,
    dead_zone_high: u8,
}

/// One-degree step for a joystick reading.
fn nudge(value: u8, low: u8, high: u8) -> f32 {
    if value > high {
        1.0
    } else if value < low {
        -1.0
    } else {
        0.0
    }
}

impl CommandInterpreter {
    #[must_use]
    pub fn new(device_id: u8, config: &TurretConfig) -> Self {
        Self {
            device_id,
            dead_zone_low: config.dead_zone_low,
            dead_zone_high: config.dead_zone_high,
        }
    }

    /// Apply `command` to `state` and drive the outputs accordingly.
    ///
    /// The horizontal axis is mirrored: pushing the stick right (high
    /// `joy_x`) turns the turret towards negative angles.
    pub fn apply<A: Actuators + ?Sized>(
        &self,
        command: &CommandPacket,
        state: &mut TurretState,
        motion: &MotionController,
        actuators: &mut A,
    ) -> Outcome {
        if command.device_id != self.device_id {
            debug!(
                "Ignoring command for device 0x{:02X} (we are 0x{:02X})",
                command.device_id, self.device_id
            );
            return Outcome::Ignored;
        }

        match command.action {
            Action::LaserOn | Action::LaserOff => {
                let on = command.action == Action::LaserOn;
                state.laser_on = on;
                actuators.set_laser(on);
            }
            Action::TriggerAuto => return Outcome::StartAuto,
            Action::None => {}
        }

        let limit = f32::from(ANGLE_LIMIT);
        state.manual_h = (state.manual_h
            - nudge(command.joy_x, self.dead_zone_low, self.dead_zone_high))
        .clamp(-limit, limit);
        state.manual_v = (state.manual_v
            + nudge(command.joy_y, self.dead_zone_low, self.dead_zone_high))
        .clamp(-limit, limit);

        // Telemetry carries the truncated degree
        state.angle_h = state.manual_h as i32;
        state.angle_v = state.manual_v as i32;
        state.mode = Mode::Manual;
        motion.set_angle(actuators, state.angle_h, state.angle_v);

        trace!(
            "Manual: joy=({}, {}) -> angle=({}, {})",
            command.joy_x,
            command.joy_y,
            state.angle_h,
            state.angle_v
        );
        Outcome::Manual
    }
}
