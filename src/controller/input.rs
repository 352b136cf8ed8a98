//! # Controller Input State Machine
//!
//! Turns button samples into laser toggles and the auto-scan trigger.
//!
//! ```text
//!              press                 held ≥ long_press
//! IdleManual ────────▶ ArmedLongPress ─────────────────▶ AutoDisplay
//!     ▲                    │ release (short)                  │
//!     └──── toggle laser ◀─┘                                  │
//!     └──────────────────── telemetry reports Idle ◀──────────┘
//! ```
//!
//! A long press emits the trigger exactly once and never toggles the laser.
//! A button still held when auto display ends must be released before it
//! can start a new press.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::Result;
use crate::protocol::packet::{Action, TelemetryPacket, JOYSTICK_CENTER};

/// One reading of the operator's controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSample {
    pub joy_x: u8,
    pub joy_y: u8,
    pub button: bool,
}

impl Default for InputSample {
    fn default() -> Self {
        Self {
            joy_x: JOYSTICK_CENTER,
            joy_y: JOYSTICK_CENTER,
            button: false,
        }
    }
}

/// Source of operator input samples
#[async_trait]
pub trait InputSource: Send {
    /// Current joystick position and button level.
    async fn sample(&mut self) -> Result<InputSample>;
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// Streaming joystick and laser intent
    IdleManual,
    /// Button down, waiting to see how long it is held
    ArmedLongPress { pressed_at: Instant },
    /// Auto-scan running; only observing telemetry
    AutoDisplay,
}

/// Something the node should react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Short press; carries the new laser intent
    LaserToggled(bool),
    /// Long press; send the trigger once
    AutoTriggered,
    /// Turret reported ready after the scan
    AutoFinished,
}

/// Button and telemetry driven state machine of the controller
#[derive(Debug, Clone)]
pub struct InputStateMachine {
    state: InputState,
    laser_on: bool,
    button_held: bool,
    long_press: Duration,
}

impl InputStateMachine {
    #[must_use]
    pub fn new(long_press: Duration) -> Self {
        Self {
            state: InputState::IdleManual,
            laser_on: false,
            button_held: false,
            long_press,
        }
    }

    #[must_use]
    pub fn state(&self) -> InputState {
        self.state
    }

    #[must_use]
    pub fn laser_on(&self) -> bool {
        self.laser_on
    }

    /// Action field of every manual command.
    #[must_use]
    pub fn manual_action(&self) -> Action {
        if self.laser_on {
            Action::LaserOn
        } else {
            Action::LaserOff
        }
    }

    /// Feed one button sample taken at `now`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tokio::time::Instant;
    /// use turret_link::controller::input::{InputEvent, InputStateMachine};
    ///
    /// let mut machine = InputStateMachine::new(Duration::from_secs(2));
    /// let t0 = Instant::now();
    ///
    /// assert_eq!(machine.on_button(true, t0), None);
    /// assert_eq!(
    ///     machine.on_button(false, t0 + Duration::from_millis(300)),
    ///     Some(InputEvent::LaserToggled(true))
    /// );
    /// ```
    pub fn on_button(&mut self, pressed: bool, now: Instant) -> Option<InputEvent> {
        let press_edge = pressed && !self.button_held;
        self.button_held = pressed;

        match self.state {
            InputState::IdleManual => {
                if press_edge {
                    self.state = InputState::ArmedLongPress { pressed_at: now };
                }
                None
            }
            InputState::ArmedLongPress { pressed_at } => {
                let held = now.saturating_duration_since(pressed_at);
                if pressed {
                    if held >= self.long_press {
                        self.state = InputState::AutoDisplay;
                        return Some(InputEvent::AutoTriggered);
                    }
                    None
                } else {
                    self.state = InputState::IdleManual;
                    if held < self.long_press {
                        self.laser_on = !self.laser_on;
                        return Some(InputEvent::LaserToggled(self.laser_on));
                    }
                    None
                }
            }
            InputState::AutoDisplay => None,
        }
    }

    /// Leave auto display without a ready report.
    ///
    /// Used when the trigger never reached the turret. The button must still
    /// be released before it starts a new press.
    pub fn cancel_auto(&mut self) {
        if self.state == InputState::AutoDisplay {
            self.state = InputState::IdleManual;
        }
    }

    /// Feed a freshly received telemetry packet.
    pub fn observe(&mut self, telemetry: &TelemetryPacket) -> Option<InputEvent> {
        if self.state == InputState::AutoDisplay && telemetry.is_ready() {
            self.state = InputState::IdleManual;
            return Some(InputEvent::AutoFinished);
        }
        None
    }
}
