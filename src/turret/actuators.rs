//! Turret outputs: two servo channels, the laser and the buzzer.

use std::time::Duration;
use tracing::{debug, info};

use crate::cue::Buzzer;

/// Hardware driven by the turret node.
///
/// Calls are synchronous and assumed not to fail.
pub trait Actuators: Buzzer {
    /// Command both servos, in degrees of servo travel.
    fn set_servos(&mut self, horizontal: i32, vertical: i32);

    /// Switch the laser.
    fn set_laser(&mut self, on: bool);
}

/// Actuators that log every output change
#[derive(Debug, Default)]
pub struct TracingActuators {
    servos: Option<(i32, i32)>,
    laser: bool,
}

impl TracingActuators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Buzzer for TracingActuators {
    fn tone(&mut self, frequency_hz: u32, duration: Duration) {
        debug!("Buzzer {} Hz for {:?}", frequency_hz, duration);
    }
}

impl Actuators for TracingActuators {
    fn set_servos(&mut self, horizontal: i32, vertical: i32) {
        if self.servos != Some((horizontal, vertical)) {
            debug!("Servos H={} V={}", horizontal, vertical);
            self.servos = Some((horizontal, vertical));
        }
    }

    fn set_laser(&mut self, on: bool) {
        if self.laser != on {
            info!("Laser {}", if on { "ON" } else { "OFF" });
            self.laser = on;
        }
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Output {
        Servos(i32, i32),
        Laser(bool),
        Tone(u32, u64),
    }

    /// Records every output; clones share the same log
    #[derive(Debug, Clone, Default)]
    pub struct RecordingActuators {
        pub outputs: Arc<Mutex<Vec<Output>>>,
    }

    impl RecordingActuators {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn outputs(&self) -> Vec<Output> {
            self.outputs.lock().unwrap().clone()
        }

        pub fn servo_positions(&self) -> Vec<(i32, i32)> {
            self.outputs()
                .into_iter()
                .filter_map(|output| match output {
                    Output::Servos(h, v) => Some((h, v)),
                    _ => None,
                })
                .collect()
        }

        pub fn tones(&self) -> Vec<u32> {
            self.outputs()
                .into_iter()
                .filter_map(|output| match output {
                    Output::Tone(frequency, _) => Some(frequency),
                    _ => None,
                })
                .collect()
        }

        pub fn laser(&self) -> Option<bool> {
            self.outputs().into_iter().rev().find_map(|output| match output {
                Output::Laser(on) => Some(on),
                _ => None,
            })
        }
    }

    impl Buzzer for RecordingActuators {
        fn tone(&mut self, frequency_hz: u32, duration: Duration) {
            self.outputs
                .lock()
                .unwrap()
                .push(Output::Tone(frequency_hz, duration.as_millis() as u64));
        }
    }

    impl Actuators for RecordingActuators {
        fn set_servos(&mut self, horizontal: i32, vertical: i32) {
            self.outputs.lock().unwrap().push(Output::Servos(horizontal, vertical));
        }

        fn set_laser(&mut self, on: bool) {
            self.outputs.lock().unwrap().push(Output::Laser(on));
        }
    }
}
