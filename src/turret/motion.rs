//! # Motion Controller
//!
//! Maps a turret angle pair to servo positions.
//!
//! ```text
//! position = center + round(angle * scale) + offset
//! ```
//!
//! The result is clamped to the axis' `[pulse_min, pulse_max]` range, which
//! bounds the mechanics independently of the ±40° protocol limit. Control is
//! open-loop: every call commands both servos.

use crate::config::{AxisConfig, TurretConfig};
use crate::turret::actuators::Actuators;

/// Servo position for `angle` on one calibrated axis.
///
/// # Examples
///
/// ```
/// use turret_link::config::TurretConfig;
/// use turret_link::turret::motion::axis_position;
///
/// let turret = TurretConfig::default();
/// assert_eq!(axis_position(&turret.horizontal, 0), 90);
/// assert_eq!(axis_position(&turret.vertical, 0), 114);
/// assert_eq!(axis_position(&turret.horizontal, 40), 133);
/// ```
#[must_use]
pub fn axis_position(axis: &AxisConfig, angle: i32) -> i32 {
    let scaled = (angle as f32 * axis.scale).round() as i32;
    (axis.center + scaled + axis.offset)
        .max(axis.pulse_min)
        .min(axis.pulse_max)
}

/// Two-axis servo driver
#[derive(Debug, Clone, Copy)]
pub struct MotionController {
    horizontal: AxisConfig,
    vertical: AxisConfig,
}

impl MotionController {
    #[must_use]
    pub fn new(horizontal: AxisConfig, vertical: AxisConfig) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    #[must_use]
    pub fn from_config(config: &TurretConfig) -> Self {
        Self::new(config.horizontal, config.vertical)
    }

    /// Servo positions for an angle pair, without moving anything.
    #[must_use]
    pub fn positions(&self, angle_h: i32, angle_v: i32) -> (i32, i32) {
        (
            axis_position(&self.horizontal, angle_h),
            axis_position(&self.vertical, angle_v),
        )
    }

    /// Point the turret at `(angle_h, angle_v)`.
    ///
    /// Returns the servo positions that were commanded.
    pub fn set_angle<A: Actuators + ?Sized>(
        &self,
        actuators: &mut A,
        angle_h: i32,
        angle_v: i32,
    ) -> (i32, i32) {
        let (h, v) = self.positions(angle_h, angle_v);
        actuators.set_servos(h, v);
        (h, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turret::actuators::mocks::RecordingActuators;

    fn default_motion() -> MotionController {
        MotionController::from_config(&TurretConfig::default())
    }

    #[test]
    fn test_center_positions() {
        assert_eq!(default_motion().positions(0, 0), (90, 114));
    }

    #[test]
    fn test_scaled_positions_round() {
        let motion = default_motion();
        // 10 * 1.08 = 10.8 -> 11
        assert_eq!(motion.positions(10, 0), (101, 114));
        // -30 * 1.08 = -32.4 -> -32
        assert_eq!(motion.positions(-30, 0), (58, 114));
        // 40 * 1.08 = 43.2 -> 43, plus offset 24
        assert_eq!(motion.positions(0, 40), (90, 157));
        assert_eq!(motion.positions(-40, -40), (47, 71));
    }

    #[test]
    fn test_positions_clamped_to_range() {
        let axis = AxisConfig {
            center: 170,
            scale: 2.0,
            offset: 5,
            pulse_min: 10,
            pulse_max: 180,
        };
        let motion = MotionController::new(axis, axis);

        assert_eq!(motion.positions(40, -40), (180, 95));

        let low = AxisConfig { center: 0, ..axis };
        let motion = MotionController::new(low, low);
        assert_eq!(motion.positions(-40, 0), (10, 10));
    }

    #[test]
    fn test_positions_within_bounds_for_all_angles() {
        let calibrations = [
            AxisConfig {
                center: 90,
                scale: 1.08,
                offset: 24,
                pulse_min: 0,
                pulse_max: 180,
            },
            AxisConfig {
                center: 0,
                scale: 10.0,
                offset: -50,
                pulse_min: 20,
                pulse_max: 160,
            },
            AxisConfig {
                center: 180,
                scale: 0.1,
                offset: 100,
                pulse_min: 45,
                pulse_max: 135,
            },
        ];

        for axis in calibrations {
            let motion = MotionController::new(axis, axis);
            for h in -40..=40 {
                for v in -40..=40 {
                    let (sh, sv) = motion.positions(h, v);
                    assert!((axis.pulse_min..=axis.pulse_max).contains(&sh));
                    assert!((axis.pulse_min..=axis.pulse_max).contains(&sv));
                }
            }
        }
    }

    #[test]
    fn test_set_angle_commands_servos() {
        let recorder = RecordingActuators::new();
        let mut actuators = recorder.clone();

        let commanded = default_motion().set_angle(&mut actuators, -1, 2);

        assert_eq!(commanded, (89, 116));
        assert_eq!(recorder.servo_positions(), vec![(89, 116)]);
    }
}
