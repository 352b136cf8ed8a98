//! Operator display.
//!
//! The handheld shows one of two views:
//! - manual: laser state, joystick bars and the turret's angles
//! - auto: the scan phase label and the turret's angles
//!
//! Angles are negated so that they read in the operator's frame, facing
//! the turret.

use tracing::{debug, info};

use crate::error::Result;
use crate::protocol::packet::{Mode, TelemetryPacket};

/// Width of a joystick bar, in cells
pub const BAR_WIDTH: usize = 11;

/// What the manual view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualView {
    pub laser_on: bool,
    pub joy_x: u8,
    pub joy_y: u8,
    pub telemetry: TelemetryPacket,
}

/// Output surface of the controller
#[cfg_attr(test, mockall::automock)]
pub trait Display: Send {
    /// Show the startup splash.
    ///
    /// # Errors
    ///
    /// Returns error if the display cannot be initialised.
    fn splash(&mut self) -> Result<()>;

    /// Show a full-screen message.
    fn banner(&mut self, text: &str);

    fn show_manual(&mut self, view: &ManualView);

    fn show_auto(&mut self, telemetry: &TelemetryPacket);
}

/// Label of an auto-scan phase.
#[must_use]
pub fn mode_label(mode: Mode) -> String {
    match mode {
        Mode::Setup => "SETUP".to_string(),
        Mode::HorizontalScan => "HORIZONTAL".to_string(),
        Mode::VerticalScan => "VERTICAL".to_string(),
        Mode::DiagScanA => "DIAG 1".to_string(),
        Mode::DiagScanB => "DIAG 2".to_string(),
        Mode::Idle => "READY!".to_string(),
        other => format!("MODE:{}", other as u8),
    }
}

/// Render a joystick axis as a bar with a marker at its position.
///
/// ```
/// use turret_link::controller::display::joystick_bar;
///
/// assert_eq!(joystick_bar(0), "#----------");
/// assert_eq!(joystick_bar(128), "-----#-----");
/// assert_eq!(joystick_bar(255), "----------#");
/// ```
#[must_use]
pub fn joystick_bar(value: u8) -> String {
    let marker = (usize::from(value) * (BAR_WIDTH - 1) + 127) / 255;
    (0..BAR_WIDTH)
        .map(|cell| if cell == marker { '#' } else { '-' })
        .collect()
}

/// Manual view as one line of text.
#[must_use]
pub fn render_manual(view: &ManualView) -> String {
    format!(
        "LASER {:<3} | X [{}] Y [{}] | H:{:>3} V:{:>3}",
        if view.laser_on { "ON" } else { "OFF" },
        joystick_bar(view.joy_x),
        joystick_bar(view.joy_y),
        -i32::from(view.telemetry.angle_h),
        -i32::from(view.telemetry.angle_v),
    )
}

/// Auto view as one line of text.
#[must_use]
pub fn render_auto(telemetry: &TelemetryPacket) -> String {
    format!(
        "AUTO {} | H:{:>3} V:{:>3}",
        mode_label(telemetry.mode),
        -i32::from(telemetry.angle_h),
        -i32::from(telemetry.angle_v),
    )
}

/// Display that writes its frames to the log
#[derive(Debug, Default)]
pub struct TracingDisplay {
    last_manual: Option<String>,
}

impl TracingDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Display for TracingDisplay {
    fn splash(&mut self) -> Result<()> {
        info!("TURRET LINK | controller v{}", env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    fn banner(&mut self, text: &str) {
        info!("{}", text);
    }

    fn show_manual(&mut self, view: &ManualView) {
        // One frame per loop cycle; only log what changed
        let line = render_manual(view);
        if self.last_manual.as_deref() != Some(line.as_str()) {
            debug!("{}", line);
            self.last_manual = Some(line);
        }
    }

    fn show_auto(&mut self, telemetry: &TelemetryPacket) {
        self.last_manual = None;
        info!("{}", render_auto(telemetry));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_labels() {
        assert_eq!(mode_label(Mode::Setup), "SETUP");
        assert_eq!(mode_label(Mode::HorizontalScan), "HORIZONTAL");
        assert_eq!(mode_label(Mode::VerticalScan), "VERTICAL");
        assert_eq!(mode_label(Mode::DiagScanA), "DIAG 1");
        assert_eq!(mode_label(Mode::DiagScanB), "DIAG 2");
        assert_eq!(mode_label(Mode::Idle), "READY!");
        assert_eq!(mode_label(Mode::Manual), "MODE:1");
    }

    #[test]
    fn test_joystick_bar_is_monotonic() {
        let positions: Vec<usize> = (0..=255u8)
            .map(|value| joystick_bar(value).find('#').unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(joystick_bar(77).chars().count() == BAR_WIDTH);
    }

    #[test]
    fn test_manual_angles_negated() {
        let view = ManualView {
            laser_on: true,
            joy_x: 128,
            joy_y: 0,
            telemetry: TelemetryPacket::new(0x42, 12, -7, Mode::Manual, true),
        };
        let line = render_manual(&view);
        assert!(line.starts_with("LASER ON "));
        assert!(line.contains("H:-12"));
        assert!(line.contains("V:  7"));
        assert!(line.contains("Y [#----------]"));
    }

    #[test]
    fn test_auto_line() {
        let telemetry = TelemetryPacket::new(0x42, -30, 0, Mode::DiagScanA, true);
        assert_eq!(render_auto(&telemetry), "AUTO DIAG 1 | H: 30 V:  0");
    }

    #[test]
    fn test_tracing_display_splash_succeeds() {
        let mut display = TracingDisplay::new();
        assert!(display.splash().is_ok());
    }
}
