//! # Gamepad Input Module
//!
//! Reads the operator's joystick and button from a Linux evdev gamepad.
//!
//! ## Device Detection
//!
//! Unless `controller.gamepad_path` names a device, the first
//! `/dev/input/event*` device exposing all of the following is used:
//! - `ABS_X`, `ABS_Y`: left stick (0-255, 128 = centre)
//! - `BTN_SOUTH`: the laser / auto button
//!
//! ## Event Handling
//!
//! A background task folds evdev events into an [`InputSample`] and
//! publishes it on a `tokio::sync::watch` channel; [`GamepadInput::sample`]
//! just reads the latest value, so the control loop never blocks on input.

use async_trait::async_trait;
use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind, Key};
use std::path::Path;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::input::{InputSample, InputSource};
use crate::config::ControllerConfig;
use crate::error::{Result, TurretLinkError};

/// Raw axis value range of the supported gamepads
pub const AXIS_MIN: i32 = 0;
/// Raw axis value range of the supported gamepads
pub const AXIS_MAX: i32 = 255;

/// Folds evdev events into the current input sample.
///
/// # Examples
///
/// ```
/// use evdev::{AbsoluteAxisType, EventType, InputEvent};
/// use turret_link::controller::gamepad::StickMapper;
///
/// let mut mapper = StickMapper::new(true);
/// mapper.process_event(&InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, 0));
/// assert_eq!(mapper.sample().joy_x, 255);
/// ```
#[derive(Debug, Clone)]
pub struct StickMapper {
    sample: InputSample,
    invert_x: bool,
}

impl StickMapper {
    #[must_use]
    pub fn new(invert_x: bool) -> Self {
        Self {
            sample: InputSample::default(),
            invert_x,
        }
    }

    #[must_use]
    pub fn sample(&self) -> InputSample {
        self.sample
    }

    /// Process one event.
    ///
    /// Returns true if the sample changed.
    pub fn process_event(&mut self, event: &InputEvent) -> bool {
        let before = self.sample;

        match event.kind() {
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_X) => {
                let value = to_byte(event.value());
                self.sample.joy_x = if self.invert_x { u8::MAX - value } else { value };
            }
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_Y) => {
                self.sample.joy_y = to_byte(event.value());
            }
            InputEventKind::Key(Key::BTN_SOUTH) => {
                self.sample.button = event.value() != 0;
            }
            _ => {
                // Other axes, buttons and sync events
            }
        }

        self.sample != before
    }
}

fn to_byte(value: i32) -> u8 {
    value.clamp(AXIS_MIN, AXIS_MAX) as u8
}

/// Whether `device` has the stick axes and button we need.
fn is_gamepad(device: &Device) -> bool {
    let has_axes = device.supported_absolute_axes().map_or(false, |axes| {
        axes.contains(AbsoluteAxisType::ABS_X) && axes.contains(AbsoluteAxisType::ABS_Y)
    });
    let has_button = device
        .supported_keys()
        .map_or(false, |keys| keys.contains(Key::BTN_SOUTH));
    has_axes && has_button
}

/// Scan `/dev/input` for the first usable gamepad.
fn find_gamepad() -> Result<(Device, String)> {
    let input_dir = Path::new("/dev/input");

    if !input_dir.exists() {
        return Err(TurretLinkError::Controller(
            "/dev/input directory not found".to_string(),
        ));
    }

    let mut entries: Vec<_> = std::fs::read_dir(input_dir)
        .map_err(|e| TurretLinkError::Controller(format!("Failed to read /dev/input: {}", e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TurretLinkError::Controller(format!("Failed to read directory entry: {}", e)))?;

    // Deterministic choice when several gamepads are connected
    entries.sort_by_key(|entry| entry.path());

    for entry in entries {
        let path = entry.path();

        let is_event = path
            .file_name()
            .map_or(false, |name| name.to_string_lossy().starts_with("event"));
        if !is_event {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                debug!(
                    "Found input device: {} ({})",
                    path.display(),
                    device.name().unwrap_or("unnamed")
                );
                if is_gamepad(&device) {
                    let device_path = path.to_string_lossy().to_string();
                    info!("Found gamepad at: {}", device_path);
                    return Ok((device, device_path));
                }
            }
            Err(e) => {
                // Permission denied or other errors - skip device
                debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Err(TurretLinkError::ControllerNotFound)
}

/// evdev-backed [`InputSource`]
pub struct GamepadInput {
    samples: watch::Receiver<InputSample>,
    reader: JoinHandle<()>,
    device_path: String,
}

impl GamepadInput {
    /// Open the configured gamepad, or auto-detect one.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `ControllerNotFound`: no suitable device
    /// - `Controller`: the device cannot be opened or lacks the stick/button
    pub fn open(config: &ControllerConfig) -> Result<Self> {
        let (device, device_path) = if config.gamepad_path.is_empty() {
            find_gamepad()?
        } else {
            let device = Device::open(&config.gamepad_path).map_err(|e| {
                TurretLinkError::Controller(format!(
                    "Failed to open {}: {}",
                    config.gamepad_path, e
                ))
            })?;
            if !is_gamepad(&device) {
                return Err(TurretLinkError::Controller(format!(
                    "{} has no ABS_X/ABS_Y stick and BTN_SOUTH button",
                    config.gamepad_path
                )));
            }
            (device, config.gamepad_path.clone())
        };

        let mut events = device.into_event_stream().map_err(|e| {
            TurretLinkError::Controller(format!("Failed to stream {}: {}", device_path, e))
        })?;

        let mut mapper = StickMapper::new(config.invert_x);
        let (tx, samples) = watch::channel(mapper.sample());

        let reader = tokio::spawn(async move {
            loop {
                match events.next_event().await {
                    Ok(event) => {
                        if mapper.process_event(&event) && tx.send(mapper.sample()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Gamepad read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            samples,
            reader,
            device_path,
        })
    }

    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl InputSource for GamepadInput {
    async fn sample(&mut self) -> Result<InputSample> {
        // The reader task drops the sender when the device goes away
        if self.samples.has_changed().is_err() {
            return Err(TurretLinkError::Controller(format!(
                "Gamepad {} disconnected",
                self.device_path
            )));
        }
        Ok(*self.samples.borrow_and_update())
    }
}

impl Drop for GamepadInput {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    /// Helper to create an axis event for testing.
    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    /// Helper to create a key event for testing.
    fn make_key_event(key: Key, pressed: bool) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), if pressed { 1 } else { 0 })
    }

    // ==================== Axis Event Tests ====================

    #[test]
    fn test_initial_sample_centered() {
        let mapper = StickMapper::new(true);
        assert_eq!(mapper.sample(), InputSample::default());
    }

    #[test]
    fn test_x_axis_inverted() {
        let mut mapper = StickMapper::new(true);

        assert!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 255)));
        assert_eq!(mapper.sample().joy_x, 0);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 55));
        assert_eq!(mapper.sample().joy_x, 200);
    }

    #[test]
    fn test_x_axis_not_inverted() {
        let mut mapper = StickMapper::new(false);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 55));
        assert_eq!(mapper.sample().joy_x, 55);
    }

    #[test]
    fn test_y_axis_direct() {
        let mut mapper = StickMapper::new(true);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 10));
        assert_eq!(mapper.sample().joy_y, 10);
    }

    #[test]
    fn test_axis_values_clamped() {
        let mut mapper = StickMapper::new(false);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 1000));
        assert_eq!(mapper.sample().joy_x, 255);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, -50));
        assert_eq!(mapper.sample().joy_y, 0);
    }

    // ==================== Button Event Tests ====================

    #[test]
    fn test_button_press_release_cycle() {
        let mut mapper = StickMapper::new(true);

        assert!(mapper.process_event(&make_key_event(Key::BTN_SOUTH, true)));
        assert!(mapper.sample().button);

        assert!(mapper.process_event(&make_key_event(Key::BTN_SOUTH, false)));
        assert!(!mapper.sample().button);
    }

    #[test]
    fn test_other_inputs_ignored() {
        let mut mapper = StickMapper::new(true);

        assert!(!mapper.process_event(&make_key_event(Key::BTN_EAST, true)));
        assert!(!mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RZ, 10)));
        assert!(!mapper.process_event(&InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)));
        assert_eq!(mapper.sample(), InputSample::default());
    }

    #[test]
    fn test_repeated_value_reports_no_change() {
        let mut mapper = StickMapper::new(false);
        assert!(mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 90)));
        assert!(!mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 90)));
    }

    // ==================== Hardware Tests ====================

    // Integration test - only runs with real hardware
    #[tokio::test]
    #[ignore]
    async fn test_open_with_real_hardware() {
        let gamepad = GamepadInput::open(&ControllerConfig::default());
        assert!(gamepad.is_ok(), "Should detect a connected gamepad");
        assert!(gamepad.unwrap().device_path().starts_with("/dev/input/event"));
    }

    // Integration test - only runs with real hardware
    #[tokio::test]
    #[ignore]
    async fn test_sample_with_real_hardware() {
        let mut gamepad = GamepadInput::open(&ControllerConfig::default()).expect("Gamepad not found");

        println!("Move the left stick within 5 seconds...");
        for _ in 0..100 {
            let sample = gamepad.sample().await.unwrap();
            if sample != InputSample::default() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        panic!("No input received from gamepad");
    }
}
