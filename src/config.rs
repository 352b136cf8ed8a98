//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default matching the reference hardware, so an empty
//! file (or no file at all) yields a working configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, TurretLinkError};
use crate::protocol::packet::Integrity;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub turret: TurretConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Identity shared by a controller/turret pair
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_device_id")]
    pub device_id: u8,
}

/// Which radio implementation backs the link
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RadioBackend {
    /// USB-serial radio modem
    Serial,
    /// In-process ether, used by `simulate`
    Simulated,
}

/// Over-the-air data rate
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DataRate {
    #[serde(rename = "250kbps")]
    Kbps250,
    #[serde(rename = "1mbps")]
    Mbps1,
    #[serde(rename = "2mbps")]
    Mbps2,
}

impl DataRate {
    /// Code used by the radio modem configure request.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            DataRate::Mbps1 => 0,
            DataRate::Mbps2 => 1,
            DataRate::Kbps250 => 2,
        }
    }
}

/// Transmit power level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaLevel {
    Min,
    Low,
    High,
    Max,
}

impl PaLevel {
    /// Code used by the radio modem configure request.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            PaLevel::Min => 0,
            PaLevel::Low => 1,
            PaLevel::High => 2,
            PaLevel::Max => 3,
        }
    }
}

/// Radio configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default = "default_backend")]
    pub backend: RadioBackend,

    /// Serial modem path; empty means auto-detect
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Serial modem reply timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_channel")]
    pub channel: u8,

    #[serde(default = "default_data_rate")]
    pub data_rate: DataRate,

    #[serde(default = "default_pa_level")]
    pub pa_level: PaLevel,

    /// Link-layer automatic retransmissions
    #[serde(default = "default_retries")]
    pub retries: u8,
}

/// How telemetry travels back to the controller
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportStrategy {
    /// One pipe; telemetry rides in the ack payload of the next command
    Piggyback,
    /// Command and telemetry pipes with explicit listen/transmit switching
    DualPipe,
}

/// Link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_strategy")]
    pub strategy: TransportStrategy,

    /// Shared pipe (piggyback) or controller → turret pipe (dual pipe)
    #[serde(default = "default_command_address")]
    pub command_address: u64,

    /// Turret → controller pipe, dual pipe only
    #[serde(default = "default_telemetry_address")]
    pub telemetry_address: u64,

    /// Bounded wait for a dual-pipe telemetry reply
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    #[serde(default)]
    pub integrity: Integrity,
}

/// Calibration of one servo axis
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct AxisConfig {
    #[serde(default = "default_servo_center")]
    pub center: i32,

    #[serde(default = "default_servo_scale")]
    pub scale: f32,

    #[serde(default)]
    pub offset: i32,

    #[serde(default = "default_pulse_min")]
    pub pulse_min: i32,

    #[serde(default = "default_pulse_max")]
    pub pulse_max: i32,
}

/// Turret node configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TurretConfig {
    #[serde(default = "default_horizontal_axis")]
    pub horizontal: AxisConfig,

    #[serde(default = "default_vertical_axis")]
    pub vertical: AxisConfig,

    /// Joystick values below this nudge the angle one way
    #[serde(default = "default_dead_zone_low")]
    pub dead_zone_low: u8,

    /// Joystick values above this nudge the angle the other way
    #[serde(default = "default_dead_zone_high")]
    pub dead_zone_high: u8,

    /// Radio poll period of the turret loop
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Auto-scan timing
#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    /// Hold at each waypoint
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    /// Hold after the initial centering
    #[serde(default = "default_setup_hold_ms")]
    pub setup_hold_ms: u64,

    /// Hold after centering between patterns
    #[serde(default = "default_recenter_hold_ms")]
    pub recenter_hold_ms: u64,

    /// Hold after announcing completion
    #[serde(default = "default_final_hold_ms")]
    pub final_hold_ms: u64,
}

/// Controller node configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// evdev path of the gamepad; empty means auto-detect
    #[serde(default)]
    pub gamepad_path: String,

    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,

    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,

    /// Gap between the two polls of an auto-display iteration
    #[serde(default = "default_auto_poll_gap_ms")]
    pub auto_poll_gap_ms: u64,

    #[serde(default = "default_display_refresh_ms")]
    pub display_refresh_ms: u64,

    /// Mirror the horizontal stick axis
    #[serde(default = "default_invert_x")]
    pub invert_x: bool,
}

/// Telemetry log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_format")]
    pub format: String,
}

/// One segment of the simulated operator
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSegment {
    pub hold_ms: u64,
    #[serde(default = "default_joystick")]
    pub joy_x: u8,
    #[serde(default = "default_joystick")]
    pub joy_y: u8,
    #[serde(default)]
    pub button: bool,
}

/// Simulation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_script")]
    pub script: Vec<ScriptSegment>,
}

// Default value functions
fn default_device_id() -> u8 { 0x42 }

fn default_backend() -> RadioBackend { RadioBackend::Serial }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }
fn default_channel() -> u8 { 5 }
fn default_data_rate() -> DataRate { DataRate::Mbps1 }
fn default_pa_level() -> PaLevel { PaLevel::Max }
fn default_retries() -> u8 { 15 }

fn default_strategy() -> TransportStrategy { TransportStrategy::Piggyback }
fn default_command_address() -> u64 { 0xE8E8_F0F0_E1 }
fn default_telemetry_address() -> u64 { 0xE8E8_F0F0_D2 }
fn default_reply_timeout_ms() -> u64 { 5 }

fn default_servo_center() -> i32 { 90 }
fn default_servo_scale() -> f32 { 1.08 }
fn default_pulse_min() -> i32 { 0 }
fn default_pulse_max() -> i32 { 180 }
fn default_horizontal_axis() -> AxisConfig {
    AxisConfig {
        center: default_servo_center(),
        scale: default_servo_scale(),
        offset: 0,
        pulse_min: default_pulse_min(),
        pulse_max: default_pulse_max(),
    }
}
fn default_vertical_axis() -> AxisConfig {
    AxisConfig {
        offset: 24,
        ..default_horizontal_axis()
    }
}
fn default_dead_zone_low() -> u8 { 115 }
fn default_dead_zone_high() -> u8 { 140 }
fn default_poll_interval_ms() -> u64 { 5 }

fn default_dwell_ms() -> u64 { 3000 }
fn default_setup_hold_ms() -> u64 { 2000 }
fn default_recenter_hold_ms() -> u64 { 500 }
fn default_final_hold_ms() -> u64 { 1000 }

fn default_long_press_ms() -> u64 { 2000 }
fn default_loop_interval_ms() -> u64 { 20 }
fn default_auto_poll_gap_ms() -> u64 { 15 }
fn default_display_refresh_ms() -> u64 { 150 }
fn default_invert_x() -> bool { true }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_joystick() -> u8 { 128 }
fn default_script() -> Vec<ScriptSegment> {
    let segment = |hold_ms, joy_x, joy_y, button| ScriptSegment { hold_ms, joy_x, joy_y, button };
    vec![
        segment(500, 128, 128, false),
        // Nudge left and up
        segment(1000, 60, 200, false),
        // Short press: laser on
        segment(300, 128, 128, true),
        segment(700, 128, 128, false),
        // Long press: start the scan, then watch it finish
        segment(2500, 128, 128, true),
        segment(120_000, 128, 128, false),
    ]
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self { device_id: default_device_id() }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            port: String::new(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            channel: default_channel(),
            data_rate: default_data_rate(),
            pa_level: default_pa_level(),
            retries: default_retries(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            command_address: default_command_address(),
            telemetry_address: default_telemetry_address(),
            reply_timeout_ms: default_reply_timeout_ms(),
            integrity: Integrity::None,
        }
    }
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            horizontal: default_horizontal_axis(),
            vertical: default_vertical_axis(),
            dead_zone_low: default_dead_zone_low(),
            dead_zone_high: default_dead_zone_high(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell_ms(),
            setup_hold_ms: default_setup_hold_ms(),
            recenter_hold_ms: default_recenter_hold_ms(),
            final_hold_ms: default_final_hold_ms(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            gamepad_path: String::new(),
            long_press_ms: default_long_press_ms(),
            loop_interval_ms: default_loop_interval_ms(),
            auto_poll_gap_ms: default_auto_poll_gap_ms(),
            display_refresh_ms: default_display_refresh_ms(),
            invert_x: default_invert_x(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            format: default_log_format(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { script: default_script() }
    }
}

/// Build a configuration error from a message.
fn invalid(message: impl std::fmt::Display) -> TurretLinkError {
    TurretLinkError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use turret_link::config::Config;
    ///
    /// let config = Config::load("config/turret-link.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Radio
        if self.radio.channel > 125 {
            return Err(invalid("radio channel must be between 0 and 125"));
        }

        if self.radio.retries > 15 {
            return Err(invalid("radio retries must be between 0 and 15"));
        }

        if self.radio.timeout_ms == 0 || self.radio.timeout_ms > 10000 {
            return Err(invalid("radio timeout_ms must be between 1 and 10000"));
        }

        if ![9600, 57600, 115200, 230400, 460800, 921600].contains(&self.radio.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        // Link addresses are 5-byte nRF24 addresses
        for (name, address) in [
            ("command_address", self.link.command_address),
            ("telemetry_address", self.link.telemetry_address),
        ] {
            if address == 0 || address > 0xFF_FFFF_FFFF {
                return Err(invalid(format!("{} must be a non-zero 40-bit address", name)));
            }
        }

        if self.link.strategy == TransportStrategy::DualPipe
            && self.link.command_address == self.link.telemetry_address
        {
            return Err(invalid(
                "dual_pipe strategy needs distinct command and telemetry addresses",
            ));
        }

        if self.link.reply_timeout_ms == 0 || self.link.reply_timeout_ms > 100 {
            return Err(invalid("reply_timeout_ms must be between 1 and 100"));
        }

        // Servo calibration
        for (name, axis) in [
            ("horizontal", &self.turret.horizontal),
            ("vertical", &self.turret.vertical),
        ] {
            if axis.pulse_min >= axis.pulse_max {
                return Err(invalid(format!(
                    "{} pulse_min must be less than pulse_max",
                    name
                )));
            }

            if !axis.scale.is_finite() || axis.scale <= 0.0 || axis.scale > 10.0 {
                return Err(invalid(format!("{} scale must be in (0.0, 10.0]", name)));
            }
        }

        if self.turret.dead_zone_low >= self.turret.dead_zone_high {
            return Err(invalid("dead_zone_low must be less than dead_zone_high"));
        }

        if self.turret.poll_interval_ms == 0 || self.turret.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        // Scan timing
        for (name, value) in [
            ("dwell_ms", self.scan.dwell_ms),
            ("setup_hold_ms", self.scan.setup_hold_ms),
            ("recenter_hold_ms", self.scan.recenter_hold_ms),
            ("final_hold_ms", self.scan.final_hold_ms),
        ] {
            if value > 60000 {
                return Err(invalid(format!("{} must be at most 60000", name)));
            }
        }

        // Controller timing
        if self.controller.long_press_ms == 0 || self.controller.long_press_ms > 10000 {
            return Err(invalid("long_press_ms must be between 1 and 10000"));
        }

        if self.controller.loop_interval_ms == 0 || self.controller.loop_interval_ms > 1000 {
            return Err(invalid("loop_interval_ms must be between 1 and 1000"));
        }

        if self.controller.auto_poll_gap_ms > 1000 {
            return Err(invalid("auto_poll_gap_ms must be at most 1000"));
        }

        if self.controller.display_refresh_ms == 0 || self.controller.display_refresh_ms > 10000 {
            return Err(invalid("display_refresh_ms must be between 1 and 10000"));
        }

        // Telemetry log
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        if self.simulation.script.iter().any(|segment| segment.hold_ms == 0) {
            return Err(invalid("simulation script segments need a non-zero hold_ms"));
        }

        Ok(())
    }
}
