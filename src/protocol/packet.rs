//! # Command and Telemetry Packets
//!
//! Both packets are fixed-width records sent as raw radio payloads, with no
//! framing, sequence number or checksum:
//!
//! ```text
//! Command   (4 bytes): [device_id, joy_x, joy_y, action]
//! Telemetry (5 bytes): [device_id, angle_h (i8), angle_v (i8), mode, laser_on]
//! ```
//!
//! Every packet carries the sender's absolute state, so losing one is
//! harmless: the next cycle carries the same information again.

use serde::Deserialize;

use super::crc::crc8;
use crate::error::{Result, TurretLinkError};

/// Command packet size on the wire
pub const COMMAND_PACKET_SIZE: usize = 4;

/// Telemetry packet size on the wire
pub const TELEMETRY_PACKET_SIZE: usize = 5;

/// Largest angle magnitude (degrees) carried in telemetry
pub const ANGLE_LIMIT: i8 = 40;

/// Joystick value of a centred stick
pub const JOYSTICK_CENTER: u8 = 128;

/// Operator action carried by a command packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Action {
    /// Joystick only
    #[default]
    None = 0,
    /// Switch the laser on, then apply the joystick
    LaserOn = 1,
    /// Switch the laser off, then apply the joystick
    LaserOff = 2,
    /// Start the autonomous scan; joystick ignored
    TriggerAuto = 3,
}

impl TryFrom<u8> for Action {
    type Error = TurretLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Action::None),
            1 => Ok(Action::LaserOn),
            2 => Ok(Action::LaserOff),
            3 => Ok(Action::TriggerAuto),
            other => Err(TurretLinkError::Protocol(format!("Unknown action code {}", other))),
        }
    }
}

/// Turret operating mode reported in telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    /// At rest after the scan completed
    Idle = 0,
    /// Following joystick commands
    #[default]
    Manual = 1,
    HorizontalScan = 2,
    VerticalScan = 3,
    DiagScanA = 4,
    DiagScanB = 5,
    /// Centering before or between scan patterns
    Setup = 6,
}

impl Mode {
    /// Stable lowercase name used in logs and telemetry records.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Manual => "manual",
            Mode::HorizontalScan => "horizontal_scan",
            Mode::VerticalScan => "vertical_scan",
            Mode::DiagScanA => "diag_scan_a",
            Mode::DiagScanB => "diag_scan_b",
            Mode::Setup => "setup",
        }
    }

    /// Whether this mode belongs to the autonomous sequence.
    #[must_use]
    pub fn is_auto(self) -> bool {
        !matches!(self, Mode::Idle | Mode::Manual)
    }
}

impl TryFrom<u8> for Mode {
    type Error = TurretLinkError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Mode::Idle),
            1 => Ok(Mode::Manual),
            2 => Ok(Mode::HorizontalScan),
            3 => Ok(Mode::VerticalScan),
            4 => Ok(Mode::DiagScanA),
            5 => Ok(Mode::DiagScanB),
            6 => Ok(Mode::Setup),
            other => Err(TurretLinkError::Protocol(format!("Unknown mode code {}", other))),
        }
    }
}

/// A fixed-width record that travels as one radio payload.
pub trait WirePacket: Sized + Copy + Send + Sync + 'static {
    /// Encoded size in bytes, without any integrity trailer
    const SIZE: usize;

    /// Encode into exactly [`Self::SIZE`] bytes.
    fn encode(&self) -> Vec<u8>;

    /// Decode from exactly [`Self::SIZE`] bytes.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// Controller → turret packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    pub device_id: u8,
    /// Horizontal stick, 0-255
    pub joy_x: u8,
    /// Vertical stick, 0-255
    pub joy_y: u8,
    pub action: Action,
}

impl CommandPacket {
    #[must_use]
    pub fn new(device_id: u8, joy_x: u8, joy_y: u8, action: Action) -> Self {
        Self {
            device_id,
            joy_x,
            joy_y,
            action,
        }
    }

    /// A centred, action-free command.
    ///
    /// Sent while the controller only wants replies from the turret.
    #[must_use]
    pub fn keep_alive(device_id: u8) -> Self {
        Self::new(device_id, JOYSTICK_CENTER, JOYSTICK_CENTER, Action::None)
    }
}

impl WirePacket for CommandPacket {
    const SIZE: usize = COMMAND_PACKET_SIZE;

    fn encode(&self) -> Vec<u8> {
        vec![self.device_id, self.joy_x, self.joy_y, self.action as u8]
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != COMMAND_PACKET_SIZE {
            return Err(TurretLinkError::Protocol(format!(
                "Command packet must be {} bytes, got {}",
                COMMAND_PACKET_SIZE,
                bytes.len()
            )));
        }

        Ok(Self {
            device_id: bytes[0],
            joy_x: bytes[1],
            joy_y: bytes[2],
            action: Action::try_from(bytes[3])?,
        })
    }
}

/// Turret → controller packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryPacket {
    pub device_id: u8,
    /// Horizontal angle in degrees, within ±[`ANGLE_LIMIT`]
    pub angle_h: i8,
    /// Vertical angle in degrees, within ±[`ANGLE_LIMIT`]
    pub angle_v: i8,
    pub mode: Mode,
    pub laser_on: bool,
}

impl TelemetryPacket {
    /// Build a telemetry packet, clamping both angles to ±40°.
    ///
    /// # Examples
    ///
    /// ```
    /// use turret_link::protocol::packet::{Mode, TelemetryPacket};
    ///
    /// let tlm = TelemetryPacket::new(0x42, 55, -12, Mode::Manual, true);
    /// assert_eq!(tlm.angle_h, 40);
    /// assert_eq!(tlm.angle_v, -12);
    /// ```
    #[must_use]
    pub fn new(device_id: u8, angle_h: i32, angle_v: i32, mode: Mode, laser_on: bool) -> Self {
        Self {
            device_id,
            angle_h: clamp_angle(angle_h),
            angle_v: clamp_angle(angle_v),
            mode,
            laser_on,
        }
    }

    /// All-zero telemetry, what the controller shows before the first reply.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            device_id: 0,
            angle_h: 0,
            angle_v: 0,
            mode: Mode::Idle,
            laser_on: false,
        }
    }

    /// Whether this is the "sequence finished, turret ready" signal.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.mode == Mode::Idle && !self.laser_on
    }
}

impl WirePacket for TelemetryPacket {
    const SIZE: usize = TELEMETRY_PACKET_SIZE;

    fn encode(&self) -> Vec<u8> {
        vec![
            self.device_id,
            self.angle_h as u8,
            self.angle_v as u8,
            self.mode as u8,
            u8::from(self.laser_on),
        ]
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TELEMETRY_PACKET_SIZE {
            return Err(TurretLinkError::Protocol(format!(
                "Telemetry packet must be {} bytes, got {}",
                TELEMETRY_PACKET_SIZE,
                bytes.len()
            )));
        }

        Ok(Self::new(
            bytes[0],
            i32::from(bytes[1] as i8),
            i32::from(bytes[2] as i8),
            Mode::try_from(bytes[3])?,
            bytes[4] != 0,
        ))
    }
}

/// Clamp a degree value into the protocol range.
#[inline]
fn clamp_angle(angle: i32) -> i8 {
    angle.clamp(-i32::from(ANGLE_LIMIT), i32::from(ANGLE_LIMIT)) as i8
}

/// Integrity policy applied to every payload on the link.
///
/// `None` keeps the plain 4/5-byte wire format. `Crc8` appends one
/// CRC-8/DVB-S2 byte over the packet, and payloads whose trailer does not
/// match are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrity {
    #[default]
    None,
    Crc8,
}

impl Integrity {
    /// Encode `packet` into a radio payload.
    pub fn seal<P: WirePacket>(self, packet: &P) -> Vec<u8> {
        let mut bytes = packet.encode();
        if self == Integrity::Crc8 {
            let trailer = crc8(&bytes);
            bytes.push(trailer);
        }
        bytes
    }

    /// Decode a radio payload.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the length is wrong, the trailer does not
    /// match, or a field holds an unknown code.
    pub fn open<P: WirePacket>(self, payload: &[u8]) -> Result<P> {
        match self {
            Integrity::None => P::decode(payload),
            Integrity::Crc8 => {
                if payload.len() != P::SIZE + 1 {
                    return Err(TurretLinkError::Protocol(format!(
                        "Sealed packet must be {} bytes, got {}",
                        P::SIZE + 1,
                        payload.len()
                    )));
                }
                let (body, trailer) = payload.split_at(P::SIZE);
                let expected = crc8(body);
                if trailer[0] != expected {
                    return Err(TurretLinkError::Protocol(format!(
                        "CRC mismatch: expected 0x{:02X}, got 0x{:02X}",
                        expected, trailer[0]
                    )));
                }
                P::decode(body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_layout() {
        let cmd = CommandPacket::new(0x42, 200, 128, Action::LaserOn);
        assert_eq!(cmd.encode(), vec![0x42, 200, 128, 1]);
    }

    #[test]
    fn test_telemetry_wire_layout_negative_angles() {
        let tlm = TelemetryPacket::new(0x42, -40, 10, Mode::DiagScanB, true);
        assert_eq!(tlm.encode(), vec![0x42, 0xD8, 0x0A, 5, 1]);
    }

    #[test]
    fn test_decode_command() {
        let cmd = CommandPacket::decode(&[0x42, 10, 250, 3]).unwrap();
        assert_eq!(cmd.device_id, 0x42);
        assert_eq!(cmd.joy_x, 10);
        assert_eq!(cmd.joy_y, 250);
        assert_eq!(cmd.action, Action::TriggerAuto);
    }

    #[test]
    fn test_decode_command_unknown_action() {
        let result = CommandPacket::decode(&[0x42, 128, 128, 9]);
        assert!(matches!(result, Err(TurretLinkError::Protocol(_))));
    }

    #[test]
    fn test_decode_command_wrong_length() {
        assert!(CommandPacket::decode(&[0x42, 128, 128]).is_err());
        assert!(CommandPacket::decode(&[0x42, 128, 128, 0, 0]).is_err());
    }

    #[test]
    fn test_decode_telemetry_clamps_out_of_range_angles() {
        // 0x7F = 127, 0x80 = -128
        let tlm = TelemetryPacket::decode(&[0x42, 0x7F, 0x80, 1, 0]).unwrap();
        assert_eq!(tlm.angle_h, 40);
        assert_eq!(tlm.angle_v, -40);
    }

    #[test]
    fn test_decode_telemetry_laser_any_nonzero() {
        let tlm = TelemetryPacket::decode(&[0x42, 0, 0, 0, 7]).unwrap();
        assert!(tlm.laser_on);
    }

    #[test]
    fn test_decode_telemetry_unknown_mode() {
        assert!(TelemetryPacket::decode(&[0x42, 0, 0, 7, 0]).is_err());
    }

    #[test]
    fn test_telemetry_new_clamps() {
        let tlm = TelemetryPacket::new(1, -300, 41, Mode::Manual, false);
        assert_eq!(tlm.angle_h, -40);
        assert_eq!(tlm.angle_v, 40);
    }

    #[test]
    fn test_ready_signal() {
        assert!(TelemetryPacket::new(1, 0, 0, Mode::Idle, false).is_ready());
        assert!(!TelemetryPacket::new(1, 0, 0, Mode::Idle, true).is_ready());
        assert!(!TelemetryPacket::new(1, 0, 0, Mode::Setup, false).is_ready());
    }

    #[test]
    fn test_mode_is_auto() {
        assert!(!Mode::Idle.is_auto());
        assert!(!Mode::Manual.is_auto());
        for mode in [
            Mode::HorizontalScan,
            Mode::VerticalScan,
            Mode::DiagScanA,
            Mode::DiagScanB,
            Mode::Setup,
        ] {
            assert!(mode.is_auto(), "{:?} should be an auto mode", mode);
        }
    }

    #[test]
    fn test_keep_alive_is_centred() {
        let cmd = CommandPacket::keep_alive(0x42);
        assert_eq!(cmd.joy_x, JOYSTICK_CENTER);
        assert_eq!(cmd.joy_y, JOYSTICK_CENTER);
        assert_eq!(cmd.action, Action::None);
    }

    // ==================== Integrity Tests ====================

    #[test]
    fn test_integrity_none_is_plain_wire_format() {
        let cmd = CommandPacket::new(0x42, 1, 2, Action::LaserOff);
        assert_eq!(Integrity::None.seal(&cmd), cmd.encode());
    }

    #[test]
    fn test_integrity_crc8_appends_trailer() {
        let tlm = TelemetryPacket::new(0x42, 10, -10, Mode::Manual, true);
        let sealed = Integrity::Crc8.seal(&tlm);
        assert_eq!(sealed.len(), TELEMETRY_PACKET_SIZE + 1);
        assert_eq!(sealed[5], crc8(&sealed[..5]));

        let opened: TelemetryPacket = Integrity::Crc8.open(&sealed).unwrap();
        assert_eq!(opened, tlm);
    }

    #[test]
    fn test_integrity_crc8_rejects_corruption() {
        let cmd = CommandPacket::new(0x42, 128, 128, Action::LaserOn);
        let mut sealed = Integrity::Crc8.seal(&cmd);
        sealed[1] ^= 0x01;

        let result: Result<CommandPacket> = Integrity::Crc8.open(&sealed);
        assert!(result.is_err());
    }

    #[test]
    fn test_integrity_crc8_rejects_unsealed_payload() {
        let cmd = CommandPacket::new(0x42, 128, 128, Action::LaserOn);
        let result: Result<CommandPacket> = Integrity::Crc8.open(&cmd.encode());
        assert!(result.is_err());
    }
}
