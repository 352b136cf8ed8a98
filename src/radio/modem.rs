//! # Radio Modem Framing
//!
//! Frames exchanged with a USB-serial radio modem.
//!
//! ```text
//! [sync 0xA5] [len] [type] [payload ...] [crc8]
//! ```
//!
//! `len` counts `type + payload + crc`. The CRC-8/DVB-S2 covers
//! `len + type + payload`. Every request is answered by one response whose
//! type is the request type with bit 7 set; the first response byte is a
//! status code (0 = ok).

use bytes::{Buf, BytesMut};

use crate::error::{Result, TurretLinkError};
use crate::protocol::crc::crc8;

/// Frame sync byte
pub const MODEM_SYNC: u8 = 0xA5;

/// Largest payload a modem frame can carry
pub const MODEM_MAX_PAYLOAD: usize = 64;

/// Set on the type byte of every response
pub const RESPONSE_FLAG: u8 = 0x80;

/// Status byte of a successful response
pub const STATUS_OK: u8 = 0x00;

/// Request types
pub mod request {
    /// `[channel, data_rate, pa_level, retries]`
    pub const CONFIGURE: u8 = 0x01;
    /// `[address; 5]`, least significant byte first
    pub const OPEN_WRITING_PIPE: u8 = 0x02;
    /// `[pipe, address; 5]`
    pub const OPEN_READING_PIPE: u8 = 0x03;
    /// `[1 = listen, 0 = transmit]`
    pub const LISTEN: u8 = 0x04;
    /// `[payload ...]`; response `[status, acked, ack_payload ...]`
    pub const WRITE: u8 = 0x05;
    /// `[pipe, payload ...]`
    pub const ACK_PAYLOAD: u8 = 0x06;
    /// `[]`; response `[status, payload ...]`, empty when nothing is pending
    pub const READ: u8 = 0x07;
}

/// A decoded modem frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemFrame {
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

/// Encode a modem frame.
///
/// # Errors
///
/// Returns error if the payload exceeds [`MODEM_MAX_PAYLOAD`].
///
/// # Examples
///
/// ```
/// use turret_link::radio::modem::{encode_frame, request, MODEM_SYNC};
///
/// let frame = encode_frame(request::LISTEN, &[1]).unwrap();
/// assert_eq!(&frame[..4], &[MODEM_SYNC, 3, request::LISTEN, 1]);
/// ```
pub fn encode_frame(frame_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MODEM_MAX_PAYLOAD {
        return Err(TurretLinkError::Radio(format!(
            "Modem payload size {} exceeds maximum {}",
            payload.len(),
            MODEM_MAX_PAYLOAD
        )));
    }

    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.push(MODEM_SYNC);
    frame.push((payload.len() + 2) as u8);
    frame.push(frame_type);
    frame.extend_from_slice(payload);
    let crc = crc8(&frame[1..]);
    frame.push(crc);

    Ok(frame)
}

/// Encode a 40-bit pipe address, least significant byte first.
#[must_use]
pub fn encode_address(address: u64) -> [u8; 5] {
    let bytes = address.to_le_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
}

/// Accumulates serial bytes and splits them into frames.
///
/// Garbage before a sync byte and frames with a bad CRC are skipped.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: BytesMut,
}

impl FrameReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes read from the port.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Drop any partially received data.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// Corrupt frames are reported as errors and consumed, so calling again
    /// continues with the bytes that follow.
    pub fn next_frame(&mut self) -> Option<Result<ModemFrame>> {
        // Resynchronise on the sync byte
        match self.buffer.iter().position(|&b| b == MODEM_SYNC) {
            Some(start) => self.buffer.advance(start),
            None => {
                self.buffer.clear();
                return None;
            }
        }

        if self.buffer.len() < 2 {
            return None;
        }

        let length = self.buffer[1] as usize;
        if !(2..=MODEM_MAX_PAYLOAD + 2).contains(&length) {
            // Not a real frame start; skip this sync byte
            self.buffer.advance(1);
            return Some(Err(TurretLinkError::Radio(format!(
                "Invalid modem frame length {}",
                length
            ))));
        }

        if self.buffer.len() < 2 + length {
            return None;
        }

        let frame = self.buffer.split_to(2 + length);
        let received_crc = frame[1 + length];
        let calculated_crc = crc8(&frame[1..1 + length]);
        if received_crc != calculated_crc {
            return Some(Err(TurretLinkError::Radio(format!(
                "Modem CRC mismatch: expected 0x{:02X}, got 0x{:02X}",
                calculated_crc, received_crc
            ))));
        }

        Some(Ok(ModemFrame {
            frame_type: frame[2],
            payload: frame[3..1 + length].to_vec(),
        }))
    }
}
