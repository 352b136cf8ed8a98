//! # Radio Module
//!
//! The half-duplex packet radio underneath the link.
//!
//! This module handles:
//! - The nRF24-style capability surface used by the link transports
//! - An in-process simulated ether (two radios, auto-ack, RX FIFO overflow)
//! - A USB-serial radio modem driven over a framed request/response protocol

pub mod modem;
pub mod port_trait;
pub mod serial;
pub mod sim;

use async_trait::async_trait;

use crate::config::{DataRate, PaLevel, RadioConfig};
use crate::error::Result;

/// Largest payload a single radio frame can carry
pub const MAX_PAYLOAD_SIZE: usize = 32;

/// Received payloads buffered before the oldest is discarded
pub const RX_FIFO_DEPTH: usize = 3;

/// Number of reading pipes
pub const PIPE_COUNT: u8 = 6;

/// Pipe used for the single logical link channel
pub const LINK_PIPE: u8 = 1;

/// Physical-layer settings both radios of a pair must share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioSettings {
    pub channel: u8,
    pub data_rate: DataRate,
    pub pa_level: PaLevel,
    pub retries: u8,
}

impl From<&RadioConfig> for RadioSettings {
    fn from(config: &RadioConfig) -> Self {
        Self {
            channel: config.channel,
            data_rate: config.data_rate,
            pa_level: config.pa_level,
            retries: config.retries,
        }
    }
}

/// Result of one transmitted frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    /// The receiver's hardware acknowledged the frame (after retries).
    ///
    /// Says nothing about whether the receiving application used it.
    pub acked: bool,
    /// Payload the receiver had preloaded into its acknowledgment
    pub ack_payload: Option<Vec<u8>>,
}

impl WriteOutcome {
    /// A frame that was never acknowledged.
    #[must_use]
    pub fn lost() -> Self {
        Self::default()
    }
}

/// nRF24-style radio operations.
///
/// Errors from these calls are radio faults (bad wiring, modem gone). Plain
/// packet loss is not an error: it shows up as `acked == false` or as
/// nothing to read.
#[async_trait]
pub trait RadioPort: Send {
    /// Apply channel, data rate, power and retry settings.
    async fn configure(&mut self, settings: &RadioSettings) -> Result<()>;

    /// Set the destination address for [`RadioPort::write`].
    async fn open_writing_pipe(&mut self, address: u64) -> Result<()>;

    /// Listen for `address` on reading pipe `pipe`.
    async fn open_reading_pipe(&mut self, pipe: u8, address: u64) -> Result<()>;

    /// Enter receive mode.
    async fn start_listening(&mut self) -> Result<()>;

    /// Enter transmit mode.
    async fn stop_listening(&mut self) -> Result<()>;

    /// Transmit one payload to the writing pipe.
    async fn write(&mut self, payload: &[u8]) -> Result<WriteOutcome>;

    /// Pop the oldest received payload, if any.
    async fn read(&mut self) -> Result<Option<Vec<u8>>>;

    /// Replace the payload returned with the next acknowledgment on `pipe`.
    async fn write_ack_payload(&mut self, pipe: u8, payload: &[u8]) -> Result<()>;
}

#[async_trait]
impl<R: RadioPort + ?Sized> RadioPort for Box<R> {
    async fn configure(&mut self, settings: &RadioSettings) -> Result<()> {
        (**self).configure(settings).await
    }

    async fn open_writing_pipe(&mut self, address: u64) -> Result<()> {
        (**self).open_writing_pipe(address).await
    }

    async fn open_reading_pipe(&mut self, pipe: u8, address: u64) -> Result<()> {
        (**self).open_reading_pipe(pipe, address).await
    }

    async fn start_listening(&mut self) -> Result<()> {
        (**self).start_listening().await
    }

    async fn stop_listening(&mut self) -> Result<()> {
        (**self).stop_listening().await
    }

    async fn write(&mut self, payload: &[u8]) -> Result<WriteOutcome> {
        (**self).write(payload).await
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).read().await
    }

    async fn write_ack_payload(&mut self, pipe: u8, payload: &[u8]) -> Result<()> {
        (**self).write_ack_payload(pipe, payload).await
    }
}
