//! # Serial Radio Modem
//!
//! Drives a USB-serial radio modem (an nRF24 behind a small bridge MCU)
//! with the framed protocol in [`super::modem`].
//!
//! This module handles:
//! - Auto-detecting and opening the modem port
//! - One request/response exchange per radio operation, bounded by a timeout
//! - Mapping modem status codes to radio errors

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use super::modem::{encode_address, encode_frame, request, FrameReader, RESPONSE_FLAG, STATUS_OK};
use super::port_trait::{SerialPortIO, TokioSerialPort};
use super::{RadioPort, RadioSettings, WriteOutcome};
use crate::config::RadioConfig;
use crate::error::{Result, TurretLinkError};

/// Default modem device paths to try (in order of preference)
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC bridge firmware
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Radio backed by a serial modem
pub struct SerialRadio<P: SerialPortIO = TokioSerialPort> {
    port: P,
    reader: FrameReader,
    reply_timeout: Duration,
    device_path: String,
}

impl<P: SerialPortIO> std::fmt::Debug for SerialRadio<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialRadio")
            .field("device_path", &self.device_path)
            .field("reply_timeout", &self.reply_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialRadio<TokioSerialPort> {
    /// Open the modem named in `config`, or auto-detect it when the port is empty.
    ///
    /// # Errors
    ///
    /// Returns error if no modem could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use turret_link::config::RadioConfig;
    /// use turret_link::radio::serial::SerialRadio;
    ///
    /// let radio = SerialRadio::open(&RadioConfig::default())?;
    /// println!("Modem at {}", radio.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &RadioConfig) -> Result<Self> {
        if config.port.is_empty() {
            Self::open_with_paths(DEFAULT_DEVICE_PATHS, config)
        } else {
            Self::open_with_paths(&[config.port.as_str()], config)
        }
    }

    /// Try each path in turn and keep the first that opens.
    pub fn open_with_paths(paths: &[&str], config: &RadioConfig) -> Result<Self> {
        for path in paths {
            debug!("Trying to open radio modem: {}", path);

            match Self::open_port(path, config.baud_rate) {
                Ok(port) => {
                    info!("Opened radio modem at {}", path);
                    let mut radio = Self::with_port(
                        TokioSerialPort::new(port),
                        Duration::from_millis(config.timeout_ms),
                    );
                    radio.device_path = path.to_string();
                    return Ok(radio);
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(TurretLinkError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| TurretLinkError::Serial(format!("Failed to open {}: {}", path, e)))
    }
}

impl<P: SerialPortIO> SerialRadio<P> {
    /// Wrap an already opened port.
    pub fn with_port(port: P, reply_timeout: Duration) -> Self {
        Self {
            port,
            reader: FrameReader::new(),
            reply_timeout,
            device_path: String::new(),
        }
    }

    /// Path of the opened modem (empty for injected ports)
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Send one request and wait for its response.
    ///
    /// Returns the response payload after the status byte.
    async fn request(&mut self, frame_type: u8, payload: &[u8]) -> Result<Vec<u8>> {
        let frame = encode_frame(frame_type, payload)?;

        self.reader.clear();
        self.port
            .write_all(&frame)
            .await
            .map_err(|e| TurretLinkError::Serial(format!("Failed to write request: {}", e)))?;
        self.port
            .flush()
            .await
            .map_err(|e| TurretLinkError::Serial(format!("Failed to flush serial port: {}", e)))?;

        let expected = frame_type | RESPONSE_FLAG;
        let reply_timeout = self.reply_timeout;
        timeout(reply_timeout, self.await_response(expected))
            .await
            .map_err(|_| {
                TurretLinkError::Radio(format!(
                    "Modem did not answer request 0x{:02X} within {:?}",
                    frame_type, reply_timeout
                ))
            })?
    }

    async fn await_response(&mut self, expected: u8) -> Result<Vec<u8>> {
        let mut buf = [0u8; 64];
        loop {
            while let Some(frame) = self.reader.next_frame() {
                match frame {
                    Ok(frame) if frame.frame_type == expected => {
                        return match frame.payload.split_first() {
                            Some((&STATUS_OK, rest)) => Ok(rest.to_vec()),
                            Some((&status, _)) => Err(TurretLinkError::Radio(format!(
                                "Modem rejected request 0x{:02X} with status {}",
                                expected & !RESPONSE_FLAG,
                                status
                            ))),
                            None => Err(TurretLinkError::Radio("Empty modem response".to_string())),
                        };
                    }
                    Ok(frame) => {
                        debug!("Ignoring unexpected modem frame 0x{:02X}", frame.frame_type);
                    }
                    Err(e) => warn!("Discarding modem frame: {}", e),
                }
            }

            let n = self
                .port
                .read(&mut buf)
                .await
                .map_err(|e| TurretLinkError::Serial(format!("Failed to read response: {}", e)))?;
            if n == 0 {
                return Err(TurretLinkError::Serial("Modem port closed".to_string()));
            }
            self.reader.extend(&buf[..n]);
        }
    }
}

#[async_trait]
impl<P: SerialPortIO> RadioPort for SerialRadio<P> {
    async fn configure(&mut self, settings: &RadioSettings) -> Result<()> {
        let payload = [
            settings.channel,
            settings.data_rate.code(),
            settings.pa_level.code(),
            settings.retries,
        ];
        self.request(request::CONFIGURE, &payload).await?;
        Ok(())
    }

    async fn open_writing_pipe(&mut self, address: u64) -> Result<()> {
        self.request(request::OPEN_WRITING_PIPE, &encode_address(address)).await?;
        Ok(())
    }

    async fn open_reading_pipe(&mut self, pipe: u8, address: u64) -> Result<()> {
        let mut payload = vec![pipe];
        payload.extend_from_slice(&encode_address(address));
        self.request(request::OPEN_READING_PIPE, &payload).await?;
        Ok(())
    }

    async fn start_listening(&mut self) -> Result<()> {
        self.request(request::LISTEN, &[1]).await?;
        Ok(())
    }

    async fn stop_listening(&mut self) -> Result<()> {
        self.request(request::LISTEN, &[0]).await?;
        Ok(())
    }

    async fn write(&mut self, payload: &[u8]) -> Result<WriteOutcome> {
        let reply = self.request(request::WRITE, payload).await?;
        let Some((&acked, ack_payload)) = reply.split_first() else {
            return Err(TurretLinkError::Radio("Truncated write response".to_string()));
        };

        Ok(WriteOutcome {
            acked: acked != 0,
            ack_payload: (!ack_payload.is_empty()).then(|| ack_payload.to_vec()),
        })
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        let reply = self.request(request::READ, &[]).await?;
        Ok((!reply.is_empty()).then_some(reply))
    }

    async fn write_ack_payload(&mut self, pipe: u8, payload: &[u8]) -> Result<()> {
        let mut body = vec![pipe];
        body.extend_from_slice(payload);
        self.request(request::ACK_PAYLOAD, &body).await?;
        Ok(())
    }
}
