//! # Error Types
//!
//! Custom error types for Turret Link using `thiserror`.
//!
//! Only startup and configuration failures travel through these types at
//! runtime. Losses on the radio link are absorbed by the transports and show
//! up as stale telemetry instead.

use thiserror::Error;

/// Main error type for Turret Link
#[derive(Debug, Error)]
pub enum TurretLinkError {
    /// Packet decoding errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Radio errors (initialisation, modem replies)
    #[error("Radio error: {0}")]
    Radio(String),

    /// No serial radio modem could be opened
    #[error("No radio modem found (tried: {0})")]
    SerialPortNotFound(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Controller input device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No usable gamepad was found
    #[error("No gamepad with a stick and a south button found")]
    ControllerNotFound,

    /// Telemetry log errors
    #[error("Telemetry log error: {0}")]
    Telemetry(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A node task panicked or was cancelled
    #[error("Node task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias for Turret Link
pub type Result<T> = std::result::Result<T, TurretLinkError>;
