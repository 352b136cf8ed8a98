//! # Link Protocol Module
//!
//! Fixed-layout packets exchanged between the controller and the turret.
//!
//! This module handles:
//! - Command packets (controller → turret, 4 bytes)
//! - Telemetry packets (turret → controller, 5 bytes)
//! - The optional CRC-8 integrity trailer

pub mod crc;
pub mod packet;
