//! # Turret Link Library
//!
//! Command and telemetry link between a handheld controller and a
//! two-axis laser turret over nRF24-style packet radios.
//!
//! This library provides:
//! - The fixed-size command and telemetry packets and their wire format
//! - Two link strategies: telemetry piggybacked on acknowledgments, or a
//!   dedicated telemetry pipe with listen/transmit switching
//! - The turret node: command interpreter, servo motion and the auto-scan
//!   sequencer
//! - The controller node: gamepad input, long-press detection and the
//!   operator display
//! - Radio backends (USB-serial modem, in-process simulation) and a
//!   rotating JSONL telemetry log

pub mod config;
pub mod controller;
pub mod cue;
pub mod error;
pub mod link;
pub mod protocol;
pub mod radio;
pub mod simulation;
pub mod telemetry;
pub mod turret;
