//! # Telemetry Reporter
//!
//! Serializes the turret state and pushes it through the link.

use tracing::{debug, trace};

use crate::link::LinkTransport;
use crate::protocol::packet::{CommandPacket, Mode, TelemetryPacket};
use crate::turret::TurretState;

/// Publishes turret telemetry and remembers the last packet published
#[derive(Debug)]
pub struct TelemetryReporter {
    device_id: u8,
    last: TelemetryPacket,
    sent: u64,
    failed: u64,
}

impl TelemetryReporter {
    #[must_use]
    pub fn new(device_id: u8) -> Self {
        Self {
            device_id,
            last: TelemetryPacket::new(device_id, 0, 0, Mode::Manual, false),
            sent: 0,
            failed: 0,
        }
    }

    /// Last packet handed to the link
    #[must_use]
    pub fn last(&self) -> TelemetryPacket {
        self.last
    }

    /// Sends the link layer accepted
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Sends that the link layer reported as failed
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Publish the current state.
    ///
    /// Returns the link's success flag; failures are only counted, the next
    /// report supersedes them.
    pub async fn report<L>(&mut self, link: &mut L, state: &TurretState) -> bool
    where
        L: LinkTransport<TelemetryPacket, CommandPacket> + ?Sized,
    {
        let packet = state.telemetry(self.device_id);
        if packet.mode != self.last.mode {
            debug!("Telemetry mode {} -> {}", self.last.mode.name(), packet.mode.name());
        }
        self.last = packet;
        self.send(link).await
    }

    /// Publish the last packet again.
    ///
    /// With ack-payload transport each inbound command consumes the preloaded
    /// reply, so this refills it.
    pub async fn repeat<L>(&mut self, link: &mut L) -> bool
    where
        L: LinkTransport<TelemetryPacket, CommandPacket> + ?Sized,
    {
        self.send(link).await
    }

    async fn send<L>(&mut self, link: &mut L) -> bool
    where
        L: LinkTransport<TelemetryPacket, CommandPacket> + ?Sized,
    {
        let ok = link.send(&self.last).await;
        if ok {
            self.sent += 1;
        } else {
            self.failed += 1;
            trace!("Telemetry send failed ({} so far)", self.failed);
        }
        ok
    }
}
