//! Single-pipe transport with acknowledgment-payload telemetry.
//!
//! The listening node (turret) never transmits on its own: it preloads its
//! latest packet as the ack payload, which the radio returns with the next
//! acknowledgment. The initiating node (controller) therefore always sees
//! the reply prepared before its current command, one exchange behind.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, trace};

use super::{open_payload, poll_receive, LinkTransport};
use crate::error::Result;
use crate::protocol::packet::{Integrity, WirePacket};
use crate::radio::{RadioPort, RadioSettings, LINK_PIPE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// Listens on the link pipe and answers through ack payloads
    Listener,
    /// Transmits to the link pipe and collects ack payloads
    Initiator,
}

/// Strategy A transport.
pub struct PiggybackLink<R, Tx, Rx> {
    radio: R,
    side: Side,
    integrity: Integrity,
    /// Ack payload returned by the initiator's last successful send
    latest: Option<Rx>,
    _tx: PhantomData<fn(Tx)>,
}

impl<R: RadioPort, Tx: WirePacket, Rx: WirePacket> PiggybackLink<R, Tx, Rx> {
    /// Set up the listening side on `address`.
    ///
    /// # Errors
    ///
    /// Returns error if the radio rejects the configuration.
    pub async fn listener(
        mut radio: R,
        settings: &RadioSettings,
        address: u64,
        integrity: Integrity,
    ) -> Result<Self> {
        radio.configure(settings).await?;
        radio.open_reading_pipe(LINK_PIPE, address).await?;
        radio.start_listening().await?;
        debug!("Piggyback listener on 0x{:010X}", address);

        Ok(Self::with_side(radio, Side::Listener, integrity))
    }

    /// Set up the initiating side towards `address`.
    ///
    /// # Errors
    ///
    /// Returns error if the radio rejects the configuration.
    pub async fn initiator(
        mut radio: R,
        settings: &RadioSettings,
        address: u64,
        integrity: Integrity,
    ) -> Result<Self> {
        radio.configure(settings).await?;
        radio.open_writing_pipe(address).await?;
        radio.stop_listening().await?;
        debug!("Piggyback initiator towards 0x{:010X}", address);

        Ok(Self::with_side(radio, Side::Initiator, integrity))
    }

    fn with_side(radio: R, side: Side, integrity: Integrity) -> Self {
        Self {
            radio,
            side,
            integrity,
            latest: None,
            _tx: PhantomData,
        }
    }
}

#[async_trait]
impl<R, Tx, Rx> LinkTransport<Tx, Rx> for PiggybackLink<R, Tx, Rx>
where
    R: RadioPort,
    Tx: WirePacket,
    Rx: WirePacket,
{
    async fn send(&mut self, packet: &Tx) -> bool {
        let payload = self.integrity.seal(packet);

        match self.side {
            Side::Listener => match self.radio.write_ack_payload(LINK_PIPE, &payload).await {
                Ok(()) => true,
                Err(e) => {
                    debug!("Ack payload rejected: {}", e);
                    false
                }
            },
            Side::Initiator => match self.radio.write(&payload).await {
                Ok(outcome) => {
                    self.latest = outcome
                        .ack_payload
                        .and_then(|ack| open_payload(self.integrity, &ack));
                    if !outcome.acked {
                        trace!("Send not acknowledged");
                    }
                    outcome.acked
                }
                Err(e) => {
                    debug!("Radio write failed: {}", e);
                    self.latest = None;
                    false
                }
            },
        }
    }

    async fn try_receive(&mut self, timeout: Duration) -> Option<Rx> {
        match self.side {
            Side::Listener => poll_receive(&mut self.radio, self.integrity, timeout).await,
            // The reply already arrived with the last acknowledgment
            Side::Initiator => self.latest.take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataRate, PaLevel};
    use crate::protocol::packet::{Action, CommandPacket, Mode, TelemetryPacket};
    use crate::radio::sim::{Ether, SimulatedRadio};

    const ADDRESS: u64 = 0xE8E8F0F0E1;

    type Turret = PiggybackLink<SimulatedRadio, TelemetryPacket, CommandPacket>;
    type Controller = PiggybackLink<SimulatedRadio, CommandPacket, TelemetryPacket>;

    fn settings() -> RadioSettings {
        RadioSettings {
            channel: 5,
            data_rate: DataRate::Mbps1,
            pa_level: PaLevel::Max,
            retries: 15,
        }
    }

    async fn pair(ether: &Ether, integrity: Integrity) -> (Turret, Controller) {
        let turret = PiggybackLink::listener(ether.radio(), &settings(), ADDRESS, integrity)
            .await
            .unwrap();
        let controller = PiggybackLink::initiator(ether.radio(), &settings(), ADDRESS, integrity)
            .await
            .unwrap();
        (turret, controller)
    }

    fn telemetry(angle_h: i32) -> TelemetryPacket {
        TelemetryPacket::new(0x42, angle_h, 0, Mode::Manual, false)
    }

    fn command(joy_x: u8) -> CommandPacket {
        CommandPacket::new(0x42, joy_x, 128, Action::None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_exchange_has_no_reply() {
        let ether = Ether::new();
        let (mut turret, mut controller) = pair(&ether, Integrity::None).await;

        assert!(controller.send(&command(128)).await);
        assert_eq!(controller.try_receive(Duration::ZERO).await, None);
        assert_eq!(turret.try_receive(Duration::ZERO).await, Some(command(128)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_is_one_exchange_behind() {
        let ether = Ether::new();
        let (mut turret, mut controller) = pair(&ether, Integrity::None).await;

        assert!(turret.send(&telemetry(0)).await);

        assert!(controller.send(&command(200)).await);
        assert_eq!(controller.try_receive(Duration::ZERO).await, Some(telemetry(0)));

        // Turret handles the command and preloads its new state
        assert_eq!(turret.try_receive(Duration::ZERO).await, Some(command(200)));
        assert!(turret.send(&telemetry(-1)).await);

        assert!(controller.send(&command(200)).await);
        assert_eq!(controller.try_receive(Duration::ZERO).await, Some(telemetry(-1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_is_returned_once() {
        let ether = Ether::new();
        let (mut turret, mut controller) = pair(&ether, Integrity::None).await;

        assert!(turret.send(&telemetry(7)).await);
        assert!(controller.send(&command(128)).await);

        assert_eq!(controller.try_receive(Duration::ZERO).await, Some(telemetry(7)));
        assert_eq!(controller.try_receive(Duration::ZERO).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_send_reports_false() {
        let ether = Ether::new();
        let (mut turret, mut controller) = pair(&ether, Integrity::None).await;
        assert!(turret.send(&telemetry(3)).await);

        ether.drop_next(1);
        assert!(!controller.send(&command(128)).await);
        assert_eq!(controller.try_receive(Duration::ZERO).await, None);
        assert_eq!(turret.try_receive(Duration::ZERO).await, None);

        // The preloaded reply survives the lost frame
        assert!(controller.send(&command(128)).await);
        assert_eq!(controller.try_receive(Duration::ZERO).await, Some(telemetry(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_waits_up_to_timeout() {
        let ether = Ether::new();
        let (mut turret, _controller) = pair(&ether, Integrity::None).await;

        let start = tokio::time::Instant::now();
        assert_eq!(turret.try_receive(Duration::from_millis(5)).await, None);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_crc8_sealed_exchange() {
        let ether = Ether::new();
        let (mut turret, mut controller) = pair(&ether, Integrity::Crc8).await;

        assert!(turret.send(&telemetry(-12)).await);
        assert!(controller.send(&command(10)).await);

        assert_eq!(turret.try_receive(Duration::ZERO).await, Some(command(10)));
        assert_eq!(controller.try_receive(Duration::ZERO).await, Some(telemetry(-12)));
    }
}
