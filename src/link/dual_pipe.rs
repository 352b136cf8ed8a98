//! Two-pipe transport.
//!
//! Each node listens on its own address and writes to the peer's. A send
//! leaves receive mode for the duration of one frame, then resumes
//! listening, so a node never hears anything while it transmits.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::{poll_receive, LinkTransport};
use crate::error::Result;
use crate::protocol::packet::{Integrity, WirePacket};
use crate::radio::{RadioPort, RadioSettings, LINK_PIPE};

/// Strategy B transport.
pub struct DualPipeLink<R, Tx, Rx> {
    radio: R,
    tx_address: u64,
    integrity: Integrity,
    _packets: PhantomData<fn(Tx) -> Rx>,
}

impl<R: RadioPort, Tx: WirePacket, Rx: WirePacket> DualPipeLink<R, Tx, Rx> {
    /// Listen on `rx_address` and send to `tx_address`.
    ///
    /// # Errors
    ///
    /// Returns error if the radio rejects the configuration.
    pub async fn new(
        mut radio: R,
        settings: &RadioSettings,
        tx_address: u64,
        rx_address: u64,
        integrity: Integrity,
    ) -> Result<Self> {
        radio.configure(settings).await?;
        radio.open_reading_pipe(LINK_PIPE, rx_address).await?;
        radio.open_writing_pipe(tx_address).await?;
        radio.start_listening().await?;
        debug!(
            "Dual-pipe link: rx 0x{:010X}, tx 0x{:010X}",
            rx_address, tx_address
        );

        Ok(Self {
            radio,
            tx_address,
            integrity,
            _packets: PhantomData,
        })
    }

    async fn transmit(&mut self, payload: &[u8]) -> Result<bool> {
        self.radio.stop_listening().await?;
        self.radio.open_writing_pipe(self.tx_address).await?;
        let outcome = self.radio.write(payload).await;
        // Back to receive mode even if the write itself failed
        self.radio.start_listening().await?;
        Ok(outcome?.acked)
    }
}

#[async_trait]
impl<R, Tx, Rx> LinkTransport<Tx, Rx> for DualPipeLink<R, Tx, Rx>
where
    R: RadioPort,
    Tx: WirePacket,
    Rx: WirePacket,
{
    async fn send(&mut self, packet: &Tx) -> bool {
        let payload = self.integrity.seal(packet);

        match self.transmit(&payload).await {
            Ok(acked) => {
                if !acked {
                    trace!("Send to 0x{:010X} not acknowledged", self.tx_address);
                }
                acked
            }
            Err(e) => {
                warn!("Radio transmit failed: {}", e);
                false
            }
        }
    }

    async fn try_receive(&mut self, timeout: Duration) -> Option<Rx> {
        poll_receive(&mut self.radio, self.integrity, timeout).await
    }
}
