//! # Simulated Radio
//!
//! An in-process "ether" shared by any number of [`SimulatedRadio`]s.
//!
//! It models the parts of an nRF24 pair the link depends on:
//! - Address routing to a listening radio's reading pipe
//! - Channel and data-rate matching
//! - Automatic acknowledgment carrying the receiver's preloaded ack payload
//! - A 3-deep RX FIFO that discards its oldest entry on overflow
//!
//! Frame loss can be injected with [`Ether::drop_next`].

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

use super::{
    RadioPort, RadioSettings, WriteOutcome, MAX_PAYLOAD_SIZE, PIPE_COUNT, RX_FIFO_DEPTH,
};
use crate::error::{Result, TurretLinkError};

#[derive(Debug, Default)]
struct Station {
    settings: Option<RadioSettings>,
    listening: bool,
    writing_address: Option<u64>,
    reading_pipes: [Option<u64>; PIPE_COUNT as usize],
    ack_payloads: [Option<Vec<u8>>; PIPE_COUNT as usize],
    rx_fifo: VecDeque<Vec<u8>>,
    overflow_drops: u64,
}

#[derive(Debug, Default)]
struct EtherState {
    stations: Vec<Station>,
    drop_next: usize,
    frames_lost: u64,
}

/// Shared radio medium.
///
/// # Examples
///
/// ```
/// use turret_link::radio::sim::Ether;
///
/// let ether = Ether::new();
/// let turret_radio = ether.radio();
/// let controller_radio = ether.radio();
/// # let _ = (turret_radio, controller_radio);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Ether {
    state: Arc<Mutex<EtherState>>,
}

impl Ether {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new radio to this ether.
    #[must_use]
    pub fn radio(&self) -> SimulatedRadio {
        let mut state = self.lock();
        state.stations.push(Station::default());
        SimulatedRadio {
            ether: self.clone(),
            station: state.stations.len() - 1,
        }
    }

    /// Lose the next `count` transmitted frames, retries included.
    pub fn drop_next(&self, count: usize) {
        self.lock().drop_next += count;
    }

    /// Frames lost to injected drops or missing receivers.
    #[must_use]
    pub fn frames_lost(&self) -> u64 {
        self.lock().frames_lost
    }

    /// Payloads discarded because `radio`'s RX FIFO was full.
    #[must_use]
    pub fn overflow_drops(&self, radio: &SimulatedRadio) -> u64 {
        self.lock().stations[radio.station].overflow_drops
    }

    /// Payloads waiting in `radio`'s RX FIFO.
    #[must_use]
    pub fn pending(&self, radio: &SimulatedRadio) -> usize {
        self.lock().stations[radio.station].rx_fifo.len()
    }

    fn lock(&self) -> MutexGuard<'_, EtherState> {
        // A poisoned ether only means a test panicked mid-write; the data is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One radio attached to an [`Ether`].
#[derive(Debug)]
pub struct SimulatedRadio {
    ether: Ether,
    station: usize,
}

fn check_pipe(pipe: u8) -> Result<usize> {
    if pipe >= PIPE_COUNT {
        return Err(TurretLinkError::Radio(format!("Pipe {} out of range", pipe)));
    }
    Ok(pipe as usize)
}

fn check_payload(payload: &[u8]) -> Result<()> {
    if payload.is_empty() || payload.len() > MAX_PAYLOAD_SIZE {
        return Err(TurretLinkError::Radio(format!(
            "Payload size {} outside 1..={}",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

#[async_trait]
impl RadioPort for SimulatedRadio {
    async fn configure(&mut self, settings: &RadioSettings) -> Result<()> {
        self.ether.lock().stations[self.station].settings = Some(*settings);
        Ok(())
    }

    async fn open_writing_pipe(&mut self, address: u64) -> Result<()> {
        self.ether.lock().stations[self.station].writing_address = Some(address);
        Ok(())
    }

    async fn open_reading_pipe(&mut self, pipe: u8, address: u64) -> Result<()> {
        let pipe = check_pipe(pipe)?;
        self.ether.lock().stations[self.station].reading_pipes[pipe] = Some(address);
        Ok(())
    }

    async fn start_listening(&mut self) -> Result<()> {
        self.ether.lock().stations[self.station].listening = true;
        Ok(())
    }

    async fn stop_listening(&mut self) -> Result<()> {
        self.ether.lock().stations[self.station].listening = false;
        Ok(())
    }

    async fn write(&mut self, payload: &[u8]) -> Result<WriteOutcome> {
        check_payload(payload)?;

        let mut state = self.ether.lock();
        let sender = &state.stations[self.station];

        let settings = sender
            .settings
            .ok_or_else(|| TurretLinkError::Radio("Radio not configured".to_string()))?;
        if sender.listening {
            return Err(TurretLinkError::Radio("Cannot write while listening".to_string()));
        }
        let address = sender
            .writing_address
            .ok_or_else(|| TurretLinkError::Radio("No writing pipe open".to_string()))?;

        if state.drop_next > 0 {
            state.drop_next -= 1;
            state.frames_lost += 1;
            trace!("Dropped frame to 0x{:010X} (injected loss)", address);
            return Ok(WriteOutcome::lost());
        }

        let receiver = state.stations.iter().enumerate().find_map(|(index, station)| {
            if index == self.station || !station.listening {
                return None;
            }
            let peer = station.settings?;
            if peer.channel != settings.channel || peer.data_rate != settings.data_rate {
                return None;
            }
            station
                .reading_pipes
                .iter()
                .position(|pipe| *pipe == Some(address))
                .map(|pipe| (index, pipe))
        });

        let Some((index, pipe)) = receiver else {
            state.frames_lost += 1;
            trace!("No listener for 0x{:010X}", address);
            return Ok(WriteOutcome::lost());
        };

        let station = &mut state.stations[index];
        if station.rx_fifo.len() >= RX_FIFO_DEPTH {
            station.rx_fifo.pop_front();
            station.overflow_drops += 1;
            debug!("RX FIFO full on station {}, oldest payload discarded", index);
        }
        station.rx_fifo.push_back(payload.to_vec());

        Ok(WriteOutcome {
            acked: true,
            ack_payload: station.ack_payloads[pipe].take(),
        })
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.ether.lock().stations[self.station].rx_fifo.pop_front())
    }

    async fn write_ack_payload(&mut self, pipe: u8, payload: &[u8]) -> Result<()> {
        let pipe = check_pipe(pipe)?;
        check_payload(payload)?;
        self.ether.lock().stations[self.station].ack_payloads[pipe] = Some(payload.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataRate, PaLevel};

    const ADDRESS: u64 = 0xE8E8F0F0E1;

    fn settings(channel: u8) -> RadioSettings {
        RadioSettings {
            channel,
            data_rate: DataRate::Mbps1,
            pa_level: PaLevel::Max,
            retries: 15,
        }
    }

    async fn pair(ether: &Ether) -> (SimulatedRadio, SimulatedRadio) {
        let mut tx = ether.radio();
        let mut rx = ether.radio();
        tx.configure(&settings(5)).await.unwrap();
        rx.configure(&settings(5)).await.unwrap();
        tx.open_writing_pipe(ADDRESS).await.unwrap();
        rx.open_reading_pipe(1, ADDRESS).await.unwrap();
        rx.start_listening().await.unwrap();
        (tx, rx)
    }

    #[tokio::test]
    async fn test_write_delivers_and_acks() {
        let ether = Ether::new();
        let (mut tx, mut rx) = pair(&ether).await;

        let outcome = tx.write(&[1, 2, 3, 4]).await.unwrap();
        assert!(outcome.acked);
        assert_eq!(outcome.ack_payload, None);
        assert_eq!(rx.read().await.unwrap(), Some(vec![1, 2, 3, 4]));
        assert_eq!(rx.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ack_payload_is_consumed_once() {
        let ether = Ether::new();
        let (mut tx, mut rx) = pair(&ether).await;

        rx.write_ack_payload(1, &[9, 9]).await.unwrap();

        let first = tx.write(&[1]).await.unwrap();
        assert_eq!(first.ack_payload, Some(vec![9, 9]));

        let second = tx.write(&[2]).await.unwrap();
        assert!(second.acked);
        assert_eq!(second.ack_payload, None);
    }

    #[tokio::test]
    async fn test_ack_payload_replaced_not_queued() {
        let ether = Ether::new();
        let (mut tx, mut rx) = pair(&ether).await;

        rx.write_ack_payload(1, &[1]).await.unwrap();
        rx.write_ack_payload(1, &[2]).await.unwrap();

        let outcome = tx.write(&[0]).await.unwrap();
        assert_eq!(outcome.ack_payload, Some(vec![2]));
    }

    #[tokio::test]
    async fn test_rx_fifo_overflow_discards_oldest() {
        let ether = Ether::new();
        let (mut tx, mut rx) = pair(&ether).await;

        for byte in 1..=5u8 {
            assert!(tx.write(&[byte]).await.unwrap().acked);
        }

        assert_eq!(ether.overflow_drops(&rx), 2);
        assert_eq!(ether.pending(&rx), RX_FIFO_DEPTH);
        assert_eq!(rx.read().await.unwrap(), Some(vec![3]));
        assert_eq!(rx.read().await.unwrap(), Some(vec![4]));
        assert_eq!(rx.read().await.unwrap(), Some(vec![5]));
    }

    #[tokio::test]
    async fn test_no_listener_is_not_acked() {
        let ether = Ether::new();
        let (mut tx, mut rx) = pair(&ether).await;
        rx.stop_listening().await.unwrap();

        let outcome = tx.write(&[1]).await.unwrap();
        assert!(!outcome.acked);
        assert_eq!(ether.frames_lost(), 1);
    }

    #[tokio::test]
    async fn test_channel_mismatch_is_not_acked() {
        let ether = Ether::new();
        let (mut tx, mut rx) = pair(&ether).await;
        rx.configure(&settings(76)).await.unwrap();

        assert!(!tx.write(&[1]).await.unwrap().acked);
        assert_eq!(rx.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_injected_drop() {
        let ether = Ether::new();
        let (mut tx, mut rx) = pair(&ether).await;
        ether.drop_next(1);

        assert!(!tx.write(&[1]).await.unwrap().acked);
        assert!(tx.write(&[2]).await.unwrap().acked);
        assert_eq!(rx.read().await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_write_while_listening_is_an_error() {
        let ether = Ether::new();
        let (_tx, mut rx) = pair(&ether).await;
        rx.open_writing_pipe(ADDRESS).await.unwrap();

        assert!(rx.write(&[1]).await.is_err());
    }

    #[tokio::test]
    async fn test_write_unconfigured_is_an_error() {
        let ether = Ether::new();
        let mut radio = ether.radio();
        radio.open_writing_pipe(ADDRESS).await.unwrap();
        assert!(radio.write(&[1]).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let ether = Ether::new();
        let (mut tx, _rx) = pair(&ether).await;
        assert!(tx.write(&[0u8; MAX_PAYLOAD_SIZE + 1]).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_pipe_rejected() {
        let ether = Ether::new();
        let mut radio = ether.radio();
        assert!(radio.open_reading_pipe(PIPE_COUNT, ADDRESS).await.is_err());
        assert!(radio.write_ack_payload(7, &[1]).await.is_err());
    }

    #[tokio::test]
    async fn test_sender_does_not_hear_itself() {
        let ether = Ether::new();
        let mut radio = ether.radio();
        radio.configure(&settings(5)).await.unwrap();
        radio.open_reading_pipe(1, ADDRESS).await.unwrap();
        radio.open_writing_pipe(ADDRESS).await.unwrap();

        assert!(!radio.write(&[1]).await.unwrap().acked);
    }
}
