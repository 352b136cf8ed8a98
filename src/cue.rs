//! # Audible Cues
//!
//! Buzzer patterns played by both nodes. A tone is fire-and-forget; a cue
//! with several notes waits `pause_ms` after starting each one.

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// One buzzer tone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub frequency_hz: u32,
    pub duration_ms: u64,
    /// Wait after starting this note before the next one
    pub pause_ms: u64,
}

const fn note(frequency_hz: u32, duration_ms: u64, pause_ms: u64) -> Note {
    Note {
        frequency_hz,
        duration_ms,
        pause_ms,
    }
}

/// Named buzzer patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    /// Turret powered up
    TurretStartup,
    /// Auto-scan sequence begins
    ScanStart,
    /// Turret reached a scan waypoint
    Waypoint,
    /// Turret finished the sequence
    ScanComplete,
    /// Controller powered up
    ControllerStartup,
    /// Short press toggled the laser
    LaserToggle,
    /// Long press sent the auto trigger
    AutoStart,
    /// Controller saw the turret report ready
    AutoFinished,
}

impl Cue {
    /// Notes making up this cue.
    ///
    /// # Examples
    ///
    /// ```
    /// use turret_link::cue::Cue;
    ///
    /// let notes = Cue::ScanComplete.notes();
    /// assert_eq!(notes.len(), 2);
    /// assert_eq!(notes[0].frequency_hz, 3000);
    /// ```
    #[must_use]
    pub fn notes(self) -> &'static [Note] {
        const TURRET_STARTUP: [Note; 1] = [note(2000, 200, 0)];
        const SCAN_START: [Note; 1] = [note(1000, 500, 0)];
        const WAYPOINT: [Note; 1] = [note(4000, 30, 0)];
        const SCAN_COMPLETE: [Note; 2] = [note(3000, 100, 150), note(3000, 100, 0)];
        const CONTROLLER_STARTUP: [Note; 1] = [note(2000, 100, 0)];
        const LASER_TOGGLE: [Note; 1] = [note(4000, 50, 0)];
        const AUTO_START: [Note; 1] = [note(1000, 500, 0)];
        const AUTO_FINISHED: [Note; 2] = [note(3000, 300, 300), note(3000, 300, 0)];

        match self {
            Cue::TurretStartup => &TURRET_STARTUP,
            Cue::ScanStart => &SCAN_START,
            Cue::Waypoint => &WAYPOINT,
            Cue::ScanComplete => &SCAN_COMPLETE,
            Cue::ControllerStartup => &CONTROLLER_STARTUP,
            Cue::LaserToggle => &LASER_TOGGLE,
            Cue::AutoStart => &AUTO_START,
            Cue::AutoFinished => &AUTO_FINISHED,
        }
    }
}

/// Piezo buzzer
pub trait Buzzer: Send {
    /// Start a tone; returns immediately.
    fn tone(&mut self, frequency_hz: u32, duration: Duration);
}

/// Buzzer that only logs, for hosts without one
#[derive(Debug, Clone, Copy)]
pub struct TracingBuzzer {
    node: &'static str,
}

impl TracingBuzzer {
    #[must_use]
    pub fn new(node: &'static str) -> Self {
        Self { node }
    }
}

impl Buzzer for TracingBuzzer {
    fn tone(&mut self, frequency_hz: u32, duration: Duration) {
        debug!("[{}] tone {} Hz for {:?}", self.node, frequency_hz, duration);
    }
}

/// Play every note of `cue`, waiting out the pauses between them.
pub async fn play<B: Buzzer + ?Sized>(buzzer: &mut B, cue: Cue) {
    for note in cue.notes() {
        buzzer.tone(note.frequency_hz, Duration::from_millis(note.duration_ms));
        if note.pause_ms > 0 {
            sleep(Duration::from_millis(note.pause_ms)).await;
        }
    }
}
