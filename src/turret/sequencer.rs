//! # Auto-Scan Sequencer
//!
//! Deterministic scan through four waypoint patterns.
//!
//! ```text
//! CenterInit → Vertical → Center → Horizontal → Center
//!            → DiagA → Center → DiagB → Complete → Done
//! ```
//!
//! [`AutoScanSequencer::next_step`] advances one step, updates the turret
//! state and returns what the driver must do: move the servos, switch the
//! laser, play a cue, report telemetry and hold. Time never passes inside
//! the sequencer, so tests can walk the whole scan instantly.

use std::time::Duration;

use crate::config::ScanConfig;
use crate::cue::Cue;
use crate::protocol::packet::Mode;
use crate::turret::TurretState;

/// Waypoint angles shared by every pattern
pub const WAYPOINTS: [i32; 9] = [-40, -30, -20, -10, 0, 10, 20, 30, 40];

/// Waypoint pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// `(0, w)`
    Vertical,
    /// `(w, 0)`
    Horizontal,
    /// `(w, w)`
    DiagA,
    /// `(w, reverse(w))`
    DiagB,
}

impl Pattern {
    /// Angle pair of waypoint `index`.
    #[must_use]
    pub fn waypoint(self, index: usize) -> (i32, i32) {
        let w = WAYPOINTS[index];
        match self {
            Pattern::Vertical => (0, w),
            Pattern::Horizontal => (w, 0),
            Pattern::DiagA => (w, w),
            Pattern::DiagB => (w, WAYPOINTS[WAYPOINTS.len() - 1 - index]),
        }
    }

    /// Telemetry mode reported at this pattern's waypoints.
    #[must_use]
    pub fn mode(self) -> Mode {
        match self {
            Pattern::Vertical => Mode::VerticalScan,
            Pattern::Horizontal => Mode::HorizontalScan,
            Pattern::DiagA => Mode::DiagScanA,
            Pattern::DiagB => Mode::DiagScanB,
        }
    }

    fn next(self) -> Option<Pattern> {
        match self {
            Pattern::Vertical => Some(Pattern::Horizontal),
            Pattern::Horizontal => Some(Pattern::DiagA),
            Pattern::DiagA => Some(Pattern::DiagB),
            Pattern::DiagB => None,
        }
    }
}

/// Sequencer phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CenterInit,
    /// Sweeping a pattern, at the given waypoint index
    Sweep(Pattern, usize),
    /// Re-centering before the given pattern
    Center(Pattern),
    Complete,
    Done,
}

/// One step of the sequence, to be applied by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStep {
    /// Angle pair to command
    pub angle_h: i32,
    pub angle_v: i32,
    pub laser_on: bool,
    /// Played after moving, before reporting
    pub cue: Option<Cue>,
    /// Hold before the next step
    pub dwell: Duration,
}

/// Step machine for one run of the auto-scan
#[derive(Debug, Clone)]
pub struct AutoScanSequencer {
    phase: Phase,
    timing: ScanConfig,
}

impl AutoScanSequencer {
    #[must_use]
    pub fn new(timing: ScanConfig) -> Self {
        Self {
            phase: Phase::CenterInit,
            timing,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Advance one step.
    ///
    /// Updates `state` to what the turret reports after the step and returns
    /// the step, or `None` once the sequence is done.
    ///
    /// # Examples
    ///
    /// ```
    /// use turret_link::config::ScanConfig;
    /// use turret_link::protocol::packet::Mode;
    /// use turret_link::turret::sequencer::AutoScanSequencer;
    /// use turret_link::turret::TurretState;
    ///
    /// let mut state = TurretState::default();
    /// let mut sequencer = AutoScanSequencer::new(ScanConfig::default());
    ///
    /// let first = sequencer.next_step(&mut state).unwrap();
    /// assert_eq!((first.angle_h, first.angle_v), (0, 0));
    /// assert_eq!(state.mode, Mode::Setup);
    ///
    /// let mut steps = 1;
    /// while sequencer.next_step(&mut state).is_some() {
    ///     steps += 1;
    /// }
    /// assert_eq!(steps, 41);
    /// assert_eq!(state.mode, Mode::Idle);
    /// ```
    pub fn next_step(&mut self, state: &mut TurretState) -> Option<ScanStep> {
        let ms = Duration::from_millis;

        let step = match self.phase {
            Phase::CenterInit => {
                self.phase = Phase::Sweep(Pattern::Vertical, 0);
                state.laser_on = true;
                state.point(0, 0, Mode::Setup);
                ScanStep::new(0, 0, true, Some(Cue::ScanStart), ms(self.timing.setup_hold_ms))
            }
            Phase::Sweep(pattern, index) => {
                let (h, v) = pattern.waypoint(index);
                self.phase = if index + 1 < WAYPOINTS.len() {
                    Phase::Sweep(pattern, index + 1)
                } else {
                    match pattern.next() {
                        Some(next) => Phase::Center(next),
                        None => Phase::Complete,
                    }
                };
                state.point(h, v, pattern.mode());
                ScanStep::new(h, v, true, Some(Cue::Waypoint), ms(self.timing.dwell_ms))
            }
            Phase::Center(next) => {
                self.phase = Phase::Sweep(next, 0);
                state.point(0, 0, Mode::Setup);
                ScanStep::new(0, 0, true, None, ms(self.timing.recenter_hold_ms))
            }
            Phase::Complete => {
                self.phase = Phase::Done;
                state.laser_on = false;
                state.manual_h = 0.0;
                state.manual_v = 0.0;
                state.point(0, 0, Mode::Idle);
                ScanStep::new(0, 0, false, Some(Cue::ScanComplete), ms(self.timing.final_hold_ms))
            }
            Phase::Done => return None,
        };

        Some(step)
    }
}

impl ScanStep {
    fn new(angle_h: i32, angle_v: i32, laser_on: bool, cue: Option<Cue>, dwell: Duration) -> Self {
        Self {
            angle_h,
            angle_v,
            laser_on,
            cue,
            dwell,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run the whole sequence, collecting (step, reported mode) pairs.
    fn run_all(state: &mut TurretState) -> Vec<(ScanStep, Mode)> {
        let mut sequencer = AutoScanSequencer::new(ScanConfig::default());
        let mut steps = Vec::new();
        while let Some(step) = sequencer.next_step(state) {
            steps.push((step, state.mode));
        }
        steps
    }

    #[test]
    fn test_diag_b_reverses_vertical() {
        assert_eq!(Pattern::DiagB.waypoint(0), (-40, 40));
        assert_eq!(Pattern::DiagB.waypoint(4), (0, 0));
        assert_eq!(Pattern::DiagB.waypoint(8), (40, -40));
    }

    #[test]
    fn test_first_step_centers_from_manual_position() {
        let mut state = TurretState {
            manual_h: 15.0,
            angle_h: 15,
            ..TurretState::default()
        };
        let mut sequencer = AutoScanSequencer::new(ScanConfig::default());

        let step = sequencer.next_step(&mut state).unwrap();

        assert_eq!((step.angle_h, step.angle_v), (0, 0));
        assert_eq!((state.angle_h, state.angle_v), (0, 0));
        assert_eq!(state.mode, Mode::Setup);
        assert!(state.laser_on);
        assert_eq!(step.cue, Some(Cue::ScanStart));
        assert_eq!(step.dwell, Duration::from_millis(2000));
    }

    #[test]
    fn test_step_order() {
        let mut state = TurretState::default();
        let steps = run_all(&mut state);
        assert_eq!(steps.len(), 41);

        let angles: Vec<(i32, i32)> = steps.iter().map(|(s, _)| (s.angle_h, s.angle_v)).collect();
        let mut expected = vec![(0, 0)];
        for pattern in [Pattern::Vertical, Pattern::Horizontal, Pattern::DiagA, Pattern::DiagB] {
            expected.extend((0..WAYPOINTS.len()).map(|i| pattern.waypoint(i)));
            expected.push((0, 0));
        }
        assert_eq!(angles, expected);
    }

    #[test]
    fn test_modes_identify_phase() {
        let mut state = TurretState::default();
        let steps = run_all(&mut state);

        let modes: Vec<Mode> = steps.iter().map(|(_, mode)| *mode).collect();
        assert_eq!(modes[0], Mode::Setup);
        assert!(modes[1..10].iter().all(|m| *m == Mode::VerticalScan));
        assert_eq!(modes[10], Mode::Setup);
        assert!(modes[11..20].iter().all(|m| *m == Mode::HorizontalScan));
        assert_eq!(modes[20], Mode::Setup);
        assert!(modes[21..30].iter().all(|m| *m == Mode::DiagScanA));
        assert_eq!(modes[30], Mode::Setup);
        assert!(modes[31..40].iter().all(|m| *m == Mode::DiagScanB));
        assert_eq!(modes[40], Mode::Idle);

        // Each scan mode appears only at its own pattern's waypoints
        for (step, mode) in &steps {
            match mode {
                Mode::HorizontalScan => assert_eq!(step.angle_v, 0),
                Mode::VerticalScan => assert_eq!(step.angle_h, 0),
                Mode::DiagScanA => assert_eq!(step.angle_h, step.angle_v),
                Mode::DiagScanB => assert_eq!(step.angle_h, -step.angle_v),
                Mode::Idle | Mode::Setup => assert_eq!((step.angle_h, step.angle_v), (0, 0)),
                Mode::Manual => panic!("manual mode during scan"),
            }
        }
    }

    #[test]
    fn test_cues_and_dwells() {
        let mut state = TurretState::default();
        let steps = run_all(&mut state);

        let waypoint_cues = steps.iter().filter(|(s, _)| s.cue == Some(Cue::Waypoint)).count();
        assert_eq!(waypoint_cues, 36);
        assert_eq!(steps[10].0.cue, None);
        assert_eq!(steps[10].0.dwell, Duration::from_millis(500));
        assert_eq!(steps[1].0.dwell, Duration::from_millis(3000));
        assert_eq!(steps[40].0.cue, Some(Cue::ScanComplete));
        assert_eq!(steps[40].0.dwell, Duration::from_millis(1000));

        let total: Duration = steps.iter().map(|(s, _)| s.dwell).sum();
        assert_eq!(total, Duration::from_millis(2000 + 36 * 3000 + 3 * 500 + 1000));
    }

    #[test]
    fn test_terminates_idle_laser_off_at_origin() {
        let mut state = TurretState {
            manual_h: 15.0,
            manual_v: -7.0,
            angle_h: 15,
            angle_v: -7,
            laser_on: false,
            mode: Mode::Manual,
        };
        let steps = run_all(&mut state);

        assert!(steps[..40].iter().all(|(s, _)| s.laser_on));
        assert!(!steps[40].0.laser_on);
        assert_eq!(state.mode, Mode::Idle);
        assert!(!state.laser_on);
        assert_eq!((state.angle_h, state.angle_v), (0, 0));
        assert_eq!((state.manual_h, state.manual_v), (0.0, 0.0));
        assert!(state.telemetry(0x42).is_ready());
    }

    #[test]
    fn test_done_stays_done() {
        let mut state = TurretState::default();
        let mut sequencer = AutoScanSequencer::new(ScanConfig::default());
        while sequencer.next_step(&mut state).is_some() {}

        assert_eq!(sequencer.phase(), Phase::Done);
        assert!(sequencer.next_step(&mut state).is_none());
    }
}
