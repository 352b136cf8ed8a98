//! Scripted operator for the simulation.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use super::input::{InputSample, InputSource};
use crate::config::ScriptSegment;
use crate::error::Result;

/// Replays a list of timed segments.
///
/// Time starts at the first sample. After the last segment ends its values
/// stay in effect.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    script: Vec<ScriptSegment>,
    started: Option<Instant>,
}

impl ScriptedInput {
    #[must_use]
    pub fn new(script: Vec<ScriptSegment>) -> Self {
        Self {
            script,
            started: None,
        }
    }

    /// Sample in effect `elapsed` after the start.
    #[must_use]
    pub fn sample_at(&self, elapsed: Duration) -> InputSample {
        let mut end = Duration::ZERO;
        for segment in &self.script {
            end += Duration::from_millis(segment.hold_ms);
            if elapsed < end {
                return sample_of(segment);
            }
        }
        self.script.last().map(sample_of).unwrap_or_default()
    }
}

fn sample_of(segment: &ScriptSegment) -> InputSample {
    InputSample {
        joy_x: segment.joy_x,
        joy_y: segment.joy_y,
        button: segment.button,
    }
}

#[async_trait]
impl InputSource for ScriptedInput {
    async fn sample(&mut self) -> Result<InputSample> {
        let started = *self.started.get_or_insert_with(Instant::now);
        Ok(self.sample_at(started.elapsed()))
    }
}
