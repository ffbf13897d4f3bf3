use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::local::MediaElement;
use crate::error::{BackendError, BackendResult};

/// A [`MediaElement`] whose clock is the tokio clock.
///
/// Used by the replay binary and by tests; with a paused runtime clock the
/// playhead advances exactly as far as the test advances time.
#[derive(Debug)]
pub struct SimulatedMedia {
    duration: f64,
    loaded_at: Instant,
    state: Mutex<SimState>,
}

#[derive(Debug, Default)]
struct SimState {
    anchor_position: f64,
    /// Set while playing: the instant `anchor_position` was taken.
    playing_since: Option<Instant>,
    blocked_plays: u32,
    failing_seeks: u32,
    faults: VecDeque<BackendError>,
    seeks: Vec<f64>,
    plays: u32,
}

impl SimulatedMedia {
    pub fn new(duration: f64) -> Self {
        Self {
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            loaded_at: Instant::now(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Report not-loaded until `delay` has passed.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.loaded_at = Instant::now() + delay;
        self
    }

    /// Refuse the next `count` play requests as blocked autoplay.
    pub fn block_autoplay(self, count: u32) -> Self {
        self.state.lock().blocked_plays = count;
        self
    }

    /// Reject the next `count` seek requests.
    pub fn fail_seeks(self, count: u32) -> Self {
        self.state.lock().failing_seeks = count;
        self
    }

    pub fn inject_fault(&self, fault: BackendError) {
        self.state.lock().faults.push_back(fault);
    }

    /// Seek targets accepted so far.
    pub fn seek_history(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }

    /// Successful play requests so far.
    pub fn play_count(&self) -> u32 {
        self.state.lock().plays
    }

    fn position_of(&self, state: &SimState) -> f64 {
        let position = match state.playing_since {
            Some(since) => state.anchor_position + since.elapsed().as_secs_f64(),
            None => state.anchor_position,
        };
        position.min(self.duration)
    }

    fn ended_at(&self, position: f64) -> bool {
        self.duration > 0.0 && position >= self.duration
    }
}

impl MediaElement for SimulatedMedia {
    fn is_loaded(&self) -> bool {
        Instant::now() >= self.loaded_at
    }

    fn position(&self) -> f64 {
        let state = self.state.lock();
        self.position_of(&state)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_paused(&self) -> bool {
        let state = self.state.lock();
        state.playing_since.is_none() || self.ended_at(self.position_of(&state))
    }

    fn has_ended(&self) -> bool {
        let state = self.state.lock();
        self.ended_at(self.position_of(&state))
    }

    fn set_paused(&self, paused: bool) -> BackendResult<()> {
        if !self.is_loaded() {
            return Err(BackendError::NotReady);
        }
        let mut state = self.state.lock();
        let position = self.position_of(&state);

        if paused {
            state.anchor_position = position;
            state.playing_since = None;
            return Ok(());
        }

        if state.blocked_plays > 0 {
            state.blocked_plays -= 1;
            return Err(BackendError::PlaybackBlocked);
        }
        // Playing at the end starts over.
        state.anchor_position = if self.ended_at(position) { 0.0 } else { position };
        state.playing_since = Some(Instant::now());
        state.plays += 1;
        Ok(())
    }

    fn set_position(&self, seconds: f64) -> BackendResult<()> {
        if !self.is_loaded() {
            return Err(BackendError::NotReady);
        }
        let mut state = self.state.lock();
        if state.failing_seeks > 0 {
            state.failing_seeks -= 1;
            return Err(BackendError::Rejected(format!("seek to {seconds:.1}s refused")));
        }
        let target = seconds.clamp(0.0, self.duration);
        state.anchor_position = target;
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
        state.seeks.push(target);
        Ok(())
    }

    fn take_fault(&self) -> Option<BackendError> {
        self.state.lock().faults.pop_front()
    }
}
