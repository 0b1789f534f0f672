//! Scheduling clock. Tracks the session position against the sound
//! engine's clock and hands out note triggers stamped with the engine time
//! they must sound at.
//!
//! The transport never reads a clock itself: every call takes the engine
//! time `now`, so a session is fully driven by its own engine and tests can
//! advance time by hand.

use serde::Serialize;

use crate::timemap::ScheduledNote;

/// Playback state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// A trigger ready to be queued on the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DueNote {
    pub note: ScheduledNote,
    /// Absolute engine time of the onset
    pub audio_time: f64,
}

#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    /// Engine time at which session position 0 occurs
    origin: f64,
    /// Session position frozen by a pause
    paused_at: f64,
    queue: Vec<ScheduledNote>,
    /// Next queue entry not yet handed out
    cursor: usize,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            origin: 0.0,
            paused_at: 0.0,
            queue: Vec::new(),
            cursor: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Replace the schedule. The transport is left stopped.
    pub fn load(&mut self, mut schedule: Vec<ScheduledNote>) {
        schedule.sort_by(|a, b| a.at_secs.total_cmp(&b.at_secs));
        self.queue = schedule;
        self.cursor = 0;
        self.paused_at = 0.0;
        self.state = TransportState::Stopped;
    }

    /// Start from position 0, `delay_secs` after `now`.
    pub fn start(&mut self, now: f64, delay_secs: f64) {
        self.origin = now + delay_secs.max(0.0);
        self.paused_at = 0.0;
        self.cursor = 0;
        self.state = TransportState::Playing;
        log::debug!("transport started at engine time {:.3}", self.origin);
    }

    /// Freeze the position. Triggers at or after the frozen position are
    /// handed out again on resume; the engine is expected to have dropped
    /// whatever was queued for them.
    pub fn pause(&mut self, now: f64) {
        if self.state != TransportState::Playing {
            return;
        }
        self.paused_at = (now - self.origin).max(0.0);
        self.cursor = self.queue.partition_point(|n| n.at_secs < self.paused_at);
        self.state = TransportState::Paused;
        log::debug!("transport paused at {:.3}s, {} triggers pending", self.paused_at, self.queue.len() - self.cursor);
    }

    /// Continue from the frozen position.
    pub fn resume(&mut self, now: f64) {
        if self.state != TransportState::Paused {
            return;
        }
        self.origin = now - self.paused_at;
        self.state = TransportState::Playing;
        log::debug!("transport resumed at {:.3}s", self.paused_at);
    }

    pub fn stop(&mut self) {
        self.queue.clear();
        self.cursor = 0;
        self.paused_at = 0.0;
        self.state = TransportState::Stopped;
    }

    /// Session position in seconds. Negative during the start delay.
    pub fn position(&self, now: f64) -> f64 {
        match self.state {
            TransportState::Playing => now - self.origin,
            TransportState::Paused => self.paused_at,
            TransportState::Stopped => 0.0,
        }
    }

    /// Engine time corresponding to session position `secs`.
    pub fn audio_time_of(&self, secs: f64) -> f64 {
        self.origin + secs
    }

    /// Hand out every trigger not yet handed out, each at its absolute
    /// engine time. Empty unless playing.
    pub fn take_pending(&mut self) -> Vec<DueNote> {
        if self.state != TransportState::Playing {
            return Vec::new();
        }
        let pending = self.queue[self.cursor..]
            .iter()
            .map(|note| DueNote {
                audio_time: self.audio_time_of(note.at_secs),
                note: note.clone(),
            })
            .collect();
        self.cursor = self.queue.len();
        pending
    }
}
