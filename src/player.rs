//! Playback synchronizer: drives the sound engine, the cursor and the
//! viewport from one song snapshot.
//!
//! Audio and picture are kept together by deriving both from the engine's
//! clock. Every note trigger is queued on the engine at its exact engine
//! time as soon as a session starts or resumes, so audio never waits on the
//! frame loop. The active-note highlight switches when the engine reports
//! that a note fired, or, for engines without callbacks, when a frame sees
//! the engine clock past the onset. The cursor is recomputed from the
//! transport position on every frame. Nothing accumulates between frames,
//! so a late frame shows the right place instead of drifting.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::{LayoutOptions, PlaybackOptions};
use crate::engine::SoundEngine;
use crate::error::PlaybackError;
use crate::model::Song;
use crate::pitch::{pitch_code, REST_PITCH_CODE};
use crate::playback::PlaybackPlan;
use crate::renderer::ScoreLayout;
use crate::transport::Transport;

pub use crate::transport::TransportState;

/// What the rendering surface draws on one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorFrame {
    pub cursor_x_px: f64,
    pub cursor_system_index: usize,
    pub active_note_id: Option<String>,
    pub play_beat: f64,
}

/// Receives the static layout once per session and a frame per tick.
pub trait FrameSink {
    fn on_layout(&mut self, layout: &ScoreLayout);
    fn on_frame(&mut self, frame: &CursorFrame);
    /// A note's onset was reached on the audio clock.
    fn on_note_triggered(&mut self, _note_id: &str) {}
    /// Playback stopped: remove the cursor and highlight.
    fn on_clear(&mut self);
}

/// Scrolls the host's viewport to follow the cursor.
pub trait ViewportFollow {
    fn on_scroll_to(&mut self, scroll_left_px: f64, scroll_top_px: f64);
}

impl<F: FnMut(f64, f64)> ViewportFollow for F {
    fn on_scroll_to(&mut self, scroll_left_px: f64, scroll_top_px: f64) {
        self(scroll_left_px, scroll_top_px)
    }
}

/// A note the highlight is waiting for, or showing.
#[derive(Debug, Clone)]
struct PendingHighlight {
    note_id: String,
    audio_time: f64,
    end_time: f64,
}

/// One playback session over an owned sound engine and rendering surface.
pub struct Synchronizer<E: SoundEngine, S: FrameSink> {
    engine: E,
    sink: S,
    follow: Option<Box<dyn ViewportFollow>>,
    layout_options: LayoutOptions,
    options: PlaybackOptions,
    transport: Transport,
    plan: Option<PlaybackPlan>,
    pending: VecDeque<PendingHighlight>,
    active: Option<PendingHighlight>,
}

impl<E: SoundEngine, S: FrameSink> Synchronizer<E, S> {
    pub fn new(engine: E, sink: S) -> Self {
        Self::with_options(engine, sink, LayoutOptions::default(), PlaybackOptions::default())
    }

    pub fn with_options(engine: E, sink: S, layout_options: LayoutOptions, options: PlaybackOptions) -> Self {
        let options = options.normalized();
        Self {
            engine,
            sink,
            follow: None,
            layout_options: layout_options.normalized(),
            transport: Transport::new(),
            options,
            plan: None,
            pending: VecDeque::new(),
            active: None,
        }
    }

    pub fn set_viewport_follow(&mut self, follow: impl ViewportFollow + 'static) {
        self.follow = Some(Box::new(follow));
    }

    pub fn clear_viewport_follow(&mut self) {
        self.follow = None;
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The plan of the running session, if any.
    pub fn plan(&self) -> Option<&PlaybackPlan> {
        self.plan.as_ref()
    }

    /// Id of the highlighted note, if any.
    pub fn active_note_id(&self) -> Option<&str> {
        self.active.as_ref().map(|h| h.note_id.as_str())
    }

    /// Current play beat, or `None` when stopped.
    pub fn play_beat(&self) -> Option<f64> {
        let plan = self.plan.as_ref()?;
        Some(plan.play_beat_at(self.transport.position(self.engine.now())))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Transport controls
    // ═══════════════════════════════════════════════════════════════════

    /// Start playing `song`, or resume a paused session.
    ///
    /// A paused session resumes where it stopped and ignores `song`; edits
    /// made since Play take effect on the next session.
    pub fn play(&mut self, song: &Song) -> Result<(), PlaybackError> {
        match self.transport.state() {
            TransportState::Playing => Ok(()),
            TransportState::Paused => {
                self.transport.resume(self.engine.now());
                self.dispatch();
                Ok(())
            }
            TransportState::Stopped => self.start(song),
        }
    }

    fn start(&mut self, song: &Song) -> Result<(), PlaybackError> {
        if !self.engine.is_ready() {
            log::warn!("play pressed before the sound engine was ready");
            return Err(PlaybackError::EngineNotReady);
        }
        song.validate()?;
        if song.composition.is_empty() {
            return Err(PlaybackError::EmptyComposition);
        }

        let plan = PlaybackPlan::build(song, &self.layout_options);
        log::debug!(
            "starting playback: {} events over {} play beats at {} BPM",
            plan.events.len(),
            plan.total_play_beats(),
            plan.tempo
        );
        self.transport.load(plan.schedule.clone());
        self.transport.start(self.engine.now(), self.options.start_delay_secs);
        self.pending.clear();
        self.active = None;
        self.sink.on_layout(&plan.layout);
        self.plan = Some(plan);
        self.dispatch();
        Ok(())
    }

    /// Freeze playback. Sound stops immediately; nothing is rebuilt.
    pub fn pause(&mut self) {
        if self.transport.state() != TransportState::Playing {
            return;
        }
        self.transport.pause(self.engine.now());
        self.engine.silence();
        // Triggers not yet reached are handed out again on resume.
        self.pending.clear();
    }

    /// Stop and discard the session. Safe to call in any state.
    pub fn stop(&mut self) {
        let was = self.transport.state();
        self.engine.silence();
        self.finish();
        if was != TransportState::Stopped {
            log::debug!("playback stopped");
        }
    }

    /// Drop the session without touching the engine, so notes already
    /// sounding ring out.
    fn finish(&mut self) {
        self.transport.stop();
        self.plan = None;
        self.pending.clear();
        self.active = None;
        self.sink.on_clear();
    }

    /// Called by the engine (or the host on its behalf) when the note
    /// scheduled through [`SoundEngine::schedule_callback`] fires. Ignored
    /// unless playing.
    pub fn on_note_fired(&mut self, index: usize) {
        if self.transport.state() != TransportState::Playing {
            return;
        }
        let Some(note) = self.plan.as_ref().and_then(|p| p.schedule.iter().find(|n| n.index == index)) else {
            log::warn!("engine reported unknown note {index}");
            return;
        };
        let audio_time = self.transport.audio_time_of(note.at_secs);
        let fired = PendingHighlight {
            note_id: note.note_id.clone(),
            audio_time,
            end_time: audio_time + note.duration_secs,
        };
        self.sink.on_note_triggered(&fired.note_id);
        self.active = Some(fired);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Frame loop
    // ═══════════════════════════════════════════════════════════════════

    /// Advance one display frame. Returns the frame drawn, or `None` when
    /// not playing (including the frame on which playback reaches the end).
    pub fn tick(&mut self) -> Option<CursorFrame> {
        if self.transport.state() != TransportState::Playing {
            return None;
        }
        let now = self.engine.now();
        self.advance_highlight(now);

        let (total, play_beat, position) = {
            let plan = self.plan.as_ref()?;
            let play_beat = plan.play_beat_at(self.transport.position(now));
            (plan.total_play_beats(), play_beat, plan.timeline.project(play_beat))
        };
        let Some(position) = position.filter(|_| play_beat < total) else {
            log::debug!("playback reached the end");
            self.finish();
            return None;
        };

        let frame = CursorFrame {
            cursor_x_px: position.x_px,
            cursor_system_index: position.system_index,
            active_note_id: self.active.as_ref().map(|h| h.note_id.clone()),
            play_beat,
        };
        self.sink.on_frame(&frame);
        self.scroll_to(&frame);
        Some(frame)
    }

    /// Queue every trigger not yet handed to the engine.
    fn dispatch(&mut self) {
        let due = self.transport.take_pending();
        log::debug!("queueing {} triggers", due.len());
        for due in due {
            let note = &due.note;
            if note.pitch_code != REST_PITCH_CODE {
                self.engine.trigger_note(note.pitch_code, note.duration_secs, due.audio_time);
            }
            if self.engine.schedule_callback(note.index, due.audio_time) {
                continue;
            }
            self.pending.push_back(PendingHighlight {
                note_id: note.note_id.clone(),
                audio_time: due.audio_time,
                end_time: due.audio_time + note.duration_secs,
            });
        }
    }

    /// Highlight the latest note whose onset the engine clock has reached,
    /// for notes the engine does not call back for.
    fn advance_highlight(&mut self, now: f64) {
        while let Some(front) = self.pending.front() {
            if front.audio_time > now {
                break;
            }
            if let Some(h) = self.pending.pop_front() {
                self.sink.on_note_triggered(&h.note_id);
                self.active = Some(h);
            }
        }
        if self.active.as_ref().is_some_and(|h| now >= h.end_time) {
            self.active = None;
        }
    }

    fn scroll_to(&mut self, frame: &CursorFrame) {
        if !self.options.follow_cursor {
            return;
        }
        let (Some(follow), Some(plan)) = (self.follow.as_mut(), self.plan.as_ref()) else {
            return;
        };
        let first_top = plan.layout.systems.first().map_or(0.0, |s| s.top_px);
        let row_top = plan
            .layout
            .systems
            .get(frame.cursor_system_index)
            .map_or(first_top, |s| s.top_px);

        let left = (frame.cursor_x_px - self.options.viewport_width_px / 2.0).max(0.0);
        let top = (row_top - first_top).max(0.0);
        follow.on_scroll_to(left, top);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Manual keys
    // ═══════════════════════════════════════════════════════════════════

    /// Sound a note while a key is held.
    pub fn press_key(&mut self, pitch_symbol: &str) {
        let code = pitch_code(pitch_symbol);
        if code != REST_PITCH_CODE && self.engine.is_ready() {
            self.engine.trigger_attack(code);
        }
    }

    pub fn release_key(&mut self, pitch_symbol: &str) {
        let code = pitch_code(pitch_symbol);
        if code != REST_PITCH_CODE && self.engine.is_ready() {
            self.engine.trigger_release(code);
        }
    }
}
