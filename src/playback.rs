//! Playback timeline: maps the unrolled play-beat axis onto pixel ranges of
//! the rendered systems. This is the bridge between audio time and the
//! cursor position in the rendered score.
//!
//! The timeline replays the unroller's span walk. Every span is cut at
//! system boundaries (and at decorated measure boundaries, where the beat
//! grid jumps), and each piece becomes one [`TimelineSegment`]. A repeated
//! section therefore produces segments with growing play beats but the same
//! pixel ranges on every pass. The cursor is found by binary search over
//! the segments and linear interpolation inside one:
//!   `cursor_x = x_px_start + (beat - play_beat_start) / len * (x_px_end - x_px_start)`

use serde::Serialize;

use crate::config::LayoutOptions;
use crate::measures::MeasureMap;
use crate::model::Song;
use crate::performance::{expand_performance, PerformanceEvent};
use crate::renderer::{compute_layout, RenderedNote, ScoreLayout, SystemLayout};
use crate::timemap::{schedule_performance, seconds_per_beat, ScheduledNote};
use crate::unroller::{unroll, Unrolled};

const BEAT_EPSILON: f64 = 1e-9;
const PX_EPSILON: f64 = 1e-6;

/// A play-beat range drawn at a fixed pixel range of one system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegment {
    pub play_beat_start: f64,
    pub play_beat_end: f64,
    pub system_index: usize,
    pub x_px_start: f64,
    pub x_px_end: f64,
    pub score_beat_start: f64,
}

impl TimelineSegment {
    pub fn len(&self) -> f64 {
        self.play_beat_end - self.play_beat_start
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= BEAT_EPSILON
    }
}

/// Where the cursor sits at one play beat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPosition {
    pub x_px: f64,
    pub system_index: usize,
    pub score_beat: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    segments: Vec<TimelineSegment>,
    total_play_beats: f64,
}

impl Timeline {
    pub fn build(layout: &ScoreLayout, unrolled: &Unrolled) -> Self {
        let mut segments: Vec<TimelineSegment> = Vec::new();

        for span in &unrolled.spans {
            let mut beat = span.score_start;
            let mut play = span.play_start;
            while beat < span.score_end - BEAT_EPSILON {
                let (segment, end) = match layout.system_for_score_beat(beat) {
                    Some(system) => clip_to_measure(system, beat, span.score_end, play),
                    None => {
                        // Past the laid out systems: park the cursor at the end
                        // of the last line for the rest of the span.
                        log::warn!("score beat {beat} is not on any system; holding the cursor");
                        let Some(last) = layout.systems.last() else {
                            break;
                        };
                        let segment = TimelineSegment {
                            play_beat_start: play,
                            play_beat_end: play + (span.score_end - beat),
                            system_index: last.index,
                            x_px_start: last.staff_right_px,
                            x_px_end: last.staff_right_px,
                            score_beat_start: beat,
                        };
                        (segment, span.score_end)
                    }
                };
                beat = end;
                play = segment.play_beat_end;
                push_merged(&mut segments, segment);
            }
        }

        log::debug!(
            "timeline: {} segments over {} play beats",
            segments.len(),
            unrolled.total_play_beats
        );
        Self { segments, total_play_beats: unrolled.total_play_beats }
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    pub fn total_play_beats(&self) -> f64 {
        self.total_play_beats
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Cursor position at `play_beat`, or `None` at or past the end.
    /// Beats before 0 (a start delay) sit at the beginning.
    pub fn project(&self, play_beat: f64) -> Option<CursorPosition> {
        if !play_beat.is_finite() || play_beat >= self.total_play_beats - BEAT_EPSILON {
            return None;
        }
        let play_beat = play_beat.max(0.0);
        let idx = self.segments.partition_point(|s| s.play_beat_end <= play_beat);
        let segment = self.segments.get(idx)?;

        let offset = play_beat - segment.play_beat_start;
        let frac = if segment.is_empty() { 0.0 } else { offset / segment.len() };
        Some(CursorPosition {
            x_px: segment.x_px_start + frac * (segment.x_px_end - segment.x_px_start),
            system_index: segment.system_index,
            score_beat: segment.score_beat_start + offset,
        })
    }
}

/// The piece of `[beat, span_end)` that stays inside one measure of
/// `system`, and the score beat where it stops.
fn clip_to_measure(system: &SystemLayout, beat: f64, span_end: f64, play: f64) -> (TimelineSegment, f64) {
    let idx = system.measure_index_at(beat);
    let measure_end = system.measure_end_beat(idx);
    let end = measure_end.min(span_end);
    let last_in_system = idx + 1 == system.measures.len();

    let x_px_end = if last_in_system && end >= measure_end - BEAT_EPSILON {
        system.staff_right_px
    } else {
        system.x_in_measure(idx, end)
    };
    let segment = TimelineSegment {
        play_beat_start: play,
        play_beat_end: play + (end - beat),
        system_index: system.index,
        x_px_start: system.x_in_measure(idx, beat),
        x_px_end,
        score_beat_start: beat,
    };
    (segment, end)
}

/// Append `next`, extending the previous segment when the two continue
/// each other on the same system without a jump.
fn push_merged(segments: &mut Vec<TimelineSegment>, next: TimelineSegment) {
    if let Some(prev) = segments.last_mut() {
        let continues = prev.system_index == next.system_index
            && (prev.x_px_end - next.x_px_start).abs() < PX_EPSILON
            && (prev.score_beat_start + prev.len() - next.score_beat_start).abs() < BEAT_EPSILON
            && (prev.play_beat_end - next.play_beat_start).abs() < BEAT_EPSILON;
        if continues {
            prev.play_beat_end = next.play_beat_end;
            prev.x_px_end = next.x_px_end;
            return;
        }
    }
    segments.push(next);
}

// ═══════════════════════════════════════════════════════════════════════
// Playback plan
// ═══════════════════════════════════════════════════════════════════════

/// Everything derived from one song snapshot. Rebuilt wholesale whenever
/// the song or the layout options change.
#[derive(Debug, Clone)]
pub struct PlaybackPlan {
    pub measures: MeasureMap,
    pub layout: ScoreLayout,
    pub unrolled: Unrolled,
    pub events: Vec<PerformanceEvent>,
    pub timeline: Timeline,
    pub schedule: Vec<ScheduledNote>,
    pub tempo: f64,
}

impl PlaybackPlan {
    pub fn build(song: &Song, options: &LayoutOptions) -> Self {
        let measures = MeasureMap::for_song(song);
        let layout = compute_layout(song, &measures, options);
        let unrolled = unroll(&song.composition, &measures);
        let events = expand_performance(&song.composition, &unrolled);
        let timeline = Timeline::build(&layout, &unrolled);
        let schedule = schedule_performance(&events, song.tempo);
        Self {
            measures,
            layout,
            unrolled,
            events,
            timeline,
            schedule,
            tempo: song.tempo,
        }
    }

    pub fn total_play_beats(&self) -> f64 {
        self.timeline.total_play_beats()
    }

    pub fn seconds_per_beat(&self) -> f64 {
        seconds_per_beat(self.tempo)
    }

    pub fn total_secs(&self) -> f64 {
        self.total_play_beats() * self.seconds_per_beat()
    }

    /// Play beat reached `elapsed_secs` after the first beat.
    pub fn play_beat_at(&self, elapsed_secs: f64) -> f64 {
        elapsed_secs / self.seconds_per_beat()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Playback map (host exchange form)
// ═══════════════════════════════════════════════════════════════════════

/// Complete playback map for hosts that drive their own cursor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackMap {
    pub page_width: f64,
    pub total_height: f64,
    pub systems: Vec<SystemLayout>,
    pub notes: Vec<RenderedNote>,
    pub segments: Vec<TimelineSegment>,
    pub events: Vec<PerformanceEvent>,
    pub schedule: Vec<ScheduledNote>,
    pub total_play_beats: f64,
    pub tempo: f64,
}

impl From<PlaybackPlan> for PlaybackMap {
    fn from(plan: PlaybackPlan) -> Self {
        Self {
            page_width: plan.layout.page_width,
            total_height: plan.layout.total_height,
            total_play_beats: plan.timeline.total_play_beats(),
            segments: plan.timeline.segments,
            systems: plan.layout.systems,
            notes: plan.layout.notes,
            events: plan.events,
            schedule: plan.schedule,
            tempo: plan.tempo,
        }
    }
}

/// Generate a playback map for a song at the given layout options.
pub fn generate_playback_map(song: &Song, options: &LayoutOptions) -> PlaybackMap {
    PlaybackPlan::build(song, options).into()
}

/// Serialize a PlaybackMap to JSON.
pub fn playback_map_to_json(map: &PlaybackMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
}
