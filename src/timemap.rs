//! Convert the unrolled performance into wall-clock time. This is the
//! bridge between play beats and audio scheduling: it answers "when does
//! each note sound?" and "how long does it ring?" in seconds.

use serde::Serialize;

use crate::performance::PerformanceEvent;

/// Default tempo if the song does not specify one.
pub const DEFAULT_TEMPO: f64 = 120.0;

/// One audio trigger on the session timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNote {
    /// Index in the performance sequence
    pub index: usize,
    pub note_id: String,
    /// 0 for rests; those are scheduled for highlighting but never sounded
    pub pitch_code: u8,
    /// Offset from the session start in seconds
    pub at_secs: f64,
    pub duration_secs: f64,
    /// Position on the unrolled timeline, kept for cursor correlation
    pub play_beat: f64,
}

/// Seconds per beat at `tempo` BPM. Non-positive tempi fall back to the default.
pub fn seconds_per_beat(tempo: f64) -> f64 {
    let tempo = if tempo.is_finite() && tempo > 0.0 {
        tempo
    } else {
        log::warn!("tempo {tempo} is not usable; falling back to {DEFAULT_TEMPO} BPM");
        DEFAULT_TEMPO
    };
    60.0 / tempo
}

/// Schedule every performance event at `play_beat × 60 / tempo` seconds.
pub fn schedule_performance(events: &[PerformanceEvent], tempo: f64) -> Vec<ScheduledNote> {
    let spb = seconds_per_beat(tempo);
    events
        .iter()
        .enumerate()
        .map(|(index, e)| ScheduledNote {
            index,
            note_id: e.note_id.clone(),
            pitch_code: e.pitch_code,
            at_secs: e.play_beat * spb,
            duration_secs: e.duration * spb,
            play_beat: e.play_beat,
        })
        .collect()
}
