//! Expand a composition into its performance sequence: every note that is
//! heard, once per time it is heard, placed on the unrolled play-beat axis.

use serde::Serialize;

use crate::model::{Composition, Note};
use crate::pitch::pitch_code;
use crate::unroller::Unrolled;

/// One note occurrence in the unrolled performance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEvent {
    pub note_id: String,
    pub pitch_symbol: String,
    /// Sound engine pitch code (0 = rest)
    pub pitch_code: u8,
    /// Length in beats
    pub duration: f64,
    /// Position on the unrolled timeline
    pub play_beat: f64,
    /// Position in the written score
    pub score_beat: f64,
    /// Repeat pass the occurrence belongs to (0 outside repeats)
    pub pass: u32,
}

/// Expand notes through the unrolled spans.
///
/// Each note whose score beat falls inside a span is emitted at
/// `span.play_start + (absolute_beat - span.score_start)`. The result is
/// sorted by play beat; ties keep score order so chord members stay together.
pub fn expand_performance(composition: &Composition, unrolled: &Unrolled) -> Vec<PerformanceEvent> {
    let mut notes: Vec<&Note> = composition
        .notes
        .iter()
        .filter(|n| {
            let ok = n.is_playable();
            if !ok {
                log::warn!(
                    "skipping note {:?}: duration {} at beat {} cannot be played",
                    n.id,
                    n.duration,
                    n.absolute_beat
                );
            }
            ok
        })
        .collect();
    // Stable: equal beats keep their order in the composition.
    notes.sort_by(|a, b| a.absolute_beat.total_cmp(&b.absolute_beat));

    let mut events = Vec::with_capacity(notes.len());
    for span in &unrolled.spans {
        let first = notes.partition_point(|n| n.absolute_beat < span.score_start - 1e-9);
        for note in notes[first..].iter().take_while(|n| span.contains_score_beat(n.absolute_beat)) {
            events.push(PerformanceEvent {
                note_id: note.id.clone(),
                pitch_symbol: note.pitch_symbol.clone(),
                pitch_code: pitch_code(&note.pitch_symbol),
                duration: note.duration,
                play_beat: span.play_start + (note.absolute_beat - span.score_start),
                score_beat: note.absolute_beat,
                pass: span.pass,
            });
        }
    }

    events.sort_by(|a, b| a.play_beat.total_cmp(&b.play_beat));
    events
}
