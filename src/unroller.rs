//! Unroll a composition by expanding repeat sections into a linear list of
//! play spans. Both the note expansion and the cursor timeline are built
//! from this one walk, so audio and cursor always agree on how many beats
//! each pass takes.
//!
//! Handles:
//! - Start / end repeat markers paired by `pair_id`
//! - Volta brackets (1st / 2nd / Nth endings) inside a section
//! - More than two passes when a section carries endings numbered 3+
//!
//! Malformed structure (unpaired markers, an end not after its start,
//! sections overlapping an earlier one, empty volta ranges) is skipped
//! with a warning and never disturbs the rest of the walk.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::measures::{MeasureMap, MAX_MEASURES};
use crate::model::{Composition, RepeatKind, RepeatMarker, VoltaBracket};

const BEAT_EPSILON: f64 = 1e-9;

/// Passes taken by a plain start/end pair.
pub const DEFAULT_REPEAT_PASSES: u32 = 2;

/// Endings numbered past this are ignored.
pub const MAX_REPEAT_PASSES: u32 = 16;

/// A validated repeat section, in both measures and score beats.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatSection {
    pub pair_id: String,
    pub start_measure: usize,
    pub end_measure: usize,
    pub start_beat: f64,
    pub end_beat: f64,
    /// How many times the section is played
    pub passes: u32,
}

/// One contiguous stretch of the written score as it is performed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySpan {
    pub score_start: f64,
    pub score_end: f64,
    /// Position of `score_start` on the unrolled timeline
    pub play_start: f64,
    /// Repeat pass this span belongs to, or 0 outside any section
    pub pass: u32,
}

impl PlaySpan {
    pub fn len(&self) -> f64 {
        self.score_end - self.score_start
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= BEAT_EPSILON
    }

    pub fn play_end(&self) -> f64 {
        self.play_start + self.len()
    }

    pub fn contains_score_beat(&self, beat: f64) -> bool {
        beat >= self.score_start - BEAT_EPSILON && beat < self.score_end - BEAT_EPSILON
    }
}

/// The unrolled performance order of a composition.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unrolled {
    pub sections: Vec<RepeatSection>,
    pub spans: Vec<PlaySpan>,
    /// Last beat of the written score
    pub score_end_beat: f64,
    /// Length of the unrolled timeline
    pub total_play_beats: f64,
}

/// Pair up repeat markers into sections sorted by start beat.
pub fn repeat_sections(composition: &Composition, measures: &MeasureMap) -> Vec<RepeatSection> {
    let mut pairs: BTreeMap<&str, (Option<&RepeatMarker>, Option<&RepeatMarker>)> = BTreeMap::new();
    for marker in &composition.repeat_markers {
        let entry = pairs.entry(marker.pair_id.as_str()).or_default();
        let slot = match marker.kind {
            RepeatKind::Start => &mut entry.0,
            RepeatKind::End => &mut entry.1,
        };
        if slot.is_some() {
            log::warn!(
                "repeat pair {:?} has more than one {:?} marker; ignoring {:?}",
                marker.pair_id,
                marker.kind,
                marker.id
            );
            continue;
        }
        *slot = Some(marker);
    }

    let mut candidates: Vec<RepeatSection> = Vec::new();
    for (pair_id, (start, end)) in pairs {
        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                log::warn!("repeat pair {pair_id:?} is missing its start or end marker; skipping");
                continue;
            }
        };
        if end.measure_number <= start.measure_number {
            log::warn!(
                "repeat pair {pair_id:?} ends at measure {} which is not after its start {}; skipping",
                end.measure_number,
                start.measure_number
            );
            continue;
        }
        if end.measure_number > MAX_MEASURES {
            log::warn!(
                "repeat pair {pair_id:?} ends at measure {} past the last measure {MAX_MEASURES}; skipping",
                end.measure_number
            );
            continue;
        }

        let passes = composition
            .volta_brackets
            .iter()
            .filter(|v| v.repeat_pair_id == pair_id)
            .map(|v| v.volta_number)
            .filter(|&n| n <= MAX_REPEAT_PASSES)
            .fold(DEFAULT_REPEAT_PASSES, u32::max);

        candidates.push(RepeatSection {
            pair_id: pair_id.to_string(),
            start_measure: start.measure_number,
            end_measure: end.measure_number,
            start_beat: measures.absolute_beat_for_measure(start.measure_number),
            end_beat: measures.absolute_beat_for_measure(end.measure_number),
            passes,
        });
    }

    candidates.sort_by(|a, b| {
        a.start_beat
            .total_cmp(&b.start_beat)
            .then(a.end_beat.total_cmp(&b.end_beat))
    });

    let mut sections: Vec<RepeatSection> = Vec::with_capacity(candidates.len());
    for section in candidates {
        if let Some(prev) = sections.last() {
            if section.start_beat < prev.end_beat - BEAT_EPSILON {
                log::warn!(
                    "repeat pair {:?} overlaps {:?}; nested or overlapping repeats are not supported, skipping",
                    section.pair_id,
                    prev.pair_id
                );
                continue;
            }
        }
        sections.push(section);
    }
    sections
}

/// Score-beat ranges of `section` that are played on `pass`, after removing
/// measures that belong to a different ending.
fn pass_ranges(
    section: &RepeatSection,
    pass: u32,
    brackets: &[VoltaBracket],
    measures: &MeasureMap,
) -> Vec<(f64, f64)> {
    let mut excluded: Vec<(f64, f64)> = brackets
        .iter()
        .filter(|v| v.repeat_pair_id == section.pair_id && v.volta_number != pass)
        .filter_map(|v| {
            let start = v.start_measure.max(section.start_measure);
            let end = v.end_measure.min(section.end_measure);
            (end > start).then(|| {
                (
                    measures.absolute_beat_for_measure(start),
                    measures.absolute_beat_for_measure(end),
                )
            })
        })
        .collect();
    excluded.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut ranges = Vec::new();
    let mut cursor = section.start_beat;
    for (start, end) in excluded {
        if start > cursor {
            ranges.push((cursor, start));
        }
        cursor = cursor.max(end);
    }
    if cursor < section.end_beat {
        ranges.push((cursor, section.end_beat));
    }
    ranges
}

fn valid_brackets(composition: &Composition) -> Vec<VoltaBracket> {
    composition
        .volta_brackets
        .iter()
        .filter(|v| {
            let ok = v.end_measure > v.start_measure && (1..=MAX_REPEAT_PASSES).contains(&v.volta_number);
            if !ok {
                log::warn!(
                    "volta bracket {:?} ({}..{}, ending {}) is empty or misnumbered; ignoring",
                    v.id,
                    v.start_measure,
                    v.end_measure,
                    v.volta_number
                );
            }
            ok
        })
        .cloned()
        .collect()
}

/// Unroll a composition into play order.
///
/// Walks the score once: the gap before each section is played once, the
/// section itself `passes` times (minus endings that belong to other
/// passes), then the tail through the end of the score.
pub fn unroll(composition: &Composition, measures: &MeasureMap) -> Unrolled {
    let measure_count = if measures.measure_count() > 0 {
        measures.measure_count()
    } else {
        measures.measure_count_for(composition)
    };
    let score_end_beat = measures.absolute_beat_for_measure(measure_count);

    let sections = repeat_sections(composition, measures);
    let brackets = valid_brackets(composition);

    let mut spans: Vec<PlaySpan> = Vec::new();
    let mut play_cursor = 0.0;
    let mut push = |spans: &mut Vec<PlaySpan>, score_start: f64, score_end: f64, pass: u32| {
        let span = PlaySpan { score_start, score_end, play_start: play_cursor, pass };
        if !span.is_empty() {
            play_cursor += span.len();
            spans.push(span);
        }
    };

    let mut last_processed = 0.0;
    for section in &sections {
        push(&mut spans, last_processed, section.start_beat, 0);
        for pass in 1..=section.passes {
            for (start, end) in pass_ranges(section, pass, &brackets, measures) {
                push(&mut spans, start, end, pass);
            }
        }
        last_processed = section.end_beat;
    }
    push(&mut spans, last_processed, score_end_beat, 0);

    let total_play_beats = spans.last().map_or(0.0, PlaySpan::play_end);
    log::debug!(
        "unrolled {} repeat sections into {} spans ({} score beats → {} play beats)",
        sections.len(),
        spans.len(),
        score_end_beat,
        total_play_beats
    );

    Unrolled { sections, spans, score_end_beat, total_play_beats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Note, TimeSignature};

    fn quarter_notes(measures: usize) -> Vec<Note> {
        (0..measures * 4)
            .map(|i| Note::new(format!("n{i}"), "C4", 1.0, i as f64))
            .collect()
    }

    fn repeat(pair: &str, start: usize, end: usize) -> Vec<RepeatMarker> {
        vec![
            RepeatMarker::start(format!("{pair}-s"), pair, start),
            RepeatMarker::end(format!("{pair}-e"), pair, end),
        ]
    }

    fn volta(pair: &str, number: u32, start: usize, end: usize) -> VoltaBracket {
        VoltaBracket {
            id: format!("{pair}-v{number}"),
            repeat_pair_id: pair.to_string(),
            start_measure: start,
            end_measure: end,
            volta_number: number,
        }
    }

    fn map() -> MeasureMap {
        MeasureMap::new(TimeSignature::default(), &[])
    }

    fn spans_of(u: &Unrolled) -> Vec<(f64, f64, f64)> {
        u.spans.iter().map(|s| (s.score_start, s.score_end, s.play_start)).collect()
    }

    #[test]
    fn no_repeats_is_one_span() {
        let composition = Composition { notes: quarter_notes(3), ..Default::default() };
        let u = unroll(&composition, &map());
        assert_eq!(spans_of(&u), vec![(0.0, 12.0, 0.0)]);
        assert_eq!(u.total_play_beats, 12.0);
    }

    #[test]
    fn single_section_adds_its_length() {
        let composition = Composition {
            notes: quarter_notes(4),
            repeat_markers: repeat("a", 1, 3),
            ..Default::default()
        };
        let u = unroll(&composition, &map());
        assert_eq!(
            spans_of(&u),
            vec![(0.0, 4.0, 0.0), (4.0, 12.0, 4.0), (4.0, 12.0, 12.0), (12.0, 16.0, 20.0)]
        );
        assert_eq!(u.total_play_beats, 16.0 + 8.0);
    }

    #[test]
    fn far_away_repeats_and_endings_are_ignored() {
        let mut repeat_markers = repeat("far", 1, usize::MAX);
        repeat_markers.extend(repeat("a", 1, 2));
        let composition = Composition {
            notes: quarter_notes(3),
            repeat_markers,
            volta_brackets: vec![volta("a", u32::MAX, 1, 2)],
        };
        let sections = repeat_sections(&composition, &map());
        assert_eq!(sections.len(), 1);
        assert_eq!((sections[0].pair_id.as_str(), sections[0].passes), ("a", DEFAULT_REPEAT_PASSES));

        // The misnumbered ending does not hide measure 1 on either pass.
        let u = unroll(&composition, &map());
        assert_eq!(u.total_play_beats, 12.0 + 4.0);
    }

    #[test]
    fn first_ending_is_skipped_on_second_pass() {
        // ||: m0 m1 [1. m2] :|| [2. m3] m4
        let composition = Composition {
            notes: quarter_notes(5),
            repeat_markers: repeat("a", 0, 3),
            volta_brackets: vec![volta("a", 1, 2, 3), volta("a", 2, 3, 4)],
        };
        let u = unroll(&composition, &map());
        assert_eq!(
            spans_of(&u),
            vec![(0.0, 12.0, 0.0), (0.0, 8.0, 12.0), (12.0, 20.0, 20.0)]
        );
        assert_eq!(u.spans[1].pass, 2);
        assert_eq!(u.total_play_beats, 28.0);
    }

    #[test]
    fn third_ending_adds_a_pass() {
        let composition = Composition {
            notes: quarter_notes(5),
            repeat_markers: repeat("a", 0, 5),
            volta_brackets: vec![volta("a", 1, 2, 3), volta("a", 2, 3, 4), volta("a", 3, 4, 5)],
        };
        let u = unroll(&composition, &map());
        assert_eq!(u.sections[0].passes, 3);
        // pass 1: m0-m2, pass 2: m0-m1 + m3, pass 3: m0-m1 + m4
        assert_eq!(
            spans_of(&u),
            vec![
                (0.0, 12.0, 0.0),
                (0.0, 8.0, 12.0),
                (12.0, 16.0, 20.0),
                (0.0, 8.0, 24.0),
                (16.0, 20.0, 32.0),
            ]
        );
        assert_eq!(u.total_play_beats, 36.0);
    }

    #[test]
    fn malformed_pairs_are_skipped() {
        let mut markers = repeat("ok", 2, 3);
        markers.push(RepeatMarker::start("lonely", "lonely", 0));
        markers.extend(repeat("backwards", 3, 1));
        let composition = Composition {
            notes: quarter_notes(4),
            repeat_markers: markers,
            ..Default::default()
        };
        let u = unroll(&composition, &map());
        assert_eq!(u.sections.len(), 1);
        assert_eq!(u.sections[0].pair_id, "ok");
        assert_eq!(u.total_play_beats, 20.0);
    }

    #[test]
    fn overlapping_section_is_rejected() {
        let mut markers = repeat("a", 0, 2);
        markers.extend(repeat("b", 1, 3));
        let composition = Composition {
            notes: quarter_notes(4),
            repeat_markers: markers,
            ..Default::default()
        };
        let sections = repeat_sections(&composition, &map());
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].pair_id, "a");
    }

    #[test]
    fn spans_are_contiguous_in_play_time() {
        let mut markers = repeat("a", 0, 1);
        markers.extend(repeat("b", 2, 4));
        let composition = Composition {
            notes: quarter_notes(5),
            repeat_markers: markers,
            volta_brackets: vec![volta("b", 1, 3, 4)],
        };
        let u = unroll(&composition, &map());
        let mut expected = 0.0;
        for span in &u.spans {
            assert_eq!(span.play_start, expected);
            expected = span.play_end();
        }
        assert_eq!(expected, u.total_play_beats);
    }
}
