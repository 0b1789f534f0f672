//! Layout computation: groups measures into systems and sizes them so
//! every system has the same rendered width.
//!
//! Sizing runs in two passes. Pass 1 sums each system's beats and the
//! width of its decorations (repeat signs, time-signature redisplay) to get
//! an effective width; the widest one becomes the uniform content width.
//! Pass 2 gives each system the beat width that fills exactly that uniform
//! width after its own decorations are paid for.

use std::collections::HashSet;

use serde::Serialize;

use super::constants::*;
use crate::config::LayoutOptions;
use crate::measures::MeasureMap;
use crate::model::{RepeatKind, Song, TimeSignature, VoltaBracket};
use crate::pitch::{is_rest_symbol, staff_offset_y};

// ═══════════════════════════════════════════════════════════════════════
// Layout structures
// ═══════════════════════════════════════════════════════════════════════

/// Kind of barline drawn at a measure boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarType {
    Single,
    RepeatStart,
    RepeatEnd,
    RepeatBoth,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureLayout {
    pub measure_number: usize,
    pub start_beat_in_system: f64,
    pub beats_in_measure: f64,
    /// Left edge of the measure box (the barline), relative to `staff_left_px`
    pub box_offset_px: f64,
    /// Start of the first beat, relative to `staff_left_px`; includes the
    /// leading decoration
    pub x_offset_px: f64,
    pub leading_decoration_px: f64,
    pub trailing_decoration_px: f64,
    /// Signature redisplayed at the start of this measure, if any
    pub time_signature_shown: Option<TimeSignature>,
    pub repeat_start: bool,
    pub repeat_end: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemLayout {
    pub index: usize,
    pub start_measure: usize,
    /// One past the last measure
    pub end_measure: usize,
    pub start_score_beat: f64,
    pub total_beats: f64,
    pub beat_width_px: f64,
    pub decoration_px: f64,
    pub measures: Vec<MeasureLayout>,
    /// Top staff line
    pub top_px: f64,
    pub staff_left_px: f64,
    pub staff_right_px: f64,
    /// Absolute x of every measure boundary, left edge first
    pub bar_positions: Vec<f64>,
    pub bar_types: Vec<BarType>,
}

/// A note placed on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNote {
    pub note_id: String,
    pub pitch_symbol: String,
    pub x_px: f64,
    pub y_px: f64,
    pub system_index: usize,
    pub measure_number: usize,
    pub score_beat: f64,
    pub duration: f64,
    pub is_rest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLayout {
    pub systems: Vec<SystemLayout>,
    pub notes: Vec<RenderedNote>,
    pub measures_per_system: usize,
    pub measure_count: usize,
    /// Uniform width shared by every system, decorations included
    pub content_width_px: f64,
    pub staff_left_px: f64,
    pub page_width: f64,
    pub total_height: f64,
    /// Signature shown in the left margin of the first system
    pub initial_time_signature: TimeSignature,
    /// Endings to bracket above the staff
    pub volta_brackets: Vec<VoltaBracket>,
}

// ═══════════════════════════════════════════════════════════════════════
// Helper functions
// ═══════════════════════════════════════════════════════════════════════

/// Measures per system from the available width and the density options.
pub(super) fn measures_per_system(options: &LayoutOptions, available_width: f64) -> usize {
    let min = options.min_measures_per_system;
    let max = options.max_measures_per_system;
    match options.measures_per_system {
        Some(fixed) => fixed.clamp(min, max),
        None => {
            let nominal = options.nominal_measure_width * options.spacing;
            let fit = (available_width / nominal).floor();
            let fit = if fit.is_finite() && fit > 0.0 { fit as usize } else { 0 };
            fit.clamp(min, max)
        }
    }
}

struct Boundaries {
    repeat_starts: HashSet<usize>,
    repeat_ends: HashSet<usize>,
    change_points: HashSet<usize>,
}

impl Boundaries {
    fn new(song: &Song, measures: &MeasureMap) -> Self {
        let marked = |kind: RepeatKind| {
            song.composition
                .repeat_markers
                .iter()
                .filter(|m| m.kind == kind)
                .map(|m| m.measure_number)
                .collect()
        };
        Self {
            repeat_starts: marked(RepeatKind::Start),
            repeat_ends: marked(RepeatKind::End),
            change_points: measures.changes().iter().map(|c| c.measure_number).collect(),
        }
    }

    /// Time signature to redisplay at the start of measure `m`. Measure 0's
    /// signature lives in the left margin.
    fn time_signature_shown(&self, measures: &MeasureMap, m: usize) -> Option<TimeSignature> {
        if m == 0 {
            return None;
        }
        let ts = measures.time_signature_at(m);
        (self.change_points.contains(&m) || ts != measures.time_signature_at(m - 1)).then_some(ts)
    }

    fn bar_type(&self, boundary: usize, first_in_system: bool, last_in_system: bool, measure_count: usize) -> BarType {
        let start = self.repeat_starts.contains(&boundary) && !last_in_system;
        let end = self.repeat_ends.contains(&boundary) && !first_in_system;
        match (start, end) {
            (true, true) => BarType::RepeatBoth,
            (true, false) => BarType::RepeatStart,
            (false, true) => BarType::RepeatEnd,
            (false, false) if boundary == measure_count && last_in_system => BarType::Final,
            _ => BarType::Single,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Main layout computation
// ═══════════════════════════════════════════════════════════════════════

/// Lay out a song on wrapped staff lines.
///
/// `measures` should be the song's measure grid with its table built; an
/// empty composition still gets one empty measure so the staff is drawn.
pub fn compute_layout(song: &Song, measures: &MeasureMap, options: &LayoutOptions) -> ScoreLayout {
    let options = options.normalized();
    let measure_count = measures.measure_count().max(1);
    let staff_left = PAGE_MARGIN_LEFT + CLEF_SPACE + TIME_SIG_SPACE;
    let available = (options.page_width - staff_left - PAGE_MARGIN_RIGHT).max(0.0);
    let per_system = measures_per_system(&options, available);
    let boundaries = Boundaries::new(song, measures);

    // ── Pass 1: sizing ──────────────────────────────────────────────
    struct Sizing {
        start: usize,
        end: usize,
        beats: f64,
        decoration: f64,
        leading: Vec<f64>,
        trailing: Vec<f64>,
        shown: Vec<Option<TimeSignature>>,
    }

    let mut groups: Vec<Sizing> = Vec::new();
    let mut start = 0;
    while start < measure_count {
        let end = (start + per_system).min(measure_count);
        let mut sizing = Sizing {
            start,
            end,
            beats: 0.0,
            decoration: 0.0,
            leading: Vec::with_capacity(end - start),
            trailing: Vec::with_capacity(end - start),
            shown: Vec::with_capacity(end - start),
        };
        for m in start..end {
            let shown = boundaries.time_signature_shown(measures, m);
            let mut leading = 0.0;
            if boundaries.repeat_starts.contains(&m) {
                leading += REPEAT_SIGN_SPACE;
            }
            if shown.is_some() {
                leading += TIME_SIG_SPACE;
            }
            let trailing = if boundaries.repeat_ends.contains(&(m + 1)) {
                REPEAT_SIGN_SPACE
            } else {
                0.0
            };
            sizing.beats += measures.beats_in_measure(m);
            sizing.decoration += leading + trailing;
            sizing.leading.push(leading);
            sizing.trailing.push(trailing);
            sizing.shown.push(shown);
        }
        groups.push(sizing);
        start = end;
    }

    // ── Normalize ───────────────────────────────────────────────────
    let widest = groups
        .iter()
        .map(|g| g.beats * options.min_beat_width + g.decoration)
        .fold(0.0, f64::max);
    let uniform = widest.max(available);

    // ── Pass 2: placement ───────────────────────────────────────────
    let mut systems = Vec::with_capacity(groups.len());
    for (index, g) in groups.iter().enumerate() {
        let mut beat_width = if g.beats > 0.0 {
            (uniform - g.decoration) / g.beats
        } else {
            0.0
        };
        if beat_width.is_nan() || beat_width < MIN_BEAT_WIDTH_FLOOR {
            log::debug!(
                "system {index}: decorations ({:.1}px) leave no room for {} beats; clamping beat width",
                g.decoration,
                g.beats
            );
            beat_width = MIN_BEAT_WIDTH_FLOOR;
        }

        let mut measure_layouts = Vec::with_capacity(g.end - g.start);
        let mut bar_positions = vec![staff_left];
        let mut bar_types = vec![boundaries.bar_type(g.start, true, g.start == g.end, measure_count)];
        let mut x = 0.0;
        let mut beat_in_system = 0.0;
        for (j, m) in (g.start..g.end).enumerate() {
            let beats = measures.beats_in_measure(m);
            let leading = g.leading[j];
            let trailing = g.trailing[j];
            measure_layouts.push(MeasureLayout {
                measure_number: m,
                start_beat_in_system: beat_in_system,
                beats_in_measure: beats,
                box_offset_px: x,
                x_offset_px: x + leading,
                leading_decoration_px: leading,
                trailing_decoration_px: trailing,
                time_signature_shown: g.shown[j],
                repeat_start: boundaries.repeat_starts.contains(&m),
                repeat_end: boundaries.repeat_ends.contains(&(m + 1)),
            });
            x += leading + beats * beat_width + trailing;
            beat_in_system += beats;

            bar_positions.push(staff_left + x);
            bar_types.push(boundaries.bar_type(m + 1, false, m + 1 == g.end, measure_count));
        }

        systems.push(SystemLayout {
            index,
            start_measure: g.start,
            end_measure: g.end,
            start_score_beat: measures.absolute_beat_for_measure(g.start),
            total_beats: g.beats,
            beat_width_px: beat_width,
            decoration_px: g.decoration,
            measures: measure_layouts,
            top_px: PAGE_MARGIN_TOP + index as f64 * SYSTEM_ROW_HEIGHT,
            staff_left_px: staff_left,
            staff_right_px: staff_left + x,
            bar_positions,
            bar_types,
        });
    }

    let content_width = systems
        .iter()
        .map(|s| s.staff_right_px - s.staff_left_px)
        .fold(uniform, f64::max);
    let page_width = options.page_width.max(staff_left + content_width + PAGE_MARGIN_RIGHT);
    let total_height = PAGE_MARGIN_TOP + systems.len() as f64 * SYSTEM_ROW_HEIGHT - SYSTEM_SPACING
        + PAGE_MARGIN_BOTTOM;

    let mut layout = ScoreLayout {
        systems,
        notes: Vec::new(),
        measures_per_system: per_system,
        measure_count,
        content_width_px: content_width,
        staff_left_px: staff_left,
        page_width,
        total_height,
        initial_time_signature: measures.time_signature_at(0),
        volta_brackets: song
            .composition
            .volta_brackets
            .iter()
            .filter(|v| v.end_measure > v.start_measure)
            .cloned()
            .collect(),
    };
    layout.notes = place_notes(song, measures, &layout);

    log::debug!(
        "laid out {} measures in {} systems ({} per system, {:.1}px wide)",
        measure_count,
        layout.systems.len(),
        per_system,
        content_width
    );
    layout
}

/// Position every playable note on its system.
fn place_notes(song: &Song, measures: &MeasureMap, layout: &ScoreLayout) -> Vec<RenderedNote> {
    let mut notes = Vec::with_capacity(song.composition.notes.len());
    for note in song.composition.notes.iter().filter(|n| n.is_playable()) {
        let pos = measures.measure_from_absolute_beat(note.absolute_beat);
        let Some(system) = layout.system_for_measure(pos.measure_number) else {
            log::warn!(
                "note {:?} at beat {} falls outside the laid out measures; not drawn",
                note.id,
                note.absolute_beat
            );
            continue;
        };
        let Some(measure) = system.measure(pos.measure_number) else {
            continue;
        };
        let x_px = system.staff_left_px
            + measure.x_offset_px
            + (pos.beat_in_measure + NOTE_VISUAL_OFFSET_BEATS) * system.beat_width_px;
        notes.push(RenderedNote {
            note_id: note.id.clone(),
            pitch_symbol: note.pitch_symbol.clone(),
            x_px,
            y_px: system.top_px + staff_offset_y(&note.pitch_symbol, STAFF_LINE_SPACING),
            system_index: system.index,
            measure_number: pos.measure_number,
            score_beat: note.absolute_beat,
            duration: note.duration,
            is_rest: is_rest_symbol(&note.pitch_symbol),
        });
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Composition, Note, RepeatMarker, TimeSignatureChange};

    fn song_with_measures(count: usize, ts: TimeSignature) -> Song {
        let beats = ts.beats();
        let notes = (0..count)
            .map(|m| Note::new(format!("n{m}"), "C4", beats, m as f64 * beats))
            .collect();
        Song::new(Composition { notes, ..Default::default() }, ts)
    }

    fn layout(song: &Song, options: &LayoutOptions) -> ScoreLayout {
        let measures = MeasureMap::for_song(song);
        compute_layout(song, &measures, options)
    }

    fn width(s: &SystemLayout) -> f64 {
        s.staff_right_px - s.staff_left_px
    }

    #[test]
    fn short_last_system_is_as_wide_as_the_others() {
        let song = song_with_measures(9, TimeSignature::default());
        let l = layout(&song, &LayoutOptions::default().with_measures_per_system(4));
        let counts: Vec<_> = l.systems.iter().map(|s| s.measures.len()).collect();
        assert_eq!(counts, vec![4, 4, 1]);
        for s in &l.systems {
            assert!((width(s) - l.content_width_px).abs() < 1e-6);
        }
        assert!(l.systems[2].beat_width_px > l.systems[0].beat_width_px);
    }

    #[test]
    fn decorations_are_paid_for_without_breaking_uniformity() {
        let mut song = song_with_measures(8, TimeSignature::default());
        song.composition.repeat_markers = vec![RepeatMarker::start("s", "p", 1), RepeatMarker::end("e", "p", 3)];
        song.time_signature_changes = vec![TimeSignatureChange {
            measure_number: 5,
            time_signature: TimeSignature::new(3, 4),
        }];
        let options = LayoutOptions { page_width: 200.0, ..Default::default() }.with_measures_per_system(4);
        let l = layout(&song, &options);
        // 32 beats: five 4/4 measures then four 3/4 measures
        assert_eq!(l.measure_count, 9);
        assert_eq!(l.systems.len(), 3);
        assert_eq!(l.systems[0].decoration_px, 2.0 * REPEAT_SIGN_SPACE);
        assert_eq!(l.systems[1].decoration_px, TIME_SIG_SPACE);
        for s in &l.systems[1..] {
            assert!((width(&l.systems[0]) - width(s)).abs() < 1e-6);
        }
        assert_eq!(
            l.systems[0].bar_types,
            vec![BarType::Single, BarType::RepeatStart, BarType::Single, BarType::RepeatEnd, BarType::Single]
        );
        assert_eq!(l.systems[1].bar_types.last(), Some(&BarType::Single));
        assert_eq!(l.systems[2].bar_types.last(), Some(&BarType::Final));
        assert_eq!(l.systems[1].measures[1].time_signature_shown, Some(TimeSignature::new(3, 4)));
    }

    #[test]
    fn note_x_includes_leading_decoration() {
        let mut song = song_with_measures(2, TimeSignature::default());
        song.composition.repeat_markers = vec![RepeatMarker::start("s", "p", 1), RepeatMarker::end("e", "p", 2)];
        let l = layout(&song, &LayoutOptions::default().with_measures_per_system(2));
        let s = &l.systems[0];
        let m1 = &s.measures[1];
        assert_eq!(m1.x_offset_px, m1.box_offset_px + REPEAT_SIGN_SPACE);
        let n1 = &l.notes[1];
        let expected = s.staff_left_px + m1.x_offset_px + NOTE_VISUAL_OFFSET_BEATS * s.beat_width_px;
        assert!((n1.x_px - expected).abs() < 1e-9);
    }

    #[test]
    fn decoration_overload_clamps_beat_width() {
        let mut song = song_with_measures(2, TimeSignature::new(1, 4));
        song.composition.repeat_markers = vec![RepeatMarker::start("s", "p", 0), RepeatMarker::end("e", "p", 1)];
        let options = LayoutOptions {
            page_width: 10.0,
            min_beat_width: 1.0,
            ..Default::default()
        }
        .with_measures_per_system(1);
        let l = layout(&song, &options);
        for s in &l.systems {
            assert!(s.beat_width_px >= MIN_BEAT_WIDTH_FLOOR);
            assert!(s.staff_right_px > s.staff_left_px);
        }
    }

    #[test]
    fn density_follows_spacing() {
        let song = song_with_measures(12, TimeSignature::default());
        let dense = layout(&song, &LayoutOptions { page_width: 1200.0, ..Default::default() });
        let sparse = layout(&song, &LayoutOptions { page_width: 1200.0, spacing: 2.0, ..Default::default() });
        assert!(dense.measures_per_system > sparse.measures_per_system);
        assert!(sparse.measures_per_system >= 1);
    }

    #[test]
    fn empty_song_still_has_a_staff() {
        let song = Song::new(Composition::default(), TimeSignature::default());
        let l = layout(&song, &LayoutOptions::default());
        assert_eq!(l.systems.len(), 1);
        assert!(l.notes.is_empty());
    }
}
