//! Measure boundary resolution: maps between absolute score beats and
//! (measure, beat-within-measure) under a base time signature and a sparse,
//! measure-ordered list of meter changes.
//!
//! Without meter changes every lookup is plain arithmetic. With changes,
//! lookups go through the precomputed [`MeasureInfo`] table when one has
//! been built (the hot path for layout and playback), and fall back to a
//! piecewise walk over the change list otherwise.

use serde::Serialize;

use crate::model::{Composition, Song, TimeSignature, TimeSignatureChange};

/// Tolerance for "this beat sits exactly on a measure boundary".
const BEAT_EPSILON: f64 = 1e-9;

/// Longest grid built for one song. Notes and markers past it are skipped.
pub const MAX_MEASURES: usize = 10_000;

/// Precomputed extent of one measure on the score beat axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureInfo {
    pub measure_number: usize,
    pub start_beat: f64,
    pub end_beat: f64,
    pub beats_in_measure: f64,
    pub time_signature: TimeSignature,
}

/// Where a score beat falls inside the measure grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurePosition {
    pub measure_number: usize,
    pub beat_in_measure: f64,
    pub time_signature: TimeSignature,
}

/// The measure grid of one song.
#[derive(Debug, Clone)]
pub struct MeasureMap {
    base: TimeSignature,
    /// Sorted by measure number, no duplicates, none at measure 0
    changes: Vec<TimeSignatureChange>,
    table: Vec<MeasureInfo>,
}

impl MeasureMap {
    pub fn new(base: TimeSignature, changes: &[TimeSignatureChange]) -> Self {
        let mut sorted = changes.to_vec();
        // Stable sort: for duplicate measure numbers the last one listed wins below.
        sorted.sort_by_key(|c| c.measure_number);

        let mut deduped: Vec<TimeSignatureChange> = Vec::with_capacity(sorted.len());
        for change in sorted {
            if !change.time_signature.is_valid() {
                log::warn!(
                    "ignoring time signature {} at measure {}",
                    change.time_signature,
                    change.measure_number
                );
                continue;
            }
            match deduped.last_mut() {
                Some(last) if last.measure_number == change.measure_number => *last = change,
                _ => deduped.push(change),
            }
        }

        let mut base = base;
        if deduped.first().map_or(false, |c| c.measure_number == 0) {
            base = deduped.remove(0).time_signature;
        }

        Self { base, changes: deduped, table: Vec::new() }
    }

    /// Build the grid for a song with a table covering every measure the
    /// composition touches.
    pub fn for_song(song: &Song) -> Self {
        let mut map = Self::new(song.time_signature, &song.time_signature_changes);
        let count = map.measure_count_for(&song.composition);
        map.build_measure_table(count);
        map
    }

    pub fn base(&self) -> TimeSignature {
        self.base
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn changes(&self) -> &[TimeSignatureChange] {
        &self.changes
    }

    /// Signature in effect at `measure_number`. Changes registered at a later
    /// measure never apply retroactively.
    pub fn time_signature_at(&self, measure_number: usize) -> TimeSignature {
        if self.changes.is_empty() {
            return self.base;
        }
        let idx = self.changes.partition_point(|c| c.measure_number <= measure_number);
        if idx == 0 {
            self.base
        } else {
            self.changes[idx - 1].time_signature
        }
    }

    pub fn beats_in_measure(&self, measure_number: usize) -> f64 {
        self.time_signature_at(measure_number).beats()
    }

    /// Score beat at which `measure_number` starts.
    pub fn absolute_beat_for_measure(&self, measure_number: usize) -> f64 {
        if self.changes.is_empty() {
            return measure_number as f64 * self.base.beats();
        }
        if let Some(info) = self.table.get(measure_number) {
            return info.start_beat;
        }
        if measure_number == self.table.len() {
            if let Some(last) = self.table.last() {
                return last.end_beat;
            }
        }

        let mut beat = 0.0;
        let mut segment_start = 0usize;
        let mut ts = self.base;
        for change in &self.changes {
            if change.measure_number >= measure_number {
                break;
            }
            beat += (change.measure_number - segment_start) as f64 * ts.beats();
            segment_start = change.measure_number;
            ts = change.time_signature;
        }
        beat + (measure_number - segment_start) as f64 * ts.beats()
    }

    /// Locate the measure containing `beat`.
    ///
    /// With a table built, a beat past the last built measure fails softly:
    /// the last measure is returned with `beat_in_measure = 0`.
    pub fn measure_from_absolute_beat(&self, beat: f64) -> MeasurePosition {
        let beat = if beat.is_finite() { beat.max(0.0) } else { 0.0 };

        if self.changes.is_empty() {
            let beats = self.base.beats();
            let measure_number = (beat / beats + BEAT_EPSILON).floor();
            return MeasurePosition {
                measure_number: measure_number as usize,
                beat_in_measure: (beat - measure_number * beats).max(0.0),
                time_signature: self.base,
            };
        }

        match self.table.last() {
            Some(last) if beat >= last.end_beat - BEAT_EPSILON => {
                log::debug!(
                    "beat {beat} is past the {} built measures; clamping to measure {}",
                    self.table.len(),
                    last.measure_number
                );
                MeasurePosition {
                    measure_number: last.measure_number,
                    beat_in_measure: 0.0,
                    time_signature: last.time_signature,
                }
            }
            Some(_) => {
                let idx = self.table.partition_point(|m| m.end_beat <= beat + BEAT_EPSILON);
                let info = &self.table[idx];
                MeasurePosition {
                    measure_number: info.measure_number,
                    beat_in_measure: (beat - info.start_beat).max(0.0),
                    time_signature: info.time_signature,
                }
            }
            None => self.walk_to_beat(beat),
        }
    }

    /// Piecewise walk over the change list, unbounded.
    fn walk_to_beat(&self, beat: f64) -> MeasurePosition {
        let mut segment_start_beat = 0.0;
        let mut segment_start_measure = 0usize;
        let mut ts = self.base;

        for change in &self.changes {
            let measures = (change.measure_number - segment_start_measure) as f64;
            let segment_end_beat = segment_start_beat + measures * ts.beats();
            if beat < segment_end_beat - BEAT_EPSILON {
                break;
            }
            segment_start_beat = segment_end_beat;
            segment_start_measure = change.measure_number;
            ts = change.time_signature;
        }

        let offset = beat - segment_start_beat;
        let whole = (offset / ts.beats() + BEAT_EPSILON).floor();
        MeasurePosition {
            measure_number: segment_start_measure.saturating_add(whole as usize),
            beat_in_measure: (offset - whole * ts.beats()).max(0.0),
            time_signature: ts,
        }
    }

    /// Precompute `total_measures` entries of [`MeasureInfo`].
    pub fn build_measure_table(&mut self, total_measures: usize) {
        let total_measures = total_measures.min(MAX_MEASURES);
        let mut table = Vec::with_capacity(total_measures);
        let mut start_beat = 0.0;
        for measure_number in 0..total_measures {
            let time_signature = self.time_signature_at(measure_number);
            let beats = time_signature.beats();
            table.push(MeasureInfo {
                measure_number,
                start_beat,
                end_beat: start_beat + beats,
                beats_in_measure: beats,
                time_signature,
            });
            start_beat += beats;
        }
        self.table = table;
    }

    pub fn measure_count(&self) -> usize {
        self.table.len()
    }

    /// Score beat at which the built grid ends.
    pub fn total_beats(&self) -> f64 {
        self.absolute_beat_for_measure(self.table.len())
    }

    /// Number of measures the composition occupies: enough to hold the end
    /// of its last note and every marked repeat/volta boundary.
    pub fn measure_count_for(&self, composition: &Composition) -> usize {
        let end = composition.last_note_end();
        let by_notes = if end <= 0.0 {
            0
        } else {
            let pos = if self.changes.is_empty() {
                self.measure_from_absolute_beat(end)
            } else {
                self.walk_to_beat(end)
            };
            if pos.beat_in_measure <= BEAT_EPSILON {
                pos.measure_number
            } else {
                pos.measure_number.saturating_add(1)
            }
        };
        let count = by_notes.max(composition.last_marked_boundary());
        if count > MAX_MEASURES {
            log::warn!(
                "composition reaches measure {count}; anything past measure {MAX_MEASURES} is skipped"
            );
            return MAX_MEASURES;
        }
        count
    }
}
