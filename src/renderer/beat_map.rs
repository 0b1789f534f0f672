//! Score beat ↔ x position within a laid out system.

use super::layout::{MeasureLayout, ScoreLayout, SystemLayout};

const BEAT_EPSILON: f64 = 1e-9;

impl SystemLayout {
    pub fn end_score_beat(&self) -> f64 {
        self.start_score_beat + self.total_beats
    }

    pub fn contains_score_beat(&self, beat: f64) -> bool {
        beat >= self.start_score_beat - BEAT_EPSILON && beat < self.end_score_beat() - BEAT_EPSILON
    }

    pub fn measure(&self, measure_number: usize) -> Option<&MeasureLayout> {
        measure_number
            .checked_sub(self.start_measure)
            .and_then(|i| self.measures.get(i))
    }

    /// Index into `measures` of the measure holding `beat`, clamped to the
    /// system's measures.
    pub fn measure_index_at(&self, beat: f64) -> usize {
        let local = beat - self.start_score_beat;
        let idx = self
            .measures
            .partition_point(|m| m.start_beat_in_system + m.beats_in_measure <= local + BEAT_EPSILON);
        idx.min(self.measures.len().saturating_sub(1))
    }

    /// Score beat at which measure `idx` ends.
    pub fn measure_end_beat(&self, idx: usize) -> f64 {
        self.measures.get(idx).map_or(self.end_score_beat(), |m| {
            self.start_score_beat + m.start_beat_in_system + m.beats_in_measure
        })
    }

    /// Absolute x of `beat` measured inside measure `idx`. A beat equal to
    /// the measure's end maps to the end of its beat area, before any
    /// trailing decoration.
    pub fn x_in_measure(&self, idx: usize, beat: f64) -> f64 {
        match self.measures.get(idx) {
            Some(m) => {
                let local = (beat - self.start_score_beat - m.start_beat_in_system).clamp(0.0, m.beats_in_measure);
                self.staff_left_px + m.x_offset_px + local * self.beat_width_px
            }
            None => self.staff_left_px,
        }
    }

    /// Absolute x of the gridline for `beat`.
    pub fn x_at_score_beat(&self, beat: f64) -> f64 {
        self.x_in_measure(self.measure_index_at(beat), beat)
    }
}

impl ScoreLayout {
    /// The system whose beat range holds `beat`.
    pub fn system_for_score_beat(&self, beat: f64) -> Option<&SystemLayout> {
        let idx = self
            .systems
            .partition_point(|s| s.end_score_beat() <= beat + BEAT_EPSILON);
        self.systems.get(idx).filter(|s| s.contains_score_beat(beat))
    }

    pub fn system_for_measure(&self, measure_number: usize) -> Option<&SystemLayout> {
        let idx = self.systems.partition_point(|s| s.end_measure <= measure_number);
        self.systems.get(idx).filter(|s| s.start_measure <= measure_number)
    }

    /// Score beat at which the last system ends.
    pub fn total_score_beats(&self) -> f64 {
        self.systems.last().map_or(0.0, SystemLayout::end_score_beat)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LayoutOptions;
    use crate::measures::MeasureMap;
    use crate::model::{Composition, Note, Song, TimeSignature, TimeSignatureChange};
    use crate::renderer::layout::compute_layout;

    fn song() -> Song {
        // 4/4, 4/4, then 3/4
        let notes = (0..14).map(|i| Note::new(format!("n{i}"), "D4", 1.0, i as f64)).collect();
        Song::new(Composition { notes, ..Default::default() }, TimeSignature::default()).with_changes(vec![
            TimeSignatureChange { measure_number: 2, time_signature: TimeSignature::new(3, 4) },
        ])
    }

    #[test]
    fn systems_cover_the_score_in_order() {
        let song = song();
        let measures = MeasureMap::for_song(&song);
        let layout = compute_layout(&song, &measures, &LayoutOptions::default().with_measures_per_system(2));
        assert_eq!(layout.systems.len(), 2);
        assert_eq!(layout.systems[1].start_score_beat, 8.0);
        assert_eq!(layout.total_score_beats(), 14.0);

        assert_eq!(layout.system_for_score_beat(7.99).map(|s| s.index), Some(0));
        assert_eq!(layout.system_for_score_beat(8.0).map(|s| s.index), Some(1));
        assert!(layout.system_for_score_beat(14.0).is_none());
        assert_eq!(layout.system_for_measure(3).map(|s| s.index), Some(1));
    }

    #[test]
    fn x_grows_with_beat_inside_a_system() {
        let song = song();
        let measures = MeasureMap::for_song(&song);
        let layout = compute_layout(&song, &measures, &LayoutOptions::default().with_measures_per_system(4));
        let s = &layout.systems[0];
        let mut last = f64::MIN;
        for i in 0..56 {
            let x = s.x_at_score_beat(i as f64 * 0.25);
            assert!(x > last, "beat {}", i as f64 * 0.25);
            last = x;
        }
        assert!(last < s.staff_right_px);
        assert!((s.x_in_measure(3, s.measure_end_beat(3)) - s.staff_right_px).abs() < 1e-9);
    }
}
