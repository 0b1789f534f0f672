//! Data model for a beat-addressed composition.
//!
//! These structures capture what the layout and playback pipeline needs:
//! notes placed on an absolute beat axis, repeat markers on measure
//! boundaries, volta brackets, and a sparse list of meter changes.
//! Everything here is owned by the host and treated as a read-only snapshot.

use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};
use crate::measures::MAX_MEASURES;

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats per measure (e.g., 3 in 3/4)
    pub numerator: u32,
    /// Note value of one beat (e.g., 4 in 3/4)
    pub denominator: u32,
}

impl TimeSignature {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    /// Beats per measure as used on the beat axis. A zero numerator would
    /// stall every measure walk, so it counts as one beat.
    pub fn beats(&self) -> f64 {
        self.numerator.max(1) as f64
    }

    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// A meter change, effective from `measure_number` onward until superseded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSignatureChange {
    pub measure_number: usize,
    pub time_signature: TimeSignature,
}

/// A single note (or explicit rest) on the score beat axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    /// Scientific pitch such as "C4", "F#3", "Bb5", or "REST"
    #[serde(alias = "pitch")]
    pub pitch_symbol: String,
    /// Length in beats (must be > 0)
    pub duration: f64,
    /// Fixed position in the written score, in beats from the start
    pub absolute_beat: f64,
}

impl Note {
    pub fn new(id: impl Into<String>, pitch_symbol: impl Into<String>, duration: f64, absolute_beat: f64) -> Self {
        Self {
            id: id.into(),
            pitch_symbol: pitch_symbol.into(),
            duration,
            absolute_beat,
        }
    }

    pub fn end_beat(&self) -> f64 {
        self.absolute_beat + self.duration
    }

    /// Notes with a negative position or a non-positive length cannot be
    /// placed or played and are skipped by every consumer.
    pub fn is_playable(&self) -> bool {
        self.duration.is_finite()
            && self.absolute_beat.is_finite()
            && self.duration > 0.0
            && self.absolute_beat >= 0.0
    }
}

/// Which side of a repeat section a marker closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatKind {
    Start,
    End,
}

/// One half of a repeat pair. A `start` and an `end` marker sharing the same
/// `pair_id` enclose the measures `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatMarker {
    pub id: String,
    pub pair_id: String,
    #[serde(rename = "type")]
    pub kind: RepeatKind,
    /// Measure boundary the marker sits on
    pub measure_number: usize,
}

impl RepeatMarker {
    pub fn start(id: impl Into<String>, pair_id: impl Into<String>, measure_number: usize) -> Self {
        Self { id: id.into(), pair_id: pair_id.into(), kind: RepeatKind::Start, measure_number }
    }

    pub fn end(id: impl Into<String>, pair_id: impl Into<String>, measure_number: usize) -> Self {
        Self { id: id.into(), pair_id: pair_id.into(), kind: RepeatKind::End, measure_number }
    }
}

/// A first/second (or Nth) ending: measures `[start_measure, end_measure)`
/// that belong only to pass `volta_number` of the repeat `repeat_pair_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoltaBracket {
    pub id: String,
    pub repeat_pair_id: String,
    pub start_measure: usize,
    pub end_measure: usize,
    #[serde(alias = "number")]
    pub volta_number: u32,
}

/// The notes and repeat structure of one piece.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub notes: Vec<Note>,
    #[serde(default)]
    pub repeat_markers: Vec<RepeatMarker>,
    #[serde(default)]
    pub volta_brackets: Vec<VoltaBracket>,
}

impl Composition {
    /// True when there is nothing that could produce a note or rest.
    pub fn is_empty(&self) -> bool {
        !self.notes.iter().any(Note::is_playable)
    }

    /// Beat at which the last playable note ends.
    pub fn last_note_end(&self) -> f64 {
        self.notes
            .iter()
            .filter(|n| n.is_playable())
            .map(Note::end_beat)
            .fold(0.0, f64::max)
    }

    /// Highest measure boundary referenced by a repeat marker or volta
    /// bracket, ignoring boundaries past [`MAX_MEASURES`].
    pub fn last_marked_boundary(&self) -> usize {
        let repeats = self.repeat_markers.iter().map(|m| m.measure_number);
        let voltas = self.volta_brackets.iter().map(|v| v.end_measure);
        repeats
            .chain(voltas)
            .filter(|&m| m <= MAX_MEASURES)
            .max()
            .unwrap_or(0)
    }
}

/// Everything a playback session snapshots when Play is pressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub composition: Composition,
    #[serde(default)]
    pub time_signature: TimeSignature,
    #[serde(default)]
    pub time_signature_changes: Vec<TimeSignatureChange>,
    /// Quarter-note beats per minute
    #[serde(default = "default_tempo")]
    pub tempo: f64,
}

fn default_tempo() -> f64 {
    crate::timemap::DEFAULT_TEMPO
}

impl Song {
    pub fn new(composition: Composition, time_signature: TimeSignature) -> Self {
        Self {
            composition,
            time_signature,
            time_signature_changes: Vec::new(),
            tempo: default_tempo(),
        }
    }

    pub fn with_changes(mut self, changes: Vec<TimeSignatureChange>) -> Self {
        self.time_signature_changes = changes;
        self
    }

    pub fn with_tempo(mut self, tempo: f64) -> Self {
        self.tempo = tempo;
        self
    }

    /// Parse a song from its JSON exchange form.
    pub fn from_json(json: &str) -> ScoreResult<Self> {
        let song: Song = serde_json::from_str(json)?;
        song.validate()?;
        Ok(song)
    }

    /// Reject meters and tempi that no layout or schedule can be built from.
    /// Malformed repeat structure is not an error here; it is skipped later.
    pub fn validate(&self) -> ScoreResult<()> {
        let meters = std::iter::once(&self.time_signature)
            .chain(self.time_signature_changes.iter().map(|c| &c.time_signature));
        for ts in meters {
            if !ts.is_valid() {
                return Err(ScoreError::InvalidTimeSignature {
                    numerator: ts.numerator,
                    denominator: ts.denominator,
                });
            }
        }
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(ScoreError::InvalidTempo(self.tempo));
        }
        Ok(())
    }
}
