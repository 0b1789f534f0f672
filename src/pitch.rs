//! Pitch symbols: "C4", "F#3", "Bb5", "C##4", "Ebb2", "REST".
//!
//! Turns the symbol stored on a note into the integer pitch code the sound
//! engine takes (MIDI numbering, 0 = rest) and into a vertical staff step.

/// Pitch code for a rest. The sound engine treats it as a no-op.
pub const REST_PITCH_CODE: u8 = 0;

/// A parsed pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    /// Letter name as an index: C=0 … B=6
    pub step: u8,
    /// Semitone alteration (-2 … +2)
    pub alter: i8,
    pub octave: i8,
}

const STEP_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

impl Pitch {
    /// MIDI note number, clamped to 1..=127 so it can never collide with
    /// the rest code.
    pub fn midi(&self) -> u8 {
        let value = (self.octave as i32 + 1) * 12 + STEP_SEMITONES[self.step as usize] + self.alter as i32;
        value.clamp(1, 127) as u8
    }

    /// Diatonic position used for staff placement (C4 = 28).
    pub fn diatonic_index(&self) -> i32 {
        self.octave as i32 * 7 + self.step as i32
    }
}

/// True for symbols that denote a rest rather than a pitch.
pub fn is_rest_symbol(symbol: &str) -> bool {
    let s = symbol.trim();
    s.is_empty() || s.eq_ignore_ascii_case("rest") || s.eq_ignore_ascii_case("r")
}

/// Parse a pitch symbol. Rests and unrecognised symbols yield `None`.
pub fn parse_pitch_symbol(symbol: &str) -> Option<Pitch> {
    let s = symbol.trim();
    if is_rest_symbol(s) {
        return None;
    }

    let mut chars = s.chars();
    let step = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 1,
        'E' => 2,
        'F' => 3,
        'G' => 4,
        'A' => 5,
        'B' => 6,
        _ => return None,
    };

    let rest = chars.as_str();
    let accidental_len = rest
        .find(|c: char| c.is_ascii_digit() || c == '-')
        .unwrap_or(rest.len());
    let (accidentals, octave) = rest.split_at(accidental_len);
    if accidentals.chars().count() > 2 {
        return None;
    }

    let mut alter: i8 = 0;
    for c in accidentals.chars() {
        match c {
            '#' | '♯' => alter += 1,
            'b' | '♭' => alter -= 1,
            'x' => alter += 2,
            _ => return None,
        }
    }
    if !(-2..=2).contains(&alter) {
        return None;
    }

    let octave: i8 = octave.parse().ok()?;
    Some(Pitch { step, alter, octave })
}

/// Pitch code for the sound engine. Unparseable symbols are treated as
/// rests so a typo silences one note instead of aborting playback.
pub fn pitch_code(symbol: &str) -> u8 {
    if is_rest_symbol(symbol) {
        return REST_PITCH_CODE;
    }
    match parse_pitch_symbol(symbol) {
        Some(p) => p.midi(),
        None => {
            log::warn!("unrecognised pitch symbol {symbol:?}; treating it as a rest");
            REST_PITCH_CODE
        }
    }
}

/// Vertical offset of a notehead from the top staff line, treble clef.
/// Rests sit on the middle line.
pub fn staff_offset_y(symbol: &str, line_spacing: f64) -> f64 {
    // G4 sits on the second line from the bottom.
    const G4_INDEX: i32 = 4 * 7 + 4;
    match parse_pitch_symbol(symbol) {
        Some(p) => {
            let ref_y = 3.0 * line_spacing;
            let staff_steps = p.diatonic_index() - G4_INDEX;
            ref_y - staff_steps as f64 * (line_spacing / 2.0)
        }
        None => 2.0 * line_spacing,
    }
}
