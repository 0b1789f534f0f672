//! Error types.
//!
//! Malformed repeat structure is never an error: it is skipped with a
//! warning so a half-edited score still lays out and plays. What remains
//! here are inputs nothing can be built from, and playback preconditions.

use thiserror::Error;

/// Errors from decoding or validating score input.
#[derive(Error, Debug)]
pub enum ScoreError {
    /// The JSON exchange form could not be decoded
    #[error("Invalid score JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A meter with a zero numerator or denominator
    #[error("Invalid time signature {numerator}/{denominator}")]
    InvalidTimeSignature { numerator: u32, denominator: u32 },

    /// Tempo must be a positive number of beats per minute
    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),
}

/// Result type for score operations
pub type ScoreResult<T> = Result<T, ScoreError>;

/// Reasons Play refuses to start. Both are reported to the user and leave
/// the transport untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// The sound engine has not finished starting up
    #[error("Audio is not ready yet. Enable sound and press play again.")]
    EngineNotReady,

    /// No playable notes in the composition
    #[error("Nothing to play: add some notes first.")]
    EmptyComposition,

    /// The song snapshot failed validation
    #[error("Cannot play this song: {0}")]
    InvalidSong(String),
}

impl From<ScoreError> for PlaybackError {
    fn from(e: ScoreError) -> Self {
        PlaybackError::InvalidSong(e.to_string())
    }
}
