//! The sound engine contract.
//!
//! Synthesis and the audio context live in the host. The synchronizer
//! only needs a clock it can read and a way to queue notes against that
//! same clock.

/// An audio backend driven by the [`Synchronizer`](crate::player::Synchronizer).
///
/// All times are seconds on the engine's own monotonic clock, the one
/// [`now`](SoundEngine::now) reads. Notes are queued ahead of time with an
/// absolute start time, so audio onsets never depend on when the host's
/// frame loop happens to run.
pub trait SoundEngine {
    /// False until the audio context has started. Play refuses to start
    /// while this is false.
    fn is_ready(&self) -> bool;

    /// Current time on the audio clock.
    fn now(&self) -> f64;

    /// Queue a note to sound at `at_time` for `duration_secs`.
    /// `pitch_code` is a MIDI note number; rests are never passed here.
    fn trigger_note(&mut self, pitch_code: u8, duration_secs: f64, at_time: f64);

    /// Cancel every queued note and callback and cut anything sounding.
    fn silence(&mut self);

    /// Ask the engine to call
    /// [`Synchronizer::on_note_fired`](crate::player::Synchronizer::on_note_fired)
    /// with `index` when its clock reaches `at_time`. Returns false when the
    /// engine has no callback scheduling; the synchronizer then switches the
    /// highlight from its frame loop instead.
    fn schedule_callback(&mut self, _index: usize, _at_time: f64) -> bool {
        false
    }

    /// Start a held note (manual key press).
    fn trigger_attack(&mut self, _pitch_code: u8) {}

    /// Release a held note.
    fn trigger_release(&mut self, _pitch_code: u8) {}
}

impl<E: SoundEngine + ?Sized> SoundEngine for Box<E> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn now(&self) -> f64 {
        (**self).now()
    }

    fn trigger_note(&mut self, pitch_code: u8, duration_secs: f64, at_time: f64) {
        (**self).trigger_note(pitch_code, duration_secs, at_time)
    }

    fn silence(&mut self) {
        (**self).silence()
    }

    fn schedule_callback(&mut self, index: usize, at_time: f64) -> bool {
        (**self).schedule_callback(index, at_time)
    }

    fn trigger_attack(&mut self, pitch_code: u8) {
        (**self).trigger_attack(pitch_code)
    }

    fn trigger_release(&mut self, pitch_code: u8) {
        (**self).trigger_release(pitch_code)
    }
}
