//! Synchronizer tests: a recording sound engine whose clock the test
//! advances by hand, with the SVG surface as the rendering sink.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use scoreflow::{
    Composition, LayoutOptions, Note, PlaybackError, PlaybackOptions, Song, SoundEngine, SvgSurface,
    Synchronizer, TimeSignature, TransportState,
};

#[derive(Debug, Default)]
struct RecordingEngine {
    ready: bool,
    now: f64,
    queued: Vec<(u8, f64)>,
    /// Engine time at which each queued note was handed over
    sent_at: Vec<f64>,
    calls_back: bool,
    callbacks: Vec<(usize, f64)>,
    silenced: usize,
    attacks: Vec<u8>,
    releases: Vec<u8>,
}

impl SoundEngine for RecordingEngine {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn now(&self) -> f64 {
        self.now
    }

    fn trigger_note(&mut self, pitch_code: u8, _duration_secs: f64, at_time: f64) {
        self.queued.push((pitch_code, at_time));
        self.sent_at.push(self.now);
    }

    fn silence(&mut self) {
        self.silenced += 1;
        self.callbacks.clear();
    }

    fn schedule_callback(&mut self, index: usize, at_time: f64) -> bool {
        if self.calls_back {
            self.callbacks.push((index, at_time));
        }
        self.calls_back
    }

    fn trigger_attack(&mut self, pitch_code: u8) {
        self.attacks.push(pitch_code);
    }

    fn trigger_release(&mut self, pitch_code: u8) {
        self.releases.push(pitch_code);
    }
}

type Session = Synchronizer<RecordingEngine, SvgSurface>;

fn scale() -> Song {
    let notes = ["C4", "D4", "E4", "F4", "G4", "A4", "B4", "C5"]
        .iter()
        .enumerate()
        .map(|(i, p)| Note::new(format!("n{i}"), *p, 1.0, i as f64))
        .collect();
    Song::new(Composition { notes, ..Default::default() }, TimeSignature::default())
}

fn synchronizer(options: PlaybackOptions, layout: LayoutOptions) -> Session {
    let engine = RecordingEngine { ready: true, ..Default::default() };
    Synchronizer::with_options(engine, SvgSurface::new(), layout, options)
}

fn no_delay() -> PlaybackOptions {
    PlaybackOptions { start_delay_secs: 0.0, ..Default::default() }
}

/// Tick every `step` seconds of engine time from `from` through `to`.
fn run(sync: &mut Session, from: f64, to: f64, step: f64) {
    let n = ((to - from) / step).round() as usize;
    for i in 0..=n {
        sync.engine_mut().now = from + i as f64 * step;
        sync.tick();
    }
}

fn codes(sync: &Session) -> Vec<u8> {
    sync.engine().queued.iter().map(|q| q.0).collect()
}

#[test]
fn play_refuses_before_the_engine_is_ready() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.engine_mut().ready = false;

    assert_eq!(sync.play(&scale()), Err(PlaybackError::EngineNotReady));
    assert_eq!(sync.state(), TransportState::Stopped);
    assert!(sync.sink().layout().is_none());

    sync.engine_mut().ready = true;
    assert_eq!(sync.play(&scale()), Ok(()));
    assert_eq!(sync.state(), TransportState::Playing);
}

#[test]
fn play_refuses_empty_and_invalid_songs() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());

    let empty = Song::new(Composition::default(), TimeSignature::default());
    assert_eq!(sync.play(&empty), Err(PlaybackError::EmptyComposition));

    let silent = Song::new(
        Composition { notes: vec![Note::new("z", "C4", 0.0, 0.0)], ..Default::default() },
        TimeSignature::default(),
    );
    assert_eq!(sync.play(&silent), Err(PlaybackError::EmptyComposition));

    let stalled = scale().with_tempo(0.0);
    assert!(matches!(sync.play(&stalled), Err(PlaybackError::InvalidSong(_))));
    assert_eq!(sync.state(), TransportState::Stopped);
}

#[test]
fn notes_are_queued_at_exact_audio_times() {
    let options = PlaybackOptions { start_delay_secs: 0.05, ..Default::default() };
    let mut sync = synchronizer(options, LayoutOptions::default());
    sync.engine_mut().now = 3.0;
    sync.play(&scale()).unwrap();
    assert_eq!(sync.engine().queued.len(), 8);

    // Irregular frame times must not move the onsets.
    for now in [3.0, 3.17, 3.4, 3.93, 4.41, 4.6, 5.2, 5.55, 6.02, 6.5] {
        sync.engine_mut().now = now;
        sync.tick();
    }
    let times: Vec<f64> = sync.engine().queued.iter().map(|q| q.1).collect();
    assert_eq!(times.len(), 8);
    for (i, t) in times.iter().enumerate() {
        assert!((t - (3.05 + i as f64 * 0.5)).abs() < 1e-9, "note {i} queued at {t}");
    }
}

#[test]
fn pause_and_resume_neither_lose_nor_repeat_notes() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.play(&scale()).unwrap();
    run(&mut sync, 0.0, 1.2, 0.05);

    sync.pause();
    assert_eq!(sync.state(), TransportState::Paused);
    assert_eq!(codes(&sync), vec![60, 62, 64, 65, 67, 69, 71, 72]);
    assert_eq!(sync.engine().silenced, 1);

    // Frozen while paused.
    sync.engine_mut().now = 5.0;
    assert!(sync.tick().is_none());
    let beat = sync.play_beat().unwrap_or_default();
    assert!((beat - 2.4).abs() < 1e-9);

    // Play while paused resumes the same session.
    let other = Song::new(
        Composition { notes: vec![Note::new("x", "C2", 1.0, 0.0)], ..Default::default() },
        TimeSignature::default(),
    );
    sync.play(&other).unwrap();
    assert_eq!(sync.state(), TransportState::Playing);
    run(&mut sync, 5.0, 9.0, 0.05);

    // The silenced tail goes back on the engine at the new origin.
    let requeued: Vec<u8> = codes(&sync).split_off(8);
    assert_eq!(requeued, vec![65, 67, 69, 71, 72]);
    let resumed_at = sync.engine().queued[8].1;
    assert!((resumed_at - 5.3).abs() < 1e-9);
    let ids: Vec<&str> = sync.sink().triggered().iter().map(String::as_str).collect();
    assert_eq!(ids, vec!["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7"]);
    assert_eq!(sync.state(), TransportState::Stopped);
    assert_eq!(sync.engine().silenced, 1);
}

#[test]
fn a_stalled_frame_loop_never_makes_notes_late() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.engine_mut().now = 1.0;
    sync.play(&scale()).unwrap();

    // No frames for three seconds.
    sync.engine_mut().now = 4.0;
    assert!(sync.tick().is_some());

    let engine = sync.engine();
    assert_eq!(engine.queued.len(), 8);
    for ((_, at), sent) in engine.queued.iter().zip(&engine.sent_at) {
        assert!(at >= sent, "note for {at} handed over at {sent}");
    }
}

#[test]
fn a_late_last_frame_lets_the_tail_ring() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.play(&scale()).unwrap();
    run(&mut sync, 0.0, 3.0, 0.1);

    sync.engine_mut().now = 60.0;
    assert!(sync.tick().is_none());
    assert_eq!(sync.state(), TransportState::Stopped);
    assert_eq!(sync.engine().queued.len(), 8);
    assert_eq!(sync.engine().silenced, 0);
    assert!(sync.sink().frame().is_none());
}

#[test]
fn engine_callbacks_drive_the_highlight() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.engine_mut().calls_back = true;
    sync.engine_mut().now = 2.0;
    sync.play(&scale()).unwrap();

    let callbacks = sync.engine().callbacks.clone();
    assert_eq!(callbacks.len(), 8);
    assert_eq!(callbacks[3], (3, 3.5));

    // No frame runs between the callbacks.
    sync.on_note_fired(0);
    assert_eq!(sync.active_note_id(), Some("n0"));
    sync.on_note_fired(1);
    assert_eq!(sync.active_note_id(), Some("n1"));
    let ids: Vec<&str> = sync.sink().triggered().iter().map(String::as_str).collect();
    assert_eq!(ids, vec!["n0", "n1"]);

    // Frames leave the reported note alone.
    sync.engine_mut().now = 2.7;
    let frame = sync.tick();
    assert_eq!(frame.and_then(|f| f.active_note_id), Some("n1".to_string()));

    // Late callbacks after a pause are dropped.
    sync.pause();
    sync.on_note_fired(2);
    assert_eq!(sync.active_note_id(), Some("n1"));
}

#[test]
fn cursor_moves_forward_and_playback_ends_by_itself() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.play(&scale()).unwrap();

    let mut xs = Vec::new();
    for i in 0..=100 {
        sync.engine_mut().now = i as f64 * 0.05;
        if let Some(frame) = sync.tick() {
            xs.push(frame.cursor_x_px);
        }
    }
    assert!(xs.len() >= 70);
    assert!(xs.windows(2).all(|w| w[1] >= w[0] - 1e-9), "cursor went backwards: {xs:?}");
    assert_eq!(sync.state(), TransportState::Stopped);
    assert!(sync.sink().frame().is_none());
}

#[test]
fn stop_is_idempotent_and_restarts_from_the_top() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.stop();
    sync.stop();
    assert_eq!(sync.state(), TransportState::Stopped);

    sync.play(&scale()).unwrap();
    run(&mut sync, 0.0, 2.0, 0.1);
    sync.stop();
    sync.stop();
    assert_eq!(sync.state(), TransportState::Stopped);
    assert!(sync.play_beat().is_none());

    sync.engine_mut().queued.clear();
    sync.engine_mut().now = 20.0;
    sync.play(&scale()).unwrap();
    sync.tick();
    assert_eq!(sync.engine().queued.first().map(|q| q.0), Some(60));
}

#[test]
fn a_new_session_picks_up_edits() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.play(&scale()).unwrap();
    assert_eq!(sync.plan().map(|p| p.events.len()), Some(8));

    let mut edited = scale();
    edited.composition.notes.truncate(3);
    // Play while playing changes nothing.
    sync.play(&edited).unwrap();
    assert_eq!(sync.plan().map(|p| p.events.len()), Some(8));

    sync.stop();
    sync.play(&edited).unwrap();
    assert_eq!(sync.plan().map(|p| p.events.len()), Some(3));
}

#[test]
fn viewport_follows_the_cursor_down_the_page() {
    let notes = (0..64).map(|i| Note::new(format!("n{i}"), "G4", 1.0, i as f64)).collect();
    let song = Song::new(Composition { notes, ..Default::default() }, TimeSignature::default()).with_tempo(240.0);
    let layout = LayoutOptions::default().with_measures_per_system(2);

    let scrolls = Rc::new(RefCell::new(Vec::new()));
    let mut sync = synchronizer(no_delay(), layout.clone());
    let sink = Rc::clone(&scrolls);
    sync.set_viewport_follow(move |left: f64, top: f64| sink.borrow_mut().push((left, top)));
    sync.play(&song).unwrap();
    run(&mut sync, 0.0, 17.0, 0.1);

    let scrolls = scrolls.borrow();
    assert!(!scrolls.is_empty());
    assert!(scrolls.iter().all(|(left, top)| *left >= 0.0 && *top >= 0.0));
    assert!(scrolls.windows(2).all(|w| w[1].1 >= w[0].1));
    assert_eq!(scrolls[0].1, 0.0);
    let mut tops: Vec<f64> = scrolls.iter().map(|s| s.1).collect();
    tops.dedup();
    assert_eq!(tops.len(), 8);

    let quiet = Rc::new(RefCell::new(Vec::new()));
    let options = PlaybackOptions { follow_cursor: false, ..no_delay() };
    let mut sync = synchronizer(options, layout);
    let sink = Rc::clone(&quiet);
    sync.set_viewport_follow(move |left: f64, top: f64| sink.borrow_mut().push((left, top)));
    sync.play(&song).unwrap();
    run(&mut sync, 0.0, 2.0, 0.1);
    assert!(quiet.borrow().is_empty());
}

#[test]
fn surface_shows_the_playing_note() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.play(&scale()).unwrap();
    sync.engine_mut().now = 0.6;
    sync.tick();

    let frame = sync.sink().frame().cloned();
    assert_eq!(frame.and_then(|f| f.active_note_id), Some("n1".to_string()));
    let svg = sync.sink().svg().unwrap_or_default();
    assert!(svg.contains(r#"data-note-id="n1""#));
    assert!(svg.contains(r#"data-note-id="n7""#));
}

#[test]
fn held_keys_sound_only_pitches() {
    let mut sync = synchronizer(no_delay(), LayoutOptions::default());
    sync.press_key("A4");
    sync.press_key("REST");
    sync.release_key("A4");
    assert_eq!(sync.engine().attacks, vec![69]);
    assert_eq!(sync.engine().releases, vec![69]);

    sync.engine_mut().ready = false;
    sync.press_key("C4");
    assert_eq!(sync.engine().attacks, vec![69]);
}
