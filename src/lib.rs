//! scoreflow: score layout and repeat-aware playback.
//!
//! Lays a beat-addressed composition out on wrapped staff lines of uniform
//! width, unrolls its repeats and endings into a linear performance, and
//! keeps a moving cursor in step with audio while it plays.
//!
//! # Example
//! ```
//! use scoreflow::{Composition, LayoutOptions, Note, Song, TimeSignature};
//!
//! let notes = vec![Note::new("c", "C4", 1.0, 0.0), Note::new("d", "D4", 3.0, 1.0)];
//! let song = Song::new(Composition { notes, ..Default::default() }, TimeSignature::default());
//! let svg = scoreflow::render_song_to_svg(&song, &LayoutOptions::default());
//! assert!(svg.starts_with("<svg"));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod measures;
pub mod model;
pub mod performance;
pub mod pitch;
pub mod playback;
pub mod player;
pub mod renderer;
pub mod timemap;
pub mod transport;
pub mod unroller;

#[cfg(target_os = "android")]
pub mod android;

pub use config::{LayoutOptions, PlaybackOptions};
pub use engine::SoundEngine;
pub use error::{PlaybackError, ScoreError, ScoreResult};
pub use measures::{MeasureInfo, MeasureMap, MeasurePosition, MAX_MEASURES};
pub use model::*;
pub use performance::{expand_performance, PerformanceEvent};
pub use playback::{generate_playback_map, playback_map_to_json, PlaybackMap, PlaybackPlan, Timeline, TimelineSegment};
pub use player::{CursorFrame, FrameSink, Synchronizer, TransportState, ViewportFollow};
pub use renderer::{compute_layout, render_layout_to_svg, render_song_to_svg, ScoreLayout, SvgSurface};
pub use unroller::{unroll, PlaySpan, Unrolled};

/// Decode layout options from JSON; `None` or an empty string gives the defaults.
pub fn parse_layout_options(json: Option<&str>) -> ScoreResult<LayoutOptions> {
    match json.map(str::trim) {
        Some(s) if !s.is_empty() => Ok(serde_json::from_str(s)?),
        _ => Ok(LayoutOptions::default()),
    }
}

/// Decode a song and render it to SVG.
pub fn render_json_to_svg(song_json: &str, options_json: Option<&str>) -> ScoreResult<String> {
    let song = Song::from_json(song_json)?;
    let options = parse_layout_options(options_json)?;
    Ok(render_song_to_svg(&song, &options))
}

/// Decode a song and produce its playback map as JSON.
pub fn playback_map_json(song_json: &str, options_json: Option<&str>) -> ScoreResult<String> {
    let song = Song::from_json(song_json)?;
    let options = parse_layout_options(options_json)?;
    Ok(playback_map_to_json(&generate_playback_map(&song, &options)))
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI — for iOS (static library) and Android (JNI)
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Read an optional C string. Null and invalid UTF-8 both read as `None`.
unsafe fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        unsafe { CStr::from_ptr(ptr) }.to_str().ok()
    }
}

fn into_c_string(result: ScoreResult<String>) -> *mut c_char {
    match result {
        Ok(s) => CString::new(s).map_or(std::ptr::null_mut(), CString::into_raw),
        Err(e) => {
            log::warn!("{e}");
            std::ptr::null_mut()
        }
    }
}

/// Apply a host page width over the decoded options. 0.0 keeps the options' width.
pub(crate) fn with_page_width(options_json: Option<&str>, page_width: f64) -> ScoreResult<Option<String>> {
    if page_width <= 0.0 {
        return Ok(options_json.map(str::to_string));
    }
    let options = parse_layout_options(options_json)?.with_page_width(page_width);
    Ok(Some(serde_json::to_string(&options)?))
}

/// Render a song given as JSON and return SVG as a C string.
/// The caller must free the returned string with `scoreflow_free_string`.
///
/// `options_json` may be null. `page_width` overrides the options' page
/// width when positive.
///
/// # Safety
/// `song_json` must be a valid null-terminated C string; `options_json`
/// must be null or a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn scoreflow_render_json(
    song_json: *const c_char,
    options_json: *const c_char,
    page_width: f64,
) -> *mut c_char {
    let Some(song) = (unsafe { opt_str(song_json) }) else {
        return std::ptr::null_mut();
    };
    let options = unsafe { opt_str(options_json) };
    into_c_string(
        with_page_width(options, page_width).and_then(|opts| render_json_to_svg(song, opts.as_deref())),
    )
}

/// Compute the playback map (systems, notes, timeline segments, events and
/// schedule) for a song given as JSON. Free with `scoreflow_free_string`.
///
/// # Safety
/// Same contract as [`scoreflow_render_json`].
#[no_mangle]
pub unsafe extern "C" fn scoreflow_playback_map_json(
    song_json: *const c_char,
    options_json: *const c_char,
    page_width: f64,
) -> *mut c_char {
    let Some(song) = (unsafe { opt_str(song_json) }) else {
        return std::ptr::null_mut();
    };
    let options = unsafe { opt_str(options_json) };
    into_c_string(
        with_page_width(options, page_width).and_then(|opts| playback_map_json(song, opts.as_deref())),
    )
}

/// Free a string previously returned by scoreflow functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a scoreflow function, or null.
#[no_mangle]
pub unsafe extern "C" fn scoreflow_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG: &str = r#"{
        "composition": {
            "notes": [
                {"id": "a", "pitch": "C4", "duration": 1, "absoluteBeat": 0},
                {"id": "b", "pitch": "G4", "duration": 3, "absoluteBeat": 1}
            ],
            "repeatMarkers": [
                {"id": "s", "pairId": "p", "type": "start", "measureNumber": 0},
                {"id": "e", "pairId": "p", "type": "end", "measureNumber": 1}
            ]
        },
        "timeSignature": {"numerator": 4, "denominator": 4},
        "tempo": 90
    }"#;

    #[test]
    fn ffi_round_trip() {
        let song = CString::new(SONG).unwrap();
        let svg = unsafe { scoreflow_render_json(song.as_ptr(), std::ptr::null(), 500.0) };
        assert!(!svg.is_null());
        let text = unsafe { CStr::from_ptr(svg) }.to_str().unwrap().to_string();
        unsafe { scoreflow_free_string(svg) };
        assert!(text.contains(r#"width="500.0""#));

        let map = unsafe { scoreflow_playback_map_json(song.as_ptr(), std::ptr::null(), 0.0) };
        assert!(!map.is_null());
        let json = unsafe { CStr::from_ptr(map) }.to_str().unwrap().to_string();
        unsafe { scoreflow_free_string(map) };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totalPlayBeats"], 8.0);
        assert_eq!(value["segments"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn bad_input_gives_null() {
        let garbage = CString::new("{not json").unwrap();
        assert!(unsafe { scoreflow_render_json(garbage.as_ptr(), std::ptr::null(), 0.0) }.is_null());
        assert!(unsafe { scoreflow_render_json(std::ptr::null(), std::ptr::null(), 0.0) }.is_null());

        let zero_meter = CString::new(
            r#"{"composition": {"notes": []}, "timeSignature": {"numerator": 0, "denominator": 4}}"#,
        )
        .unwrap();
        assert!(unsafe { scoreflow_playback_map_json(zero_meter.as_ptr(), std::ptr::null(), 0.0) }.is_null());
    }

    #[test]
    fn options_json_is_optional_and_partial() {
        assert_eq!(parse_layout_options(None).unwrap(), LayoutOptions::default());
        assert_eq!(parse_layout_options(Some("  ")).unwrap(), LayoutOptions::default());
        assert_eq!(parse_layout_options(Some(r#"{"spacing": 1.5}"#)).unwrap().spacing, 1.5);
        assert!(parse_layout_options(Some("[")).is_err());
    }

    #[test]
    fn host_page_width_overrides_the_options() {
        let options = Some(r#"{"pageWidth": 400, "measuresPerSystem": 3}"#);
        assert_eq!(with_page_width(options, 0.0).unwrap().as_deref(), options);
        assert_eq!(with_page_width(None, -5.0).unwrap(), None);

        let widened = with_page_width(options, 900.0).unwrap();
        let parsed = parse_layout_options(widened.as_deref()).unwrap();
        assert_eq!((parsed.page_width, parsed.measures_per_system), (900.0, Some(3)));
        assert!(with_page_width(Some("{"), 900.0).is_err());
    }
}
