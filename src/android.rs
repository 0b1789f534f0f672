//! JNI bindings for Android.
//!
//! These functions are called from Kotlin via the JNI bridge. Songs and
//! options cross the boundary as JSON strings; any failure returns null.

use jni::objects::{JClass, JString};
use jni::sys::{jfloat, jstring};
use jni::JNIEnv;

use crate::{playback_map_json, render_json_to_svg, ScoreResult};

fn read_string(env: &mut JNIEnv, s: &JString) -> Option<String> {
    if s.is_null() {
        return None;
    }
    env.get_string(s).ok().map(Into::into)
}

fn to_jstring(env: &mut JNIEnv, result: ScoreResult<String>) -> jstring {
    match result {
        Ok(s) => match env.new_string(&s) {
            Ok(js) => js.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(e) => {
            log::warn!("{e}");
            std::ptr::null_mut()
        }
    }
}

/// Render a song to SVG.
///
/// Called from Kotlin as:
///   external fun renderSong(songJson: String, optionsJson: String?, pageWidth: Float): String?
#[no_mangle]
pub extern "system" fn Java_com_scoreflow_app_ScoreFlow_renderSong(
    mut env: JNIEnv,
    _class: JClass,
    song_json: JString,
    options_json: JString,
    page_width: jfloat,
) -> jstring {
    let Some(song) = read_string(&mut env, &song_json) else {
        return std::ptr::null_mut();
    };
    let options = read_string(&mut env, &options_json);
    let result = crate::with_page_width(options.as_deref(), page_width as f64).and_then(|o| render_json_to_svg(&song, o.as_deref()));
    to_jstring(&mut env, result)
}

/// Compute the playback map for a song as JSON.
///
/// Called from Kotlin as:
///   external fun playbackMap(songJson: String, optionsJson: String?, pageWidth: Float): String?
#[no_mangle]
pub extern "system" fn Java_com_scoreflow_app_ScoreFlow_playbackMap(
    mut env: JNIEnv,
    _class: JClass,
    song_json: JString,
    options_json: JString,
    page_width: jfloat,
) -> jstring {
    let Some(song) = read_string(&mut env, &song_json) else {
        return std::ptr::null_mut();
    };
    let options = read_string(&mut env, &options_json);
    let result = crate::with_page_width(options.as_deref(), page_width as f64).and_then(|o| playback_map_json(&song, o.as_deref()));
    to_jstring(&mut env, result)
}
