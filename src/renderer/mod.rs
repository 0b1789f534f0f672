//! Score renderer: lays a song out on wrapped staff lines and draws it as SVG.
//!
//! The layout ([`compute_layout`]) is the part playback depends on: the
//! cursor timeline is projected through the same systems and beat widths
//! that place the notes. The SVG output is a reference rendering surface
//! that hosts can show directly or replace with their own drawing.

mod beat_map;
mod constants;
mod layout;
mod notes;
mod staff;
mod svg_builder;

pub use layout::{compute_layout, BarType, MeasureLayout, RenderedNote, ScoreLayout, SystemLayout};

use crate::config::LayoutOptions;
use crate::measures::MeasureMap;
use crate::model::Song;
use crate::player::{CursorFrame, FrameSink};
use constants::*;
use notes::{render_cursor, render_notes};
use staff::*;
use svg_builder::SvgBuilder;

// ═══════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════

/// Lay out and render a song with no playback overlay.
pub fn render_song_to_svg(song: &Song, options: &LayoutOptions) -> String {
    let measures = MeasureMap::for_song(song);
    let layout = compute_layout(song, &measures, options);
    render_layout_to_svg(&layout, None)
}

/// Draw a computed layout. When `frame` is given, the active note is
/// highlighted and the playback cursor is drawn on top.
pub fn render_layout_to_svg(layout: &ScoreLayout, frame: Option<&CursorFrame>) -> String {
    let mut svg = SvgBuilder::new(layout.page_width, layout.total_height);
    svg.rect(0.0, 0.0, layout.page_width, layout.total_height, "white");

    for system in &layout.systems {
        let staff_y = system.top_px;
        render_staff_lines(&mut svg, PAGE_MARGIN_LEFT, system.staff_right_px, staff_y);
        render_clef(&mut svg, PAGE_MARGIN_LEFT, staff_y);
        if system.index == 0 {
            render_time_signature(&mut svg, PAGE_MARGIN_LEFT + CLEF_SPACE, staff_y, &layout.initial_time_signature);
        }
        render_barlines(&mut svg, system);

        for measure in &system.measures {
            if let Some(ts) = measure.time_signature_shown {
                // After the repeat-start glyph when both open this measure.
                let mut x = system.staff_left_px + measure.box_offset_px;
                if measure.repeat_start {
                    x += REPEAT_SIGN_SPACE;
                }
                render_time_signature(&mut svg, x, staff_y, &ts);
            }
        }
        render_volta_brackets(&mut svg, system, &layout.volta_brackets);
    }

    let active = frame.and_then(|f| f.active_note_id.as_deref());
    render_notes(&mut svg, layout, active);

    if let Some(f) = frame {
        render_cursor(&mut svg, layout, f.cursor_x_px, f.cursor_system_index);
    }

    svg.build()
}

// ═══════════════════════════════════════════════════════════════════════
// SvgSurface
// ═══════════════════════════════════════════════════════════════════════

/// A [`FrameSink`] that keeps the latest layout and frame and redraws them
/// as SVG on request.
#[derive(Debug, Default)]
pub struct SvgSurface {
    layout: Option<ScoreLayout>,
    frame: Option<CursorFrame>,
    triggered: Vec<String>,
}

impl SvgSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(&self) -> Option<&ScoreLayout> {
        self.layout.as_ref()
    }

    pub fn frame(&self) -> Option<&CursorFrame> {
        self.frame.as_ref()
    }

    /// Note ids in the order their audio triggers were reported.
    pub fn triggered(&self) -> &[String] {
        &self.triggered
    }

    /// The current picture, or `None` before any layout was delivered.
    pub fn svg(&self) -> Option<String> {
        self.layout
            .as_ref()
            .map(|layout| render_layout_to_svg(layout, self.frame.as_ref()))
    }
}

impl FrameSink for SvgSurface {
    fn on_layout(&mut self, layout: &ScoreLayout) {
        self.layout = Some(layout.clone());
        self.frame = None;
        self.triggered.clear();
    }

    fn on_frame(&mut self, frame: &CursorFrame) {
        self.frame = Some(frame.clone());
    }

    fn on_note_triggered(&mut self, note_id: &str) {
        self.triggered.push(note_id.to_string());
    }

    fn on_clear(&mut self) {
        self.frame = None;
    }
}
