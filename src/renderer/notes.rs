//! Notehead, stem, ledger line and rest rendering, plus the playback
//! overlay (active-note highlight and cursor).

use super::constants::*;
use super::layout::{RenderedNote, ScoreLayout};
use super::svg_builder::SvgBuilder;

pub(super) fn render_notes(svg: &mut SvgBuilder, layout: &ScoreLayout, active_note_id: Option<&str>) {
    for note in &layout.notes {
        let Some(system) = layout.systems.get(note.system_index) else {
            continue;
        };
        let staff_y = system.top_px;
        let color = if active_note_id == Some(note.note_id.as_str()) {
            HIGHLIGHT_COLOR
        } else {
            NOTE_COLOR
        };

        if note.is_rest {
            render_rest(svg, note, staff_y, color);
            continue;
        }

        render_ledger_lines(svg, note.x_px, note.y_px, staff_y);
        svg.notehead(&note.note_id, note.x_px, note.y_px, note.duration < 2.0, color);
        if note.duration < 4.0 {
            // Stems point down from the middle line up.
            let middle = staff_y + STAFF_HEIGHT / 2.0;
            if note.y_px <= middle {
                let x = note.x_px - NOTEHEAD_RX + STEM_WIDTH / 2.0;
                svg.line(x, note.y_px, x, note.y_px + STEM_LENGTH, color, STEM_WIDTH);
            } else {
                let x = note.x_px + NOTEHEAD_RX - STEM_WIDTH / 2.0;
                svg.line(x, note.y_px, x, note.y_px - STEM_LENGTH, color, STEM_WIDTH);
            }
        }
    }
}

fn render_rest(svg: &mut SvgBuilder, note: &RenderedNote, staff_y: f64, color: &str) {
    let y = staff_y + STAFF_LINE_SPACING;
    if note.duration >= 2.0 {
        // Whole and half rests are blocks hanging from / sitting on a line.
        let h = STAFF_LINE_SPACING / 2.0;
        let block_y = if note.duration >= 4.0 { y } else { y + STAFF_LINE_SPACING - h };
        svg.rect(note.x_px - 5.0, block_y, 10.0, h, color);
    } else {
        svg.line(note.x_px - 3.0, y, note.x_px + 3.0, y + 8.0, color, 2.0);
        svg.line(note.x_px + 3.0, y + 8.0, note.x_px - 3.0, y + 14.0, color, 2.0);
        svg.line(note.x_px - 3.0, y + 14.0, note.x_px + 2.0, y + 20.0, color, 2.0);
    }
}

// ── Ledger lines ────────────────────────────────────────────────────

fn render_ledger_lines(svg: &mut SvgBuilder, x: f64, note_y: f64, staff_y: f64) {
    let top = staff_y;
    let bottom = staff_y + STAFF_HEIGHT;
    let x1 = x - NOTEHEAD_RX - LEDGER_LINE_EXTEND;
    let x2 = x + NOTEHEAD_RX + LEDGER_LINE_EXTEND;

    let mut y = top - STAFF_LINE_SPACING;
    while y >= note_y - 1.0 {
        svg.line(x1, y, x2, y, STAFF_COLOR, LEDGER_LINE_WIDTH);
        y -= STAFF_LINE_SPACING;
    }

    let mut y = bottom + STAFF_LINE_SPACING;
    while y <= note_y + 1.0 {
        svg.line(x1, y, x2, y, STAFF_COLOR, LEDGER_LINE_WIDTH);
        y += STAFF_LINE_SPACING;
    }
}

// ── Playback cursor ─────────────────────────────────────────────────

pub(super) fn render_cursor(svg: &mut SvgBuilder, layout: &ScoreLayout, x: f64, system_index: usize) {
    let Some(system) = layout.systems.get(system_index) else {
        return;
    };
    let top = system.top_px - STAFF_LINE_SPACING;
    let bottom = system.top_px + STAFF_HEIGHT + STAFF_LINE_SPACING;
    svg.line(x, top, x, bottom, CURSOR_COLOR, CURSOR_WIDTH);
}
