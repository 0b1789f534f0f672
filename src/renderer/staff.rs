//! Staff, clef, time signature, barline and volta bracket rendering.

use super::constants::*;
use super::layout::{BarType, SystemLayout};
use super::svg_builder::SvgBuilder;
use crate::model::{TimeSignature, VoltaBracket};

pub(super) fn render_staff_lines(svg: &mut SvgBuilder, x1: f64, x2: f64, staff_y: f64) {
    for i in 0..5 {
        let y = staff_y + i as f64 * STAFF_LINE_SPACING;
        svg.line(x1, y, x2, y, STAFF_COLOR, STAFF_LINE_WIDTH);
    }
}

pub(super) fn render_clef(svg: &mut SvgBuilder, x: f64, staff_y: f64) {
    svg.text(x + 2.0, staff_y + 3.4 * STAFF_LINE_SPACING, "\u{1D11E}", 44.0, "normal", NOTE_COLOR, "start");
}

// ═══════════════════════════════════════════════════════════════════════
// Time signature rendering
// ═══════════════════════════════════════════════════════════════════════

pub(super) fn render_time_signature(svg: &mut SvgBuilder, x: f64, staff_y: f64, time: &TimeSignature) {
    let center = x + TIME_SIG_SPACE / 2.0;
    let top_y = staff_y + 1.9 * STAFF_LINE_SPACING;
    let bot_y = staff_y + 3.9 * STAFF_LINE_SPACING;
    svg.text(center, top_y, &time.numerator.to_string(), 20.0, "bold", NOTE_COLOR, "middle");
    svg.text(center, bot_y, &time.denominator.to_string(), 20.0, "bold", NOTE_COLOR, "middle");
}

// ═══════════════════════════════════════════════════════════════════════
// Barline rendering
// ═══════════════════════════════════════════════════════════════════════

fn thin(svg: &mut SvgBuilder, x: f64, staff_y: f64) {
    svg.line(x, staff_y, x, staff_y + STAFF_HEIGHT, BARLINE_COLOR, BARLINE_WIDTH);
}

fn thick(svg: &mut SvgBuilder, x: f64, staff_y: f64) {
    svg.line(x, staff_y, x, staff_y + STAFF_HEIGHT, BARLINE_COLOR, HEAVY_BARLINE_WIDTH);
}

fn dots(svg: &mut SvgBuilder, x: f64, staff_y: f64) {
    svg.circle(x, staff_y + 1.5 * STAFF_LINE_SPACING, 2.0, BARLINE_COLOR);
    svg.circle(x, staff_y + 2.5 * STAFF_LINE_SPACING, 2.0, BARLINE_COLOR);
}

/// Draw one barline. Repeat-start glyphs extend right of `bx` into the
/// following measure's leading decoration; repeat-end glyphs extend left
/// into the preceding measure's trailing decoration.
pub(super) fn render_barline(svg: &mut SvgBuilder, bx: f64, staff_y: f64, bar_type: BarType) {
    match bar_type {
        BarType::Single => thin(svg, bx, staff_y),
        BarType::Final => {
            thin(svg, bx - 5.0, staff_y);
            thick(svg, bx, staff_y);
        }
        BarType::RepeatStart => {
            thick(svg, bx, staff_y);
            thin(svg, bx + 5.0, staff_y);
            dots(svg, bx + 10.0, staff_y);
        }
        BarType::RepeatEnd => {
            dots(svg, bx - 10.0, staff_y);
            thin(svg, bx - 5.0, staff_y);
            thick(svg, bx, staff_y);
        }
        BarType::RepeatBoth => {
            dots(svg, bx - 10.0, staff_y);
            thin(svg, bx - 5.0, staff_y);
            thick(svg, bx, staff_y);
            thin(svg, bx + 5.0, staff_y);
            dots(svg, bx + 10.0, staff_y);
        }
    }
}

pub(super) fn render_barlines(svg: &mut SvgBuilder, system: &SystemLayout) {
    for (i, (&bx, &bar_type)) in system.bar_positions.iter().zip(&system.bar_types).enumerate() {
        // The left edge only gets a glyph when a repeat opens there.
        if i == 0 && bar_type == BarType::Single {
            continue;
        }
        render_barline(svg, bx, system.top_px, bar_type);
    }
}

/// Bracket and number over the measures of each ending on this system.
pub(super) fn render_volta_brackets(svg: &mut SvgBuilder, system: &SystemLayout, brackets: &[VoltaBracket]) {
    let y = system.top_px - 15.0;
    for bracket in brackets {
        let start = bracket.start_measure.max(system.start_measure);
        let end = bracket.end_measure.min(system.end_measure);
        if end <= start {
            continue;
        }
        let (Some(first), Some(last)) = (system.measure(start), system.measure(end - 1)) else {
            continue;
        };
        let x1 = system.staff_left_px + first.box_offset_px;
        let x2 = system.staff_left_px + last.x_offset_px + last.beats_in_measure * system.beat_width_px;

        if start == bracket.start_measure {
            svg.line(x1, y + 10.0, x1, y, BARLINE_COLOR, BARLINE_WIDTH);
            svg.text(x1 + 5.0, y + 11.0, &format!("{}.", bracket.volta_number), 10.0, "normal", BARLINE_COLOR, "start");
        }
        svg.line(x1, y, x2, y, BARLINE_COLOR, BARLINE_WIDTH);
    }
}
