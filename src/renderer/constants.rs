//! Shared constants for the score renderer (all in SVG user units).

// ── Page & margins ──────────────────────────────────────────────────
pub(super) const PAGE_MARGIN_LEFT: f64 = 50.0;
pub(super) const PAGE_MARGIN_RIGHT: f64 = 30.0;
pub(super) const PAGE_MARGIN_TOP: f64 = 40.0;
pub(super) const PAGE_MARGIN_BOTTOM: f64 = 30.0;

// ── Staff dimensions ────────────────────────────────────────────────
pub(crate) const STAFF_LINE_SPACING: f64 = 10.0; // distance between staff lines
pub(crate) const STAFF_HEIGHT: f64 = 40.0; // 5 lines, 4 spaces
pub(super) const SYSTEM_SPACING: f64 = 90.0; // vertical space between systems
pub(crate) const SYSTEM_ROW_HEIGHT: f64 = STAFF_HEIGHT + SYSTEM_SPACING;

// ── Prefix widths ───────────────────────────────────────────────────
pub(super) const CLEF_SPACE: f64 = 32.0; // horizontal space for clef at system start
pub(super) const TIME_SIG_SPACE: f64 = 24.0;
pub(super) const REPEAT_SIGN_SPACE: f64 = 16.0; // thick bar + thin bar + dots

// ── Beat spacing ────────────────────────────────────────────────────
/// Notes sit this fraction of a beat right of their beat gridline.
pub(crate) const NOTE_VISUAL_OFFSET_BEATS: f64 = 0.25;
/// Floor for a system squeezed by its decorations.
pub(super) const MIN_BEAT_WIDTH_FLOOR: f64 = 4.0;

// ── Note dimensions ─────────────────────────────────────────────────
pub(super) const NOTEHEAD_RX: f64 = 5.5; // notehead ellipse x-radius
pub(super) const NOTEHEAD_RY: f64 = 4.0; // notehead ellipse y-radius
pub(super) const STEM_LENGTH: f64 = 30.0;
pub(super) const STEM_WIDTH: f64 = 1.2;
pub(super) const BARLINE_WIDTH: f64 = 1.0;
pub(super) const HEAVY_BARLINE_WIDTH: f64 = 3.0;
pub(super) const STAFF_LINE_WIDTH: f64 = 0.8;
pub(super) const LEDGER_LINE_WIDTH: f64 = 0.8;
pub(super) const LEDGER_LINE_EXTEND: f64 = 5.0;
pub(super) const CURSOR_WIDTH: f64 = 2.0;

// ── Colors ──────────────────────────────────────────────────────────
pub(super) const NOTE_COLOR: &str = "#1a1a1a";
pub(super) const STAFF_COLOR: &str = "#555555";
pub(super) const BARLINE_COLOR: &str = "#333333";
pub(super) const HIGHLIGHT_COLOR: &str = "#e0533d";
pub(super) const CURSOR_COLOR: &str = "#3d7be0";
