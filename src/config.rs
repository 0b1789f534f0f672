//! Layout and playback options.
//!
//! Both structs deserialize from camelCase JSON with every field optional,
//! so hosts can pass `{}` or only the fields they care about. Values that
//! make no geometric or temporal sense are clamped by `normalized()`
//! rather than rejected.

use serde::{Deserialize, Serialize};

/// How the score is laid out on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptions {
    /// Total SVG width in user units (px)
    pub page_width: f64,
    /// Density multiplier: larger values give fewer, wider measures per line
    pub spacing: f64,
    pub min_measures_per_system: usize,
    pub max_measures_per_system: usize,
    /// Fixed density target; still clamped to the min/max range
    pub measures_per_system: Option<usize>,
    /// Narrowest horizontal space a beat may take before normalization
    pub min_beat_width: f64,
    /// Nominal width of one measure at spacing 1.0, used to pick the density
    pub nominal_measure_width: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            page_width: 820.0,
            spacing: 1.0,
            min_measures_per_system: 1,
            max_measures_per_system: 8,
            measures_per_system: None,
            min_beat_width: 30.0,
            nominal_measure_width: 170.0,
        }
    }
}

impl LayoutOptions {
    pub fn with_page_width(mut self, page_width: f64) -> Self {
        self.page_width = page_width;
        self
    }

    pub fn with_measures_per_system(mut self, measures: usize) -> Self {
        self.measures_per_system = Some(measures);
        self
    }

    /// Clamp every field into a usable range.
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let positive = |v: f64, fallback: f64| if v.is_finite() && v > 0.0 { v } else { fallback };

        let min = self.min_measures_per_system.max(1);
        let max = self.max_measures_per_system.max(min);
        Self {
            page_width: positive(self.page_width, defaults.page_width),
            spacing: positive(self.spacing, defaults.spacing),
            min_measures_per_system: min,
            max_measures_per_system: max,
            measures_per_system: self.measures_per_system.map(|m| m.clamp(min, max)),
            min_beat_width: positive(self.min_beat_width, defaults.min_beat_width),
            nominal_measure_width: positive(self.nominal_measure_width, defaults.nominal_measure_width),
        }
    }
}

/// Transport and viewport behaviour of a playback session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackOptions {
    /// Gap between pressing Play and the first beat
    pub start_delay_secs: f64,
    /// Width of the scrolling viewport, for centering the cursor
    pub viewport_width_px: f64,
    /// Follow the cursor by scrolling the viewport
    pub follow_cursor: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            start_delay_secs: 0.05,
            viewport_width_px: 820.0,
            follow_cursor: true,
        }
    }
}

impl PlaybackOptions {
    pub fn normalized(&self) -> Self {
        let defaults = Self::default();
        let non_negative = |v: f64, fallback: f64| if v.is_finite() && v >= 0.0 { v } else { fallback };
        Self {
            start_delay_secs: non_negative(self.start_delay_secs, defaults.start_delay_secs),
            viewport_width_px: non_negative(self.viewport_width_px, defaults.viewport_width_px),
            follow_cursor: self.follow_cursor,
        }
    }
}
