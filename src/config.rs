//! Viewer configuration.
//!
//! Passed from JavaScript as a plain object; every field is optional and
//! falls back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::layout::RadialConfig;
use crate::render::Rgb;

/// Tunables for layout, picking and coloring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewConfig {
    /// Id of the root node.
    pub root_id: String,
    /// Squared pixel distance under which a node counts as hovered.
    pub hover_threshold_sq: f32,
    /// Number of candidate rotations tried when fitting the layout.
    pub rotation_candidates: u32,
    /// Fraction of the viewport the fitted tree may occupy.
    pub fit_margin: f64,
    /// Branch color before any color mode is applied.
    pub default_color: Rgb,
    /// Color of a hovered clade triangle or node marker.
    pub highlight_color: Rgb,
    /// Color of selected branches.
    pub selection_color: Rgb,
    /// Attribute holding taxonomic group names for the preset palette.
    pub palette_attribute: String,
    /// Absolute tolerance of the point-in-triangle area test.
    pub triangle_tolerance: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            root_id: "N1".to_string(),
            hover_threshold_sq: 50.0,
            rotation_candidates: 60,
            fit_margin: 0.95,
            default_color: crate::render::DEFAULT_COLOR,
            highlight_color: [0.0, 0.0, 1.0],
            selection_color: [1.0, 0.0, 0.0],
            palette_attribute: "phylum".to_string(),
            triangle_tolerance: 1e-4,
        }
    }
}

impl ViewConfig {
    /// Layout parameters derived from this configuration.
    pub fn radial(&self) -> RadialConfig {
        RadialConfig {
            rotation_candidates: self.rotation_candidates,
            fit_margin: self.fit_margin,
        }
    }
}
