//! Equal-angle radial layout for rooted phylogenies.
//!
//! Every tip receives the same angular share of the full circle; an internal
//! node's sector is the union of its tips' sectors, and each node is placed
//! along the ray through the middle of its sector at a distance proportional
//! to its branch length.
//!
//! # Algorithm Overview
//!
//! 1. **Angular unit:** `da = 2π / leafcount(root)`.
//! 2. **Placement (top-down):** the root sits at the origin with angle equal
//!    to the candidate direction. Children split the parent's sector in child
//!    order, the first child taking the lowest angles.
//! 3. **Rotation search:** a number of candidate directions evenly spaced over
//!    `[0, π)` are each placed at unit scale. The candidate whose bounding box
//!    admits the largest viewport-filling scale wins; ties keep the earlier
//!    candidate.
//! 4. **Final pass:** the winner is placed again at its scale and the whole
//!    tree is translated so the root is at `(0, 0)`.
//! 5. **Clade geometry (bottom-up):** sector half-widths and the longest and
//!    shortest scaled root-to-tip distances for every node, used to draw
//!    collapsed clades as triangles.
//!
//! Candidate placements are written to scratch buffers owned by the layout
//! call, never to engine state.

use std::f64::consts::PI;

use crate::layout::clade::{compute_clade_geometry, CladeGeometry};
use crate::tree::PhyloTree;

/// Configuration for the radial layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialConfig {
    /// Number of rotations tried, spaced evenly over half a turn.
    pub rotation_candidates: u32,
    /// Fraction of the viewport the tree may fill.
    pub fit_margin: f64,
}

impl Default for RadialConfig {
    fn default() -> Self {
        Self {
            rotation_candidates: 60,
            fit_margin: 0.95,
        }
    }
}

/// Result of a radial layout computation. All vectors are indexed by node slot.
#[derive(Debug, Clone)]
pub struct RadialResult {
    /// Node X positions, root at the origin.
    pub positions_x: Vec<f32>,
    /// Node Y positions, root at the origin.
    pub positions_y: Vec<f32>,
    /// Ray angle per node in radians.
    pub angles: Vec<f32>,
    /// Per-node clade geometry.
    pub clades: Vec<CladeGeometry>,
    /// Winning scale factor (tree units to viewport units).
    pub scale: f32,
    /// Angular share of a single tip.
    pub angular_unit: f64,
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
}

impl Bounds {
    fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    #[inline]
    fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Parameters of one placement pass.
#[derive(Debug, Clone, Copy)]
struct Placement {
    direction: f64,
    scale: f64,
    origin_x: f64,
    origin_y: f64,
}

struct Scratch {
    x: Vec<f64>,
    y: Vec<f64>,
    angle: Vec<f64>,
}

impl Scratch {
    fn new(len: usize) -> Self {
        Self {
            x: vec![0.0; len],
            y: vec![0.0; len],
            angle: vec![0.0; len],
        }
    }
}

/// The radial layout engine.
pub struct RadialLayout {
    config: RadialConfig,
}

impl RadialLayout {
    /// Create a new radial layout with the given config.
    pub fn new(config: RadialConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RadialConfig::default())
    }

    /// Lay out `tree` to fill a `width` x `height` viewport.
    pub fn compute(&self, tree: &PhyloTree, height: f64, width: f64) -> RadialResult {
        let angular_unit = 2.0 * PI / f64::from(tree.leafcount(tree.root()).max(1));
        let mut scratch = Scratch::new(tree.node_bound());

        let candidates = self.config.rotation_candidates.max(1);
        let mut best: Option<(f64, Bounds, f64)> = None;
        for i in 0..candidates {
            let direction = f64::from(i) / f64::from(candidates) * PI;
            let unit = Placement {
                direction,
                scale: 1.0,
                origin_x: 0.0,
                origin_y: 0.0,
            };
            let bounds = place(tree, angular_unit, unit, &mut scratch);
            let scale = self.fit_scale(&bounds, height, width);
            if best.is_none_or(|(best_scale, _, _)| scale > best_scale) {
                best = Some((scale, bounds, direction));
            }
        }

        let (scale, bounds, direction) =
            best.unwrap_or((1.0, Bounds::empty(), 0.0));
        let (center_x, center_y) = if bounds.min_x.is_finite() {
            bounds.center()
        } else {
            (0.0, 0.0)
        };
        let winner = Placement {
            direction,
            scale,
            origin_x: width / 2.0 - center_x * scale,
            origin_y: height / 2.0 - center_y * scale,
        };
        place(tree, angular_unit, winner, &mut scratch);
        log::debug!(
            "radial layout: direction {:.4} rad, scale {:.4}",
            direction,
            scale
        );

        let root = tree.root().index();
        let (root_x, root_y) = (scratch.x[root], scratch.y[root]);
        let positions_x = scratch.x.iter().map(|x| (x - root_x) as f32).collect();
        let positions_y = scratch.y.iter().map(|y| (y - root_y) as f32).collect();
        let angles = scratch.angle.iter().map(|&a| a as f32).collect();
        let clades = compute_clade_geometry(tree, &scratch.angle, scale, angular_unit);

        RadialResult {
            positions_x,
            positions_y,
            angles,
            clades,
            scale: scale as f32,
            angular_unit,
        }
    }

    /// Largest scale at which `bounds` fits the viewport, times the margin.
    /// An axis with no extent places no constraint.
    fn fit_scale(&self, bounds: &Bounds, height: f64, width: f64) -> f64 {
        let constrain = |extent: f64, available: f64| {
            if extent > f64::EPSILON {
                available / extent
            } else {
                f64::INFINITY
            }
        };
        let fit = constrain(bounds.max_x - bounds.min_x, width)
            .min(constrain(bounds.max_y - bounds.min_y, height));
        if fit.is_finite() {
            fit * self.config.fit_margin
        } else {
            1.0
        }
    }
}

/// Place every node for one candidate and return the bounding box of the
/// non-root nodes. The root only anchors the placement.
fn place(tree: &PhyloTree, da: f64, placement: Placement, scratch: &mut Scratch) -> Bounds {
    let root = tree.root().index();
    scratch.x[root] = placement.origin_x;
    scratch.y[root] = placement.origin_y;
    scratch.angle[root] = placement.direction;

    let mut bounds = Bounds::empty();

    for &parent in tree.preorder() {
        let p = parent.index();
        let sector_start =
            scratch.angle[p] - f64::from(tree.leafcount(parent)) * da / 2.0;
        let mut offset = 0u32;
        for &child in tree.children(parent) {
            let c = child.index();
            let leaves = tree.leafcount(child);
            let angle = sector_start + f64::from(offset) * da + f64::from(leaves) * da / 2.0;
            offset += leaves;

            let reach = f64::from(tree.length(child)) * placement.scale;
            let x = scratch.x[p] + reach * angle.sin();
            let y = scratch.y[p] + reach * angle.cos();
            scratch.angle[c] = angle;
            scratch.x[c] = x;
            scratch.y[c] = y;
            bounds.include(x, y);
        }
    }

    bounds
}
