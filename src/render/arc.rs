//! Highlighted clade arcs.
//!
//! A highlighted clade is drawn behind the branches as a filled circular
//! sector: the apex at the clade root, spanning the root's angular sector,
//! with radius equal to the clade's longest root-to-tip distance. Every
//! descendant of a node in an equal-angle layout lies inside that sector, so
//! the arc always covers the whole clade.

use std::collections::BTreeMap;

use petgraph::stable_graph::NodeIndex;

use super::buffer::push_vertex;
use super::color::{preset_color, to_hex, LegendEntry, Rgb, PRESET_PALETTE};
use super::FLOATS_PER_TRIANGLE;
use crate::layout::CladeGeometry;
use crate::metadata::{Metadata, Value};
use crate::tree::{NodeState, PhyloTree};

/// Triangles used to approximate one arc.
pub const TRIANGLES_PER_ARC: usize = 100;

/// Floats written per arc.
pub const FLOATS_PER_ARC: usize = TRIANGLES_PER_ARC * FLOATS_PER_TRIANGLE;

/// A filled sector behind one clade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CladeArc {
    pub root: NodeIndex,
    pub apex: [f32; 2],
    pub start_angle: f64,
    pub end_angle: f64,
    pub radius: f64,
    pub color: Rgb,
}

impl CladeArc {
    /// Arc over the sector of the clade at `root`.
    pub fn new(root: NodeIndex, apex: [f32; 2], clade: &CladeGeometry, color: Rgb) -> Self {
        let start_angle = f64::from(clade.starting_angle);
        Self {
            root,
            apex,
            start_angle,
            end_angle: start_angle + 2.0 * f64::from(clade.theta),
            radius: f64::from(clade.largest_branch),
            color,
        }
    }

    /// Append the arc as a fan of [`TRIANGLES_PER_ARC`] triangles.
    pub fn write(&self, buffer: &mut Vec<f32>) {
        let [ax, ay] = self.apex;
        let step = (self.end_angle - self.start_angle) / TRIANGLES_PER_ARC as f64;
        let rim = |k: usize| {
            let angle = self.start_angle + k as f64 * step;
            (
                (f64::from(ax) + self.radius * angle.sin()) as f32,
                (f64::from(ay) + self.radius * angle.cos()) as f32,
            )
        };
        for k in 0..TRIANGLES_PER_ARC {
            let (x0, y0) = rim(k);
            let (x1, y1) = rim(k + 1);
            push_vertex(buffer, ax, ay, self.color);
            push_vertex(buffer, x0, y0, self.color);
            push_vertex(buffer, x1, y1, self.color);
        }
    }
}

/// Arcs for every visible node with a value for `rank`, in pre-order. A node
/// under an already highlighted clade is skipped. Groups found in the preset
/// palette keep their preset color; the others take palette colors in order
/// of first appearance.
pub fn build_arcs(
    tree: &PhyloTree,
    metadata: &Metadata,
    rank: &str,
    pos_x: &[f32],
    pos_y: &[f32],
    clades: &[CladeGeometry],
    states: &[NodeState],
) -> (Vec<CladeArc>, Vec<LegendEntry>) {
    let mut arcs = Vec::new();
    let mut groups: BTreeMap<String, Rgb> = BTreeMap::new();
    let mut covered = vec![false; tree.node_bound()];

    for &node in tree.preorder() {
        let i = node.index();
        if covered[i] {
            for &child in tree.children(node) {
                covered[child.index()] = true;
            }
            continue;
        }
        let Value::Categorical(group) = metadata.get(node, rank) else {
            continue;
        };
        if !states[i].is_visible() {
            continue;
        }
        let next = groups.len();
        let color = *groups
            .entry(group.clone())
            .or_insert_with(|| preset_color(group).unwrap_or(PRESET_PALETTE[next % PRESET_PALETTE.len()].1));
        arcs.push(CladeArc::new(node, [pos_x[i], pos_y[i]], &clades[i], color));
        for &child in tree.children(node) {
            covered[child.index()] = true;
        }
    }

    let legend = groups
        .into_iter()
        .map(|(label, color)| LegendEntry {
            label,
            color: to_hex(color),
        })
        .collect();
    (arcs, legend)
}

/// Flatten arcs into a `TRIANGLES_PER_ARC x 3 x [x, y, r, g, b]` buffer.
pub fn arc_buffer(arcs: &[CladeArc]) -> Vec<f32> {
    let mut buffer = Vec::with_capacity(arcs.len() * FLOATS_PER_ARC);
    for arc in arcs {
        arc.write(&mut buffer);
    }
    buffer
}
