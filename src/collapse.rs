//! Clade collapsing.
//!
//! A collapsed clade hides every strict descendant of its root and is drawn
//! as a single triangle: the apex at the root, one corner along the sector's
//! lower edge at the clade's longest root-to-tip distance, the other along
//! the upper edge at the shortest.
//!
//! The active set of clade roots comes from two sources: a taxonomic rank
//! (every node whose metadata value for that rank is non-null) and clades
//! collapsed by hand. Visibility is always recomputed from scratch.

use petgraph::stable_graph::NodeIndex;

use crate::layout::CladeGeometry;
use crate::metadata::Metadata;
use crate::render::buffer::push_vertex;
use crate::render::{Rgb, FLOATS_PER_TRIANGLE};
use crate::tree::{NodeState, PhyloTree};

/// Which clades are currently collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseState {
    rank: Option<String>,
    manual: Vec<NodeIndex>,
}

impl CollapseState {
    /// Rank collapsed as a whole, if any.
    pub fn rank(&self) -> Option<&str> {
        self.rank.as_deref()
    }

    /// Check if nothing is collapsed.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.rank.is_none() && self.manual.is_empty()
    }

    /// Collapse every clade at `rank`, replacing hand-collapsed clades.
    pub fn set_rank(&mut self, rank: impl Into<String>) {
        self.rank = Some(rank.into());
        self.manual.clear();
    }

    /// Add one clade. Returns `false` if it was already collapsed by hand.
    pub fn add_clade(&mut self, root: NodeIndex) -> bool {
        if self.manual.contains(&root) {
            return false;
        }
        self.manual.push(root);
        true
    }

    /// Remove one clade from the active set given the roots currently in
    /// effect. A clade that came from the rank is removed by turning the
    /// remaining roots into hand-collapsed clades.
    pub fn remove_clade(&mut self, root: NodeIndex, active: &[NodeIndex]) {
        self.rank = None;
        self.manual = active.iter().copied().filter(|&r| r != root).collect();
    }

    /// Expand everything.
    pub fn clear(&mut self) {
        self.rank = None;
        self.manual.clear();
    }

    /// Active clade roots: rank matches in pre-order, then hand-collapsed
    /// clades in the order they were added.
    pub fn roots(&self, tree: &PhyloTree, metadata: &Metadata) -> Vec<NodeIndex> {
        let mut roots: Vec<NodeIndex> = match &self.rank {
            Some(rank) => tree
                .preorder()
                .iter()
                .copied()
                .filter(|&node| !metadata.get(node, rank).is_null())
                .collect(),
            None => Vec::new(),
        };
        for &root in &self.manual {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }
}

/// Reset visibility, then hide the strict descendants of every root.
pub fn apply_visibility(tree: &PhyloTree, roots: &[NodeIndex], states: &mut [NodeState]) {
    for state in states.iter_mut() {
        state.set_hidden(false);
        state.set_collapse_root(false);
    }
    for &root in roots {
        states[root.index()].set_collapse_root(true);
        for node in tree.descendants(root) {
            states[node.index()].set_hidden(true);
        }
    }
}

/// A collapsed clade as drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CladeTriangle {
    pub root: NodeIndex,
    /// Apex, long corner, short corner.
    pub vertices: [[f32; 2]; 3],
    pub color: Rgb,
}

impl CladeTriangle {
    /// Triangle for the clade at `root` with its apex at `apex`.
    pub fn new(root: NodeIndex, apex: [f32; 2], clade: &CladeGeometry, color: Rgb) -> Self {
        let start = f64::from(clade.starting_angle);
        let end = start + 2.0 * f64::from(clade.theta);
        let corner = |reach: f32, angle: f64| {
            [
                (f64::from(apex[0]) + f64::from(reach) * angle.sin()) as f32,
                (f64::from(apex[1]) + f64::from(reach) * angle.cos()) as f32,
            ]
        };
        Self {
            root,
            vertices: [
                apex,
                corner(clade.largest_branch, start),
                corner(clade.smallest_branch, end),
            ],
            color,
        }
    }

    /// Area test: the point is inside when the three sub-triangles it forms
    /// add up to the whole within `tolerance`.
    pub fn contains(&self, x: f64, y: f64, tolerance: f64) -> bool {
        let [a, b, c] = self.vertices.map(|[vx, vy]| [f64::from(vx), f64::from(vy)]);
        let p = [x, y];
        let whole = area(a, b, c);
        let parts = area(p, b, c) + area(a, p, c) + area(a, b, p);
        (whole - parts).abs() <= tolerance
    }

    /// Axis-aligned bounding box as `(min, max)`.
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for [x, y] in self.vertices {
            min = [min[0].min(f64::from(x)), min[1].min(f64::from(y))];
            max = [max[0].max(f64::from(x)), max[1].max(f64::from(y))];
        }
        (min, max)
    }

    /// Append the three vertices in `color`.
    pub fn write(&self, buffer: &mut Vec<f32>, color: Rgb) {
        for [x, y] in self.vertices {
            push_vertex(buffer, x, y, color);
        }
    }
}

fn area(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs() / 2.0
}

/// Triangles for `roots`, colored from the current branch colors.
pub fn build_triangles(
    roots: &[NodeIndex],
    pos_x: &[f32],
    pos_y: &[f32],
    clades: &[CladeGeometry],
    colors: &[Rgb],
) -> Vec<CladeTriangle> {
    roots
        .iter()
        .map(|&root| {
            let i = root.index();
            CladeTriangle::new(root, [pos_x[i], pos_y[i]], &clades[i], colors[i])
        })
        .collect()
}

/// Flatten triangles into a `3 x [x, y, r, g, b]` buffer.
pub fn triangle_buffer(triangles: &[CladeTriangle]) -> Vec<f32> {
    let mut buffer = Vec::with_capacity(triangles.len() * FLOATS_PER_TRIANGLE);
    for triangle in triangles {
        triangle.write(&mut buffer, triangle.color);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_tree, SAMPLE_METADATA_JSON};
    use std::f32::consts::FRAC_PI_2;

    fn unit_triangle() -> CladeTriangle {
        // Sector from 0 (straight up) to π/2 (right), reach 10 on both edges.
        let clade = CladeGeometry {
            starting_angle: 0.0,
            theta: FRAC_PI_2 / 2.0,
            largest_branch: 10.0,
            smallest_branch: 10.0,
        };
        CladeTriangle::new(NodeIndex::new(0), [0.0, 0.0], &clade, [1.0, 0.0, 0.0])
    }

    #[test]
    fn test_triangle_corners() {
        let triangle = unit_triangle();
        let [apex, long, short] = triangle.vertices;
        assert_eq!(apex, [0.0, 0.0]);
        assert!(long[0].abs() < 1e-5 && (long[1] - 10.0).abs() < 1e-5);
        assert!((short[0] - 10.0).abs() < 1e-5 && short[1].abs() < 1e-4);
    }

    #[test]
    fn test_contains() {
        let triangle = unit_triangle();
        assert!(triangle.contains(0.0, 0.0, 1e-4));
        assert!(triangle.contains(2.0, 2.0, 1e-4));
        assert!(!triangle.contains(-1.0, 5.0, 1e-4));
        assert!(!triangle.contains(100.0, 100.0, 1e-4));
    }

    #[test]
    fn test_bounds() {
        let (min, max) = unit_triangle().bounds();
        assert!(min[0].abs() < 1e-5 && min[1].abs() < 1e-4);
        assert!((max[0] - 10.0).abs() < 1e-5 && (max[1] - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_rank_roots_and_visibility() {
        let tree = sample_tree();
        let metadata = Metadata::from_json(&tree, SAMPLE_METADATA_JSON).unwrap();
        let mut state = CollapseState::default();
        state.set_rank("genus");

        let roots = state.roots(&tree, &metadata);
        let n2 = tree.index_of("N2").unwrap();
        assert_eq!(roots, vec![n2]);

        let mut states = vec![NodeState::new(); tree.node_bound()];
        apply_visibility(&tree, &roots, &mut states);
        assert!(states[n2.index()].is_visible());
        assert!(states[n2.index()].is_collapse_root());
        assert!(states[tree.index_of("A").unwrap().index()].is_hidden());
        assert!(states[tree.index_of("B").unwrap().index()].is_hidden());
        assert!(states[tree.index_of("C").unwrap().index()].is_visible());

        apply_visibility(&tree, &[], &mut states);
        assert!(states.iter().all(|s| s.is_visible() && !s.is_collapse_root()));
    }

    #[test]
    fn test_manual_clades() {
        let tree = sample_tree();
        let metadata = Metadata::from_json(&tree, SAMPLE_METADATA_JSON).unwrap();
        let n2 = tree.index_of("N2").unwrap();
        let c = tree.index_of("C").unwrap();

        let mut state = CollapseState::default();
        state.set_rank("genus");
        assert!(state.add_clade(c));
        assert!(!state.add_clade(c));
        assert_eq!(state.roots(&tree, &metadata), vec![n2, c]);

        let active = state.roots(&tree, &metadata);
        state.remove_clade(n2, &active);
        assert_eq!(state.rank(), None);
        assert_eq!(state.roots(&tree, &metadata), vec![c]);

        state.set_rank("genus");
        assert_eq!(state.roots(&tree, &metadata), vec![n2]);

        state.clear();
        assert!(state.is_empty());
    }

    #[test]
    fn test_unknown_rank_collapses_nothing() {
        let tree = sample_tree();
        let metadata = Metadata::from_json(&tree, SAMPLE_METADATA_JSON).unwrap();
        let mut state = CollapseState::default();
        state.set_rank("family");
        assert!(state.roots(&tree, &metadata).is_empty());
    }

    #[test]
    fn test_triangle_buffer_layout() {
        let triangle = unit_triangle();
        let buffer = triangle_buffer(&[triangle]);
        assert_eq!(buffer.len(), FLOATS_PER_TRIANGLE);
        assert_eq!(&buffer[0..5], &[0.0, 0.0, 1.0, 0.0, 0.0]);
    }
}
