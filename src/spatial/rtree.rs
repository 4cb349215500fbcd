//! R-tree based spatial indexes using the rstar crate.
//!
//! Provides O(log n) spatial queries for:
//! - Nearest visible node
//! - Nodes inside a rectangle
//! - Collapsed-clade triangles whose bounding box covers a point

use petgraph::stable_graph::NodeIndex;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::collapse::CladeTriangle;

/// A node position in the spatial index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePoint {
    pub node: NodeIndex,
    pub x: f32,
    pub y: f32,
}

impl NodePoint {
    /// Create a new node point.
    pub fn new(node: NodeIndex, x: f32, y: f32) -> Self {
        Self { node, x, y }
    }
}

impl RTreeObject for NodePoint {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for NodePoint {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index over visible node positions.
pub struct SpatialIndex {
    tree: RTree<NodePoint>,
}

impl SpatialIndex {
    /// Create a new empty spatial index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Nearest node within `max_distance` of a tree-space point.
    pub fn nearest_within(&self, x: f32, y: f32, max_distance: f32) -> Option<NodeIndex> {
        let max_distance_sq = max_distance * max_distance;
        self.tree
            .nearest_neighbor(&[x, y])
            .filter(|point| point.distance_2(&[x, y]) <= max_distance_sq)
            .map(|point| point.node)
    }

    /// All nodes inside a rectangle given by any two opposite corners.
    pub fn in_rect(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Vec<NodeIndex> {
        let envelope = AABB::from_corners([x1, y1], [x2, y2]);
        self.tree
            .locate_in_envelope(&envelope)
            .map(|point| point.node)
            .collect()
    }

    /// Replace the index contents. Bulk loading beats incremental inserts for
    /// full rebuilds.
    pub fn rebuild(&mut self, points: impl IntoIterator<Item = NodePoint>) {
        self.tree = RTree::bulk_load(points.into_iter().collect());
    }

    /// Number of indexed entries.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tree.size()
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounding box of one triangle, tagged with its insertion position.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TriangleBox {
    slot: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl RTreeObject for TriangleBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Index of collapsed-clade triangles by bounding box.
pub struct TriangleIndex {
    tree: RTree<TriangleBox>,
}

impl TriangleIndex {
    /// Create an empty triangle index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Replace the index contents with the bounding boxes of `triangles`.
    pub fn rebuild(&mut self, triangles: &[CladeTriangle]) {
        let boxes = triangles
            .iter()
            .enumerate()
            .map(|(slot, triangle)| {
                let (min, max) = triangle.bounds();
                TriangleBox { slot, min, max }
            })
            .collect();
        self.tree = RTree::bulk_load(boxes);
    }

    /// Positions of triangles whose bounding box covers the point, in
    /// insertion order.
    pub fn candidates(&self, x: f64, y: f64) -> Vec<usize> {
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .map(|entry| entry.slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Number of indexed entries.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tree.size()
    }
}

impl Default for TriangleIndex {
    fn default() -> Self {
        Self::new()
    }
}
