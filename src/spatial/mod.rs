//! Spatial indexing for O(log n) hit testing.
//!
//! R-tree indexes over visible node positions and collapsed-clade triangles.

mod rtree;

pub use rtree::{NodePoint, SpatialIndex, TriangleIndex};
