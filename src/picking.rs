//! Hit testing against nodes and collapsed clades.
//!
//! Hover picking runs in screen space: the renderer owns the camera, so the
//! caller passes its model-view-projection matrix and every visible node is
//! projected and compared against the cursor. Tree-space picking goes through
//! the R-tree indexes instead.

use petgraph::stable_graph::NodeIndex;

use crate::collapse::CladeTriangle;
use crate::spatial::TriangleIndex;

/// Camera state needed to map tree space to canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenProjection {
    /// Column-major 4x4 model-view-projection matrix.
    pub mvp: [f32; 16],
    pub width: f32,
    pub height: f32,
}

impl ScreenProjection {
    /// Projection from a column-major matrix and the canvas size in pixels.
    pub fn new(mvp: [f32; 16], width: f32, height: f32) -> Self {
        Self { mvp, width, height }
    }

    /// Build from a matrix slice; `None` unless it has exactly 16 entries.
    pub fn from_slice(mvp: &[f32], width: f32, height: f32) -> Option<Self> {
        let mvp: [f32; 16] = mvp.try_into().ok()?;
        Some(Self::new(mvp, width, height))
    }

    /// Canvas pixel coordinates of a tree-space point, origin top-left.
    /// `None` when the point projects to infinity.
    pub fn project(&self, x: f32, y: f32) -> Option<[f32; 2]> {
        let m = &self.mvp;
        let clip_x = m[0] * x + m[4] * y + m[12];
        let clip_y = m[1] * x + m[5] * y + m[13];
        let clip_w = m[3] * x + m[7] * y + m[15];
        if clip_w == 0.0 {
            return None;
        }
        let ndc_x = clip_x / clip_w;
        let ndc_y = clip_y / clip_w;
        Some([
            (ndc_x * 0.5 + 0.5) * self.width,
            (ndc_y * -0.5 + 0.5) * self.height,
        ])
    }
}

/// Closest candidate to the cursor whose squared pixel distance is at most
/// `threshold_sq`. Linear in the number of candidates.
pub fn nearest_node_screen(
    projection: &ScreenProjection,
    screen_x: f32,
    screen_y: f32,
    threshold_sq: f32,
    candidates: impl IntoIterator<Item = (NodeIndex, f32, f32)>,
) -> Option<NodeIndex> {
    let mut best: Option<(NodeIndex, f32)> = None;
    for (node, x, y) in candidates {
        let Some([px, py]) = projection.project(x, y) else {
            continue;
        };
        let dist_sq = (px - screen_x).powi(2) + (py - screen_y).powi(2);
        if dist_sq <= threshold_sq && best.is_none_or(|(_, d)| dist_sq < d) {
            best = Some((node, dist_sq));
        }
    }
    best.map(|(node, _)| node)
}

/// First triangle, in insertion order, containing the tree-space point.
pub fn triangle_at<'a>(
    triangles: &'a [CladeTriangle],
    index: &TriangleIndex,
    x: f64,
    y: f64,
    tolerance: f64,
) -> Option<&'a CladeTriangle> {
    index
        .candidates(x, y)
        .into_iter()
        .filter_map(|slot| triangles.get(slot))
        .find(|triangle| triangle.contains(x, y, tolerance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CladeGeometry;

    const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    #[test]
    fn test_project_identity() {
        let projection = ScreenProjection::new(IDENTITY, 200.0, 100.0);
        assert_eq!(projection.project(0.0, 0.0), Some([100.0, 50.0]));
        assert_eq!(projection.project(1.0, 1.0), Some([200.0, 0.0]));
        assert_eq!(projection.project(-1.0, -1.0), Some([0.0, 100.0]));
    }

    #[test]
    fn test_project_translation_column_major() {
        let mut mvp = IDENTITY;
        mvp[12] = 0.5;
        let projection = ScreenProjection::new(mvp, 200.0, 100.0);
        assert_eq!(projection.project(0.0, 0.0), Some([150.0, 50.0]));
    }

    #[test]
    fn test_from_slice_requires_sixteen() {
        assert!(ScreenProjection::from_slice(&IDENTITY, 1.0, 1.0).is_some());
        assert!(ScreenProjection::from_slice(&IDENTITY[..15], 1.0, 1.0).is_none());
    }

    #[test]
    fn test_nearest_node_screen_threshold() {
        let projection = ScreenProjection::new(IDENTITY, 200.0, 200.0);
        let nodes = [
            (NodeIndex::new(0), 0.0, 0.0),   // (100, 100)
            (NodeIndex::new(1), 0.05, 0.0),  // (105, 100)
            (NodeIndex::new(2), 0.5, 0.5),   // (150, 50)
        ];

        assert_eq!(
            nearest_node_screen(&projection, 104.0, 100.0, 50.0, nodes),
            Some(NodeIndex::new(1))
        );
        assert_eq!(
            nearest_node_screen(&projection, 100.0, 108.0, 50.0, nodes),
            None
        );
    }

    #[test]
    fn test_triangle_at_first_wins() {
        let clade = CladeGeometry {
            starting_angle: 0.0,
            theta: std::f32::consts::FRAC_PI_4,
            largest_branch: 10.0,
            smallest_branch: 10.0,
        };
        let outer = CladeTriangle::new(NodeIndex::new(1), [0.0, 0.0], &clade, [0.0; 3]);
        let inner = CladeTriangle::new(NodeIndex::new(2), [1.0, 1.0], &clade, [0.0; 3]);
        let triangles = [outer, inner];
        let mut index = TriangleIndex::new();
        index.rebuild(&triangles);

        let hit = triangle_at(&triangles, &index, 2.0, 2.0, 1e-4).unwrap();
        assert_eq!(hit.root, NodeIndex::new(1));
        let hit = triangle_at(&triangles, &index, 1.0, 1.0, 1e-4).unwrap();
        assert_eq!(hit.root, NodeIndex::new(1));
        assert!(triangle_at(&triangles, &index, 8.0, 8.0, 1e-4).is_none());
    }
}
