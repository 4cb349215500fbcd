//! Flat vertex buffers for the WebGL renderer.
//!
//! Every vertex is `[x, y, r, g, b]`. Branches are line segments of two
//! vertices, both carrying the child's branch color. Collapsed clades are
//! triangles of three vertices.

use petgraph::stable_graph::NodeIndex;

use super::color::Rgb;
use crate::tree::PhyloTree;

pub const FLOATS_PER_VERTEX: usize = 5;
pub const FLOATS_PER_EDGE: usize = 2 * FLOATS_PER_VERTEX;
pub const FLOATS_PER_TRIANGLE: usize = 3 * FLOATS_PER_VERTEX;

/// Append one `[x, y, r, g, b]` vertex.
#[inline]
pub fn push_vertex(buffer: &mut Vec<f32>, x: f32, y: f32, color: Rgb) {
    buffer.extend_from_slice(&[x, y, color[0], color[1], color[2]]);
}

/// Build a line buffer with one segment per `(node, color)`, from the node's
/// parent to the node. The root's segment is degenerate.
pub fn edge_buffer(
    tree: &PhyloTree,
    pos_x: &[f32],
    pos_y: &[f32],
    edges: impl IntoIterator<Item = (NodeIndex, Rgb)>,
) -> Vec<f32> {
    let edges = edges.into_iter();
    let mut buffer = Vec::with_capacity(edges.size_hint().0 * FLOATS_PER_EDGE);
    for (node, color) in edges {
        let i = node.index();
        let p = tree.parent(node).map_or(i, NodeIndex::index);
        push_vertex(&mut buffer, pos_x[p], pos_y[p], color);
        push_vertex(&mut buffer, pos_x[i], pos_y[i], color);
    }
    buffer
}

/// Build a point buffer with one vertex per `(node, color)`.
pub fn marker_buffer(
    pos_x: &[f32],
    pos_y: &[f32],
    markers: impl IntoIterator<Item = (NodeIndex, Rgb)>,
) -> Vec<f32> {
    let markers = markers.into_iter();
    let mut buffer = Vec::with_capacity(markers.size_hint().0 * FLOATS_PER_VERTEX);
    for (node, color) in markers {
        push_vertex(&mut buffer, pos_x[node.index()], pos_y[node.index()], color);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_tree;

    #[test]
    fn test_edge_layout() {
        let tree = sample_tree();
        let n = tree.node_bound();
        let pos_x: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let pos_y: Vec<f32> = (0..n).map(|i| 10.0 * i as f32).collect();

        let a = tree.index_of("A").unwrap();
        let p = tree.index_of("N2").unwrap().index() as f32;
        let buffer = edge_buffer(&tree, &pos_x, &pos_y, [(a, [0.1, 0.2, 0.3])]);

        let ai = a.index() as f32;
        assert_eq!(
            buffer,
            vec![p, 10.0 * p, 0.1, 0.2, 0.3, ai, 10.0 * ai, 0.1, 0.2, 0.3]
        );
    }

    #[test]
    fn test_root_edge_is_degenerate() {
        let tree = sample_tree();
        let pos = vec![2.0; tree.node_bound()];
        let buffer = edge_buffer(&tree, &pos, &pos, [(tree.root(), [1.0; 3])]);
        assert_eq!(buffer.len(), FLOATS_PER_EDGE);
        assert_eq!(buffer[0..2], buffer[5..7]);
    }

    #[test]
    fn test_marker_layout() {
        let tree = sample_tree();
        let pos = vec![1.5; tree.node_bound()];
        let buffer = marker_buffer(&pos, &pos, [(tree.root(), [0.0, 0.0, 1.0])]);
        assert_eq!(buffer, vec![1.5, 1.5, 0.0, 0.0, 1.0]);
    }
}
