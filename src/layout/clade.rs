//! Per-node clade geometry derived from a finished radial layout.

use crate::tree::PhyloTree;

/// Angular extent and depth range of the clade below a node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CladeGeometry {
    /// Lower edge of the node's sector (`angle - theta`).
    pub starting_angle: f32,
    /// Half the sector width.
    pub theta: f32,
    /// Longest scaled path from the node to one of its tips.
    pub largest_branch: f32,
    /// Shortest scaled path from the node to one of its tips.
    pub smallest_branch: f32,
}

/// Compute clade geometry for every node, indexed by node slot.
pub fn compute_clade_geometry(
    tree: &PhyloTree,
    angles: &[f64],
    scale: f64,
    angular_unit: f64,
) -> Vec<CladeGeometry> {
    let mut largest = vec![0.0f64; tree.node_bound()];
    let mut smallest = vec![0.0f64; tree.node_bound()];

    for node in tree.bottom_up() {
        let children = tree.children(node);
        if children.is_empty() {
            continue;
        }
        let mut longest = f64::NEG_INFINITY;
        let mut shortest = f64::INFINITY;
        for &child in children {
            let reach = f64::from(tree.length(child)) * scale;
            longest = longest.max(largest[child.index()] + reach);
            shortest = shortest.min(smallest[child.index()] + reach);
        }
        largest[node.index()] = longest;
        smallest[node.index()] = shortest;
    }

    let mut clades = vec![CladeGeometry::default(); tree.node_bound()];
    for &node in tree.preorder() {
        let i = node.index();
        let theta = f64::from(tree.leafcount(node)) * angular_unit / 2.0;
        clades[i] = CladeGeometry {
            starting_angle: (angles[i] - theta) as f32,
            theta: theta as f32,
            largest_branch: largest[i] as f32,
            smallest_branch: smallest[i] as f32,
        };
    }
    clades
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_tree;
    use std::f64::consts::PI;

    #[test]
    fn test_branch_extremes() {
        let tree = sample_tree();
        let angles = vec![0.0; tree.node_bound()];
        let clades = compute_clade_geometry(&tree, &angles, 2.0, 2.0 * PI / 3.0);

        let n2 = clades[tree.index_of("N2").unwrap().index()];
        assert_eq!(n2.largest_branch, 4.0);
        assert_eq!(n2.smallest_branch, 2.0);

        // Root: N2 (3) + B (2) = 5 is longest, C = 4 shortest, scaled by 2.
        let root = clades[tree.root().index()];
        assert_eq!(root.largest_branch, 10.0);
        assert_eq!(root.smallest_branch, 8.0);

        let tip = clades[tree.index_of("C").unwrap().index()];
        assert_eq!(tip.largest_branch, 0.0);
        assert_eq!(tip.smallest_branch, 0.0);
    }

    #[test]
    fn test_sector_bounds() {
        let tree = sample_tree();
        let da = 2.0 * PI / 3.0;
        let mut angles = vec![0.0; tree.node_bound()];
        let n2 = tree.index_of("N2").unwrap().index();
        angles[n2] = -PI / 3.0;

        let clades = compute_clade_geometry(&tree, &angles, 1.0, da);
        assert!((f64::from(clades[n2].theta) - da).abs() < 1e-6);
        assert!((f64::from(clades[n2].starting_angle) - (-PI)).abs() < 1e-6);
    }
}
