//! Metadata queries, subtree filters and label placement.

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::metadata::{Metadata, Value};
use crate::tree::{NodeState, PhyloTree};

/// Filter applied to one attribute, as sent by the table filter controls:
/// `{"op": "greater", "value": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum Comparison {
    Greater(f64),
    Less(f64),
    Equal(Value),
}

impl Comparison {
    /// Check a value against the filter; `Null` never matches.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Comparison::Greater(bound), Value::Numeric(n)) => n > bound,
            (Comparison::Less(bound), Value::Numeric(n)) => n < bound,
            (Comparison::Equal(Value::Null), _) => false,
            (Comparison::Equal(expected), actual) => expected == actual,
            _ => false,
        }
    }
}

/// Axis-aligned viewing window in tree space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Window {
    /// Window spanned by two opposite corners in any order.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Check if the point lies inside the window, edges included.
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// A clade label anchored at its root node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLabel {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub text: String,
}

/// Up to `max` labels for visible internal nodes inside `window` that carry a
/// value for `attribute`. Nodes are taken in pre-order and a node is skipped
/// when one of its ancestors already has a label.
#[allow(clippy::too_many_arguments)]
pub fn labels_in_view(
    tree: &PhyloTree,
    metadata: &Metadata,
    pos_x: &[f32],
    pos_y: &[f32],
    states: &[NodeState],
    window: &Window,
    attribute: &str,
    max: usize,
) -> Vec<NodeLabel> {
    let mut labels = Vec::new();
    if max == 0 {
        return labels;
    }
    // True below a labelled node.
    let mut covered = vec![false; tree.node_bound()];

    for &node in tree.preorder() {
        let i = node.index();
        let mut labelled = false;
        if !covered[i] && is_candidate(tree, states, node) && window.contains(pos_x[i], pos_y[i]) {
            let value = metadata.get(node, attribute);
            if !value.is_null() {
                labels.push(NodeLabel {
                    id: tree.name(node).to_string(),
                    x: pos_x[i],
                    y: pos_y[i],
                    text: value.to_string(),
                });
                labelled = true;
                if labels.len() == max {
                    break;
                }
            }
        }
        if covered[i] || labelled {
            for &child in tree.children(node) {
                covered[child.index()] = true;
            }
        }
    }
    labels
}

fn is_candidate(tree: &PhyloTree, states: &[NodeState], node: NodeIndex) -> bool {
    !tree.is_tip(node) && states[node.index()].is_visible()
}

/// Up to `max` labels for visible tips inside `window`. The text is the tip's
/// value for `attribute`, or its id when no attribute is given; tips without
/// a value are skipped. When more tips qualify than fit, evenly spaced ones
/// are taken in angular order so labels spread around the circle.
#[allow(clippy::too_many_arguments)]
pub fn tip_labels_in_view(
    tree: &PhyloTree,
    metadata: &Metadata,
    pos_x: &[f32],
    pos_y: &[f32],
    states: &[NodeState],
    window: &Window,
    attribute: Option<&str>,
    max: usize,
) -> Vec<NodeLabel> {
    let candidates: Vec<(NodeIndex, String)> = tree
        .preorder()
        .iter()
        .copied()
        .filter(|&n| tree.is_tip(n) && states[n.index()].is_visible())
        .filter(|&n| window.contains(pos_x[n.index()], pos_y[n.index()]))
        .filter_map(|n| {
            let text = match attribute {
                Some(attribute) => {
                    let value = metadata.get(n, attribute);
                    if value.is_null() {
                        return None;
                    }
                    value.to_string()
                }
                None => tree.name(n).to_string(),
            };
            Some((n, text))
        })
        .collect();

    let take = candidates.len().min(max);
    (0..take)
        .map(|k| {
            let (node, text) = &candidates[k * candidates.len() / take];
            NodeLabel {
                id: tree.name(*node).to_string(),
                x: pos_x[node.index()],
                y: pos_y[node.index()],
                text: text.clone(),
            }
        })
        .collect()
}

/// Nodes kept by a subtree filter, indexed by node slot.
///
/// A node is kept when it satisfies `comparison`, lies below a node that
/// does, or is an ancestor of a kept node. The result is a connected subtree
/// containing the root, or all `false` when nothing matches.
pub fn subtree_filter(
    tree: &PhyloTree,
    metadata: &Metadata,
    attribute: &str,
    comparison: &Comparison,
) -> Vec<bool> {
    let mut keep = vec![false; tree.node_bound()];
    for &node in tree.preorder() {
        let inherited = tree.parent(node).is_some_and(|p| keep[p.index()]);
        keep[node.index()] = inherited || comparison.matches(metadata.get(node, attribute));
    }
    for node in tree.bottom_up() {
        if keep[node.index()] {
            if let Some(parent) = tree.parent(node) {
                keep[parent.index()] = true;
            }
        }
    }
    keep
}
