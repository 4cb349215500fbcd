//! Node types and related structures.
//!
//! Each tree node has:
//! - A stable string identifier (tips and internal nodes use distinct prefixes)
//! - An ordered list of children (order decides angular placement)
//! - A branch length to its parent (stored on the incoming graph edge)
//! - Render state flags (hidden, selected, hovered, collapse root)

use petgraph::stable_graph::NodeIndex;
use serde::Deserialize;

/// Node record as delivered by the tree endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub length: f64,
    /// Advisory only; recomputed from the topology on load.
    #[serde(default)]
    pub leafcount: Option<u32>,
    #[serde(default)]
    pub is_tip: bool,
}

/// Node weight stored in the tree graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Stable identifier.
    pub name: String,
    /// Children in angular order.
    pub children: Vec<NodeIndex>,
    /// Number of descendant tips, 1 for a tip.
    pub leafcount: u32,
}

impl TreeNode {
    /// A childless node with the given id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            leafcount: 1,
        }
    }

    /// Check if the node has no children.
    #[inline]
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

/// Node render state flags packed into a single byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeState {
    flags: u8,
}

impl NodeState {
    const HIDDEN: u8 = 0b0000_0001;
    const SELECTED: u8 = 0b0000_0010;
    const HOVERED: u8 = 0b0000_0100;
    const COLLAPSE_ROOT: u8 = 0b0000_1000;
    const FILTERED_OUT: u8 = 0b0001_0000;

    /// Create a new default node state (visible, nothing else set).
    #[inline]
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    #[inline]
    fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// Check if the node's branch is drawn.
    #[inline]
    pub fn is_visible(self) -> bool {
        self.flags & (Self::HIDDEN | Self::FILTERED_OUT) == 0
    }

    /// Check if the node lies strictly inside a collapsed clade.
    #[inline]
    pub fn is_hidden(self) -> bool {
        self.flags & Self::HIDDEN != 0
    }

    /// Mark the node as inside (or outside) a collapsed clade.
    #[inline]
    pub fn set_hidden(&mut self, hidden: bool) {
        self.set(Self::HIDDEN, hidden);
    }

    /// Check if the node is part of the current selection.
    #[inline]
    pub fn is_selected(self) -> bool {
        self.flags & Self::SELECTED != 0
    }

    /// Add the node to (or remove it from) the selection.
    #[inline]
    pub fn set_selected(&mut self, selected: bool) {
        self.set(Self::SELECTED, selected);
    }

    /// Check if the cursor is over the node.
    #[inline]
    pub fn is_hovered(self) -> bool {
        self.flags & Self::HOVERED != 0
    }

    /// Set the hover flag.
    #[inline]
    pub fn set_hovered(&mut self, hovered: bool) {
        self.set(Self::HOVERED, hovered);
    }

    /// Check if the node is drawn as a collapsed-clade triangle.
    #[inline]
    pub fn is_collapse_root(self) -> bool {
        self.flags & Self::COLLAPSE_ROOT != 0
    }

    /// Set the collapsed-clade root flag.
    #[inline]
    pub fn set_collapse_root(&mut self, root: bool) {
        self.set(Self::COLLAPSE_ROOT, root);
    }

    /// Check if the node lies outside the active subtree filter.
    #[inline]
    pub fn is_filtered_out(self) -> bool {
        self.flags & Self::FILTERED_OUT != 0
    }

    /// Exclude the node from (or restore it to) the filtered view.
    #[inline]
    pub fn set_filtered_out(&mut self, filtered: bool) {
        self.set(Self::FILTERED_OUT, filtered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_node_from_json() {
        let raw: RawNode = serde_json::from_str(
            r#"{"parent": "N1", "children": [], "length": 0.5, "leafcount": 1, "isTip": true}"#,
        )
        .unwrap();
        assert_eq!(raw.parent.as_deref(), Some("N1"));
        assert!(raw.is_tip);
        assert_eq!(raw.length, 0.5);
    }

    #[test]
    fn test_node_state_default() {
        let state = NodeState::new();
        assert!(state.is_visible());
        assert!(!state.is_selected());
        assert!(!state.is_hovered());
        assert!(!state.is_collapse_root());
    }

    #[test]
    fn test_node_state_all_flags() {
        let mut state = NodeState::new();
        state.set_hidden(true);
        state.set_selected(true);
        state.set_hovered(true);
        state.set_collapse_root(true);

        assert!(state.is_hidden());
        assert!(state.is_selected());
        assert!(state.is_hovered());
        assert!(state.is_collapse_root());

        state.set_hidden(false);
        assert!(state.is_visible());
        assert!(state.is_selected());
        assert!(state.is_collapse_root());
    }

    #[test]
    fn test_filtered_out_is_independent_of_collapse() {
        let mut state = NodeState::new();
        state.set_filtered_out(true);
        assert!(!state.is_visible());
        assert!(!state.is_hidden());

        state.set_hidden(true);
        state.set_filtered_out(false);
        assert!(!state.is_visible());
        state.set_hidden(false);
        assert!(state.is_visible());
    }
}
