//! PhyloTree - rooted tree topology.
//!
//! The topology lives in petgraph's StableGraph: node weights carry the stable
//! id and the ordered child list, edges run parent→child and carry the branch
//! length. The pre-order is cached because every layout pass and buffer
//! rebuild walks it.

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{Dfs, DfsPostOrder, NodeIndexable};
use petgraph::{Directed, Direction};

use super::node::{RawNode, TreeNode};
use crate::error::TreeError;

/// Child ordering applied by [`PhyloTree::order_children`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOrder {
    /// Smaller clades first.
    Increasing,
    /// Larger clades first.
    Decreasing,
}

/// A validated rooted tree.
#[derive(Debug, Clone)]
pub struct PhyloTree {
    graph: StableGraph<TreeNode, f32, Directed>,
    ids: HashMap<String, NodeIndex>,
    root: NodeIndex,
    preorder: Vec<NodeIndex>,
}

impl PhyloTree {
    /// Build a tree from endpoint records keyed by node id.
    ///
    /// Rejects unknown references, parent/child disagreements, cycles and
    /// nodes unreachable from the root. Leaf counts are recomputed from the
    /// topology; supplied values are only checked.
    pub fn from_raw(root_id: &str, nodes: &BTreeMap<String, RawNode>) -> Result<Self, TreeError> {
        let root_raw = nodes
            .get(root_id)
            .ok_or_else(|| TreeError::MissingRoot(root_id.to_string()))?;
        if root_raw.parent.is_some() {
            return Err(TreeError::RootHasParent(root_id.to_string()));
        }

        let mut graph = StableGraph::with_capacity(nodes.len(), nodes.len().saturating_sub(1));
        let mut ids = HashMap::with_capacity(nodes.len());

        for (name, raw) in nodes {
            if raw.length.is_nan() || raw.length < 0.0 {
                return Err(TreeError::NegativeLength {
                    id: name.clone(),
                    length: raw.length,
                });
            }
            let index = graph.add_node(TreeNode::new(name.clone()));
            ids.insert(name.clone(), index);
        }

        let mut has_parent: HashSet<NodeIndex> = HashSet::with_capacity(nodes.len());
        for (name, raw) in nodes {
            let parent_index = ids[name];
            let mut children = Vec::with_capacity(raw.children.len());

            for child_name in &raw.children {
                let (&child, child_raw) = ids
                    .get(child_name)
                    .zip(nodes.get(child_name))
                    .ok_or_else(|| TreeError::UnknownNode {
                        id: child_name.clone(),
                        referenced_by: name.clone(),
                    })?;

                if child_raw.parent.as_deref() != Some(name.as_str()) {
                    return Err(TreeError::ParentMismatch {
                        child: child_name.clone(),
                        listed_under: name.clone(),
                        parent: child_raw.parent.clone().unwrap_or_default(),
                    });
                }
                if !has_parent.insert(child) {
                    return Err(TreeError::MultipleParents(child_name.clone()));
                }

                graph.add_edge(parent_index, child, child_raw.length as f32);
                children.push(child);
            }

            graph[parent_index].children = children;
        }

        for (name, raw) in nodes {
            if let Some(parent) = &raw.parent {
                if !ids.contains_key(parent) {
                    return Err(TreeError::UnknownNode {
                        id: parent.clone(),
                        referenced_by: name.clone(),
                    });
                }
            }
        }

        let root = ids[root_id];
        if has_parent.contains(&root) {
            return Err(TreeError::RootHasParent(root_id.to_string()));
        }
        if toposort(&graph, None).is_err() {
            return Err(TreeError::Cycle);
        }

        let mut reached: HashSet<NodeIndex> = HashSet::with_capacity(nodes.len());
        let mut dfs = Dfs::new(&graph, root);
        while let Some(node) = dfs.next(&graph) {
            reached.insert(node);
        }
        if reached.len() != graph.node_count() {
            let missing = nodes
                .keys()
                .find(|name| !reached.contains(&ids[*name]))
                .cloned()
                .unwrap_or_default();
            return Err(TreeError::Unreachable(missing));
        }

        let mut tree = Self {
            preorder: compute_preorder(&graph, root),
            graph,
            ids,
            root,
        };
        tree.compute_leafcounts();

        let mismatched = nodes
            .iter()
            .filter(|(name, raw)| {
                raw.leafcount
                    .is_some_and(|count| count != tree.graph[tree.ids[*name]].leafcount)
            })
            .count();
        if mismatched > 0 {
            log::warn!("{mismatched} nodes carried a leafcount that disagrees with the topology; using recomputed values");
        }
        let tip_flags = nodes
            .iter()
            .filter(|(name, raw)| raw.is_tip != tree.graph[tree.ids[*name]].is_tip())
            .count();
        if tip_flags > 0 {
            log::debug!("{tip_flags} nodes carried an isTip flag that disagrees with their children");
        }

        log::info!(
            "loaded tree with {} nodes and {} tips",
            tree.node_count(),
            tree.leafcount(tree.root)
        );
        Ok(tree)
    }

    /// Build a tree from a JSON object `id -> {parent, children, length, leafcount, isTip}`.
    pub fn from_json(root_id: &str, json: &str) -> Result<Self, TreeError> {
        let nodes: BTreeMap<String, RawNode> =
            serde_json::from_str(json).map_err(|e| TreeError::InvalidData(e.to_string()))?;
        Self::from_raw(root_id, &nodes)
    }

    fn compute_leafcounts(&mut self) {
        let mut dfs = DfsPostOrder::new(&self.graph, self.root);
        while let Some(node) = dfs.next(&self.graph) {
            let count = if self.graph[node].is_tip() {
                1
            } else {
                self.graph[node]
                    .children
                    .iter()
                    .map(|&child| self.graph[child].leafcount)
                    .sum()
            };
            self.graph[node].leafcount = count;
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The root node.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Number of nodes, tips included.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Upper bound on node slot indices; equals `node_count` since nodes are
    /// never removed.
    pub fn node_bound(&self) -> usize {
        self.graph.node_bound()
    }

    /// Slot of the node with stable id `id`.
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    /// Look up a node, failing with [`TreeError::NodeNotFound`].
    pub fn require(&self, id: &str) -> Result<NodeIndex, TreeError> {
        self.index_of(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    /// Stable id of a node.
    pub fn name(&self, node: NodeIndex) -> &str {
        &self.graph[node].name
    }

    /// Children in angular order.
    pub fn children(&self, node: NodeIndex) -> &[NodeIndex] {
        &self.graph[node].children
    }

    /// Number of tips below the node, 1 for a tip.
    pub fn leafcount(&self, node: NodeIndex) -> u32 {
        self.graph[node].leafcount
    }

    /// Check if the node has no children.
    pub fn is_tip(&self, node: NodeIndex) -> bool {
        self.graph[node].is_tip()
    }

    /// Parent of the node; `None` for the root.
    pub fn parent(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(node, Direction::Incoming)
            .next()
    }

    /// Branch length from the parent; 0 for the root.
    pub fn length(&self, node: NodeIndex) -> f32 {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .next()
            .map(|edge| *edge.weight())
            .unwrap_or(0.0)
    }

    /// Nodes in pre-order, each node's children in their stored order.
    pub fn preorder(&self) -> &[NodeIndex] {
        &self.preorder
    }

    /// Nodes ordered so that every node comes after all of its descendants.
    pub fn bottom_up(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.preorder.iter().rev().copied()
    }

    /// All nodes strictly below `node`.
    pub fn descendants(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut result = Vec::new();
        let mut dfs = Dfs::new(&self.graph, node);
        while let Some(next) = dfs.next(&self.graph) {
            if next != node {
                result.push(next);
            }
        }
        result
    }

    /// Ancestors of `node`, nearest first, root last.
    #[cfg(test)]
    pub(crate) fn ancestors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(self.parent(node), move |&n| self.parent(n))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Reorder every node's children by clade size (stable for ties).
    ///
    /// Positions are stale afterwards; the caller re-runs the layout.
    pub fn order_children(&mut self, order: ChildOrder) {
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        for node in nodes {
            if self.graph[node].children.len() < 2 {
                continue;
            }
            let mut children = std::mem::take(&mut self.graph[node].children);
            match order {
                ChildOrder::Increasing => {
                    children.sort_by_key(|&child| self.graph[child].leafcount)
                }
                ChildOrder::Decreasing => children.sort_by(|&a, &b| {
                    self.graph[b].leafcount.cmp(&self.graph[a].leafcount)
                }),
            }
            self.graph[node].children = children;
        }
        self.preorder = compute_preorder(&self.graph, self.root);
    }
}

/// Iterative pre-order honoring child order.
fn compute_preorder(graph: &StableGraph<TreeNode, f32, Directed>, root: NodeIndex) -> Vec<NodeIndex> {
    let mut order = Vec::with_capacity(graph.node_count());
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        order.push(node);
        stack.extend(graph[node].children.iter().rev());
    }
    order
}
