//! Newick export.
//!
//! Tips are written as `"id":length`, internal nodes as `(c1,c2,...):length`.
//! The requested subtree root carries no length and the caller appends `;`.
//! Traversal uses an explicit stack so deep trees cannot overflow the call
//! stack.

use std::fmt::Write;

use petgraph::stable_graph::NodeIndex;

use super::model::PhyloTree;

enum Step {
    Enter(NodeIndex),
    Comma,
    Exit(NodeIndex),
}

/// Serialise the subtree rooted at `start`.
pub fn to_newick(tree: &PhyloTree, start: NodeIndex) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Enter(start)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(node) if tree.is_tip(node) => {
                let _ = write!(out, "\"{}\"", tree.name(node));
                write_length(&mut out, tree, node, start);
            }
            Step::Enter(node) => {
                out.push('(');
                stack.push(Step::Exit(node));
                let children = tree.children(node);
                for (i, &child) in children.iter().enumerate().rev() {
                    stack.push(Step::Enter(child));
                    if i > 0 {
                        stack.push(Step::Comma);
                    }
                }
            }
            Step::Comma => out.push(','),
            Step::Exit(node) => {
                out.push(')');
                write_length(&mut out, tree, node, start);
            }
        }
    }

    out
}

fn write_length(out: &mut String, tree: &PhyloTree, node: NodeIndex, start: NodeIndex) {
    if node != start {
        let _ = write!(out, ":{}", tree.length(node));
    }
}
