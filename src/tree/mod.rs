//! Tree data structures and operations.
//!
//! This module provides the rooted tree topology on top of petgraph's
//! StableGraph, the node types and state flags, Newick export, and the
//! engine that owns all per-node render state.

mod engine;
mod model;
mod newick;
mod node;

pub use engine::{NodeInfo, TreeEngine, TriangleHit};
pub use model::{ChildOrder, PhyloTree};
pub use newick::to_newick;
pub use node::{NodeState, RawNode, TreeNode};
