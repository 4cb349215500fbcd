//! Layout algorithms for phylogenetic trees.
//!
//! This module computes tree-space positions for every node. The engine copies
//! them into its position arrays and derives render buffers from them.

pub mod clade;
pub mod radial;

pub use clade::CladeGeometry;
pub use radial::{RadialConfig, RadialLayout, RadialResult};
