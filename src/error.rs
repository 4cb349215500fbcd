//! Error types for tree construction, metadata upload and recoloring.
//!
//! Every fallible operation on the engine validates its input before touching
//! node state, so an `Err` always means "nothing changed".

use thiserror::Error;

/// Errors raised while building or querying the tree topology.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("root node `{0}` is not present in the tree data")]
    MissingRoot(String),

    #[error("node `{id}` referenced by `{referenced_by}` does not exist")]
    UnknownNode { id: String, referenced_by: String },

    #[error("node `{child}` is listed under `{listed_under}` but names `{parent}` as its parent")]
    ParentMismatch {
        child: String,
        listed_under: String,
        parent: String,
    },

    #[error("node `{0}` is listed as a child of more than one node")]
    MultipleParents(String),

    #[error("root node `{0}` has a parent")]
    RootHasParent(String),

    #[error("tree data contains a cycle")]
    Cycle,

    #[error("node `{0}` is not reachable from the root")]
    Unreachable(String),

    #[error("node `{id}` has a negative branch length ({length})")]
    NegativeLength { id: String, length: f64 },

    #[error("invalid tree data: {0}")]
    InvalidData(String),

    #[error("no node with id `{0}`")]
    NodeNotFound(String),
}

/// Whole-file rejections for uploaded tab-delimited metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("uploaded file is empty")]
    Empty,

    #[error("line {line} has no tab delimiter; metadata files must be tab-separated")]
    NoTabDelimiter { line: usize },

    #[error("line {line} has {found} columns, expected {expected}")]
    ColumnMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// Errors raised when a color mode cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("attribute `{0}` is not numeric")]
    NotNumeric(String),

    #[error("attribute `{0}` has no value range")]
    MissingRange(String),
}

/// Top-level error for engine construction and engine-wide operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("viewport must be positive, got {width}x{height}")]
    InvalidViewport { height: f64, width: f64 },

    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("no node matches the filter on `{0}`")]
    EmptyFilter(String),
}
