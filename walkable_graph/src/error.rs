// Error taxonomy for graph, generator and pathfinder boundary operations.
//
// Classification rejections (no floor, step or slope out of range, passage
// too narrow) are not errors: the classifier returns `None` and the
// candidate simply never becomes a node. Only operations on the public
// surface of `MutableGraph`, `CompressedGraph`, the generator and the
// pathfinder return these.

use crate::types::{NodeId, Point3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The start point has no walkable floor beneath it.
    #[error("no walkable floor beneath start point {0}")]
    NoGraph(Point3),

    #[error("no path from node {start} to node {end}")]
    NoPath { start: NodeId, end: NodeId },

    #[error("unknown cost set `{0}`")]
    NoCost(String),

    #[error("node {id} is out of range for a graph of {len} nodes")]
    OutOfRange { id: NodeId, len: usize },

    /// An alternate cost set was used before the graph was compressed.
    #[error("cost set `{0}` can only be written after compression")]
    NotCompressed(String),

    #[error("invalid cost operation: {0}")]
    InvalidCostOperation(String),

    #[error("unknown node attribute `{0}`")]
    UnknownAttribute(String),

    #[error("length mismatch: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("invalid generator config: {0}")]
    InvalidConfig(String),

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
