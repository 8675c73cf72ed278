use graphsplice_core::{EdgeId, NodeId};
use thiserror::Error;

/// Failures surfaced by [`crate::QueryGraph`]'s public contract.
#[derive(Debug, Error, PartialEq)]
pub enum QueryGraphError {
    /// Attempted to mutate a `QueryGraph`, or to iterate all edges directly.
    #[error("query graph does not support mutation or direct all-edge iteration")]
    NotSupported,

    /// `getEdgeIteratorState` could not find either direction of the requested edge.
    #[error("no edge {edge} adjacent to node {adj_node}")]
    EdgeNotFound { edge: EdgeId, adj_node: NodeId },

    /// A non-virtual node id was passed where a virtual node was required.
    #[error("node {0} is not a virtual node")]
    InvalidArgument(NodeId),

    #[error(transparent)]
    GraphModification(#[from] GraphModificationError),
}

/// Internal failures raised while splicing [`crate::QueryResult`]s into a
/// [`crate::GraphModification`]; converted into [`QueryGraphError`] at the boundary.
#[derive(Debug, Error, PartialEq)]
pub enum GraphModificationError {
    #[error("query result cites unknown base edge {0}")]
    UnknownEdge(EdgeId),

    #[error("wayIndex {way_index} out of range for edge {edge}'s geometry")]
    WayIndexOutOfRange { edge: EdgeId, way_index: usize },
}
