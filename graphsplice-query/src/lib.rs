//! An ephemeral, read-only graph overlay that splices snapped GPS fixes into an
//! immutable base graph for the lifetime of a single routing request.
//!
//! Given a batch of [`QueryResult`]s (as produced by a `graphsplice-spatial-hash`
//! nearest search), a [`GraphModificationBuilder`] derives the virtual nodes and
//! edges needed to route from/to those fixes without mutating the base graph, and a
//! [`QueryGraph`] presents the spliced result as an ordinary [`graphsplice_core::BaseGraph`].

mod error;
mod modification;
mod query_graph;
mod query_result;
mod virtual_graph;

pub use error::{GraphModificationError, QueryGraphError};
pub use modification::{GraphModification, GraphModificationBuilder, NodeEdgeChanges};
pub use query_graph::{BaseGraphView, QueryGraph, TurnCostSource};
pub use query_result::{QueryResult, SnappedPosition};
pub use virtual_graph::{VirtualEdge, VirtualEdgeSlot, VirtualNode};
