//! Shared graph contract, geometry helpers, and shapes used by the spatial hash
//! table and the query graph overlay.
//!
//! This crate has no opinion on how a base graph is stored on disk or built from
//! OSM data; it only defines the read-only [`BaseGraph`] contract those subsystems
//! consume, plus the geometry/shape glue (~5% of this system, per its design notes)
//! shared by both.

pub mod access;
pub mod base_graph;
pub mod geometry;
pub mod ids;
pub mod shape;

#[cfg(feature = "test-support")]
pub mod fixtures;

pub use access::{Access, EdgeFlags};
pub use base_graph::{AcceptAll, BaseGraph, EdgeExplorer, EdgeFilter, EdgeIterator, EdgeIteratorState};
pub use geometry::WayGeometryMode;
pub use ids::{EdgeId, NodeId, ANY_NODE};
pub use shape::{BBox, Circle, Shape};
