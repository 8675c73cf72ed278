//! The four-edges-per-snap virtual graph elements spliced into a base graph by a
//! [`crate::GraphModification`].

use graphsplice_core::{EdgeFlags, NodeId};
use geo::LineString;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::cell::Cell;

/// Which of the four virtual edges owned by one virtual node this is.
///
/// Slots pair up by their low bit (`BASE`/`BASE_REV`, `ADJ`/`ADJ_REV`), matching
/// [`graphsplice_core::EdgeId::reverse_pos`]'s `e ^ 1` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum VirtualEdgeSlot {
    /// Base-side neighbor (real tower or previous virtual node) -> this virtual node.
    Base = 0,
    /// This virtual node -> base-side neighbor.
    BaseRev = 1,
    /// This virtual node -> adj-side neighbor.
    Adj = 2,
    /// Adj-side neighbor -> this virtual node.
    AdjRev = 3,
}

impl VirtualEdgeSlot {
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            VirtualEdgeSlot::Base => VirtualEdgeSlot::BaseRev,
            VirtualEdgeSlot::BaseRev => VirtualEdgeSlot::Base,
            VirtualEdgeSlot::Adj => VirtualEdgeSlot::AdjRev,
            VirtualEdgeSlot::AdjRev => VirtualEdgeSlot::Adj,
        }
    }
}

/// A node introduced by a snap that fell strictly inside a base edge.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualNode {
    pub lat: f64,
    pub lon: f64,
    /// The base edge this virtual node was placed on.
    pub closest_edge: graphsplice_core::EdgeId,
}

/// One of the four directed virtual edges owned by a virtual node.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualEdge {
    pub slot: VirtualEdgeSlot,
    pub base_node: NodeId,
    pub adj_node: NodeId,
    pub distance: f64,
    pub flags: EdgeFlags,
    /// Pillar geometry oriented `base_node -> adj_node`, excluding both endpoints.
    pub pillars: LineString<f64>,
    unfavored: Cell<bool>,
}

impl VirtualEdge {
    #[must_use]
    pub fn new(slot: VirtualEdgeSlot, base_node: NodeId, adj_node: NodeId, distance: f64, flags: EdgeFlags, pillars: LineString<f64>) -> Self {
        Self { slot, base_node, adj_node, distance, flags, pillars, unfavored: Cell::new(false) }
    }

    #[must_use]
    pub fn is_unfavored(&self) -> bool {
        self.unfavored.get()
    }

    pub fn set_unfavored(&self, value: bool) {
        self.unfavored.set(value);
    }
}
