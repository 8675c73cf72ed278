//! The read-only graph contract shared by the base graph and the query graph
//! overlay.
//!
//! This models the GraphHopper-style `Graph` / `EdgeExplorer` / `EdgeIteratorState`
//! triad: a graph exposes node/edge counts, a lat/lon accessor, and an edge explorer
//! per node that hands back a stateful, non-reentrant iterator.

use crate::access::EdgeFlags;
use crate::geometry::WayGeometryMode;
use crate::ids::{EdgeId, NodeId};
use crate::shape::BBox;
use geo::LineString;

/// A single directed view of an edge: `base_node --edge--> adj_node`.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeIteratorState {
    pub edge: EdgeId,
    pub base_node: NodeId,
    pub adj_node: NodeId,
    pub distance: f64,
    pub flags: EdgeFlags,
    /// Pillar geometry oriented `base_node -> adj_node`, excluding both endpoints.
    pub pillars: LineString<f64>,
}

impl EdgeIteratorState {
    /// The full geometry for this directed view, honoring `mode`'s endpoint
    /// inclusion, given the two endpoints' coordinates.
    #[must_use]
    pub fn way_geometry(&self, mode: WayGeometryMode, base_coord: geo::Coord<f64>, adj_coord: geo::Coord<f64>) -> LineString<f64> {
        let mut coords = Vec::with_capacity(self.pillars.0.len() + 2);
        if matches!(mode, WayGeometryMode::All | WayGeometryMode::BaseAndPillars) {
            coords.push(base_coord);
        }
        coords.extend_from_slice(&self.pillars.0);
        if matches!(mode, WayGeometryMode::All | WayGeometryMode::PillarsAndAdj) {
            coords.push(adj_coord);
        }
        LineString::new(coords)
    }
}

/// Something that can accept or reject an edge while an explorer iterates.
///
/// The "glue" equivalent of the base graph's costing/access layer (OSM flag
/// interpretation is out of scope; this trait is the seam a caller's own costing
/// implementation plugs into).
pub trait EdgeFilter {
    fn accept(&self, edge: &EdgeIteratorState) -> bool;
}

/// An [`EdgeFilter`] that accepts every edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl EdgeFilter for AcceptAll {
    fn accept(&self, _edge: &EdgeIteratorState) -> bool {
        true
    }
}

/// A stateful, non-reentrant cursor over one node's incident edges.
///
/// Mirrors the base graph's edge iterator: call [`EdgeIterator::next`] until it
/// returns `false`, reading the current edge's fields in between.
pub trait EdgeIterator {
    fn next(&mut self) -> bool;
    fn edge(&self) -> EdgeId;
    fn base_node(&self) -> NodeId;
    fn adj_node(&self) -> NodeId;
    fn distance(&self) -> f64;
    fn flags(&self) -> EdgeFlags;
    fn fetch_way_geometry(&self, mode: WayGeometryMode) -> LineString<f64>;

    /// A detached, owned snapshot of the current position, optionally reversed.
    fn detach(&self, reverse: bool) -> EdgeIteratorState;
}

/// Produces a (single, reused) [`EdgeIterator`] positioned at a given base node.
///
/// Per the concurrency model, the returned iterator is invalidated by the next
/// call to `set_base_node` — a caller must not hold two live iterators from the
/// same explorer.
pub trait EdgeExplorer {
    fn set_base_node(&mut self, node: NodeId) -> &mut dyn EdgeIterator;
}

/// The read-only graph contract exposed by both the base graph and the query graph
/// overlay (`nodes()`, `edges()`, `nodeAccess()`, `bounds()`, `getEdgeIteratorState`,
/// `createEdgeExplorer`).
pub trait BaseGraph {
    fn node_count(&self) -> u32;
    fn edge_count(&self) -> u32;
    fn bounds(&self) -> BBox;

    /// Looks up a node's coordinates.
    fn node_lat_lon(&self, node: NodeId) -> (f64, f64);

    /// The canonical (as-stored) directed view of `edge`.
    fn edge_iterator_state(&self, edge: EdgeId, adj_node: NodeId) -> Option<EdgeIteratorState>;

    /// The two endpoints of `edge`, in storage order (`base`, `adj`).
    fn edge_endpoints(&self, edge: EdgeId) -> (NodeId, NodeId);

    fn other_node(&self, edge: EdgeId, node: NodeId) -> NodeId {
        let (base, adj) = self.edge_endpoints(edge);
        if node == base { adj } else { base }
    }

    fn is_adjacent_to_node(&self, edge: EdgeId, node: NodeId) -> bool {
        let (base, adj) = self.edge_endpoints(edge);
        node == base || node == adj
    }

    /// A boxed explorer, pre-filtered by `filter` if given.
    fn create_edge_explorer<'g>(&'g self, filter: Option<Box<dyn EdgeFilter + 'g>>) -> Box<dyn EdgeExplorer + 'g>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Access;

    #[test]
    fn way_geometry_includes_requested_endpoints_only() {
        let state = EdgeIteratorState {
            edge: EdgeId(0),
            base_node: NodeId(0),
            adj_node: NodeId(1),
            distance: 10.0,
            flags: EdgeFlags::all([Access::Car]),
            pillars: LineString::from(vec![(0.5, 0.5)]),
        };
        let base = geo::coord! { x: 0.0, y: 0.0 };
        let adj = geo::coord! { x: 1.0, y: 1.0 };

        let pillar_only = state.way_geometry(WayGeometryMode::PillarOnly, base, adj);
        assert_eq!(pillar_only.0.len(), 1);

        let all = state.way_geometry(WayGeometryMode::All, base, adj);
        assert_eq!(all.0.len(), 3);
        assert_eq!(all.0.first(), Some(&base));
        assert_eq!(all.0.last(), Some(&adj));
    }
}
