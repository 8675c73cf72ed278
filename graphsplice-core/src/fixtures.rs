//! An in-memory [`BaseGraph`] implementation used as test fixture by this crate and
//! by downstream crates exercising the query graph overlay and spatial hash table
//! against a concrete graph.
//!
//! Gated behind the `test-support` feature, exactly as the `styrowolf-valinor` base
//! keeps fixture-loading helpers behind `#[cfg(test)]`/dev-dependencies rather than
//! shipping them in the default build.

use crate::access::EdgeFlags;
use crate::base_graph::{BaseGraph, EdgeExplorer, EdgeFilter, EdgeIterator, EdgeIteratorState};
use crate::geometry::{length_along, reversed, WayGeometryMode};
use crate::ids::{EdgeId, NodeId};
use crate::shape::BBox;
use geo::LineString;

/// One undirected edge as stored by [`InMemoryBaseGraph`]. Direction is reconstructed
/// on demand depending on which endpoint the caller asks to be `adj_node`.
#[derive(Debug, Clone)]
pub struct StoredEdge {
    pub base: NodeId,
    pub adj: NodeId,
    pub flags: EdgeFlags,
    /// Pillar geometry oriented `base -> adj`, excluding both endpoints.
    pub pillars: LineString<f64>,
}

/// A minimal, densely-numbered graph used to exercise [`BaseGraph`] consumers in
/// tests: nodes `[0, N)`, edges `[0, M)`, each edge storing its own full pillar
/// geometry and pre-measured length (since pillar-geometry distance, not
/// great-circle endpoint distance, is what the spec requires).
#[derive(Debug, Clone)]
pub struct InMemoryBaseGraph {
    node_coords: Vec<(f64, f64)>,
    edges: Vec<StoredEdge>,
    edge_distances: Vec<f64>,
    adjacency: Vec<Vec<EdgeId>>,
}

impl InMemoryBaseGraph {
    /// Builds a graph from node coordinates and `(base, adj, pillars)` edges. Each
    /// edge's pillar list excludes both endpoints; distance is measured along
    /// `base -> pillars -> adj`.
    #[must_use]
    pub fn new(node_coords: Vec<(f64, f64)>, edges: Vec<(NodeId, NodeId, LineString<f64>, EdgeFlags)>) -> Self {
        let mut adjacency = vec![Vec::new(); node_coords.len()];
        let mut stored = Vec::with_capacity(edges.len());
        let mut distances = Vec::with_capacity(edges.len());

        for (i, (base, adj, pillars, flags)) in edges.into_iter().enumerate() {
            let edge_id = EdgeId(u32::try_from(i).expect("too many edges for fixture"));

            let (base_lat, base_lon) = node_coords[base.value() as usize];
            let (adj_lat, adj_lon) = node_coords[adj.value() as usize];
            let mut full = vec![geo::coord! { x: base_lon, y: base_lat }];
            full.extend_from_slice(&pillars.0);
            full.push(geo::coord! { x: adj_lon, y: adj_lat });
            distances.push(length_along(&LineString::new(full)));

            adjacency[base.value() as usize].push(edge_id);
            adjacency[adj.value() as usize].push(edge_id);
            stored.push(StoredEdge { base, adj, flags, pillars });
        }

        Self { node_coords, edges: stored, edge_distances: distances, adjacency }
    }

    #[must_use]
    pub fn edge_pillars(&self, edge: EdgeId) -> &LineString<f64> {
        &self.edges[edge.value() as usize].pillars
    }

    #[must_use]
    pub fn edge_distance(&self, edge: EdgeId) -> f64 {
        self.edge_distances[edge.value() as usize]
    }

    fn state_for(&self, edge_id: EdgeId, base_node: NodeId) -> EdgeIteratorState {
        let stored = &self.edges[edge_id.value() as usize];
        let distance = self.edge_distances[edge_id.value() as usize];
        if base_node == stored.base {
            EdgeIteratorState {
                edge: edge_id,
                base_node: stored.base,
                adj_node: stored.adj,
                distance,
                flags: stored.flags,
                pillars: stored.pillars.clone(),
            }
        } else {
            EdgeIteratorState {
                edge: edge_id,
                base_node: stored.adj,
                adj_node: stored.base,
                distance,
                flags: stored.flags,
                pillars: reversed(&stored.pillars),
            }
        }
    }
}

impl BaseGraph for InMemoryBaseGraph {
    fn node_count(&self) -> u32 {
        u32::try_from(self.node_coords.len()).expect("too many nodes for u32")
    }

    fn edge_count(&self) -> u32 {
        u32::try_from(self.edges.len()).expect("too many edges for u32")
    }

    fn bounds(&self) -> BBox {
        let (mut north, mut south) = (f64::MIN, f64::MAX);
        let (mut east, mut west) = (f64::MIN, f64::MAX);
        for &(lat, lon) in &self.node_coords {
            north = north.max(lat);
            south = south.min(lat);
            east = east.max(lon);
            west = west.min(lon);
        }
        BBox::new(north, east, south, west)
    }

    fn node_lat_lon(&self, node: NodeId) -> (f64, f64) {
        self.node_coords[node.value() as usize]
    }

    fn edge_iterator_state(&self, edge: EdgeId, adj_node: NodeId) -> Option<EdgeIteratorState> {
        let stored = self.edges.get(edge.value() as usize)?;
        if adj_node.is_any() {
            return Some(self.state_for(edge, stored.base));
        }
        if adj_node == stored.adj {
            Some(self.state_for(edge, stored.base))
        } else if adj_node == stored.base {
            Some(self.state_for(edge, stored.adj))
        } else {
            None
        }
    }

    fn edge_endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        let stored = &self.edges[edge.value() as usize];
        (stored.base, stored.adj)
    }

    fn create_edge_explorer<'g>(&'g self, filter: Option<Box<dyn EdgeFilter + 'g>>) -> Box<dyn EdgeExplorer + 'g> {
        Box::new(InMemoryExplorer { graph: self, filter, current: Vec::new(), cursor: None })
    }
}

struct InMemoryExplorer<'g> {
    graph: &'g InMemoryBaseGraph,
    filter: Option<Box<dyn EdgeFilter + 'g>>,
    current: Vec<EdgeIteratorState>,
    cursor: Option<usize>,
}

impl<'g> EdgeExplorer for InMemoryExplorer<'g> {
    fn set_base_node(&mut self, node: NodeId) -> &mut dyn EdgeIterator {
        self.current = self.graph.adjacency[node.value() as usize]
            .iter()
            .map(|&edge_id| self.graph.state_for(edge_id, node))
            .filter(|state| self.filter.as_ref().is_none_or(|f| f.accept(state)))
            .collect();
        self.cursor = None;
        self
    }
}

impl<'g> EdgeIterator for InMemoryExplorer<'g> {
    fn next(&mut self) -> bool {
        let next_cursor = self.cursor.map_or(0, |c| c + 1);
        if next_cursor < self.current.len() {
            self.cursor = Some(next_cursor);
            true
        } else {
            false
        }
    }

    fn edge(&self) -> EdgeId {
        self.current[self.cursor.expect("next() must be called before edge()")].edge
    }

    fn base_node(&self) -> NodeId {
        self.current[self.cursor.expect("next() must be called before base_node()")].base_node
    }

    fn adj_node(&self) -> NodeId {
        self.current[self.cursor.expect("next() must be called before adj_node()")].adj_node
    }

    fn distance(&self) -> f64 {
        self.current[self.cursor.expect("next() must be called before distance()")].distance
    }

    fn flags(&self) -> EdgeFlags {
        self.current[self.cursor.expect("next() must be called before flags()")].flags
    }

    fn fetch_way_geometry(&self, mode: WayGeometryMode) -> LineString<f64> {
        let state = &self.current[self.cursor.expect("next() must be called before fetch_way_geometry()")];
        let base_coord = {
            let (lat, lon) = self.graph.node_lat_lon(state.base_node);
            geo::coord! { x: lon, y: lat }
        };
        let adj_coord = {
            let (lat, lon) = self.graph.node_lat_lon(state.adj_node);
            geo::coord! { x: lon, y: lat }
        };
        state.way_geometry(mode, base_coord, adj_coord)
    }

    fn detach(&self, reverse: bool) -> EdgeIteratorState {
        let state = self.current[self.cursor.expect("next() must be called before detach()")].clone();
        if reverse {
            EdgeIteratorState {
                edge: state.edge,
                base_node: state.adj_node,
                adj_node: state.base_node,
                distance: state.distance,
                flags: state.flags,
                pillars: reversed(&state.pillars),
            }
        } else {
            state
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Access;

    fn two_node_graph(pillars: Vec<(f64, f64)>) -> InMemoryBaseGraph {
        InMemoryBaseGraph::new(
            vec![(0.0, 0.0), (0.0, 1.0)],
            vec![(
                NodeId(0),
                NodeId(1),
                LineString::from(pillars),
                EdgeFlags::all([Access::Car]),
            )],
        )
    }

    #[test]
    fn edge_iterator_state_orients_by_requested_adj_node() {
        let graph = two_node_graph(vec![]);
        let forward = graph.edge_iterator_state(EdgeId(0), NodeId(1)).unwrap();
        assert_eq!(forward.base_node, NodeId(0));
        assert_eq!(forward.adj_node, NodeId(1));

        let backward = graph.edge_iterator_state(EdgeId(0), NodeId(0)).unwrap();
        assert_eq!(backward.base_node, NodeId(1));
        assert_eq!(backward.adj_node, NodeId(0));

        assert!((forward.distance - backward.distance).abs() < 1e-9);
    }

    #[test]
    fn explorer_yields_both_incident_edges_for_a_triangle() {
        let graph = InMemoryBaseGraph::new(
            vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)],
            vec![
                (NodeId(0), NodeId(1), LineString::from(vec![]), EdgeFlags::all([Access::Car])),
                (NodeId(1), NodeId(2), LineString::from(vec![]), EdgeFlags::all([Access::Car])),
                (NodeId(0), NodeId(2), LineString::from(vec![]), EdgeFlags::all([Access::Car])),
            ],
        );

        let mut explorer = graph.create_edge_explorer(None);
        let iter = explorer.set_base_node(NodeId(0));
        let mut seen = Vec::new();
        while iter.next() {
            seen.push(iter.edge());
        }
        seen.sort();
        assert_eq!(seen, vec![EdgeId(0), EdgeId(2)]);
    }
}
