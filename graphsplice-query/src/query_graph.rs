//! The ephemeral, read-only graph overlay that splices a batch of snapped GPS fixes
//! into an immutable base graph for the lifetime of a single routing request.

use crate::error::QueryGraphError;
use crate::modification::GraphModification;
use crate::virtual_graph::VirtualEdgeSlot;
use graphsplice_core::geometry::WayGeometryMode;
use graphsplice_core::{
    AcceptAll, BaseGraph, EdgeExplorer, EdgeFilter, EdgeId, EdgeIterator, EdgeIteratorState, NodeId, ANY_NODE,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Maximum heading deviation, in radians, a virtual edge may diverge from a fix's
/// reported heading before it's marked unfavored. `~100` degrees.
const MAX_HEADING_DELTA_RADIANS: f64 = 1.74;

/// Supplies turn costs at real graph nodes; turn costs are an external, optional
/// concern a [`QueryGraph`] substitutes virtual edges into rather than computing
/// itself.
pub trait TurnCostSource {
    fn turn_cost(&self, from_edge: EdgeId, via_node: NodeId, to_edge: EdgeId) -> f64;
}

/// A read-only overlay of `main_nodes`/`main_edges` real graph elements plus whatever
/// virtual nodes/edges a [`GraphModification`] spliced in, valid only as long as its
/// owning request lives.
pub struct QueryGraph<'g> {
    base: &'g dyn BaseGraph,
    modification: Rc<GraphModification>,
    main_nodes: u32,
    main_edges: u32,
    use_edge_explorer_cache: bool,
    explorer_cache: RefCell<HashMap<NodeId, Vec<EdgeId>>>,
}

impl<'g> QueryGraph<'g> {
    #[must_use]
    pub fn new(base: &'g dyn BaseGraph, modification: Rc<GraphModification>) -> Self {
        Self {
            base,
            main_nodes: base.node_count(),
            main_edges: base.edge_count(),
            modification,
            use_edge_explorer_cache: false,
            explorer_cache: RefCell::new(HashMap::new()),
        }
    }

    /// Enables the per-node filtered-edge-list cache.
    ///
    /// Only safe when every [`EdgeExplorer`] this `QueryGraph` creates is filtered
    /// identically for the lifetime of this instance — the cache key is the node id
    /// alone, not `(node, filter)`, since a `QueryGraph` is built fresh per request and
    /// a request typically uses one costing filter throughout.
    pub fn enable_edge_explorer_cache(&mut self) {
        self.use_edge_explorer_cache = true;
    }

    #[must_use]
    pub fn is_virtual_node(&self, node: NodeId) -> bool {
        node.value() >= self.main_nodes
    }

    #[must_use]
    pub fn is_virtual_edge(&self, edge: EdgeId) -> bool {
        edge.value() >= self.main_edges
    }

    /// The base edge a virtual node was snapped onto, or `None` if `node` isn't
    /// virtual.
    #[must_use]
    pub fn get_original_edge_from_virtual_node(&self, node: NodeId) -> Option<EdgeId> {
        self.modification.virtual_node(node).map(|vn| vn.closest_edge)
    }

    /// A read-only view of just the base graph, unaffected by this overlay's splicing
    /// — but sharing the same [`GraphModification`] so that unfavored-edge state
    /// stays consistent between the two views.
    #[must_use]
    pub fn base_graph_view(&self) -> BaseGraphView<'g> {
        BaseGraphView { base: self.base, modification: Rc::clone(&self.modification) }
    }

    /// The primary, `Result`-returning edge lookup. See [`BaseGraph::edge_iterator_state`]
    /// for the fallible wrapper this backs.
    ///
    /// # Errors
    ///
    /// Returns [`QueryGraphError::EdgeNotFound`] if `edge` isn't adjacent to
    /// `adj_node` in either the base graph or this overlay's virtual edges.
    pub fn get_edge_iterator_state(&self, edge: EdgeId, adj_node: NodeId) -> Result<EdgeIteratorState, QueryGraphError> {
        if self.is_virtual_edge(edge) {
            let ve = self
                .modification
                .virtual_edge(edge)
                .ok_or(QueryGraphError::EdgeNotFound { edge, adj_node })?;
            if adj_node.is_any() || adj_node == ve.adj_node {
                return Ok(EdgeIteratorState {
                    edge,
                    base_node: ve.base_node,
                    adj_node: ve.adj_node,
                    distance: ve.distance,
                    flags: ve.flags,
                    pillars: ve.pillars.clone(),
                });
            }
            if adj_node == ve.base_node {
                let rev = self
                    .modification
                    .virtual_edge(edge.reverse_pos())
                    .ok_or(QueryGraphError::EdgeNotFound { edge, adj_node })?;
                return Ok(EdgeIteratorState {
                    edge: edge.reverse_pos(),
                    base_node: rev.base_node,
                    adj_node: rev.adj_node,
                    distance: rev.distance,
                    flags: rev.flags,
                    pillars: rev.pillars.clone(),
                });
            }
            return Err(QueryGraphError::EdgeNotFound { edge, adj_node });
        }

        self.base
            .edge_iterator_state(edge, adj_node)
            .ok_or(QueryGraphError::EdgeNotFound { edge, adj_node })
    }

    /// Marks both directions of a virtual edge unfavored (per `enforceHeading`-style
    /// callers steering a route away from a fix's reported heading).
    ///
    /// # Errors
    ///
    /// Returns [`QueryGraphError::InvalidArgument`] if `virtual_node_id` isn't a
    /// virtual node.
    pub fn unfavor_virtual_edge_pair(&self, virtual_node_id: NodeId, edge: EdgeId) -> Result<(), QueryGraphError> {
        if !self.is_virtual_node(virtual_node_id) {
            return Err(QueryGraphError::InvalidArgument(virtual_node_id));
        }
        if let Some(ve) = self.modification.virtual_edge(edge) {
            ve.set_unfavored(true);
        }
        if let Some(rev) = self.modification.virtual_edge(edge.reverse_pos()) {
            rev.set_unfavored(true);
        }
        Ok(())
    }

    #[must_use]
    pub fn is_unfavored(&self, edge: EdgeId) -> bool {
        self.modification.virtual_edge(edge).is_some_and(|ve| ve.is_unfavored())
    }

    /// Clears every unfavored mark this overlay has set, readying the graph for a
    /// fresh attempt at routing through the same splice.
    pub fn clear_unfavored_status(&self) {
        for ve in self.modification.virtual_edges() {
            ve.set_unfavored(false);
        }
    }

    /// Unfavors whichever of a virtual node's two *penalized-side* outbound virtual
    /// edges diverges from `heading_degrees` (compass bearing, `0` = north) by more
    /// than ~100 degrees. The penalized side is `{VE_BASE, VE_ADJ_REV}` when `incoming`
    /// is set (the fix is an arrival heading), else `{VE_BASE_REV, VE_ADJ}` (a
    /// departure heading). A `NaN` heading is a no-op.
    ///
    /// Returns `true` iff at least one edge pair was marked unfavored.
    ///
    /// # Errors
    ///
    /// Returns [`QueryGraphError::InvalidArgument`] if `node` isn't a virtual node.
    pub fn enforce_heading(&self, node: NodeId, heading_degrees: f64, incoming: bool) -> Result<bool, QueryGraphError> {
        if !self.is_virtual_node(node) {
            return Err(QueryGraphError::InvalidArgument(node));
        }
        if heading_degrees.is_nan() {
            return Ok(false);
        }
        let heading_angle = heading_degrees.to_radians();
        let penalized_side = if incoming {
            [VirtualEdgeSlot::Base, VirtualEdgeSlot::AdjRev]
        } else {
            [VirtualEdgeSlot::BaseRev, VirtualEdgeSlot::Adj]
        };

        let mut any_marked = false;
        for slot in penalized_side {
            let edge = self.virtual_edge_id_for(node, slot);
            let tangent = self.tangent_angle_at(node, edge)?;
            let delta = wrap_to_pi(tangent - heading_angle);
            if delta.abs() > MAX_HEADING_DELTA_RADIANS {
                self.unfavor_virtual_edge_pair(node, edge)?;
                any_marked = true;
            }
        }
        Ok(any_marked)
    }

    fn virtual_edge_id_for(&self, node: NodeId, slot: VirtualEdgeSlot) -> EdgeId {
        let k = (node.value() - self.main_nodes) as usize;
        self.modification.virtual_edge_id(k, slot)
    }

    /// The compass bearing (radians, `0` = north, clockwise) of `edge` at its
    /// endpoint touching `node`.
    fn tangent_angle_at(&self, node: NodeId, edge: EdgeId) -> Result<f64, QueryGraphError> {
        let state = self.get_edge_iterator_state(edge, ANY_NODE)?;
        let (base_lat, base_lon) = self.node_lat_lon(state.base_node);
        let (adj_lat, adj_lon) = self.node_lat_lon(state.adj_node);
        let base_coord = geo::coord! { x: base_lon, y: base_lat };
        let adj_coord = geo::coord! { x: adj_lon, y: adj_lat };
        let geometry = state.way_geometry(WayGeometryMode::All, base_coord, adj_coord);

        let (from, to) = if state.base_node == node {
            (geometry.0[0], geometry.0[1])
        } else {
            let n = geometry.0.len();
            (geometry.0[n - 2], geometry.0[n - 1])
        };
        Ok((to.x - from.x).atan2(to.y - from.y))
    }

    /// Passes a turn cost through to `turn_costs`, substituting each virtual edge for
    /// the base edge it was spliced from. Returns `0.0` when `via_node` is itself
    /// virtual, since a route continuing straight through a snap incurs no real
    /// intersection turn.
    #[must_use]
    pub fn get_extension_turn_cost(&self, turn_costs: &dyn TurnCostSource, from_edge: EdgeId, via_node: NodeId, to_edge: EdgeId) -> f64 {
        if self.is_virtual_node(via_node) {
            return 0.0;
        }
        let real_from = self.resolve_to_real_edge(from_edge);
        let real_to = self.resolve_to_real_edge(to_edge);
        turn_costs.turn_cost(real_from, via_node, real_to)
    }

    fn resolve_to_real_edge(&self, edge: EdgeId) -> EdgeId {
        self.modification.virtual_edge(edge).map_or(edge, |_| {
            // A virtual edge's originating base edge, recovered via its node's splice site.
            let k = (edge.value() - self.main_edges) as usize / 4;
            self.modification.virtual_nodes()[k].closest_edge
        })
    }

    /// Mutation is not supported on a query graph overlay; use the underlying base
    /// graph's own builder.
    ///
    /// # Errors
    ///
    /// Always returns [`QueryGraphError::NotSupported`].
    pub fn edge(&self, _base_node: NodeId, _adj_node: NodeId) -> Result<EdgeId, QueryGraphError> {
        Err(QueryGraphError::NotSupported)
    }

    /// # Errors
    ///
    /// Always returns [`QueryGraphError::NotSupported`].
    pub fn copy_to(&self, _other: &mut dyn BaseGraph) -> Result<(), QueryGraphError> {
        Err(QueryGraphError::NotSupported)
    }

    fn edges_from_real_node(&self, node: NodeId) -> Vec<EdgeId> {
        if let Some(changes) = self.modification.node_changes(node) {
            let mut explorer = self.base.create_edge_explorer(None);
            let iter = explorer.set_base_node(node);
            let mut edges = Vec::new();
            while iter.next() {
                let e = iter.edge();
                if !changes.removed_edges.contains(&e) {
                    edges.push(e);
                }
            }
            edges.extend(changes.additional_edges.iter().copied());
            edges
        } else {
            let mut explorer = self.base.create_edge_explorer(None);
            let iter = explorer.set_base_node(node);
            let mut edges = Vec::new();
            while iter.next() {
                edges.push(iter.edge());
            }
            edges
        }
    }

    fn edges_from_virtual_node(&self, node: NodeId) -> Vec<EdgeId> {
        let k = (node.value() - self.main_nodes) as usize;
        vec![
            self.modification.virtual_edge_id(k, VirtualEdgeSlot::BaseRev),
            self.modification.virtual_edge_id(k, VirtualEdgeSlot::Adj),
        ]
    }

    fn edges_from(&self, node: NodeId) -> Vec<EdgeId> {
        if let Some(cached) = self.use_edge_explorer_cache.then(|| self.explorer_cache.borrow().get(&node).cloned()).flatten() {
            return cached;
        }
        let edges = if self.is_virtual_node(node) {
            self.edges_from_virtual_node(node)
        } else {
            self.edges_from_real_node(node)
        };
        if self.use_edge_explorer_cache {
            self.explorer_cache.borrow_mut().insert(node, edges.clone());
        }
        edges
    }

    /// The directed view of `edge` oriented so `base_node == node`, however that
    /// direction needs to be reached: flipping a real edge's hint node (its id is
    /// shared by both directions), or switching a virtual edge to its paired slot id
    /// (real and virtual edges use different reverse-direction conventions).
    fn state_oriented_from(&self, node: NodeId, edge: EdgeId) -> Option<EdgeIteratorState> {
        if self.is_virtual_edge(edge) {
            let ve = self.modification.virtual_edge(edge)?;
            if ve.base_node == node {
                return self.get_edge_iterator_state(edge, ANY_NODE).ok();
            }
            return self.get_edge_iterator_state(edge.reverse_pos(), ANY_NODE).ok();
        }
        let (b, a) = self.base.edge_endpoints(edge);
        let other = if b == node { a } else { b };
        self.base.edge_iterator_state(edge, other)
    }

    /// The opposite-direction view of `state`. Real edges keep their id (a single
    /// storage slot traversed both ways); virtual edges switch to their paired slot
    /// id, since each direction is a distinct virtual edge by construction.
    fn reverse_state(&self, state: &EdgeIteratorState) -> EdgeIteratorState {
        let edge = if self.is_virtual_edge(state.edge) { state.edge.reverse_pos() } else { state.edge };
        EdgeIteratorState {
            edge,
            base_node: state.adj_node,
            adj_node: state.base_node,
            distance: state.distance,
            flags: state.flags,
            pillars: graphsplice_core::geometry::reversed(&state.pillars),
        }
    }
}

impl<'g> BaseGraph for QueryGraph<'g> {
    fn node_count(&self) -> u32 {
        self.main_nodes + self.modification.virtual_node_count()
    }

    fn edge_count(&self) -> u32 {
        self.main_edges + self.modification.virtual_edge_count()
    }

    fn bounds(&self) -> graphsplice_core::BBox {
        self.base.bounds()
    }

    fn node_lat_lon(&self, node: NodeId) -> (f64, f64) {
        if let Some(vn) = self.modification.virtual_node(node) {
            (vn.lat, vn.lon)
        } else {
            self.base.node_lat_lon(node)
        }
    }

    fn edge_iterator_state(&self, edge: EdgeId, adj_node: NodeId) -> Option<EdgeIteratorState> {
        self.get_edge_iterator_state(edge, adj_node).ok()
    }

    fn edge_endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        if let Some(ve) = self.modification.virtual_edge(edge) {
            (ve.base_node, ve.adj_node)
        } else {
            self.base.edge_endpoints(edge)
        }
    }

    fn create_edge_explorer<'e>(&'e self, filter: Option<Box<dyn EdgeFilter + 'e>>) -> Box<dyn EdgeExplorer + 'e> {
        Box::new(QueryEdgeExplorer { graph: self, filter, current: Vec::new(), cursor: None })
    }
}

/// A read-only view of just the underlying base graph, sharing the owning
/// [`QueryGraph`]'s [`GraphModification`] so unfavored-edge state is consistent.
pub struct BaseGraphView<'g> {
    base: &'g dyn BaseGraph,
    #[allow(dead_code)]
    modification: Rc<GraphModification>,
}

impl<'g> BaseGraph for BaseGraphView<'g> {
    fn node_count(&self) -> u32 {
        self.base.node_count()
    }
    fn edge_count(&self) -> u32 {
        self.base.edge_count()
    }
    fn bounds(&self) -> graphsplice_core::BBox {
        self.base.bounds()
    }
    fn node_lat_lon(&self, node: NodeId) -> (f64, f64) {
        self.base.node_lat_lon(node)
    }
    fn edge_iterator_state(&self, edge: EdgeId, adj_node: NodeId) -> Option<EdgeIteratorState> {
        self.base.edge_iterator_state(edge, adj_node)
    }
    fn edge_endpoints(&self, edge: EdgeId) -> (NodeId, NodeId) {
        self.base.edge_endpoints(edge)
    }
    fn create_edge_explorer<'e>(&'e self, filter: Option<Box<dyn EdgeFilter + 'e>>) -> Box<dyn EdgeExplorer + 'e> {
        self.base.create_edge_explorer(filter)
    }
}

struct QueryEdgeExplorer<'g, 'q> {
    graph: &'q QueryGraph<'g>,
    filter: Option<Box<dyn EdgeFilter + 'q>>,
    current: Vec<EdgeIteratorState>,
    cursor: Option<usize>,
}

impl<'g, 'q> EdgeExplorer for QueryEdgeExplorer<'g, 'q> {
    fn set_base_node(&mut self, node: NodeId) -> &mut dyn EdgeIterator {
        let filter: &dyn EdgeFilter = self.filter.as_deref().unwrap_or(&AcceptAll);
        self.current = self
            .graph
            .edges_from(node)
            .into_iter()
            .filter_map(|edge| self.graph.state_oriented_from(node, edge))
            .filter(|state| filter.accept(state))
            .collect();
        self.cursor = None;
        self
    }
}

impl<'g, 'q> EdgeIterator for QueryEdgeExplorer<'g, 'q> {
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

    fn flags(&self) -> graphsplice_core::EdgeFlags {
        self.current[self.cursor.expect("next() must be called before flags()")].flags
    }

    fn fetch_way_geometry(&self, mode: WayGeometryMode) -> geo::LineString<f64> {
        let state = &self.current[self.cursor.expect("next() must be called before fetch_way_geometry()")];
        let (base_lat, base_lon) = self.graph.node_lat_lon(state.base_node);
        let (adj_lat, adj_lon) = self.graph.node_lat_lon(state.adj_node);
        state.way_geometry(mode, geo::coord! { x: base_lon, y: base_lat }, geo::coord! { x: adj_lon, y: adj_lat })
    }

    fn detach(&self, reverse: bool) -> EdgeIteratorState {
        let state = self.current[self.cursor.expect("next() must be called before detach()")].clone();
        if reverse {
            self.graph.reverse_state(&state)
        } else {
            state
        }
    }
}

fn wrap_to_pi(angle: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let mut a = angle % two_pi;
    if a > std::f64::consts::PI {
        a -= two_pi;
    } else if a < -std::f64::consts::PI {
        a += two_pi;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modification::GraphModificationBuilder;
    use crate::query_result::{QueryResult, SnappedPosition};
    use graphsplice_core::fixtures::InMemoryBaseGraph;
    use graphsplice_core::{Access, EdgeFlags};
    use geo::LineString;

    struct NoTurnCosts;
    impl TurnCostSource for NoTurnCosts {
        fn turn_cost(&self, _from_edge: EdgeId, _via_node: NodeId, _to_edge: EdgeId) -> f64 {
            0.0
        }
    }

    fn straight_edge_graph() -> InMemoryBaseGraph {
        InMemoryBaseGraph::new(
            vec![(0.0, 0.0), (0.0, 1.0)],
            vec![(NodeId(0), NodeId(1), LineString::from(vec![]), EdgeFlags::all([Access::Car]))],
        )
    }

    fn triangle_graph() -> InMemoryBaseGraph {
        InMemoryBaseGraph::new(
            vec![(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)],
            vec![
                (NodeId(0), NodeId(1), LineString::from(vec![]), EdgeFlags::all([Access::Car])),
                (NodeId(1), NodeId(2), LineString::from(vec![]), EdgeFlags::all([Access::Car])),
                (NodeId(0), NodeId(2), LineString::from(vec![]), EdgeFlags::all([Access::Car])),
            ],
        )
    }

    fn snap(edge: u32, lat: f64, lon: f64) -> QueryResult {
        QueryResult { closest_edge: EdgeId(edge), snapped_point: (lat, lon), way_index: 0, snapped_position: SnappedPosition::Edge }
    }

    // S1: a single snap produces one virtual node reachable both ways along its edge.
    #[test]
    fn single_snap_explorer_reaches_both_real_endpoints() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        assert!(qg.is_virtual_node(NodeId(2)));
        assert_eq!(qg.node_count(), 3);
        assert_eq!(qg.edge_count(), 8);

        let mut explorer = qg.create_edge_explorer(None);
        let iter = explorer.set_base_node(NodeId(2));
        let mut seen = Vec::new();
        while iter.next() {
            seen.push(iter.adj_node());
        }
        seen.sort();
        assert_eq!(seen, vec![NodeId(0), NodeId(1)]);
    }

    // S2: the real endpoint's own explorer sees the virtual node, not the hidden base edge.
    #[test]
    fn real_node_explorer_sees_virtual_node_not_hidden_base_edge() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        let mut explorer = qg.create_edge_explorer(None);
        let iter = explorer.set_base_node(NodeId(0));
        let mut seen = Vec::new();
        while iter.next() {
            seen.push(iter.adj_node());
        }
        assert_eq!(seen, vec![NodeId(2)]);
    }

    // S3: two snaps on one edge chain through each other; neither real endpoint sees
    // the other virtual node directly.
    #[test]
    fn chained_snaps_do_not_leak_into_real_node_explorers() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.25), snap(0, 0.0, 0.75)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        let mut explorer = qg.create_edge_explorer(None);
        let iter = explorer.set_base_node(NodeId(0));
        let mut seen = Vec::new();
        while iter.next() {
            seen.push(iter.adj_node());
        }
        assert_eq!(seen, vec![NodeId(2)]);

        let iter = explorer.set_base_node(NodeId(1));
        let mut seen = Vec::new();
        while iter.next() {
            seen.push(iter.adj_node());
        }
        assert_eq!(seen, vec![NodeId(3)]);
    }

    // S4: a node untouched by any snap is unaffected by the overlay.
    #[test]
    fn untouched_node_explorer_is_unaffected() {
        let graph = triangle_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        let mut explorer = qg.create_edge_explorer(None);
        let iter = explorer.set_base_node(NodeId(2));
        let mut seen = Vec::new();
        while iter.next() {
            seen.push(iter.edge());
        }
        seen.sort();
        assert_eq!(seen, vec![EdgeId(1), EdgeId(2)]);
    }

    // Invariant: reverse_pos pairs a virtual edge's directed views.
    #[test]
    fn virtual_edge_reverse_pos_round_trips() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        let forward = qg.get_edge_iterator_state(EdgeId(6), NodeId(1)).unwrap();
        let backward = qg.get_edge_iterator_state(forward.edge.reverse_pos(), NodeId(2)).unwrap();
        assert_eq!(backward.base_node, NodeId(1));
        assert_eq!(backward.adj_node, NodeId(2));
    }

    // Invariant: unfavoring a virtual edge unfavors both directions, and clearing resets it.
    #[test]
    fn unfavor_and_clear_round_trip() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        qg.unfavor_virtual_edge_pair(NodeId(2), EdgeId(6)).unwrap();
        assert!(qg.is_unfavored(EdgeId(6)));
        assert!(qg.is_unfavored(EdgeId(7)));
        assert!(!qg.is_unfavored(EdgeId(4)));

        qg.clear_unfavored_status();
        assert!(!qg.is_unfavored(EdgeId(6)));
    }

    // Invariant: unfavor_virtual_edge_pair rejects a non-virtual node.
    #[test]
    fn unfavor_virtual_edge_pair_rejects_real_node() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));
        assert_eq!(qg.unfavor_virtual_edge_pair(NodeId(0), EdgeId(6)), Err(QueryGraphError::InvalidArgument(NodeId(0))));
    }

    // Invariant: a departure (incoming=false) heading toward the adj (eastbound) side
    // unfavors the opposing base side and reports that a pair was marked.
    #[test]
    fn enforce_heading_toward_adj_side_unfavors_base_rev_only() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        // The edge runs due east (increasing lon); heading 90 = east matches VE_ADJ.
        assert!(qg.enforce_heading(NodeId(2), 90.0, false).unwrap());
        assert!(qg.is_unfavored(EdgeId(5)));
        assert!(!qg.is_unfavored(EdgeId(6)));
    }

    // Invariant: a departure heading toward the base (westbound) side unfavors the
    // opposing adj side instead.
    #[test]
    fn enforce_heading_toward_base_side_unfavors_adj_only() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        // Heading 270 = west matches VE_BASE_REV and opposes VE_ADJ.
        assert!(qg.enforce_heading(NodeId(2), 270.0, false).unwrap());
        assert!(!qg.is_unfavored(EdgeId(5)));
        assert!(qg.is_unfavored(EdgeId(6)));
    }

    // Invariant: an arrival (incoming=true) heading penalizes {VE_BASE, VE_ADJ_REV}
    // instead of {VE_BASE_REV, VE_ADJ} — the opposite side from a departure heading.
    #[test]
    fn enforce_heading_incoming_penalizes_the_opposite_side() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        // Heading 90 (east) matches VE_BASE's own bearing but opposes VE_ADJ_REV's.
        assert!(qg.enforce_heading(NodeId(2), 90.0, true).unwrap());
        assert!(!qg.is_unfavored(EdgeId(4)));
        assert!(qg.is_unfavored(EdgeId(7)));
    }

    // Invariant: a NaN heading is a no-op that still validates the node.
    #[test]
    fn enforce_heading_nan_is_a_no_op() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));

        assert_eq!(qg.enforce_heading(NodeId(2), f64::NAN, false), Ok(false));
        assert!(!qg.is_unfavored(EdgeId(5)));
        assert!(!qg.is_unfavored(EdgeId(6)));
    }

    // Invariant: enforce_heading on a non-virtual node is rejected.
    #[test]
    fn enforce_heading_rejects_real_node() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));
        assert_eq!(qg.enforce_heading(NodeId(0), 0.0, false), Err(QueryGraphError::InvalidArgument(NodeId(0))));
    }

    // Invariant: turn cost through a virtual via_node is always zero.
    #[test]
    fn turn_cost_through_virtual_node_is_zero() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));
        let cost = qg.get_extension_turn_cost(&NoTurnCosts, EdgeId(5), NodeId(2), EdgeId(6));
        assert_eq!(cost, 0.0);
    }

    // Mutation is unsupported on the overlay.
    #[test]
    fn mutation_is_not_supported() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));
        assert_eq!(qg.edge(NodeId(0), NodeId(1)), Err(QueryGraphError::NotSupported));
    }

    #[test]
    fn base_graph_view_is_unaffected_by_splice() {
        let graph = straight_edge_graph();
        let modification = GraphModificationBuilder::build(&graph, &[snap(0, 0.0, 0.5)]).unwrap();
        let qg = QueryGraph::new(&graph, Rc::new(modification));
        let view = qg.base_graph_view();
        assert_eq!(view.node_count(), 2);
        assert_eq!(view.edge_count(), 1);
    }
}
