//! Builds the set of virtual nodes/edges and per-real-node deltas that splice a batch
//! of [`QueryResult`]s into a base graph, once per routing request.

use crate::error::GraphModificationError;
use crate::query_result::{QueryResult, SnappedPosition};
use crate::virtual_graph::{VirtualEdge, VirtualEdgeSlot, VirtualNode};
use geo::{Coord, LineString};
use graphsplice_core::geometry::{closest_point_on_line, reversed, split_at};
use graphsplice_core::{BaseGraph, EdgeId, NodeId, ANY_NODE};
use std::collections::HashMap;

/// The per-real-tower-node adjustments a [`GraphModification`] makes: edges to add,
/// edges to hide, when a caller iterates from that node.
#[derive(Debug, Clone, Default)]
pub struct NodeEdgeChanges {
    pub additional_edges: Vec<EdgeId>,
    pub removed_edges: Vec<EdgeId>,
}

/// The outcome of splicing a batch of [`QueryResult`]s into a base graph: virtual
/// nodes and edges, plus the deltas real tower nodes need to apply.
///
/// Built once per routing request by [`GraphModificationBuilder::build`]; owned
/// jointly (via `Rc`) by a [`crate::QueryGraph`] and its base-graph view.
#[derive(Debug)]
pub struct GraphModification {
    main_nodes: u32,
    main_edges: u32,
    virtual_nodes: Vec<VirtualNode>,
    virtual_edges: Vec<VirtualEdge>,
    edge_changes_at_real_nodes: HashMap<NodeId, NodeEdgeChanges>,
}

impl GraphModification {
    #[must_use]
    pub fn virtual_node_count(&self) -> u32 {
        u32::try_from(self.virtual_nodes.len()).expect("virtual node count fits u32")
    }

    #[must_use]
    pub fn virtual_edge_count(&self) -> u32 {
        u32::try_from(self.virtual_edges.len()).expect("virtual edge count fits u32")
    }

    #[must_use]
    pub fn virtual_node(&self, node: NodeId) -> Option<&VirtualNode> {
        let k = node.value().checked_sub(self.main_nodes)?;
        self.virtual_nodes.get(k as usize)
    }

    /// The virtual edge at slot `s` of virtual node `k`'s block (`main_edges + 4k + s`).
    #[must_use]
    pub fn virtual_edge(&self, edge: EdgeId) -> Option<&VirtualEdge> {
        let v = edge.value().checked_sub(self.main_edges)?;
        self.virtual_edges.get(v as usize)
    }

    #[must_use]
    pub fn virtual_edge_id(&self, k: usize, slot: VirtualEdgeSlot) -> EdgeId {
        EdgeId(self.main_edges + 4 * u32::try_from(k).expect("k fits u32") + u32::from(u8::from(slot)))
    }

    #[must_use]
    pub fn node_changes(&self, node: NodeId) -> Option<&NodeEdgeChanges> {
        self.edge_changes_at_real_nodes.get(&node)
    }

    #[must_use]
    pub fn is_real_node_modified(&self, node: NodeId) -> bool {
        self.edge_changes_at_real_nodes.contains_key(&node)
    }

    pub(crate) fn virtual_edges(&self) -> &[VirtualEdge] {
        &self.virtual_edges
    }

    pub(crate) fn virtual_nodes(&self) -> &[VirtualNode] {
        &self.virtual_nodes
    }
}

/// One point along an edge's chain of snaps: either the edge's own tower endpoint, or
/// one of its snaps, carrying enough state to slice geometry between neighbors.
struct ChainPoint {
    node: NodeId,
    seg_idx: usize,
    coord: Coord<f64>,
    dist_along: f64,
}

struct PendingSnap {
    edge: EdgeId,
    base_node: NodeId,
    adj_node: NodeId,
    full_line: LineString<f64>,
    seg_idx: usize,
    coord: Coord<f64>,
    dist_along: f64,
    total_distance: f64,
    flags: graphsplice_core::EdgeFlags,
}

/// Builds a [`GraphModification`] from a base graph and a batch of snap results.
pub struct GraphModificationBuilder;

impl GraphModificationBuilder {
    /// # Errors
    ///
    /// Returns [`GraphModificationError::UnknownEdge`] if a result cites an edge the
    /// base graph doesn't recognize.
    pub fn build(base: &dyn BaseGraph, results: &[QueryResult]) -> Result<GraphModification, GraphModificationError> {
        let main_nodes = base.node_count();
        let main_edges = base.edge_count();

        let mut snaps: Vec<PendingSnap> = Vec::new();
        let mut by_edge: HashMap<EdgeId, Vec<usize>> = HashMap::new();

        for result in results {
            if result.snapped_position == SnappedPosition::Tower {
                continue;
            }

            let state = base
                .edge_iterator_state(result.closest_edge, ANY_NODE)
                .ok_or(GraphModificationError::UnknownEdge(result.closest_edge))?;
            let (base_node, adj_node) = (state.base_node, state.adj_node);
            let (base_lat, base_lon) = base.node_lat_lon(base_node);
            let (adj_lat, adj_lon) = base.node_lat_lon(adj_node);

            let mut coords = vec![geo::coord! { x: base_lon, y: base_lat }];
            coords.extend_from_slice(&state.pillars.0);
            coords.push(geo::coord! { x: adj_lon, y: adj_lat });
            let full_line = LineString::new(coords);

            let snap_point = geo::coord! { x: result.snapped_point.1, y: result.snapped_point.0 };
            let (seg_idx, coord, dist_along) = closest_point_on_line(&full_line, snap_point);

            by_edge.entry(result.closest_edge).or_default().push(snaps.len());
            snaps.push(PendingSnap {
                edge: result.closest_edge,
                base_node,
                adj_node,
                total_distance: state.distance,
                flags: state.flags,
                full_line,
                seg_idx,
                coord,
                dist_along,
            });
        }

        let mut virtual_nodes = Vec::with_capacity(snaps.len());
        for snap in &snaps {
            virtual_nodes.push(VirtualNode {
                lat: snap.coord.y,
                lon: snap.coord.x,
                closest_edge: snap.edge,
            });
        }
        let mut virtual_edges: Vec<VirtualEdge> = (0..snaps.len() * 4)
            .map(|_| VirtualEdge::new(VirtualEdgeSlot::Base, NodeId(0), NodeId(0), 0.0, graphsplice_core::EdgeFlags::default(), LineString::new(vec![])))
            .collect();
        let mut edge_changes: HashMap<NodeId, NodeEdgeChanges> = HashMap::new();

        for indices in by_edge.values_mut() {
            // Stable sort: ties (equal distance-along) keep their original input order.
            indices.sort_by(|&a, &b| snaps[a].dist_along.partial_cmp(&snaps[b].dist_along).expect("distances are finite"));

            let first = &snaps[indices[0]];
            let last = &snaps[*indices.last().expect("non-empty group")];

            let mut chain = Vec::with_capacity(indices.len() + 2);
            chain.push(ChainPoint { node: first.base_node, seg_idx: 0, coord: first.full_line.0[0], dist_along: 0.0 });
            for &i in indices.iter() {
                let snap = &snaps[i];
                chain.push(ChainPoint {
                    node: NodeId(main_nodes + u32::try_from(i).expect("snap index fits u32")),
                    seg_idx: snap.seg_idx,
                    coord: snap.coord,
                    dist_along: snap.dist_along,
                });
            }
            let last_coord = *last.full_line.0.last().expect("line has an endpoint");
            chain.push(ChainPoint {
                node: last.adj_node,
                seg_idx: last.full_line.0.len() - 2,
                coord: last_coord,
                dist_along: last.total_distance,
            });

            for (pos, &snap_index) in indices.iter().enumerate() {
                let prev = &chain[pos];
                let here = &chain[pos + 1];
                let next = &chain[pos + 2];
                let snap = &snaps[snap_index];
                let k = snap_index;
                let vn_id = here.node;

                let base_geom = slice_between(&snap.full_line, prev, here);
                let adj_geom = slice_between(&snap.full_line, here, next);

                let base_id = EdgeId(main_edges + 4 * u32::try_from(k).expect("fits u32"));
                let base_rev_id = base_id.reverse_pos();
                let adj_id = EdgeId(base_id.value() + 2);
                let adj_rev_id = adj_id.reverse_pos();

                virtual_edges[4 * k] = VirtualEdge::new(VirtualEdgeSlot::Base, prev.node, vn_id, here.dist_along - prev.dist_along, snap.flags, base_geom.clone());
                virtual_edges[4 * k + 1] = VirtualEdge::new(VirtualEdgeSlot::BaseRev, vn_id, prev.node, here.dist_along - prev.dist_along, snap.flags, reversed(&base_geom));
                virtual_edges[4 * k + 2] = VirtualEdge::new(VirtualEdgeSlot::Adj, vn_id, next.node, next.dist_along - here.dist_along, snap.flags, adj_geom.clone());
                virtual_edges[4 * k + 3] = VirtualEdge::new(VirtualEdgeSlot::AdjRev, next.node, vn_id, next.dist_along - here.dist_along, snap.flags, reversed(&adj_geom));

                if pos == 0 {
                    let changes = edge_changes.entry(prev.node).or_default();
                    changes.additional_edges.push(base_id);
                    if !changes.removed_edges.contains(&snap.edge) {
                        changes.removed_edges.push(snap.edge);
                    }
                }
                if pos == indices.len() - 1 {
                    let changes = edge_changes.entry(next.node).or_default();
                    changes.additional_edges.push(adj_rev_id);
                    if !changes.removed_edges.contains(&snap.edge) {
                        changes.removed_edges.push(snap.edge);
                    }
                }
            }
        }

        tracing::debug!(
            virtual_nodes = virtual_nodes.len(),
            virtual_edges = virtual_edges.len(),
            modified_real_nodes = edge_changes.len(),
            "built graph modification"
        );

        Ok(GraphModification { main_nodes, main_edges, virtual_nodes, virtual_edges, edge_changes_at_real_nodes: edge_changes })
    }
}

/// The slice of `full_line` between two consecutive chain points, both endpoints
/// included in the slice, then stripped to just the interior pillars (matching
/// [`graphsplice_core::base_graph::EdgeIteratorState::pillars`]'s convention of
/// excluding both tower/virtual endpoints).
fn slice_between(full_line: &LineString<f64>, from: &ChainPoint, to: &ChainPoint) -> LineString<f64> {
    let (prefix_to_to, _) = split_at(full_line, to.seg_idx, to.coord);
    let (_, between) = split_at(&prefix_to_to, from.seg_idx, from.coord);
    LineString::new(between.0[1..between.0.len() - 1].to_vec())
}
