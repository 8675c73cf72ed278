use graphsplice_core::EdgeId;

/// Where a GPS fix landed relative to its closest base edge.
///
/// A `Tower` snap introduces no virtual node: the routing algorithm starts directly
/// at the cited base node. `Pillar` and `Edge` snaps both fall strictly inside the
/// edge and are spliced in identically by [`crate::GraphModificationBuilder`]; the
/// distinction exists only to describe where along the geometry the fix landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnappedPosition {
    /// The fix snapped onto (or within tolerance of) a tower node.
    Tower,
    /// The fix snapped onto a pillar point of the edge's geometry.
    Pillar,
    /// The fix snapped onto the interior of a segment, between two pillars.
    Edge,
}

/// One GPS fix snapped onto the base graph, as produced by a spatial-hash nearest
/// search. The unit of input to [`crate::GraphModificationBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The base edge this fix snapped to.
    pub closest_edge: EdgeId,
    /// `(lat, lon)` of the projected point on `closest_edge`.
    pub snapped_point: (f64, f64),
    /// Index into `closest_edge`'s pillar geometry identifying the segment the snap
    /// lies on, counting from the base-node endpoint.
    pub way_index: usize,
    pub snapped_position: SnappedPosition,
}
