use std::fmt;

/// A "don't care" adjacent-node sentinel accepted by [`crate::BaseGraph::edge_iterator_state`].
///
/// Matches any edge direction rather than requiring a specific endpoint.
pub const ANY_NODE: NodeId = NodeId(u32::MAX);

/// Identifies a node in either the base graph or the query graph overlay.
///
/// Base-graph node ids occupy `[0, N_nodes)`; ids `>= N_nodes` identify virtual nodes
/// introduced by a graph splice (see the `graphsplice-query` crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_any(self) -> bool {
        self.0 == ANY_NODE.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Identifies a directed edge in either the base graph or the query graph overlay.
///
/// Base-graph edge ids occupy `[0, N_edges)`; ids `>= N_edges` identify virtual edges.
/// Virtual edge ids always come in adjacent reversed pairs: `reverse_pos(e) = e ^ 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(pub u32);

impl EdgeId {
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The paired edge id in the opposite direction.
    ///
    /// Only meaningful for virtual edges; base-graph edges track their own reverse
    /// relationship however the base graph chooses to (often a single undirected
    /// storage slot traversed in both directions).
    #[must_use]
    pub const fn reverse_pos(self) -> Self {
        Self(self.0 ^ 1)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<u32> for EdgeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_pos_is_involution() {
        let e = EdgeId(42);
        assert_eq!(e.reverse_pos().reverse_pos(), e);
        assert_ne!(e.reverse_pos(), e);
    }

    #[test]
    fn reverse_pos_pairs_even_odd() {
        assert_eq!(EdgeId(0).reverse_pos(), EdgeId(1));
        assert_eq!(EdgeId(1).reverse_pos(), EdgeId(0));
        assert_eq!(EdgeId(6).reverse_pos(), EdgeId(7));
    }
}
