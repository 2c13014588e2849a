use crate::NodeId;

use ahash::{HashSet, HashSetExt};

/// The set of nodes heard recently above the link-quality threshold.
///
/// Membership is deliberately short-lived: the engine clears the whole set
/// immediately before each outgoing HELLO, so a neighbor that went out of
/// range disappears within one HELLO period. The price is a brief window
/// after each beacon in which the set is under-populated.
///
/// # Test
///
/// ```
/// use mesh_node_engine::neighbors::NeighborTable;
///
/// let mut neighbors = NeighborTable::default();
///
/// assert!(neighbors.admit("B"));
/// assert!(!neighbors.admit("B"));
/// assert!(neighbors.contains("B"));
/// assert_eq!(neighbors.len(), 1);
///
/// neighbors.clear();
///
/// assert!(neighbors.is_empty());
/// assert!(!neighbors.contains("B"));
/// ```
pub struct NeighborTable(HashSet<NodeId>);

impl Default for NeighborTable {
    fn default() -> Self {
        Self(HashSet::with_capacity(16))
    }
}

impl NeighborTable {
    /// Adds a neighbor, returning whether it was newly discovered.
    pub fn admit(&mut self, id: &str) -> bool {
        if self.0.contains(id) {
            return false;
        }

        self.0.insert(NodeId::from(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter()
    }
}
