use crate::NodeId;

use ahash::{HashMap, HashMapExt};

/// Discovered source routes, keyed by destination.
///
/// A stored route lists the intermediate hops only, never the local node
/// and never the destination. An empty hop list is a valid route to a
/// direct neighbor.
///
/// # Test
///
/// ```
/// use mesh_node_engine::NodeId;
/// use mesh_node_engine::routes::RouteTable;
///
/// let mut routes = RouteTable::default();
///
/// routes.install(NodeId::from("C"), vec![NodeId::from("B")]);
///
/// assert_eq!(routes.get("C"), Some(&[NodeId::from("B")][..]));
/// assert!(routes.get("D").is_none());
///
/// routes.remove("C");
/// assert!(routes.is_empty());
/// ```
pub struct RouteTable(HashMap<NodeId, Vec<NodeId>>);

impl Default for RouteTable {
    fn default() -> Self {
        Self(HashMap::with_capacity(16))
    }
}

impl RouteTable {
    pub fn get(&self, destination: &str) -> Option<&[NodeId]> {
        self.0.get(destination).map(Vec::as_slice)
    }

    /// Installs or refreshes the route toward a destination.
    pub fn install(&mut self, destination: NodeId, hops: Vec<NodeId>) {
        self.0.insert(destination, hops);
    }

    pub fn remove(&mut self, destination: &str) -> Option<Vec<NodeId>> {
        self.0.remove(destination)
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.0.contains_key(destination)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &[NodeId])> {
        self.0.iter().map(|(key, hops)| (key, hops.as_slice()))
    }
}
