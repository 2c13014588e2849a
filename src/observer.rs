use std::{sync::Arc, time::Instant};

use engine::{NodeHandler, NodeId};

use crate::config::Config;

/// The application sitting on top of the engine: logs every protocol
/// event and supplies the response payload for inbound data requests.
pub struct Observer {
    config: Arc<Config>,
    started: Instant,
}

impl Observer {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            started: Instant::now(),
        }
    }
}

impl NodeHandler for Observer {
    /// The sensor layer is external; until one is wired in, answer with
    /// the node's identity and uptime so a poll round trip is observable
    /// end to end.
    fn response_payload(&self, requester: &NodeId, stamp: u64) -> String {
        log::info!("answering data request: requester={requester}, stamp={stamp}");

        format!(
            "node={},up={}",
            self.config.node.id,
            self.started.elapsed().as_secs()
        )
    }

    fn on_neighbor(&self, id: &NodeId) {
        log::info!("neighbor discovered: id={id}");
    }

    fn on_route_installed(&self, destination: &NodeId, hops: &[NodeId]) {
        log::info!("route installed: destination={destination}, hops={hops:?}");
    }

    /// One line per eviction; the poll schedule will rediscover the route
    /// on its next visit.
    fn on_route_dead(&self, destination: &NodeId) {
        log::warn!("route dead: destination={destination}, no response before the deadline");
    }

    fn on_completed(&self, source: &NodeId, stamp: u64, payload: &str) {
        log::info!("transaction completed: source={source}, stamp={stamp}, payload={payload:?}");
    }
}
