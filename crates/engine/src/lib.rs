//! ## Dynamic Source Routing node engine
//!
//! One [`node::Node`] is the whole protocol state of one mesh device: the
//! RSSI-gated neighbor table, the per-kind seen-message caches, the route
//! table, and the single in-flight request/response transaction. The engine
//! is driven by exactly three entry points (a received frame, the
//! once-per-second maintenance tick, and a local data request), each of
//! which runs to completion before the next is admitted, so the engine
//! itself never blocks and never needs a lock. Hosts that poll the radio
//! and fire the tick from different threads serialize the calls; the
//! shipped runtime drives everything from a single loop instead.
//!
//! The device capabilities the protocol depends on are injected:
//! [`radio::Radio`] for the half-duplex packet interface, [`clock::Clock`]
//! for deadline and stamp time, and [`NodeHandler`] for the application
//! above (sensor payloads in, completed transactions out).

pub mod cache;
pub mod clock;
pub mod neighbors;
pub mod node;
pub mod radio;
pub mod routes;
pub mod stats;
pub mod transaction;

use std::borrow::Borrow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A node identifier: a short opaque token, unique across the mesh.
///
/// Identifiers travel on the wire inside colon- and hyphen-delimited
/// fields, so they may contain neither delimiter; the codec enforces that
/// on receive and the operator is trusted on configure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Protocol timing and link-quality knobs. All periods are in seconds.
///
/// # Test
///
/// ```
/// use mesh_node_engine::Tunables;
///
/// let tunables = Tunables::default();
///
/// assert_eq!(tunables.max_attempts, 2);
/// assert_eq!(tunables.retry_interval, 30);
/// assert_eq!(tunables.timeout, 62);
/// assert_eq!(tunables.cache_ttl, 180);
/// assert_eq!(tunables.qos_threshold, -80);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case", default))]
pub struct Tunables {
    /// Total DATA transmissions allowed per transaction, the first
    /// included. Zero disables the transaction layer's retransmission
    /// entirely.
    pub max_attempts: u32,
    /// Seconds between retransmissions of an unanswered DATA.
    pub retry_interval: u64,
    /// Seconds after which an unanswered transaction declares its route
    /// dead.
    pub timeout: u64,
    /// Seconds a seen-cache entry survives before eviction.
    pub cache_ttl: u64,
    /// RSSI (dBm) a HELLO must exceed for its sender to count as a
    /// neighbor.
    pub qos_threshold: i32,
    /// Seconds between outgoing HELLO beacons.
    pub hello_period: u64,
    /// Seconds between maintenance ticks.
    pub tick_period: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_interval: 30,
            timeout: 62,
            cache_ttl: 180,
            qos_threshold: -80,
            hello_period: 10,
            tick_period: 1,
        }
    }
}

/// The application above the engine.
///
/// One method is required: the response payload for an inbound data
/// request, supplied by whatever sensor or application layer the host
/// wires in. The payload travels in a colon-delimited frame and therefore
/// must not contain `:`. Everything else is an observer with a no-op
/// default, in particular [`NodeHandler::on_completed`], which is the seam
/// a northbound gateway bridge consumes.
pub trait NodeHandler {
    /// Compose the payload answering a data request from `requester`.
    fn response_payload(&self, requester: &NodeId, stamp: u64) -> String;

    /// A HELLO above the link-quality threshold admitted a new neighbor.
    #[allow(unused_variables)]
    fn on_neighbor(&self, id: &NodeId) {}

    /// A source route toward `destination` was installed or refreshed,
    /// from an accepted RREP at the originator or from an inbound DATA at
    /// the responder.
    #[allow(unused_variables)]
    fn on_route_installed(&self, destination: &NodeId, hops: &[NodeId]) {}

    /// A transaction hit its hard deadline; the route was evicted and no
    /// response will be delivered.
    #[allow(unused_variables)]
    fn on_route_dead(&self, destination: &NodeId) {}

    /// A transaction completed; `payload` is also retrievable once via
    /// `take_completed`.
    #[allow(unused_variables)]
    fn on_completed(&self, source: &NodeId, stamp: u64, payload: &str) {}
}
