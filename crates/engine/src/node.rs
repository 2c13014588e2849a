use crate::{
    NodeHandler, NodeId, Tunables,
    cache::SeenCaches,
    clock::Clock,
    neighbors::NeighborTable,
    radio::Radio,
    routes::RouteTable,
    stats::Counters,
    transaction::{Completed, Transaction},
};

use bytes::BytesMut;
use codec::frame::{Frame, Route, Routing};

pub struct NodeOptions<R, C, H> {
    pub id: NodeId,
    pub tunables: Tunables,
    pub radio: R,
    pub clock: C,
    pub handler: H,
}

/// One DSR mesh node.
///
/// The node is a single-threaded state machine with three entry points
/// ([`Node::on_frame`], [`Node::on_tick`], [`Node::request_data`]), each of
/// which runs to completion without blocking. Its one output is frames
/// handed to the injected radio. Nothing it receives is fatal: malformed,
/// duplicate, gated, and orphaned frames are dropped into counters and the
/// node stays consistent.
///
/// # Test
///
/// ```
/// use mesh_node_engine::clock::Clock;
/// use mesh_node_engine::node::{Node, NodeOptions};
/// use mesh_node_engine::radio::{Packet, Radio, RadioError};
/// use mesh_node_engine::{NodeHandler, NodeId, Tunables};
///
/// #[derive(Default)]
/// struct QueueRadio(Vec<Vec<u8>>);
///
/// impl Radio for QueueRadio {
///     fn send(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
///         self.0.push(bytes.to_vec());
///         Ok(())
///     }
///
///     fn is_packet_ready(&mut self) -> bool {
///         false
///     }
///
///     fn take_packet(&mut self) -> Option<Packet> {
///         None
///     }
/// }
///
/// struct FrozenClock;
///
/// impl Clock for FrozenClock {
///     fn now(&self) -> u64 {
///         0
///     }
///
///     fn wall(&self) -> u64 {
///         1700000000
///     }
/// }
///
/// struct Handler;
///
/// impl NodeHandler for Handler {
///     fn response_payload(&self, _: &NodeId, _: u64) -> String {
///         "23.5,60.1".to_string()
///     }
/// }
///
/// let mut node = Node::new(NodeOptions {
///     id: NodeId::from("A"),
///     tunables: Tunables::default(),
///     radio: QueueRadio::default(),
///     clock: FrozenClock,
///     handler: Handler,
/// });
///
/// // A neighbor above the threshold is admitted, and a beacon clears the
/// // table again before going out.
/// node.on_frame(b"HELLO:B", -60);
/// assert!(node.neighbors().contains("B"));
///
/// node.send_hello();
/// assert!(node.neighbors().is_empty());
///
/// // No route to C yet, so the request falls back to discovery and no
/// // transaction is armed.
/// node.request_data(&NodeId::from("C"));
/// assert!(node.in_flight().is_none());
/// assert_eq!(node.stats().sent_pkts, 2);
/// ```
pub struct Node<R, C, H> {
    id: NodeId,
    tunables: Tunables,
    radio: R,
    clock: C,
    handler: H,
    neighbors: NeighborTable,
    seen: SeenCaches,
    routes: RouteTable,
    transaction: Option<Transaction>,
    completed: Option<Completed>,
    counters: Counters,
    /// Current message stamp, refreshed from the wall clock each tick.
    stamp: u64,
    bytes: BytesMut,
}

impl<R, C, H> Node<R, C, H>
where
    R: Radio,
    C: Clock,
    H: NodeHandler,
{
    pub fn new(options: NodeOptions<R, C, H>) -> Self {
        let stamp = options.clock.wall();

        Self {
            id: options.id,
            tunables: options.tunables,
            radio: options.radio,
            clock: options.clock,
            handler: options.handler,
            neighbors: NeighborTable::default(),
            seen: SeenCaches::default(),
            routes: RouteTable::default(),
            transaction: None,
            completed: None,
            counters: Counters::default(),
            bytes: BytesMut::with_capacity(512),
            stamp,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn in_flight(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn stats(&self) -> Counters {
        self.counters
    }

    /// Emits one HELLO beacon.
    ///
    /// The neighbor set is cleared immediately before emission, so a
    /// neighbor that went out of range disappears within one HELLO period.
    pub fn send_hello(&mut self) {
        self.neighbors.clear();

        {
            Frame::Hello {
                source: self.id.as_str(),
            }
            .encode(&mut self.bytes);
        }

        self.transmit();
    }

    /// Starts a transaction toward `destination`, or a route discovery if
    /// no route is known yet.
    ///
    /// Without a route only the RREQ goes out and nothing is armed; the
    /// application re-issues the request once the route has appeared. With
    /// a route the DATA is emitted and the transaction armed; a request
    /// while another is still in flight silently replaces it.
    pub fn request_data(&mut self, destination: &NodeId) {
        let Some(hops) = self.routes.get(destination.as_str()) else {
            self.broadcast_rreq(destination);
            return;
        };

        let stamp = self.stamp;

        {
            let hops: Vec<&str> = hops.iter().map(NodeId::as_str).collect();

            Frame::Data(Routing {
                source: self.id.as_str(),
                destination: destination.as_str(),
                stamp,
                route: Route::new(hops),
            })
            .encode(&mut self.bytes);
        }

        self.seen
            .data
            .record(stamp, self.id.as_str(), destination.as_str());

        let now = self.clock.now();
        self.transaction = Some(Transaction {
            destination: destination.clone(),
            stamp,
            attempts: 1,
            retry_at: now + self.tunables.retry_interval,
            deadline: now + self.tunables.timeout,
        });

        self.transmit();
    }

    /// Drains the radio's receive queue through [`Node::on_frame`].
    pub fn poll(&mut self) {
        while self.radio.is_packet_ready() {
            let Some(packet) = self.radio.take_packet() else {
                break;
            };

            self.on_frame(&packet.payload, packet.rssi);
        }
    }

    /// Processes one received frame.
    pub fn on_frame(&mut self, bytes: &[u8], rssi: i32) {
        self.counters.received_pkts += 1;

        match Frame::parse(bytes) {
            Ok(Frame::Hello { source }) => self.on_hello(source, rssi),
            Ok(Frame::RouteRequest(routing)) => self.on_route_request(&routing),
            Ok(Frame::RouteReply(routing)) => self.on_route_reply(&routing, bytes),
            Ok(Frame::Data(routing)) => self.on_data(&routing, bytes),
            Ok(Frame::Response {
                routing, payload, ..
            }) => self.on_response(&routing, payload, bytes),
            Err(_) => self.counters.malformed += 1,
        }

        // The frame is processed before the deadline sweep, so a response
        // landing exactly at the hard deadline still completes.
        self.transaction_tick();
    }

    /// The maintenance tick: refresh the message stamp from the wall
    /// clock, age out seen-cache entries, drive the transaction deadlines.
    pub fn on_tick(&mut self) {
        self.stamp = self.clock.wall();
        self.seen.evict(self.stamp, self.tunables.cache_ttl);
        self.transaction_tick();
    }

    /// Hands over the most recently completed transaction, if any.
    pub fn take_completed(&mut self) -> Option<Completed> {
        self.completed.take()
    }

    fn on_hello(&mut self, source: &str, rssi: i32) {
        if source == self.id.as_str() || rssi <= self.tunables.qos_threshold {
            return;
        }

        if self.neighbors.admit(source) {
            self.handler.on_neighbor(&NodeId::from(source));
        }
    }

    fn on_route_request(&mut self, routing: &Routing<'_>) {
        if self
            .seen
            .rreq
            .contains(routing.stamp, routing.source, routing.destination)
        {
            return;
        }

        // A request that already loops through this node is never
        // extended; the seen-cache is not the only guard against loops.
        if routing.route.contains(self.id.as_str()) {
            self.counters.gated += 1;
            return;
        }

        // Every recorded hop must actually have heard its predecessor
        // above the link-quality threshold. With an empty route the sender
        // can only be the originator itself; otherwise the frame came from
        // the last appended hop.
        let last_hop = routing.route.last().unwrap_or(routing.source);
        if !self.neighbors.contains(last_hop) {
            self.counters.gated += 1;
            return;
        }

        self.seen
            .rreq
            .record(routing.stamp, routing.source, routing.destination);

        if routing.destination == self.id.as_str() {
            // This node is the destination: answer with the accumulated
            // route reversed, the path the reply must walk back.
            self.seen
                .rrep
                .record(routing.stamp, self.id.as_str(), routing.source);

            {
                Frame::RouteReply(Routing {
                    source: self.id.as_str(),
                    destination: routing.source,
                    stamp: routing.stamp,
                    route: routing.route.reversed(),
                })
                .encode(&mut self.bytes);
            }

            self.transmit();
        } else {
            {
                let mut hops = routing.route.hops().to_vec();
                hops.push(self.id.as_str());

                Frame::RouteRequest(Routing {
                    source: routing.source,
                    destination: routing.destination,
                    stamp: routing.stamp,
                    route: Route::new(hops),
                })
                .encode(&mut self.bytes);
            }

            self.transmit();
        }
    }

    fn on_route_reply(&mut self, routing: &Routing<'_>, raw: &[u8]) {
        if routing.destination == self.id.as_str() {
            // The first accepted reply wins; later ones for the same
            // request fall to the cache.
            if self
                .seen
                .rrep
                .contains(routing.stamp, routing.source, routing.destination)
            {
                return;
            }

            self.seen
                .rrep
                .record(routing.stamp, routing.source, routing.destination);

            // The route in the reply is written from the responder's
            // viewpoint; reversed, it is this node's path toward it.
            let source = NodeId::from(routing.source);
            let hops: Vec<NodeId> = routing
                .route
                .hops()
                .iter()
                .rev()
                .map(|hop| NodeId::from(*hop))
                .collect();

            self.handler.on_route_installed(&source, &hops);
            self.routes.install(source, hops);
        } else if routing.route.contains(self.id.as_str()) {
            if self
                .seen
                .rrep
                .contains(routing.stamp, routing.source, routing.destination)
            {
                return;
            }

            // The embedded route is the single source of truth for
            // forwarding; the frame travels on unchanged.
            self.seen
                .rrep
                .record(routing.stamp, routing.source, routing.destination);
            self.transmit_raw(raw);
        } else {
            self.counters.gated += 1;
        }
    }

    fn on_data(&mut self, routing: &Routing<'_>, raw: &[u8]) {
        if routing.destination == self.id.as_str() {
            if self
                .seen
                .data
                .contains(routing.stamp, routing.source, routing.destination)
            {
                return;
            }

            self.seen
                .data
                .record(routing.stamp, routing.source, routing.destination);

            // The requester's route is always refreshed from the incoming
            // frame, never trusted from prior state.
            let source = NodeId::from(routing.source);
            let hops: Vec<NodeId> = routing
                .route
                .hops()
                .iter()
                .rev()
                .map(|hop| NodeId::from(*hop))
                .collect();

            self.handler.on_route_installed(&source, &hops);
            self.routes.install(source.clone(), hops);

            let payload = self.handler.response_payload(&source, routing.stamp);

            {
                Frame::Response {
                    routing: Routing {
                        source: self.id.as_str(),
                        destination: routing.source,
                        stamp: routing.stamp,
                        route: routing.route.reversed(),
                    },
                    payload: &payload,
                    check: 0,
                }
                .encode(&mut self.bytes);
            }

            self.transmit();
        } else if routing.route.contains(self.id.as_str())
            && !self
                .seen
                .data
                .contains(routing.stamp, routing.source, routing.destination)
        {
            self.seen
                .data
                .record(routing.stamp, routing.source, routing.destination);
            self.transmit_raw(raw);
        }
    }

    fn on_response(&mut self, routing: &Routing<'_>, payload: &str, raw: &[u8]) {
        if routing.destination != self.id.as_str() {
            // Relays forward along the embedded route without touching the
            // check; verification happens once, at the destination.
            if routing.route.contains(self.id.as_str())
                && !self
                    .seen
                    .resp
                    .contains(routing.stamp, routing.source, routing.destination)
            {
                self.seen
                    .resp
                    .record(routing.stamp, routing.source, routing.destination);
                self.transmit_raw(raw);
            }

            return;
        }

        if !codec::verify(raw) {
            self.counters.check_failed += 1;
            return;
        }

        let matched = self
            .transaction
            .as_ref()
            .map(|transaction| transaction.stamp == routing.stamp)
            .unwrap_or(false);

        if !matched {
            self.counters.orphan_resp += 1;
            return;
        }

        if self
            .seen
            .resp
            .contains(routing.stamp, routing.source, routing.destination)
        {
            return;
        }

        self.seen
            .resp
            .record(routing.stamp, routing.source, routing.destination);

        let source = NodeId::from(routing.source);
        self.handler.on_completed(&source, routing.stamp, payload);
        self.completed = Some(Completed {
            source,
            stamp: routing.stamp,
            payload: payload.to_string(),
        });
        self.transaction = None;
    }

    fn broadcast_rreq(&mut self, destination: &NodeId) {
        let stamp = self.stamp;

        {
            Frame::RouteRequest(Routing {
                source: self.id.as_str(),
                destination: destination.as_str(),
                stamp,
                route: Route::default(),
            })
            .encode(&mut self.bytes);
        }

        self.seen
            .rreq
            .record(stamp, self.id.as_str(), destination.as_str());
        self.transmit();
    }

    /// Advances the in-flight transaction against the monotonic clock.
    /// Deadline comparisons are inclusive: a deadline fires at the second
    /// it names.
    fn transaction_tick(&mut self) {
        let Some(transaction) = self.transaction.as_ref() else {
            return;
        };

        let now = self.clock.now();

        if now >= transaction.deadline {
            let destination = transaction.destination.clone();

            self.transaction = None;
            self.routes.remove(destination.as_str());
            self.counters.timeouts += 1;
            self.handler.on_route_dead(&destination);
            return;
        }

        if now < transaction.retry_at || transaction.attempts >= self.tunables.max_attempts {
            return;
        }

        let destination = transaction.destination.clone();
        let previous = transaction.stamp;
        // A fresh stamp, so the relay caches along the way do not swallow
        // the retransmission as a duplicate.
        let stamp = self.stamp;

        let Some(hops) = self.routes.get(destination.as_str()) else {
            return;
        };

        {
            let hops: Vec<&str> = hops.iter().map(NodeId::as_str).collect();

            Frame::Data(Routing {
                source: self.id.as_str(),
                destination: destination.as_str(),
                stamp,
                route: Route::new(hops),
            })
            .encode(&mut self.bytes);
        }

        self.seen
            .data
            .restamp(previous, self.id.as_str(), destination.as_str(), stamp);

        if let Some(transaction) = self.transaction.as_mut() {
            transaction.stamp = stamp;
            transaction.attempts += 1;
            transaction.retry_at = now + self.tunables.retry_interval;
        }

        self.transmit();
    }

    fn transmit(&mut self) {
        match self.radio.send(&self.bytes) {
            Ok(()) => self.counters.sent_pkts += 1,
            Err(_) => self.counters.radio_errors += 1,
        }
    }

    fn transmit_raw(&mut self, bytes: &[u8]) {
        match self.radio.send(bytes) {
            Ok(()) => self.counters.sent_pkts += 1,
            Err(_) => self.counters.radio_errors += 1,
        }
    }
}
