use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use anyhow::Result;
use mesh_node_engine::{
    NodeHandler, NodeId, Tunables,
    clock::Clock,
    node::{Node, NodeOptions},
    radio::{Packet, Radio, RadioError},
};

/// A manually advanced clock shared by every node in a test mesh. The
/// monotonic reading starts at zero; wall time runs on the same timeline
/// from a fixed epoch offset, so frame stamps are predictable.
#[derive(Clone, Default)]
struct TestClock(Rc<Cell<u64>>);

const EPOCH: u64 = 1_700_000_000;

impl TestClock {
    fn advance(&self, seconds: u64) {
        self.0.set(self.0.get() + seconds);
    }
}

impl Clock for TestClock {
    fn now(&self) -> u64 {
        self.0.get()
    }

    fn wall(&self) -> u64 {
        EPOCH + self.0.get()
    }
}

/// A loopback radio: sends land in a shared outbox the harness drains,
/// receives come from a queue the harness fills, like an interrupt handler
/// would.
#[derive(Clone, Default)]
struct AirRadio {
    outbox: Rc<RefCell<Vec<Vec<u8>>>>,
    inbox: Rc<RefCell<VecDeque<Packet>>>,
}

impl Radio for AirRadio {
    fn send(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
        self.outbox.borrow_mut().push(bytes.to_vec());
        Ok(())
    }

    fn is_packet_ready(&mut self) -> bool {
        !self.inbox.borrow().is_empty()
    }

    fn take_packet(&mut self) -> Option<Packet> {
        self.inbox.borrow_mut().pop_front()
    }
}

struct Sensor(&'static str);

impl NodeHandler for Sensor {
    fn response_payload(&self, _requester: &NodeId, _stamp: u64) -> String {
        self.0.to_string()
    }
}

const RSSI: i32 = -60;

/// A line topology: consecutive nodes are in radio range of each other and
/// nobody else, so the middle nodes are the only links.
struct Mesh {
    clock: TestClock,
    nodes: Vec<Node<AirRadio, TestClock, Sensor>>,
    outboxes: Vec<Rc<RefCell<Vec<Vec<u8>>>>>,
    inboxes: Vec<Rc<RefCell<VecDeque<Packet>>>>,
    links: Vec<(usize, usize)>,
    /// Every frame that went on the air, in order, as (sender, text).
    journal: Vec<(usize, String)>,
}

impl Mesh {
    fn line(ids: &[&str]) -> Self {
        Self::line_with(ids, Tunables::default())
    }

    fn line_with(ids: &[&str], tunables: Tunables) -> Self {
        let clock = TestClock::default();
        let mut nodes = Vec::new();
        let mut outboxes = Vec::new();
        let mut inboxes = Vec::new();

        for id in ids {
            let radio = AirRadio::default();
            outboxes.push(radio.outbox.clone());
            inboxes.push(radio.inbox.clone());
            nodes.push(Node::new(NodeOptions {
                id: NodeId::from(*id),
                tunables: tunables.clone(),
                clock: clock.clone(),
                handler: Sensor("23.5,60.1"),
                radio,
            }));
        }

        Self {
            links: (0..ids.len().saturating_sub(1))
                .map(|index| (index, index + 1))
                .collect(),
            journal: Vec::new(),
            outboxes,
            inboxes,
            clock,
            nodes,
        }
    }

    /// Moves frames between nodes until the air goes quiet. Frames the
    /// filter rejects are lost in transit, which is how tests model a
    /// lossy link.
    fn exchange_filtered(&mut self, keep: impl Fn(&[u8]) -> bool) {
        loop {
            let mut moved = false;

            for sender in 0..self.nodes.len() {
                let frames: Vec<Vec<u8>> = self.outboxes[sender].borrow_mut().drain(..).collect();

                for frame in frames {
                    moved = true;
                    self.journal
                        .push((sender, String::from_utf8_lossy(&frame).into_owned()));

                    if !keep(&frame) {
                        continue;
                    }

                    for &(a, b) in &self.links {
                        let peer = match (a == sender, b == sender) {
                            (true, _) => b,
                            (_, true) => a,
                            _ => continue,
                        };

                        self.inboxes[peer].borrow_mut().push_back(Packet {
                            payload: frame.clone(),
                            rssi: RSSI,
                        });
                    }
                }
            }

            for node in self.nodes.iter_mut() {
                node.poll();
            }

            if !moved {
                break;
            }
        }
    }

    fn exchange(&mut self) {
        self.exchange_filtered(|_| true);
    }

    fn hello_round(&mut self) {
        for node in self.nodes.iter_mut() {
            node.send_hello();
        }

        self.exchange();
    }

    fn tick_all(&mut self) {
        for node in self.nodes.iter_mut() {
            node.on_tick();
        }
    }

    fn sent_by(&self, sender: usize, frame: &str) -> bool {
        self.journal
            .iter()
            .any(|(index, text)| *index == sender && text == frame)
    }
}

fn hops(ids: &[&str]) -> Vec<NodeId> {
    ids.iter().map(|id| NodeId::from(*id)).collect()
}

#[test]
fn test_discovery_installs_route() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    assert!(mesh.nodes[0].neighbors().contains("B"));
    assert!(mesh.nodes[1].neighbors().contains("A"));
    assert!(mesh.nodes[1].neighbors().contains("C"));
    assert!(mesh.nodes[2].neighbors().contains("B"));

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();

    // A floods an empty-route request, B extends it, C answers with the
    // reversed route, and B forwards the reply unchanged.
    assert!(mesh.sent_by(0, &format!("RREQ:A:C:{EPOCH}:")));
    assert!(mesh.sent_by(1, &format!("RREQ:A:C:{EPOCH}:B")));
    assert!(mesh.sent_by(2, &format!("RREP:C:A:{EPOCH}:B")));
    assert!(mesh.sent_by(1, &format!("RREP:C:A:{EPOCH}:B")));

    assert_eq!(mesh.nodes[0].routes().get("C"), Some(&hops(&["B"])[..]));
    assert!(mesh.nodes[0].in_flight().is_none());
    assert!(mesh.nodes[0].take_completed().is_none());

    Ok(())
}

#[test]
fn test_transaction_round_trip() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();

    mesh.clock.advance(1);
    mesh.tick_all();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();

    let stamp = EPOCH + 1;
    assert!(mesh.sent_by(0, &format!("DATA:A:C:{stamp}:B")));
    assert!(mesh.sent_by(1, &format!("DATA:A:C:{stamp}:B")));

    // The responder refreshed its route to the requester from the frame.
    assert_eq!(mesh.nodes[2].routes().get("A"), Some(&hops(&["B"])[..]));

    let completed = mesh.nodes[0].take_completed().expect("no response");
    assert_eq!(completed.source, NodeId::from("C"));
    assert_eq!(completed.stamp, stamp);
    assert_eq!(completed.payload, "23.5,60.1");

    assert!(mesh.nodes[0].in_flight().is_none());
    assert!(mesh.nodes[0].take_completed().is_none());

    Ok(())
}

#[test]
fn test_retry_then_success() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();

    mesh.clock.advance(1);
    mesh.tick_all();

    // The first response is lost on the air.
    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange_filtered(|frame| !frame.starts_with(b"RESP"));

    assert!(mesh.nodes[0].take_completed().is_none());
    let armed = mesh.nodes[0].in_flight().expect("not waiting").clone();
    assert_eq!(armed.attempts, 1);
    assert_eq!(armed.stamp, EPOCH + 1);

    // The retry goes out with a fresh stamp, so the relay cache does not
    // swallow it as a duplicate of the first attempt.
    mesh.clock.advance(30);
    mesh.tick_all();
    mesh.exchange();

    let stamp = EPOCH + 31;
    assert!(mesh.sent_by(0, &format!("DATA:A:C:{stamp}:B")));
    assert!(mesh.sent_by(1, &format!("DATA:A:C:{stamp}:B")));

    let completed = mesh.nodes[0].take_completed().expect("retry failed");
    assert_eq!(completed.stamp, stamp);
    assert_eq!(completed.payload, "23.5,60.1");

    Ok(())
}

#[test]
fn test_timeout_evicts_route() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();

    mesh.clock.advance(1);
    mesh.tick_all();

    // Every response is lost; the transaction was armed at second 1, so
    // the hard deadline lands at second 63.
    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange_filtered(|frame| !frame.starts_with(b"RESP"));

    mesh.clock.advance(30);
    mesh.tick_all();
    mesh.exchange_filtered(|frame| !frame.starts_with(b"RESP"));

    assert_eq!(mesh.nodes[0].in_flight().expect("not waiting").attempts, 2);

    mesh.clock.advance(31);
    mesh.tick_all();
    assert!(mesh.nodes[0].in_flight().is_some());

    mesh.clock.advance(1);
    mesh.tick_all();

    assert!(mesh.nodes[0].in_flight().is_none());
    assert!(mesh.nodes[0].routes().get("C").is_none());
    assert!(mesh.nodes[0].take_completed().is_none());
    assert_eq!(mesh.nodes[0].stats().timeouts, 1);

    Ok(())
}

#[test]
fn test_duplicate_rreq_rebroadcast_once() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    let frame = format!("RREQ:A:C:{}:", EPOCH + 500);
    mesh.nodes[1].on_frame(frame.as_bytes(), RSSI);
    mesh.nodes[1].on_frame(frame.as_bytes(), RSSI);

    let rebroadcasts: Vec<Vec<u8>> = mesh.outboxes[1].borrow_mut().drain(..).collect();
    assert_eq!(rebroadcasts.len(), 1);
    assert_eq!(
        rebroadcasts[0],
        format!("RREQ:A:C:{}:B", EPOCH + 500).into_bytes()
    );

    Ok(())
}

#[test]
fn test_integrity_rejection_then_completion() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();
    mesh.clock.advance(1);
    mesh.tick_all();
    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange_filtered(|frame| !frame.starts_with(b"RESP"));

    let stamp = EPOCH + 1;
    let body = format!("RESP:C:A:{stamp}:B:23.5,60.1");
    let check = codec::checksum(body.as_bytes());

    // A check value one off the correct one is dropped and the
    // transaction stays armed.
    let corrupted = format!("{}:{}", body, check.wrapping_add(1));
    mesh.nodes[0].on_frame(corrupted.as_bytes(), RSSI);

    assert_eq!(mesh.nodes[0].stats().check_failed, 1);
    assert!(mesh.nodes[0].in_flight().is_some());
    assert!(mesh.nodes[0].take_completed().is_none());

    // The subsequent intact response still completes it.
    let intact = format!("{}:{}", body, check);
    mesh.nodes[0].on_frame(intact.as_bytes(), RSSI);

    assert_eq!(
        mesh.nodes[0].take_completed().expect("not completed").stamp,
        stamp
    );
    assert!(mesh.nodes[0].in_flight().is_none());

    Ok(())
}

// A response landing exactly at the hard deadline is processed before the
// deadline sweep of the same invocation, so it completes; deadlines
// themselves fire inclusively on the tick.
#[test]
fn test_response_on_the_deadline_completes() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();
    mesh.clock.advance(1);
    mesh.tick_all();
    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange_filtered(|frame| !frame.starts_with(b"RESP"));

    let deadline = 1 + Tunables::default().timeout;
    let stamp = EPOCH + 1;

    // Jump straight onto the deadline without an intervening tick.
    mesh.clock.advance(deadline - 1);

    let body = format!("RESP:C:A:{stamp}:B:23.5,60.1");
    let frame = format!("{}:{}", body, codec::checksum(body.as_bytes()));
    mesh.nodes[0].on_frame(frame.as_bytes(), RSSI);

    assert_eq!(
        mesh.nodes[0].take_completed().expect("not completed").stamp,
        stamp
    );
    assert_eq!(mesh.nodes[0].stats().timeouts, 0);
    assert!(mesh.nodes[0].routes().get("C").is_some());

    Ok(())
}

// max-attempts zero means the armed transaction never retransmits and
// simply dies at the hard deadline.
#[test]
fn test_zero_attempts_disables_retry() -> Result<()> {
    let mut mesh = Mesh::line_with(
        &["A", "B", "C"],
        Tunables {
            max_attempts: 0,
            ..Tunables::default()
        },
    );
    mesh.hello_round();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();
    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange_filtered(|frame| !frame.starts_with(b"RESP"));

    let sent = mesh.nodes[0].stats().sent_pkts;

    mesh.clock.advance(30);
    mesh.tick_all();
    assert_eq!(mesh.nodes[0].stats().sent_pkts, sent);

    mesh.clock.advance(32);
    mesh.tick_all();

    assert!(mesh.nodes[0].in_flight().is_none());
    assert!(mesh.nodes[0].routes().get("C").is_none());
    assert_eq!(mesh.nodes[0].stats().timeouts, 1);

    Ok(())
}

// Hearing a HELLO, beaconing (which clears the table), then hearing the
// same HELLO again leaves exactly the sender in the table.
#[test]
fn test_hello_clears_then_relearns() -> Result<()> {
    let mut mesh = Mesh::line(&["A"]);

    mesh.nodes[0].on_frame(b"HELLO:B", RSSI);
    assert!(mesh.nodes[0].neighbors().contains("B"));

    mesh.nodes[0].send_hello();
    assert!(mesh.nodes[0].neighbors().is_empty());

    mesh.nodes[0].on_frame(b"HELLO:B", RSSI);
    assert_eq!(mesh.nodes[0].neighbors().len(), 1);
    assert!(mesh.nodes[0].neighbors().contains("B"));

    // At or below the threshold the sender is not a neighbor.
    mesh.nodes[0].on_frame(b"HELLO:D", -80);
    mesh.nodes[0].on_frame(b"HELLO:E", -90);
    assert_eq!(mesh.nodes[0].neighbors().len(), 1);

    Ok(())
}

#[test]
fn test_gates_and_orphans_are_counted() -> Result<()> {
    // No hello round: nobody knows any neighbors.
    let mut mesh = Mesh::line(&["A", "B", "C"]);

    // An RREQ whose last hop is not a known neighbor is gated.
    mesh.nodes[1].on_frame(format!("RREQ:A:C:{EPOCH}:").as_bytes(), RSSI);
    assert_eq!(mesh.nodes[1].stats().gated, 1);
    assert!(mesh.outboxes[1].borrow().is_empty());

    // So is an RREQ that already loops through this node.
    mesh.nodes[1].on_frame(format!("RREQ:A:C:{}:B", EPOCH + 1).as_bytes(), RSSI);
    assert_eq!(mesh.nodes[1].stats().gated, 2);

    // And an RREP whose route does not include this node.
    mesh.nodes[1].on_frame(format!("RREP:C:A:{EPOCH}:X").as_bytes(), RSSI);
    assert_eq!(mesh.nodes[1].stats().gated, 3);

    // A well-formed response with nothing waiting for it is an orphan.
    let body = format!("RESP:C:B:{EPOCH}::23.5,60.1");
    let frame = format!("{}:{}", body, codec::checksum(body.as_bytes()));
    mesh.nodes[1].on_frame(frame.as_bytes(), RSSI);
    assert_eq!(mesh.nodes[1].stats().orphan_resp, 1);

    // Malformed frames land in their own bucket and change nothing else.
    mesh.nodes[1].on_frame(b"RREQ:A:C:soon:", RSSI);
    assert_eq!(mesh.nodes[1].stats().malformed, 1);

    Ok(())
}

// A relay's seen-cache entry ages out after the TTL, after which the same
// frame is relayed again.
#[test]
fn test_cache_entries_age_out() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    let frame = format!("RREQ:A:C:{EPOCH}:");
    mesh.nodes[1].on_frame(frame.as_bytes(), RSSI);
    assert_eq!(mesh.outboxes[1].borrow_mut().drain(..).count(), 1);

    // One second short of the TTL the entry is still there.
    mesh.clock.advance(Tunables::default().cache_ttl - 1);
    mesh.tick_all();
    mesh.nodes[1].on_frame(frame.as_bytes(), RSSI);
    assert_eq!(mesh.outboxes[1].borrow_mut().drain(..).count(), 0);

    mesh.clock.advance(1);
    mesh.tick_all();
    mesh.nodes[1].on_frame(frame.as_bytes(), RSSI);
    assert_eq!(mesh.outboxes[1].borrow_mut().drain(..).count(), 1);

    Ok(())
}

// A new request while one is in flight silently replaces it; only the new
// stamp can complete.
#[test]
fn test_new_request_replaces_in_flight() -> Result<()> {
    let mut mesh = Mesh::line(&["A", "B", "C"]);
    mesh.hello_round();

    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange();
    mesh.clock.advance(1);
    mesh.tick_all();
    mesh.nodes[0].request_data(&NodeId::from("C"));
    mesh.exchange_filtered(|frame| !frame.starts_with(b"RESP"));

    mesh.clock.advance(1);
    mesh.tick_all();
    mesh.nodes[0].request_data(&NodeId::from("C"));

    let transaction = mesh.nodes[0].in_flight().expect("not waiting");
    assert_eq!(transaction.stamp, EPOCH + 2);

    // The replaced transaction's response is now an orphan.
    let body = format!("RESP:C:A:{}:B:23.5,60.1", EPOCH + 1);
    let frame = format!("{}:{}", body, codec::checksum(body.as_bytes()));
    mesh.nodes[0].on_frame(frame.as_bytes(), RSSI);

    assert_eq!(mesh.nodes[0].stats().orphan_resp, 1);
    assert!(mesh.nodes[0].in_flight().is_some());

    Ok(())
}
