use std::{sync::Arc, time::Duration};

use anyhow::Result;
use engine::{NodeId, clock::SystemClock, node::Node};
use tokio::time;

use crate::{
    config::{Config, Role},
    observer::Observer,
    transport::UdpRadio,
};

pub type MeshNode = Node<UdpRadio, SystemClock, Observer>;

/// How often the radio's receive queue is drained between ticks.
const RECEIVE_PERIOD: Duration = Duration::from_millis(100);

/// Drives the whole node from a single task.
///
/// One `select!` loop owns the engine and multiplexes the receive poll,
/// the maintenance tick, the HELLO beacon, and (on a master) the poll
/// schedule, so the engine's entry points are serialized by construction
/// and no lock is needed anywhere.
pub async fn run(config: Arc<Config>, mut node: MeshNode) -> Result<()> {
    let mut receive = time::interval(RECEIVE_PERIOD);
    let mut tick = time::interval(Duration::from_secs(config.protocol.tick_period.max(1)));
    let mut hello = time::interval(Duration::from_secs(config.protocol.hello_period.max(1)));
    let mut request = time::interval(Duration::from_secs(config.poll.period.max(1)));
    let mut stats = time::interval(Duration::from_secs(60));

    let polling = config.node.role == Role::Master && !config.poll.targets.is_empty();
    let mut next_target = 0usize;

    loop {
        tokio::select! {
            _ = receive.tick() => {
                node.poll();

                // The seam the gateway bridge consumes: completed
                // transactions surface here, ready for a northbound bus.
                if let Some(completed) = node.take_completed() {
                    log::debug!(
                        "completed transaction ready for northbound: source={}, stamp={}",
                        completed.source,
                        completed.stamp
                    );
                }
            }
            _ = tick.tick() => node.on_tick(),
            _ = hello.tick() => node.send_hello(),
            _ = request.tick(), if polling => {
                let target = &config.poll.targets[next_target % config.poll.targets.len()];
                next_target = next_target.wrapping_add(1);

                // With no route yet this turns into a discovery; the next
                // visit of the schedule sends the actual request.
                node.request_data(&NodeId::from(target.as_str()));
            }
            _ = stats.tick() => {
                log::debug!("engine counters: {:?}", node.stats());
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("shutting down");
                return Ok(());
            }
        }
    }
}
