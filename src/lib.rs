pub mod config;
pub mod observer;
pub mod runtime;
pub mod transport;

use std::sync::Arc;

use self::{config::Config, observer::Observer, transport::UdpRadio};

use engine::{
    NodeId,
    clock::SystemClock,
    node::{Node, NodeOptions},
};

#[rustfmt::skip]
static SOFTWARE: &str = concat!(
    "mesh-node.",
    env!("CARGO_PKG_VERSION")
);

/// In order to let integration tests start a node without going through
/// the binary, a function is opened to replace the main function and
/// boot the node directly.
pub async fn startup(config: Arc<Config>) -> anyhow::Result<()> {
    let radio = UdpRadio::bind(&config.radio)?;
    let node = Node::new(NodeOptions {
        id: NodeId::from(config.node.id.as_str()),
        tunables: config.protocol.clone(),
        handler: Observer::new(config.clone()),
        clock: SystemClock::default(),
        radio,
    });

    log::info!(
        "{} starting: id={}, role={:?}, listen={}",
        SOFTWARE,
        config.node.id,
        config.node.role,
        config.radio.listen
    );

    runtime::run(config, node).await
}
