#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use mesh_node::config::{Config, Role};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log.level.as_level())?;

    if config.node.role == Role::Master && config.poll.targets.is_empty() {
        log::warn!(
            "A master with nothing to poll only relays for its neighbors, which is a strangely selfless way to run one :-)"
        );
    }

    mesh_node::startup(config).await
}
