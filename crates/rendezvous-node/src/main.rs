//! Rendezvous node binary.
//!
//! Boots the facade over persistent storage, starts the deadline
//! scheduler (and federation, when enabled), and runs until interrupted.
//! The HTTP surface mounts on top of [`rendezvous_node::RendezvousNode`]
//! in a separate deployment layer.

use anyhow::Context;
use rendezvous_node::adapters::{LocalAttestor, StaticTokenAuthority};
use rendezvous_node::{NodeConfig, NodeDeps, RendezvousNode};
use rdv_types::SystemTimeSource;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = NodeConfig::from_env();
    info!(data_dir = %config.data_dir.display(), "starting rendezvous node");

    let time = Arc::new(SystemTimeSource);

    #[cfg(feature = "rocksdb")]
    let kv: Arc<dyn rdv_store::KeyValueStore> = {
        let db_path = config.data_dir.join("rocksdb");
        Arc::new(
            rendezvous_node::adapters::RocksDbKv::open(rendezvous_node::adapters::RocksDbConfig {
                path: db_path.to_string_lossy().to_string(),
                ..Default::default()
            })
            .context("opening rocksdb")?,
        )
    };
    #[cfg(not(feature = "rocksdb"))]
    let kv: Arc<dyn rdv_store::KeyValueStore> = Arc::new(rdv_store::MemoryKv::new());

    let deps = NodeDeps {
        kv,
        time: time.clone(),
        issuer: Some(Arc::new(StaticTokenAuthority::new("local", time.clone()))),
        attestor: Some(Arc::new(LocalAttestor::new("local-witness", time))),
    };

    let node = RendezvousNode::new(config, deps);
    node.serve();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    node.close();
    Ok(())
}
