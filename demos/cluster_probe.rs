//! Connects to a cluster, prints its slot map as JSON and routes a few keys.
//!
//! ```text
//! cargo run --example cluster_probe -- 127.0.0.1:7000 127.0.0.1:7001
//! cargo run --example cluster_probe -- --config cluster.toml
//! ```

use anyhow::{bail, Context, Result};
use slotmesh::{key_slot, Cluster, ClusterConfig, Cmd, TcpPoolFactory};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<ClusterConfig> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag, path] if flag == "--config" => ClusterConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path)),
        [] => bail!("usage: cluster_probe <addr>... | --config <file>"),
        addrs => {
            let config = ClusterConfig::with_bootstrap(addrs.iter().cloned());
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slotmesh=info")),
        )
        .init();

    let config = load_config()?;
    info!("Bootstrapping from {:?}", config.bootstrap);

    let cluster = Cluster::with_config(TcpPoolFactory::from_config(&config), &config)
        .await
        .context("connecting to cluster")?;

    let topology = cluster.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&topology)?);
    info!(
        "{} ranges across {} nodes, {} of 16384 slots covered",
        topology.len(),
        topology.addrs().len(),
        topology.slots_covered()
    );

    for key in ["user:1000", "{user:1000}:email", "session:42"] {
        match cluster.slot_owner(key).await {
            Ok(owner) => println!("{:<20} slot {:>5} -> {}", key, key_slot(key.as_bytes()), owner),
            Err(e) => warn!("{}: {}", key, e),
        }
    }

    let mut pong = String::new();
    cluster.do_action(&mut Cmd::ping().r(&mut pong)).await?;
    info!("PING -> {}", pong);

    cluster.close().await;
    Ok(())
}
