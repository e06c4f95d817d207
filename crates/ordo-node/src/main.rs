//! ordoledger node binary

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use ordo_crypto::{Keypair, KeysManager};
use ordo_network::InProcessNetwork;
use ordo_node::{GenesisPeer, NodeConfig, OrdoNode};
use ordo_storage::MemoryStorage;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&NodeConfig::default())?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log.clone())),
        )
        .init();

    let mut config: NodeConfig = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => NodeConfig::default(),
    };

    let keypair = if let Some(path) = &cli.key_file {
        let keypair = KeysManager::new(path).load_or_generate()?;
        info!(key = %keypair.public_key(), file = %path.display(), "node key loaded");
        keypair
    } else if config.node_key.is_empty() {
        let keypair = Keypair::generate();
        info!(key = %keypair.public_key(), "generated ephemeral node key");
        keypair
    } else {
        let seed = hex::decode(&config.node_key).context("parsing node_key")?;
        Keypair::from_secret_bytes(&seed).context("loading node_key")?
    };

    if config.genesis.peers.is_empty() {
        // Single-node bootstrap: the cluster is just this node
        config.genesis.peers.push(GenesisPeer {
            public_key: keypair.public_key().to_hex(),
            address: "localhost:50541".to_string(),
        });
        info!("no genesis peers configured; bootstrapping a single-node cluster");
    }

    // The reference deployment keeps chain and state in memory; a persistent
    // engine plugs in behind the same storage trait.
    let storage = Arc::new(MemoryStorage::new());
    let network = InProcessNetwork::new();
    let (transport, inbox) = network.register(keypair.public_key());

    let node = OrdoNode::new(config, keypair, storage, Arc::new(transport), inbox)?;
    let handle = node.handle();
    let runner = tokio::spawn(node.run());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.stop();
    runner.await?;
    Ok(())
}
