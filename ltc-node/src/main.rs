//! A thin binary wiring the library crates together: loads config, opens a
//! `BlockStore`, starts the chain engine and peer group, and keeps the
//! process alive until a shutdown signal arrives.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use config::Config;
use ltc_chain::parameters::genesis::genesis_block;
use ltc_consensus::ChainEngine;
use ltc_network::group::DiscoveryConfig;
use ltc_network::protocol::external::types::PeerServices;
use ltc_network::PeerGroup;
use ltc_state::{BlockStore, FileBlockStore, MemoryBlockStore};

#[derive(StructOpt)]
#[structopt(name = "ltc-node", about = "A Litecoin SPV light-client daemon")]
struct Opt {
    /// Path to a TOML config file; defaults are used if it doesn't exist.
    #[structopt(long, parse(from_os_str), default_value = "ltc-node.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::from_args();
    let config = Config::load(&opt.config)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.tracing.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(addr) = config.tracing.metrics_addr {
        let builder = metrics_runtime::Receiver::builder();
        let receiver = builder.build().expect("metrics receiver builds");
        metrics::set_boxed_recorder(Box::new(receiver.controller()))
            .unwrap_or_else(|_| tracing::warn!("a metrics recorder was already installed"));
        receiver.install();
        tracing::info!(%addr, "metrics exporter requested but not yet bound to a listener");
    }

    let genesis = genesis_block(config.chain.network);
    let store: Box<dyn BlockStore> = match &config.chain.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!("{}.chain", config.chain.network));
            Box::new(FileBlockStore::open(&path, genesis)?)
        }
        None => Box::new(MemoryBlockStore::new(genesis)),
    };

    let chain_engine = Arc::new(ChainEngine::new(store, config.chain.network));
    let group = PeerGroup::new(config.chain.network, PeerServices::NODE_NETWORK, chain_engine.clone());

    group
        .start(DiscoveryConfig {
            dns_seeds: config.network.dns_seeds.clone(),
            http_seeds: config.network.http_seeds.clone(),
            explicit: config.network.explicit_peers.clone(),
            default_port: config.chain.network.default_port(),
        })
        .await?;

    tracing::info!(network = %config.chain.network, "ltc-node started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    group.stop().await;

    Ok(())
}
