//! On-disk configuration: a `Config` struct tree deserialized from TOML,
//! mirroring how `zebrad` lays out its `ZebradConfig`, minus the application
//! framework this node doesn't need.

use std::net::SocketAddr;
use std::path::PathBuf;

use ltc_chain::parameters::Network;
use serde::{Deserialize, Serialize};

/// Consensus network selection and the data directory backing its store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub network: Network,
    /// Where the `BlockStore`'s append file lives. `None` uses an in-memory
    /// store, useful for tests and ephemeral runs.
    pub data_dir: Option<PathBuf>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            network: Network::Mainnet,
            data_dir: dirs::data_dir().map(|dir| dir.join("ltc-light-client")),
        }
    }
}

/// Peer discovery and connection-pool sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub dns_seeds: Vec<String>,
    pub http_seeds: Vec<String>,
    pub explicit_peers: Vec<SocketAddr>,
    pub target_peer_count: usize,
    pub listen_addr: Option<SocketAddr>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            dns_seeds: vec![
                "seed-a.litecoin.loshan.co.uk".to_owned(),
                "dnsseed.thrasher.io".to_owned(),
            ],
            http_seeds: Vec::new(),
            explicit_peers: Vec::new(),
            target_peer_count: ltc_network::constants::DEFAULT_TARGET_PEER_COUNT,
            listen_addr: None,
        }
    }
}

/// Log verbosity and the metrics exporter's bind address.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub filter: String,
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            filter: "ltc_node=info,ltc_network=info,ltc_consensus=info".to_owned(),
            metrics_addr: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainConfig,
    pub network: NetworkConfig,
    pub tracing: TracingConfig,
}

impl Config {
    /// Loads `path`, falling back to all-default values if it doesn't exist.
    pub fn load(path: &std::path::Path) -> color_eyre::Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).expect("default config serializes");
        let parsed: Config = toml::from_str(&text).expect("serialized config parses back");
        assert_eq!(parsed.chain.network, config.chain.network);
        assert_eq!(parsed.network.target_peer_count, config.network.target_peer_count);
    }
}
