//! Node configuration.
//!
//! Environment variables are read in exactly one place —
//! [`NodeConfig::from_env`], called by the binary. Nothing in the
//! library layer consults the environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `RDV_DATA_DIR` | `./data` | Storage directory |
//! | `RDV_SCAN_INTERVAL_SECS` | `60` | Deadline scan cadence |
//! | `RDV_FEDERATION` | unset | Any value enables federation |
//! | `RDV_INSTANCE_NAME` | `rendezvous` | Federation display name |
//! | `RDV_ENDPOINT` | empty | Our dialable endpoint |
//! | `RDV_PEERS` | empty | Comma-separated peer endpoints |

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a node instance.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Storage directory for the persistent engine.
    pub data_dir: PathBuf,
    /// How often the deadline scanner runs.
    pub scan_interval: Duration,
    /// Privacy-delay bounds in milliseconds (min, max).
    pub privacy_delay_ms: (u64, u64),
    /// Whether the federation layer starts.
    pub federation_enabled: bool,
    /// Federation display name.
    pub instance_name: String,
    /// Our dialable endpoint, shared with peers.
    pub instance_endpoint: String,
    /// Peer endpoints to connect to at startup.
    pub peer_endpoints: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            scan_interval: Duration::from_secs(60),
            privacy_delay_ms: (30_000, 180_000),
            federation_enabled: false,
            instance_name: "rendezvous".to_string(),
            instance_endpoint: String::new(),
            peer_endpoints: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Read configuration from the environment. Binary only.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let scan_interval = std::env::var("RDV_SCAN_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.scan_interval);
        Self {
            data_dir: std::env::var("RDV_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            scan_interval,
            privacy_delay_ms: defaults.privacy_delay_ms,
            federation_enabled: std::env::var("RDV_FEDERATION").is_ok(),
            instance_name: std::env::var("RDV_INSTANCE_NAME")
                .unwrap_or(defaults.instance_name),
            instance_endpoint: std::env::var("RDV_ENDPOINT").unwrap_or_default(),
            peer_endpoints: std::env::var("RDV_PEERS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// Fast scans, zero privacy delay. Tests only.
    pub fn for_testing() -> Self {
        Self {
            scan_interval: Duration::from_millis(25),
            privacy_delay_ms: (0, 0),
            ..Self::default()
        }
    }
}
