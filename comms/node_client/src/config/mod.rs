//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

pub mod serializers;

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::serializers::{optional_seconds, seconds};
use crate::{
    chain::ChainParameters,
    codec::DEFAULT_MAX_FRAME_LEN,
    protocol::{chain_sync::DEFAULT_BATCH_SIZE, handshake::VersionProposal, tx_submission::DEFAULT_IDLE_INTERVAL},
};

/// Network magic of the main network
pub const MAINNET_NETWORK_MAGIC: u32 = 764_824_073;
pub const DEFAULT_EPOCH_SLOTS: u64 = 21_600;
pub const DEFAULT_PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration value `{0}` must be greater than zero")]
    ZeroValue(&'static str),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct NodeClientConfig {
    /// Directory containing the node's socket
    pub socket_dir: PathBuf,
    /// Identifies the node socket `node-core-<node_id>.socket` within `socket_dir`
    pub node_id: u32,
    pub network_magic: u32,
    pub epoch_slots: u64,
    pub protocol_version: u32,
    /// Maximum number of blocks returned by a single `next_blocks` call
    pub batch_size: usize,
    pub max_frame_size: usize,
    /// How long a caller waits for a reply. Callers wait indefinitely if this is not set.
    #[serde(with = "optional_seconds")]
    pub request_timeout: Option<Duration>,
    #[serde(with = "seconds")]
    pub handshake_timeout: Duration,
    #[serde(with = "seconds")]
    pub tx_idle_interval: Duration,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from("."),
            node_id: 0,
            network_magic: MAINNET_NETWORK_MAGIC,
            epoch_slots: DEFAULT_EPOCH_SLOTS,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            batch_size: DEFAULT_BATCH_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_LEN,
            request_timeout: None,
            handshake_timeout: Duration::from_secs(30),
            tx_idle_interval: DEFAULT_IDLE_INTERVAL,
        }
    }
}

impl NodeClientConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroValue("batch_size"));
        }
        if self.epoch_slots == 0 {
            return Err(ConfigError::ZeroValue("epoch_slots"));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::ZeroValue("max_frame_size"));
        }
        Ok(())
    }

    pub fn chain_parameters(&self) -> ChainParameters {
        ChainParameters::new(self.epoch_slots, self.network_magic)
    }

    pub fn version_proposal(&self) -> VersionProposal {
        VersionProposal::new(self.protocol_version, self.network_magic)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_loads_partial_config_over_defaults() {
        let toml = r#"
[node_client]
socket_dir = "/run/node"
node_id = 3
request_timeout = 15
handshake_timeout = 5
"#;
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap();
        let config = cfg.get::<NodeClientConfig>("node_client").unwrap();
        assert_eq!(config.socket_dir, PathBuf::from("/run/node"));
        assert_eq!(config.node_id, 3);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.network_magic, MAINNET_NETWORK_MAGIC);
        config.validate().unwrap();
    }

    #[test]
    fn it_rejects_a_zero_batch_size() {
        let config = NodeClientConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroValue("batch_size"))));
    }

    #[test]
    fn it_provides_usable_defaults() {
        let config = NodeClientConfig::default();
        assert!(config.request_timeout.is_none());
        assert_eq!(config.chain_parameters().epoch_slots, 21_600);
        assert_eq!(config.version_proposal(), VersionProposal::new(1, MAINNET_NETWORK_MAGIC));
        config.validate().unwrap();
    }
}
