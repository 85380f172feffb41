//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use log::*;
use node_client::config::NodeClientConfig;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "node_client::app::config";

/// Loaded if no configuration file is given on the command line and it exists
const DEFAULT_CONFIG_FILE: &str = "config/node_client.toml";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApplicationConfig {
    #[serde(default)]
    pub node_client: NodeClientConfig,
}

impl ApplicationConfig {
    pub fn load_from(cfg: &Config) -> Result<Self, ConfigError> {
        let config = cfg.clone().try_deserialize::<Self>()?;
        Ok(config)
    }
}

/// Build the layered configuration: the configuration file, then `NODE_CLIENT_CLI__*` environment variables, then
/// command line overrides. An explicitly given configuration file must exist.
pub fn load_configuration(path: Option<&Path>, overrides: &[(String, String)]) -> Result<Config, ConfigError> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    debug!(target: LOG_TARGET, "Loading configuration file from {}", path.display());

    let mut builder = Config::builder().add_source(File::from(path).required(required)).add_source(
        Environment::with_prefix("NODE_CLIENT_CLI")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );
    for (key, value) in overrides {
        builder = builder.set_override(key.as_str(), value.as_str())?;
    }
    builder.build()
}
