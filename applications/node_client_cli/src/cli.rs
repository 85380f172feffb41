//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};
use node_client::chain::{HeaderHash, Point};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub(crate) struct Cli {
    /// A path to the configuration file to use
    #[clap(short, long, env = "NODE_CLIENT_CONFIG")]
    pub config: Option<PathBuf>,
    /// The path to the log configuration file
    #[clap(short, long, alias = "log_config")]
    pub log_config: Option<PathBuf>,
    /// The directory containing the node socket (overrides the configuration)
    #[clap(long, alias = "socket_dir")]
    pub socket_dir: Option<PathBuf>,
    /// The id of the node to connect to (overrides the configuration)
    #[clap(long, alias = "node_id")]
    pub node_id: Option<u32>,
    /// Overrides for properties in the config file, e.g. -p node_client.batch_size=100
    #[clap(short = 'p', parse(try_from_str = parse_key_val), multiple_occurrences(true))]
    pub config_property_overrides: Vec<(String, String)>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print the tip of the node's chain
    Tip,
    /// Fetch the next batch of blocks after a point. Starts from the origin if no point is given.
    Blocks {
        /// Slot of the starting point
        #[clap(long, requires = "hash")]
        slot: Option<u64>,
        /// Header hash of the starting point, in hex
        #[clap(long, requires = "slot")]
        hash: Option<HeaderHash>,
    },
}

impl Command {
    pub fn start_point(&self) -> Option<Point> {
        match self {
            Command::Blocks {
                slot: Some(slot),
                hash: Some(hash),
            } => Some(Point::new(*slot, *hash)),
            Command::Blocks { .. } => Some(Point::Origin),
            Command::Tip => None,
        }
    }
}

fn parse_key_val<T, U>(s: &str) -> Result<(T, U), Box<dyn Error + Send + Sync + 'static>>
where
    T: std::str::FromStr,
    T::Err: Error + Send + Sync + 'static,
    U: std::str::FromStr,
    U::Err: Error + Send + Sync + 'static,
{
    let mut parts = s.splitn(2, '=').map(|s| s.trim());
    let k = parts.next().ok_or("invalid override: string empty")?;
    let v = parts
        .next()
        .ok_or_else(|| format!("invalid override: expected key=value: no `=` found in `{}`", s))?;
    Ok((k.parse()?, v.parse()?))
}

impl Cli {
    pub fn config_property_overrides(&self) -> Vec<(String, String)> {
        let mut overrides = self.config_property_overrides.clone();
        if let Some(ref socket_dir) = self.socket_dir {
            overrides.push((
                "node_client.socket_dir".to_string(),
                socket_dir.to_string_lossy().to_string(),
            ));
        }
        if let Some(node_id) = self.node_id {
            overrides.push(("node_client.node_id".to_string(), node_id.to_string()));
        }
        overrides
    }
}
