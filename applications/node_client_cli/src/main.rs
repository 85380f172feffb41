//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! # Node client
//!
//! Queries a node over its local socket.
//!
//! `node_client tip` - Prints the point at the tip of the node's chain
//! `node_client blocks [--slot <slot> --hash <hash>]` - Fetches the next batch of blocks after the given point, or
//! from the origin

mod cli;
mod config;
mod logging;

use std::{process, sync::Arc};

use anyhow::Context;
use clap::Parser;
use log::*;
use node_client::{chain::ChainParameters, codec::RawCodec, Bytes, NodeClient, NodeClientBuilder};

use crate::{
    cli::{Cli, Command},
    config::ApplicationConfig,
};

const LOG_TARGET: &str = "node_client::app";

#[tokio::main]
async fn main() {
    if let Err(err) = main_inner().await {
        eprintln!("{:?}", err);
        error!(target: LOG_TARGET, "Exiting with error: {:?}", err);
        process::exit(1);
    }
}

async fn main_inner() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(
        &logging::get_log_configuration_path(cli.log_config.clone()),
        include_str!("../log4rs_sample.yml"),
    )?;
    info!(
        target: LOG_TARGET,
        "Starting node client version {}",
        env!("CARGO_PKG_VERSION")
    );

    let cfg = config::load_configuration(cli.config.as_deref(), &cli.config_property_overrides())
        .context("Failed to load the configuration")?;
    let config = ApplicationConfig::load_from(&cfg).context("Invalid configuration")?;
    debug!(target: LOG_TARGET, "Using configuration: {:?}", config);
    let chain_params = config.node_client.chain_parameters();

    let (client, handles) =
        NodeClientBuilder::<Bytes, Bytes>::new(config.node_client, Arc::new(RawCodec), Arc::new(RawCodec))
            .connect()
            .await?;

    let result = run_command(&client, &cli.command, &chain_params).await;
    drop(client);
    handles.abort();
    result
}

async fn run_command(
    client: &NodeClient<Bytes>,
    command: &Command,
    chain_params: &ChainParameters,
) -> anyhow::Result<()> {
    match command {
        Command::Tip => {
            let tip = client.network_tip().await?;
            match chain_params.epoch_of(&tip) {
                Some(epoch) => println!("{} (epoch {})", tip, epoch),
                None => println!("{}", tip),
            }
        },
        Command::Blocks { .. } => {
            let start = command.start_point().unwrap_or_default();
            let blocks = client
                .next_blocks(start)
                .await
                .with_context(|| format!("Failed to fetch blocks after {}", start))?;
            println!("{} block(s) after {}", blocks.len(), start);
            for (i, block) in blocks.iter().enumerate() {
                println!("  #{:<4} {} bytes", i, block.len());
            }
        },
    }
    Ok(())
}
