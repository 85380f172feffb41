//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! # Chain-sync
//!
//! The client finds an intersection with the node's chain, then pulls a bounded batch of blocks from it. Each
//! request re-establishes the intersection, no cursor is kept between requests.

mod client;
pub use client::ChainSyncClient;

mod messages;
pub use messages::{ChainSyncCodec, ChainSyncFormat, ChainSyncMessage};

mod request;
pub use request::{ChainSyncRequest, NetworkTipReply, NextBlocksError, NextBlocksReply};

mod state;
pub use state::{ChainSyncState, Fetching, Intersecting, Transition, DEFAULT_BATCH_SIZE};

const LOG_TARGET: &str = "comms::node_client::chain_sync";
