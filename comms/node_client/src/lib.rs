//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! # Node client
//!
//! A stateless request/response client for a node that speaks multiplexed, stateful mini-protocols over a local
//! socket. Callers ask for the next batch of blocks after a point, or for the tip of the node's chain. Requests are
//! queued and served one at a time by the chain-sync protocol client.
//!
//! ```ignore
//! let (client, handles) = NodeClientBuilder::new(config, Arc::new(RawCodec), Arc::new(RawCodec))
//!     .connect()
//!     .await?;
//! let tip = client.network_tip().await?;
//! let blocks = client.next_blocks(Point::Origin).await?;
//! ```

pub mod chain;
pub mod codec;
pub mod config;
pub mod multiplexing;
pub mod protocol;

mod client;
pub use client::{NodeClient, NodeClientError};

mod connect;
pub use connect::{socket_path, ConnectError, NodeClientBuilder, NodeClientHandles};

pub use bytes::Bytes;
