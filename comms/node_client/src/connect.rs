//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::*;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::UnixStream,
    task::JoinHandle,
};

use crate::{
    chain::Point,
    client::NodeClient,
    codec::{MessageCodec, PayloadCodec, StandardPointCodec},
    config::{ConfigError, NodeClientConfig},
    multiplexing::{
        Multiplexer,
        MultiplexerError,
        MuxMode,
        PROTOCOL_CHAIN_SYNC,
        PROTOCOL_HANDSHAKE,
        PROTOCOL_TX_SUBMISSION,
    },
    protocol::{
        chain_sync::ChainSyncFormat,
        handshake::{self, HandshakeError},
        tx_submission::{LocalTxSubmissionClient, TxSubmissionFormat},
        ProtocolDriver,
        ProtocolError,
    },
};

const LOG_TARGET: &str = "comms::node_client::connect";

/// The path of the socket of node `node_id` within `dir`
pub fn socket_path<P: AsRef<Path>>(dir: P, node_id: u32) -> PathBuf {
    dir.as_ref().join(format!("node-core-{}.socket", node_id))
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to connect to `{}`: {source}", .path.display())]
    Dial { path: PathBuf, source: io::Error },
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("The multiplexer did not provide a channel for mini-protocol {0}")]
    MissingChannel(u16),
}

/// The background tasks of a connection. Each resolves when its part of the connection terminates.
#[derive(Debug)]
pub struct NodeClientHandles {
    pub multiplexer: JoinHandle<Result<(), MultiplexerError>>,
    pub chain_sync: JoinHandle<Result<(), ProtocolError>>,
    pub tx_submission: JoinHandle<Result<(), ProtocolError>>,
}

impl NodeClientHandles {
    /// Stop every task of the connection
    pub fn abort(&self) {
        self.chain_sync.abort();
        self.tx_submission.abort();
        self.multiplexer.abort();
    }
}

/// Connects to a node and starts the mini-protocol clients. Blocks and transactions are encoded by the given
/// payload codecs.
pub struct NodeClientBuilder<B, T> {
    config: NodeClientConfig,
    block_codec: Arc<dyn PayloadCodec<B>>,
    point_codec: Arc<dyn PayloadCodec<Point>>,
    tx_codec: Arc<dyn PayloadCodec<T>>,
}

impl<B, T> NodeClientBuilder<B, T>
where
    B: Send + 'static,
    T: Send + 'static,
{
    pub fn new(
        config: NodeClientConfig,
        block_codec: Arc<dyn PayloadCodec<B>>,
        tx_codec: Arc<dyn PayloadCodec<T>>,
    ) -> Self {
        Self {
            config,
            block_codec,
            point_codec: Arc::new(StandardPointCodec),
            tx_codec,
        }
    }

    /// Dial the node socket named by the configuration and start the client on it
    pub async fn connect(self) -> Result<(NodeClient<B>, NodeClientHandles), ConnectError> {
        self.config.validate()?;
        let path = socket_path(&self.config.socket_dir, self.config.node_id);
        info!(target: LOG_TARGET, "Connecting to node at `{}`", path.display());
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|source| ConnectError::Dial { path, source })?;
        self.connect_with(stream).await
    }

    /// Start the client on an already connected bearer
    pub async fn connect_with<TSocket>(
        self,
        bearer: TSocket,
    ) -> Result<(NodeClient<B>, NodeClientHandles), ConnectError>
    where
        TSocket: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.config.validate()?;
        let (mut channels, multiplexer) = Multiplexer::start(
            bearer,
            &[PROTOCOL_HANDSHAKE, PROTOCOL_CHAIN_SYNC, PROTOCOL_TX_SUBMISSION],
            MuxMode::Initiator,
        );
        let mut take = |protocol| channels.take(protocol).ok_or(ConnectError::MissingChannel(protocol));
        let mut handshake_channel = take(PROTOCOL_HANDSHAKE)?;
        let chain_sync_channel = take(PROTOCOL_CHAIN_SYNC)?;
        let tx_channel = take(PROTOCOL_TX_SUBMISSION)?;

        if let Err(err) = handshake::client_handshake(
            &mut handshake_channel,
            self.config.version_proposal(),
            self.config.handshake_timeout,
        )
        .await
        {
            multiplexer.abort();
            return Err(err.into());
        }

        let chain_sync_codec = MessageCodec::new(
            ChainSyncFormat::new(self.block_codec, self.point_codec),
            self.config.max_frame_size,
        );
        let (client, chain_sync) = NodeClient::spawn(chain_sync_channel, chain_sync_codec, &self.config);

        let tx_codec = MessageCodec::new(TxSubmissionFormat::new(self.tx_codec), self.config.max_frame_size);
        let tx_client = LocalTxSubmissionClient::<T>::new(self.config.tx_idle_interval);
        let tx_submission = tokio::spawn(ProtocolDriver::new(tx_channel, tx_codec, tx_client).run());

        info!(target: LOG_TARGET, "Node client connected");
        Ok((client, NodeClientHandles {
            multiplexer,
            chain_sync,
            tx_submission,
        }))
    }
}
