//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::{fmt, future::Future, time::Duration};

use log::*;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time,
};

use crate::{
    chain::Point,
    config::NodeClientConfig,
    protocol::{
        chain_sync::{ChainSyncClient, ChainSyncCodec, ChainSyncRequest, NextBlocksError},
        ProtocolDriver,
        ProtocolError,
    },
};

const LOG_TARGET: &str = "comms::node_client::client";

#[derive(Debug, Error)]
pub enum NodeClientError {
    #[error(transparent)]
    NextBlocks(#[from] NextBlocksError),
    #[error("The chain-sync client has shut down")]
    ClientClosed,
    #[error("The chain-sync client terminated before replying")]
    RequestCancelled,
    #[error("No reply received within {0:.0?}")]
    RequestTimedOut(Duration),
}

/// A stateless request/response handle to the node. Clones share the same connection, and requests from all clones
/// are served one at a time in the order they were made.
pub struct NodeClient<B> {
    requests: mpsc::UnboundedSender<ChainSyncRequest<B>>,
    request_timeout: Option<Duration>,
}

impl<B> NodeClient<B> {
    pub fn new(requests: mpsc::UnboundedSender<ChainSyncRequest<B>>, request_timeout: Option<Duration>) -> Self {
        Self {
            requests,
            request_timeout,
        }
    }

    /// Returns true while the chain-sync client is running
    pub fn is_connected(&self) -> bool {
        !self.requests.is_closed()
    }

    /// Fetch the next batch of blocks following `point`. Returns fewer than a full batch if the node reaches its tip.
    pub async fn next_blocks(&self, point: Point) -> Result<Vec<B>, NodeClientError> {
        let (reply, reply_rx) = oneshot::channel();
        self.enqueue(ChainSyncRequest::NextBlocks { point, reply })?;
        let blocks = self.wait_for_reply(reply_rx).await??;
        Ok(blocks)
    }

    /// Fetch the point at the tip of the node's chain
    pub async fn network_tip(&self) -> Result<Point, NodeClientError> {
        let (reply, reply_rx) = oneshot::channel();
        self.enqueue(ChainSyncRequest::NetworkTip { reply })?;
        self.wait_for_reply(reply_rx).await
    }

    fn enqueue(&self, request: ChainSyncRequest<B>) -> Result<(), NodeClientError> {
        trace!(target: LOG_TARGET, "Enqueuing {}", request);
        self.requests.send(request).map_err(|_| NodeClientError::ClientClosed)
    }

    async fn wait_for_reply<T>(&self, reply_rx: oneshot::Receiver<T>) -> Result<T, NodeClientError> {
        let reply = match self.request_timeout {
            Some(timeout) => with_timeout(timeout, reply_rx).await?,
            None => reply_rx.await,
        };
        reply.map_err(|_| NodeClientError::RequestCancelled)
    }
}

impl<B: Send + 'static> NodeClient<B> {
    /// Start a chain-sync client on an established channel. Returns the handle and the driver task. The driver runs
    /// until every handle has been dropped or a fatal error occurs.
    pub fn spawn<TChannel>(
        channel: TChannel,
        codec: ChainSyncCodec<B>,
        config: &NodeClientConfig,
    ) -> (Self, JoinHandle<Result<(), ProtocolError>>)
    where
        TChannel: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (requests, request_rx) = mpsc::unbounded_channel();
        let client = ChainSyncClient::new(request_rx, config.batch_size, config.chain_parameters());
        let driver = ProtocolDriver::new(channel, codec, client);
        let handle = tokio::spawn(driver.run());
        (Self::new(requests, config.request_timeout), handle)
    }
}

async fn with_timeout<F: Future>(timeout: Duration, fut: F) -> Result<F::Output, NodeClientError> {
    time::timeout(timeout, fut)
        .await
        .map_err(|_| NodeClientError::RequestTimedOut(timeout))
}

impl<B> Clone for NodeClient<B> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<B> fmt::Debug for NodeClient<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeClient")
            .field("connected", &self.is_connected())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn it_reports_a_closed_client() {
        let (requests, request_rx) = mpsc::unbounded_channel::<ChainSyncRequest<u32>>();
        drop(request_rx);
        let client = NodeClient::new(requests, None);
        assert!(!client.is_connected());
        let err = client.network_tip().await.unwrap_err();
        assert!(matches!(err, NodeClientError::ClientClosed));
    }

    #[tokio::test]
    async fn it_reports_a_dropped_request() {
        let (requests, mut request_rx) = mpsc::unbounded_channel::<ChainSyncRequest<u32>>();
        let client = NodeClient::new(requests, None);
        let (result, _) = tokio::join!(client.next_blocks(Point::Origin), async move {
            // Dropping the request drops its reply sender
            drop(request_rx.recv().await)
        });
        assert!(matches!(result.unwrap_err(), NodeClientError::RequestCancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn it_times_out_when_configured() {
        let (requests, _request_rx) = mpsc::unbounded_channel::<ChainSyncRequest<u32>>();
        let client = NodeClient::new(requests, Some(Duration::from_secs(3)));
        let err = client.network_tip().await.unwrap_err();
        assert!(matches!(err, NodeClientError::RequestTimedOut(_)));
    }
}
