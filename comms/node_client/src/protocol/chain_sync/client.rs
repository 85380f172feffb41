//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::mem;

use async_trait::async_trait;
use log::*;
use tokio::sync::mpsc;

use super::{ChainSyncMessage, ChainSyncRequest, ChainSyncState, LOG_TARGET};
use crate::{
    chain::ChainParameters,
    protocol::{Agency, ClientProtocol, ProtocolError},
};

/// The chain-sync client role. Requests are taken from the queue one at a time and each is fully resolved before
/// the next one is dequeued, so at most one request is ever in flight against the node.
pub struct ChainSyncClient<B> {
    state: ChainSyncState<B>,
    requests: mpsc::UnboundedReceiver<ChainSyncRequest<B>>,
    batch_size: usize,
    chain_params: ChainParameters,
}

impl<B> ChainSyncClient<B> {
    pub fn new(
        requests: mpsc::UnboundedReceiver<ChainSyncRequest<B>>,
        batch_size: usize,
        chain_params: ChainParameters,
    ) -> Self {
        Self {
            state: ChainSyncState::Idle,
            requests,
            batch_size,
            chain_params,
        }
    }
}

#[async_trait]
impl<B: Send> ClientProtocol for ChainSyncClient<B> {
    type Message = ChainSyncMessage<B>;

    fn name(&self) -> &'static str {
        "chain-sync"
    }

    fn agency(&self) -> Agency {
        self.state.agency()
    }

    async fn next_message(&mut self) -> Self::Message {
        match self.requests.recv().await {
            Some(request) => {
                if let ChainSyncRequest::NextBlocks { point, .. } = &request {
                    trace!(
                        target: LOG_TARGET,
                        "Serving {} (epoch {:?})",
                        request,
                        self.chain_params.epoch_of(point)
                    );
                } else {
                    trace!(target: LOG_TARGET, "Serving {}", request);
                }
                let (state, msg) = ChainSyncState::begin(request);
                self.state = state;
                msg
            },
            None => {
                info!(target: LOG_TARGET, "All clients have been dropped. Ending chain-sync.");
                self.state = ChainSyncState::Done;
                ChainSyncMessage::Done
            },
        }
    }

    fn handle_message(&mut self, message: Self::Message) -> Result<Option<Self::Message>, ProtocolError> {
        trace!(target: LOG_TARGET, "Received {} in state {}", message, self.state);
        let state = mem::replace(&mut self.state, ChainSyncState::Idle);
        let (next_state, reply) = state.transition(message, self.batch_size)?;
        self.state = next_state;
        Ok(reply)
    }
}
