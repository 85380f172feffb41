//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::{marker::PhantomData, time::Duration};

use async_trait::async_trait;
use log::*;
use tokio::time;

use super::{TxSubmissionMessage, LOG_TARGET};
use crate::protocol::{Agency, ClientProtocol, ProtocolError};

/// Default time between idle wake ups of the tx-submission client
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxSubmissionState {
    /// The client has agency. No transaction is ever submitted, so the client stays here.
    Idle,
    /// A transaction was submitted and the node has not yet accepted or rejected it
    Busy,
}

/// Holds the local tx-submission protocol open without submitting anything. The client keeps agency, so the node
/// never sends on this channel.
pub struct LocalTxSubmissionClient<T> {
    state: TxSubmissionState,
    idle_interval: Duration,
    _tx: PhantomData<fn() -> T>,
}

impl<T> LocalTxSubmissionClient<T> {
    pub fn new(idle_interval: Duration) -> Self {
        Self {
            state: TxSubmissionState::Idle,
            idle_interval,
            _tx: PhantomData,
        }
    }

    pub fn state(&self) -> TxSubmissionState {
        self.state
    }
}

impl<T> Default for LocalTxSubmissionClient<T> {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_INTERVAL)
    }
}

#[async_trait]
impl<T: Send> ClientProtocol for LocalTxSubmissionClient<T> {
    type Message = TxSubmissionMessage<T>;

    fn name(&self) -> &'static str {
        "local-tx-submission"
    }

    fn agency(&self) -> Agency {
        match self.state {
            TxSubmissionState::Idle => Agency::Client,
            TxSubmissionState::Busy => Agency::Server,
        }
    }

    async fn next_message(&mut self) -> Self::Message {
        loop {
            time::sleep(self.idle_interval).await;
            trace!(target: LOG_TARGET, "Tx-submission idle. Nothing to submit.");
        }
    }

    fn handle_message(&mut self, message: Self::Message) -> Result<Option<Self::Message>, ProtocolError> {
        match (self.state, message) {
            (TxSubmissionState::Busy, TxSubmissionMessage::AcceptTx) => {
                debug!(target: LOG_TARGET, "Transaction accepted");
                self.state = TxSubmissionState::Idle;
                Ok(None)
            },
            (TxSubmissionState::Busy, TxSubmissionMessage::RejectTx(reason)) => {
                warn!(target: LOG_TARGET, "Transaction rejected: {}", reason);
                self.state = TxSubmissionState::Idle;
                Ok(None)
            },
            (state, msg) => Err(ProtocolError::UnexpectedMessage {
                protocol: "local-tx-submission",
                state: match state {
                    TxSubmissionState::Idle => "Idle",
                    TxSubmissionState::Busy => "Busy",
                },
                message: msg.as_type_str(),
            }),
        }
    }
}
