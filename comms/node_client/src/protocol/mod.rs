//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! # Mini-protocols
//!
//! Every mini-protocol is a strict turn-taking state machine: in each state exactly one side (the side with _agency_)
//! may send the next message. The client roles in this module are pure state machines implementing
//! [ClientProtocol]; the [ProtocolDriver] runs one of them against a channel.

mod error;
pub use error::ProtocolError;

mod driver;
pub use driver::ProtocolDriver;

pub mod chain_sync;
pub mod handshake;
pub mod tx_submission;

use async_trait::async_trait;

/// Which side of a mini-protocol may send the next message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agency {
    Client,
    Server,
    /// The protocol has terminated
    Nobody,
}

/// The client role of a mini-protocol.
#[async_trait]
pub trait ClientProtocol: Send {
    type Message: Send;

    fn name(&self) -> &'static str;

    fn agency(&self) -> Agency;

    /// Produce the next message to send. Only called while the client has agency. This may wait indefinitely for work
    /// to arrive.
    async fn next_message(&mut self) -> Self::Message;

    /// Handle a message from the server. Only called while the server has agency. The returned message, if any, is
    /// sent immediately.
    fn handle_message(&mut self, message: Self::Message) -> Result<Option<Self::Message>, ProtocolError>;
}
