//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use futures::{SinkExt, StreamExt};
use log::*;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};

use super::{Agency, ClientProtocol, ProtocolError};
use crate::codec::CodecError;

const LOG_TARGET: &str = "comms::node_client::protocol::driver";

/// Runs a [ClientProtocol] against a channel, reading and writing whole messages with the given codec.
pub struct ProtocolDriver<TChannel, P, C> {
    framed: Framed<TChannel, C>,
    protocol: P,
}

impl<TChannel, P, C> ProtocolDriver<TChannel, P, C>
where
    TChannel: AsyncRead + AsyncWrite + Unpin + Send,
    P: ClientProtocol,
    C: Encoder<P::Message, Error = CodecError> + Decoder<Item = P::Message, Error = CodecError> + Send,
{
    pub fn new(channel: TChannel, codec: C, protocol: P) -> Self {
        Self {
            framed: Framed::new(channel, codec),
            protocol,
        }
    }

    /// Drive the protocol until it terminates. Returns an error if the channel fails, a malformed frame is received
    /// or the server violates the protocol. A terminated driver is never restarted.
    #[tracing::instrument(level = "trace", name = "protocol_driver::run", skip(self), fields(protocol = self.protocol.name()))]
    pub async fn run(mut self) -> Result<(), ProtocolError> {
        let name = self.protocol.name();
        debug!(target: LOG_TARGET, "{} client started", name);
        let result = self.run_inner().await;
        match &result {
            Ok(_) => debug!(target: LOG_TARGET, "{} client finished", name),
            Err(err) => error!(target: LOG_TARGET, "{} client terminated: {}", name, err),
        }
        result
    }

    async fn run_inner(&mut self) -> Result<(), ProtocolError> {
        loop {
            match self.protocol.agency() {
                Agency::Client => {
                    let msg = self.protocol.next_message().await;
                    self.framed.send(msg).await?;
                },
                Agency::Server => {
                    let msg = self
                        .framed
                        .next()
                        .await
                        .ok_or_else(|| ProtocolError::ConnectionClosed(self.protocol.name()))??;
                    if let Some(reply) = self.protocol.handle_message(msg)? {
                        self.framed.send(reply).await?;
                    }
                },
                Agency::Nobody => {
                    self.framed.close().await?;
                    return Ok(());
                },
            }
        }
    }
}
