//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! Version negotiation. The client proposes exactly one protocol version together with the network magic of the chain
//! it expects. There is no fallback: anything but an acceptance of that exact pair is fatal.

use std::{fmt, time::Duration};

use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use log::*;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time,
};
use tokio_util::codec::Framed;

use crate::codec::{wire, CodecError, MessageCodec, WireFormat};

const LOG_TARGET: &str = "comms::node_client::protocol::handshake";

/// Handshake messages are tiny, a small frame limit guards against garbage on a misconfigured socket
const MAX_HANDSHAKE_FRAME_LEN: usize = 64 * 1024;

const MSG_PROPOSE_VERSION: u8 = 0;
const MSG_ACCEPT_VERSION: u8 = 1;
const MSG_REFUSE: u8 = 2;

/// A protocol version together with the network magic of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionProposal {
    pub version: u32,
    pub network_magic: u32,
}

impl VersionProposal {
    pub fn new(version: u32, network_magic: u32) -> Self {
        Self { version, network_magic }
    }
}

impl fmt::Display for VersionProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} (magic {})", self.version, self.network_magic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    ProposeVersion(VersionProposal),
    AcceptVersion(VersionProposal),
    Refuse(String),
}

impl HandshakeMessage {
    pub fn as_type_str(&self) -> &'static str {
        match self {
            HandshakeMessage::ProposeVersion(_) => "ProposeVersion",
            HandshakeMessage::AcceptVersion(_) => "AcceptVersion",
            HandshakeMessage::Refuse(_) => "Refuse",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HandshakeFormat;

impl WireFormat for HandshakeFormat {
    type Message = HandshakeMessage;

    fn encode_message(&self, message: &Self::Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        match message {
            HandshakeMessage::ProposeVersion(proposal) => {
                dst.put_u8(MSG_PROPOSE_VERSION);
                dst.put_u32(proposal.version);
                dst.put_u32(proposal.network_magic);
            },
            HandshakeMessage::AcceptVersion(proposal) => {
                dst.put_u8(MSG_ACCEPT_VERSION);
                dst.put_u32(proposal.version);
                dst.put_u32(proposal.network_magic);
            },
            HandshakeMessage::Refuse(reason) => {
                dst.put_u8(MSG_REFUSE);
                wire::put_string(dst, "reason", reason)?;
            },
        }
        Ok(())
    }

    fn decode_message(&self, mut frame: Bytes) -> Result<Self::Message, CodecError> {
        let msg = match wire::get_u8(&mut frame, "tag")? {
            MSG_PROPOSE_VERSION => HandshakeMessage::ProposeVersion(get_proposal(&mut frame)?),
            MSG_ACCEPT_VERSION => HandshakeMessage::AcceptVersion(get_proposal(&mut frame)?),
            MSG_REFUSE => HandshakeMessage::Refuse(wire::get_string(&mut frame, "reason")?),
            tag => {
                return Err(CodecError::UnknownTag {
                    protocol: "handshake",
                    tag,
                })
            },
        };
        wire::ensure_consumed(&frame)?;
        Ok(msg)
    }
}

fn get_proposal(src: &mut Bytes) -> Result<VersionProposal, CodecError> {
    let version = wire::get_u32(src, "version")?;
    let network_magic = wire::get_u32(src, "network_magic")?;
    Ok(VersionProposal::new(version, network_magic))
}

pub type HandshakeCodec = MessageCodec<HandshakeFormat>;

pub fn handshake_codec() -> HandshakeCodec {
    MessageCodec::new(HandshakeFormat, MAX_HANDSHAKE_FRAME_LEN)
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("The node refused version negotiation: {0}")]
    Refused(String),
    #[error("Proposed {proposed} but the node accepted {accepted}")]
    VersionMismatch {
        proposed: VersionProposal,
        accepted: VersionProposal,
    },
    #[error("Unexpected handshake message `{0}`")]
    UnexpectedMessage(&'static str),
    #[error("The node closed the connection during the handshake")]
    ConnectionClosed,
    #[error("Handshake timed out after {0:.0?}")]
    TimedOut(Duration),
}

/// Negotiate the given version with the node. Fails if the node does not accept that exact version and network magic
/// within the timeout.
pub async fn client_handshake<TChannel>(
    channel: &mut TChannel,
    proposal: VersionProposal,
    timeout: Duration,
) -> Result<(), HandshakeError>
where
    TChannel: AsyncRead + AsyncWrite + Unpin,
{
    time::timeout(timeout, propose(channel, proposal))
        .await
        .map_err(|_| HandshakeError::TimedOut(timeout))?
}

async fn propose<TChannel>(channel: &mut TChannel, proposal: VersionProposal) -> Result<(), HandshakeError>
where TChannel: AsyncRead + AsyncWrite + Unpin {
    let mut framed = Framed::new(channel, handshake_codec());
    debug!(target: LOG_TARGET, "Proposing {}", proposal);
    framed.send(HandshakeMessage::ProposeVersion(proposal)).await?;

    let reply = framed.next().await.ok_or(HandshakeError::ConnectionClosed)??;
    match reply {
        HandshakeMessage::AcceptVersion(accepted) if accepted == proposal => {
            info!(target: LOG_TARGET, "Node accepted {}", accepted);
            Ok(())
        },
        HandshakeMessage::AcceptVersion(accepted) => Err(HandshakeError::VersionMismatch {
            proposed: proposal,
            accepted,
        }),
        HandshakeMessage::Refuse(reason) => Err(HandshakeError::Refused(reason)),
        msg => Err(HandshakeError::UnexpectedMessage(msg.as_type_str())),
    }
}

/// The node side of the handshake. Accepts the proposal if it matches `supported`, otherwise refuses it.
pub async fn server_handshake<TChannel>(
    channel: &mut TChannel,
    supported: VersionProposal,
) -> Result<VersionProposal, HandshakeError>
where
    TChannel: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(channel, handshake_codec());
    let proposal = match framed.next().await.ok_or(HandshakeError::ConnectionClosed)?? {
        HandshakeMessage::ProposeVersion(proposal) => proposal,
        msg => return Err(HandshakeError::UnexpectedMessage(msg.as_type_str())),
    };

    if proposal != supported {
        let reason = format!("{} is not supported", proposal);
        framed.send(HandshakeMessage::Refuse(reason.clone())).await?;
        return Err(HandshakeError::Refused(reason));
    }
    framed.send(HandshakeMessage::AcceptVersion(proposal)).await?;
    Ok(proposal)
}

#[cfg(test)]
mod test {
    use futures::future;
    use tokio::io;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn it_negotiates_the_proposed_version() {
        let (mut client, mut node) = io::duplex(1024);
        let proposal = VersionProposal::new(1, 42);
        let (client_result, node_result) = future::join(
            client_handshake(&mut client, proposal, TIMEOUT),
            server_handshake(&mut node, proposal),
        )
        .await;
        client_result.unwrap();
        assert_eq!(node_result.unwrap(), proposal);
    }

    #[tokio::test]
    async fn it_fails_when_the_network_magic_differs() {
        let (mut client, mut node) = io::duplex(1024);
        let (client_result, node_result) = future::join(
            client_handshake(&mut client, VersionProposal::new(1, 42), TIMEOUT),
            server_handshake(&mut node, VersionProposal::new(1, 2)),
        )
        .await;
        assert!(matches!(client_result.unwrap_err(), HandshakeError::Refused(_)));
        assert!(matches!(node_result.unwrap_err(), HandshakeError::Refused(_)));
    }

    #[tokio::test]
    async fn it_rejects_an_acceptance_of_another_version() {
        let (mut client, node) = io::duplex(1024);
        let node = tokio::spawn(async move {
            let mut framed = Framed::new(node, handshake_codec());
            framed.next().await.unwrap().unwrap();
            framed
                .send(HandshakeMessage::AcceptVersion(VersionProposal::new(2, 42)))
                .await
                .unwrap();
            framed
        });
        let err = client_handshake(&mut client, VersionProposal::new(1, 42), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::VersionMismatch { .. }));
        node.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn it_times_out_when_the_node_is_silent() {
        let (mut client, _node) = io::duplex(1024);
        let err = client_handshake(&mut client, VersionProposal::new(1, 42), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::TimedOut(_)));
    }
}
