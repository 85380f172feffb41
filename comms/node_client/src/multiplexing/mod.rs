//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! # Multiplexer
//!
//! All mini-protocols share one bearer. Each protocol's byte stream is cut into segments of at most
//! [MAX_SEGMENT_PAYLOAD] bytes, tagged with the protocol number and the direction. Locally every protocol gets its
//! own in-memory channel, so protocol code never sees segments.

mod segment;
pub use segment::{Segment, SegmentCodec, MAX_SEGMENT_PAYLOAD, SEGMENT_HEADER_LEN};

use std::{collections::HashMap, io, time::Instant};

use bytes::Bytes;
use futures::{
    stream::{self, BoxStream},
    SinkExt,
    StreamExt,
};
use log::*;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, WriteHalf},
    task::JoinHandle,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    io::ReaderStream,
};

const LOG_TARGET: &str = "comms::node_client::multiplexing";

pub const PROTOCOL_HANDSHAKE: u16 = 0;
pub const PROTOCOL_CHAIN_SYNC: u16 = 5;
pub const PROTOCOL_TX_SUBMISSION: u16 = 6;

/// Buffer size of each in-memory protocol channel
const CHANNEL_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum MultiplexerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Segment payload of {0} bytes exceeds the maximum")]
    PayloadTooLarge(usize),
    #[error("Mini-protocol number {0} does not fit in a segment header")]
    ProtocolOutOfRange(u16),
    #[error("Received a segment for unregistered mini-protocol {0}")]
    UnknownProtocol(u16),
    #[error("Received a segment for mini-protocol {0} travelling in the wrong direction")]
    UnexpectedDirection(u16),
}

/// Which end of the bearer this multiplexer is. The initiator is the side that dialed the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxMode {
    Initiator,
    Responder,
}

impl MuxMode {
    fn is_responder(self) -> bool {
        matches!(self, MuxMode::Responder)
    }
}

/// The local ends of the protocol channels created by [Multiplexer::start]
#[derive(Debug)]
pub struct MultiplexerChannels {
    channels: HashMap<u16, DuplexStream>,
}

impl MultiplexerChannels {
    /// Take the channel for the given mini-protocol. Returns None if the protocol was not registered or the channel
    /// was already taken.
    pub fn take(&mut self, protocol: u16) -> Option<DuplexStream> {
        self.channels.remove(&protocol)
    }
}

pub struct Multiplexer;

impl Multiplexer {
    /// Start multiplexing the given protocols over the bearer. The returned task completes when the bearer is closed
    /// or every local channel has been dropped. When the bearer is closed, all protocol channels observe end of
    /// stream.
    pub fn start<TSocket>(
        bearer: TSocket,
        protocols: &[u16],
        mode: MuxMode,
    ) -> (MultiplexerChannels, JoinHandle<Result<(), MultiplexerError>>)
    where
        TSocket: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut channels = HashMap::with_capacity(protocols.len());
        let mut routes = HashMap::with_capacity(protocols.len());
        let mut outgoing = Vec::with_capacity(protocols.len());
        for &protocol in protocols {
            let (local, remote) = tokio::io::duplex(CHANNEL_BUFFER_SIZE);
            let (remote_read, remote_write) = tokio::io::split(remote);
            channels.insert(protocol, local);
            routes.insert(protocol, remote_write);
            outgoing.push(
                ReaderStream::with_capacity(remote_read, MAX_SEGMENT_PAYLOAD)
                    .map(move |chunk| (protocol, chunk))
                    .boxed(),
            );
        }

        let (reader, writer) = tokio::io::split(bearer);
        let task = tokio::spawn(async move {
            debug!(target: LOG_TARGET, "Multiplexer started as {:?}", mode);
            let result = tokio::select! {
                result = ingress(FramedRead::new(reader, SegmentCodec), &mut routes, mode) => result,
                result = egress(stream::select_all(outgoing), FramedWrite::new(writer, SegmentCodec), mode) => result,
            };
            for (protocol, route) in routes.iter_mut() {
                if let Err(err) = route.shutdown().await {
                    debug!(target: LOG_TARGET, "Failed to close route for mini-protocol {}: {}", protocol, err);
                }
            }
            match &result {
                Ok(_) => debug!(target: LOG_TARGET, "Multiplexer stopped"),
                Err(err) => error!(target: LOG_TARGET, "Multiplexer failed: {}", err),
            }
            result
        });

        (MultiplexerChannels { channels }, task)
    }
}

async fn ingress<R>(
    mut segments: FramedRead<R, SegmentCodec>,
    routes: &mut HashMap<u16, WriteHalf<DuplexStream>>,
    mode: MuxMode,
) -> Result<(), MultiplexerError>
where
    R: AsyncRead + Unpin,
{
    while let Some(segment) = segments.next().await {
        let segment = segment?;
        if segment.from_responder == mode.is_responder() {
            return Err(MultiplexerError::UnexpectedDirection(segment.protocol));
        }
        let route = routes
            .get_mut(&segment.protocol)
            .ok_or(MultiplexerError::UnknownProtocol(segment.protocol))?;
        trace!(
            target: LOG_TARGET,
            "Ingress segment for protocol {} ({} byte(s))",
            segment.protocol,
            segment.payload.len()
        );
        match route.write_all(&segment.payload).await {
            Ok(()) => {},
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!(
                    target: LOG_TARGET,
                    "Protocol {} channel is closed. Discarding {} byte(s)",
                    segment.protocol,
                    segment.payload.len()
                );
            },
            Err(err) => return Err(err.into()),
        }
    }
    debug!(target: LOG_TARGET, "Bearer closed by peer");
    Ok(())
}

async fn egress<W>(
    mut outgoing: stream::SelectAll<BoxStream<'static, (u16, io::Result<Bytes>)>>,
    mut sink: FramedWrite<W, SegmentCodec>,
    mode: MuxMode,
) -> Result<(), MultiplexerError>
where
    W: AsyncWrite + Unpin,
{
    let started = Instant::now();
    while let Some((protocol, chunk)) = outgoing.next().await {
        let mut chunk = chunk?;
        while !chunk.is_empty() {
            let payload = chunk.split_to(chunk.len().min(MAX_SEGMENT_PAYLOAD));
            trace!(
                target: LOG_TARGET,
                "Egress segment for protocol {} ({} byte(s))",
                protocol,
                payload.len()
            );
            sink.send(Segment {
                // Wraps roughly every 71 minutes
                timestamp: started.elapsed().as_micros() as u32,
                protocol,
                from_responder: mode.is_responder(),
                payload,
            })
            .await?;
        }
    }
    sink.close().await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use tokio::io::{self, AsyncReadExt};

    use super::*;

    fn pair() -> (
        (MultiplexerChannels, JoinHandle<Result<(), MultiplexerError>>),
        (MultiplexerChannels, JoinHandle<Result<(), MultiplexerError>>),
    ) {
        let (a, b) = io::duplex(1024);
        let protocols = [PROTOCOL_HANDSHAKE, PROTOCOL_CHAIN_SYNC];
        (
            Multiplexer::start(a, &protocols, MuxMode::Initiator),
            Multiplexer::start(b, &protocols, MuxMode::Responder),
        )
    }

    #[tokio::test]
    async fn it_routes_bytes_to_the_matching_protocol() {
        let ((mut client, _client_task), (mut node, _node_task)) = pair();
        let mut client_sync = client.take(PROTOCOL_CHAIN_SYNC).unwrap();
        let mut node_sync = node.take(PROTOCOL_CHAIN_SYNC).unwrap();
        let mut node_handshake = node.take(PROTOCOL_HANDSHAKE).unwrap();
        assert!(node.take(PROTOCOL_HANDSHAKE).is_none());

        // Larger than one segment
        let msg = vec![0x5a; MAX_SEGMENT_PAYLOAD * 2 + 17];
        client_sync.write_all(&msg).await.unwrap();
        let mut buf = vec![0; msg.len()];
        node_sync.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, msg);

        node_handshake.write_all(b"hello").await.unwrap();
        let mut client_handshake = client.take(PROTOCOL_HANDSHAKE).unwrap();
        let mut buf = [0u8; 5];
        client_handshake.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn it_closes_all_channels_when_the_bearer_closes() {
        let (bearer, mut remote) = io::duplex(1024);
        let (mut channels, task) = Multiplexer::start(bearer, &[PROTOCOL_CHAIN_SYNC], MuxMode::Initiator);
        let mut chain_sync = channels.take(PROTOCOL_CHAIN_SYNC).unwrap();
        remote.shutdown().await.unwrap();
        drop(remote);

        let mut buf = Vec::new();
        assert_eq!(chain_sync.read_to_end(&mut buf).await.unwrap(), 0);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn it_fails_on_an_unregistered_protocol() {
        let (bearer, remote) = io::duplex(1024);
        let (_channels, task) = Multiplexer::start(bearer, &[PROTOCOL_CHAIN_SYNC], MuxMode::Initiator);
        let mut remote = FramedWrite::new(remote, SegmentCodec);
        remote
            .send(Segment {
                timestamp: 0,
                protocol: 9,
                from_responder: true,
                payload: Bytes::from_static(b"?"),
            })
            .await
            .unwrap();
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, MultiplexerError::UnknownProtocol(9)));
    }

    #[tokio::test]
    async fn it_fails_on_a_segment_from_the_same_side() {
        let (bearer, remote) = io::duplex(1024);
        let (_channels, task) = Multiplexer::start(bearer, &[PROTOCOL_CHAIN_SYNC], MuxMode::Initiator);
        let mut remote = FramedWrite::new(remote, SegmentCodec);
        remote
            .send(Segment {
                timestamp: 0,
                protocol: PROTOCOL_CHAIN_SYNC,
                from_responder: false,
                payload: Bytes::from_static(b"?"),
            })
            .await
            .unwrap();
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, MultiplexerError::UnexpectedDirection(PROTOCOL_CHAIN_SYNC)));
    }
}
