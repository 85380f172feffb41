//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use node_client::{
    chain::{HeaderHash, Point, Tip},
    codec::{MessageCodec, RawCodec, StandardPointCodec, DEFAULT_MAX_FRAME_LEN},
    protocol::chain_sync::{ChainSyncCodec, ChainSyncFormat, ChainSyncMessage},
    Bytes,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time,
};
use tokio_util::codec::Framed;

pub fn chain_sync_codec() -> ChainSyncCodec<Bytes> {
    MessageCodec::new(
        ChainSyncFormat::new(Arc::new(RawCodec), Arc::new(StandardPointCodec)),
        DEFAULT_MAX_FRAME_LEN,
    )
}

pub fn point(n: u8) -> Point {
    Point::new(u64::from(n) * 20, HeaderHash::new([n; HeaderHash::LEN]))
}

pub fn tip() -> Tip {
    Tip::new(point(250), 5000)
}

pub fn block(n: u8) -> Bytes {
    Bytes::from(vec![n; usize::from(n) + 1])
}

/// The node side of a chain-sync channel, driven step by step by a test
pub struct FakeNode<TChannel> {
    framed: Framed<TChannel, ChainSyncCodec<Bytes>>,
}

impl<TChannel> FakeNode<TChannel>
where TChannel: AsyncRead + AsyncWrite + Unpin
{
    pub fn new(channel: TChannel) -> Self {
        Self {
            framed: Framed::new(channel, chain_sync_codec()),
        }
    }

    pub async fn recv(&mut self) -> Option<ChainSyncMessage<Bytes>> {
        self.framed.next().await.map(|msg| msg.unwrap())
    }

    pub async fn expect(&mut self, expected: ChainSyncMessage<Bytes>) {
        let msg = time::timeout(Duration::from_secs(10), self.recv())
            .await
            .expect("timed out waiting for the client")
            .expect("client closed the channel");
        assert_eq!(msg, expected);
    }

    /// Asserts that the client does not send anything for a short while
    pub async fn expect_silence(&mut self) {
        let result = time::timeout(Duration::from_millis(50), self.recv()).await;
        assert!(result.is_err(), "client sent {:?}", result);
    }

    pub async fn send(&mut self, msg: ChainSyncMessage<Bytes>) {
        self.framed.send(msg).await.unwrap();
    }

    /// Answer a `FindIntersect` for `start` and serve the given blocks, one per `RequestNext`
    pub async fn serve_batch(&mut self, start: Point, blocks: &[Bytes]) {
        self.expect(ChainSyncMessage::FindIntersect(vec![start])).await;
        self.send(ChainSyncMessage::IntersectionFound(start, tip())).await;
        for block in blocks {
            self.expect(ChainSyncMessage::RequestNext).await;
            self.send(ChainSyncMessage::RollForward(block.clone(), tip())).await;
        }
    }

    pub fn into_inner(self) -> TChannel {
        self.framed.into_inner()
    }
}
