//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::{fmt, sync::Arc};

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    chain::{Point, Tip},
    codec::{wire, CodecError, MessageCodec, PayloadCodec, WireFormat},
};

const MSG_REQUEST_NEXT: u8 = 0;
const MSG_AWAIT_REPLY: u8 = 1;
const MSG_ROLL_FORWARD: u8 = 2;
const MSG_ROLL_BACKWARD: u8 = 3;
const MSG_FIND_INTERSECT: u8 = 4;
const MSG_INTERSECTION_FOUND: u8 = 5;
const MSG_INTERSECTION_NOT_FOUND: u8 = 6;
const MSG_DONE: u8 = 7;

/// The chain-sync message alphabet. Messages from both sides share one alphabet; which ones are legal depends on
/// the state of the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainSyncMessage<B> {
    RequestNext,
    AwaitReply,
    RollForward(B, Tip),
    RollBackward(Point, Tip),
    FindIntersect(Vec<Point>),
    IntersectionFound(Point, Tip),
    IntersectionNotFound(Tip),
    Done,
}

impl<B> ChainSyncMessage<B> {
    pub fn as_type_str(&self) -> &'static str {
        use ChainSyncMessage::*;
        match self {
            RequestNext => "RequestNext",
            AwaitReply => "AwaitReply",
            RollForward(..) => "RollForward",
            RollBackward(..) => "RollBackward",
            FindIntersect(_) => "FindIntersect",
            IntersectionFound(..) => "IntersectionFound",
            IntersectionNotFound(_) => "IntersectionNotFound",
            Done => "Done",
        }
    }
}

impl<B> fmt::Display for ChainSyncMessage<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ChainSyncMessage::*;
        match self {
            RollForward(_, tip) => write!(f, "RollForward(tip = {})", tip),
            RollBackward(point, tip) => write!(f, "RollBackward({}, tip = {})", point, tip),
            FindIntersect(points) => write!(f, "FindIntersect({} point(s))", points.len()),
            IntersectionFound(point, tip) => write!(f, "IntersectionFound({}, tip = {})", point, tip),
            IntersectionNotFound(tip) => write!(f, "IntersectionNotFound(tip = {})", tip),
            msg => f.write_str(msg.as_type_str()),
        }
    }
}

/// Chain-sync messages with blocks and points encoded by the injected payload codecs.
pub struct ChainSyncFormat<B> {
    block_codec: Arc<dyn PayloadCodec<B>>,
    point_codec: Arc<dyn PayloadCodec<Point>>,
}

impl<B> ChainSyncFormat<B> {
    pub fn new(block_codec: Arc<dyn PayloadCodec<B>>, point_codec: Arc<dyn PayloadCodec<Point>>) -> Self {
        Self {
            block_codec,
            point_codec,
        }
    }

    fn put_point(&self, dst: &mut BytesMut, point: &Point) -> Result<(), CodecError> {
        let bytes = self.point_codec.encode(point)?;
        wire::put_payload(dst, "point", &bytes)
    }

    fn get_point(&self, src: &mut Bytes) -> Result<Point, CodecError> {
        let bytes = wire::get_payload(src, "point")?;
        self.point_codec.decode(bytes)
    }

    fn put_tip(&self, dst: &mut BytesMut, tip: &Tip) -> Result<(), CodecError> {
        self.put_point(dst, &tip.point)?;
        dst.put_u64(tip.block_no);
        Ok(())
    }

    fn get_tip(&self, src: &mut Bytes) -> Result<Tip, CodecError> {
        let point = self.get_point(src)?;
        let block_no = wire::get_u64(src, "tip.block_no")?;
        Ok(Tip::new(point, block_no))
    }
}

impl<B> Clone for ChainSyncFormat<B> {
    fn clone(&self) -> Self {
        Self {
            block_codec: self.block_codec.clone(),
            point_codec: self.point_codec.clone(),
        }
    }
}

impl<B> WireFormat for ChainSyncFormat<B> {
    type Message = ChainSyncMessage<B>;

    fn encode_message(&self, message: &Self::Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        use ChainSyncMessage::*;
        match message {
            RequestNext => dst.put_u8(MSG_REQUEST_NEXT),
            AwaitReply => dst.put_u8(MSG_AWAIT_REPLY),
            RollForward(block, tip) => {
                dst.put_u8(MSG_ROLL_FORWARD);
                let bytes = self.block_codec.encode(block)?;
                wire::put_payload(dst, "block", &bytes)?;
                self.put_tip(dst, tip)?;
            },
            RollBackward(point, tip) => {
                dst.put_u8(MSG_ROLL_BACKWARD);
                self.put_point(dst, point)?;
                self.put_tip(dst, tip)?;
            },
            FindIntersect(points) => {
                dst.put_u8(MSG_FIND_INTERSECT);
                wire::put_count(dst, "points", points.len())?;
                for point in points {
                    self.put_point(dst, point)?;
                }
            },
            IntersectionFound(point, tip) => {
                dst.put_u8(MSG_INTERSECTION_FOUND);
                self.put_point(dst, point)?;
                self.put_tip(dst, tip)?;
            },
            IntersectionNotFound(tip) => {
                dst.put_u8(MSG_INTERSECTION_NOT_FOUND);
                self.put_tip(dst, tip)?;
            },
            Done => dst.put_u8(MSG_DONE),
        }
        Ok(())
    }

    fn decode_message(&self, mut frame: Bytes) -> Result<Self::Message, CodecError> {
        use ChainSyncMessage::*;
        let msg = match wire::get_u8(&mut frame, "tag")? {
            MSG_REQUEST_NEXT => RequestNext,
            MSG_AWAIT_REPLY => AwaitReply,
            MSG_ROLL_FORWARD => {
                let bytes = wire::get_payload(&mut frame, "block")?;
                let block = self.block_codec.decode(bytes)?;
                RollForward(block, self.get_tip(&mut frame)?)
            },
            MSG_ROLL_BACKWARD => {
                let point = self.get_point(&mut frame)?;
                RollBackward(point, self.get_tip(&mut frame)?)
            },
            MSG_FIND_INTERSECT => {
                let count = wire::get_u16(&mut frame, "points")?;
                let points = (0..count)
                    .map(|_| self.get_point(&mut frame))
                    .collect::<Result<Vec<_>, _>>()?;
                FindIntersect(points)
            },
            MSG_INTERSECTION_FOUND => {
                let point = self.get_point(&mut frame)?;
                IntersectionFound(point, self.get_tip(&mut frame)?)
            },
            MSG_INTERSECTION_NOT_FOUND => IntersectionNotFound(self.get_tip(&mut frame)?),
            MSG_DONE => Done,
            tag => {
                return Err(CodecError::UnknownTag {
                    protocol: "chain-sync",
                    tag,
                })
            },
        };
        wire::ensure_consumed(&frame)?;
        Ok(msg)
    }
}

pub type ChainSyncCodec<B> = MessageCodec<ChainSyncFormat<B>>;
