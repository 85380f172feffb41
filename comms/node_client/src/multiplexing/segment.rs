//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::MultiplexerError;

/// Size of a segment header: timestamp, protocol word and payload length
pub const SEGMENT_HEADER_LEN: usize = 8;
/// Maximum number of payload bytes carried by a single segment
pub const MAX_SEGMENT_PAYLOAD: usize = 12_288;

const RESPONDER_FLAG: u16 = 0x8000;
const PROTOCOL_MASK: u16 = 0x7fff;

/// A slice of one mini-protocol's byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Lower 32 bits of the sender's clock in microseconds
    pub timestamp: u32,
    pub protocol: u16,
    pub from_responder: bool,
    pub payload: Bytes,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentCodec;

impl Encoder<Segment> for SegmentCodec {
    type Error = MultiplexerError;

    fn encode(&mut self, segment: Segment, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if segment.payload.len() > MAX_SEGMENT_PAYLOAD {
            return Err(MultiplexerError::PayloadTooLarge(segment.payload.len()));
        }
        if segment.protocol > PROTOCOL_MASK {
            return Err(MultiplexerError::ProtocolOutOfRange(segment.protocol));
        }
        let mut word = segment.protocol;
        if segment.from_responder {
            word |= RESPONDER_FLAG;
        }
        dst.reserve(SEGMENT_HEADER_LEN + segment.payload.len());
        dst.put_u32(segment.timestamp);
        dst.put_u16(word);
        dst.put_u16(segment.payload.len() as u16);
        dst.put_slice(&segment.payload);
        Ok(())
    }
}

impl Decoder for SegmentCodec {
    type Error = MultiplexerError;
    type Item = Segment;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < SEGMENT_HEADER_LEN {
            return Ok(None);
        }
        let len = u16::from_be_bytes([src[6], src[7]]) as usize;
        if len > MAX_SEGMENT_PAYLOAD {
            return Err(MultiplexerError::PayloadTooLarge(len));
        }
        if src.len() < SEGMENT_HEADER_LEN + len {
            src.reserve(SEGMENT_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        let mut header = src.split_to(SEGMENT_HEADER_LEN);
        let timestamp = header.get_u32();
        let word = header.get_u16();
        Ok(Some(Segment {
            timestamp,
            protocol: word & PROTOCOL_MASK,
            from_responder: word & RESPONDER_FLAG != 0,
            payload: src.split_to(len).freeze(),
        }))
    }
}
