//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use bytes::{BufMut, Bytes, BytesMut};

use super::{wire, CodecError};
use crate::chain::{HeaderHash, Point};

/// Encodes and decodes a single domain payload. Implementations are injected into the message codecs and must be
/// the exact inverse of each other.
pub trait PayloadCodec<T>: Send + Sync {
    fn encode(&self, item: &T) -> Result<Bytes, CodecError>;

    fn decode(&self, bytes: Bytes) -> Result<T, CodecError>;
}

/// Passes payloads through untouched. Used when the caller wants the raw serialized blocks and transactions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl PayloadCodec<Bytes> for RawCodec {
    fn encode(&self, item: &Bytes) -> Result<Bytes, CodecError> {
        Ok(item.clone())
    }

    fn decode(&self, bytes: Bytes) -> Result<Bytes, CodecError> {
        Ok(bytes)
    }
}

const POINT_ORIGIN: u8 = 0x00;
const POINT_SPECIFIC: u8 = 0x01;

/// Points as a tag byte, followed by the slot and header hash for specific points.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPointCodec;

impl PayloadCodec<Point> for StandardPointCodec {
    fn encode(&self, item: &Point) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(1 + 8 + HeaderHash::LEN);
        match item {
            Point::Origin => buf.put_u8(POINT_ORIGIN),
            Point::Specific { slot, hash } => {
                buf.put_u8(POINT_SPECIFIC);
                buf.put_u64(*slot);
                buf.put_slice(hash.as_bytes());
            },
        }
        Ok(buf.freeze())
    }

    fn decode(&self, mut bytes: Bytes) -> Result<Point, CodecError> {
        let point = match wire::get_u8(&mut bytes, "point.tag")? {
            POINT_ORIGIN => Point::Origin,
            POINT_SPECIFIC => {
                let slot = wire::get_u64(&mut bytes, "point.slot")?;
                if bytes.len() < HeaderHash::LEN {
                    return Err(CodecError::Truncated("point.hash"));
                }
                let hash = HeaderHash::try_from(&bytes.split_to(HeaderHash::LEN)[..]).map_err(CodecError::invalid_payload)?;
                Point::Specific { slot, hash }
            },
            tag => return Err(CodecError::UnknownTag { protocol: "point", tag }),
        };
        wire::ensure_consumed(&bytes)?;
        Ok(point)
    }
}
