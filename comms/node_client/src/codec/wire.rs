//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! Primitive field readers and writers shared by the wire formats. All integers are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::CodecError;

pub fn put_payload(dst: &mut BytesMut, field: &'static str, payload: &[u8]) -> Result<(), CodecError> {
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::TooLong {
        field,
        len: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(4 + payload.len());
    dst.put_u32(len);
    dst.put_slice(payload);
    Ok(())
}

pub fn get_payload(src: &mut Bytes, field: &'static str) -> Result<Bytes, CodecError> {
    let len = get_u32(src, field)? as usize;
    if src.remaining() < len {
        return Err(CodecError::Truncated(field));
    }
    Ok(src.split_to(len))
}

pub fn put_count(dst: &mut BytesMut, field: &'static str, count: usize) -> Result<(), CodecError> {
    let count = u16::try_from(count).map_err(|_| CodecError::TooLong {
        field,
        len: count,
        max: u16::MAX as usize,
    })?;
    dst.put_u16(count);
    Ok(())
}

pub fn get_u8(src: &mut Bytes, field: &'static str) -> Result<u8, CodecError> {
    if src.remaining() < 1 {
        return Err(CodecError::Truncated(field));
    }
    Ok(src.get_u8())
}

pub fn get_u16(src: &mut Bytes, field: &'static str) -> Result<u16, CodecError> {
    if src.remaining() < 2 {
        return Err(CodecError::Truncated(field));
    }
    Ok(src.get_u16())
}

pub fn get_u32(src: &mut Bytes, field: &'static str) -> Result<u32, CodecError> {
    if src.remaining() < 4 {
        return Err(CodecError::Truncated(field));
    }
    Ok(src.get_u32())
}

pub fn get_u64(src: &mut Bytes, field: &'static str) -> Result<u64, CodecError> {
    if src.remaining() < 8 {
        return Err(CodecError::Truncated(field));
    }
    Ok(src.get_u64())
}

pub fn put_string(dst: &mut BytesMut, field: &'static str, s: &str) -> Result<(), CodecError> {
    put_payload(dst, field, s.as_bytes())
}

pub fn get_string(src: &mut Bytes, field: &'static str) -> Result<String, CodecError> {
    let bytes = get_payload(src, field)?;
    String::from_utf8(bytes.to_vec()).map_err(CodecError::invalid_payload)
}

/// Fails if any bytes were left over after the message was decoded
pub fn ensure_consumed(src: &Bytes) -> Result<(), CodecError> {
    if src.has_remaining() {
        return Err(CodecError::TrailingBytes(src.remaining()));
    }
    Ok(())
}
