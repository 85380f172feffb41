//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

//! # Codecs
//!
//! Every mini-protocol message travels as a single length-delimited frame. Inside the frame the message is written by
//! a [WireFormat], which knows the message alphabet of one mini-protocol. Domain payloads (points, blocks,
//! transactions) are not interpreted by the wire formats; they are encoded and decoded by an injected
//! [PayloadCodec] and nested in the frame as length-prefixed byte strings.

mod error;
pub use error::CodecError;

mod payload;
pub use payload::{PayloadCodec, RawCodec, StandardPointCodec};

pub(crate) mod wire;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Default maximum frame length: 2MiB
pub const DEFAULT_MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

/// The message alphabet of a mini-protocol and how each message is laid out inside a frame.
pub trait WireFormat {
    type Message;

    fn encode_message(&self, message: &Self::Message, dst: &mut BytesMut) -> Result<(), CodecError>;

    /// Decode a message from a complete frame. The frame must be fully consumed.
    fn decode_message(&self, frame: Bytes) -> Result<Self::Message, CodecError>;
}

/// A [tokio_util] codec producing and consuming length-delimited frames of messages in the given [WireFormat].
#[derive(Debug, Clone)]
pub struct MessageCodec<F> {
    frames: LengthDelimitedCodec,
    format: F,
}

impl<F> MessageCodec<F> {
    pub fn new(format: F, max_frame_len: usize) -> Self {
        Self {
            frames: LengthDelimitedCodec::builder().max_frame_length(max_frame_len).new_codec(),
            format,
        }
    }

    pub fn format(&self) -> &F {
        &self.format
    }
}

impl<F: WireFormat> Encoder<F::Message> for MessageCodec<F> {
    type Error = CodecError;

    fn encode(&mut self, message: F::Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::new();
        self.format.encode_message(&message, &mut body)?;
        self.frames.encode(body.freeze(), dst)?;
        Ok(())
    }
}

impl<F: WireFormat> Decoder for MessageCodec<F> {
    type Error = CodecError;
    type Item = F::Message;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(frame) => self.format.decode_message(frame.freeze()).map(Some),
            None => Ok(None),
        }
    }
}
