//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::{fmt, sync::Arc};

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{wire, CodecError, MessageCodec, PayloadCodec, WireFormat};

const MSG_SUBMIT_TX: u8 = 0;
const MSG_ACCEPT_TX: u8 = 1;
const MSG_REJECT_TX: u8 = 2;
const MSG_DONE: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxSubmissionMessage<T> {
    SubmitTx(T),
    AcceptTx,
    RejectTx(String),
    Done,
}

impl<T> TxSubmissionMessage<T> {
    pub fn as_type_str(&self) -> &'static str {
        use TxSubmissionMessage::*;
        match self {
            SubmitTx(_) => "SubmitTx",
            AcceptTx => "AcceptTx",
            RejectTx(_) => "RejectTx",
            Done => "Done",
        }
    }
}

impl<T> fmt::Display for TxSubmissionMessage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxSubmissionMessage::RejectTx(reason) => write!(f, "RejectTx({})", reason),
            msg => f.write_str(msg.as_type_str()),
        }
    }
}

pub struct TxSubmissionFormat<T> {
    tx_codec: Arc<dyn PayloadCodec<T>>,
}

impl<T> TxSubmissionFormat<T> {
    pub fn new(tx_codec: Arc<dyn PayloadCodec<T>>) -> Self {
        Self { tx_codec }
    }
}

impl<T> Clone for TxSubmissionFormat<T> {
    fn clone(&self) -> Self {
        Self {
            tx_codec: self.tx_codec.clone(),
        }
    }
}

impl<T> WireFormat for TxSubmissionFormat<T> {
    type Message = TxSubmissionMessage<T>;

    fn encode_message(&self, message: &Self::Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        use TxSubmissionMessage::*;
        match message {
            SubmitTx(tx) => {
                dst.put_u8(MSG_SUBMIT_TX);
                let bytes = self.tx_codec.encode(tx)?;
                wire::put_payload(dst, "tx", &bytes)?;
            },
            AcceptTx => dst.put_u8(MSG_ACCEPT_TX),
            RejectTx(reason) => {
                dst.put_u8(MSG_REJECT_TX);
                wire::put_string(dst, "reason", reason)?;
            },
            Done => dst.put_u8(MSG_DONE),
        }
        Ok(())
    }

    fn decode_message(&self, mut frame: Bytes) -> Result<Self::Message, CodecError> {
        use TxSubmissionMessage::*;
        let msg = match wire::get_u8(&mut frame, "tag")? {
            MSG_SUBMIT_TX => {
                let bytes = wire::get_payload(&mut frame, "tx")?;
                SubmitTx(self.tx_codec.decode(bytes)?)
            },
            MSG_ACCEPT_TX => AcceptTx,
            MSG_REJECT_TX => RejectTx(wire::get_string(&mut frame, "reason")?),
            MSG_DONE => Done,
            tag => {
                return Err(CodecError::UnknownTag {
                    protocol: "local-tx-submission",
                    tag,
                })
            },
        };
        wire::ensure_consumed(&frame)?;
        Ok(msg)
    }
}

pub type TxSubmissionCodec<T> = MessageCodec<TxSubmissionFormat<T>>;
