//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use thiserror::Error;

use crate::codec::CodecError;

/// Fatal errors that terminate a mini-protocol driver. They are never delivered to callers of the client.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("The node closed the {0} channel")]
    ConnectionClosed(&'static str),
    #[error("{protocol} protocol violation: received `{message}` in state `{state}`")]
    UnexpectedMessage {
        protocol: &'static str,
        state: &'static str,
        message: &'static str,
    },
}
