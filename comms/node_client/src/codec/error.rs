//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Unknown {protocol} message tag {tag:#04x}")]
    UnknownTag { protocol: &'static str, tag: u8 },
    #[error("Frame ended while reading {0}")]
    Truncated(&'static str),
    #[error("Frame contained {0} unexpected trailing byte(s)")]
    TrailingBytes(usize),
    #[error("Field `{field}` has {len} element(s) which exceeds the maximum of {max}")]
    TooLong { field: &'static str, len: usize, max: usize },
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl CodecError {
    pub fn invalid_payload<T: ToString>(err: T) -> Self {
        CodecError::InvalidPayload(err.to_string())
    }
}
