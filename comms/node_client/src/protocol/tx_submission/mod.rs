//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

mod client;
pub use client::{LocalTxSubmissionClient, TxSubmissionState, DEFAULT_IDLE_INTERVAL};

mod messages;
pub use messages::{TxSubmissionCodec, TxSubmissionFormat, TxSubmissionMessage};

const LOG_TARGET: &str = "comms::node_client::tx_submission";
