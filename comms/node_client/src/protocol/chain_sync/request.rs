//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::chain::Point;

/// Protocol-legal outcomes of a block fetch that are not a batch of blocks. Both are recoverable by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NextBlocksError {
    #[error("The requested point is not on the node's chain")]
    NoIntersection,
    #[error("The node rolled back to a point other than the start of the batch")]
    RollBack,
}

pub type NextBlocksReply<B> = oneshot::Sender<Result<Vec<B>, NextBlocksError>>;
pub type NetworkTipReply = oneshot::Sender<Point>;

/// A stateless request waiting to be served by the chain-sync client. The reply sender is the request's private,
/// write-once result cell.
pub enum ChainSyncRequest<B> {
    NextBlocks { point: Point, reply: NextBlocksReply<B> },
    NetworkTip { reply: NetworkTipReply },
}

impl<B> fmt::Display for ChainSyncRequest<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainSyncRequest::NextBlocks { point, .. } => write!(f, "NextBlocks({})", point),
            ChainSyncRequest::NetworkTip { .. } => f.write_str("NetworkTip"),
        }
    }
}
