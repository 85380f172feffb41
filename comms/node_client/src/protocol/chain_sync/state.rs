//  Copyright 2024 The Tari Project
//  SPDX-License-Identifier: BSD-3-Clause

use std::fmt::{Debug, Display, Error, Formatter};

use log::*;
use tokio::sync::oneshot;

use super::{ChainSyncMessage, ChainSyncRequest, NetworkTipReply, NextBlocksError, NextBlocksReply};
use crate::{
    chain::Point,
    protocol::{Agency, ProtocolError},
};

const LOG_TARGET: &str = "comms::node_client::chain_sync::state";

/// The number of blocks fetched for a single `NextBlocks` request
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// The client side of the chain-sync protocol. Each state carries exactly the data that is valid in it; the reply
/// sender of the request being served is owned by the state until the request is answered.
pub enum ChainSyncState<B> {
    /// The client has agency and is waiting for the next request
    Idle,
    /// Waiting for the node to answer a `FindIntersect`
    Intersect(Intersecting<B>),
    /// Fetching a batch of blocks from an established intersection
    Next(Fetching<B>),
    /// The request was answered early after an `AwaitReply`. The node still owes one roll forward or backward, which
    /// is discarded.
    Draining,
    /// `Done` was sent and the protocol has terminated
    Done,
}

pub enum Intersecting<B> {
    Blocks { start: Point, reply: NextBlocksReply<B> },
    Tip { reply: NetworkTipReply },
}

pub struct Fetching<B> {
    start: Point,
    remaining: usize,
    blocks: Vec<B>,
    reply: NextBlocksReply<B>,
}

/// The state after handling a message, and the message to send in response (if any)
pub type Transition<B> = (ChainSyncState<B>, Option<ChainSyncMessage<B>>);

impl<B> ChainSyncState<B> {
    pub fn agency(&self) -> Agency {
        use ChainSyncState::*;
        match self {
            Idle => Agency::Client,
            Intersect(_) | Next(_) | Draining => Agency::Server,
            Done => Agency::Nobody,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ChainSyncState::Idle)
    }

    /// Leave `Idle` to serve the given request. Returns the new state and the `FindIntersect` to send.
    ///
    /// A tip request asks for an intersection with no points at all. That can never be found, so the node always
    /// answers with its current tip.
    pub fn begin(request: ChainSyncRequest<B>) -> (Self, ChainSyncMessage<B>) {
        match request {
            ChainSyncRequest::NextBlocks { point, reply } => (
                ChainSyncState::Intersect(Intersecting::Blocks { start: point, reply }),
                ChainSyncMessage::FindIntersect(vec![point]),
            ),
            ChainSyncRequest::NetworkTip { reply } => (
                ChainSyncState::Intersect(Intersecting::Tip { reply }),
                ChainSyncMessage::FindIntersect(Vec::new()),
            ),
        }
    }

    /// Handle a message from the node. Every state with server agency must fully resolve the node's turn before the
    /// machine returns to `Idle`.
    pub fn transition(self, message: ChainSyncMessage<B>, batch_size: usize) -> Result<Transition<B>, ProtocolError> {
        use ChainSyncMessage::*;
        use ChainSyncState::*;
        match (self, message) {
            (Intersect(Intersecting::Blocks { start, reply }), IntersectionFound(point, tip)) => {
                debug!(
                    target: LOG_TARGET,
                    "Intersection found at {} (tip: {}). Fetching up to {} block(s)", point, tip, batch_size
                );
                Ok(Fetching::new(start, batch_size, reply).request_next())
            },
            (Intersect(Intersecting::Blocks { start, reply }), IntersectionNotFound(tip)) => {
                debug!(target: LOG_TARGET, "No intersection with {} (tip: {})", start, tip);
                send_reply(reply, Err(NextBlocksError::NoIntersection));
                Ok((Idle, None))
            },
            (Intersect(Intersecting::Tip { reply }), IntersectionNotFound(tip)) => {
                trace!(target: LOG_TARGET, "Network tip is {}", tip);
                send_reply(reply, tip.point);
                Ok((Idle, None))
            },
            (Intersect(Intersecting::Tip { reply }), IntersectionFound(point, tip)) => {
                warn!(
                    target: LOG_TARGET,
                    "Node reported intersection {} for an empty point set. Using tip {}", point, tip
                );
                send_reply(reply, tip.point);
                Ok((Idle, None))
            },
            (Next(mut fetching), RollForward(block, tip)) => {
                trace!(target: LOG_TARGET, "Roll forward (tip: {})", tip);
                fetching.blocks.push(block);
                fetching.remaining -= 1;
                Ok(fetching.request_next())
            },
            (Next(mut fetching), RollBackward(point, _)) if point == fetching.start => {
                trace!(
                    target: LOG_TARGET,
                    "Roll backward to the start of the batch {}. Discarding {} block(s)",
                    point,
                    fetching.blocks.len()
                );
                fetching.blocks.clear();
                Ok(fetching.request_next())
            },
            (Next(fetching), RollBackward(point, tip)) => {
                debug!(
                    target: LOG_TARGET,
                    "Node rolled back to {} (tip: {}) while fetching from {}", point, tip, fetching.start
                );
                send_reply(fetching.reply, Err(NextBlocksError::RollBack));
                Ok((Idle, None))
            },
            (Next(fetching), AwaitReply) => {
                debug!(
                    target: LOG_TARGET,
                    "Node is at its tip. Returning {} block(s) and draining the pending reply",
                    fetching.blocks.len()
                );
                send_reply(fetching.reply, Ok(fetching.blocks));
                Ok((Draining, None))
            },
            (Draining, msg @ RollForward(..)) | (Draining, msg @ RollBackward(..)) => {
                debug!(target: LOG_TARGET, "Discarded {} that arrived after AwaitReply", msg);
                Ok((Idle, None))
            },
            (state, msg) => Err(ProtocolError::UnexpectedMessage {
                protocol: "chain-sync",
                state: state.as_type_str(),
                message: msg.as_type_str(),
            }),
        }
    }

    pub fn as_type_str(&self) -> &'static str {
        use ChainSyncState::*;
        match self {
            Idle => "Idle",
            Intersect(_) => "Intersect",
            Next(_) => "Next",
            Draining => "Draining",
            Done => "Done",
        }
    }
}

impl<B> Display for ChainSyncState<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            ChainSyncState::Next(fetching) => write!(
                f,
                "Next(start = {}, {} block(s), {} remaining)",
                fetching.start,
                fetching.blocks.len(),
                fetching.remaining
            ),
            state => f.write_str(state.as_type_str()),
        }
    }
}

impl<B> Debug for ChainSyncState<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        Display::fmt(self, f)
    }
}

impl<B> Fetching<B> {
    fn new(start: Point, batch_size: usize, reply: NextBlocksReply<B>) -> Self {
        Self {
            start,
            remaining: batch_size,
            blocks: Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE)),
            reply,
        }
    }

    /// Ask for the next block, or answer the request once the batch is full
    fn request_next(self) -> Transition<B> {
        if self.remaining == 0 {
            debug!(target: LOG_TARGET, "Batch of {} block(s) complete", self.blocks.len());
            send_reply(self.reply, Ok(self.blocks));
            return (ChainSyncState::Idle, None);
        }
        (ChainSyncState::Next(self), Some(ChainSyncMessage::RequestNext))
    }
}

fn send_reply<T>(reply: oneshot::Sender<T>, value: T) {
    if reply.send(value).is_err() {
        debug!(
            target: LOG_TARGET,
            "Caller stopped waiting before the reply was delivered. The result is discarded."
        );
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::oneshot::error::TryRecvError;

    use super::*;
    use crate::chain::{HeaderHash, Tip};

    type Block = u32;

    fn point(n: u8) -> Point {
        Point::new(u64::from(n) * 10, HeaderHash::new([n; HeaderHash::LEN]))
    }

    fn tip() -> Tip {
        Tip::new(point(200), 2000)
    }

    fn next_blocks(start: Point) -> (ChainSyncState<Block>, oneshot::Receiver<Result<Vec<Block>, NextBlocksError>>) {
        let (reply, reply_rx) = oneshot::channel();
        let (state, msg) = ChainSyncState::begin(ChainSyncRequest::NextBlocks { point: start, reply });
        assert_eq!(msg, ChainSyncMessage::FindIntersect(vec![start]));
        (state, reply_rx)
    }

    /// Feeds the messages in order, asserting that the client asks for the next block after every message except the
    /// last one.
    fn feed(
        mut state: ChainSyncState<Block>,
        messages: Vec<ChainSyncMessage<Block>>,
        batch_size: usize,
    ) -> (ChainSyncState<Block>, Option<ChainSyncMessage<Block>>) {
        let mut last = None;
        let n = messages.len();
        for (i, msg) in messages.into_iter().enumerate() {
            let (next_state, reply) = state.transition(msg, batch_size).unwrap();
            if i + 1 < n {
                assert_eq!(reply, Some(ChainSyncMessage::RequestNext));
            }
            state = next_state;
            last = reply;
        }
        (state, last)
    }

    #[test]
    fn it_returns_a_full_batch_without_an_extra_round_trip() {
        use ChainSyncMessage::*;
        let (state, mut reply_rx) = next_blocks(point(0));
        let (state, last) = feed(
            state,
            vec![
                IntersectionFound(point(0), tip()),
                RollForward(1, tip()),
                RollForward(2, tip()),
                RollForward(3, tip()),
            ],
            3,
        );
        assert!(state.is_idle());
        assert_eq!(last, None);
        assert_eq!(reply_rx.try_recv().unwrap(), Ok(vec![1, 2, 3]));
    }

    #[test]
    fn it_absorbs_the_initial_rollback_to_the_start() {
        use ChainSyncMessage::*;
        let (state, mut reply_rx) = next_blocks(point(0));
        let (state, _) = feed(
            state,
            vec![
                IntersectionFound(point(0), tip()),
                RollBackward(point(0), tip()),
                RollForward(1, tip()),
            ],
            1,
        );
        assert!(state.is_idle());
        assert_eq!(reply_rx.try_recv().unwrap(), Ok(vec![1]));
    }

    #[test]
    fn it_resets_the_batch_on_every_rollback_to_the_start() {
        use ChainSyncMessage::*;
        let (state, mut reply_rx) = next_blocks(point(0));
        let (state, _) = feed(
            state,
            vec![
                IntersectionFound(point(0), tip()),
                RollBackward(point(0), tip()),
                RollForward(1, tip()),
                RollBackward(point(0), tip()),
                RollBackward(point(0), tip()),
                RollForward(2, tip()),
            ],
            2,
        );
        // The discarded block still counted against the batch
        assert!(state.is_idle());
        assert_eq!(reply_rx.try_recv().unwrap(), Ok(vec![2]));
    }

    #[test]
    fn it_reports_no_intersection() {
        let (state, mut reply_rx) = next_blocks(point(1));
        let (state, msg) = state
            .transition(ChainSyncMessage::IntersectionNotFound(tip()), DEFAULT_BATCH_SIZE)
            .unwrap();
        assert!(state.is_idle());
        assert_eq!(msg, None);
        assert_eq!(reply_rx.try_recv().unwrap(), Err(NextBlocksError::NoIntersection));
    }

    #[test]
    fn it_fails_on_a_rollback_elsewhere() {
        use ChainSyncMessage::*;
        let (state, mut reply_rx) = next_blocks(point(0));
        let (state, msg) = feed(
            state,
            vec![
                IntersectionFound(point(0), tip()),
                RollForward(1, tip()),
                RollForward(2, tip()),
                RollBackward(point(5), tip()),
            ],
            10,
        );
        assert!(state.is_idle());
        assert_eq!(msg, None);
        assert_eq!(reply_rx.try_recv().unwrap(), Err(NextBlocksError::RollBack));
    }

    #[test]
    fn it_returns_early_on_await_reply_and_drains_one_message() {
        use ChainSyncMessage::*;
        let (state, mut reply_rx) = next_blocks(point(0));
        let (state, msg) = feed(
            state,
            vec![IntersectionFound(point(0), tip()), RollForward(1, tip()), AwaitReply],
            10,
        );
        assert!(matches!(state, ChainSyncState::Draining));
        assert_eq!(state.agency(), Agency::Server);
        assert_eq!(msg, None);
        assert_eq!(reply_rx.try_recv().unwrap(), Ok(vec![1]));

        let (state, msg) = state.transition(RollForward(2, tip()), 10).unwrap();
        assert!(state.is_idle());
        assert_eq!(msg, None);
    }

    #[test]
    fn it_drains_a_rollback_after_await_reply() {
        let (state, msg) = ChainSyncState::<Block>::Draining
            .transition(ChainSyncMessage::RollBackward(point(3), tip()), 10)
            .unwrap();
        assert!(state.is_idle());
        assert_eq!(msg, None);
    }

    #[test]
    fn it_answers_an_empty_batch_immediately() {
        let (state, mut reply_rx) = next_blocks(point(0));
        let (state, msg) = state
            .transition(ChainSyncMessage::IntersectionFound(point(0), tip()), 0)
            .unwrap();
        assert!(state.is_idle());
        assert_eq!(msg, None);
        assert_eq!(reply_rx.try_recv().unwrap(), Ok(vec![]));
    }

    #[test]
    fn it_reads_the_tip_from_any_intersect_reply() {
        for msg in [
            ChainSyncMessage::IntersectionNotFound(tip()),
            ChainSyncMessage::IntersectionFound(point(1), tip()),
        ] {
            let (reply, mut reply_rx) = oneshot::channel();
            let (state, find) = ChainSyncState::<Block>::begin(ChainSyncRequest::NetworkTip { reply });
            assert_eq!(find, ChainSyncMessage::FindIntersect(vec![]));
            let (state, msg) = state.transition(msg, DEFAULT_BATCH_SIZE).unwrap();
            assert!(state.is_idle());
            assert_eq!(msg, None);
            assert_eq!(reply_rx.try_recv().unwrap(), tip().point);
        }
    }

    #[test]
    fn it_rejects_messages_that_are_illegal_in_the_current_state() {
        let (state, mut reply_rx) = next_blocks(point(0));
        let err = state
            .transition(ChainSyncMessage::RollForward(1, tip()), DEFAULT_BATCH_SIZE)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedMessage {
            state: "Intersect",
            message: "RollForward",
            ..
        }));
        // The reply sender was dropped with the state
        assert_eq!(reply_rx.try_recv().unwrap_err(), TryRecvError::Closed);

        let err = ChainSyncState::<Block>::Draining
            .transition(ChainSyncMessage::AwaitReply, DEFAULT_BATCH_SIZE)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedMessage { state: "Draining", .. }));
    }

    #[test]
    fn it_tolerates_a_caller_that_stopped_waiting() {
        let (state, reply_rx) = next_blocks(point(0));
        drop(reply_rx);
        let (state, _) = state
            .transition(ChainSyncMessage::IntersectionNotFound(tip()), DEFAULT_BATCH_SIZE)
            .unwrap();
        assert!(state.is_idle());
    }
}
