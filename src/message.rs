// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{IntersectionId, MergeLog, NodeId, Report};
use serde::{Deserialize, Serialize};

/// Election epoch.
pub type Term = u64;

/// Sequence number of a leader's heartbeats.
pub type LogIndex = u64;

/// Broadcast by a leader every heartbeat interval, carrying its full log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Heartbeat {
    pub intersection_id: IntersectionId,
    pub leader_id: NodeId,
    pub total_nodes: usize,
    pub log_index: LogIndex,
    pub term: Term,
    pub log: MergeLog,
}

/// A follower's answer to a heartbeat, carrying the follower's own report.
///
/// A follower that has not yet heard from any leader sends acknowledgements
/// with no `log_index` at all: these are discovery probes, announcing the
/// node to whoever is listening rather than acknowledging log data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeartbeatAck {
    pub intersection_id: IntersectionId,
    pub follower_id: NodeId,
    pub log_index: Option<LogIndex>,
    pub node_data: Report,
}

impl HeartbeatAck {
    pub fn is_probe(&self) -> bool {
        self.log_index.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoteRequest {
    pub intersection_id: IntersectionId,
    pub candidate_id: NodeId,
    pub term: Term,
}

/// A vote for `candidate_id` in `term`. Only positive votes are ever sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoteResponse {
    pub intersection_id: IntersectionId,
    pub candidate_id: NodeId,
    pub term: Term,
}

/// Any of the four protocol messages, for transports that carry them
/// over a single link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Message {
    Heartbeat(Heartbeat),
    HeartbeatAck(HeartbeatAck),
    VoteRequest(VoteRequest),
    VoteResponse(VoteResponse),
}

impl Message {
    pub fn intersection_id(&self) -> IntersectionId {
        match self {
            Message::Heartbeat(m) => m.intersection_id,
            Message::HeartbeatAck(m) => m.intersection_id,
            Message::VoteRequest(m) => m.intersection_id,
            Message::VoteResponse(m) => m.intersection_id,
        }
    }
}

impl From<Heartbeat> for Message {
    fn from(m: Heartbeat) -> Self {
        Message::Heartbeat(m)
    }
}

impl From<HeartbeatAck> for Message {
    fn from(m: HeartbeatAck) -> Self {
        Message::HeartbeatAck(m)
    }
}

impl From<VoteRequest> for Message {
    fn from(m: VoteRequest) -> Self {
        Message::VoteRequest(m)
    }
}

impl From<VoteResponse> for Message {
    fn from(m: VoteResponse) -> Self {
        Message::VoteResponse(m)
    }
}
