// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{Heartbeat, HeartbeatAck, Message, VoteRequest, VoteResponse};
use std::collections::VecDeque;

/// The state machine's only view of the network: one inbound and one
/// outbound FIFO per message type.
///
/// Moving bytes between aircraft is left to the implementor. The state
/// machine never blocks on these calls; a `take_*` call hands over exactly
/// what was queued when it was made.
pub trait MessageChannels {
    fn take_heartbeats(&mut self) -> Vec<Heartbeat>;
    fn take_heartbeat_acks(&mut self) -> Vec<HeartbeatAck>;
    fn take_vote_requests(&mut self) -> Vec<VoteRequest>;
    fn take_vote_responses(&mut self) -> Vec<VoteResponse>;

    fn send_heartbeat(&mut self, msg: Heartbeat);
    fn send_heartbeat_ack(&mut self, msg: HeartbeatAck);
    fn send_vote_request(&mut self, msg: VoteRequest);
    fn send_vote_response(&mut self, msg: VoteResponse);

    /// Drops everything queued in either direction. Called on every role
    /// change, so nothing addressed to the old role survives it.
    fn clear(&mut self);
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
struct Queues {
    heartbeats: VecDeque<Heartbeat>,
    heartbeat_acks: VecDeque<HeartbeatAck>,
    vote_requests: VecDeque<VoteRequest>,
    vote_responses: VecDeque<VoteResponse>,
}

impl Queues {
    fn push(&mut self, msg: Message) {
        match msg {
            Message::Heartbeat(m) => self.heartbeats.push_back(m),
            Message::HeartbeatAck(m) => self.heartbeat_acks.push_back(m),
            Message::VoteRequest(m) => self.vote_requests.push_back(m),
            Message::VoteResponse(m) => self.vote_responses.push_back(m),
        }
    }

    // Heartbeat traffic first, then votes, each queue in FIFO order.
    fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.heartbeats.drain(..).map(Message::from));
        out.extend(self.heartbeat_acks.drain(..).map(Message::from));
        out.extend(self.vote_requests.drain(..).map(Message::from));
        out.extend(self.vote_responses.drain(..).map(Message::from));
        out
    }

    fn len(&self) -> usize {
        self.heartbeats.len()
            + self.heartbeat_acks.len()
            + self.vote_requests.len()
            + self.vote_responses.len()
    }

    fn clear(&mut self) {
        self.heartbeats.clear();
        self.heartbeat_acks.clear();
        self.vote_requests.clear();
        self.vote_responses.clear();
    }
}

/// In-memory `MessageChannels`: what a transport adapter pushes in with
/// `deliver`, the state machine takes; what the state machine sends, the
/// adapter collects with `drain_outbound`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pipes {
    inbound: Queues,
    outbound: Queues,
}

impl Pipes {
    pub fn new() -> Self {
        Pipes::default()
    }

    pub fn deliver<M: Into<Message>>(&mut self, msg: M) {
        self.inbound.push(msg.into());
    }

    pub fn drain_outbound(&mut self) -> Vec<Message> {
        self.outbound.drain()
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }
}

impl MessageChannels for Pipes {
    fn take_heartbeats(&mut self) -> Vec<Heartbeat> {
        self.inbound.heartbeats.drain(..).collect()
    }

    fn take_heartbeat_acks(&mut self) -> Vec<HeartbeatAck> {
        self.inbound.heartbeat_acks.drain(..).collect()
    }

    fn take_vote_requests(&mut self) -> Vec<VoteRequest> {
        self.inbound.vote_requests.drain(..).collect()
    }

    fn take_vote_responses(&mut self) -> Vec<VoteResponse> {
        self.inbound.vote_responses.drain(..).collect()
    }

    fn send_heartbeat(&mut self, msg: Heartbeat) {
        self.outbound.heartbeats.push_back(msg);
    }

    fn send_heartbeat_ack(&mut self, msg: HeartbeatAck) {
        self.outbound.heartbeat_acks.push_back(msg);
    }

    fn send_vote_request(&mut self, msg: VoteRequest) {
        self.outbound.vote_requests.push_back(msg);
    }

    fn send_vote_response(&mut self, msg: VoteResponse) {
        self.outbound.vote_responses.push_back(msg);
    }

    fn clear(&mut self) {
        self.inbound.clear();
        self.outbound.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Report;

    fn vote(term: u64) -> VoteRequest {
        VoteRequest {
            intersection_id: 1,
            candidate_id: 2,
            term,
        }
    }

    #[test]
    fn take_hands_over_queue_in_fifo_order() {
        let mut p = Pipes::new();
        p.deliver(vote(1));
        p.deliver(vote(2));
        assert_eq!(p.take_vote_requests(), vec![vote(1), vote(2)]);
        assert!(p.take_vote_requests().is_empty());
    }

    #[test]
    fn outbound_drains_heartbeat_traffic_before_votes() {
        let mut p = Pipes::new();
        p.send_vote_request(vote(3));
        let ack = HeartbeatAck {
            intersection_id: 1,
            follower_id: 4,
            log_index: None,
            node_data: Report::unassigned(4),
        };
        p.send_heartbeat_ack(ack);
        assert_eq!(p.outbound_len(), 2);
        assert_eq!(
            p.drain_outbound(),
            vec![Message::HeartbeatAck(ack), Message::VoteRequest(vote(3))]
        );
        assert_eq!(p.outbound_len(), 0);
    }

    #[test]
    fn clear_empties_both_directions() {
        let mut p = Pipes::new();
        p.deliver(vote(1));
        p.send_vote_request(vote(1));
        p.clear();
        assert_eq!(p.inbound_len(), 0);
        assert_eq!(p.outbound_len(), 0);
    }
}
