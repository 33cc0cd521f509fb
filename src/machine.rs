// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{
    Config, DataLog, Heartbeat, HeartbeatAck, IntersectionId, LogIndex, MergeLog, Membership,
    MessageChannels, NodeId, Report, Result, Term, TickTimer, VoteRequest, VoteResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, error, info, trace};

// The automaton is an explicit enum plus plain counters rather than anything
// async, for the same reason lattice participants are: the whole state has to
// be clonable and hashable so a model checker can snapshot and explore it.
//
// Every tick drains the inbound channels once, runs the handler of the
// current role and leaves replies in the outbound channels. A handler returns
// as soon as it changes role; whatever it had not yet looked at is gone with
// the channel clear that comes with every role change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Neutral,   // Not approaching any intersection.
    Follower,  // Replicating a leader's log, or waiting to hear from one.
    Candidate, // Asking the intersection for votes.
    Leader,    // Collecting reports and broadcasting the merged log.
}

/// Everything a tick consumes, taken from the channels in one go.
struct Inbox {
    heartbeats: Vec<Heartbeat>,
    heartbeat_acks: Vec<HeartbeatAck>,
    vote_requests: Vec<VoteRequest>,
    vote_responses: Vec<VoteResponse>,
}

impl Inbox {
    fn take<C: MessageChannels>(channels: &mut C) -> Self {
        Inbox {
            heartbeats: channels.take_heartbeats(),
            heartbeat_acks: channels.take_heartbeat_acks(),
            vote_requests: channels.take_vote_requests(),
            vote_responses: channels.take_vote_responses(),
        }
    }
}

/// `RoleStateMachine` is the consensus node of one aircraft. There is exactly
/// one per vehicle, owned by whatever drives the tick loop; all consensus
/// state lives in it.
///
/// Aircraft join and leave an intersection's group without any fixed member
/// list: a follower that has not heard from a leader announces itself with
/// probes, a leader learns members from their heartbeat acknowledgements and
/// a follower that loses its leader assumes the leader left, runs for
/// election and starts over with one member fewer.
///
/// The only entry points that change the state are `tick` and the client
/// bridge methods `ingest_own_report` and `set_target_intersection`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RoleStateMachine {
    id: NodeId,
    config: Config,

    role: Role,
    intersection: Option<IntersectionId>,
    leader_id: Option<NodeId>,
    term: Term,
    voted_term: Option<Term>,
    votes_received: usize,
    election_initiated: bool,
    neutral_follower: bool,

    // Membership and its merged reports.
    total_nodes: usize,
    members: Membership,
    log: MergeLog,
    log_index: LogIndex,

    heartbeat_timer: TickTimer,
    election_timer: TickTimer,
    leader_timer: TickTimer,

    // Client side.
    pub(crate) own_report: Report,
    pub(crate) published: DataLog,
}

impl RoleStateMachine {
    /// Builds a Neutral node. Fails if any period in `config` is zero.
    pub fn new(id: NodeId, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(RoleStateMachine::fresh(id, config))
    }

    fn fresh(id: NodeId, config: Config) -> Self {
        let timing = config.timing;
        RoleStateMachine {
            id,
            config,

            role: Role::Neutral,
            intersection: None,
            leader_id: None,
            term: 0,
            voted_term: None,
            votes_received: 0,
            election_initiated: false,
            neutral_follower: true,

            total_nodes: 0,
            members: Membership::new(),
            log: MergeLog::default(),
            log_index: 0,

            heartbeat_timer: TickTimer::new(timing.follower_timeout_ticks),
            election_timer: TickTimer::new(timing.candidate_retry_ticks),
            leader_timer: TickTimer::new(timing.leader_heartbeat_interval_ticks),

            own_report: Report::unassigned(id),
            published: DataLog::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn intersection(&self) -> Option<IntersectionId> {
        self.intersection
    }

    pub fn leader_id(&self) -> Option<NodeId> {
        self.leader_id
    }

    pub fn term(&self) -> Term {
        self.term
    }

    pub fn voted_term(&self) -> Option<Term> {
        self.voted_term
    }

    pub fn votes_received(&self) -> usize {
        self.votes_received
    }

    pub fn total_nodes(&self) -> usize {
        self.total_nodes
    }

    pub fn members(&self) -> &Membership {
        &self.members
    }

    pub fn log(&self) -> &MergeLog {
        &self.log
    }

    pub fn log_index(&self) -> LogIndex {
        self.log_index
    }

    pub fn is_neutral_follower(&self) -> bool {
        self.role == Role::Follower && self.neutral_follower
    }

    /// Points the node at `intersection`, or at nothing. Losing the target
    /// drops every piece of consensus state and returns the node to Neutral.
    pub fn set_target_intersection(&mut self, intersection: Option<IntersectionId>) {
        match intersection {
            Some(id) => {
                if self.intersection != Some(id) {
                    debug!("node {} targets intersection {}", self.id, id);
                }
                self.intersection = Some(id);
            }
            None => self.reset(),
        }
    }

    fn reset(&mut self) {
        if self.role != Role::Neutral {
            info!("node {} left intersection {:?}, NEUTRAL", self.id, self.intersection);
        }
        let own_report = self.own_report;
        *self = RoleStateMachine::fresh(self.id, self.config);
        self.own_report = own_report;
    }

    /// Advances the automaton by one tick: consumes the inbound channels,
    /// runs the handler of the current role and queues outbound messages.
    ///
    /// `now` only stamps the log output; all timing is counted in ticks.
    pub fn tick<C: MessageChannels>(&mut self, now: f64, channels: &mut C) -> Result<()> {
        let span = debug_span!("tick", node = self.id, now);
        let _enter = span.enter();
        let inbox = Inbox::take(channels);
        let res = match self.role {
            Role::Neutral => {
                self.neutral();
                Ok(())
            }
            Role::Follower => self.follower(inbox, channels),
            Role::Candidate => {
                self.candidate(inbox, channels);
                Ok(())
            }
            Role::Leader => self.leader(inbox, channels),
        };
        if let Err(e) = &res {
            error!("node {} as {:?}: {}", self.id, self.role, e);
        }
        res
    }

    fn transition<C: MessageChannels>(&mut self, role: Role, channels: &mut C) {
        info!(
            "node {} intersection {:?} term {} {:?} -> {:?}",
            self.id, self.intersection, self.term, self.role, role
        );
        self.role = role;
        channels.clear();
    }

    fn publish_to_client(&mut self) {
        self.log.intersection_id = self.intersection;
        self.log.total_nodes = self.total_nodes;
        self.published = DataLog {
            intersection_id: self.intersection,
            role: self.role,
            total_nodes: self.total_nodes,
            log: self.log,
        };
        debug!("node {} publish {}", self.id, self.published);
    }

    fn neutral(&mut self) {
        if self.intersection.is_none() {
            return;
        }
        info!(
            "node {} intersection {:?} {:?} -> {:?}",
            self.id,
            self.intersection,
            self.role,
            Role::Follower
        );
        // The heartbeat timer is still fresh at 0, so a node that just joined
        // stands for election on its first Follower tick.
        self.role = Role::Follower;
        self.neutral_follower = true;
        self.total_nodes = 1;
        self.members.clear();
        self.members.set_first(self.id);
        self.publish_to_client();
    }

    fn follower<C: MessageChannels>(&mut self, inbox: Inbox, channels: &mut C) -> Result<()> {
        let intersection = match self.intersection {
            Some(i) => i,
            None => return Ok(()),
        };

        if self.heartbeat_timer.expired() {
            // A silent leader is assumed to have left the intersection.
            if self.total_nodes > 1 && !self.neutral_follower {
                self.total_nodes -= 1;
                if let Some(leader) = self.leader_id.take() {
                    self.members.remove(leader);
                }
            }
            debug!("node {} heard no heartbeat, standing for election", self.id);
            self.election_initiated = false;
            self.transition(Role::Candidate, channels);
            return Ok(());
        }

        if self.neutral_follower
            && self
                .heartbeat_timer
                .every(self.config.timing.neutral_probe_interval_ticks)
        {
            trace!("node {} probes intersection {}", self.id, intersection);
            channels.send_heartbeat_ack(HeartbeatAck {
                intersection_id: intersection,
                follower_id: self.id,
                log_index: None,
                node_data: self.own_report,
            });
        }

        for hb in inbox.heartbeats {
            if hb.intersection_id != intersection {
                continue;
            }
            trace!(
                "node {} recv heartbeat #{} from leader {} term {}",
                self.id,
                hb.log_index,
                hb.leader_id,
                hb.term
            );
            self.heartbeat_timer.restart();
            self.neutral_follower = false;
            self.term = hb.term;
            self.total_nodes = hb.total_nodes;
            self.leader_id = Some(hb.leader_id);
            self.log = hb.log;
            self.members = Membership::from_log(&self.log);
            channels.send_heartbeat_ack(HeartbeatAck {
                intersection_id: intersection,
                follower_id: self.id,
                log_index: Some(hb.log_index),
                node_data: self.own_report,
            });
            self.publish_to_client();
        }

        for ack in inbox.heartbeat_acks {
            if ack.intersection_id != intersection
                || !ack.is_probe()
                || ack.follower_id == self.id
                || self.members.contains(ack.follower_id)
            {
                continue;
            }
            self.members.push(ack.follower_id, intersection)?;
            self.total_nodes += 1;
            debug!(
                "node {} discovered neutral follower {}, {} nodes",
                self.id, ack.follower_id, self.total_nodes
            );
        }

        for req in inbox.vote_requests {
            if req.intersection_id != intersection {
                continue;
            }
            // One vote per term. Refusing older terms as well keeps that true
            // after a later vote has moved `voted_term` on.
            if self.voted_term.map_or(false, |voted| req.term <= voted) {
                trace!(
                    "node {} already voted in term {:?}, ignoring {}",
                    self.id,
                    self.voted_term,
                    req.candidate_id
                );
                continue;
            }
            debug!(
                "node {} votes for {} in term {}",
                self.id, req.candidate_id, req.term
            );
            channels.send_vote_response(VoteResponse {
                intersection_id: intersection,
                candidate_id: req.candidate_id,
                term: req.term,
            });
            self.voted_term = Some(req.term);
        }

        self.heartbeat_timer.advance();
        Ok(())
    }

    fn candidate<C: MessageChannels>(&mut self, inbox: Inbox, channels: &mut C) {
        let intersection = match self.intersection {
            Some(i) => i,
            None => return,
        };

        if self.total_nodes <= 1 {
            self.become_leader(channels);
            return;
        }

        if !self.election_initiated {
            self.election_initiated = true;
            self.election_timer.restart();
            // A term this node already gave its vote away in is not ours to run in.
            self.term = self.term.max(self.voted_term.unwrap_or(0)) + 1;
            self.voted_term = Some(self.term);
            self.votes_received = 1;
            debug!(
                "node {} requests votes for term {} from {} nodes",
                self.id, self.term, self.total_nodes
            );
            channels.send_vote_request(VoteRequest {
                intersection_id: intersection,
                candidate_id: self.id,
                term: self.term,
            });
        }

        if self.election_timer.expired() {
            debug!("node {} election for term {} timed out", self.id, self.term);
            self.election_initiated = false;
            self.heartbeat_timer.restart();
            self.transition(Role::Follower, channels);
            return;
        }

        if let Some(hb) = inbox.heartbeats.first() {
            debug!(
                "node {} sees leader {} at intersection {}, stands down",
                self.id, hb.leader_id, hb.intersection_id
            );
            self.election_initiated = false;
            self.heartbeat_timer.restart();
            self.transition(Role::Follower, channels);
            return;
        }

        for vote in inbox.vote_responses {
            if vote.candidate_id != self.id || vote.term != self.term {
                continue;
            }
            self.votes_received += 1;
            trace!(
                "node {} has {} of {} votes",
                self.id,
                self.votes_received,
                self.total_nodes
            );
            if self.votes_received > self.total_nodes / 2 {
                self.become_leader(channels);
                return;
            }
        }

        self.election_timer.advance();
    }

    fn become_leader<C: MessageChannels>(&mut self, channels: &mut C) {
        self.election_initiated = false;
        self.leader_id = Some(self.id);
        self.log.clear();
        self.members.clear();
        self.members.set_first(self.id);
        self.total_nodes = 1;
        self.leader_timer.restart();
        self.transition(Role::Leader, channels);
    }

    fn step_down<C: MessageChannels>(&mut self, leader: NodeId, channels: &mut C) {
        self.leader_id = Some(leader);
        self.voted_term = None;
        self.votes_received = 0;
        self.neutral_follower = false;
        self.heartbeat_timer.restart();
        self.transition(Role::Follower, channels);
    }

    fn leader<C: MessageChannels>(&mut self, inbox: Inbox, channels: &mut C) -> Result<()> {
        let intersection = match self.intersection {
            Some(i) => i,
            None => return Ok(()),
        };

        if self.leader_timer.expired() {
            self.members.set_first(self.id);
            self.log.set(0, self.own_report)?;
            self.log.retain_members(&self.members);
            self.log_index += 1;
            self.publish_to_client();
            trace!("node {} send heartbeat #{}", self.id, self.log_index);
            channels.send_heartbeat(Heartbeat {
                intersection_id: intersection,
                leader_id: self.id,
                total_nodes: self.total_nodes,
                log_index: self.log_index,
                term: self.term,
                log: self.log,
            });
        }

        for hb in inbox.heartbeats {
            if hb.intersection_id != intersection || hb.leader_id == self.id {
                continue;
            }
            if hb.term > self.term {
                info!(
                    "node {} sees leader {} with higher term {} > {}",
                    self.id, hb.leader_id, hb.term, self.term
                );
                self.step_down(hb.leader_id, channels);
                return Ok(());
            } else if hb.leader_id < self.id {
                info!(
                    "node {} yields to elder leader {} (term {} vs {})",
                    self.id, hb.leader_id, hb.term, self.term
                );
                self.step_down(hb.leader_id, channels);
                return Ok(());
            }
        }

        for ack in inbox.heartbeat_acks {
            if ack.intersection_id != intersection || ack.follower_id == self.id {
                continue;
            }
            match self.members.position(ack.follower_id) {
                Some(slot) => self.log.set(slot, ack.node_data)?,
                None => {
                    let slot = self.members.push(ack.follower_id, intersection)?;
                    self.log.set(slot, ack.node_data)?;
                    self.total_nodes += 1;
                    debug!(
                        "node {} adds {} to intersection {}, {} nodes",
                        self.id, ack.follower_id, intersection, self.total_nodes
                    );
                }
            }
        }

        self.leader_timer.advance();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn zero_period_is_refused() {
        let timing = Timing {
            follower_timeout_ticks: 0,
            ..Timing::default()
        };
        assert_eq!(
            RoleStateMachine::new(1, Config { timing }).err(),
            Some(Error::InvalidTiming("follower_timeout_ticks"))
        );
    }

    #[test]
    fn listening_neutral_follower_announces_itself() {
        let mut m = RoleStateMachine::new(1, Config::default()).unwrap();
        let mut pipes = Pipes::new();
        m.ingest_own_report(Report {
            aircraft_id: 1,
            intersection_id: 5,
            ..Report::default()
        });
        m.tick(0.0, &mut pipes).unwrap();
        assert!(m.is_neutral_follower());
        // Past the first Follower tick, as after a failed election.
        m.heartbeat_timer.restart();

        let mut announced = vec![];
        for t in 1..FOLLOWER_TIMEOUT_TICKS {
            m.tick(t as f64, &mut pipes).unwrap();
            for msg in pipes.drain_outbound() {
                match msg {
                    Message::HeartbeatAck(a) => {
                        assert!(a.is_probe());
                        assert_eq!(a.follower_id, 1);
                        announced.push(t);
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
        }
        assert_eq!(announced, vec![3, 6, 9, 12, 15, 18]);
        assert_eq!(m.role(), Role::Follower);
    }
}
