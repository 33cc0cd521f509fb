// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

/*!
 * This crate implements the consensus core aircraft use to coordinate at a
 * merge point: a ground intersection several vehicles have to cross in
 * sequence. The aircraft converging on one intersection elect a leader among
 * themselves, and the leader gathers everyone's arrival-time estimates into a
 * merged log which it replicates back to all of them, so every vehicle's
 * scheduler works from the same picture.
 *
 * The protocol is a cut-down relative of Raft with some unusual properties:
 *
 *   - There is no membership list. The set of participants changes all the
 *     time as aircraft approach and leave; a leader learns its members from
 *     their acknowledgements, followers that have no leader find each other
 *     with probes, and a leader that goes quiet is assumed to have left.
 *
 *   - The replicated "log" is not a history of commands but a snapshot: one
 *     `Report` per member, overwritten in place, resent whole in every
 *     heartbeat.
 *
 *   - Time is counted in ticks. The node is a plain state machine stepped by
 *     its owner at a fixed cadence, consuming inbound messages and producing
 *     outbound ones through `MessageChannels`; there are no internal timers,
 *     threads or callbacks.
 *
 * Participants are assumed honest but unreliable: messages get lost and
 * aircraft vanish, nobody lies.
 *
 * Moving messages between aircraft is up to the embedding application;
 * `Pipes` is an in-memory `MessageChannels` a transport adapter can fill
 * and drain, and `Swarm` is a complete in-process broadcast network for
 * simulation and testing.
 */

mod channels;
mod client;
mod config;
mod error;
mod log;
mod machine;
mod message;
mod network;
mod report;
mod timer;

#[cfg(test)]
mod stateright_tests;

pub use channels::{MessageChannels, Pipes};
pub use client::DataLog;
pub use config::{
    Config, Timing, CANDIDATE_RETRY_TICKS, FOLLOWER_TIMEOUT_TICKS, LEADER_HEARTBEAT_INTERVAL_TICKS,
    NEUTRAL_PROBE_INTERVAL_TICKS,
};
pub use error::{Error, Result};
pub use log::{Membership, MergeLog, MAX_NODES};
pub use machine::{Role, RoleStateMachine};
pub use message::{Heartbeat, HeartbeatAck, LogIndex, Message, Term, VoteRequest, VoteResponse};
pub use network::{Aircraft, Swarm};
pub use report::{IntersectionId, NodeId, Report};
pub use timer::TickTimer;
