// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{Config, Message, NodeId, Pipes, Report, Result, RoleStateMachine};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// One aircraft in a `Swarm`: its consensus node and the pipes it talks
/// through.
#[derive(Clone, Debug)]
pub struct Aircraft {
    pub machine: RoleStateMachine,
    pub pipes: Pipes,
}

/// `Swarm` is an in-memory broadcast medium for a group of aircraft, the
/// simplest transport adapter there is: after an aircraft ticks, everything
/// it sent is copied into the inbound pipes of every other aircraft.
///
/// Aircraft tick in ascending id order, so a message sent by a lower id is
/// seen by higher ids in the same round and by lower ids one round later.
/// A muted aircraft keeps ticking but nothing it sends is delivered.
#[derive(Clone, Debug, Default)]
pub struct Swarm {
    aircraft: BTreeMap<NodeId, Aircraft>,
    muted: BTreeSet<NodeId>,
    rounds: u64,
}

impl Swarm {
    pub fn new() -> Self {
        Swarm::default()
    }

    pub fn add(&mut self, id: NodeId, config: Config) -> Result<()> {
        let aircraft = Aircraft {
            machine: RoleStateMachine::new(id, config)?,
            pipes: Pipes::new(),
        };
        self.aircraft.insert(id, aircraft);
        Ok(())
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Aircraft> {
        self.muted.remove(&id);
        self.aircraft.remove(&id)
    }

    pub fn mute(&mut self, id: NodeId) {
        self.muted.insert(id);
    }

    pub fn unmute(&mut self, id: NodeId) {
        self.muted.remove(&id);
    }

    pub fn get(&self, id: NodeId) -> Option<&RoleStateMachine> {
        self.aircraft.get(&id).map(|a| &a.machine)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.aircraft.keys().copied()
    }

    pub fn machines(&self) -> impl Iterator<Item = &RoleStateMachine> + '_ {
        self.aircraft.values().map(|a| &a.machine)
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Hands every aircraft its report for this round.
    pub fn ingest<F>(&mut self, mut report_for: F)
    where
        F: FnMut(NodeId) -> Report,
    {
        for (id, a) in self.aircraft.iter_mut() {
            a.machine.ingest_own_report(report_for(*id));
        }
    }

    /// Ticks every aircraft once, delivering each one's output before the
    /// next aircraft ticks.
    pub fn round(&mut self) -> Result<()> {
        let now = self.rounds as f64;
        let ids: Vec<NodeId> = self.aircraft.keys().copied().collect();
        for id in ids {
            let outbound = match self.aircraft.get_mut(&id) {
                Some(a) => {
                    a.machine.tick(now, &mut a.pipes)?;
                    a.pipes.drain_outbound()
                }
                None => continue,
            };
            if self.muted.contains(&id) {
                continue;
            }
            self.broadcast(id, &outbound);
        }
        self.rounds += 1;
        Ok(())
    }

    fn broadcast(&mut self, from: NodeId, msgs: &[Message]) {
        for (to, a) in self.aircraft.iter_mut() {
            if *to == from {
                continue;
            }
            for msg in msgs {
                trace!("{} -> {}: {:?}", from, to, msg);
                a.pipes.deliver(*msg);
            }
        }
    }
}
