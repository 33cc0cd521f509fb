// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::{Error, IntersectionId, NodeId, Report, Result};
use im::Vector;
use serde::{Deserialize, Serialize};

/// Number of aircraft one intersection can hold.
pub const MAX_NODES: usize = 10;

/// `MergeLog` is the leader's table of every participant's `Report` at one
/// intersection. It travels whole in every heartbeat, so followers always
/// hold a full copy of the leader's latest view.
///
/// Slot `i` holds the report of the `i`th member; a slot with no member is
/// empty. When a node leads, slot 0 is its own report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MergeLog {
    pub intersection_id: Option<IntersectionId>,
    pub total_nodes: usize,
    slots: [Option<Report>; MAX_NODES],
}

impl Default for MergeLog {
    fn default() -> Self {
        MergeLog {
            intersection_id: None,
            total_nodes: 0,
            slots: [None; MAX_NODES],
        }
    }
}

impl MergeLog {
    pub fn new(intersection_id: Option<IntersectionId>) -> Self {
        MergeLog {
            intersection_id,
            ..MergeLog::default()
        }
    }

    pub fn capacity(&self) -> usize {
        MAX_NODES
    }

    pub fn get(&self, slot: usize) -> Option<&Report> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    pub fn set(&mut self, slot: usize, report: Report) -> Result<()> {
        let intersection = self.intersection_id.unwrap_or_default();
        match self.slots.get_mut(slot) {
            Some(s) => {
                *s = Some(report);
                Ok(())
            }
            None => Err(Error::CapacityExceeded {
                capacity: MAX_NODES,
                intersection,
            }),
        }
    }

    pub fn clear(&mut self) {
        self.slots = [None; MAX_NODES];
    }

    /// Empties every slot that no current member backs.
    pub fn retain_members(&mut self, members: &Membership) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if i >= members.len() {
                *slot = None;
            }
        }
    }

    /// The occupied slots, in slot order.
    pub fn reports(&self) -> impl Iterator<Item = &Report> + '_ {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Aircraft ids of the occupied slots, in slot order.
    pub fn aircraft_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.reports().map(|r| r.aircraft_id)
    }
}

/// The ordered set of nodes known to take part at an intersection. A
/// member's position is the log slot its report lives in.
///
/// Membership is bounded by `MAX_NODES`: overflowing it is a configuration
/// fault, never a silent overwrite.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Membership {
    ids: Vector<NodeId>,
}

impl Membership {
    pub fn new() -> Self {
        Membership::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.ids.index_of(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.ids.iter()
    }

    /// Appends `id` and returns its slot.
    pub fn push(&mut self, id: NodeId, intersection: IntersectionId) -> Result<usize> {
        if self.ids.len() >= MAX_NODES {
            return Err(Error::CapacityExceeded {
                capacity: MAX_NODES,
                intersection,
            });
        }
        self.ids.push_back(id);
        Ok(self.ids.len() - 1)
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        match self.position(id) {
            Some(i) => {
                self.ids.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Makes `id` the first member, the slot a leader writes its own report to.
    pub fn set_first(&mut self, id: NodeId) {
        match self.ids.front_mut() {
            Some(first) => *first = id,
            None => self.ids.push_back(id),
        }
    }

    /// Rebuilds membership from the occupied slots of a log.
    pub fn from_log(log: &MergeLog) -> Self {
        Membership {
            ids: log.aircraft_ids().collect(),
        }
    }
}
