// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Identity of an aircraft, and of the consensus node running on it.
pub type NodeId = u32;

/// Identity of a ground intersection aircraft merge at.
pub type IntersectionId = u32;

/// `Report` is the unit of replication: the merge-relevant state of one
/// aircraft. The vehicle's own `Report` is replaced every tick by the client;
/// everyone else's arrives through heartbeat acknowledgements (at the leader)
/// or heartbeats (at followers).
///
/// Arrival times are whole seconds; the early/current/late estimates are the
/// times of arrival at the intersection flying at maximum, current and minimum
/// feasible speed. `zone_status` is opaque to this crate and only interpreted
/// by the scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Report {
    pub aircraft_id: NodeId,
    /// Negative when the aircraft is not heading for any intersection.
    pub intersection_id: i32,
    pub early_arrival_time: u32,
    pub current_arrival_time: u32,
    pub late_arrival_time: u32,
    pub schedules_computed: u32,
    pub zone_status: u8,
}

impl Report {
    /// A report for an aircraft that is not approaching any intersection.
    pub fn unassigned(aircraft_id: NodeId) -> Self {
        Report {
            aircraft_id,
            intersection_id: -1,
            ..Report::default()
        }
    }

    /// The intersection this report targets, if any.
    pub fn intersection(&self) -> Option<IntersectionId> {
        IntersectionId::try_from(self.intersection_id).ok()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "< intersection: {}, zone: {}, a/c id: {}, arrival time: {} >",
            self.intersection_id, self.zone_status, self.aircraft_id, self.current_arrival_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_intersection_means_no_target() {
        let mut r = Report::unassigned(7);
        assert_eq!(r.intersection(), None);
        r.intersection_id = 0;
        assert_eq!(r.intersection(), Some(0));
        r.intersection_id = -42;
        assert_eq!(r.intersection(), None);
    }
}
