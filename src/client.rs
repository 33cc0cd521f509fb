// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! The client bridge: how the vehicle's scheduler talks to its consensus
//! node. Once per tick the scheduler hands in the vehicle's own `Report`
//! and, after the tick, reads back the merged view of the intersection.

use crate::{IntersectionId, MergeLog, Report, Role, RoleStateMachine};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{trace, warn};

/// What the scheduler gets to see: the node's role and its latest copy of
/// the merged log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataLog {
    pub intersection_id: Option<IntersectionId>,
    pub role: Role,
    pub total_nodes: usize,
    pub log: MergeLog,
}

impl Default for DataLog {
    fn default() -> Self {
        DataLog {
            intersection_id: None,
            role: Role::Neutral,
            total_nodes: 0,
            log: MergeLog::default(),
        }
    }
}

impl DataLog {
    pub fn reports(&self) -> impl Iterator<Item = &Report> + '_ {
        self.log.reports()
    }
}

impl fmt::Display for DataLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} at {:?} with {} nodes | {}",
            self.role,
            self.intersection_id,
            self.total_nodes,
            self.reports().join(" ")
        )
    }
}

impl RoleStateMachine {
    /// Takes the vehicle's latest report. Its intersection becomes the
    /// node's target; a report for no intersection puts the node back to
    /// Neutral with all consensus state forgotten.
    pub fn ingest_own_report(&mut self, mut report: Report) {
        if report.aircraft_id != self.id() {
            warn!(
                "node {} got a report for aircraft {}, relabelling",
                self.id(),
                report.aircraft_id
            );
            report.aircraft_id = self.id();
        }
        trace!(
            "node {} client data: intersection {}, schedules {}, zone {}, arrival {}",
            self.id(),
            report.intersection_id,
            report.schedules_computed,
            report.zone_status,
            report.current_arrival_time
        );
        self.own_report = report;
        self.set_target_intersection(report.intersection());
    }

    /// The merged log as of the last time this node published it: on
    /// joining an intersection, on each heartbeat received as a follower
    /// and on each heartbeat sent as a leader.
    pub fn publish(&self) -> DataLog {
        self.published
    }

    pub fn own_report(&self) -> &Report {
        &self.own_report
    }
}

#[cfg(test)]
mod tests {
    use crate::*;

    fn report(id: NodeId, intersection: i32) -> Report {
        Report {
            aircraft_id: id,
            intersection_id: intersection,
            early_arrival_time: 100,
            current_arrival_time: 120,
            late_arrival_time: 150,
            schedules_computed: 1,
            zone_status: 0,
        }
    }

    #[test]
    fn report_sets_target_and_publishes_on_join() {
        let mut m = RoleStateMachine::new(4, Config::default()).unwrap();
        let mut pipes = Pipes::new();
        m.ingest_own_report(report(4, 2));
        assert_eq!(m.intersection(), Some(2));
        assert_eq!(m.publish(), DataLog::default());

        m.tick(0.0, &mut pipes).unwrap();
        let published = m.publish();
        assert_eq!(published.role, Role::Follower);
        assert_eq!(published.intersection_id, Some(2));
        assert_eq!(published.total_nodes, 1);
    }

    #[test]
    fn negative_intersection_resets_everything() {
        let mut m = RoleStateMachine::new(4, Config::default()).unwrap();
        let mut pipes = Pipes::new();
        m.ingest_own_report(report(4, 2));
        let mut t = 0;
        while m.role() != Role::Leader && t < 30 {
            m.tick(t as f64, &mut pipes).unwrap();
            t += 1;
        }
        assert_eq!(m.role(), Role::Leader);
        assert_eq!(m.total_nodes(), 1);

        m.ingest_own_report(report(4, -1));
        assert_eq!(m.role(), Role::Neutral);
        assert_eq!(m.intersection(), None);
        assert_eq!(m.total_nodes(), 0);
        assert_eq!(m.term(), 0);
        assert!(m.members().is_empty());
        assert_eq!(m.publish(), DataLog::default());
        assert_eq!(m.own_report().intersection_id, -1);

        m.tick(t as f64, &mut pipes).unwrap();
        assert_eq!(m.role(), Role::Neutral);
    }

    #[test]
    fn foreign_aircraft_id_is_relabelled() {
        let mut m = RoleStateMachine::new(4, Config::default()).unwrap();
        m.ingest_own_report(report(9, 1));
        assert_eq!(m.own_report().aircraft_id, 4);
    }
}
