// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

// Exhaustive exploration of small swarms: every interleaving of ticks and
// message deliveries up to a tick bound.

use crate::{Config, Message, NodeId, Pipes, Report, Role, RoleStateMachine, Term, Timing};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use stateright::actor::{model_timeout, Actor, ActorModel, Id, Network, Out};
use stateright::{Checker, Expectation, Model};

const INTERSECTION: i32 = 5;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct SwarmConfig {
    max_ticks: u32,
}

/// Drives the node once per timeout.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct Tick;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct AircraftActor {
    peers: Vec<Id>,
    config: Config,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct AircraftState {
    machine: RoleStateMachine,
    pipes: Pipes,
    ticks: u32,
    // Bookkeeping for the properties, not part of the node.
    voted_terms: BTreeSet<Term>,
    double_vote: bool,
    unearned_leadership: bool,
}

fn node_id(id: Id) -> NodeId {
    usize::from(id) as NodeId
}

impl Actor for AircraftActor {
    type Msg = Message;
    type State = AircraftState;
    type Timer = Tick;
    type Storage = ();
    type Random = ();

    fn on_start(
        &self,
        id: Id,
        _storage: &Option<Self::Storage>,
        o: &mut Out<Self>,
    ) -> Self::State {
        o.set_timer(Tick, model_timeout());
        AircraftState {
            machine: RoleStateMachine::new(node_id(id), self.config).unwrap(),
            pipes: Pipes::new(),
            ticks: 0,
            voted_terms: BTreeSet::new(),
            double_vote: false,
            unearned_leadership: false,
        }
    }

    fn on_msg(
        &self,
        _id: Id,
        state: &mut Cow<Self::State>,
        _src: Id,
        msg: Self::Msg,
        _o: &mut Out<Self>,
    ) {
        state.to_mut().pipes.deliver(msg);
    }

    fn on_timeout(
        &self,
        id: Id,
        state: &mut Cow<Self::State>,
        _timer: &Self::Timer,
        o: &mut Out<Self>,
    ) {
        let st = state.to_mut();
        let me = node_id(id);
        st.machine.ingest_own_report(Report {
            aircraft_id: me,
            intersection_id: INTERSECTION,
            ..Report::default()
        });

        let was_candidate = st.machine.role() == Role::Candidate;
        let total_before = st.machine.total_nodes();
        st.machine.tick(st.ticks as f64, &mut st.pipes).unwrap();
        st.ticks += 1;

        if was_candidate && st.machine.role() == Role::Leader && total_before > 1 {
            let votes = st.machine.votes_received();
            if votes <= total_before / 2 {
                st.unearned_leadership = true;
            }
        }

        for msg in st.pipes.drain_outbound() {
            if let Message::VoteResponse(v) = msg {
                if !st.voted_terms.insert(v.term) {
                    st.double_vote = true;
                }
            }
            for peer in self.peers.iter().filter(|p| **p != id) {
                o.send(*peer, msg);
            }
        }
        o.set_timer(Tick, model_timeout());
    }
}

fn swarm_model(aircraft: usize, max_ticks: u32) -> ActorModel<AircraftActor, SwarmConfig, ()> {
    let peers: Vec<Id> = (0..aircraft).map(Id::from).collect();
    let config = Config {
        timing: Timing {
            follower_timeout_ticks: 4,
            candidate_retry_ticks: 3,
            leader_heartbeat_interval_ticks: 2,
            neutral_probe_interval_ticks: 2,
        },
    };

    let mut model = ActorModel::new(SwarmConfig { max_ticks }, ())
        .init_network(Network::new_ordered([]))
        .within_boundary(|cfg, state| {
            state
                .actor_states
                .iter()
                .all(|s: &Arc<AircraftState>| s.ticks <= cfg.max_ticks)
        });

    for _ in 0..aircraft {
        model = model.actor(AircraftActor {
            peers: peers.clone(),
            config,
        });
    }

    model = model.property(Expectation::Always, "one vote per term", |_, state| {
        state.actor_states.iter().all(|s| !s.double_vote)
    });

    model = model.property(
        Expectation::Always,
        "majority before leadership",
        |_, state| state.actor_states.iter().all(|s| !s.unearned_leadership),
    );

    model = model.property(Expectation::Sometimes, "a leader emerges", |_, state| {
        state
            .actor_states
            .iter()
            .any(|s| s.machine.role() == Role::Leader)
    });

    model
}

#[test]
fn check_two_aircraft() {
    let checker = swarm_model(2, 7)
        .checker()
        .threads(num_cpus::get())
        .spawn_bfs()
        .join();
    checker.assert_properties();
    println!("Two aircraft: {} states explored", checker.unique_state_count());
}

#[test]
#[ignore = "slow"]
fn check_three_aircraft() {
    let checker = swarm_model(3, 8)
        .checker()
        .threads(num_cpus::get())
        .spawn_bfs()
        .join();
    checker.assert_properties();
    println!("Three aircraft: {} states explored", checker.unique_state_count());
}
