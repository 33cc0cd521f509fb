// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Flies a swarm of simulated aircraft at one intersection and prints what
//! each of them ends up publishing to its scheduler.

use std::path::PathBuf;

use clap::Parser;
use mergepoint::{Config, IntersectionId, NodeId, Report, Role, Swarm};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "merge-sim")]
#[command(about = "Simulate leader election at a merge point")]
struct Args {
    /// JSON configuration file; defaults apply to anything it leaves out
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of aircraft
    #[arg(short, long, default_value_t = 3)]
    aircraft: u32,

    /// Rounds to run
    #[arg(short, long, default_value_t = 120)]
    rounds: u64,

    /// Rounds between two aircraft reaching the intersection
    #[arg(short, long, default_value_t = 10)]
    stagger: u64,

    /// Intersection every aircraft heads for
    #[arg(short, long, default_value_t = 7)]
    intersection: IntersectionId,

    /// Round after which the leader leaves the intersection
    #[arg(long)]
    depart: Option<u64>,
}

fn report(id: NodeId, round: u64, target: Option<IntersectionId>) -> Report {
    let early = 600 + 30 * id;
    Report {
        aircraft_id: id,
        intersection_id: target.map_or(-1, |i| i as i32),
        early_arrival_time: early,
        current_arrival_time: early + 10,
        late_arrival_time: early + 40,
        schedules_computed: round as u32,
        zone_status: 1,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    info!("{:?}", config);

    let mut swarm = Swarm::new();
    for id in 1..=args.aircraft {
        swarm.add(id, config)?;
    }

    let mut departed: Option<NodeId> = None;
    while swarm.rounds() < args.rounds {
        let round = swarm.rounds();
        if departed.is_none() && args.depart.map_or(false, |d| round >= d) {
            let leader = swarm
                .machines()
                .find(|m| m.role() == Role::Leader)
                .map(|m| m.id());
            if let Some(id) = leader {
                info!("round {}: leader {} leaves intersection {}", round, id, args.intersection);
                departed = Some(id);
            }
        }
        swarm.ingest(|id| {
            let arrived = round >= u64::from(id - 1) * args.stagger;
            let target = if arrived && departed != Some(id) {
                Some(args.intersection)
            } else {
                None
            };
            report(id, round, target)
        });
        swarm.round()?;
    }

    for id in swarm.ids() {
        if let Some(m) = swarm.get(id) {
            println!("aircraft {} term {}: {}", id, m.term(), m.publish());
        }
    }
    Ok(())
}
