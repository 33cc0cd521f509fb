// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

//! Tick periods of the election timers.
//!
//! All timing in the consensus core is counted in ticks of the driver loop,
//! never in wall-clock time, so the periods here only make sense relative to
//! the rate at which `tick` is called.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ticks without a heartbeat before a follower stands for election.
pub const FOLLOWER_TIMEOUT_TICKS: u32 = 20;
/// Ticks a candidate waits for votes before falling back to follower.
pub const CANDIDATE_RETRY_TICKS: u32 = 3;
/// Ticks between two heartbeats of a leader.
pub const LEADER_HEARTBEAT_INTERVAL_TICKS: u32 = 2;
/// Ticks between two discovery probes of a follower that has no leader yet.
pub const NEUTRAL_PROBE_INTERVAL_TICKS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub follower_timeout_ticks: u32,
    pub candidate_retry_ticks: u32,
    pub leader_heartbeat_interval_ticks: u32,
    pub neutral_probe_interval_ticks: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            follower_timeout_ticks: FOLLOWER_TIMEOUT_TICKS,
            candidate_retry_ticks: CANDIDATE_RETRY_TICKS,
            leader_heartbeat_interval_ticks: LEADER_HEARTBEAT_INTERVAL_TICKS,
            neutral_probe_interval_ticks: NEUTRAL_PROBE_INTERVAL_TICKS,
        }
    }
}

impl Timing {
    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("follower_timeout_ticks", self.follower_timeout_ticks),
            ("candidate_retry_ticks", self.candidate_retry_ticks),
            ("leader_heartbeat_interval_ticks", self.leader_heartbeat_interval_ticks),
            ("neutral_probe_interval_ticks", self.neutral_probe_interval_ticks),
        ];
        for (name, period) in periods.iter() {
            if *period == 0 {
                return Err(Error::InvalidTiming(*name));
            }
        }
        Ok(())
    }
}

/// Configuration of one node. Everything has a default, so a partial JSON
/// document (or `{}`) is a valid configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let cfg = Config::from_json(r#"{"timing": {"follower_timeout_ticks": 8}}"#).unwrap();
        assert_eq!(cfg.timing.follower_timeout_ticks, 8);
        assert_eq!(cfg.timing.candidate_retry_ticks, CANDIDATE_RETRY_TICKS);
        assert_eq!(cfg.timing.leader_heartbeat_interval_ticks, LEADER_HEARTBEAT_INTERVAL_TICKS);
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn zero_period_is_rejected() {
        let err = Config::from_json(r#"{"timing": {"candidate_retry_ticks": 0}}"#).unwrap_err();
        assert_eq!(err, Error::InvalidTiming("candidate_retry_ticks"));
        assert!(matches!(Config::from_json("not json"), Err(Error::Config(_))));
    }
}
