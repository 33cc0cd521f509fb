// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use serde::{Deserialize, Serialize};

/// A periodic timer counted in ticks of the driver loop.
///
/// The timer is due whenever its count is a multiple of its period. A fresh
/// timer sits at zero and is therefore due immediately; `restart` moves it to
/// one, a full period away from the next expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickTimer {
    ticks: u32,
    period: u32,
}

impl TickTimer {
    pub fn new(period: u32) -> Self {
        debug_assert!(period > 0);
        TickTimer { ticks: 0, period }
    }

    pub fn expired(&self) -> bool {
        self.ticks % self.period == 0
    }

    /// True on every `period`th tick of this timer's count, for work that
    /// piggybacks on a timer with a shorter cadence than its own.
    pub fn every(&self, period: u32) -> bool {
        period > 0 && self.ticks % period == 0
    }

    pub fn advance(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    pub fn restart(&mut self) {
        self.ticks = 1;
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_timer_is_due_then_waits_a_period() {
        let mut t = TickTimer::new(3);
        assert!(t.expired());
        t.restart();
        let mut fired_at = vec![];
        for i in 1..=7 {
            if t.expired() {
                fired_at.push(i);
            }
            t.advance();
        }
        assert_eq!(fired_at, vec![3, 6]);
    }
}
