// Copyright 2020 Graydon Hoare <graydon@pobox.com>
// Licensed under the MIT and Apache-2.0 licenses.

use crate::IntersectionId;
use thiserror::Error;

/// Errors surfaced by the consensus core.
///
/// Protocol-level irregularities (foreign intersections, repeated vote
/// requests, stale acknowledgements) are not errors; they are absorbed by
/// the state machine. What remains are integration faults that must not be
/// papered over.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// More aircraft joined an intersection than the merge log has slots for.
    #[error("intersection {intersection} has more than {capacity} participants")]
    CapacityExceeded {
        capacity: usize,
        intersection: IntersectionId,
    },

    /// A timer period of zero would never (or always) expire.
    #[error("timer period `{0}` must be at least one tick")]
    InvalidTiming(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
