// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query progress ledger
//!
//! Counters describing how far a distributed query has come. Mutated only by
//! the owning coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Demand value meaning "ship everything"
pub const UNBOUNDED: u64 = u64::MAX;

/// Add a consumer request for `n` more rows to the current demand
///
/// The increment is `min(UNBOUNDED - n, n)`, so a request of `UNBOUNDED`
/// rows adds nothing and a request of `UNBOUNDED - 1` rows adds one. The sum
/// saturates at `UNBOUNDED - 1`: a bounded demand never turns into the
/// unbounded sentinel.
pub fn add_demand(requested: u64, n: u64) -> u64 {
    let increment = (UNBOUNDED - n).min(n);
    requested.saturating_add(increment).min(UNBOUNDED - 1)
}

/// Distributed completion bookkeeping for one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryProgress {
    /// Partitions qualified by the index
    pub expected: u64,
    /// Partitions requested in the most recent ask
    pub scheduled: u64,
    /// Partitions whose hits have been fully folded in
    pub received: u64,
    /// Archive round-trips started
    pub lookups_issued: u64,
    /// Archive round-trips finished
    pub lookups_complete: u64,
    /// Rows evaluated against a checker
    pub processed: u64,
    /// Rows shipped to the sink
    pub shipped: u64,
    /// Rows the consumer still wants
    pub requested: u64,
    /// Rows waiting in the result buffer
    pub cached: u64,
    /// Time since the query started, as of the last update
    pub runtime: Duration,
}

impl QueryProgress {
    /// All expected partitions received and no archive round-trip outstanding
    pub fn finished(&self) -> bool {
        self.received == self.expected && self.lookups_issued == self.lookups_complete
    }

    /// Number of archive round-trips still in flight
    pub fn outstanding_lookups(&self) -> u64 {
        self.lookups_issued.saturating_sub(self.lookups_complete)
    }

    /// Partitions not yet received
    pub fn remaining_partitions(&self) -> u64 {
        self.expected.saturating_sub(self.received)
    }

    pub fn is_unbounded(&self) -> bool {
        self.requested == UNBOUNDED
    }
}
