// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Compressed row selections
//!
//! A `Selection` marks either global row identifiers (index hits) or local
//! row offsets within one batch (checker output).

use roaring::RoaringTreemap;
use std::fmt;
use std::ops::{BitOrAssign, Range, RangeInclusive};

/// Immutable-by-convention compressed bitmap over `u64` row positions
#[derive(Clone, PartialEq)]
pub struct Selection {
    bits: RoaringTreemap,
}

impl Selection {
    pub fn new() -> Self {
        Self {
            bits: RoaringTreemap::new(),
        }
    }

    /// Selection covering every position in `range`
    pub fn from_range(range: Range<u64>) -> Self {
        let mut bits = RoaringTreemap::new();
        bits.insert_range(range);
        Self { bits }
    }

    /// Number of set positions
    pub fn rank(&self) -> u64 {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn contains(&self, position: u64) -> bool {
        self.bits.contains(position)
    }

    /// Lowest set position
    pub fn first(&self) -> Option<u64> {
        self.bits.min()
    }

    /// Highest set position
    pub fn last(&self) -> Option<u64> {
        self.bits.max()
    }

    pub fn union(&self, other: &Selection) -> Selection {
        Selection {
            bits: &self.bits | &other.bits,
        }
    }

    pub fn intersection(&self, other: &Selection) -> Selection {
        Selection {
            bits: &self.bits & &other.bits,
        }
    }

    pub fn is_disjoint(&self, other: &Selection) -> bool {
        self.bits.is_disjoint(&other.bits)
    }

    /// Split into the first `k` set positions and the remainder
    pub fn split_at(&self, k: u64) -> (Selection, Selection) {
        if k >= self.rank() {
            return (self.clone(), Selection::new());
        }
        let mut head = RoaringTreemap::new();
        let mut tail = RoaringTreemap::new();
        for (i, position) in self.bits.iter().enumerate() {
            if (i as u64) < k {
                head.insert(position);
            } else {
                tail.insert(position);
            }
        }
        (Selection { bits: head }, Selection { bits: tail })
    }

    /// Maximal contiguous ranges of set positions, in ascending order
    ///
    /// Ranges are inclusive so that a run ending at `u64::MAX` is expressible.
    pub fn runs(&self) -> Vec<RangeInclusive<u64>> {
        let mut runs: Vec<RangeInclusive<u64>> = Vec::new();
        for position in self.bits.iter() {
            match runs.last_mut() {
                Some(run) if run.end().checked_add(1) == Some(position) => {
                    *run = *run.start()..=position;
                }
                _ => runs.push(position..=position),
            }
        }
        runs
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.bits.iter()
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<u64> for Selection {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

impl BitOrAssign<&Selection> for Selection {
    fn bitor_assign(&mut self, rhs: &Selection) {
        self.bits |= &rhs.bits;
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selection{:?}", self.runs())
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => {
                write!(f, "{} rows in [{}, {}]", self.rank(), first, last)
            }
            _ => write!(f, "0 rows"),
        }
    }
}
