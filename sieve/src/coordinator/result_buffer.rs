// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Filtered batches waiting to be shipped
//!
//! The buffer has no upper bound: an archive that delivers faster than the
//! consumer extracts grows it without limit.

use crate::batch::{Batch, Selection};
use std::collections::VecDeque;

/// FIFO of filtered batches with an exact row count
#[derive(Debug, Default)]
pub struct ResultBuffer {
    batches: VecDeque<Batch>,
    rows: u64,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all buffered batches
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Number of buffered batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn push(&mut self, batch: Batch) {
        if batch.is_empty() {
            return;
        }
        self.rows += batch.rows();
        self.batches.push_back(batch);
    }

    /// Append the rows of `batch` selected by `selection`, returning how many
    /// rows were added
    pub fn push_selected(&mut self, batch: &Batch, selection: &Selection) -> u64 {
        let before = self.rows;
        for part in batch.select(selection) {
            self.push(part);
        }
        self.rows - before
    }

    /// Remove at most `limit` rows from the front
    ///
    /// Returns the whole head batch if it fits, otherwise splits it and keeps
    /// the remainder at the front.
    pub fn take(&mut self, limit: u64) -> Option<Batch> {
        if limit == 0 {
            return None;
        }
        let head = self.batches.pop_front()?;
        let batch = if head.rows() <= limit {
            head
        } else {
            let (first, rest) = head.split(limit);
            self.batches.push_front(rest);
            first
        };
        self.rows -= batch.rows();
        Some(batch)
    }

    /// Remove every buffered batch
    pub fn drain(&mut self) -> Vec<Batch> {
        self.rows = 0;
        self.batches.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }
}
