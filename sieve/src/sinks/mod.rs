// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result sinks

use crate::batch::{Batch, Value};
use crate::runtime::ResultSink;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

/// Discards every batch, keeping only counts
#[derive(Debug, Default)]
pub struct NullSink {
    batches: AtomicU64,
    rows: AtomicU64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResultSink for NullSink {
    async fn ship(&self, batch: Batch) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.rows.fetch_add(batch.rows(), Ordering::Relaxed);
    }
}

/// Keeps every shipped batch in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    batches: Mutex<Vec<Batch>>,
    disconnected: AtomicBool,
    notify: Notify,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shipped batches in arrival order
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().clone()
    }

    pub fn rows(&self) -> u64 {
        self.batches.lock().iter().map(Batch::rows).sum()
    }

    /// Global row identifiers of all shipped rows
    pub fn ids(&self) -> Vec<u64> {
        self.batches.lock().iter().flat_map(Batch::ids).collect()
    }

    /// Values of `column` across all shipped rows
    pub fn column(&self, column: usize) -> Vec<Value> {
        let batches = self.batches.lock();
        batches
            .iter()
            .flat_map(|batch| (0..batch.rows()).filter_map(move |row| batch.value(row, column).cloned()))
            .collect()
    }

    /// Go away; a coordinator watching this sink observes a disconnect
    pub fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultSink for CollectingSink {
    async fn ship(&self, batch: Batch) {
        if self.is_disconnected() {
            log::debug!("Disconnected sink drops {} rows", batch.rows());
            return;
        }
        self.batches.lock().push(batch);
    }

    async fn closed(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_disconnected() {
            return;
        }
        notified.await;
    }
}
