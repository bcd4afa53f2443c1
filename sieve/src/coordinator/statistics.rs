// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query statistics and telemetry reports

use super::progress::QueryProgress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A single telemetry measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Count(u64),
    Ratio(f64),
    Duration(Duration),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(n) => write!(f, "{}", n),
            MetricValue::Ratio(r) => write!(f, "{:.4}", r),
            MetricValue::Duration(d) => write!(f, "{:?}", d),
        }
    }
}

/// Ordered list of named telemetry measurements
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub entries: Vec<(String, MetricValue)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: MetricValue) {
        self.entries.push((key.into(), value));
    }

    pub fn with(mut self, key: impl Into<String>, value: MetricValue) -> Self {
        self.push(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Point-in-time summary of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStatistics {
    /// Row identifiers reported by the index
    pub hits: u64,
    /// Rows evaluated against a checker
    pub processed: u64,
    /// Rows that passed the checker: shipped plus still buffered
    pub results: u64,
    /// Rows delivered to the sink
    pub shipped: u64,
    /// `results / processed`, zero before anything was processed
    pub selectivity: f64,
    pub runtime: Duration,
}

impl QueryStatistics {
    pub fn from_progress(progress: &QueryProgress, hits: u64) -> Self {
        let results = progress.shipped + progress.cached;
        let selectivity = if progress.processed == 0 {
            0.0
        } else {
            results as f64 / progress.processed as f64
        };
        Self {
            hits,
            processed: progress.processed,
            results,
            shipped: progress.shipped,
            selectivity,
            runtime: progress.runtime,
        }
    }

    /// Telemetry report with keys under `coordinator.`
    pub fn to_report(&self) -> Report {
        Report::new()
            .with("coordinator.hits", MetricValue::Count(self.hits))
            .with("coordinator.processed", MetricValue::Count(self.processed))
            .with("coordinator.results", MetricValue::Count(self.results))
            .with("coordinator.shipped", MetricValue::Count(self.shipped))
            .with("coordinator.selectivity", MetricValue::Ratio(self.selectivity))
            .with("coordinator.runtime", MetricValue::Duration(self.runtime))
    }
}
