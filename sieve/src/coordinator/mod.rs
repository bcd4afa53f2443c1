// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query Coordinator - Per-query orchestration of index, archive and sink
//!
//! The coordinator is a synchronous state machine: it consumes `Event`s and
//! returns `Command`s. The `runtime` module drives it on tokio.

pub mod checker_cache;
pub mod event;
pub mod progress;
pub mod query_coordinator;
pub mod result_buffer;
pub mod statistics;
pub mod watch;

pub use checker_cache::{CheckerCache, CheckerCacheStats};
pub use event::{
    Command, Event, ExitReason, LookupId, LookupReply, QueryOptions, Role, StatusVerbosity,
};
pub use progress::{add_demand, QueryProgress, UNBOUNDED};
pub use query_coordinator::{Lifecycle, QueryCoordinator};
pub use result_buffer::ResultBuffer;
pub use statistics::{MetricValue, QueryStatistics, Report};
pub use watch::{WatchId, WatchTable};
