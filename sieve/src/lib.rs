// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sieve - Query execution coordinator for telemetry analytics
//!
//! A coordinator drives one query through three collaborators:
//!
//! - **Index**: names the partitions that may contain hits and delivers row
//!   identifiers partition by partition
//! - **Archive**: materializes hits into batches of rows
//! - **Sink**: receives filtered rows as fast as it asks for them
//!
//! Historical queries run over already-ingested data, continuous queries
//! filter newly ingested batches, and unified queries do both.
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = QueryCoordinator::new(expr, QueryOptions::historical(), config)?;
//! let (handle, done) = sieve::runtime::spawn(coordinator);
//! handle.register_sink(sink)?;
//! handle.register_index(index)?;
//! handle.register_archive(archive)?;
//! handle.run()?;
//! handle.extract_all()?;
//! let reason = done.await?;
//! ```

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod expr;
pub mod runtime;
pub mod sinks;

pub use batch::{Batch, DataType, Field, Schema, Selection, Value};
pub use config::CoordinatorConfig;
pub use coordinator::{
    Command, Event, ExitReason, QueryCoordinator, QueryOptions, QueryProgress, Role,
    StatusVerbosity,
};
pub use error::{CoordinatorError, Result};
pub use expr::{Expression, RelOp, Taxonomies};
pub use runtime::{spawn, CoordinatorHandle};

/// Sieve version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sieve crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
