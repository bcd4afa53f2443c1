// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Collaborator interfaces
//!
//! Every collaborator is reached through an async trait object. Replies that
//! arrive later (hits, batches, completion signals) are posted back through
//! the `CoordinatorHandle` passed in the call.

use super::driver::CoordinatorHandle;
use crate::batch::{Batch, Selection};
use crate::coordinator::{LookupId, LookupReply, QueryProgress, Report, Role};
use crate::error::Result;
use crate::expr::Expression;
use async_trait::async_trait;
use std::sync::Arc;

/// Partition-selection service
#[async_trait]
pub trait IndexService: Send + Sync {
    /// Start a lookup for `expr`
    ///
    /// Hits and completion signals for the lookup are posted to `client` via
    /// `deliver_hits` and `index_done`.
    async fn lookup(&self, expr: Expression, client: CoordinatorHandle) -> Result<LookupReply>;

    /// Ask for `partitions` more partitions; zero stops the lookup
    async fn request_partitions(&self, lookup: LookupId, partitions: u32, urgent: bool);

    /// Resolves once the index is gone
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Bulk-storage service that materializes hits into batches
#[async_trait]
pub trait ArchiveService: Send + Sync {
    /// Remember `client` as the destination of materialized rows
    async fn register_client(&self, client: CoordinatorHandle);

    /// Materialize `hits`, posting batches and one `archive_done` to `client`
    async fn lookup(&self, hits: Selection, client: CoordinatorHandle);

    /// Resolves once the archive is gone
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Downstream consumer of query results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn ship(&self, batch: Batch);

    /// Resolves once the sink is gone
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Telemetry sink
#[async_trait]
pub trait Accountant: Send + Sync {
    async fn announce(&self, name: &str);

    async fn report(&self, report: Report);
}

/// UI subscriber for progress snapshots
#[async_trait]
pub trait StatisticsSubscriber: Send + Sync {
    async fn publish(&self, name: &str, progress: QueryProgress);
}

/// A collaborator handed to the coordinator
#[derive(Clone)]
pub enum Registration {
    Index(Arc<dyn IndexService>),
    Archive(Arc<dyn ArchiveService>),
    Sink(Arc<dyn ResultSink>),
    Accountant(Arc<dyn Accountant>),
    StatisticsSubscriber(Arc<dyn StatisticsSubscriber>),
}

impl Registration {
    pub fn role(&self) -> Role {
        match self {
            Registration::Index(_) => Role::Index,
            Registration::Archive(_) => Role::Archive,
            Registration::Sink(_) => Role::Sink,
            Registration::Accountant(_) => Role::Accountant,
            Registration::StatisticsSubscriber(_) => Role::StatisticsSubscriber,
        }
    }
}

/// Currently registered collaborators
#[derive(Default, Clone)]
pub(crate) struct Collaborators {
    pub index: Option<Arc<dyn IndexService>>,
    pub archive: Option<Arc<dyn ArchiveService>>,
    pub sink: Option<Arc<dyn ResultSink>>,
    pub accountant: Option<Arc<dyn Accountant>>,
    pub subscriber: Option<Arc<dyn StatisticsSubscriber>>,
}

impl Collaborators {
    pub fn set(&mut self, registration: Registration) {
        match registration {
            Registration::Index(index) => self.index = Some(index),
            Registration::Archive(archive) => self.archive = Some(archive),
            Registration::Sink(sink) => self.sink = Some(sink),
            Registration::Accountant(accountant) => self.accountant = Some(accountant),
            Registration::StatisticsSubscriber(subscriber) => self.subscriber = Some(subscriber),
        }
    }
}
