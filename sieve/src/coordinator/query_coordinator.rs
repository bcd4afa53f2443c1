// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query Coordinator - per-query state machine for distributed search
//!
//! The coordinator interleaves four activities for one query:
//! - partition-granular hit delivery from the index
//! - row materialization by the archive, possibly reordered
//! - demand-driven shipping of filtered rows to the sink
//! - liveness and shutdown decisions consistent with completion bookkeeping
//!
//! It owns all of its state and is driven one `Event` at a time. Events that
//! arrive before the state they depend on exists are deferred and replayed
//! in arrival order after every handled event.

use super::checker_cache::CheckerCache;
use super::event::{
    Command, Event, ExitReason, LookupId, LookupReply, QueryOptions, Role, StatusVerbosity,
};
use super::progress::{add_demand, QueryProgress, UNBOUNDED};
use super::result_buffer::ResultBuffer;
use super::statistics::{MetricValue, QueryStatistics, Report};
use super::watch::{WatchId, WatchTable};
use crate::batch::{Batch, Selection};
use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, Result};
use crate::expr::Expression;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Coarse lifecycle of a coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    /// Created, `run` not yet received
    Idle,
    /// Waiting for the initial index round-trip
    AwaitingLookup,
    Running,
    Terminated(ExitReason),
}

impl Lifecycle {
    fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::AwaitingLookup => "awaiting-lookup",
            Lifecycle::Running => "running",
            Lifecycle::Terminated(_) => "terminated",
        }
    }
}

enum Disposition {
    Handled,
    Deferred(Event),
}

/// Query Coordinator - orchestrates index, archive and sink for one query
pub struct QueryCoordinator {
    config: CoordinatorConfig,
    expr: Expression,
    options: QueryOptions,
    registered: HashSet<Role>,
    watches: WatchTable,
    lookup: Option<LookupId>,
    progress: QueryProgress,
    /// Union of all row identifiers reported by the index
    hits: Selection,
    results: ResultBuffer,
    checkers: CheckerCache,
    started_at: Option<DateTime<Utc>>,
    started: Option<Instant>,
    lifecycle: Lifecycle,
    /// Set once all partitions are in and every archive round-trip completed
    finished: bool,
    deferred: VecDeque<Event>,
    outbox: Vec<Command>,
}

impl QueryCoordinator {
    /// Create a coordinator for `expr`
    ///
    /// # Returns
    /// * `Err(CoordinatorError::InvalidConfiguration)` if the configuration or
    ///   the query options are invalid
    pub fn new(expr: Expression, options: QueryOptions, config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        options.validate()?;
        if options.continuous {
            log::debug!("{} has continuous query option", config.name);
        }
        Ok(Self {
            config,
            expr,
            options,
            registered: HashSet::new(),
            watches: WatchTable::new(),
            lookup: None,
            progress: QueryProgress::default(),
            hits: Selection::new(),
            results: ResultBuffer::new(),
            checkers: CheckerCache::new(),
            started_at: None,
            started: None,
            lifecycle: Lifecycle::Idle,
            finished: false,
            deferred: VecDeque::new(),
            outbox: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    pub fn progress(&self) -> &QueryProgress {
        &self.progress
    }

    /// Accumulated index hits
    pub fn hits(&self) -> &Selection {
        &self.hits
    }

    pub fn lookup(&self) -> Option<LookupId> {
        self.lookup
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Terminated(_))
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        match &self.lifecycle {
            Lifecycle::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whether all partitions were received and all archive lookups completed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn results(&self) -> &ResultBuffer {
        &self.results
    }

    pub fn checkers(&self) -> &CheckerCache {
        &self.checkers
    }

    /// Number of events waiting for their prerequisites
    pub fn deferred_events(&self) -> usize {
        self.deferred.len()
    }

    pub fn statistics(&self) -> QueryStatistics {
        QueryStatistics::from_progress(&self.progress, self.hits.rank())
    }

    /// Process one event and return the commands it produced
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        if self.is_terminated() {
            log::debug!("{} ignores {} after termination", self.name(), event.kind());
            return Vec::new();
        }
        match self.dispatch(event) {
            Disposition::Handled => self.replay_deferred(),
            Disposition::Deferred(event) => {
                log::debug!("{} defers {}", self.name(), event.kind());
                self.deferred.push_back(event);
            }
        }
        std::mem::take(&mut self.outbox)
    }

    fn dispatch(&mut self, event: Event) -> Disposition {
        match event {
            Event::ExtractAll => self.extract_all(),
            Event::Extract(n) => self.extract(n),
            Event::Register(role) => self.register(role),
            Event::Run => self.run(),
            Event::LookupReply(reply) => self.handle_lookup_reply(reply),
            Event::Batch(batch) => self.handle_batch(batch),
            Event::Hits(hits) => return self.handle_hits(hits),
            Event::IndexDone => return self.handle_index_done(),
            Event::ArchiveDone(err) => self.handle_archive_done(err),
            Event::Down(id) => self.handle_down(id),
            Event::Exit(reason) => self.terminate(reason),
        }
        Disposition::Handled
    }

    fn replay_deferred(&mut self) {
        while !self.deferred.is_empty() && !self.is_terminated() {
            let pending = std::mem::take(&mut self.deferred);
            let before = pending.len();
            for event in pending {
                if self.is_terminated() {
                    break;
                }
                if let Disposition::Deferred(event) = self.dispatch(event) {
                    self.deferred.push_back(event);
                }
            }
            if self.deferred.len() == before {
                break;
            }
        }
        if self.is_terminated() {
            self.deferred.clear();
        }
    }

    // -- consumer demand ------------------------------------------------------

    fn extract_all(&mut self) {
        log::debug!("{} got request to extract all results", self.name());
        if self.progress.is_unbounded() {
            log::warn!("{} ignores extract request, already getting all", self.name());
            return;
        }
        self.progress.requested = UNBOUNDED;
        self.ship_results();
        self.request_more_hits();
    }

    fn extract(&mut self, n: u64) {
        if n == 0 {
            log::warn!("{} ignores extract request for 0 results", self.name());
            return;
        }
        if self.progress.is_unbounded() {
            log::warn!("{} ignores extract request, already getting all", self.name());
            return;
        }
        let pending = self.progress.requested;
        self.progress.requested = add_demand(pending, n);
        log::debug!(
            "{} got a request to extract {} more results in addition to {} pending results",
            self.name(),
            self.progress.requested - pending,
            pending
        );
        self.ship_results();
        self.request_more_hits();
    }

    /// Ship buffered rows while the consumer has outstanding demand
    fn ship_results(&mut self) {
        log::debug!("{} relays {} cached results", self.name(), self.progress.cached);
        while self.progress.requested > 0 && self.progress.cached > 0 {
            let batch = match self.results.take(self.progress.requested) {
                Some(batch) => batch,
                None => break,
            };
            let rows = batch.rows();
            debug_assert!(rows <= self.progress.cached);
            self.progress.cached -= rows;
            self.progress.requested -= rows;
            self.progress.shipped += rows;
            self.outbox.push(Command::Ship(batch));
        }
        debug_assert_eq!(self.progress.cached, self.results.rows());
    }

    /// Ask the index for more partitions if nothing else is in flight
    fn request_more_hits(&mut self) {
        if !self.options.historical {
            log::warn!("{} requested more hits for continuous query", self.name());
            return;
        }
        if self.progress.requested == 0 {
            log::debug!(
                "{} shipped {} results and waits for client to request more",
                self.name(),
                self.progress.shipped
            );
            return;
        }
        if self.progress.outstanding_lookups() > 0 {
            log::debug!(
                "{} currently awaits {} more lookup results from the archive",
                self.name(),
                self.progress.outstanding_lookups()
            );
            return;
        }
        if self.progress.scheduled > 0 {
            log::debug!(
                "{} currently awaits hits for {} scheduled partitions",
                self.name(),
                self.progress.scheduled
            );
            return;
        }
        if self.progress.received == self.progress.expected {
            log::debug!(
                "{} received hits for all {} partitions",
                self.name(),
                self.progress.expected
            );
            return;
        }
        let lookup = match self.lookup {
            Some(lookup) => lookup,
            None => return,
        };
        let n = self
            .progress
            .remaining_partitions()
            .min(u64::from(self.config.partitions_per_request));
        // Attributed to `received` when the index reports done
        self.progress.scheduled = n;
        log::debug!("{} asks index to process {} more partitions", self.name(), n);
        self.outbox.push(Command::RequestPartitions {
            lookup,
            partitions: n as u32,
            urgent: false,
        });
    }

    // -- registration and startup ---------------------------------------------

    fn register(&mut self, role: Role) {
        log::debug!("{} registers {}", self.name(), role);
        self.registered.insert(role);
        let watch = match role {
            Role::Sink => true,
            Role::Archive | Role::Index => self.options.continuous,
            Role::Accountant | Role::StatisticsSubscriber => false,
        };
        if watch {
            let (id, replaced) = self.watches.watch(role);
            if let Some(old) = replaced {
                self.outbox.push(Command::Unwatch(old));
            }
            self.outbox.push(Command::Watch { id, role });
        } else if let Some(old) = self.watches.unwatch(role) {
            self.outbox.push(Command::Unwatch(old));
        }
        match role {
            Role::Archive if self.options.historical => {
                self.outbox.push(Command::AnnounceToArchive);
            }
            Role::Accountant => {
                self.outbox.push(Command::AnnounceToAccountant {
                    name: self.config.name.clone(),
                });
            }
            _ => {}
        }
    }

    fn run(&mut self) {
        if self.lifecycle != Lifecycle::Idle {
            log::warn!("{} ignores repeated run request", self.name());
            return;
        }
        log::info!("{} executes query: {}", self.name(), self.expr);
        self.started_at = Some(Utc::now());
        self.started = Some(Instant::now());
        let required: &[Role] = if self.options.historical {
            &[Role::Sink, Role::Index, Role::Archive]
        } else {
            &[Role::Sink]
        };
        if let Some(missing) = required.iter().find(|role| !self.registered.contains(*role)) {
            log::error!("{} cannot start without {}", self.name(), missing);
            self.terminate(ExitReason::Error(CoordinatorError::MissingCollaborator(
                *missing,
            )));
            return;
        }
        if !self.options.historical {
            self.lifecycle = Lifecycle::Running;
            return;
        }
        self.lifecycle = Lifecycle::AwaitingLookup;
        self.outbox.push(Command::Lookup(self.expr.clone()));
    }

    fn handle_lookup_reply(&mut self, reply: std::result::Result<LookupReply, CoordinatorError>) {
        if self.lifecycle != Lifecycle::AwaitingLookup {
            log::debug!("{} ignores unexpected lookup reply", self.name());
            return;
        }
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                log::error!("{} failed to look up query at the index: {}", self.name(), err);
                self.terminate(ExitReason::Error(err));
                return;
            }
        };
        log::info!(
            "{} got lookup handle {}, scheduled {}/{} partitions",
            self.name(),
            reply.lookup,
            reply.scheduled,
            reply.partitions
        );
        self.lookup = Some(reply.lookup);
        self.lifecycle = Lifecycle::Running;
        if reply.partitions == 0 {
            log::info!("{} found no qualifying partitions", self.name());
            self.finished = true;
            self.shutdown();
            return;
        }
        self.progress.expected = u64::from(reply.partitions);
        self.progress.scheduled = u64::from(reply.scheduled.min(reply.partitions));
        if self.progress.scheduled == 0 {
            self.request_more_hits();
        }
    }

    // -- batches ---------------------------------------------------------------

    fn handle_batch(&mut self, batch: Batch) {
        log::debug!("{} got batch of {} rows", self.name(), batch.rows());
        let selection = match self.checkers.select(&batch, &self.expr) {
            Ok(selection) => selection,
            Err(source) => {
                log::error!(
                    "{} failed to compile expression for {}: {}",
                    self.name(),
                    batch.schema(),
                    source
                );
                // Partial results are preferred over silent loss
                self.ship_results();
                self.terminate(ExitReason::Error(CoordinatorError::Compile {
                    schema: batch.schema().name.clone(),
                    source,
                }));
                return;
            }
        };
        self.progress.processed += batch.rows();
        if selection.is_empty() {
            return;
        }
        let added = self.results.push_selected(&batch, &selection);
        debug_assert_eq!(added, selection.rank());
        self.progress.cached += added;
        self.ship_results();
    }

    // -- index protocol ---------------------------------------------------------

    fn handle_hits(&mut self, hits: Selection) -> Disposition {
        // Hits may overtake the reply carrying our lookup handle
        if self.awaiting_lookup() {
            return Disposition::Deferred(Event::Hits(hits));
        }
        if self.progress.expected == 0 {
            log::debug!(
                "{} drops {} hits without qualifying partitions",
                self.name(),
                hits.rank()
            );
            return Disposition::Handled;
        }
        if self.finished {
            log::warn!("{} drops {} hits after completion", self.name(), hits.rank());
            return Disposition::Handled;
        }
        let runtime = self.elapsed();
        self.progress.runtime = runtime;
        let count = hits.rank();
        if self.config.hit_telemetry && self.registered.contains(&Role::Accountant) {
            let mut report = Report::new();
            if self.hits.is_empty() && count > 0 {
                report.push("coordinator.hits.first", MetricValue::Duration(runtime));
            }
            report.push("coordinator.hits.arrived", MetricValue::Duration(runtime));
            report.push("coordinator.hits.count", MetricValue::Count(count));
            self.outbox.push(Command::Report(report));
        }
        if count == 0 {
            log::warn!("{} got empty hits", self.name());
            return Disposition::Handled;
        }
        debug_assert!(
            self.hits.is_disjoint(&hits),
            "partitions reported overlapping row identifiers"
        );
        log::debug!("{} got index hits: {}", self.name(), hits);
        self.hits |= &hits;
        log::debug!("{} forwards hits to archive", self.name());
        self.progress.lookups_issued += 1;
        self.outbox.push(Command::ForwardHits(hits));
        Disposition::Handled
    }

    fn handle_index_done(&mut self) -> Disposition {
        if self.awaiting_lookup() {
            return Disposition::Deferred(Event::IndexDone);
        }
        if self.lookup.is_none() {
            log::debug!("{} drops index completion without lookup", self.name());
            return Disposition::Handled;
        }
        // Partition accounting waits until every archive lookup came back
        if self.progress.outstanding_lookups() > 0 {
            return Disposition::Deferred(Event::IndexDone);
        }
        if self.finished {
            log::debug!("{} ignores index completion after finishing", self.name());
            return Disposition::Handled;
        }
        let runtime = self.elapsed();
        self.progress.runtime = runtime;
        self.progress.received += std::mem::take(&mut self.progress.scheduled);
        debug_assert!(self.progress.received <= self.progress.expected);
        if self.progress.received < self.progress.expected {
            log::debug!(
                "{} received hits from {}/{} partitions",
                self.name(),
                self.progress.received,
                self.progress.expected
            );
            self.request_more_hits();
            return Disposition::Handled;
        }
        log::debug!(
            "{} received all hits from {} partition(s) in {:?}",
            self.name(),
            self.progress.expected,
            runtime
        );
        if self.registered.contains(&Role::Accountant) {
            self.outbox.push(Command::Report(Report::new().with(
                "coordinator.hits.runtime",
                MetricValue::Duration(runtime),
            )));
        }
        if self.progress.finished() {
            self.finished = true;
            self.shutdown();
        }
        Disposition::Handled
    }

    /// Historical part still waits for the initial index round-trip
    fn awaiting_lookup(&self) -> bool {
        self.options.historical
            && matches!(self.lifecycle, Lifecycle::Idle | Lifecycle::AwaitingLookup)
    }

    // -- archive protocol -------------------------------------------------------

    fn handle_archive_done(&mut self, err: Option<String>) {
        self.progress.lookups_complete += 1;
        debug_assert!(self.progress.lookups_complete <= self.progress.lookups_issued);
        if let Some(err) = err {
            log::warn!("{} archive lookup ended with error: {}", self.name(), err);
        }
        log::debug!("{} received done from archive: {:?}", self.name(), self.progress);
        // Index completion is deferred while lookups are outstanding, so the
        // archive side alone can never finish the query
        debug_assert!(!self.progress.finished() || self.progress.expected == 0);
    }

    // -- liveness and shutdown --------------------------------------------------

    fn handle_down(&mut self, id: WatchId) {
        let role = match self.watches.fire(id) {
            Some(role) => role,
            None => {
                log::debug!("{} ignores stale {}", self.name(), id);
                return;
            }
        };
        log::info!("{} received DOWN from {}", self.name(), role);
        match role {
            Role::Sink => self.terminate(ExitReason::Disconnected(role)),
            Role::Archive | Role::Index if self.options.continuous => {
                self.terminate(ExitReason::Disconnected(role))
            }
            _ => log::debug!("{} keeps running without {}", self.name(), role),
        }
    }

    /// Terminate after the query finished; continuous queries stay alive
    fn shutdown(&mut self) {
        if self.options.continuous {
            log::debug!("{} keeps running for continuous query", self.name());
            return;
        }
        log::debug!("{} initiates shutdown", self.name());
        self.terminate(ExitReason::Normal);
    }

    fn terminate(&mut self, reason: ExitReason) {
        if self.is_terminated() {
            return;
        }
        log::debug!("{} terminates with reason: {}", self.name(), reason);
        if !matches!(reason, ExitReason::Kill) {
            self.report_statistics();
        }
        if self.registered.contains(&Role::Index) {
            if let Some(lookup) = self.lookup {
                // Zero partitions tells the index to drop further results
                self.outbox.push(Command::RequestPartitions {
                    lookup,
                    partitions: 0,
                    urgent: true,
                });
            }
        }
        for id in self.watches.drain() {
            self.outbox.push(Command::Unwatch(id));
        }
        self.deferred.clear();
        self.lifecycle = Lifecycle::Terminated(reason.clone());
        self.outbox.push(Command::Terminate(reason));
    }

    fn report_statistics(&mut self) {
        if self.started.is_some() {
            self.progress.runtime = self.elapsed();
        }
        if self.registered.contains(&Role::StatisticsSubscriber) {
            self.outbox.push(Command::PublishProgress {
                name: self.config.name.clone(),
                progress: self.progress.clone(),
            });
        }
        if self.registered.contains(&Role::Accountant) {
            self.outbox
                .push(Command::Report(self.statistics().to_report()));
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|start| start.elapsed()).unwrap_or_default()
    }

    // -- status -----------------------------------------------------------------

    /// Diagnostics at the requested level of detail
    pub fn status(&self, verbosity: StatusVerbosity) -> serde_json::Value {
        let mut coordinator = serde_json::Map::new();
        let mut result = serde_json::Map::new();
        if verbosity >= StatusVerbosity::Info {
            let mut query = serde_json::Map::new();
            query.insert("expression".into(), json!(self.expr.to_string()));
            if verbosity >= StatusVerbosity::Detailed {
                query.insert("hits".into(), json!(self.hits.rank()));
                query.insert(
                    "start".into(),
                    json!(self
                        .started_at
                        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))),
                );
            }
            result.insert("queries".into(), json!([query]));
        }
        if verbosity >= StatusVerbosity::Detailed {
            coordinator.insert("name".into(), json!(self.config.name));
            coordinator.insert("state".into(), json!(self.lifecycle.as_str()));
            coordinator.insert(
                "progress".into(),
                serde_json::to_value(&self.progress).unwrap_or(serde_json::Value::Null),
            );
            coordinator.insert("buffered-batches".into(), json!(self.results.len()));
            coordinator.insert("deferred-events".into(), json!(self.deferred.len()));
            coordinator.insert("watches".into(), json!(self.watches.len()));
        }
        if verbosity >= StatusVerbosity::Debug {
            coordinator.insert("schemas".into(), json!(self.checkers.len()));
            coordinator.insert(
                "lookup".into(),
                json!(self.lookup.map(|lookup| lookup.to_string())),
            );
        }
        result.insert("coordinator".into(), serde_json::Value::Object(coordinator));
        serde_json::Value::Object(result)
    }
}
