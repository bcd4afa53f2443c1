//! In-memory collaborators
//!
//! The index and archive post their replies to the coordinator mailbox just
//! like remote services would, including hits that overtake the lookup reply.

use async_trait::async_trait;
use parking_lot::Mutex;
use sieve::batch::{Batch, Selection};
use sieve::coordinator::{LookupId, LookupReply, QueryProgress, Report};
use sieve::error::{CoordinatorError, Result};
use sieve::expr::Expression;
use sieve::runtime::{
    Accountant, ArchiveService, CoordinatorHandle, IndexService, StatisticsSubscriber,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Default)]
struct IndexState {
    client: Option<CoordinatorHandle>,
    lookup: Option<LookupId>,
    next: usize,
    requests: Vec<(u32, bool)>,
}

/// Index that reports one fixed hit set per partition
pub struct MemoryIndex {
    partitions: Vec<Selection>,
    initial: u32,
    failure: Option<String>,
    state: Mutex<IndexState>,
    gone: AtomicBool,
    notify: Notify,
}

impl MemoryIndex {
    pub fn new(partitions: Vec<Selection>, initial: u32) -> Self {
        Self {
            partitions,
            initial,
            failure: None,
            state: Mutex::new(IndexState::default()),
            gone: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(Vec::new(), 0)
        }
    }

    /// Every `(partitions, urgent)` request received after the lookup
    pub fn requests(&self) -> Vec<(u32, bool)> {
        self.state.lock().requests.clone()
    }

    /// Partitions delivered so far
    pub fn delivered(&self) -> usize {
        self.state.lock().next
    }

    pub fn disconnect(&self) {
        self.gone.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn deliver(&self, n: u32) {
        let mut state = self.state.lock();
        let client = match state.client.clone() {
            Some(client) => client,
            None => return,
        };
        let end = (state.next + n as usize).min(self.partitions.len());
        for hits in &self.partitions[state.next..end] {
            let _ = client.deliver_hits(hits.clone());
        }
        state.next = end;
        let _ = client.index_done();
    }
}

#[async_trait]
impl IndexService for MemoryIndex {
    async fn lookup(&self, _expr: Expression, client: CoordinatorHandle) -> Result<LookupReply> {
        if let Some(message) = &self.failure {
            return Err(CoordinatorError::index(message.clone()));
        }
        let lookup = LookupId::new();
        {
            let mut state = self.state.lock();
            state.client = Some(client);
            state.lookup = Some(lookup);
        }
        let partitions = self.partitions.len() as u32;
        let scheduled = self.initial.min(partitions);
        if scheduled > 0 {
            self.deliver(scheduled);
        }
        Ok(LookupReply {
            lookup,
            partitions,
            scheduled,
        })
    }

    async fn request_partitions(&self, lookup: LookupId, partitions: u32, urgent: bool) {
        {
            let mut state = self.state.lock();
            assert_eq!(state.lookup, Some(lookup));
            state.requests.push((partitions, urgent));
        }
        if partitions > 0 {
            self.deliver(partitions);
        }
    }

    async fn closed(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.gone.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}

/// Archive serving rows from a fixed set of batches
pub struct MemoryArchive {
    batches: Vec<Batch>,
    clients: Mutex<usize>,
    lookups: Mutex<u64>,
}

impl MemoryArchive {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self {
            batches,
            clients: Mutex::new(0),
            lookups: Mutex::new(0),
        }
    }

    pub fn registered_clients(&self) -> usize {
        *self.clients.lock()
    }

    pub fn lookups(&self) -> u64 {
        *self.lookups.lock()
    }
}

#[async_trait]
impl ArchiveService for MemoryArchive {
    async fn register_client(&self, _client: CoordinatorHandle) {
        *self.clients.lock() += 1;
    }

    async fn lookup(&self, hits: Selection, client: CoordinatorHandle) {
        *self.lookups.lock() += 1;
        for batch in &self.batches {
            let ids = batch.ids();
            let local: Selection = hits
                .iter()
                .filter(|id| ids.contains(id))
                .map(|id| id - ids.start)
                .collect();
            for part in batch.select(&local) {
                let _ = client.push_batch(part);
            }
        }
        let _ = client.archive_done(None);
    }
}

/// Accountant remembering everything it was told
#[derive(Default)]
pub struct RecordingAccountant {
    names: Mutex<Vec<String>>,
    reports: Mutex<Vec<Report>>,
}

impl RecordingAccountant {
    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    /// Last report carrying `key`
    pub fn last_with(&self, key: &str) -> Option<Report> {
        self.reports
            .lock()
            .iter()
            .rev()
            .find(|report| report.get(key).is_some())
            .cloned()
    }
}

#[async_trait]
impl Accountant for RecordingAccountant {
    async fn announce(&self, name: &str) {
        self.names.lock().push(name.to_string());
    }

    async fn report(&self, report: Report) {
        self.reports.lock().push(report);
    }
}

/// Statistics subscriber keeping every snapshot
#[derive(Default)]
pub struct RecordingSubscriber {
    snapshots: Mutex<Vec<(String, QueryProgress)>>,
}

impl RecordingSubscriber {
    pub fn snapshots(&self) -> Vec<(String, QueryProgress)> {
        self.snapshots.lock().clone()
    }
}

#[async_trait]
impl StatisticsSubscriber for RecordingSubscriber {
    async fn publish(&self, name: &str, progress: QueryProgress) {
        self.snapshots.lock().push((name.to_string(), progress));
    }
}
