// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Tokio driver for the coordinator state machine
//!
//! One task owns the `QueryCoordinator` and feeds it from an unbounded
//! mailbox. The driver never awaits a collaborator: every outbound call is
//! queued on a per-collaborator lane, a task that performs the calls in
//! order. The initial index lookup and the liveness watchers run on tasks of
//! their own.
//!
//! The driver only holds a weak reference to its mailbox. Once every
//! `CoordinatorHandle` is gone the coordinator is killed.

use super::services::{
    Accountant, ArchiveService, Collaborators, IndexService, Registration, ResultSink,
    StatisticsSubscriber,
};
use crate::batch::{Batch, Selection};
use crate::coordinator::{
    Command, Event, ExitReason, QueryCoordinator, Role, StatusVerbosity, WatchId,
};
use crate::error::{CoordinatorError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Message {
    Event(Event),
    Register(Registration),
    Status(StatusVerbosity, oneshot::Sender<serde_json::Value>),
}

/// Cloneable address of a running coordinator
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl CoordinatorHandle {
    fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| CoordinatorError::Terminated)
    }

    /// Post a raw event
    pub fn post(&self, event: Event) -> Result<()> {
        self.send(Message::Event(event))
    }

    pub fn register(&self, registration: Registration) -> Result<()> {
        self.send(Message::Register(registration))
    }

    pub fn register_index(&self, index: Arc<dyn IndexService>) -> Result<()> {
        self.register(Registration::Index(index))
    }

    pub fn register_archive(&self, archive: Arc<dyn ArchiveService>) -> Result<()> {
        self.register(Registration::Archive(archive))
    }

    pub fn register_sink(&self, sink: Arc<dyn ResultSink>) -> Result<()> {
        self.register(Registration::Sink(sink))
    }

    pub fn register_accountant(&self, accountant: Arc<dyn Accountant>) -> Result<()> {
        self.register(Registration::Accountant(accountant))
    }

    pub fn register_statistics_subscriber(
        &self,
        subscriber: Arc<dyn StatisticsSubscriber>,
    ) -> Result<()> {
        self.register(Registration::StatisticsSubscriber(subscriber))
    }

    pub fn run(&self) -> Result<()> {
        self.post(Event::Run)
    }

    pub fn extract(&self, n: u64) -> Result<()> {
        self.post(Event::Extract(n))
    }

    pub fn extract_all(&self) -> Result<()> {
        self.post(Event::ExtractAll)
    }

    /// Index side: hits of one partition delivery
    pub fn deliver_hits(&self, hits: Selection) -> Result<()> {
        self.post(Event::Hits(hits))
    }

    /// Index side: the scheduled partitions were delivered
    pub fn index_done(&self) -> Result<()> {
        self.post(Event::IndexDone)
    }

    /// Archive or ingestion side: materialized rows
    pub fn push_batch(&self, batch: Batch) -> Result<()> {
        self.post(Event::Batch(batch))
    }

    /// Archive side: one lookup finished
    pub fn archive_done(&self, error: Option<String>) -> Result<()> {
        self.post(Event::ArchiveDone(error))
    }

    pub fn exit(&self, reason: ExitReason) -> Result<()> {
        self.post(Event::Exit(reason))
    }

    /// Status snapshot at the given verbosity
    pub async fn status(&self, verbosity: StatusVerbosity) -> Result<serde_json::Value> {
        let (reply, response) = oneshot::channel();
        self.send(Message::Status(verbosity, reply))?;
        response.await.map_err(|_| CoordinatorError::Terminated)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Run `coordinator` on a new tokio task
///
/// The join handle resolves with the exit reason once the coordinator
/// terminated and its outbound lanes were flushed.
pub fn spawn(coordinator: QueryCoordinator) -> (CoordinatorHandle, JoinHandle<ExitReason>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = Driver {
        coordinator,
        mailbox: tx.downgrade(),
        rx,
        collaborators: Collaborators::default(),
        lanes: HashMap::new(),
        watchers: HashMap::new(),
        lookup_task: None,
    };
    (CoordinatorHandle { tx }, tokio::spawn(driver.run()))
}

type Delivery = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Ordered outbound queue to one collaborator
struct Lane {
    tx: mpsc::UnboundedSender<Delivery>,
    task: JoinHandle<()>,
}

impl Lane {
    fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        let task = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                delivery.await;
            }
        });
        Self { tx, task }
    }

    fn push(&self, delivery: impl Future<Output = ()> + Send + 'static) {
        if self.tx.send(Box::pin(delivery)).is_err() {
            log::debug!("Lane closed, dropping delivery");
        }
    }

    /// Wait until every queued delivery completed
    async fn flush(self) {
        drop(self.tx);
        let _ = self.task.await;
    }

    fn abort(self) {
        self.task.abort();
    }
}

/// Post `event` through a weak mailbox reference
fn post(mailbox: &mpsc::WeakUnboundedSender<Message>, event: Event) {
    if let Some(tx) = mailbox.upgrade() {
        let _ = tx.send(Message::Event(event));
    }
}

struct Driver {
    coordinator: QueryCoordinator,
    mailbox: mpsc::WeakUnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    collaborators: Collaborators,
    lanes: HashMap<Role, Lane>,
    watchers: HashMap<WatchId, JoinHandle<()>>,
    lookup_task: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(mut self) -> ExitReason {
        log::debug!("{} starts", self.coordinator.name());
        while let Some(message) = self.rx.recv().await {
            let commands = match message {
                Message::Event(event) => self.coordinator.handle(event),
                Message::Register(registration) => {
                    let role = registration.role();
                    self.collaborators.set(registration);
                    // A replaced lane keeps draining on its own
                    self.lanes.insert(role, Lane::spawn());
                    self.coordinator.handle(Event::Register(role))
                }
                Message::Status(verbosity, reply) => {
                    let _ = reply.send(self.coordinator.status(verbosity));
                    continue;
                }
            };
            if let Some(reason) = self.execute(commands) {
                return self.finish(reason).await;
            }
        }
        log::info!("{} lost all handles", self.coordinator.name());
        let commands = self.coordinator.handle(Event::Exit(ExitReason::Kill));
        let reason = self.execute(commands).unwrap_or(ExitReason::Kill);
        self.finish(reason).await
    }

    /// Flush outbound lanes, except those nobody will ever drain
    async fn finish(mut self, reason: ExitReason) -> ExitReason {
        for (role, lane) in self.lanes.drain() {
            let stuck = match &reason {
                ExitReason::Kill => true,
                ExitReason::Disconnected(gone) => *gone == role,
                _ => false,
            };
            if stuck {
                lane.abort();
            } else {
                lane.flush().await;
            }
        }
        log::info!("{} terminated: {}", self.coordinator.name(), reason);
        reason
    }

    fn client(&self) -> Option<CoordinatorHandle> {
        self.mailbox.upgrade().map(|tx| CoordinatorHandle { tx })
    }

    fn deliver(&self, role: Role, delivery: impl Future<Output = ()> + Send + 'static) {
        match self.lanes.get(&role) {
            Some(lane) => lane.push(delivery),
            None => log::warn!("{} has no lane to {}", self.coordinator.name(), role),
        }
    }

    fn execute(&mut self, commands: Vec<Command>) -> Option<ExitReason> {
        for command in commands {
            match command {
                Command::Ship(batch) => match self.collaborators.sink.clone() {
                    Some(sink) => self.deliver(Role::Sink, async move { sink.ship(batch).await }),
                    None => log::warn!(
                        "{} drops {} rows without sink",
                        self.coordinator.name(),
                        batch.rows()
                    ),
                },
                Command::Lookup(expr) => {
                    if let (Some(index), Some(client)) =
                        (self.collaborators.index.clone(), self.client())
                    {
                        let mailbox = self.mailbox.clone();
                        self.lookup_task = Some(tokio::spawn(async move {
                            let reply = index.lookup(expr, client).await;
                            post(&mailbox, Event::LookupReply(reply));
                        }));
                    }
                }
                Command::RequestPartitions {
                    lookup,
                    partitions,
                    urgent,
                } => {
                    if let Some(index) = self.collaborators.index.clone() {
                        self.deliver(Role::Index, async move {
                            index.request_partitions(lookup, partitions, urgent).await
                        });
                    }
                }
                Command::ForwardHits(hits) => {
                    match (self.collaborators.archive.clone(), self.client()) {
                        (Some(archive), Some(client)) => self.deliver(Role::Archive, async move {
                            archive.lookup(hits, client).await
                        }),
                        _ => log::warn!(
                            "{} cannot forward hits without archive",
                            self.coordinator.name()
                        ),
                    }
                }
                Command::AnnounceToArchive => {
                    if let (Some(archive), Some(client)) =
                        (self.collaborators.archive.clone(), self.client())
                    {
                        self.deliver(Role::Archive, async move {
                            archive.register_client(client).await
                        });
                    }
                }
                Command::AnnounceToAccountant { name } => {
                    if let Some(accountant) = self.collaborators.accountant.clone() {
                        self.deliver(Role::Accountant, async move {
                            accountant.announce(&name).await
                        });
                    }
                }
                Command::Report(report) => {
                    if let Some(accountant) = self.collaborators.accountant.clone() {
                        self.deliver(Role::Accountant, async move {
                            accountant.report(report).await
                        });
                    }
                }
                Command::PublishProgress { name, progress } => {
                    if let Some(subscriber) = self.collaborators.subscriber.clone() {
                        self.deliver(Role::StatisticsSubscriber, async move {
                            subscriber.publish(&name, progress).await
                        });
                    }
                }
                Command::Watch { id, role } => self.watch(id, role),
                Command::Unwatch(id) => {
                    if let Some(task) = self.watchers.remove(&id) {
                        task.abort();
                    }
                }
                Command::Terminate(reason) => {
                    if let Some(task) = self.lookup_task.take() {
                        task.abort();
                    }
                    for (_, task) in self.watchers.drain() {
                        task.abort();
                    }
                    return Some(reason);
                }
            }
        }
        None
    }

    fn watch(&mut self, id: WatchId, role: Role) {
        let mailbox = self.mailbox.clone();
        let task = match role {
            Role::Index => self.collaborators.index.clone().map(|index| {
                tokio::spawn(async move {
                    index.closed().await;
                    post(&mailbox, Event::Down(id));
                })
            }),
            Role::Archive => self.collaborators.archive.clone().map(|archive| {
                tokio::spawn(async move {
                    archive.closed().await;
                    post(&mailbox, Event::Down(id));
                })
            }),
            Role::Sink => self.collaborators.sink.clone().map(|sink| {
                tokio::spawn(async move {
                    sink.closed().await;
                    post(&mailbox, Event::Down(id));
                })
            }),
            Role::Accountant | Role::StatisticsSubscriber => None,
        };
        match task {
            Some(task) => {
                log::debug!("{} watches {} as {}", self.coordinator.name(), role, id);
                self.watchers.insert(id, task);
            }
            None => log::warn!("{} has no {} to watch", self.coordinator.name(), role),
        }
    }
}
