//! End-to-end tests driving coordinators on the tokio runtime
//!
//! Index and archive are in-memory services posting to the coordinator
//! mailbox, so hits regularly overtake the lookup reply.

#[path = "testutils/mod.rs"]
mod testutils;

use async_trait::async_trait;
use sieve::batch::Batch;
use sieve::coordinator::{ExitReason, QueryOptions, Role, StatusVerbosity};
use sieve::error::CoordinatorError;
use sieve::runtime::{spawn, ResultSink};
use sieve::sinks::CollectingSink;
use sieve::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use testutils::fixtures::*;
use testutils::memory_services::*;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Cluster {
    index: Arc<MemoryIndex>,
    archive: Arc<MemoryArchive>,
    sink: Arc<CollectingSink>,
}

/// 4 partitions of 50 rows, 10 rows per partition match `port < 10`
fn cluster(initial: u32) -> Cluster {
    let batches = partitions(4, 50);
    Cluster {
        index: Arc::new(MemoryIndex::new(partition_hits(&batches), initial)),
        archive: Arc::new(MemoryArchive::new(batches)),
        sink: Arc::new(CollectingSink::new()),
    }
}

async fn wait_for_rows(sink: &CollectingSink, rows: u64) {
    tokio::time::timeout(TIMEOUT, async {
        while sink.rows() < rows {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("sink received rows in time");
}

#[tokio::test]
async fn test_historical_query_ships_all_matches() {
    init_logging();
    let cluster = cluster(2);
    let accountant = Arc::new(RecordingAccountant::default());
    let subscriber = Arc::new(RecordingSubscriber::default());

    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::historical()));
    handle.register_sink(cluster.sink.clone()).unwrap();
    handle.register_index(cluster.index.clone()).unwrap();
    handle.register_archive(cluster.archive.clone()).unwrap();
    handle.register_accountant(accountant.clone()).unwrap();
    handle
        .register_statistics_subscriber(subscriber.clone())
        .unwrap();
    handle.run().unwrap();
    handle.extract_all().unwrap();

    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Normal);

    assert_eq!(cluster.sink.rows(), 40);
    assert!(cluster
        .sink
        .column(0)
        .iter()
        .all(|port| matches!(port, Value::Count(p) if *p < 10)));
    assert_eq!(cluster.archive.registered_clients(), 1);
    assert_eq!(cluster.archive.lookups(), 4);
    assert_eq!(cluster.index.delivered(), 4);
    // One follow-up request for the last two partitions, then the stop signal
    assert_eq!(cluster.index.requests(), vec![(2, false), (0, true)]);

    assert_eq!(accountant.names(), vec!["test-query".to_string()]);
    let report = accountant.last_with("coordinator.selectivity").unwrap();
    assert_eq!(
        report.get("coordinator.processed"),
        Some(&sieve::coordinator::MetricValue::Count(200))
    );
    assert_eq!(
        report.get("coordinator.shipped"),
        Some(&sieve::coordinator::MetricValue::Count(40))
    );
    assert!(accountant.last_with("coordinator.hits.first").is_some());

    let snapshots = subscriber.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].1.received, 4);
    assert_eq!(snapshots[0].1.shipped, 40);
}

#[tokio::test]
async fn test_bounded_demand_is_never_exceeded() {
    init_logging();
    let cluster = cluster(2);
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::historical()));
    handle.register_sink(cluster.sink.clone()).unwrap();
    handle.register_index(cluster.index.clone()).unwrap();
    handle.register_archive(cluster.archive.clone()).unwrap();
    handle.run().unwrap();
    handle.extract(15).unwrap();

    wait_for_rows(&cluster.sink, 15).await;
    let status = handle.status(StatusVerbosity::Detailed).await.unwrap();
    assert_eq!(cluster.sink.rows(), 15);
    assert_eq!(status["coordinator"]["progress"]["shipped"], 15);
    assert_eq!(status["queries"][0]["expression"], "port < 10");

    handle.extract_all().unwrap();
    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Normal);
    assert_eq!(cluster.sink.rows(), 40);

    // Shipped rows keep arrival order within each partition
    let ids = cluster.sink.ids();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn test_zero_partitions_finishes_without_results() {
    init_logging();
    let index = Arc::new(MemoryIndex::new(Vec::new(), 2));
    let archive = Arc::new(MemoryArchive::new(Vec::new()));
    let sink = Arc::new(CollectingSink::new());

    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::historical()));
    handle.register_sink(sink.clone()).unwrap();
    handle.register_index(index.clone()).unwrap();
    handle.register_archive(archive.clone()).unwrap();
    handle.run().unwrap();

    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Normal);
    assert_eq!(sink.rows(), 0);
    assert_eq!(archive.lookups(), 0);
}

#[tokio::test]
async fn test_index_failure_terminates_with_error() {
    init_logging();
    let index = Arc::new(MemoryIndex::failing("partition table unavailable"));
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::historical()));
    handle.register_sink(Arc::new(CollectingSink::new())).unwrap();
    handle.register_index(index).unwrap();
    handle
        .register_archive(Arc::new(MemoryArchive::new(Vec::new())))
        .unwrap();
    handle.run().unwrap();

    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(
        reason,
        ExitReason::Error(CoordinatorError::index("partition table unavailable"))
    );
}

#[tokio::test]
async fn test_sink_disconnect_terminates_query() {
    init_logging();
    let cluster = cluster(2);
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::historical()));
    handle.register_sink(cluster.sink.clone()).unwrap();
    handle.register_index(cluster.index.clone()).unwrap();
    handle.register_archive(cluster.archive.clone()).unwrap();
    handle.run().unwrap();

    // No demand: the query idles after the first partitions
    handle.status(StatusVerbosity::Quiet).await.unwrap();
    cluster.sink.disconnect();

    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Disconnected(Role::Sink));
    assert!(handle.extract_all().is_err());
    assert!(handle.status(StatusVerbosity::Info).await.is_err());
}

#[tokio::test]
async fn test_index_disconnect_only_ends_continuous_queries() {
    init_logging();
    let index = Arc::new(MemoryIndex::new(Vec::new(), 0));
    let sink = Arc::new(CollectingSink::new());
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::continuous()));
    handle.register_sink(sink.clone()).unwrap();
    handle.register_index(index.clone()).unwrap();
    handle.run().unwrap();
    handle.status(StatusVerbosity::Quiet).await.unwrap();

    index.disconnect();
    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Disconnected(Role::Index));
}

#[tokio::test]
async fn test_continuous_query_filters_ingested_batches() {
    init_logging();
    let sink = Arc::new(CollectingSink::new());
    let accountant = Arc::new(RecordingAccountant::default());
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::continuous()));
    handle.register_sink(sink.clone()).unwrap();
    handle.register_accountant(accountant.clone()).unwrap();
    handle.run().unwrap();
    handle.extract_all().unwrap();

    handle.push_batch(conn_batch(0, 50)).unwrap();
    handle.push_batch(conn_batch(50, 50)).unwrap();
    wait_for_rows(&sink, 20).await;

    handle.exit(ExitReason::Normal).unwrap();
    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Normal);

    let report = accountant.last_with("coordinator.results").unwrap();
    assert_eq!(
        report.get("coordinator.results"),
        Some(&sieve::coordinator::MetricValue::Count(20))
    );
}

#[tokio::test]
async fn test_kill_skips_final_report() {
    init_logging();
    let sink = Arc::new(CollectingSink::new());
    let accountant = Arc::new(RecordingAccountant::default());
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::continuous()));
    handle.register_sink(sink).unwrap();
    handle.register_accountant(accountant.clone()).unwrap();
    handle.run().unwrap();
    handle.exit(ExitReason::Kill).unwrap();

    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Kill);
    assert!(accountant.reports().is_empty());
}

/// Sink whose deliveries never complete
#[derive(Default)]
struct StalledSink {
    started: AtomicU64,
    release: Notify,
}

#[async_trait]
impl ResultSink for StalledSink {
    async fn ship(&self, _batch: Batch) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
    }
}

#[tokio::test]
async fn test_stalled_sink_does_not_block_mailbox() {
    init_logging();
    let sink = Arc::new(StalledSink::default());
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::continuous()));
    handle.register_sink(sink.clone()).unwrap();
    handle.run().unwrap();
    handle.extract_all().unwrap();
    handle.push_batch(conn_batch(0, 50)).unwrap();
    handle.push_batch(conn_batch(50, 50)).unwrap();

    let status = tokio::time::timeout(TIMEOUT, handle.status(StatusVerbosity::Detailed))
        .await
        .expect("status answered while the sink is stuck")
        .unwrap();
    assert_eq!(status["coordinator"]["progress"]["shipped"], 20);
    tokio::time::timeout(TIMEOUT, async {
        while sink.started.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first delivery started");
    handle.status(StatusVerbosity::Quiet).await.unwrap();
    assert_eq!(sink.started.load(Ordering::SeqCst), 1);

    handle.exit(ExitReason::Kill).unwrap();
    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Kill);
}

#[tokio::test]
async fn test_dropping_every_handle_kills_query() {
    init_logging();
    let sink = Arc::new(CollectingSink::new());
    let accountant = Arc::new(RecordingAccountant::default());
    let (handle, done) = spawn(coordinator(low_ports(), QueryOptions::continuous()));
    handle.register_sink(sink.clone()).unwrap();
    handle.register_accountant(accountant.clone()).unwrap();
    handle.run().unwrap();
    handle.status(StatusVerbosity::Quiet).await.unwrap();
    drop(handle);

    let reason = tokio::time::timeout(TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Kill);
    assert!(accountant.reports().is_empty());
}
