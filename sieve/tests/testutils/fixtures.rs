//! Sample data and coordinator builders

use sieve::batch::{Batch, DataType, Field, Schema, Selection, Value};
use sieve::coordinator::{Event, LookupId, LookupReply, QueryCoordinator, QueryOptions, Role};
use sieve::expr::{Expression, RelOp};
use sieve::CoordinatorConfig;
use std::sync::Arc;

/// `conn { port: count, proto: string }`
pub fn conn_schema() -> Arc<Schema> {
    Arc::new(Schema::new(
        "conn",
        vec![
            Field::new("port", DataType::Count),
            Field::new("proto", DataType::String),
        ],
    ))
}

/// Rows `[offset, offset + rows)` where `port = id % 50`
pub fn conn_batch(offset: u64, rows: u64) -> Batch {
    let ports = (offset..offset + rows).map(|id| Value::Count(id % 50)).collect();
    let protos = (offset..offset + rows)
        .map(|id| Value::from(if id % 2 == 0 { "tcp" } else { "udp" }))
        .collect();
    Batch::try_new(conn_schema(), offset, vec![ports, protos]).expect("valid batch")
}

/// One batch per partition, each `rows` long and densely numbered
pub fn partitions(count: u64, rows: u64) -> Vec<Batch> {
    (0..count).map(|p| conn_batch(p * rows, rows)).collect()
}

/// Row identifiers of every batch, one selection per partition
pub fn partition_hits(batches: &[Batch]) -> Vec<Selection> {
    batches.iter().map(|b| Selection::from_range(b.ids())).collect()
}

/// `port < 10`
pub fn low_ports() -> Expression {
    Expression::field("port", RelOp::Less, Value::Count(10))
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn coordinator(expr: Expression, options: QueryOptions) -> QueryCoordinator {
    QueryCoordinator::new(expr, options, CoordinatorConfig::named("test-query"))
        .expect("valid coordinator")
}

/// Historical coordinator with sink, index and archive registered
pub fn registered(expr: Expression) -> QueryCoordinator {
    let mut coordinator = coordinator(expr, QueryOptions::historical());
    for role in [Role::Sink, Role::Index, Role::Archive] {
        coordinator.handle(Event::Register(role));
    }
    coordinator
}

pub fn lookup_reply(partitions: u32, scheduled: u32) -> Event {
    Event::LookupReply(Ok(LookupReply {
        lookup: LookupId::new(),
        partitions,
        scheduled,
    }))
}
