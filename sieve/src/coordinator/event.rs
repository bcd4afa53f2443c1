// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Inbound events and outbound commands of the coordinator
//!
//! The coordinator never talks to its collaborators directly. Everything it
//! learns arrives as an `Event`; everything it wants done leaves as a
//! `Command` for the runtime to carry out.

use super::progress::QueryProgress;
use super::statistics::Report;
use super::watch::WatchId;
use crate::batch::{Batch, Selection};
use crate::error::{CoordinatorError, Result};
use crate::expr::Expression;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Collaborators a coordinator can be connected to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Partition-selection service
    Index,
    /// Bulk-storage service that materializes hits
    Archive,
    /// Downstream consumer of results
    Sink,
    /// Telemetry sink
    Accountant,
    /// UI subscriber for progress snapshots
    StatisticsSubscriber,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Index => "index",
            Role::Archive => "archive",
            Role::Sink => "sink",
            Role::Accountant => "accountant",
            Role::StatisticsSubscriber => "statistics-subscriber",
        };
        f.write_str(name)
    }
}

/// Which parts of the data a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Query already-ingested data through index and archive
    pub historical: bool,
    /// Keep receiving newly ingested data
    pub continuous: bool,
}

impl QueryOptions {
    pub fn historical() -> Self {
        Self {
            historical: true,
            continuous: false,
        }
    }

    pub fn continuous() -> Self {
        Self {
            historical: false,
            continuous: true,
        }
    }

    /// Historical and continuous at once
    pub fn unified() -> Self {
        Self {
            historical: true,
            continuous: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.historical && !self.continuous {
            return Err(CoordinatorError::config(
                "query must be historical, continuous or both",
            ));
        }
        Ok(())
    }
}

/// Lookup handle assigned by the index to one query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupId(Uuid);

impl LookupId {
    pub fn new() -> Self {
        LookupId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        LookupId(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LookupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LookupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reply to the initial index round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupReply {
    pub lookup: LookupId,
    /// Partitions qualifying for the query
    pub partitions: u32,
    /// Partitions the index already scheduled for the first delivery
    pub scheduled: u32,
}

/// Why a coordinator terminated
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// Query finished or was closed by its client
    Normal,
    /// Forceful termination; no final statistics are reported
    Kill,
    /// A watched collaborator went away
    Disconnected(Role),
    /// Fatal error
    Error(CoordinatorError),
}

impl ExitReason {
    pub fn is_error(&self) -> bool {
        matches!(self, ExitReason::Error(_))
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => write!(f, "normal"),
            ExitReason::Kill => write!(f, "kill"),
            ExitReason::Disconnected(role) => write!(f, "{} disconnected", role),
            ExitReason::Error(err) => write!(f, "error: {}", err),
        }
    }
}

/// Everything the coordinator reacts to
#[derive(Debug, Clone)]
pub enum Event {
    /// Consumer wants every remaining result
    ExtractAll,
    /// Consumer wants `n` more results
    Extract(u64),
    /// A collaborator of the given role was connected
    Register(Role),
    /// Start executing the query
    Run,
    /// Outcome of the initial index round-trip
    LookupReply(std::result::Result<LookupReply, CoordinatorError>),
    /// Rows from the archive or the continuous ingestion stream
    Batch(Batch),
    /// Row identifiers of one partition delivery from the index
    Hits(Selection),
    /// The index finished delivering the scheduled partitions
    IndexDone,
    /// The archive finished one lookup, with an optional error description
    ArchiveDone(Option<String>),
    /// A watched collaborator disconnected
    Down(WatchId),
    /// Terminate with the given reason
    Exit(ExitReason),
}

impl Event {
    /// Short name for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ExtractAll => "extract-all",
            Event::Extract(_) => "extract",
            Event::Register(_) => "register",
            Event::Run => "run",
            Event::LookupReply(_) => "lookup-reply",
            Event::Batch(_) => "batch",
            Event::Hits(_) => "hits",
            Event::IndexDone => "index-done",
            Event::ArchiveDone(_) => "archive-done",
            Event::Down(_) => "down",
            Event::Exit(_) => "exit",
        }
    }
}

/// Everything the coordinator asks the runtime to do
#[derive(Debug, Clone)]
pub enum Command {
    /// Deliver results to the sink
    Ship(Batch),
    /// Start the initial index round-trip for the query expression
    Lookup(Expression),
    /// Ask the index to deliver hits for `partitions` more partitions.
    /// Zero means "stop delivering results for this lookup".
    RequestPartitions {
        lookup: LookupId,
        partitions: u32,
        urgent: bool,
    },
    /// Send hits to the archive, replies come back to this coordinator
    ForwardHits(Selection),
    /// Tell the archive where to push materialized rows
    AnnounceToArchive,
    /// Tell the accountant the coordinator's name
    AnnounceToAccountant { name: String },
    /// Telemetry for the accountant
    Report(Report),
    /// Progress snapshot for the statistics subscriber
    PublishProgress {
        name: String,
        progress: QueryProgress,
    },
    /// Start a liveness subscription
    Watch { id: WatchId, role: Role },
    /// Cancel a liveness subscription
    Unwatch(WatchId),
    /// The coordinator has terminated; no further commands follow
    Terminate(ExitReason),
}

/// Level of detail for status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatusVerbosity {
    Quiet,
    Info,
    Detailed,
    Debug,
}
