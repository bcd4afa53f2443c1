// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Async runtime for coordinators
//!
//! This module provides:
//! - Service traits for index, archive, sink, accountant and subscriber
//! - A tokio driver that executes the coordinator's commands

pub mod driver;
pub mod services;

pub use driver::{spawn, CoordinatorHandle};
pub use services::{
    Accountant, ArchiveService, IndexService, Registration, ResultSink, StatisticsSubscriber,
};
