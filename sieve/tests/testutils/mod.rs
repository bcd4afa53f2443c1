//! Test utilities for Sieve integration tests
//!
//! - memory_services: in-memory index, archive, accountant and subscriber
//! - fixtures: partitioned sample data and coordinator builders

#![allow(dead_code)]

pub mod fixtures;
pub mod memory_services;
