// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Data primitives shared by every query component
//!
//! This module provides:
//! - Scalar values and data types
//! - Schemas (the key of the checker cache)
//! - Immutable columnar batches with zero-copy splitting
//! - Compressed row selections

#[allow(clippy::module_inception)]
pub mod batch;
pub mod schema;
pub mod selection;
pub mod value;

pub use batch::{Batch, BatchError};
pub use schema::{Field, Schema};
pub use selection::Selection;
pub use value::{DataType, Value};
