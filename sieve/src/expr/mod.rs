// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query expressions
//!
//! This module provides:
//! - The expression tree and its printed form
//! - Compilation of an expression to a per-schema checker
//! - Evaluation of a checker against a batch
//! - Taxonomy concept resolution

pub mod ast;
pub mod checker;
pub mod taxonomy;

pub use ast::{Expression, Extractor, Predicate, RelOp};
pub use checker::{compile, evaluate, Checker, CompileError};
pub use taxonomy::{resolve, Taxonomies};
