// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Compiled checkers keyed by schema
//!
//! Entries are created on first sight of a schema and live as long as the
//! query. Failed compilations are not cached.

use crate::batch::{Batch, Schema, Selection};
use crate::expr::{compile, evaluate, Checker, CompileError, Expression};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

/// Checker cache statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CheckerCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Lazily populated map from schema to compiled checker
#[derive(Debug, Default)]
pub struct CheckerCache {
    checkers: HashMap<Arc<Schema>, Checker>,
    stats: CheckerCacheStats,
}

impl CheckerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checker for `schema`, compiling `expr` on a miss
    pub fn get_or_compile(
        &mut self,
        schema: &Arc<Schema>,
        expr: &Expression,
    ) -> Result<&Checker, CompileError> {
        match self.checkers.entry(schema.clone()) {
            Entry::Occupied(entry) => {
                self.stats.hits += 1;
                Ok(&*entry.into_mut())
            }
            Entry::Vacant(entry) => {
                self.stats.misses += 1;
                let checker = compile(schema, expr)?;
                log::debug!("Compiled checker for schema {}: {:?}", schema.name, checker);
                Ok(&*entry.insert(checker))
            }
        }
    }

    /// Evaluate `expr` against `batch` with the cached checker for its schema
    pub fn select(&mut self, batch: &Batch, expr: &Expression) -> Result<Selection, CompileError> {
        let checker = self.get_or_compile(batch.schema(), expr)?;
        Ok(evaluate(checker, batch))
    }

    /// Number of distinct schemas seen
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    pub fn stats(&self) -> &CheckerCacheStats {
        &self.stats
    }
}
