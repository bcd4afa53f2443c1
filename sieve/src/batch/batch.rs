// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Immutable columnar batches
//!
//! Column data is shared behind an `Arc`; slicing, splitting and selecting
//! only produce new views over the same columns.

use super::schema::Schema;
use super::selection::Selection;
use super::value::Value;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while assembling a batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("Column count mismatch: schema has {expected} fields, got {got} columns")]
    ColumnCount { expected: usize, got: usize },

    #[error("Column '{column}' has {got} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("Column '{column}' row {row}: expected {expected}, got {got}")]
    TypeMismatch {
        column: String,
        row: usize,
        expected: String,
        got: String,
    },
}

/// An ordered, immutable sequence of rows sharing one schema
///
/// Row `i` of a batch carries the global identifier `offset() + i`.
#[derive(Debug, Clone)]
pub struct Batch {
    schema: Arc<Schema>,
    columns: Arc<Vec<Vec<Value>>>,
    /// Global id of row 0 of the underlying columns
    base: u64,
    /// First visible row within the columns
    start: usize,
    /// Number of visible rows
    rows: usize,
}

impl Batch {
    /// Build a batch from column-major data
    ///
    /// Every column must match the schema's field type or be null.
    pub fn try_new(
        schema: Arc<Schema>,
        offset: u64,
        columns: Vec<Vec<Value>>,
    ) -> Result<Self, BatchError> {
        if columns.len() != schema.len() {
            return Err(BatchError::ColumnCount {
                expected: schema.len(),
                got: columns.len(),
            });
        }
        let rows = columns.first().map(Vec::len).unwrap_or(0);
        for (field, column) in schema.fields.iter().zip(&columns) {
            if column.len() != rows {
                return Err(BatchError::ColumnLength {
                    column: field.name.clone(),
                    expected: rows,
                    got: column.len(),
                });
            }
            for (row, value) in column.iter().enumerate() {
                match value.data_type() {
                    Some(data_type) if data_type != field.data_type => {
                        return Err(BatchError::TypeMismatch {
                            column: field.name.clone(),
                            row,
                            expected: field.data_type.to_string(),
                            got: data_type.to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(Self {
            schema,
            columns: Arc::new(columns),
            base: offset,
            start: 0,
            rows,
        })
    }

    /// Build a batch from row-major data
    pub fn from_rows(
        schema: Arc<Schema>,
        offset: u64,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, BatchError> {
        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); schema.len()];
        for row in rows {
            if row.len() != schema.len() {
                return Err(BatchError::ColumnCount {
                    expected: schema.len(),
                    got: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Self::try_new(schema, offset, columns)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows(&self) -> u64 {
        self.rows as u64
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Global identifier of the first row
    pub fn offset(&self) -> u64 {
        self.base + self.start as u64
    }

    /// Global identifiers covered by this batch
    pub fn ids(&self) -> Range<u64> {
        self.offset()..self.offset() + self.rows()
    }

    /// Value at local `row` of column `column`
    pub fn value(&self, row: u64, column: usize) -> Option<&Value> {
        if row >= self.rows() {
            return None;
        }
        self.columns
            .get(column)
            .and_then(|values| values.get(self.start + row as usize))
    }

    /// Materialize local `row` as an owned record
    pub fn row(&self, row: u64) -> Option<Vec<Value>> {
        if row >= self.rows() {
            return None;
        }
        let index = self.start + row as usize;
        Some(
            self.columns
                .iter()
                .map(|column| column[index].clone())
                .collect(),
        )
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.rows()).filter_map(move |row| self.row(row))
    }

    /// View over local rows `[begin, begin + len)`, clamped to the batch
    pub fn slice(&self, begin: u64, len: u64) -> Batch {
        let begin = begin.min(self.rows());
        let len = len.min(self.rows() - begin);
        Batch {
            schema: self.schema.clone(),
            columns: self.columns.clone(),
            base: self.base,
            start: self.start + begin as usize,
            rows: len as usize,
        }
    }

    /// Split into the first `k` rows and the remaining `rows() - k` rows
    pub fn split(&self, k: u64) -> (Batch, Batch) {
        let k = k.min(self.rows());
        (self.slice(0, k), self.slice(k, self.rows() - k))
    }

    /// One sub-batch per contiguous run of selected local offsets
    pub fn select(&self, selection: &Selection) -> Vec<Batch> {
        selection
            .runs()
            .into_iter()
            .filter(|run| *run.start() < self.rows())
            .map(|run| {
                let len = (run.end() - run.start()).saturating_add(1);
                self.slice(*run.start(), len)
            })
            .collect()
    }
}
