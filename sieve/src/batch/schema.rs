// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Batch schemas
//!
//! A schema is compared and hashed by value, so two batches produced by
//! different components with the same layout share one compiled checker.

use super::value::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Whether `key` names this field, either exactly or as a dotted suffix
    /// (`"orig_h"` and `"id.orig_h"` both match `"id.orig_h"`).
    pub fn matches(&self, key: &str) -> bool {
        self.name == key
            || (self.name.len() > key.len()
                && self.name.ends_with(key)
                && self.name.as_bytes()[self.name.len() - key.len() - 1] == b'.')
    }
}

/// Record layout shared by all rows of a batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column indexes of all fields matching `key`
    pub fn resolve(&self, key: &str) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.matches(key))
            .map(|(i, _)| i)
            .collect()
    }

    /// Column indexes of all fields of type `data_type`
    pub fn columns_of_type(&self, data_type: DataType) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.data_type == data_type)
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}: {}", field.name, field.data_type)?;
        }
        write!(f, " }}")
    }
}
