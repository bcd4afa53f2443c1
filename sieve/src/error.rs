// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Coordinator error types

use crate::coordinator::Role;
use crate::expr::CompileError;
use thiserror::Error;

/// Errors that terminate a query or prevent it from starting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error("Failed to compile expression for schema '{schema}': {source}")]
    Compile {
        schema: String,
        #[source]
        source: CompileError,
    },

    #[error("Missing collaborator: {0}")]
    MissingCollaborator(Role),

    #[error("Index lookup failed: {0}")]
    Index(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Coordinator is no longer running")]
    Terminated,
}

impl CoordinatorError {
    /// Create an index error
    pub fn index<S: Into<String>>(msg: S) -> Self {
        Self::Index(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CoordinatorError>;
