// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Coordinator configuration

use crate::error::{CoordinatorError, Result};
use serde::{Deserialize, Serialize};

/// Per-query coordinator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Name used in log lines, announcements and statistics
    pub name: String,

    /// Upper bound on partitions asked from the index per request
    pub partitions_per_request: u32,

    /// Emit a telemetry point for every arriving hit-set
    pub hit_telemetry: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "coordinator".to_string(),
            partitions_per_request: 2,
            hit_telemetry: true,
        }
    }
}

impl CoordinatorConfig {
    /// Default configuration with a custom name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON document, falling back to defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoordinatorError::config(format!("Malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.partitions_per_request == 0 {
            return Err(CoordinatorError::config(
                "partitions_per_request must be > 0",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(CoordinatorError::config("name must not be empty"));
        }
        Ok(())
    }
}
