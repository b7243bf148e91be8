// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Component configuration.

use crate::constants::{DEFAULT_COMPONENT_NAME, DEFAULT_RELEASE_TIMEOUT_MS, THREAD_NAME_PREFIX};
use codeckit_core::error::{CodecError, Result};
use codeckit_core::BlockPoolConfig;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Component`](crate::Component).
///
/// Every field is optional when deserializing:
///
/// ```yaml
/// name: h264-dec
/// release_timeout_ms: 2000
/// pool:
///   bucket_sizes: [65536, 3110400]
///   max_outstanding: 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ComponentConfig {
    /// Component name used in logs and metric labels
    pub name: String,
    /// Processing thread name (default: `codec:<name>`)
    pub thread_name: Option<String>,
    /// How long `release()` waits for the processing thread to exit
    pub release_timeout_ms: u64,
    /// Settings for the default block pool
    pub pool: BlockPoolConfig,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMPONENT_NAME.to_string(),
            thread_name: None,
            release_timeout_ms: DEFAULT_RELEASE_TIMEOUT_MS,
            pool: BlockPoolConfig::default(),
        }
    }
}

impl ComponentConfig {
    /// Creates a default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if the document is malformed or the name is empty.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_saphyr::from_str(yaml)
            .map_err(|e| CodecError::Configuration(format!("Failed to parse component config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] for an empty name or an empty bucket list.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CodecError::Configuration("component name must not be empty".to_string()));
        }
        if self.pool.bucket_sizes.is_empty() {
            return Err(CodecError::Configuration(
                "pool.bucket_sizes must list at least one size".to_string(),
            ));
        }
        Ok(())
    }

    pub fn thread_name(&self) -> String {
        self.thread_name.clone().unwrap_or_else(|| format!("{THREAD_NAME_PREFIX}{}", self.name))
    }

    pub const fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }
}
