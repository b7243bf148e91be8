// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Strategy factory registry and discovery.
//!
//! - [`StrategyRegistry`]: maps a kind string such as `codec::reorder_decoder` to a factory
//! - [`StrategyDefinition`]: serializable metadata, including a JSON schema of the params

use crate::strategy::Strategy;
use codeckit_core::error::{CodecError, Result};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Builds a strategy from optional JSON params.
pub type StrategyFactory =
    Arc<dyn Fn(Option<&serde_json::Value>) -> Result<Box<dyn Strategy>> + Send + Sync>;

/// A serializable representation of a registered strategy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StrategyDefinition {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub param_schema: serde_json::Value,
    /// Hierarchical categories (e.g., `["video", "decoder"]`)
    pub categories: Vec<String>,
}

#[derive(Clone)]
struct StrategyInfo {
    factory: StrategyFactory,
    param_schema: serde_json::Value,
    categories: Vec<String>,
    description: Option<String>,
}

/// Registered strategy kinds, in registration order.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    info: IndexMap<String, StrategyInfo>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a strategy kind.
    pub fn register<F>(
        &mut self,
        kind: &str,
        factory: F,
        param_schema: serde_json::Value,
        categories: Vec<String>,
        description: impl Into<String>,
    ) where
        F: Fn(Option<&serde_json::Value>) -> Result<Box<dyn Strategy>> + Send + Sync + 'static,
    {
        let replaced = self.info.insert(
            kind.to_string(),
            StrategyInfo {
                factory: Arc::new(factory),
                param_schema,
                categories,
                description: Some(description.into()),
            },
        );
        if replaced.is_some() {
            tracing::warn!(kind, "Strategy kind registered twice, keeping the last one");
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.info.contains_key(kind)
    }

    /// Creates a strategy instance.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if `kind` is unknown, or whatever the factory
    /// returns for invalid params.
    pub fn create(&self, kind: &str, params: Option<&serde_json::Value>) -> Result<Box<dyn Strategy>> {
        self.info.get(kind).map_or_else(
            || Err(CodecError::Configuration(format!("Strategy kind '{kind}' not found in registry"))),
            |info| (info.factory)(params),
        )
    }

    /// Returns a list of definitions for all registered strategies.
    pub fn definitions(&self) -> Vec<StrategyDefinition> {
        self.info
            .iter()
            .map(|(kind, info)| StrategyDefinition {
                kind: kind.clone(),
                description: info.description.clone(),
                param_schema: info.param_schema.clone(),
                categories: info.categories.clone(),
            })
            .collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry").field("kinds", &self.info.keys().collect::<Vec<_>>()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::strategy::WorkContext;
    use codeckit_core::DrainMode;

    struct Noop;

    impl Strategy for Noop {
        fn process(&mut self, _ctx: &mut WorkContext<'_>) -> Result<()> {
            Ok(())
        }

        fn drain(&mut self, _mode: DrainMode, _ctx: &mut WorkContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn create_unknown_kind_is_configuration_error() {
        let registry = StrategyRegistry::new();
        assert!(matches!(registry.create("codec::missing", None), Err(CodecError::Configuration(_))));
    }

    #[test]
    fn definitions_keep_registration_order() {
        let mut registry = StrategyRegistry::new();
        for kind in ["b::second", "a::first"] {
            registry.register(
                kind,
                |_| Ok(Box::new(Noop) as Box<dyn Strategy>),
                serde_json::json!({}),
                vec!["test".to_string()],
                "does nothing",
            );
        }
        let kinds: Vec<String> = registry.definitions().into_iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec!["b::second", "a::first"]);
        assert!(registry.contains("a::first"));
        assert!(registry.create("a::first", None).is_ok());
    }
}
