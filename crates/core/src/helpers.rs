// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Utility functions for strategy configuration.

use crate::error::CodecError;

/// Helper functions for parsing strategy configuration from JSON values.
pub mod config_helpers {
    use super::CodecError;
    use serde::Deserialize;

    /// Parses configuration from an optional JSON value, using defaults if not provided.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Configuration` if `params` is present but malformed.
    pub fn parse_config_optional<T>(params: Option<&serde_json::Value>) -> Result<T, CodecError>
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        match params {
            None | Some(serde_json::Value::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| CodecError::Configuration(format!("Failed to parse config: {e}"))),
        }
    }

    /// Parses configuration from an optional JSON value, returning an error if not provided.
    /// Use this for strategies that require explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Configuration` if `params` is `None` or if deserialization fails.
    pub fn parse_config_required<T>(params: Option<&serde_json::Value>) -> Result<T, CodecError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = params
            .ok_or_else(|| CodecError::Configuration("Configuration required".to_string()))?
            .clone();
        serde_json::from_value(value)
            .map_err(|e| CodecError::Configuration(format!("Failed to parse config: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::config_helpers::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq, Eq)]
    #[serde(default)]
    struct Params {
        latency: usize,
    }

    #[test]
    fn optional_uses_default_when_absent() {
        let params: Params = parse_config_optional(None).unwrap();
        assert_eq!(params, Params::default());
    }

    #[test]
    fn optional_rejects_malformed_params() {
        let value = serde_json::json!({ "latency": "two" });
        assert!(parse_config_optional::<Params>(Some(&value)).is_err());
    }

    #[test]
    fn required_needs_params() {
        assert!(parse_config_required::<Params>(None).is_err());
        let value = serde_json::json!({ "latency": 2 });
        assert_eq!(parse_config_required::<Params>(Some(&value)).unwrap(), Params { latency: 2 });
    }
}
