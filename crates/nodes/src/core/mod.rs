// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use codeckit_engine::StrategyRegistry;

#[cfg(feature = "passthrough")]
pub mod passthrough;

/// Registers the codec-agnostic strategies.
///
/// # Panics
///
/// Panics if config schemas cannot be serialized to JSON (should never happen).
#[allow(clippy::expect_used)] // Schema serialization should never fail for valid types
pub fn register_core_strategies(registry: &mut StrategyRegistry) {
    // --- Register PassthroughStrategy ---
    #[cfg(feature = "passthrough")]
    {
        use passthrough::{PassthroughConfig, PassthroughStrategy};
        use schemars::schema_for;

        registry.register(
            "core::passthrough",
            |params| {
                let _config: PassthroughConfig =
                    codeckit_core::config_helpers::parse_config_optional(params)?;
                Ok(Box::new(PassthroughStrategy))
            },
            serde_json::to_value(schema_for!(PassthroughConfig))
                .expect("PassthroughConfig schema should serialize to JSON"),
            vec!["core".to_string()],
            "Copies input buffers to the output unchanged and completes each item in place. \
             Useful for testing component wiring.",
        );
    }
}
