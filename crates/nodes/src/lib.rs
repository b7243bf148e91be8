// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use codeckit_engine::StrategyRegistry;

// Declare the top-level feature modules directly.
#[cfg(feature = "framing")]
pub mod codecs;
pub mod core;
#[cfg(feature = "offload")]
pub mod offload;

#[cfg(test)]
pub mod test_utils;

/// A single function to register all built-in strategies.
///
/// # Panics
///
/// Panics if a config schema cannot be serialized to JSON (should never happen).
#[allow(clippy::expect_used)] // Schema serialization should never fail for valid types
pub fn register_strategies(registry: &mut StrategyRegistry) {
    // Call the registration function for each feature module.
    core::register_core_strategies(registry);
    #[cfg(feature = "framing")]
    codecs::register_codec_strategies(registry);

    #[cfg(feature = "offload")]
    {
        use offload::{OffloadConfig, OffloadStrategy};
        use schemars::schema_for;

        registry.register(
            "codec::offload",
            |params| Ok(Box::new(OffloadStrategy::from_params(params)?)),
            serde_json::to_value(schema_for!(OffloadConfig))
                .expect("OffloadConfig schema should serialize to JSON"),
            vec!["codecs".to_string(), "hardware".to_string()],
            "Hands work to a simulated device thread that completes batches out of order.",
        );
    }

    tracing::info!("Finished registering built-in strategies.");
}
