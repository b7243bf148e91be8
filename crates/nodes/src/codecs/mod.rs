// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use codeckit_engine::StrategyRegistry;
use schemars::schema_for;

pub mod decoder;
pub mod encoder;
pub mod framing;

use decoder::{ReorderDecoderConfig, ReorderDecoderStrategy};
use encoder::{FramingEncoderConfig, FramingEncoderStrategy};

/// Registers the framing encoder/decoder pair.
///
/// # Panics
///
/// Panics if config schemas cannot be serialized to JSON (should never happen).
#[allow(clippy::expect_used)] // Schema serialization should never fail for valid types
pub fn register_codec_strategies(registry: &mut StrategyRegistry) {
    registry.register(
        "codec::framing_encoder",
        |params| Ok(Box::new(FramingEncoderStrategy::from_params(params)?)),
        serde_json::to_value(schema_for!(FramingEncoderConfig))
            .expect("FramingEncoderConfig schema should serialize to JSON"),
        vec!["codecs".to_string(), "encoder".to_string()],
        "Wraps each input in a length-prefixed frame, preceded by a codec-config output \
         on the first frame of a stream.",
    );

    registry.register(
        "codec::reorder_decoder",
        |params| Ok(Box::new(ReorderDecoderStrategy::from_params(params)?)),
        serde_json::to_value(schema_for!(ReorderDecoderConfig))
            .expect("ReorderDecoderConfig schema should serialize to JSON"),
        vec!["codecs".to_string(), "decoder".to_string()],
        "Parses length-prefixed frames into pool blocks and releases them after a fixed \
         number of newer frames.",
    );
}
