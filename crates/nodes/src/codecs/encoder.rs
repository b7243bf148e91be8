// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use super::framing;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{config_helpers, Buffer, DrainMode, MemoryUsage, WorkFlags};
use codeckit_engine::{Strategy, WorkContext};
use schemars::JsonSchema;
use serde::Deserialize;

/// Default upper bound for a single input payload (1 MiB).
const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

#[derive(Deserialize, Debug, JsonSchema)]
#[serde(default)]
pub struct FramingEncoderConfig {
    /// Send a codec-config output ahead of the first access unit (default: true)
    pub emit_config: bool,
    /// Largest accepted input payload in bytes
    pub max_payload: usize,
}

impl Default for FramingEncoderConfig {
    fn default() -> Self {
        Self { emit_config: true, max_payload: DEFAULT_MAX_PAYLOAD }
    }
}

/// Wraps each input payload in a length-prefixed frame.
///
/// The first frame after init, flush or reset is preceded by a separate codec-config output
/// for the same work item, sent through `clone_and_send`. Every item completes in place,
/// so a drain only flags the marked item END_OF_STREAM when asked to.
pub struct FramingEncoderStrategy {
    config: FramingEncoderConfig,
    config_sent: bool,
}

impl FramingEncoderStrategy {
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if `max_payload` is zero.
    pub fn new(config: FramingEncoderConfig) -> Result<Self> {
        if config.max_payload == 0 {
            return Err(CodecError::Configuration("max_payload must be greater than 0".to_string()));
        }
        Ok(Self { config, config_sent: false })
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] for malformed params.
    pub fn from_params(params: Option<&serde_json::Value>) -> Result<Self> {
        Self::new(config_helpers::parse_config_optional(params)?)
    }
}

impl Strategy for FramingEncoderStrategy {
    fn on_init(&mut self) -> Result<()> {
        self.config_sent = false;
        Ok(())
    }

    fn on_flush(&mut self) -> Result<()> {
        self.config_sent = false;
        Ok(())
    }

    fn on_reset(&mut self) {
        self.config_sent = false;
    }

    fn process(&mut self, ctx: &mut WorkContext<'_>) -> Result<()> {
        let Some(work) = ctx.work() else { return Ok(()) };
        let frame_index = work.frame_index;
        let eos = work.is_end_of_stream();
        let payload = work.input.first().map(|b| b.data().clone()).unwrap_or_default();

        if payload.is_empty() {
            // Nothing to encode; an empty EOS item only carries the flag through.
            let flags = if eos { WorkFlags::END_OF_STREAM } else { WorkFlags::NONE };
            if let Some(work) = ctx.work_mut() {
                work.complete([], flags);
            }
            return Ok(());
        }
        if payload.len() > self.config.max_payload {
            return Err(CodecError::BadValue(format!(
                "payload of {} bytes exceeds max_payload {}",
                payload.len(),
                self.config.max_payload
            )));
        }

        if self.config.emit_config && !self.config_sent {
            let config = Buffer::linear(&framing::CONFIG_MAGIC[..]);
            if ctx.clone_and_send(frame_index, |copy| copy.complete([config], WorkFlags::CODEC_CONFIG)) {
                tracing::debug!(frame_index, "Sent codec config");
                self.config_sent = true;
            }
        }

        let framed_len = framing::framed_len(payload.len());
        let mut block = ctx.pool().fetch_linear_block(framed_len, MemoryUsage::CPU_WRITE)?;
        let written = framing::write_frame(&payload, block.as_mut_slice())?;
        let output = block.into_buffer(0, written)?;

        let flags = if eos { WorkFlags::END_OF_STREAM } else { WorkFlags::NONE };
        if let Some(work) = ctx.work_mut() {
            work.complete([output], flags);
        }
        Ok(())
    }

    fn drain(&mut self, mode: DrainMode, ctx: &mut WorkContext<'_>) -> Result<()> {
        let flagged = mode == DrainMode::ComponentWithEos && ctx.mark_end_of_stream();
        tracing::debug!(mode = mode.as_str(), flagged, "Encoder drain, nothing buffered");
        Ok(())
    }
}
