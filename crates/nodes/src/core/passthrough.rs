// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use codeckit_core::error::Result;
use codeckit_core::{DrainMode, WorkFlags};
use codeckit_engine::{Strategy, WorkContext};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Deserialize, Debug, Default, JsonSchema)]
#[serde(default)]
pub struct PassthroughConfig {}

/// A strategy that copies every input buffer to the output and completes in place.
/// Useful for exercising the engine without a real codec.
#[derive(Default)]
pub struct PassthroughStrategy;

impl Strategy for PassthroughStrategy {
    fn process(&mut self, ctx: &mut WorkContext<'_>) -> Result<()> {
        let Some(work) = ctx.work_mut() else { return Ok(()) };
        let input = work.input.clone();
        let flags = if work.is_end_of_stream() { WorkFlags::END_OF_STREAM } else { WorkFlags::NONE };
        work.complete(input, flags);
        Ok(())
    }

    fn drain(&mut self, mode: DrainMode, ctx: &mut WorkContext<'_>) -> Result<()> {
        // Nothing is ever held back; only the marked item needs the flag.
        tracing::trace!(mode = mode.as_str(), "Passthrough drain");
        if mode == DrainMode::ComponentWithEos {
            ctx.mark_end_of_stream();
        }
        Ok(())
    }
}
