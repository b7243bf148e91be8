// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use super::framing;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{config_helpers, Buffer, DrainMode, MemoryUsage, WorkFlags};
use codeckit_engine::{Strategy, WorkContext};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::VecDeque;

#[derive(Deserialize, Debug, JsonSchema)]
#[serde(default)]
pub struct ReorderDecoderConfig {
    /// Number of decoded frames held back before output, modeling decoder delay (default: 2)
    pub latency: usize,
    /// Reject access units without a preceding codec config (default: false)
    pub require_config: bool,
}

impl Default for ReorderDecoderConfig {
    fn default() -> Self {
        Self { latency: 2, require_config: false }
    }
}

struct Decoded {
    frame_index: u64,
    output: Buffer,
}

/// Strips the framing written by the framing encoder and releases frames with a fixed delay.
///
/// Decoded payloads are copied into blocks from the component's pool and kept there until
/// `latency` newer frames have arrived, so work completes out of its own `process` call,
/// from the pending table. Drains and end-of-stream inputs release everything that is held.
pub struct ReorderDecoderStrategy {
    config: ReorderDecoderConfig,
    held: VecDeque<Decoded>,
    config_seen: bool,
}

impl ReorderDecoderStrategy {
    pub const fn new(config: ReorderDecoderConfig) -> Self {
        Self { config, held: VecDeque::new(), config_seen: false }
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] for malformed params.
    pub fn from_params(params: Option<&serde_json::Value>) -> Result<Self> {
        Ok(Self::new(config_helpers::parse_config_optional(params)?))
    }

    /// Finishes every held frame in decode order, flagging the last one with `last_flags`.
    fn release_held(&mut self, ctx: &mut WorkContext<'_>, last_flags: WorkFlags) {
        while let Some(Decoded { frame_index, output }) = self.held.pop_front() {
            let flags = if self.held.is_empty() { last_flags } else { WorkFlags::NONE };
            if !ctx.finish(frame_index, |work| work.complete([output], flags)) {
                tracing::debug!(frame_index, "Held frame was no longer pending");
            }
        }
    }

    fn decode(&self, ctx: &WorkContext<'_>, frame: &[u8]) -> Result<Buffer> {
        if self.config.require_config && !self.config_seen {
            return Err(CodecError::BadState("access unit before codec config".to_string()));
        }
        let payload = framing::parse_frame(frame)?;
        let mut block = ctx.pool().fetch_linear_block(payload.len(), MemoryUsage::CPU_READ_WRITE)?;
        block.as_mut_slice()[..payload.len()].copy_from_slice(payload);
        block.into_buffer(0, payload.len())
    }
}

impl Strategy for ReorderDecoderStrategy {
    fn on_stop(&mut self) -> Result<()> {
        self.held.clear();
        Ok(())
    }

    fn on_flush(&mut self) -> Result<()> {
        self.held.clear();
        Ok(())
    }

    fn on_reset(&mut self) {
        self.held.clear();
        self.config_seen = false;
    }

    fn process(&mut self, ctx: &mut WorkContext<'_>) -> Result<()> {
        let Some(work) = ctx.work() else { return Ok(()) };
        let frame_index = work.frame_index;
        let eos = work.is_end_of_stream();
        let codec_config = work.is_codec_config();
        let data = work.input.first().map(|b| b.data().clone());

        if codec_config {
            framing::check_config(data.as_deref().unwrap_or_default())?;
            self.config_seen = true;
            tracing::debug!(frame_index, "Consumed codec config");
            if let Some(work) = ctx.work_mut() {
                work.complete([], WorkFlags::NONE);
            }
            return Ok(());
        }

        if let Some(frame) = data.filter(|d| !d.is_empty()) {
            let output = self.decode(ctx, &frame)?;
            self.held.push_back(Decoded { frame_index, output });
        } else if eos {
            // Empty end-of-stream marker: flush the reorder window, then close the stream on
            // this item.
            self.release_held(ctx, WorkFlags::NONE);
            if let Some(work) = ctx.work_mut() {
                work.complete([], WorkFlags::END_OF_STREAM);
            }
            return Ok(());
        } else {
            return Err(CodecError::BadValue(format!("work {frame_index} has no input")));
        }

        if eos {
            self.release_held(ctx, WorkFlags::END_OF_STREAM);
        } else {
            while self.held.len() > self.config.latency {
                if let Some(Decoded { frame_index, output }) = self.held.pop_front() {
                    ctx.finish(frame_index, |work| work.complete([output], WorkFlags::NONE));
                }
            }
        }
        Ok(())
    }

    fn drain(&mut self, mode: DrainMode, ctx: &mut WorkContext<'_>) -> Result<()> {
        tracing::debug!(mode = mode.as_str(), held = self.held.len(), "Decoder drain");
        if mode != DrainMode::ComponentWithEos {
            self.release_held(ctx, WorkFlags::NONE);
        } else if !self.held.is_empty() {
            self.release_held(ctx, WorkFlags::END_OF_STREAM);
        } else if !ctx.mark_end_of_stream() {
            tracing::warn!("Drain with EOS found nothing held to carry the flag");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{eos_work, first_output, linear_work, TestComponent};
    use codeckit_core::{BucketBlockPool, DrainMode, FlushMode, WorkItem};
    use std::sync::Arc;

    fn decoder(latency: usize) -> Box<ReorderDecoderStrategy> {
        Box::new(ReorderDecoderStrategy::new(ReorderDecoderConfig { latency, require_config: false }))
    }

    fn config_work(frame_index: u64) -> WorkItem {
        WorkItem::new(frame_index)
            .with_input(Buffer::linear(&framing::CONFIG_MAGIC[..]))
            .with_flags(WorkFlags::CODEC_CONFIG)
    }

    #[tokio::test]
    async fn frames_are_released_after_latency() {
        let mut harness = TestComponent::start("dec", decoder(2)).await;

        harness
            .component
            .queue(vec![
                config_work(0),
                linear_work(1, b"\0\0\0\x01a"),
                linear_work(2, b"\0\0\0\x01b"),
            ])
            .unwrap();
        let config = harness.next_done().await;
        assert_eq!(config.frame_index, 0);
        assert!(config.worklet().unwrap().output.is_empty());
        harness.assert_quiet().await;

        harness.component.queue(vec![linear_work(3, b"\0\0\0\x01c")]).unwrap();
        let first = harness.next_done().await;
        assert_eq!(first.frame_index, 1);
        assert_eq!(first_output(&first), b"a");

        // 2 and 3 are held with nothing queued, so the drain releases them right away.
        harness.component.drain(DrainMode::ComponentWithEos).unwrap();
        let rest = harness.collect(2).await;
        assert_eq!(rest.iter().map(|w| w.frame_index).collect::<Vec<_>>(), vec![2, 3]);
        assert!(!rest[0].output_flags().contains(WorkFlags::END_OF_STREAM));
        assert!(rest[1].output_flags().contains(WorkFlags::END_OF_STREAM));

        // Whether 4 is still queued or already held, the drain releases it flagged.
        harness.component.queue(vec![linear_work(4, b"\0\0\0\x01d")]).unwrap();
        harness.component.drain(DrainMode::ComponentWithEos).unwrap();
        let last = harness.next_done().await;
        assert_eq!(first_output(&last), b"d");
        assert!(last.output_flags().contains(WorkFlags::END_OF_STREAM));

        harness.release().await;
    }

    #[tokio::test]
    async fn drain_with_nothing_held_flags_the_marked_item() {
        let mut harness = TestComponent::start("dec_drain_config", decoder(2)).await;

        // A codec config completes in place, leaving the reorder window empty.
        harness.component.drain(DrainMode::ComponentWithEos).unwrap();
        harness.component.queue(vec![config_work(0)]).unwrap();
        let done = harness.next_done().await;
        assert_eq!(done.frame_index, 0);
        assert!(done.output_flags().contains(WorkFlags::END_OF_STREAM));

        harness.release().await;
    }

    #[tokio::test]
    async fn empty_eos_input_closes_the_stream() {
        let mut harness = TestComponent::start("dec_eos", decoder(4)).await;

        harness
            .component
            .queue(vec![linear_work(1, b"\0\0\0\x02hi"), linear_work(2, b"\0\0\0\0"), eos_work(3)])
            .unwrap();
        let done = harness.collect(3).await;
        assert_eq!(done.iter().map(|w| w.frame_index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(first_output(&done[0]), b"hi");
        assert!(first_output(&done[1]).is_empty());
        assert!(done[2].output_flags().contains(WorkFlags::END_OF_STREAM));

        harness.release().await;
    }

    #[tokio::test]
    async fn corrupt_framing_fails_the_item() {
        let mut harness = TestComponent::start("dec_corrupt", decoder(0)).await;

        harness
            .component
            .queue(vec![linear_work(1, b"\0\0\0\x09short"), linear_work(2, b"\0\0\0\x02ok")])
            .unwrap();
        let done = harness.collect(2).await;
        assert!(matches!(done[0].error(), Some(CodecError::Corrupted(_))));
        assert_eq!(first_output(&done[1]), b"ok");

        harness.release().await;
    }

    #[tokio::test]
    async fn pool_exhaustion_fails_with_no_memory() {
        // One outstanding block: the first held frame pins it.
        let pool = Arc::new(BucketBlockPool::with_buckets(vec![64], 1, 1));
        let mut harness = TestComponent::start_with_pool("dec_nomem", decoder(1), pool).await;

        harness
            .component
            .queue(vec![linear_work(1, b"\0\0\0\x01a"), linear_work(2, b"\0\0\0\x01b")])
            .unwrap();
        let failed = harness.next_done().await;
        assert_eq!(failed.frame_index, 2);
        assert!(matches!(failed.error(), Some(CodecError::NoMemory(_))));

        let flushed = harness.component.flush(FlushMode::Component).await.unwrap();
        assert_eq!(flushed.iter().map(|w| w.frame_index).collect::<Vec<_>>(), vec![1]);

        harness.release().await;
    }

    #[tokio::test]
    async fn required_config_is_enforced() {
        let strategy = ReorderDecoderStrategy::from_params(Some(&serde_json::json!({
            "latency": 0,
            "require_config": true
        })))
        .unwrap();
        let mut harness = TestComponent::start("dec_strict", Box::new(strategy)).await;

        harness.component.queue(vec![linear_work(1, b"\0\0\0\x01a")]).unwrap();
        assert!(matches!(harness.next_done().await.error(), Some(CodecError::BadState(_))));

        harness.component.queue(vec![config_work(2), linear_work(3, b"\0\0\0\x01b")]).unwrap();
        let done = harness.collect(2).await;
        assert_eq!(first_output(&done[1]), b"b");

        harness.release().await;
    }
}
