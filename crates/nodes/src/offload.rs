// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A simulated hardware encoder.
//!
//! Work is handed to a device thread that batches jobs and completes each batch in reverse
//! submission order through a [`Completer`], the way an accelerator with reordering
//! returns frames on its own schedule.

use bytes::Bytes;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{config_helpers, Buffer, DrainMode, WorkFlags};
use codeckit_engine::{Completer, Strategy, WorkContext};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a drain waits for the device to hand back what it holds.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Deserialize, Debug, JsonSchema)]
#[serde(default)]
pub struct OffloadConfig {
    /// Jobs collected before the device emits a batch (default: 1)
    pub batch_size: usize,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self { batch_size: 1 }
    }
}

struct EncodeJob {
    frame_index: u64,
    data: Bytes,
    eos: bool,
    completer: Completer,
}

enum DeviceJob {
    Encode(EncodeJob),
    /// Emit everything held, in submission order, then acknowledge.
    Drain { eos: bool, done: std_mpsc::Sender<usize> },
    /// Drop everything held without completing it.
    Reset,
}

struct Device {
    jobs_tx: mpsc::UnboundedSender<DeviceJob>,
    handle: JoinHandle<()>,
}

pub struct OffloadStrategy {
    config: OffloadConfig,
    device: Option<Device>,
}

impl OffloadStrategy {
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] if `batch_size` is zero.
    pub fn new(config: OffloadConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(CodecError::Configuration("batch_size must be greater than 0".to_string()));
        }
        Ok(Self { config, device: None })
    }

    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] for malformed params.
    pub fn from_params(params: Option<&serde_json::Value>) -> Result<Self> {
        Self::new(config_helpers::parse_config_optional(params)?)
    }

    fn send(&self, job: DeviceJob) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| CodecError::BadState("offload device is not running".to_string()))?;
        device
            .jobs_tx
            .send(job)
            .map_err(|_| CodecError::CorruptedState("offload device thread exited".to_string()))
    }

    fn shutdown_device(&mut self) {
        let Some(Device { jobs_tx, handle }) = self.device.take() else { return };
        drop(jobs_tx);
        if handle.join().is_err() {
            tracing::warn!("Offload device thread panicked");
        }
    }
}

impl Strategy for OffloadStrategy {
    fn on_init(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let batch_size = self.config.batch_size;
        let handle = std::thread::Builder::new()
            .name("offload-device".to_string())
            .spawn(move || run_device(jobs_rx, batch_size))
            .map_err(|e| CodecError::NoMemory(format!("failed to spawn device thread: {e}")))?;
        tracing::debug!(batch_size, "Offload device started");
        self.device = Some(Device { jobs_tx, handle });
        Ok(())
    }

    fn on_stop(&mut self) -> Result<()> {
        self.send(DeviceJob::Reset)
    }

    fn on_flush(&mut self) -> Result<()> {
        self.send(DeviceJob::Reset)
    }

    fn on_reset(&mut self) {
        self.shutdown_device();
    }

    fn on_release(&mut self) {
        self.shutdown_device();
    }

    fn process(&mut self, ctx: &mut WorkContext<'_>) -> Result<()> {
        let Some(work) = ctx.work() else { return Ok(()) };
        let job = EncodeJob {
            frame_index: work.frame_index,
            data: work.input.first().map(|b| b.data().clone()).unwrap_or_default(),
            eos: work.is_end_of_stream(),
            completer: ctx.completer()?,
        };
        self.send(DeviceJob::Encode(job))
    }

    fn drain(&mut self, mode: DrainMode, _ctx: &mut WorkContext<'_>) -> Result<()> {
        let (done, done_rx) = std_mpsc::channel();
        self.send(DeviceJob::Drain { eos: mode == DrainMode::ComponentWithEos, done })?;
        match done_rx.recv_timeout(DRAIN_TIMEOUT) {
            Ok(emitted) => {
                tracing::debug!(mode = mode.as_str(), emitted, "Offload device drained");
                Ok(())
            },
            Err(_) => Err(CodecError::BadState("offload device did not answer the drain".to_string())),
        }
    }
}

fn run_device(mut jobs_rx: mpsc::UnboundedReceiver<DeviceJob>, batch_size: usize) {
    let mut held: Vec<EncodeJob> = Vec::with_capacity(batch_size);

    while let Some(job) = jobs_rx.blocking_recv() {
        match job {
            DeviceJob::Encode(job) => {
                let eos = job.eos;
                held.push(job);
                if eos {
                    emit_in_order(&mut held, true);
                } else if held.len() >= batch_size {
                    for job in held.drain(..).rev() {
                        complete(job, WorkFlags::NONE);
                    }
                }
            },
            DeviceJob::Drain { eos, done } => {
                let emitted = held.len();
                if eos && held.is_empty() {
                    tracing::warn!("Drain with EOS found nothing held to carry the flag");
                }
                emit_in_order(&mut held, eos);
                let _ = done.send(emitted);
            },
            DeviceJob::Reset => {
                tracing::debug!(dropped = held.len(), "Offload device reset");
                held.clear();
            },
        }
    }
    tracing::debug!("Offload device stopped");
}

fn emit_in_order(held: &mut Vec<EncodeJob>, eos_on_last: bool) {
    let count = held.len();
    for (i, job) in held.drain(..).enumerate() {
        let flags =
            if eos_on_last && i + 1 == count { WorkFlags::END_OF_STREAM } else { WorkFlags::NONE };
        complete(job, flags);
    }
}

fn complete(job: EncodeJob, flags: WorkFlags) {
    let EncodeJob { frame_index, data, completer, .. } = job;
    let output = if data.is_empty() { Vec::new() } else { vec![Buffer::linear(data)] };
    if !completer.finish(frame_index, move |work| work.complete(output, flags)) {
        tracing::debug!(frame_index, "Component went away before the device finished");
    }
}
