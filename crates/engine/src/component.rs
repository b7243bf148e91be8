// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Public handle for a running codec component.

use crate::config::ComponentConfig;
use crate::lifecycle::{LifecycleState, ReleasePlan};
use crate::messages::Command;
use crate::processor::ProcessingLoop;
use crate::shared::Shared;
use crate::strategy::Strategy;
use crate::work_queue::DrainMark;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{
    BlockPool, BucketBlockPool, DrainMode, FlushMode, Listener, WorkItem, WorkOutline,
};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A codec component: a [`Strategy`] behind a work queue and a dedicated processing thread.
///
/// `queue`, `drain` and `announce` never block on the strategy and can be called from any
/// thread. `flush` and the lifecycle calls wait for the processing thread to acknowledge.
/// Lifecycle calls are serialized with each other.
///
/// Dropping the handle without calling [`release`](Self::release) asks the processing
/// thread to release the strategy and exit, but does not wait for it.
pub struct Component {
    shared: Arc<Shared>,
    commands_tx: mpsc::UnboundedSender<Command>,
    /// Serializes lifecycle calls; holds the processing thread until release.
    lifecycle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    release_timeout: Duration,
}

impl Component {
    /// Creates a component whose strategy allocates from a [`BucketBlockPool`] built from
    /// `config.pool`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Configuration`] for an invalid config, or
    /// [`CodecError::NoMemory`] if the processing thread cannot be spawned.
    pub fn new(config: &ComponentConfig, strategy: Box<dyn Strategy>) -> Result<Self> {
        let pool = Arc::new(BucketBlockPool::from_config(&config.pool));
        Self::with_pool(config, strategy, pool)
    }

    /// Creates a component with a caller-provided block pool.
    ///
    /// # Errors
    ///
    /// See [`Component::new`].
    pub fn with_pool(
        config: &ComponentConfig,
        strategy: Box<dyn Strategy>,
        pool: Arc<dyn BlockPool>,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(Shared::new(&config.name));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let processing_loop = ProcessingLoop::new(
            shared.clone(),
            strategy,
            pool,
            commands_tx.downgrade(),
            commands_rx,
        );

        let thread = std::thread::Builder::new()
            .name(config.thread_name())
            .spawn(move || processing_loop.run())
            .map_err(|e| CodecError::NoMemory(format!("failed to spawn processing thread: {e}")))?;

        tracing::info!(component = %config.name, "Component created");
        Ok(Self {
            shared,
            commands_tx,
            lifecycle: tokio::sync::Mutex::new(Some(thread)),
            release_timeout: config.release_timeout(),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    /// Replaces the completion sink. Takes effect for the next delivery.
    ///
    /// # Errors
    ///
    /// Fails only if the component's state lock is poisoned.
    pub fn set_listener(&self, listener: Arc<dyn Listener>) -> Result<()> {
        self.shared.lock_exec()?.listener = Some(listener);
        Ok(())
    }

    /// Number of queued plus pending items.
    ///
    /// # Errors
    ///
    /// Fails only if the work lock is poisoned.
    pub fn outstanding(&self) -> Result<usize> {
        let queue = self.shared.lock_work()?;
        Ok(queue.len() + queue.pending().len())
    }

    /// Admits a batch of work, all or nothing.
    ///
    /// # Errors
    ///
    /// - [`CodecError::BadState`] unless running.
    /// - [`CodecError::BadValue`] for an empty batch.
    /// - [`CodecError::Duplicate`] if a frame index is already queued or pending, or repeats
    ///   within `items`. Nothing is queued in that case.
    pub fn queue(&self, items: Vec<WorkItem>) -> Result<()> {
        let exec = self.shared.lock_exec()?;
        exec.check_running("queue")?;
        let count = self.shared.lock_work()?.push_batch(items)?;
        self.send(Command::Process)?;
        drop(exec);

        tracing::debug!(component = %self.shared.name, count, "Queued work");
        self.shared.metrics.record_queued(count);
        Ok(())
    }

    /// Accepts metadata about upcoming work. Components built here do not use it.
    ///
    /// # Errors
    ///
    /// [`CodecError::BadState`] unless running, otherwise always [`CodecError::Omitted`].
    pub fn announce(&self, outlines: &[WorkOutline]) -> Result<()> {
        self.shared.lock_exec()?.check_running("announce")?;
        tracing::debug!(component = %self.shared.name, count = outlines.len(), "Ignoring announce");
        Err(CodecError::Omitted("announce() is not used by this component".to_string()))
    }

    /// Requests a drain after the last queued item. With nothing queued, the drain runs right
    /// away if work is pending, otherwise after the next queued batch.
    ///
    /// # Errors
    ///
    /// [`CodecError::BadState`] unless running; [`CodecError::Unsupported`] for
    /// [`DrainMode::Chain`].
    pub fn drain(&self, mode: DrainMode) -> Result<()> {
        let exec = self.shared.lock_exec()?;
        exec.check_running("drain")?;
        match mode {
            DrainMode::NoDrain => return Ok(()),
            DrainMode::Chain => {
                return Err(CodecError::Unsupported("chain drain is not supported".to_string()));
            },
            DrainMode::ComponentWithEos | DrainMode::ComponentNoEos => {},
        }

        let mark = self.shared.lock_work()?.mark_drain(mode);
        if let DrainMark::Immediate(generation) = mark {
            // Posted under the exec lock so it stays ordered after earlier Process commands.
            self.send(Command::Drain { mode, generation })?;
        }
        drop(exec);
        match mark {
            DrainMark::Tail(frame_index) => tracing::debug!(
                component = %self.shared.name,
                mode = mode.as_str(),
                frame_index,
                "Drain marked on queue tail"
            ),
            DrainMark::Immediate(generation) => tracing::debug!(
                component = %self.shared.name,
                mode = mode.as_str(),
                generation,
                "Drain posted for pending work"
            ),
            DrainMark::Armed => tracing::debug!(
                component = %self.shared.name,
                mode = mode.as_str(),
                "Drain armed for the next queued batch"
            ),
            DrainMark::Ignored => {},
        }
        Ok(())
    }

    /// Takes back every item not yet delivered: pending ones first, ordered by frame index,
    /// then queued ones in submission order. No listener callback happens for any of them
    /// afterwards.
    ///
    /// # Errors
    ///
    /// [`CodecError::BadState`] unless running; [`CodecError::Shutdown`] if the processing
    /// thread is gone.
    pub async fn flush(&self, mode: FlushMode) -> Result<Vec<WorkItem>> {
        self.shared.lock_exec()?.check_running("flush")?;
        let (ack, rx) = oneshot::channel();
        self.send(Command::Flush { mode, ack })?;
        Self::await_ack(rx).await
    }

    /// Starts (or restarts) processing. Runs `on_init` only on the first start after
    /// construction or reset.
    ///
    /// # Errors
    ///
    /// [`CodecError::BadState`] unless uninitialized or stopped, or whatever `on_init`
    /// returned. A failed `on_init` leaves the state unchanged.
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let init = self.shared.lock_exec()?.plan_start()?;
        let (ack, rx) = oneshot::channel();
        self.send(Command::Start { init, ack })?;
        Self::await_ack(rx).await
    }

    /// Cancels all outstanding work without delivering it and stops.
    ///
    /// # Errors
    ///
    /// [`CodecError::BadState`] unless running.
    pub async fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.shared.lock_exec()?.plan_stop()?;
        let (ack, rx) = oneshot::channel();
        self.send(Command::Stop { ack })?;
        Self::await_ack(rx).await
    }

    /// Cancels all outstanding work and returns to uninitialized.
    ///
    /// # Errors
    ///
    /// [`CodecError::BadState`] unless running or stopped.
    pub async fn reset(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let was_running = self.shared.lock_exec()?.plan_reset()?;
        let (ack, rx) = oneshot::channel();
        self.send(Command::Reset { was_running, ack })?;
        Self::await_ack(rx).await
    }

    /// Stops if needed, releases the strategy and waits for the processing thread to exit.
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// [`CodecError::CorruptedState`] if the component has failed.
    pub async fn release(&self) -> Result<()> {
        let mut thread = self.lifecycle.lock().await;
        let ReleasePlan::Release { was_running } = self.shared.lock_exec()?.plan_release()? else {
            return Ok(());
        };
        let (ack, rx) = oneshot::channel();
        self.send(Command::Release { was_running, ack })?;
        let result = Self::await_ack(rx).await;

        if let Some(handle) = thread.take() {
            self.join(handle).await;
        }
        result
    }

    async fn join(&self, handle: JoinHandle<()>) {
        let joined = tokio::task::spawn_blocking(move || handle.join());
        match tokio::time::timeout(self.release_timeout, joined).await {
            Ok(Ok(Ok(()))) => {
                tracing::debug!(component = %self.shared.name, "Processing thread joined");
            },
            Ok(Ok(Err(_))) => {
                tracing::error!(component = %self.shared.name, "Processing thread panicked");
            },
            Ok(Err(e)) => {
                tracing::error!(component = %self.shared.name, error = %e, "Join task failed");
            },
            Err(_) => {
                tracing::warn!(
                    component = %self.shared.name,
                    timeout_ms = self.release_timeout.as_millis(),
                    "Processing thread did not exit in time, detaching"
                );
            },
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands_tx.send(command).map_err(|_| CodecError::Shutdown)
    }

    async fn await_ack<T>(rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        rx.await.map_err(|_| CodecError::Shutdown)?
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        // Fails harmlessly if the thread already exited after release().
        let _ = self.commands_tx.send(Command::Shutdown);
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
