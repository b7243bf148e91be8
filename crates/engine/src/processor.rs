// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The processing thread.
//!
//! One dedicated OS thread per component drains a single command channel in posting
//! order. It is the only place strategy hooks run and the only place work moves from the
//! queue into the pending table, so the strategy never needs its own locking.

use crate::lifecycle::LifecycleState;
use crate::messages::{Ack, Command};
use crate::router;
use crate::shared::Shared;
use crate::strategy::{Strategy, WorkContext};
use crate::work_queue::Dispatch;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{BlockPool, DrainMode, FlushMode, WorkItem};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};

pub(crate) struct ProcessingLoop {
    shared: Arc<Shared>,
    strategy: Box<dyn Strategy>,
    pool: Arc<dyn BlockPool>,
    commands_tx: WeakUnboundedSender<Command>,
    commands_rx: UnboundedReceiver<Command>,
    failed: bool,
}

impl ProcessingLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        strategy: Box<dyn Strategy>,
        pool: Arc<dyn BlockPool>,
        commands_tx: WeakUnboundedSender<Command>,
        commands_rx: UnboundedReceiver<Command>,
    ) -> Self {
        Self { shared, strategy, pool, commands_tx, commands_rx, failed: false }
    }

    /// Runs until released, shut down, or every sender is gone.
    pub(crate) fn run(mut self) {
        let span = tracing::info_span!("component_loop", component = %self.shared.name);
        let _enter = span.enter();
        tracing::info!("Processing thread started");

        while let Some(command) = self.commands_rx.blocking_recv() {
            tracing::trace!(command = command.name(), "Handling command");
            if !self.handle(command) {
                break;
            }
        }

        tracing::info!("Processing thread exiting");
    }

    /// Returns `false` when the loop should exit.
    fn handle(&mut self, command: Command) -> bool {
        if self.failed {
            return Self::handle_failed(command);
        }

        match command {
            Command::Process => self.process_next(),
            Command::Finish { frame_index, generation, fill } => {
                if let Err(e) =
                    router::finish(&self.shared, &mut None, frame_index, Some(generation), fill)
                {
                    self.fail(e, Vec::new());
                }
            },
            Command::Drain { mode, generation } => self.run_drain(mode, generation),
            Command::Start { init, ack } => {
                let result = self.start(init);
                self.reply(ack, result);
            },
            Command::Stop { ack } => {
                let result = self.stop();
                self.reply(ack, result);
            },
            Command::Reset { was_running, ack } => {
                let result = self.reset(was_running);
                self.reply(ack, result);
            },
            Command::Release { was_running, ack } => {
                let result = self.release(was_running);
                self.reply(ack, result);
                return false;
            },
            Command::Flush { mode, ack } => {
                let result = self.flush(mode);
                self.reply(ack, result);
            },
            Command::Shutdown => {
                self.shutdown();
                return false;
            },
        }
        true
    }

    fn handle_failed(command: Command) -> bool {
        let corrupted = || CodecError::CorruptedState("component has failed".to_string());
        match command {
            Command::Process | Command::Finish { .. } | Command::Drain { .. } => {},
            Command::Start { ack, .. }
            | Command::Stop { ack }
            | Command::Reset { ack, .. }
            | Command::Release { ack, .. } => {
                let _ = ack.send(Err(corrupted()));
            },
            Command::Flush { ack, .. } => {
                let _ = ack.send(Err(corrupted()));
            },
            Command::Shutdown => return false,
        }
        true
    }

    /// Sends the result back, failing the component first if the error was fatal.
    fn reply<T>(&mut self, ack: Ack<T>, result: Result<T>) {
        if let Err(error) = &result {
            if error.is_fatal() {
                self.fail(error.clone(), Vec::new());
            }
        }
        if ack.send(result).is_err() {
            tracing::debug!("Caller stopped waiting for the acknowledgement");
        }
    }

    fn post(&self, command: Command) {
        if let Some(tx) = self.commands_tx.upgrade() {
            let _ = tx.send(command);
        }
    }

    // --- Work path ---

    fn process_next(&mut self) {
        let dispatch = match self.shared.lock_work().and_then(|mut queue| queue.pop_for_dispatch()) {
            Ok(Some(dispatch)) => dispatch,
            Ok(None) => return,
            Err(e) => {
                self.fail(e, Vec::new());
                return;
            },
        };
        let Dispatch { work, drain_mode, generation } = dispatch;
        let frame_index = work.frame_index;
        tracing::debug!(frame_index, generation, "Dispatching work");

        let mut ctx =
            WorkContext::new(&self.shared, &self.pool, &self.commands_tx, generation, Some(work));
        let mut fatal_result = None;
        match self.strategy.process(&mut ctx) {
            Ok(()) => {},
            Err(error) if error.is_fatal() => fatal_result = Some(error),
            Err(error) => match ctx.work_mut() {
                Some(work) => {
                    tracing::warn!(frame_index, %error, "process() failed");
                    work.fail(error);
                },
                None => {
                    tracing::warn!(frame_index, %error, "process() failed late");
                },
            },
        }

        // The marked item is still current here, so the drain can flag it before it settles.
        let mut drain_result = Ok(());
        if drain_mode != DrainMode::NoDrain && fatal_result.is_none() && !ctx.is_poisoned() {
            tracing::debug!(mode = drain_mode.as_str(), frame_index, "Draining after marked work");
            drain_result = self.strategy.drain(drain_mode, &mut ctx);
        }
        let (current, fatal) = ctx.into_parts();

        if let Some(error) = fatal.or(fatal_result) {
            self.fail(error, current.into_iter().collect());
            return;
        }

        let settled = match current {
            None => Ok(()),
            Some(work) if work.worklets_processed > 0 => self.complete_in_place(work, generation),
            Some(work) => self.shared.lock_work().and_then(|mut queue| {
                tracing::trace!(frame_index, "Work parked until finished");
                queue.pending_mut().park(work)
            }),
        };
        if let Err(e) = settled {
            self.fail(e, Vec::new());
            return;
        }
        if let Err(error) = drain_result {
            self.drain_failed(drain_mode, error);
        }

        if !self.failed && self.shared.lock_work().is_ok_and(|queue| !queue.is_empty()) {
            self.post(Command::Process);
        }
    }

    fn complete_in_place(&self, work: WorkItem, generation: u64) -> Result<()> {
        let frame_index = work.frame_index;
        let mut slot = Some(work);
        router::finish(&self.shared, &mut slot, frame_index, Some(generation), |_| {})?;
        match slot {
            None => Ok(()),
            Some(_) => Err(CodecError::CorruptedState(format!(
                "work {frame_index} completed in place but its pending entry was gone"
            ))),
        }
    }

    /// Runs a drain that is not attached to any item. Skipped if a flush, stop or reset
    /// started a new generation since it was requested.
    fn run_drain(&mut self, mode: DrainMode, requested_in: u64) {
        let generation = self.shared.lock_work().map(|queue| queue.generation());
        let generation = match generation {
            Ok(generation) => generation,
            Err(e) => {
                self.fail(e, Vec::new());
                return;
            },
        };
        if generation != requested_in {
            tracing::debug!(mode = mode.as_str(), requested_in, generation, "Dropping stale drain");
            return;
        }
        tracing::debug!(mode = mode.as_str(), generation, "Draining pending work");

        let mut ctx =
            WorkContext::new(&self.shared, &self.pool, &self.commands_tx, generation, None);
        let result = self.strategy.drain(mode, &mut ctx);
        let (_, fatal) = ctx.into_parts();

        match (fatal, result) {
            (Some(error), _) => self.fail(error, Vec::new()),
            (None, Err(error)) => self.drain_failed(mode, error),
            (None, Ok(())) => {},
        }
    }

    /// A fatal drain error fails the component; anything else goes to the listener.
    fn drain_failed(&mut self, mode: DrainMode, error: CodecError) {
        if error.is_fatal() {
            self.fail(error, Vec::new());
            return;
        }
        tracing::warn!(mode = mode.as_str(), %error, "drain() failed");
        match self.shared.listener() {
            Some(listener) => listener.on_drain_error(mode, &error),
            None => tracing::warn!("No listener set, dropping drain error"),
        }
    }

    fn flush(&mut self, mode: FlushMode) -> Result<Vec<WorkItem>> {
        // A stop or reset may have landed between the caller's check and this command.
        self.shared.lock_exec()?.check_running("flush")?;
        let (flushed, flush_pending, generation) = {
            let mut queue = self.shared.lock_work()?;
            queue.inc_generation();
            let flushed = queue.take_all()?;
            (flushed, queue.take_pending_flush(), queue.generation())
        };
        tracing::debug!(?mode, generation, flushed = flushed.len(), "Flushed work");

        if flush_pending {
            if let Err(error) = self.strategy.on_flush() {
                if error.is_fatal() {
                    self.fail(error.clone(), flushed);
                    return Err(error);
                }
                tracing::warn!(%error, "on_flush() failed");
            }
        }
        self.shared.metrics.record_flush();
        Ok(flushed)
    }

    // --- Lifecycle ---

    fn start(&mut self, init: bool) -> Result<()> {
        if init {
            self.strategy.on_init()?;
        }
        self.transition(LifecycleState::Running)
    }

    fn stop(&mut self) -> Result<()> {
        self.transition(LifecycleState::Stopped)?;
        self.cancel_all("stop")?;
        self.strategy.on_stop()
    }

    fn reset(&mut self, was_running: bool) -> Result<()> {
        self.transition(LifecycleState::Uninitialized)?;
        self.cancel_all("reset")?;
        if was_running {
            if let Err(error) = self.strategy.on_stop() {
                tracing::warn!(%error, "on_stop() failed during reset");
            }
        }
        self.strategy.on_reset();
        Ok(())
    }

    fn release(&mut self, was_running: bool) -> Result<()> {
        self.transition(LifecycleState::Released)?;
        self.cancel_all("release")?;
        if was_running {
            if let Err(error) = self.strategy.on_stop() {
                tracing::warn!(%error, "on_stop() failed during release");
            }
        }
        self.strategy.on_release();
        Ok(())
    }

    fn shutdown(&mut self) {
        let state = self.shared.state();
        if state.is_terminal() {
            return;
        }
        tracing::info!(state = state.name(), "Handle dropped without release, releasing");
        if let Err(error) = self.release(state == LifecycleState::Running) {
            tracing::warn!(%error, "Implicit release failed");
        }
    }

    fn transition(&self, next: LifecycleState) -> Result<()> {
        if self.shared.transition(next)? {
            Ok(())
        } else {
            Err(CodecError::CorruptedState("component has failed".to_string()))
        }
    }

    /// Drops all queued and pending work without delivering it.
    fn cancel_all(&self, reason: &'static str) -> Result<()> {
        let discarded = {
            let mut queue = self.shared.lock_work()?;
            queue.inc_generation();
            queue.take_pending_flush();
            queue.take_all_lossy()
        };
        if !discarded.is_empty() {
            tracing::debug!(reason, discarded = discarded.len(), "Cancelled outstanding work");
        }
        self.shared.metrics.record_discarded(discarded.len());
        Ok(())
    }

    /// Moves to `Failed` and hands every owned item to the listener's error hook.
    fn fail(&mut self, error: CodecError, mut abandoned: Vec<WorkItem>) {
        if self.failed {
            return;
        }
        self.failed = true;
        tracing::error!(%error, "Component failed");

        if let Err(e) = self.shared.transition(LifecycleState::Failed { reason: error.to_string() }) {
            tracing::error!(error = %e, "Could not record failed state");
        }
        if let Ok(mut queue) = self.shared.lock_work() {
            queue.inc_generation();
            abandoned.extend(queue.take_all_lossy());
        }

        match self.shared.listener() {
            Some(listener) => listener.on_error(&error, abandoned),
            None => tracing::warn!(
                abandoned = abandoned.len(),
                "No listener set, dropping work abandoned by failure"
            ),
        }
    }
}
