// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The transform plugged into a [`Component`](crate::Component).
//!
//! A [`Strategy`] only ever runs on the component's processing thread, so it can keep
//! decoder state in plain fields. It sees the current item through a [`WorkContext`] and
//! completes work in one of three ways:
//!
//! - **In place**: fill the item via [`WorkItem::complete`] and return.
//! - **Synchronously**: call [`WorkContext::finish`] for the current or any parked item.
//! - **Asynchronously**: mint a [`Completer`] and finish later from another thread.
//!
//! Anything not completed by the time `process` returns stays pending until finished or
//! flushed.

use crate::messages::{Command, FillFn};
use crate::router;
use crate::shared::Shared;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{BlockPool, DrainMode, WorkFlags, WorkItem};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};

/// Codec-specific behaviour driven by the processing loop.
///
/// Hooks other than `process` and `drain` default to doing nothing. Errors returned from
/// `process` fail only the current item; a [`CodecError::CorruptedState`] from any hook
/// fails the whole component.
pub trait Strategy: Send + 'static {
    /// Called on the first `start()` and on the first `start()` after `reset()`.
    fn on_init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after running work has been cancelled by `stop()`, `reset()` or `release()`.
    fn on_stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called after a flush has taken back all outstanding work.
    fn on_flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_reset(&mut self) {}

    fn on_release(&mut self) {}

    /// Processes the item exposed by `ctx`.
    fn process(&mut self, ctx: &mut WorkContext<'_>) -> Result<()>;

    /// Emits everything still held internally, flagging the last output END_OF_STREAM for
    /// [`DrainMode::ComponentWithEos`].
    ///
    /// When the drain was marked on a queued item it runs right after that item's `process`,
    /// and `ctx` still exposes the item unless `process` already finished it; work completed
    /// in place is delivered after `drain` returns. A drain requested while work is pending
    /// but nothing is queued runs on its own, with no current item.
    fn drain(&mut self, mode: DrainMode, ctx: &mut WorkContext<'_>) -> Result<()>;
}

/// What a strategy can see and do while the processing loop runs one of its hooks.
pub struct WorkContext<'a> {
    shared: &'a Shared,
    pool: &'a Arc<dyn BlockPool>,
    commands: &'a WeakUnboundedSender<Command>,
    generation: u64,
    current: Option<WorkItem>,
    fatal: Option<CodecError>,
}

impl<'a> WorkContext<'a> {
    pub(crate) const fn new(
        shared: &'a Shared,
        pool: &'a Arc<dyn BlockPool>,
        commands: &'a WeakUnboundedSender<Command>,
        generation: u64,
        current: Option<WorkItem>,
    ) -> Self {
        Self { shared, pool, commands, generation, current, fatal: None }
    }

    /// The item being processed, unless it has already been finished.
    pub const fn work(&self) -> Option<&WorkItem> {
        self.current.as_ref()
    }

    pub const fn work_mut(&mut self) -> Option<&mut WorkItem> {
        self.current.as_mut()
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.current.as_ref().map(|work| work.frame_index)
    }

    pub const fn pool(&self) -> &Arc<dyn BlockPool> {
        self.pool
    }

    /// Generation the current item was dispatched in.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Finishes the current item or a parked one and delivers it immediately.
    ///
    /// Returns `false` if `frame_index` is not pending in this generation. `fill` must not
    /// block.
    pub fn finish(&mut self, frame_index: u64, fill: impl FnOnce(&mut WorkItem)) -> bool {
        match router::finish(
            self.shared,
            &mut self.current,
            frame_index,
            Some(self.generation),
            fill,
        ) {
            Ok(delivered) => delivered,
            Err(e) => {
                self.record_fatal(e);
                false
            },
        }
    }

    /// Delivers an extra output for a pending item without completing it.
    pub fn clone_and_send(&mut self, frame_index: u64, fill: impl FnOnce(&mut WorkItem)) -> bool {
        match router::clone_and_send(self.shared, self.current.as_ref(), frame_index, fill) {
            Ok(delivered) => delivered,
            Err(e) => {
                self.record_fatal(e);
                false
            },
        }
    }

    /// A handle for finishing work from another thread.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Shutdown`] if the component handle has been dropped.
    pub fn completer(&self) -> Result<Completer> {
        let commands = self.commands.upgrade().ok_or(CodecError::Shutdown)?;
        Ok(Completer { commands, generation: self.generation })
    }

    /// Flags the current item's output END_OF_STREAM. Returns `false` if there is no current
    /// item.
    pub fn mark_end_of_stream(&mut self) -> bool {
        match self.current.as_mut() {
            Some(work) => {
                work.worklet_mut().flags.insert(WorkFlags::END_OF_STREAM);
                true
            },
            None => false,
        }
    }

    pub(crate) const fn is_poisoned(&self) -> bool {
        self.fatal.is_some()
    }

    fn record_fatal(&mut self, error: CodecError) {
        tracing::error!(component = %self.shared.name, %error, "Completion routing failed");
        self.fatal.get_or_insert(error);
    }

    pub(crate) fn into_parts(self) -> (Option<WorkItem>, Option<CodecError>) {
        (self.current, self.fatal)
    }
}

/// Finishes work from outside the processing thread.
///
/// Each completer is bound to the generation it was minted in; finishes for work that was
/// flushed since then are dropped.
#[derive(Clone)]
pub struct Completer {
    commands: UnboundedSender<Command>,
    generation: u64,
}

impl Completer {
    /// Posts a completion for `frame_index`. `fill` runs later on the processing thread.
    ///
    /// Returns `false` if the processing thread is gone. A `true` result does not mean the
    /// work was still pending.
    pub fn finish(&self, frame_index: u64, fill: impl FnOnce(&mut WorkItem) + Send + 'static) -> bool {
        let fill: FillFn = Box::new(fill);
        self.commands
            .send(Command::Finish { frame_index, generation: self.generation, fill })
            .is_ok()
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for Completer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer").field("generation", &self.generation).finish_non_exhaustive()
    }
}
