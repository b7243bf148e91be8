// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Commands posted to a component's processing thread.

use codeckit_core::error::Result;
use codeckit_core::{DrainMode, FlushMode, WorkItem};
use tokio::sync::oneshot;

pub(crate) type Ack<T = ()> = oneshot::Sender<Result<T>>;

/// Completion callback applied to a work item right before delivery.
pub(crate) type FillFn = Box<dyn FnOnce(&mut WorkItem) + Send>;

/// Everything the processing thread does arrives as one of these, in posting order.
pub(crate) enum Command {
    /// Dispatch the next queued item, if any.
    Process,
    /// Asynchronous completion from a [`Completer`](crate::Completer).
    Finish { frame_index: u64, generation: u64, fill: FillFn },
    /// Drain requested while work was pending but nothing was queued.
    Drain { mode: DrainMode, generation: u64 },
    Start { init: bool, ack: Ack },
    Stop { ack: Ack },
    Reset { was_running: bool, ack: Ack },
    Release { was_running: bool, ack: Ack },
    Flush { mode: FlushMode, ack: Ack<Vec<WorkItem>> },
    /// Handle dropped without `release()`.
    Shutdown,
}

impl Command {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Finish { .. } => "finish",
            Self::Drain { .. } => "drain",
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Reset { .. } => "reset",
            Self::Release { .. } => "release",
            Self::Flush { .. } => "flush",
            Self::Shutdown => "shutdown",
        }
    }
}
