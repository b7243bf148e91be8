// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The completion sink a component delivers finished work to.

use crate::error::CodecError;
use crate::work::{DrainMode, WorkItem};

/// Receives completed work from a component.
///
/// Callbacks run on the component's processing thread. Implementations must not block and
/// must not call back into the component that invoked them.
pub trait Listener: Send + Sync {
    /// Called with finished work, in completion order.
    fn on_work_done(&self, items: Vec<WorkItem>);

    /// Called when a drain failed without failing the component. Work the drain would have
    /// released stays pending until it is finished or flushed.
    fn on_drain_error(&self, mode: DrainMode, error: &CodecError) {
        tracing::warn!(mode = mode.as_str(), %error, "Component reported a failed drain");
    }

    /// Called once when the component hits a fatal error.
    ///
    /// `abandoned` holds every item the component still owned, so nothing is lost silently.
    fn on_error(&self, error: &CodecError, abandoned: Vec<WorkItem>) {
        tracing::error!(%error, abandoned = abandoned.len(), "Component reported a fatal error");
    }
}
