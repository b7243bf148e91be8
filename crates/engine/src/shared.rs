// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! State shared between the [`Component`](crate::Component) handle and its processing thread.
//!
//! Lock order is `exec` then `work`. The processing thread never holds both.

use crate::lifecycle::{ExecState, LifecycleState};
use crate::metrics::ComponentMetrics;
use crate::work_queue::WorkQueue;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::Listener;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) struct Shared {
    pub(crate) name: Arc<str>,
    exec: Mutex<ExecState>,
    work: Mutex<WorkQueue>,
    pub(crate) metrics: ComponentMetrics,
}

impl Shared {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            exec: Mutex::new(ExecState::default()),
            work: Mutex::new(WorkQueue::default()),
            metrics: ComponentMetrics::new(name),
        }
    }

    pub(crate) fn lock_exec(&self) -> Result<MutexGuard<'_, ExecState>> {
        self.exec
            .lock()
            .map_err(|_| CodecError::CorruptedState("execution state lock poisoned".to_string()))
    }

    pub(crate) fn lock_work(&self) -> Result<MutexGuard<'_, WorkQueue>> {
        self.work
            .lock()
            .map_err(|_| CodecError::CorruptedState("work queue lock poisoned".to_string()))
    }

    pub(crate) fn listener(&self) -> Option<Arc<dyn Listener>> {
        self.lock_exec().ok().and_then(|exec| exec.listener.clone())
    }

    /// Current state; a poisoned lock reads as failed.
    pub(crate) fn state(&self) -> LifecycleState {
        self.lock_exec().map_or_else(
            |e| LifecycleState::Failed { reason: e.to_string() },
            |exec| exec.state.clone(),
        )
    }

    /// Applies a transition and records it. Returns `false` if the component already failed.
    pub(crate) fn transition(&self, next: LifecycleState) -> Result<bool> {
        let name = next.name();
        let changed = self.lock_exec()?.set_state(next);
        if changed {
            tracing::info!(component = %self.name, state = name, "Component state changed");
            self.metrics.record_transition(name);
        }
        Ok(changed)
    }
}
