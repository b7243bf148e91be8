// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Component lifecycle states and the transition rules between them.
//!
//! ```text
//! Uninitialized --start--> Running --stop--> Stopped --start--> Running
//! Uninitialized | Running | Stopped --reset--> Uninitialized
//! Uninitialized | Running | Stopped --release--> Released
//! any --fatal--> Failed
//! ```

use codeckit_core::error::{CodecError, Result};
use codeckit_core::Listener;
use serde::Serialize;
use std::sync::Arc;

/// Externally visible state of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed; the strategy has never been initialized.
    Uninitialized,
    /// Initialized but not accepting work.
    Stopped,
    Running,
    /// Terminal. The processing thread has been told to exit.
    Released,
    /// Terminal. A fatal error was reported to the listener.
    Failed { reason: String },
}

impl LifecycleState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Released => "released",
            Self::Failed { .. } => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Failed { .. })
    }
}

/// What `release` has to do given the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleasePlan {
    Noop,
    Release { was_running: bool },
}

/// State and listener, guarded together by the execution lock.
pub(crate) struct ExecState {
    pub(crate) state: LifecycleState,
    pub(crate) listener: Option<Arc<dyn Listener>>,
}

impl Default for ExecState {
    fn default() -> Self {
        Self { state: LifecycleState::Uninitialized, listener: None }
    }
}

impl ExecState {
    fn check_not_failed(&self) -> Result<()> {
        match &self.state {
            LifecycleState::Failed { reason } => {
                Err(CodecError::CorruptedState(format!("component failed: {reason}")))
            },
            _ => Ok(()),
        }
    }

    /// Validates `start`. Returns whether the strategy still needs `on_init`.
    pub(crate) fn plan_start(&self) -> Result<bool> {
        self.check_not_failed()?;
        match self.state {
            LifecycleState::Uninitialized => Ok(true),
            LifecycleState::Stopped => Ok(false),
            _ => Err(self.bad_state("start")),
        }
    }

    pub(crate) fn plan_stop(&self) -> Result<()> {
        self.check_running("stop")
    }

    /// Validates `reset`. Returns whether the component was running.
    pub(crate) fn plan_reset(&self) -> Result<bool> {
        self.check_not_failed()?;
        match self.state {
            LifecycleState::Running => Ok(true),
            LifecycleState::Stopped | LifecycleState::Uninitialized => Ok(false),
            _ => Err(self.bad_state("reset")),
        }
    }

    pub(crate) fn plan_release(&self) -> Result<ReleasePlan> {
        self.check_not_failed()?;
        match self.state {
            LifecycleState::Released => Ok(ReleasePlan::Noop),
            LifecycleState::Running => Ok(ReleasePlan::Release { was_running: true }),
            _ => Ok(ReleasePlan::Release { was_running: false }),
        }
    }

    /// Work-path operations (`queue`, `flush`, `drain`, `announce`) need a running component.
    pub(crate) fn check_running(&self, op: &str) -> Result<()> {
        self.check_not_failed()?;
        if self.state == LifecycleState::Running {
            Ok(())
        } else {
            Err(self.bad_state(op))
        }
    }

    /// Moves to `next` unless the component already failed; `Failed` is sticky.
    pub(crate) fn set_state(&mut self, next: LifecycleState) -> bool {
        if matches!(self.state, LifecycleState::Failed { .. }) {
            return false;
        }
        self.state = next;
        true
    }

    fn bad_state(&self, op: &str) -> CodecError {
        CodecError::BadState(format!("{op}() not allowed while {}", self.state.name()))
    }
}
