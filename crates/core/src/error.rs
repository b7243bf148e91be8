// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for codec components.
//!
//! Errors fall into three groups that callers treat differently:
//! - contract violations on the public API (`BadState`, `BadValue`, `Duplicate`,
//!   `Unsupported`, `Omitted`) are returned synchronously to the caller;
//! - per-item failures (`NoMemory`, `Corrupted`) are attached to a work item
//!   and delivered to the listener like any other completion;
//! - `CorruptedState` is fatal: the component stops accepting calls for good.

use thiserror::Error;

/// Main error type for component operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The operation is not valid in the component's current lifecycle state.
    #[error("Bad state: {0}")]
    BadState(String),

    /// An argument was malformed (e.g. an empty batch of work).
    #[error("Bad value: {0}")]
    BadValue(String),

    /// A frame index collides with work that is already queued or pending.
    #[error("Duplicate frame index {frame_index}")]
    Duplicate { frame_index: u64 },

    /// The requested mode is not implemented (e.g. chain drains).
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A block pool ran out of buffers.
    #[error("No memory: {0}")]
    NoMemory(String),

    /// Buffer contents failed to map or validate.
    #[error("Corrupted: {0}")]
    Corrupted(String),

    /// The feature is deliberately left unimplemented.
    #[error("Omitted: {0}")]
    Omitted(String),

    /// An internal invariant was violated. The component is dead after this.
    #[error("Corrupted state: {0}")]
    CorruptedState(String),

    /// Configuration or parameter validation error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The processing thread is gone and can no longer answer.
    #[error("Component shut down")]
    Shutdown,
}

impl CodecError {
    /// Short, stable name for logs and metric labels.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BadState(_) => "bad_state",
            Self::BadValue(_) => "bad_value",
            Self::Duplicate { .. } => "duplicate",
            Self::Unsupported(_) => "unsupported",
            Self::NoMemory(_) => "no_memory",
            Self::Corrupted(_) => "corrupted",
            Self::Omitted(_) => "omitted",
            Self::CorruptedState(_) => "corrupted_state",
            Self::Configuration(_) => "configuration",
            Self::Shutdown => "shutdown",
        }
    }

    /// Whether this error leaves the component permanently unusable.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptedState(_))
    }
}

/// Convenience type alias for Results using `CodecError`.
pub type Result<T> = std::result::Result<T, CodecError>;
