// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Default values for component configuration.
//!
//! [`ComponentConfig`](crate::ComponentConfig) falls back to these when a field is omitted.
//! Block pool defaults live next to the pool in `codeckit_core::block_pool`.

/// Name used in logs, metrics and the processing thread name when none is configured.
pub const DEFAULT_COMPONENT_NAME: &str = "component";

/// How long `release()` waits for the processing thread to exit.
///
/// A strategy blocked inside a hook delays this; past the timeout the thread is detached
/// and a warning is logged.
pub const DEFAULT_RELEASE_TIMEOUT_MS: u64 = 10_000;

/// Prefix for processing thread names (`codec:<name>`).
///
/// Linux truncates thread names to 15 bytes, so keep component names short if they need to
/// be readable in `top`.
pub const THREAD_NAME_PREFIX: &str = "codec:";
