// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! codeckit Core - work items, buffers and block pools for codec components.
//!
//! ## Core Modules
//!
//! - [`work`]: WorkItem, Worklet, flags, ordinals, drain/flush modes
//! - [`buffer`]: Immutable, shareable buffer handles
//! - [`block_pool`]: BlockPool trait and the bucketed pool implementation
//! - [`listener`]: Completion sink trait
//! - [`error`]: Error taxonomy
//! - [`helpers`]: Configuration parsing helpers

pub mod block_pool;
pub mod buffer;
pub mod error;
pub mod helpers;
pub mod listener;
pub mod work;

// Error handling
pub use error::CodecError;

// Work model
pub use work::{DrainMode, FlushMode, Ordinal, WorkFlags, WorkItem, WorkOutline, WorkStatus, Worklet};

// Buffers and allocation
pub use block_pool::{
    BlockPool, BlockPoolConfig, BucketBlockPool, GraphicBlock, LinearBlock, MemoryUsage, PoolStats,
};
pub use buffer::{Buffer, BufferKind, PixelFormat, Rect};

// Completion sink
pub use listener::Listener;

pub use helpers::config_helpers;
