// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: asynchronous work admission and processing for codec components.
//!
//! A [`Component`] wraps a [`Strategy`] (the actual transform) with:
//! - a work queue with duplicate detection and drain markers
//! - a pending table for work the strategy has not finished yet
//! - a flush generation that invalidates late completions
//! - a lifecycle state machine (start, stop, reset, release)
//! - a dedicated processing thread that runs every strategy hook in posting order
//!
//! ```no_run
//! # use codeckit_engine::{ChannelListener, Component, ComponentConfig, StrategyRegistry};
//! # async fn demo(registry: &StrategyRegistry) -> codeckit_core::error::Result<()> {
//! let strategy = registry.create("core::passthrough", None)?;
//! let component = Component::new(&ComponentConfig::named("pass"), strategy)?;
//! let (listener, mut events) = ChannelListener::new();
//! component.set_listener(std::sync::Arc::new(listener))?;
//! component.start().await?;
//! component.queue(vec![codeckit_core::WorkItem::new(0)])?;
//! let _done = events.recv().await;
//! component.release().await
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod registry;

mod component;
mod lifecycle;
mod listener;
mod messages;
mod metrics;
mod pending;
mod processor;
mod router;
mod shared;
mod strategy;
mod work_queue;

pub use component::Component;
pub use config::ComponentConfig;
pub use lifecycle::LifecycleState;
pub use listener::{ChannelListener, ListenerEvent};
pub use registry::{StrategyDefinition, StrategyFactory, StrategyRegistry};
pub use strategy::{Completer, Strategy, WorkContext};

#[cfg(test)]
mod tests;
