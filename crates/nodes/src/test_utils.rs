// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Test utilities for strategy testing

#![allow(clippy::unwrap_used, clippy::expect_used)]

use codeckit_core::{BlockPool, Buffer, BucketBlockPool, WorkFlags, WorkItem};
use codeckit_engine::{ChannelListener, Component, ComponentConfig, ListenerEvent, Strategy};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running component plus the events its listener forwards.
pub struct TestComponent {
    pub component: Component,
    pub events: mpsc::UnboundedReceiver<ListenerEvent>,
}

impl TestComponent {
    /// Starts `strategy` in a component with the default pool.
    pub async fn start(name: &str, strategy: Box<dyn Strategy>) -> Self {
        Self::start_with_pool(name, strategy, Arc::new(BucketBlockPool::default())).await
    }

    pub async fn start_with_pool(
        name: &str,
        strategy: Box<dyn Strategy>,
        pool: Arc<dyn BlockPool>,
    ) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let component = Component::with_pool(&ComponentConfig::named(name), strategy, pool)
            .expect("component should spawn");
        let (listener, events) = ChannelListener::new();
        component.set_listener(Arc::new(listener)).unwrap();
        component.start().await.expect("start should succeed");
        Self { component, events }
    }

    pub async fn next_done(&mut self) -> WorkItem {
        match timeout(EVENT_TIMEOUT, self.events.recv()).await {
            Ok(Some(ListenerEvent::WorkDone(work))) => work,
            other => panic!("expected a completion, got {other:?}"),
        }
    }

    pub async fn collect(&mut self, count: usize) -> Vec<WorkItem> {
        let mut done = Vec::with_capacity(count);
        for _ in 0..count {
            done.push(self.next_done().await);
        }
        done
    }

    /// Asserts nothing more arrives for a short while.
    pub async fn assert_quiet(&mut self) {
        if let Ok(Some(event)) = timeout(Duration::from_millis(100), self.events.recv()).await {
            panic!("expected no listener event, got {event:?}");
        }
    }

    pub async fn release(self) {
        self.component.release().await.unwrap();
    }
}

/// A work item with one linear input.
pub fn linear_work(frame_index: u64, data: &'static [u8]) -> WorkItem {
    WorkItem::new(frame_index).with_input(Buffer::linear(data))
}

pub fn eos_work(frame_index: u64) -> WorkItem {
    WorkItem::new(frame_index).with_flags(WorkFlags::END_OF_STREAM)
}

/// Payload of the first output buffer of the first worklet.
pub fn first_output(work: &WorkItem) -> &[u8] {
    work.worklet().and_then(|w| w.output.first()).map_or(&[], |b| b.data().as_ref())
}
