// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Test strategies and helpers shared by the scenario tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::{ChannelListener, Completer, Component, ComponentConfig, ListenerEvent};
use crate::{Strategy, WorkContext};
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{DrainMode, WorkFlags, WorkItem};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

pub(super) const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
pub(super) const QUIET_PERIOD: Duration = Duration::from_millis(100);

pub(super) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Hook call counters, readable from the test while the strategy lives on the loop thread.
#[derive(Default)]
pub(super) struct Hooks {
    pub(super) init: AtomicUsize,
    pub(super) stop: AtomicUsize,
    pub(super) flush: AtomicUsize,
    pub(super) reset: AtomicUsize,
    pub(super) release: AtomicUsize,
    pub(super) processed: Mutex<Vec<u64>>,
    pub(super) drains: Mutex<Vec<DrainMode>>,
}

impl Hooks {
    pub(super) fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub(super) fn processed(&self) -> Vec<u64> {
        self.processed.lock().unwrap().clone()
    }

    pub(super) fn drains(&self) -> Vec<DrainMode> {
        self.drains.lock().unwrap().clone()
    }
}

/// How [`TestStrategy`] completes work.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    /// Completes every item before `process` returns.
    InPlace,
    /// Holds each item until the next one arrives or a drain comes in.
    HoldLast,
    /// Hands every item to the test through a [`Completer`].
    Async,
}

pub(super) struct TestStrategy {
    mode: Mode,
    hooks: Arc<Hooks>,
    held: Option<u64>,
    fail_on: Option<(u64, CodecError)>,
    fail_drain: Option<CodecError>,
    fail_init: bool,
    completers: Option<mpsc::UnboundedSender<(u64, Completer)>>,
    gate: Option<std::sync::mpsc::Receiver<()>>,
}

impl TestStrategy {
    pub(super) fn new(mode: Mode) -> (Self, Arc<Hooks>) {
        let hooks = Arc::new(Hooks::default());
        let strategy = Self {
            mode,
            hooks: hooks.clone(),
            held: None,
            fail_on: None,
            fail_drain: None,
            fail_init: false,
            completers: None,
            gate: None,
        };
        (strategy, hooks)
    }

    /// An async strategy plus the receiving end of its completers.
    pub(super) fn asynchronous() -> (Self, Arc<Hooks>, mpsc::UnboundedReceiver<(u64, Completer)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (mut strategy, hooks) = Self::new(Mode::Async);
        strategy.completers = Some(tx);
        (strategy, hooks, rx)
    }

    /// `process` returns `error` for `frame_index`.
    pub(super) fn failing_on(mut self, frame_index: u64, error: CodecError) -> Self {
        self.fail_on = Some((frame_index, error));
        self
    }

    /// Blocks the first `process` call, and with it the processing thread, until the
    /// returned sender fires.
    pub(super) fn gated(mut self) -> (Self, std::sync::mpsc::Sender<()>) {
        let (tx, rx) = std::sync::mpsc::channel();
        self.gate = Some(rx);
        (self, tx)
    }

    /// Every `drain` returns `error` after recording the call.
    pub(super) fn failing_drain(mut self, error: CodecError) -> Self {
        self.fail_drain = Some(error);
        self
    }

    pub(super) const fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }
}

impl Strategy for TestStrategy {
    fn on_init(&mut self) -> Result<()> {
        if self.fail_init {
            return Err(CodecError::NoMemory("codec instance unavailable".to_string()));
        }
        self.hooks.init.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_stop(&mut self) -> Result<()> {
        self.held = None;
        self.hooks.stop.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_flush(&mut self) -> Result<()> {
        self.held = None;
        self.hooks.flush.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_reset(&mut self) {
        self.hooks.reset.fetch_add(1, Ordering::SeqCst);
    }

    fn on_release(&mut self) {
        self.hooks.release.fetch_add(1, Ordering::SeqCst);
    }

    fn process(&mut self, ctx: &mut WorkContext<'_>) -> Result<()> {
        let frame_index = ctx.frame_index().expect("process always sees its item");
        if let Some(gate) = self.gate.take() {
            let _ = gate.recv();
        }
        self.hooks.processed.lock().unwrap().push(frame_index);

        if let Some((_, error)) = self.fail_on.as_ref().filter(|(idx, _)| *idx == frame_index) {
            return Err(error.clone());
        }

        match self.mode {
            Mode::InPlace => {
                let work = ctx.work_mut().expect("item still in context");
                let input = work.input.clone();
                work.complete(input, WorkFlags::NONE);
            },
            Mode::HoldLast => {
                if let Some(held) = self.held.replace(frame_index) {
                    ctx.finish(held, |work| work.complete([], WorkFlags::NONE));
                }
            },
            Mode::Async => {
                let completer = ctx.completer()?;
                if let Some(tx) = &self.completers {
                    let _ = tx.send((frame_index, completer));
                }
            },
        }
        Ok(())
    }

    fn drain(&mut self, mode: DrainMode, ctx: &mut WorkContext<'_>) -> Result<()> {
        self.hooks.drains.lock().unwrap().push(mode);
        if let Some(error) = &self.fail_drain {
            return Err(error.clone());
        }
        let eos = mode == DrainMode::ComponentWithEos;
        match self.held.take() {
            Some(held) => {
                let flags = if eos { WorkFlags::END_OF_STREAM } else { WorkFlags::NONE };
                ctx.finish(held, |work| work.complete([], flags));
            },
            None if eos => {
                ctx.mark_end_of_stream();
            },
            None => {},
        }
        Ok(())
    }
}

/// A started component wired to a [`ChannelListener`].
pub(super) async fn started(
    name: &str,
    strategy: TestStrategy,
) -> (Component, mpsc::UnboundedReceiver<ListenerEvent>) {
    init_tracing();
    let component = Component::new(&ComponentConfig::named(name), Box::new(strategy))
        .expect("component should spawn");
    let (listener, events) = ChannelListener::new();
    component.set_listener(Arc::new(listener)).unwrap();
    component.start().await.expect("start should succeed");
    (component, events)
}

pub(super) fn items(indexes: impl IntoIterator<Item = u64>) -> Vec<WorkItem> {
    indexes.into_iter().map(WorkItem::new).collect()
}

/// Waits for the next completion, failing the test on timeout or a fatal error event.
pub(super) async fn next_done(events: &mut mpsc::UnboundedReceiver<ListenerEvent>) -> WorkItem {
    match timeout(EVENT_TIMEOUT, events.recv()).await {
        Ok(Some(ListenerEvent::WorkDone(work))) => work,
        Ok(Some(ListenerEvent::Error { error, .. })) => panic!("unexpected fatal error: {error}"),
        Ok(Some(ListenerEvent::DrainFailed { error, .. })) => panic!("unexpected drain error: {error}"),
        Ok(None) => panic!("listener channel closed"),
        Err(_) => panic!("timed out waiting for a completion"),
    }
}

pub(super) async fn collect_done(
    events: &mut mpsc::UnboundedReceiver<ListenerEvent>,
    count: usize,
) -> Vec<WorkItem> {
    let mut done = Vec::with_capacity(count);
    for _ in 0..count {
        done.push(next_done(events).await);
    }
    done
}

/// Asserts that nothing is delivered for a short while.
pub(super) async fn assert_quiet(events: &mut mpsc::UnboundedReceiver<ListenerEvent>) {
    if let Ok(Some(event)) = timeout(QUIET_PERIOD, events.recv()).await {
        panic!("expected no listener event, got {event:?}");
    }
}

pub(super) async fn next_completer(
    completers: &mut mpsc::UnboundedReceiver<(u64, Completer)>,
) -> (u64, Completer) {
    timeout(EVENT_TIMEOUT, completers.recv())
        .await
        .expect("timed out waiting for dispatch")
        .expect("strategy dropped its completer channel")
}

pub(super) fn frame_indexes(items: &[WorkItem]) -> Vec<u64> {
    items.iter().map(|work| work.frame_index).collect()
}

/// Polls `condition` until it holds or the event timeout passes.
pub(super) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
