// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::*;
use codeckit_core::error::CodecError;
use crate::{LifecycleState, ListenerEvent};
use codeckit_core::{DrainMode, WorkFlags};
use tokio::time::timeout;

#[tokio::test]
async fn drain_before_queue_runs_once_after_the_batch() {
    let (strategy, hooks) = TestStrategy::new(Mode::HoldLast);
    let (component, mut events) = started("drain_armed", strategy).await;

    component.drain(DrainMode::ComponentWithEos).unwrap();
    component.queue(items(1..=5)).unwrap();

    let done = collect_done(&mut events, 5).await;
    assert_eq!(frame_indexes(&done), vec![1, 2, 3, 4, 5]);
    assert!(done[4].output_flags().contains(WorkFlags::END_OF_STREAM));
    assert!(done[..4].iter().all(|w| !w.output_flags().contains(WorkFlags::END_OF_STREAM)));
    assert_eq!(hooks.drains(), vec![DrainMode::ComponentWithEos]);

    // The armed marker was consumed by that batch.
    component.queue(items([6])).unwrap();
    assert_quiet(&mut events).await;
    assert_eq!(hooks.drains().len(), 1);

    component.release().await.unwrap();
}

#[tokio::test]
async fn drain_attaches_to_queue_tail() {
    let (strategy, hooks) = TestStrategy::new(Mode::HoldLast);
    let (strategy, gate) = strategy.gated();
    let (component, mut events) = started("drain_tail", strategy).await;

    // Item 1 blocks the processing thread, so 2 is still queued when the drain is marked.
    component.queue(items([1, 2])).unwrap();
    component.drain(DrainMode::ComponentNoEos).unwrap();
    gate.send(()).unwrap();

    let done = collect_done(&mut events, 2).await;
    assert_eq!(frame_indexes(&done), vec![1, 2]);
    assert!(!done[1].output_flags().contains(WorkFlags::END_OF_STREAM));
    assert!(eventually(|| hooks.drains() == vec![DrainMode::ComponentNoEos]).await);

    component.release().await.unwrap();
}

#[tokio::test]
async fn chain_drain_is_unsupported_and_no_drain_is_a_noop() {
    let (strategy, hooks) = TestStrategy::new(Mode::InPlace);
    let (component, mut events) = started("drain_modes", strategy).await;

    assert!(matches!(component.drain(DrainMode::Chain), Err(CodecError::Unsupported(_))));
    component.drain(DrainMode::NoDrain).unwrap();

    component.queue(items([1])).unwrap();
    next_done(&mut events).await;
    assert_quiet(&mut events).await;
    assert!(hooks.drains().is_empty());

    component.release().await.unwrap();
}

#[tokio::test]
async fn stop_clears_an_armed_drain() {
    let (strategy, hooks) = TestStrategy::new(Mode::HoldLast);
    let (component, mut events) = started("drain_cleared", strategy).await;

    component.drain(DrainMode::ComponentWithEos).unwrap();
    component.stop().await.unwrap();
    component.start().await.unwrap();

    component.queue(items([1, 2])).unwrap();
    assert_eq!(next_done(&mut events).await.frame_index, 1);
    assert_quiet(&mut events).await;
    assert!(hooks.drains().is_empty());

    component.release().await.unwrap();
}

#[tokio::test]
async fn drain_after_dispatch_runs_without_new_work() {
    let (strategy, hooks) = TestStrategy::new(Mode::HoldLast);
    let (component, mut events) = started("drain_late", strategy).await;

    component.queue(items([1, 2])).unwrap();
    assert_eq!(next_done(&mut events).await.frame_index, 1);
    assert!(eventually(|| hooks.processed() == vec![1, 2]).await);

    // Nothing queued, 2 still pending: the drain must not wait for another batch.
    component.drain(DrainMode::ComponentWithEos).unwrap();
    let last = next_done(&mut events).await;
    assert_eq!(last.frame_index, 2);
    assert!(last.output_flags().contains(WorkFlags::END_OF_STREAM));
    assert_eq!(hooks.drains(), vec![DrainMode::ComponentWithEos]);
    assert_eq!(component.outstanding().unwrap(), 0);

    // Nothing was armed by it.
    component.queue(items([3])).unwrap();
    assert_quiet(&mut events).await;
    assert_eq!(hooks.drains().len(), 1);

    component.release().await.unwrap();
}

#[tokio::test]
async fn drain_with_eos_flags_in_place_work() {
    let (strategy, hooks) = TestStrategy::new(Mode::InPlace);
    let (component, mut events) = started("drain_in_place", strategy).await;

    component.drain(DrainMode::ComponentWithEos).unwrap();
    component.queue(items([1, 2])).unwrap();

    let done = collect_done(&mut events, 2).await;
    assert_eq!(frame_indexes(&done), vec![1, 2]);
    assert!(!done[0].output_flags().contains(WorkFlags::END_OF_STREAM));
    assert!(done[1].output_flags().contains(WorkFlags::END_OF_STREAM));
    assert_eq!(hooks.drains(), vec![DrainMode::ComponentWithEos]);

    component.release().await.unwrap();
}

#[tokio::test]
async fn failed_drain_is_reported_and_the_component_keeps_running() {
    let (strategy, hooks) = TestStrategy::new(Mode::InPlace);
    let strategy = strategy.failing_drain(CodecError::BadState("encoder wedged".to_string()));
    let (component, mut events) = started("drain_error", strategy).await;

    component.drain(DrainMode::ComponentNoEos).unwrap();
    component.queue(items([1])).unwrap();

    // The marked item is still delivered, then the drain failure follows.
    assert_eq!(next_done(&mut events).await.frame_index, 1);
    match timeout(EVENT_TIMEOUT, events.recv()).await {
        Ok(Some(ListenerEvent::DrainFailed { mode, error })) => {
            assert_eq!(mode, DrainMode::ComponentNoEos);
            assert!(matches!(error, CodecError::BadState(_)));
        },
        other => panic!("expected a drain failure, got {other:?}"),
    }
    assert_eq!(hooks.drains(), vec![DrainMode::ComponentNoEos]);
    assert_eq!(component.state(), LifecycleState::Running);

    component.queue(items([2])).unwrap();
    assert_eq!(next_done(&mut events).await.frame_index, 2);

    component.release().await.unwrap();
}
