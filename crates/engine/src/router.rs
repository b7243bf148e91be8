// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Completion routing: pending-table lookup, generation checks and listener delivery.
//!
//! Only the processing thread calls into this module.

use crate::pending::Claim;
use crate::shared::Shared;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{WorkItem, Worklet};

/// Completes `frame_index` and delivers it.
///
/// `current` is the item being processed right now, if any; finishing it takes it out of
/// the slot. Returns `Ok(false)` when the frame is unknown or belongs to an older
/// generation, in which case nothing else happens.
pub(crate) fn finish(
    shared: &Shared,
    current: &mut Option<WorkItem>,
    frame_index: u64,
    expected_generation: Option<u64>,
    fill: impl FnOnce(&mut WorkItem),
) -> Result<bool> {
    let (claim, generation) = {
        let mut queue = shared.lock_work()?;
        let generation = queue.generation();
        (queue.pending_mut().claim(frame_index, generation, expected_generation), generation)
    };

    let mut work = match claim {
        Claim::Parked(work) => work,
        Claim::InFlight => match current.take_if(|work| work.frame_index == frame_index) {
            Some(work) => work,
            None => {
                return Err(CodecError::CorruptedState(format!(
                    "work {frame_index} marked in flight but not held by the processing thread"
                )));
            },
        },
        Claim::Missing => {
            tracing::debug!(component = %shared.name, frame_index, "Ignoring finish for unknown work");
            return Ok(false);
        },
        Claim::Stale { recorded } => {
            tracing::debug!(
                component = %shared.name,
                frame_index,
                generation,
                recorded,
                ?expected_generation,
                "Ignoring stale finish"
            );
            return Ok(false);
        },
    };

    fill(&mut work);
    tracing::debug!(component = %shared.name, frame_index, generation, "Work finished");
    deliver(shared, vec![work]);
    Ok(true)
}

/// Delivers an extra copy of an item without touching the pending table.
///
/// The copy shares input bytes with the original and starts with one empty worklet.
pub(crate) fn clone_and_send(
    shared: &Shared,
    current: Option<&WorkItem>,
    frame_index: u64,
    fill: impl FnOnce(&mut WorkItem),
) -> Result<bool> {
    let copy = {
        let queue = shared.lock_work()?;
        let source = match current.filter(|work| work.frame_index == frame_index) {
            Some(work) => Some(work),
            None => queue.pending().parked(frame_index),
        };
        source.map(shallow_copy)
    };

    let Some(mut copy) = copy else {
        tracing::debug!(component = %shared.name, frame_index, "Ignoring clone_and_send for unknown work");
        return Ok(false);
    };
    fill(&mut copy);
    deliver(shared, vec![copy]);
    Ok(true)
}

fn shallow_copy(work: &WorkItem) -> WorkItem {
    WorkItem {
        frame_index: work.frame_index,
        input: work.input.clone(),
        input_flags: work.input_flags,
        ordinal: work.ordinal,
        worklets: std::iter::once(Worklet::default()).collect(),
        worklets_processed: 0,
    }
}

/// Hands finished items to the listener, or drops them if none is set.
pub(crate) fn deliver(shared: &Shared, items: Vec<WorkItem>) {
    if items.is_empty() {
        return;
    }
    for work in &items {
        if let Some(error) = work.error() {
            tracing::warn!(
                component = %shared.name,
                frame_index = work.frame_index,
                %error,
                "Delivering failed work"
            );
            shared.metrics.record_failed();
        }
    }

    match shared.listener() {
        Some(listener) => {
            shared.metrics.record_completed(items.len());
            listener.on_work_done(items);
        },
        None => {
            tracing::warn!(
                component = %shared.name,
                count = items.len(),
                "No listener set, dropping completed work"
            );
        },
    }
}
