// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Admission queue, drain markers and the flush generation.
//!
//! The queue and the [`PendingWorkTable`] sit behind one mutex so an item moves between
//! them atomically. Every method here is O(1) or O(batch) metadata work; nothing calls out
//! to the strategy while the lock is held.

use crate::pending::PendingWorkTable;
use codeckit_core::error::{CodecError, Result};
use codeckit_core::{DrainMode, WorkItem};
use std::collections::{HashSet, VecDeque};

#[derive(Debug)]
struct Entry {
    work: WorkItem,
    drain_mode: DrainMode,
}

/// An item popped for dispatch, already recorded as in flight.
#[derive(Debug)]
pub(crate) struct Dispatch {
    pub(crate) work: WorkItem,
    pub(crate) drain_mode: DrainMode,
    pub(crate) generation: u64,
}

/// Where a drain request ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainMark {
    /// Attached to the item currently at the tail.
    Tail(u64),
    /// Nothing queued but work is pending; the drain runs on its own in this generation.
    Immediate(u64),
    /// Nothing queued or pending; the marker waits for the next admitted batch.
    Armed,
    Ignored,
}

#[derive(Debug, Default)]
pub(crate) struct WorkQueue {
    entries: VecDeque<Entry>,
    queued: HashSet<u64>,
    pending: PendingWorkTable,
    generation: u64,
    flush_pending: bool,
    armed_drain: Option<DrainMode>,
}

impl WorkQueue {
    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new generation; completions recorded under older ones become stale.
    pub(crate) fn inc_generation(&mut self) {
        self.generation += 1;
        self.flush_pending = true;
    }

    /// Returns and clears the flush-pending latch.
    pub(crate) fn take_pending_flush(&mut self) -> bool {
        std::mem::take(&mut self.flush_pending)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) const fn pending(&self) -> &PendingWorkTable {
        &self.pending
    }

    pub(crate) fn pending_mut(&mut self) -> &mut PendingWorkTable {
        &mut self.pending
    }

    /// Whether `frame_index` is queued or pending.
    pub(crate) fn is_outstanding(&self, frame_index: u64) -> bool {
        self.queued.contains(&frame_index) || self.pending.contains(frame_index)
    }

    /// Appends a batch, all or nothing.
    ///
    /// # Errors
    ///
    /// - [`CodecError::BadValue`] for an empty batch.
    /// - [`CodecError::Duplicate`] if any frame index is already outstanding or repeats
    ///   within the batch. The queue is left unmodified.
    pub(crate) fn push_batch(&mut self, items: Vec<WorkItem>) -> Result<usize> {
        if items.is_empty() {
            return Err(CodecError::BadValue("queue() needs at least one work item".to_string()));
        }
        let mut batch = HashSet::with_capacity(items.len());
        for work in &items {
            if self.is_outstanding(work.frame_index) || !batch.insert(work.frame_index) {
                return Err(CodecError::Duplicate { frame_index: work.frame_index });
            }
        }

        let count = items.len();
        let last = count - 1;
        let armed = self.armed_drain.take();
        for (i, work) in items.into_iter().enumerate() {
            let drain_mode = if i == last { armed.unwrap_or_default() } else { DrainMode::NoDrain };
            self.queued.insert(work.frame_index);
            self.entries.push_back(Entry { work, drain_mode });
        }
        Ok(count)
    }

    /// Attaches a drain marker to the tail. With nothing queued, the drain either runs now
    /// (work is pending) or is armed for the next batch.
    pub(crate) fn mark_drain(&mut self, mode: DrainMode) -> DrainMark {
        if mode == DrainMode::NoDrain {
            return DrainMark::Ignored;
        }
        match self.entries.back_mut() {
            Some(entry) => {
                entry.drain_mode = mode;
                DrainMark::Tail(entry.work.frame_index)
            },
            None if !self.pending.is_empty() => DrainMark::Immediate(self.generation),
            None => {
                self.armed_drain = Some(mode);
                DrainMark::Armed
            },
        }
    }

    /// Pops the front item and records it as in flight under the current generation.
    ///
    /// # Errors
    ///
    /// Fails with [`CodecError::CorruptedState`] if the item is somehow already pending.
    pub(crate) fn pop_for_dispatch(&mut self) -> Result<Option<Dispatch>> {
        let Some(Entry { work, drain_mode }) = self.entries.pop_front() else {
            return Ok(None);
        };
        if !self.queued.remove(&work.frame_index) {
            return Err(CodecError::CorruptedState(format!(
                "work {} popped but was not tracked as queued",
                work.frame_index
            )));
        }
        self.pending.insert_in_flight(work.frame_index, self.generation)?;
        Ok(Some(Dispatch { work, drain_mode, generation: self.generation }))
    }

    /// Removes everything, returning pending items (by frame index) then queued items (FIFO).
    ///
    /// # Errors
    ///
    /// Fails if an item is still in flight. Nothing is removed in that case.
    pub(crate) fn take_all(&mut self) -> Result<Vec<WorkItem>> {
        let mut items = self.pending.drain_sorted()?;
        items.extend(self.take_queued());
        Ok(items)
    }

    /// Removes everything that can be removed, skipping in-flight markers.
    pub(crate) fn take_all_lossy(&mut self) -> Vec<WorkItem> {
        let mut items = self.pending.drain_lossy();
        items.extend(self.take_queued());
        items
    }

    fn take_queued(&mut self) -> Vec<WorkItem> {
        self.queued.clear();
        self.armed_drain = None;
        self.entries.drain(..).map(|entry| entry.work).collect()
    }

    #[cfg(test)]
    pub(crate) fn queued_frame_indexes(&self) -> Vec<u64> {
        self.entries.iter().map(|entry| entry.work.frame_index).collect()
    }
}
