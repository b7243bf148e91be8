// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Work that has been handed to the strategy but not finished yet.
//!
//! Entries are created at dispatch and removed at finish. While the strategy's
//! `process` call is running, the item itself lives on the processing thread's stack and
//! the entry only records that it is in flight; once `process` returns the item is parked
//! here until an out-of-order `finish` claims it.

use codeckit_core::error::{CodecError, Result};
use codeckit_core::WorkItem;
use std::collections::HashMap;

#[derive(Debug)]
pub(crate) struct PendingEntry {
    /// Generation the item was dispatched in.
    pub(crate) generation: u64,
    /// `None` while the item is being processed.
    pub(crate) work: Option<WorkItem>,
}

/// Result of looking up an entry for completion.
#[derive(Debug)]
pub(crate) enum Claim {
    Parked(WorkItem),
    InFlight,
    Missing,
    Stale { recorded: u64 },
}

#[derive(Debug, Default)]
pub(crate) struct PendingWorkTable {
    entries: HashMap<u64, PendingEntry>,
}

impl PendingWorkTable {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn contains(&self, frame_index: u64) -> bool {
        self.entries.contains_key(&frame_index)
    }

    /// Records a freshly dispatched item as in flight.
    pub(crate) fn insert_in_flight(&mut self, frame_index: u64, generation: u64) -> Result<()> {
        if self.entries.contains_key(&frame_index) {
            return Err(CodecError::CorruptedState(format!(
                "work {frame_index} dispatched while already pending"
            )));
        }
        self.entries.insert(frame_index, PendingEntry { generation, work: None });
        Ok(())
    }

    /// Moves an item that was in flight back into the table.
    pub(crate) fn park(&mut self, work: WorkItem) -> Result<()> {
        match self.entries.get_mut(&work.frame_index) {
            Some(entry) if entry.work.is_none() => {
                entry.work = Some(work);
                Ok(())
            },
            Some(_) => Err(CodecError::CorruptedState(format!(
                "work {} parked twice",
                work.frame_index
            ))),
            None => Err(CodecError::CorruptedState(format!(
                "work {} vanished from the pending table",
                work.frame_index
            ))),
        }
    }

    /// Removes the entry for `frame_index` if it belongs to `current_generation` and, when
    /// given, to `expected_generation`. Otherwise the table is left untouched.
    pub(crate) fn claim(
        &mut self,
        frame_index: u64,
        current_generation: u64,
        expected_generation: Option<u64>,
    ) -> Claim {
        let Some(entry) = self.entries.get(&frame_index) else {
            return Claim::Missing;
        };
        let recorded = entry.generation;
        if recorded != current_generation || expected_generation.is_some_and(|g| g != recorded) {
            return Claim::Stale { recorded };
        }
        match self.entries.remove(&frame_index).and_then(|entry| entry.work) {
            Some(work) => Claim::Parked(work),
            None => Claim::InFlight,
        }
    }

    /// The parked item for `frame_index`, if any.
    pub(crate) fn parked(&self, frame_index: u64) -> Option<&WorkItem> {
        self.entries.get(&frame_index).and_then(|entry| entry.work.as_ref())
    }

    /// Removes every entry, returning parked items ordered by frame index.
    ///
    /// # Errors
    ///
    /// Fails if an item is still in flight; callers only drain between dispatches.
    pub(crate) fn drain_sorted(&mut self) -> Result<Vec<WorkItem>> {
        if let Some(frame_index) =
            self.entries.iter().find(|(_, entry)| entry.work.is_none()).map(|(idx, _)| *idx)
        {
            return Err(CodecError::CorruptedState(format!(
                "work {frame_index} still in flight while draining pending work"
            )));
        }
        Ok(self.drain_lossy())
    }

    /// Removes every entry, returning whatever items are parked.
    pub(crate) fn drain_lossy(&mut self) -> Vec<WorkItem> {
        let mut items: Vec<WorkItem> =
            self.entries.drain().filter_map(|(_, entry)| entry.work).collect();
        items.sort_by_key(|work| work.frame_index);
        items
    }
}
