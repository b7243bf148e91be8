// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The unit of work that flows through a component.
//!
//! - [`WorkItem`]: one input (a list of buffers plus flags and ordinal) and its outputs
//! - [`Worklet`]: an output slot filled by the transform
//! - [`WorkFlags`]: independent per-frame flag bits
//! - [`DrainMode`] / [`FlushMode`]: modes accepted by `drain` and `flush`
//!
//! A work item is identified by its `frame_index`. The index must be unique among
//! everything a component currently holds; clients may reuse it once the item has
//! come back through the listener (or a flush).

use crate::buffer::Buffer;
use crate::error::CodecError;
use bitflags::bitflags;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

bitflags! {
    /// Independent, combinable frame flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct WorkFlags: u32 {
        /// The frame should be decoded but not rendered.
        const DROP_FRAME = 1 << 0;
        /// This is the last frame of the stream.
        const END_OF_STREAM = 1 << 1;
        /// The output is not meaningful and should be discarded.
        const DISCARD_FRAME = 1 << 2;
        /// The frame does not contain a complete access unit.
        const INCOMPLETE = 1 << 3;
        /// The frame was repaired after an error.
        const CORRECTED = 1 << 4;
        /// The frame is known to contain corrupt data.
        const CORRUPT = 1 << 5;
        /// The frame carries codec configuration data rather than media.
        const CODEC_CONFIG = 1 << 31;
    }
}

impl WorkFlags {
    pub const NONE: Self = Self::empty();
}

impl Default for WorkFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// Timing and ordering metadata attached to inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Ordinal {
    /// Presentation timestamp in microseconds
    pub timestamp_us: u64,
    /// Client-assigned sequence number
    pub sequence: u64,
    /// Opaque value carried through unchanged
    pub custom: u64,
}

impl Ordinal {
    pub const fn new(timestamp_us: u64, sequence: u64) -> Self {
        Self { timestamp_us, sequence, custom: 0 }
    }
}

/// Completion status of one output slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkStatus {
    #[default]
    Pending,
    Ok,
    Failed(CodecError),
}

/// An output slot of a work item.
#[derive(Debug, Clone, Default)]
pub struct Worklet {
    pub output: SmallVec<[Buffer; 2]>,
    pub flags: WorkFlags,
    pub ordinal: Ordinal,
    pub status: WorkStatus,
}

/// One unit of input and its eventual output(s).
///
/// Cloning is shallow for buffer contents (they are `Bytes`) and deep for metadata, which is
/// what `clone_and_send` relies on to emit an extra output without touching the original.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub frame_index: u64,
    pub input: SmallVec<[Buffer; 2]>,
    pub input_flags: WorkFlags,
    pub ordinal: Ordinal,
    pub worklets: SmallVec<[Worklet; 1]>,
    /// Number of worklets the transform has filled in.
    pub worklets_processed: u32,
}

impl WorkItem {
    /// Creates a work item with no inputs and a single empty worklet.
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            input: SmallVec::new(),
            input_flags: WorkFlags::NONE,
            ordinal: Ordinal::default(),
            worklets: smallvec![Worklet::default()],
            worklets_processed: 0,
        }
    }

    #[must_use]
    pub fn with_input(mut self, buffer: Buffer) -> Self {
        self.input.push(buffer);
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: WorkFlags) -> Self {
        self.input_flags = flags;
        self
    }

    #[must_use]
    pub const fn with_ordinal(mut self, ordinal: Ordinal) -> Self {
        self.ordinal = ordinal;
        self
    }

    pub const fn is_end_of_stream(&self) -> bool {
        self.input_flags.contains(WorkFlags::END_OF_STREAM)
    }

    pub const fn is_codec_config(&self) -> bool {
        self.input_flags.contains(WorkFlags::CODEC_CONFIG)
    }

    /// Returns the first output slot, creating one if the client sent none.
    pub fn worklet_mut(&mut self) -> &mut Worklet {
        if self.worklets.is_empty() {
            self.worklets.push(Worklet::default());
        }
        &mut self.worklets[0]
    }

    pub fn worklet(&self) -> Option<&Worklet> {
        self.worklets.first()
    }

    /// Fills the first worklet with `output` and marks it done, echoing the input ordinal.
    pub fn complete(&mut self, output: impl IntoIterator<Item = Buffer>, flags: WorkFlags) {
        let ordinal = self.ordinal;
        let worklet = self.worklet_mut();
        worklet.output.extend(output);
        worklet.flags |= flags;
        worklet.ordinal = ordinal;
        worklet.status = WorkStatus::Ok;
        self.worklets_processed = self.worklets_processed.max(1);
    }

    /// Marks every worklet as failed with `error`.
    pub fn fail(&mut self, error: CodecError) {
        let ordinal = self.ordinal;
        if self.worklets.is_empty() {
            self.worklets.push(Worklet::default());
        }
        for worklet in &mut self.worklets {
            worklet.ordinal = ordinal;
            worklet.status = WorkStatus::Failed(error.clone());
        }
        self.worklets_processed = u32::try_from(self.worklets.len()).unwrap_or(u32::MAX);
    }

    /// The first failure among the worklets, if any.
    pub fn error(&self) -> Option<&CodecError> {
        self.worklets.iter().find_map(|w| match &w.status {
            WorkStatus::Failed(err) => Some(err),
            _ => None,
        })
    }

    /// Output flags of the first worklet.
    pub fn output_flags(&self) -> WorkFlags {
        self.worklet().map_or(WorkFlags::NONE, |w| w.flags)
    }
}

/// Metadata-only description of work the client intends to queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkOutline {
    pub frame_index: u64,
    /// Ids of the components the work will pass through.
    pub chain: Vec<u32>,
}

/// How a drain request should finish the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    #[default]
    NoDrain,
    /// Flush internal state and mark the last output END_OF_STREAM.
    ComponentWithEos,
    /// Flush internal state without an END_OF_STREAM marker.
    ComponentNoEos,
    /// Drain the whole chain. Reserved.
    Chain,
}

impl DrainMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoDrain => "no_drain",
            Self::ComponentWithEos => "component_with_eos",
            Self::ComponentNoEos => "component_no_eos",
            Self::Chain => "chain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    #[default]
    Component,
    Chain,
}
