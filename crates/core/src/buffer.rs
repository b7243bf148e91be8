// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Immutable buffer handles carried by work items.
//!
//! A [`Buffer`] wraps [`bytes::Bytes`], so cloning one (for example when a work item is
//! shallow-copied by `clone_and_send`) only bumps a refcount. Buffers created from pooled
//! blocks keep the block alive and hand its storage back to the pool on the last drop.

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pixel layouts understood by graphic blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit Y plane followed by quarter-size U and V planes.
    Yuv420Planar,
    /// 8-bit Y plane followed by an interleaved UV plane.
    Yuv420SemiPlanar,
    /// 16-bit Y plane followed by an interleaved 16-bit UV plane.
    P010,
    Rgba8888,
}

impl PixelFormat {
    /// Bytes needed to hold one `width` x `height` frame in this layout.
    pub const fn frame_size(self, width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;
        match self {
            Self::Yuv420Planar | Self::Yuv420SemiPlanar => luma + luma / 2,
            Self::P010 => (luma + luma / 2) * 2,
            Self::Rgba8888 => luma * 4,
        }
    }
}

/// A crop rectangle inside a graphic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { left: 0, top: 0, width, height }
    }

    /// Whether this rectangle lies entirely inside a `width` x `height` frame.
    pub const fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left as u64 + self.width as u64 <= width as u64
            && self.top as u64 + self.height as u64 <= height as u64
    }
}

/// How the bytes of a [`Buffer`] should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Linear,
    Graphic { width: u32, height: u32, format: PixelFormat, crop: Rect },
}

/// An opaque, shareable input or output buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Bytes,
    kind: BufferKind,
}

impl Buffer {
    /// Wraps linear (1-D) data such as a compressed access unit.
    pub fn linear(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), kind: BufferKind::Linear }
    }

    /// Wraps a decoded picture.
    pub fn graphic(
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        format: PixelFormat,
        crop: Rect,
    ) -> Self {
        Self { data: data.into(), kind: BufferKind::Graphic { width, height, format, crop } }
    }

    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    pub const fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub const fn is_graphic(&self) -> bool {
        matches!(self.kind, BufferKind::Graphic { .. })
    }
}
