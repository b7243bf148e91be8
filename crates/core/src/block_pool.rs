// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Output block allocation.
//!
//! Transforms never allocate output memory directly; they ask a [`BlockPool`] for a
//! writable block and turn it into a [`Buffer`] once filled. [`BucketBlockPool`] is the
//! stock implementation:
//! - fixed size buckets (by byte count)
//! - bounded buffers retained per bucket
//! - bounded number of blocks alive at once (beyond that, fetches fail with `NoMemory`)
//! - storage returns to its bucket when the last block or buffer referencing it drops

use crate::buffer::{Buffer, PixelFormat, Rect};
use crate::error::{CodecError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};

/// Default bucket sizes in bytes (compressed access units up to a 1080p YUV420 frame).
pub const DEFAULT_BUCKET_SIZES: &[usize] = &[4 * 1024, 64 * 1024, 512 * 1024, 3_110_400];
pub const DEFAULT_BUFFERS_PER_BUCKET: usize = 8;
pub const DEFAULT_MAX_OUTSTANDING: usize = 64;

/// How a block is going to be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct MemoryUsage {
    pub cpu_read: bool,
    pub cpu_write: bool,
    /// Secure (protected) memory, not readable by the CPU.
    pub protected: bool,
}

impl MemoryUsage {
    pub const CPU_READ_WRITE: Self = Self { cpu_read: true, cpu_write: true, protected: false };
    pub const CPU_WRITE: Self = Self { cpu_read: false, cpu_write: true, protected: false };
}

/// Buffer allocator consumed by transforms.
///
/// Only ever called from a component's processing thread, but kept `Send + Sync` so a pool
/// can be shared between components.
pub trait BlockPool: Send + Sync {
    /// Fetches a writable 1-D block of at least `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NoMemory`] when the pool is exhausted.
    fn fetch_linear_block(&self, capacity: usize, usage: MemoryUsage) -> Result<LinearBlock>;

    /// Fetches a writable picture block.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NoMemory`] when the pool is exhausted.
    fn fetch_graphic_block(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<GraphicBlock>;
}

/// Configuration for [`BucketBlockPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BlockPoolConfig {
    pub bucket_sizes: Vec<usize>,
    /// Free buffers kept per bucket
    pub max_per_bucket: usize,
    /// Blocks that may be alive at once before fetches fail
    pub max_outstanding: usize,
}

impl Default for BlockPoolConfig {
    fn default() -> Self {
        Self {
            bucket_sizes: DEFAULT_BUCKET_SIZES.to_vec(),
            max_per_bucket: DEFAULT_BUFFERS_PER_BUCKET,
            max_outstanding: DEFAULT_MAX_OUTSTANDING,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub outstanding: usize,
    pub buckets: Vec<BucketStats>,
}

#[derive(Debug, Clone)]
pub struct BucketStats {
    pub bucket_size: usize,
    pub available: usize,
    pub max_per_bucket: usize,
}

#[derive(Clone)]
struct PoolHandle(Weak<Mutex<PoolInner>>);

struct PoolInner {
    bucket_sizes: Vec<usize>,
    max_per_bucket: usize,
    max_outstanding: usize,
    buckets: Vec<Vec<Vec<u8>>>,
    outstanding: usize,
    hits: u64,
    misses: u64,
}

impl PoolInner {
    fn bucket_index_for_min_len(&self, min_len: usize) -> Option<usize> {
        self.bucket_sizes.iter().position(|&size| size >= min_len)
    }
}

/// Thread-safe bucketed pool of byte buffers.
#[derive(Clone)]
pub struct BucketBlockPool {
    inner: Arc<Mutex<PoolInner>>,
}

impl BucketBlockPool {
    /// Create a pool with fixed buckets.
    ///
    /// `bucket_sizes` is sorted and deduplicated before use.
    pub fn with_buckets(
        mut bucket_sizes: Vec<usize>,
        max_per_bucket: usize,
        max_outstanding: usize,
    ) -> Self {
        bucket_sizes.sort_unstable();
        bucket_sizes.dedup();
        let buckets = (0..bucket_sizes.len()).map(|_| Vec::new()).collect();
        Self {
            inner: Arc::new(Mutex::new(PoolInner {
                bucket_sizes,
                max_per_bucket,
                max_outstanding,
                buckets,
                outstanding: 0,
                hits: 0,
                misses: 0,
            })),
        }
    }

    pub fn from_config(config: &BlockPoolConfig) -> Self {
        Self::with_buckets(
            config.bucket_sizes.clone(),
            config.max_per_bucket,
            config.max_outstanding,
        )
    }

    pub fn stats(&self) -> PoolStats {
        let Ok(guard) = self.inner.lock() else {
            return PoolStats { hits: 0, misses: 0, outstanding: 0, buckets: Vec::new() };
        };
        PoolStats {
            hits: guard.hits,
            misses: guard.misses,
            outstanding: guard.outstanding,
            buckets: guard
                .bucket_sizes
                .iter()
                .enumerate()
                .map(|(idx, &bucket_size)| BucketStats {
                    bucket_size,
                    available: guard.buckets[idx].len(),
                    max_per_bucket: guard.max_per_bucket,
                })
                .collect(),
        }
    }

    fn allocate(&self, min_len: usize, usage: MemoryUsage) -> Result<PooledStorage> {
        if usage.protected {
            return Err(CodecError::Omitted("protected memory is not available".to_string()));
        }
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| CodecError::NoMemory("block pool lock poisoned".to_string()))?;
        if guard.outstanding >= guard.max_outstanding {
            return Err(CodecError::NoMemory(format!(
                "{} blocks outstanding (limit {})",
                guard.outstanding, guard.max_outstanding
            )));
        }
        guard.outstanding += 1;

        let Some(bucket_idx) = guard.bucket_index_for_min_len(min_len) else {
            // Oversized requests are served exactly and never pooled.
            guard.misses += 1;
            drop(guard);
            return Ok(PooledStorage {
                data: vec![0; min_len],
                len: min_len,
                pool: Some(PoolHandle(Arc::downgrade(&self.inner))),
                bucket_idx: None,
            });
        };
        let bucket_size = guard.bucket_sizes[bucket_idx];
        let buf = guard.buckets[bucket_idx].pop();
        if buf.is_some() {
            guard.hits += 1;
        } else {
            guard.misses += 1;
        }
        drop(guard);

        let data = buf.unwrap_or_else(|| vec![0; bucket_size]);
        Ok(PooledStorage {
            data,
            len: min_len,
            pool: Some(PoolHandle(Arc::downgrade(&self.inner))),
            bucket_idx: Some(bucket_idx),
        })
    }
}

impl Default for BucketBlockPool {
    fn default() -> Self {
        Self::from_config(&BlockPoolConfig::default())
    }
}

impl BlockPool for BucketBlockPool {
    fn fetch_linear_block(&self, capacity: usize, usage: MemoryUsage) -> Result<LinearBlock> {
        Ok(LinearBlock { storage: self.allocate(capacity, usage)? })
    }

    fn fetch_graphic_block(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<GraphicBlock> {
        if width == 0 || height == 0 {
            return Err(CodecError::BadValue(format!("invalid picture size {width}x{height}")));
        }
        let storage = self.allocate(format.frame_size(width, height), usage)?;
        Ok(GraphicBlock { storage, width, height, format })
    }
}

/// Pooled bytes with a logical length. `data.len()` is the bucket size.
struct PooledStorage {
    data: Vec<u8>,
    len: usize,
    pool: Option<PoolHandle>,
    bucket_idx: Option<usize>,
}

impl AsRef<[u8]> for PooledStorage {
    fn as_ref(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl Drop for PooledStorage {
    fn drop(&mut self) {
        let Some(pool) = self.pool.take() else { return };
        let Some(inner) = pool.0.upgrade() else { return };
        let Ok(mut guard) = inner.lock() else { return };
        guard.outstanding = guard.outstanding.saturating_sub(1);

        let Some(bucket_idx) = self.bucket_idx.take() else { return };
        if guard.bucket_sizes.get(bucket_idx) != Some(&self.data.len()) {
            return;
        }
        if guard.buckets[bucket_idx].len() >= guard.max_per_bucket {
            return;
        }
        guard.buckets[bucket_idx].push(std::mem::take(&mut self.data));
    }
}

/// A writable 1-D block.
pub struct LinearBlock {
    storage: PooledStorage,
}

impl LinearBlock {
    pub const fn capacity(&self) -> usize {
        self.storage.len
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage.data[..self.storage.len]
    }

    /// Shares `size` bytes starting at `offset` as an immutable buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::BadValue`] if the range exceeds the block.
    pub fn into_buffer(self, offset: usize, size: usize) -> Result<Buffer> {
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= self.capacity())
            .ok_or_else(|| {
                CodecError::BadValue(format!(
                    "range {offset}+{size} exceeds block of {} bytes",
                    self.capacity()
                ))
            })?;
        let bytes = bytes::Bytes::from_owner(self.storage);
        Ok(Buffer::linear(bytes.slice(offset..end)))
    }
}

impl std::fmt::Debug for LinearBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearBlock")
            .field("capacity", &self.storage.len)
            .field("storage_len", &self.storage.data.len())
            .finish_non_exhaustive()
    }
}

/// A writable picture block.
pub struct GraphicBlock {
    storage: PooledStorage,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl GraphicBlock {
    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage.data[..self.storage.len]
    }

    /// Shares the picture as an immutable buffer cropped to `crop`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::BadValue`] if `crop` falls outside the picture.
    pub fn into_buffer(self, crop: Rect) -> Result<Buffer> {
        if !crop.fits_within(self.width, self.height) {
            return Err(CodecError::BadValue(format!(
                "crop {crop:?} exceeds {}x{} picture",
                self.width, self.height
            )));
        }
        let (width, height, format) = (self.width, self.height, self.format);
        Ok(Buffer::graphic(bytes::Bytes::from_owner(self.storage), width, height, format, crop))
    }
}

impl std::fmt::Debug for GraphicBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicBlock")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn buffer_returns_storage_to_pool_on_drop() {
        let pool = BucketBlockPool::with_buckets(vec![16], 1, 4);

        let mut block = pool.fetch_linear_block(10, MemoryUsage::CPU_WRITE).unwrap();
        block.as_mut_slice().fill(7);
        assert_eq!(block.capacity(), 10);

        let buffer = block.into_buffer(2, 4).unwrap();
        assert_eq!(buffer.data().as_ref(), &[7, 7, 7, 7]);
        assert_eq!(pool.stats().outstanding, 1);

        let shared = buffer.clone();
        drop(buffer);
        assert_eq!(pool.stats().outstanding, 1);
        drop(shared);

        let stats = pool.stats();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.buckets[0].available, 1);

        let _again = pool.fetch_linear_block(16, MemoryUsage::CPU_WRITE).unwrap();
        assert_eq!(pool.stats().hits, 1);
    }

    #[test]
    fn exhaustion_reports_no_memory() {
        let pool = BucketBlockPool::with_buckets(vec![8], 2, 2);
        let _a = pool.fetch_linear_block(8, MemoryUsage::CPU_WRITE).unwrap();
        let b = pool.fetch_linear_block(8, MemoryUsage::CPU_WRITE).unwrap();

        let err = pool.fetch_linear_block(8, MemoryUsage::CPU_WRITE).unwrap_err();
        assert!(matches!(err, CodecError::NoMemory(_)));

        drop(b);
        assert!(pool.fetch_linear_block(8, MemoryUsage::CPU_WRITE).is_ok());
    }

    #[test]
    fn oversized_requests_are_not_pooled() {
        let pool = BucketBlockPool::with_buckets(vec![8], 2, 4);
        let block = pool.fetch_linear_block(100, MemoryUsage::CPU_WRITE).unwrap();
        assert_eq!(block.capacity(), 100);
        drop(block);
        let stats = pool.stats();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.buckets[0].available, 0);
    }

    #[test]
    fn into_buffer_rejects_out_of_range() {
        let pool = BucketBlockPool::with_buckets(vec![8], 2, 4);
        let block = pool.fetch_linear_block(8, MemoryUsage::CPU_WRITE).unwrap();
        assert!(matches!(block.into_buffer(4, 5), Err(CodecError::BadValue(_))));
    }

    #[test]
    fn graphic_block_crops() {
        let pool = BucketBlockPool::default();
        let block = pool
            .fetch_graphic_block(16, 8, PixelFormat::Yuv420Planar, MemoryUsage::CPU_WRITE)
            .unwrap();
        assert_eq!(block.width(), 16);
        let buffer = block.into_buffer(Rect::new(16, 6)).unwrap();
        assert_eq!(buffer.len(), PixelFormat::Yuv420Planar.frame_size(16, 8));
        assert!(buffer.is_graphic());

        let block = pool
            .fetch_graphic_block(16, 8, PixelFormat::Yuv420Planar, MemoryUsage::CPU_WRITE)
            .unwrap();
        assert!(block.into_buffer(Rect::new(17, 8)).is_err());
    }

    #[test]
    fn protected_usage_is_omitted() {
        let pool = BucketBlockPool::default();
        let usage = MemoryUsage { protected: true, ..MemoryUsage::CPU_WRITE };
        assert!(matches!(pool.fetch_linear_block(4, usage), Err(CodecError::Omitted(_))));
    }
}
