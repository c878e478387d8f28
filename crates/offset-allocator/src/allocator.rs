// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The offset allocator: plan first, allocate once.
//!
//! An [`OffsetAllocator`] hands out byte *offsets* into an arena that does
//! not exist yet. Callers plan a whole computation with [`alloc`] and
//! [`free`]; the allocator reuses freed ranges and tracks how large the arena
//! has to be. The first call to [`get_pointer`] commits: the runtime is asked
//! for exactly [`peak_bytes`] bytes, and from then on the layout is frozen.
//!
//! ```text
//!   Planning ──alloc/free──► Planning
//!      │
//!      │ get_pointer()  (Runtime::alloc(peak))
//!      ▼
//!   Committed ──get_pointer()──► same base pointer
//!      │
//!      │ drop  (Runtime::dealloc)
//!      ▼
//! ```
//!
//! # Placement
//!
//! Requests are rounded up to the alignment and placed by the first rule
//! that applies:
//!
//! 1. **First-fit**: the lowest-offset free block that is large enough. Any
//!    remainder stays free directly above the allocation.
//! 2. **Trailing extension** (opt-in): if the highest free block ends at the
//!    frontier but is too small, the allocation starts at that block and the
//!    frontier grows by the shortfall.
//! 3. **Bump**: the allocation starts at the frontier.
//!
//! The frontier is the end of the laid-out region. It only moves up, and
//! [`peak_bytes`] is its high-water mark.
//!
//! [`alloc`]: OffsetAllocator::alloc
//! [`free`]: OffsetAllocator::free
//! [`get_pointer`]: OffsetAllocator::get_pointer
//! [`peak_bytes`]: OffsetAllocator::peak_bytes

use crate::guard::CommittedBuffer;
use crate::runtime::Runtime;
use crate::{AllocatorConfig, AllocatorError, AllocatorInfo, AllocatorStats, FreePolicy};
use std::collections::BTreeMap;
use std::ptr::NonNull;
use std::sync::Arc;

/// Plans offsets within one lazily-committed arena.
///
/// # Example
/// ```
/// use offset_allocator::{HostRuntime, OffsetAllocator};
/// use std::sync::Arc;
///
/// let mut arena = OffsetAllocator::new(Arc::new(HostRuntime::new()));
///
/// let a = arena.alloc(10); // rounded to 16
/// let b = arena.alloc(8);
/// assert_eq!((a, b), (0, 16));
///
/// arena.free(a, 10);
/// assert_eq!(arena.alloc(16), 0); // reuses the hole
/// assert_eq!(arena.peak_bytes(), 24);
///
/// let base = arena.get_pointer().unwrap();
/// assert_eq!(arena.get_pointer().unwrap(), base);
/// ```
pub struct OffsetAllocator {
    runtime: Arc<dyn Runtime>,
    alignment: usize,
    policy: FreePolicy,
    trailing_extension: bool,
    /// Bytes in live ranges.
    used: usize,
    /// End of the laid-out region; bump allocations start here.
    frontier: usize,
    /// High-water mark of `frontier`; the committed arena size.
    peak: usize,
    /// offset → size, pairwise disjoint, all below `frontier`.
    free_blocks: BTreeMap<usize, usize>,
    committed: Option<CommittedBuffer>,
    stats: AllocatorStats,
}

impl OffsetAllocator {
    /// Creates an allocator with the default configuration.
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        let defaults = AllocatorConfig::default();
        Self {
            runtime,
            alignment: defaults.alignment,
            policy: defaults.free_policy,
            trailing_extension: defaults.trailing_extension,
            used: 0,
            frontier: 0,
            peak: 0,
            free_blocks: BTreeMap::new(),
            committed: None,
            stats: AllocatorStats::default(),
        }
    }

    /// Creates an allocator with a custom alignment and otherwise default
    /// settings.
    pub fn with_alignment(
        runtime: Arc<dyn Runtime>,
        alignment: usize,
    ) -> Result<Self, AllocatorError> {
        Self::with_config(
            runtime,
            &AllocatorConfig {
                alignment,
                ..AllocatorConfig::default()
            },
        )
    }

    /// Creates an allocator from a validated configuration.
    pub fn with_config(
        runtime: Arc<dyn Runtime>,
        config: &AllocatorConfig,
    ) -> Result<Self, AllocatorError> {
        config.validate()?;
        tracing::debug!(
            runtime = runtime.name(),
            alignment = config.alignment,
            policy = %config.free_policy,
            trailing_extension = config.trailing_extension,
            "offset allocator created"
        );
        Ok(Self {
            alignment: config.alignment,
            policy: config.free_policy,
            trailing_extension: config.trailing_extension,
            ..Self::new(runtime)
        })
    }

    // ── Planning ───────────────────────────────────────────────

    /// Reserves `size` bytes (rounded up to the alignment) and returns the
    /// offset of the range within the arena.
    ///
    /// # Panics
    /// Panics if the arena is already committed, `size` is zero, or the
    /// range would not fit in the address space.
    pub fn alloc(&mut self, size: usize) -> usize {
        self.assert_planning("alloc");
        assert!(size > 0, "OffsetAllocator::alloc: zero-sized request");
        let size = self.aligned_size(size);

        let offset = match self.take_first_fit(size) {
            Some(offset) => offset,
            None => match self.extend_trailing(size) {
                Some(offset) => offset,
                None => self.bump(size),
            },
        };

        self.used = end_of(self.used, size);
        self.stats.observe(self.used, self.peak);
        offset
    }

    /// Returns the range `(offset, size)` to the free list.
    ///
    /// `size` must be the size originally passed to [`alloc`](Self::alloc);
    /// it is rounded the same way. The range is not checked against live
    /// allocations: double frees or mismatched sizes corrupt the bookkeeping
    /// (see [`validate`](Self::validate)).
    ///
    /// # Panics
    /// Panics if the arena is already committed or `size` is zero.
    pub fn free(&mut self, offset: usize, size: usize) {
        self.assert_planning("free");
        assert!(size > 0, "OffsetAllocator::free: zero-sized range");
        let size = self.aligned_size(size);

        if size > self.used {
            tracing::warn!(offset, size, used = self.used, "free exceeds live bytes");
        }
        self.used = self.used.saturating_sub(size);

        let merges = match self.policy {
            FreePolicy::Retain => {
                self.free_blocks.insert(offset, size);
                0
            }
            FreePolicy::Coalesce => self.insert_coalesced(offset, size),
        };
        tracing::trace!(offset, size, merges, "range freed");

        self.stats.record_free(merges);
        self.stats.observe(self.used, self.peak);
    }

    fn take_first_fit(&mut self, size: usize) -> Option<usize> {
        let (offset, block) = self
            .free_blocks
            .iter()
            .find(|&(_, &block)| block >= size)
            .map(|(&offset, &block)| (offset, block))?;

        self.free_blocks.remove(&offset);
        let remainder = block - size;
        if remainder > 0 {
            self.free_blocks.insert(offset + size, remainder);
        }

        tracing::trace!(offset, size, remainder, "first-fit reuse");
        self.stats.record_reuse(remainder > 0);
        Some(offset)
    }

    /// Grows the topmost free block into the frontier when it is too small.
    /// A block that already fits is left to first-fit.
    fn extend_trailing(&mut self, size: usize) -> Option<usize> {
        if !self.trailing_extension {
            return None;
        }
        let (&offset, &block) = self.free_blocks.last_key_value()?;
        // Only a block that is both topmost and too small qualifies; one that
        // fits is first-fit's job.
        if offset + block != self.frontier || block >= size {
            return None;
        }

        self.free_blocks.remove(&offset);
        self.frontier = end_of(offset, size);
        self.peak = self.peak.max(self.frontier);

        tracing::trace!(offset, size, grown_by = size - block, "trailing block extended");
        self.stats.record_trailing_extension();
        Some(offset)
    }

    fn bump(&mut self, size: usize) -> usize {
        let offset = self.frontier;
        self.frontier = end_of(offset, size);
        self.peak = self.peak.max(self.frontier);

        tracing::trace!(offset, size, frontier = self.frontier, "bump allocation");
        self.stats.record_bump();
        offset
    }

    /// Inserts a freed range, absorbing free blocks that touch it.
    /// Returns the number of merges.
    fn insert_coalesced(&mut self, offset: usize, size: usize) -> u64 {
        let mut start = offset;
        let mut len = size;
        let mut merges = 0;

        let lower = self
            .free_blocks
            .range(..offset)
            .next_back()
            .map(|(&o, &l)| (o, l));
        if let Some((lower_offset, lower_len)) = lower {
            if lower_offset + lower_len == offset {
                self.free_blocks.remove(&lower_offset);
                start = lower_offset;
                len += lower_len;
                merges += 1;
            }
        }

        if let Some(upper_len) = self.free_blocks.remove(&(offset + size)) {
            len += upper_len;
            merges += 1;
        }

        self.free_blocks.insert(start, len);
        merges
    }

    fn assert_planning(&self, op: &str) {
        assert!(
            self.committed.is_none(),
            "OffsetAllocator::{op} called after the arena was committed"
        );
    }

    // ── Commit ─────────────────────────────────────────────────

    /// Returns the base pointer of the arena, committing it on first call.
    ///
    /// The first successful call asks the runtime for [`peak_bytes`] bytes
    /// and freezes the layout. Later calls return the same pointer without
    /// touching the runtime. If the runtime fails, the error is returned and
    /// the allocator stays in the planning phase.
    ///
    /// [`peak_bytes`]: Self::peak_bytes
    pub fn get_pointer(&mut self) -> Result<NonNull<u8>, AllocatorError> {
        if let Some(buffer) = &self.committed {
            return Ok(buffer.as_ptr());
        }

        let raw = self.runtime.alloc(self.peak).map_err(|e| {
            tracing::warn!(runtime = self.runtime.name(), peak = self.peak, "commit failed: {e}");
            e
        })?;
        let buffer = CommittedBuffer::new(raw, Arc::clone(&self.runtime));

        // A short buffer goes straight back through the guard.
        if buffer.len() < self.peak {
            return Err(AllocatorError::OutOfMemory {
                requested_bytes: self.peak,
                available_bytes: buffer.len(),
                budget_bytes: buffer.len(),
            });
        }

        tracing::info!(
            runtime = self.runtime.name(),
            "allocator really alloc: {:p} {} bytes",
            buffer.as_ptr(),
            self.peak
        );
        let ptr = buffer.as_ptr();
        self.committed = Some(buffer);
        Ok(ptr)
    }

    /// Returns the address of `offset` within the arena, committing if needed.
    pub fn pointer_at(&mut self, offset: usize) -> Result<NonNull<u8>, AllocatorError> {
        let base = self.get_pointer()?;
        if offset >= self.peak {
            return Err(AllocatorError::OffsetOutOfBounds {
                offset,
                len: self.peak,
            });
        }
        // SAFETY: `offset < peak <= buffer.len()`, so the result stays inside
        // the committed allocation and cannot be null.
        Ok(unsafe { NonNull::new_unchecked(base.as_ptr().add(offset)) })
    }

    /// The committed buffer, if [`get_pointer`](Self::get_pointer) succeeded.
    pub fn committed_buffer(&self) -> Option<&CommittedBuffer> {
        self.committed.as_ref()
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    // ── Diagnostics ────────────────────────────────────────────

    /// Logs and returns the current used/peak figures.
    pub fn info(&self) -> AllocatorInfo {
        let info = AllocatorInfo {
            used_bytes: self.used,
            peak_bytes: self.peak,
            free_blocks: self.free_blocks.len(),
            free_bytes: self.free_bytes(),
            committed: self.is_committed(),
        };
        tracing::info!(
            free_blocks = info.free_blocks,
            free_bytes = info.free_bytes,
            committed = info.committed,
            "{info}"
        );
        info
    }

    /// Checks the free list against the allocator's invariants.
    ///
    /// Free blocks must be aligned, non-empty, disjoint and below the
    /// frontier, and live plus free bytes must add up to the frontier. Any
    /// invalid `free` call eventually shows up here.
    pub fn validate(&self) -> Result<(), AllocatorError> {
        let corrupted = |msg: String| Err(AllocatorError::Corrupted(msg));

        if self.used > self.peak {
            return corrupted(format!("used {} exceeds peak {}", self.used, self.peak));
        }
        if self.frontier > self.peak {
            return corrupted(format!("frontier {} exceeds peak {}", self.frontier, self.peak));
        }

        let mut prev_end = 0;
        for (&offset, &len) in &self.free_blocks {
            if offset % self.alignment != 0 || len % self.alignment != 0 || len == 0 {
                return corrupted(format!(
                    "free block {{{offset}:{len}}} is not a non-empty multiple of {}",
                    self.alignment
                ));
            }
            if offset < prev_end {
                return corrupted(format!(
                    "free block at {offset} overlaps the block ending at {prev_end}"
                ));
            }
            prev_end = offset + len;
            if prev_end > self.frontier {
                return corrupted(format!(
                    "free block {{{offset}:{len}}} extends past the frontier {}",
                    self.frontier
                ));
            }
        }

        let accounted = self.used + self.free_bytes();
        if accounted != self.frontier {
            return corrupted(format!(
                "used {} + free {} != frontier {}",
                self.used,
                self.free_bytes(),
                self.frontier
            ));
        }
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────

    /// Rounds `size` up to the next multiple of the alignment.
    ///
    /// # Panics
    /// Panics if the rounded size does not fit in a `usize`.
    pub fn aligned_size(&self, size: usize) -> usize {
        size.div_ceil(self.alignment)
            .checked_mul(self.alignment)
            .unwrap_or_else(|| {
                panic!(
                    "OffsetAllocator: size {size} overflows when aligned to {}",
                    self.alignment
                )
            })
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn policy(&self) -> FreePolicy {
        self.policy
    }

    pub fn trailing_extension(&self) -> bool {
        self.trailing_extension
    }

    pub fn used_bytes(&self) -> usize {
        self.used
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak
    }

    pub fn frontier(&self) -> usize {
        self.frontier
    }

    /// Free blocks as `(offset, size)` in ascending offset order.
    pub fn free_blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.free_blocks.iter().map(|(&offset, &size)| (offset, size))
    }

    pub fn free_block_count(&self) -> usize {
        self.free_blocks.len()
    }

    pub fn free_bytes(&self) -> usize {
        self.free_blocks.values().sum()
    }

    pub fn stats(&self) -> &AllocatorStats {
        &self.stats
    }
}

impl std::fmt::Debug for OffsetAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffsetAllocator")
            .field("runtime", &self.runtime.name())
            .field("alignment", &self.alignment)
            .field("policy", &self.policy)
            .field("used", &self.used)
            .field("peak", &self.peak)
            .field("free_blocks", &self.free_blocks)
            .field("committed", &self.committed.is_some())
            .finish()
    }
}

/// End of the range `offset..offset + size`.
fn end_of(offset: usize, size: usize) -> usize {
    offset
        .checked_add(size)
        .unwrap_or_else(|| panic!("OffsetAllocator: range {offset}+{size} overflows the arena"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RawBuffer;
    use crate::HostRuntime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Host-backed runtime that records every request.
    #[derive(Default)]
    struct RecordingRuntime {
        host: HostRuntime,
        requests: Mutex<Vec<usize>>,
        releases: AtomicUsize,
    }

    impl Runtime for RecordingRuntime {
        fn name(&self) -> &str {
            "recording"
        }

        fn alloc(&self, nbytes: usize) -> Result<RawBuffer, AllocatorError> {
            self.requests.lock().unwrap().push(nbytes);
            self.host.alloc(nbytes)
        }

        fn dealloc(&self, buffer: RawBuffer) {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.host.dealloc(buffer);
        }
    }

    /// Runtime that promises `nbytes` but hands back less.
    struct ShortRuntime(HostRuntime);

    impl Runtime for ShortRuntime {
        fn name(&self) -> &str {
            "short"
        }

        fn alloc(&self, nbytes: usize) -> Result<RawBuffer, AllocatorError> {
            self.0.alloc(nbytes / 2)
        }

        fn dealloc(&self, buffer: RawBuffer) {
            self.0.dealloc(buffer);
        }
    }

    fn allocator() -> (OffsetAllocator, Arc<RecordingRuntime>) {
        let rt = Arc::new(RecordingRuntime::default());
        (OffsetAllocator::new(rt.clone()), rt)
    }

    fn blocks(a: &OffsetAllocator) -> Vec<(usize, usize)> {
        a.free_blocks().collect()
    }

    #[test]
    fn test_defaults() {
        let (a, _) = allocator();
        assert_eq!(a.alignment(), 8);
        assert_eq!(a.policy(), FreePolicy::Retain);
        assert!(!a.trailing_extension());
        assert_eq!((a.used_bytes(), a.peak_bytes()), (0, 0));
        assert!(!a.is_committed());
    }

    #[test]
    fn test_aligned_size() {
        let (a, _) = allocator();
        assert_eq!(a.aligned_size(1), 8);
        assert_eq!(a.aligned_size(8), 8);
        assert_eq!(a.aligned_size(10), 16);
        assert_eq!(a.aligned_size(0), 0);
    }

    #[test]
    fn test_non_power_of_two_alignment() {
        let mut a = OffsetAllocator::with_alignment(Arc::new(HostRuntime::new()), 12).unwrap();
        assert_eq!(a.alloc(1), 0);
        assert_eq!(a.alloc(13), 12);
        assert_eq!(a.peak_bytes(), 36);
    }

    #[test]
    fn test_zero_alignment_rejected() {
        let err = OffsetAllocator::with_alignment(Arc::new(HostRuntime::new()), 0).unwrap_err();
        assert!(matches!(err, AllocatorError::InvalidAlignment(0)));
    }

    #[test]
    fn test_reuse_scenario() {
        let (mut a, _) = allocator();

        assert_eq!(a.alloc(10), 0);
        assert_eq!((a.used_bytes(), a.peak_bytes()), (16, 16));

        assert_eq!(a.alloc(8), 16);
        assert_eq!((a.used_bytes(), a.peak_bytes()), (24, 24));

        a.free(0, 10);
        assert_eq!(blocks(&a), vec![(0, 16)]);
        assert_eq!(a.used_bytes(), 8);

        assert_eq!(a.alloc(16), 0);
        assert!(blocks(&a).is_empty());
        assert_eq!((a.used_bytes(), a.peak_bytes()), (24, 24));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_growth_scenario() {
        let (mut a, _) = allocator();
        let offsets: Vec<_> = (0..3).map(|_| a.alloc(8)).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(a.peak_bytes(), 24);
        assert_eq!(a.free_block_count(), 0);
        assert_eq!(a.stats().bump_allocations, 3);
    }

    #[test]
    fn test_first_fit_splits_block() {
        let (mut a, _) = allocator();
        let x = a.alloc(32);
        let _y = a.alloc(8);
        a.free(x, 32);

        assert_eq!(a.alloc(8), 0);
        assert_eq!(blocks(&a), vec![(8, 24)]);
        assert_eq!(a.alloc(16), 8);
        assert_eq!(blocks(&a), vec![(24, 8)]);
        assert_eq!(a.peak_bytes(), 40);
        assert_eq!(a.stats().splits, 2);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_first_fit_prefers_lowest_offset() {
        let (mut a, _) = allocator();
        let low = a.alloc(16);
        let _pin1 = a.alloc(8);
        let high = a.alloc(16);
        let _pin2 = a.alloc(8);
        a.free(high, 16);
        a.free(low, 16);

        assert_eq!(a.alloc(16), low);
        assert_eq!(a.alloc(16), high);
    }

    #[test]
    fn test_fragmentation_without_coalescing() {
        let (mut a, _) = allocator();
        assert_eq!(a.alloc(8), 0);
        assert_eq!(a.alloc(8), 8);
        a.free(0, 8);
        a.free(8, 8);
        assert_eq!(blocks(&a), vec![(0, 8), (8, 8)]);

        // Neither hole alone fits, so the request bumps past them.
        assert_eq!(a.alloc(16), 16);
        assert_eq!(a.peak_bytes(), 32);
        assert_eq!(blocks(&a), vec![(0, 8), (8, 8)]);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_fragmentation_with_coalescing() {
        let rt = Arc::new(HostRuntime::new());
        let config = AllocatorConfig {
            free_policy: FreePolicy::Coalesce,
            ..Default::default()
        };
        let mut a = OffsetAllocator::with_config(rt, &config).unwrap();
        assert_eq!(a.alloc(8), 0);
        assert_eq!(a.alloc(8), 8);
        a.free(0, 8);
        a.free(8, 8);
        assert_eq!(blocks(&a), vec![(0, 16)]);
        assert_eq!(a.stats().merges, 1);

        assert_eq!(a.alloc(16), 0);
        assert_eq!(a.peak_bytes(), 16);
    }

    #[test]
    fn test_coalesce_merges_both_sides() {
        let rt = Arc::new(HostRuntime::new());
        let config = AllocatorConfig {
            free_policy: FreePolicy::Coalesce,
            ..Default::default()
        };
        let mut a = OffsetAllocator::with_config(rt, &config).unwrap();
        let x = a.alloc(8);
        let y = a.alloc(8);
        let z = a.alloc(8);
        let _top = a.alloc(8);

        a.free(x, 8);
        a.free(z, 8);
        assert_eq!(blocks(&a), vec![(0, 8), (16, 8)]);

        a.free(y, 8);
        assert_eq!(blocks(&a), vec![(0, 24)]);
        assert_eq!(a.stats().merges, 2);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_trailing_extension() {
        let rt = Arc::new(HostRuntime::new());
        let config = AllocatorConfig {
            trailing_extension: true,
            ..Default::default()
        };
        let mut a = OffsetAllocator::with_config(rt, &config).unwrap();
        assert_eq!(a.alloc(8), 0);
        assert_eq!(a.alloc(8), 8);
        a.free(0, 8);
        a.free(8, 8);

        // The topmost hole grows past the frontier instead of being skipped.
        assert_eq!(a.alloc(16), 8);
        assert_eq!(a.peak_bytes(), 24);
        assert_eq!(a.frontier(), 24);
        assert_eq!(blocks(&a), vec![(0, 8)]);
        assert_eq!(a.stats().trailing_extensions, 1);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_trailing_extension_ignores_inner_blocks() {
        let rt = Arc::new(HostRuntime::new());
        let config = AllocatorConfig {
            trailing_extension: true,
            ..Default::default()
        };
        let mut a = OffsetAllocator::with_config(rt, &config).unwrap();
        let x = a.alloc(8);
        let _pin = a.alloc(8);
        a.free(x, 8);

        // The hole at 0 is not at the frontier, so this bumps.
        assert_eq!(a.alloc(16), 16);
        assert_eq!(a.stats().trailing_extensions, 0);
    }

    #[test]
    fn test_trailing_block_that_fits_is_split() {
        let rt = Arc::new(HostRuntime::new());
        let config = AllocatorConfig {
            trailing_extension: true,
            ..Default::default()
        };
        let mut a = OffsetAllocator::with_config(rt, &config).unwrap();
        let _pin = a.alloc(8);
        let top = a.alloc(32);
        a.free(top, 32);

        assert_eq!(a.alloc(8), 8);
        assert_eq!(blocks(&a), vec![(16, 24)]);
        assert_eq!(a.peak_bytes(), 40);
        assert_eq!(a.stats().trailing_extensions, 0);
    }

    #[test]
    fn test_peak_is_monotonic() {
        let (mut a, _) = allocator();
        let x = a.alloc(64);
        let peak = a.peak_bytes();
        a.free(x, 64);
        assert_eq!(a.peak_bytes(), peak);
        assert_eq!(a.used_bytes(), 0);
    }

    #[test]
    fn test_commit_requests_peak_once() {
        let (mut a, rt) = allocator();
        a.alloc(10);
        a.alloc(8);
        a.free(0, 10);
        a.alloc(16);

        let p1 = a.get_pointer().unwrap();
        let p2 = a.get_pointer().unwrap();
        assert_eq!(p1, p2);
        assert_eq!(*rt.requests.lock().unwrap(), vec![24]);
        assert!(a.is_committed());
        assert_eq!(a.committed_buffer().map(|b| b.len()), Some(24));
    }

    #[test]
    fn test_drop_releases_once() {
        let (mut a, rt) = allocator();
        a.alloc(8);
        a.get_pointer().unwrap();
        drop(a);
        assert_eq!(rt.releases.load(Ordering::SeqCst), 1);
        assert_eq!(rt.host.live_buffers(), 0);
    }

    #[test]
    fn test_drop_without_commit_is_noop() {
        let (mut a, rt) = allocator();
        a.alloc(8);
        drop(a);
        assert!(rt.requests.lock().unwrap().is_empty());
        assert_eq!(rt.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_buffer_is_released() {
        let rt = Arc::new(ShortRuntime(HostRuntime::new()));
        let mut a = OffsetAllocator::new(rt.clone());
        a.alloc(64);

        let err = a.get_pointer().unwrap_err();
        assert!(matches!(err, AllocatorError::OutOfMemory { requested_bytes: 64, .. }));
        assert!(!a.is_committed());
        assert_eq!(rt.0.live_buffers(), 0);
    }

    #[test]
    #[should_panic(expected = "after the arena was committed")]
    fn test_alloc_after_commit_panics() {
        let (mut a, _) = allocator();
        a.alloc(8);
        a.get_pointer().unwrap();
        a.alloc(8);
    }

    #[test]
    #[should_panic(expected = "after the arena was committed")]
    fn test_free_after_commit_panics() {
        let (mut a, _) = allocator();
        let x = a.alloc(8);
        a.get_pointer().unwrap();
        a.free(x, 8);
    }

    #[test]
    #[should_panic(expected = "zero-sized request")]
    fn test_zero_alloc_panics() {
        let (mut a, _) = allocator();
        a.alloc(0);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_huge_alloc_panics() {
        let (mut a, _) = allocator();
        a.alloc(8);
        a.alloc(usize::MAX - 3);
    }

    #[test]
    #[should_panic(expected = "overflows the arena")]
    fn test_bump_past_address_space_panics() {
        let (mut a, _) = allocator();
        a.alloc(16);
        // Rounds to usize::MAX - 7, which only overflows once placed at 16.
        a.alloc(usize::MAX - 8);
    }

    #[test]
    fn test_pointer_at() {
        let (mut a, _) = allocator();
        a.alloc(8);
        let off = a.alloc(8);
        let base = a.get_pointer().unwrap();
        let p = a.pointer_at(off).unwrap();
        assert_eq!(p.as_ptr() as usize - base.as_ptr() as usize, 8);

        let err = a.pointer_at(16).unwrap_err();
        assert!(matches!(err, AllocatorError::OffsetOutOfBounds { offset: 16, len: 16 }));
    }

    #[test]
    fn test_info_reports_used_and_peak() {
        let (mut a, _) = allocator();
        let x = a.alloc(10);
        a.alloc(8);
        a.free(x, 10);

        let info = a.info();
        assert_eq!(info.used_bytes, 8);
        assert_eq!(info.peak_bytes, 24);
        assert_eq!(info.free_blocks, 1);
        assert_eq!(info.free_bytes, 16);
        assert!(!info.committed);
        assert_eq!(info.to_string(), "Used memory: 8, peak memory: 24");

        // Reporting does not change state.
        assert_eq!(a.info(), info);
    }

    #[test]
    fn test_validate_detects_double_free() {
        let (mut a, _) = allocator();
        let x = a.alloc(16);
        a.alloc(8);
        a.free(x, 16);
        a.free(x + 8, 8);
        assert!(matches!(a.validate(), Err(AllocatorError::Corrupted(_))));
    }

    #[test]
    fn test_validate_detects_wrong_size() {
        let (mut a, _) = allocator();
        let x = a.alloc(8);
        a.free(x, 64);
        assert!(a.validate().is_err());
        assert_eq!(a.used_bytes(), 0);
    }

    #[test]
    fn test_stats_track_fragmentation() {
        let (mut a, _) = allocator();
        a.alloc(8);
        a.alloc(8);
        a.free(0, 8);
        a.free(8, 8);
        a.alloc(16);

        let stats = a.stats();
        assert_eq!(stats.max_used_bytes, 16);
        assert_eq!(stats.peak_bytes, 32);
        assert_eq!(stats.fragmentation_bytes(), 16);
    }

    #[test]
    fn test_debug_format() {
        let (a, _) = allocator();
        let debug = format!("{a:?}");
        assert!(debug.contains("OffsetAllocator"));
        assert!(debug.contains("recording"));
    }
}
