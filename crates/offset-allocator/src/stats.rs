// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Planning statistics and the `info()` report.
//!
//! [`AllocatorStats`] counts which path each request took (first-fit reuse,
//! trailing extension, bump) and how far the final arena overshoots the
//! largest live footprint. [`AllocatorInfo`] is the point-in-time snapshot
//! returned by [`OffsetAllocator::info`](crate::OffsetAllocator::info).

use std::fmt;

/// Cumulative counters collected while planning.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocatorStats {
    /// Total `alloc` calls.
    pub allocations: u64,
    /// Total `free` calls.
    pub frees: u64,
    /// Allocations served from an existing free block.
    pub reuse_hits: u64,
    /// Reuses that left a remainder block behind.
    pub splits: u64,
    /// Allocations that grew the trailing free block past the frontier.
    pub trailing_extensions: u64,
    /// Allocations placed at the frontier.
    pub bump_allocations: u64,
    /// Neighbour merges performed by the coalescing policy.
    pub merges: u64,
    /// Largest number of bytes live at the same time.
    pub max_used_bytes: usize,
    /// Final arena size so far (mirrors the allocator's peak).
    pub peak_bytes: usize,
}

impl AllocatorStats {
    /// Bytes of arena that were never live at once: `peak - max_used`.
    pub fn fragmentation_bytes(&self) -> usize {
        self.peak_bytes.saturating_sub(self.max_used_bytes)
    }

    /// Fraction of allocations served by reuse, in `[0.0, 1.0]`.
    pub fn reuse_ratio(&self) -> f64 {
        if self.allocations == 0 {
            return 0.0;
        }
        self.reuse_hits as f64 / self.allocations as f64
    }

    pub(crate) fn record_reuse(&mut self, split: bool) {
        self.allocations += 1;
        self.reuse_hits += 1;
        if split {
            self.splits += 1;
        }
    }

    pub(crate) fn record_trailing_extension(&mut self) {
        self.allocations += 1;
        self.trailing_extensions += 1;
    }

    pub(crate) fn record_bump(&mut self) {
        self.allocations += 1;
        self.bump_allocations += 1;
    }

    pub(crate) fn record_free(&mut self, merges: u64) {
        self.frees += 1;
        self.merges += merges;
    }

    pub(crate) fn observe(&mut self, used_bytes: usize, peak_bytes: usize) {
        self.max_used_bytes = self.max_used_bytes.max(used_bytes);
        self.peak_bytes = peak_bytes;
    }

    pub fn summary(&self) -> String {
        format!(
            "Planning: {} allocs ({} reused, {} split, {} extended, {} bumped), \
             {} frees ({} merges), max live {} B, peak {} B, {} B fragmentation ({:.0}% reuse)",
            self.allocations,
            self.reuse_hits,
            self.splits,
            self.trailing_extensions,
            self.bump_allocations,
            self.frees,
            self.merges,
            self.max_used_bytes,
            self.peak_bytes,
            self.fragmentation_bytes(),
            self.reuse_ratio() * 100.0,
        )
    }
}

/// Snapshot produced by [`OffsetAllocator::info`](crate::OffsetAllocator::info).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AllocatorInfo {
    pub used_bytes: usize,
    pub peak_bytes: usize,
    pub free_blocks: usize,
    pub free_bytes: usize,
    pub committed: bool,
}

impl fmt::Display for AllocatorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Used memory: {}, peak memory: {}",
            self.used_bytes, self.peak_bytes
        )
    }
}
