// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The runtime seam: where real memory comes from.
//!
//! The [`OffsetAllocator`](crate::OffsetAllocator) never touches memory
//! while planning. At commit it asks its [`Runtime`] for exactly one buffer
//! of the peak size and hands it back on drop. Anything that can produce and
//! reclaim raw byte buffers (host heap, a device driver, a test double) can
//! sit behind this trait.
//!
//! [`HostRuntime`] is the built-in backend over the global heap, with an
//! optional [`MemoryBudget`] ceiling.

use crate::{AllocatorError, MemoryBudget};
use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default base alignment for host buffers: one cache line.
pub const DEFAULT_HOST_ALIGNMENT: usize = 64;

/// A raw buffer handed out by a [`Runtime`].
///
/// Carries no ownership semantics of its own; the
/// [`CommittedBuffer`](crate::CommittedBuffer) guard is what guarantees it is
/// returned exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl RawBuffer {
    pub fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Usable length in bytes (the size that was requested).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Provider of real memory for committed arenas.
///
/// `alloc` must return a buffer of at least `nbytes` bytes or an error;
/// `dealloc` receives each buffer at most once.
pub trait Runtime {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Obtains a buffer of at least `nbytes` bytes.
    fn alloc(&self, nbytes: usize) -> Result<RawBuffer, AllocatorError>;

    /// Releases a buffer previously returned by [`Runtime::alloc`].
    fn dealloc(&self, buffer: RawBuffer);
}

/// Heap-backed runtime with an optional hard ceiling.
///
/// # Example
/// ```
/// use offset_allocator::{HostRuntime, MemoryBudget, Runtime};
///
/// let rt = HostRuntime::new().with_budget(MemoryBudget::from_kb(4));
/// let buf = rt.alloc(1024).unwrap();
/// assert_eq!(rt.outstanding_bytes(), 1024);
/// rt.dealloc(buf);
/// assert_eq!(rt.outstanding_bytes(), 0);
///
/// assert!(rt.alloc(8192).is_err());
/// ```
#[derive(Debug)]
pub struct HostRuntime {
    alignment: usize,
    budget: Option<MemoryBudget>,
    outstanding_bytes: AtomicUsize,
    live_buffers: AtomicUsize,
}

impl HostRuntime {
    pub fn new() -> Self {
        Self {
            alignment: DEFAULT_HOST_ALIGNMENT,
            budget: None,
            outstanding_bytes: AtomicUsize::new(0),
            live_buffers: AtomicUsize::new(0),
        }
    }

    /// Sets the base alignment of returned buffers. Must be a power of two.
    pub fn with_alignment(mut self, alignment: usize) -> Result<Self, AllocatorError> {
        if !alignment.is_power_of_two() {
            return Err(AllocatorError::InvalidAlignment(alignment));
        }
        self.alignment = alignment;
        Ok(self)
    }

    /// Caps the total bytes this runtime will have outstanding at once.
    pub fn with_budget(mut self, budget: MemoryBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn budget(&self) -> Option<MemoryBudget> {
        self.budget
    }

    /// Bytes currently handed out and not yet returned.
    pub fn outstanding_bytes(&self) -> usize {
        self.outstanding_bytes.load(Ordering::Acquire)
    }

    /// Number of buffers currently handed out.
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Acquire)
    }

    // Zero-byte arenas still get a real one-byte allocation so that every
    // buffer has a unique address and a valid layout to free with.
    fn layout_for(&self, nbytes: usize) -> Result<Layout, AllocatorError> {
        Layout::from_size_align(nbytes.max(1), self.alignment)
            .map_err(|_| AllocatorError::InvalidAlignment(self.alignment))
    }
}

impl Default for HostRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for HostRuntime {
    fn name(&self) -> &str {
        "host"
    }

    fn alloc(&self, nbytes: usize) -> Result<RawBuffer, AllocatorError> {
        let outstanding = self.outstanding_bytes();
        if let Some(budget) = self.budget {
            if !budget.admits(outstanding.saturating_add(nbytes)) {
                return Err(AllocatorError::OutOfMemory {
                    requested_bytes: nbytes,
                    available_bytes: budget.as_bytes().saturating_sub(outstanding),
                    budget_bytes: budget.as_bytes(),
                });
            }
        }

        let layout = self.layout_for(nbytes)?;
        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(AllocatorError::OutOfMemory {
            requested_bytes: nbytes,
            available_bytes: 0,
            budget_bytes: self.budget.map_or(usize::MAX, |b| b.as_bytes()),
        })?;

        self.outstanding_bytes.fetch_add(nbytes, Ordering::Release);
        self.live_buffers.fetch_add(1, Ordering::Release);
        tracing::debug!(runtime = self.name(), nbytes, "host buffer allocated");

        Ok(RawBuffer::new(ptr, nbytes))
    }

    fn dealloc(&self, buffer: RawBuffer) {
        let Ok(layout) = self.layout_for(buffer.len()) else {
            tracing::warn!(len = buffer.len(), "cannot rebuild layout; leaking host buffer");
            return;
        };
        // SAFETY: the buffer was produced by `alloc` on this runtime with the
        // same alignment and length, so the layout matches.
        unsafe { alloc::dealloc(buffer.as_ptr().as_ptr(), layout) };

        self.outstanding_bytes.fetch_sub(buffer.len(), Ordering::Release);
        self.live_buffers.fetch_sub(1, Ordering::Release);
        tracing::debug!(runtime = self.name(), nbytes = buffer.len(), "host buffer released");
    }
}
