// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII ownership of the committed arena.
//!
//! [`CommittedBuffer`] pairs the runtime's [`RawBuffer`] with a handle to the
//! [`Runtime`] that produced it. Dropping the guard hands the buffer back
//! exactly once, whichever path the owning allocator is torn down on.

use crate::runtime::{RawBuffer, Runtime};
use std::ptr::NonNull;
use std::sync::Arc;

/// The real buffer backing a committed arena.
pub struct CommittedBuffer {
    /// Wrapped in `Option` so `drop()` can `take()` it.
    buffer: Option<RawBuffer>,
    runtime: Arc<dyn Runtime>,
}

impl CommittedBuffer {
    pub(crate) fn new(buffer: RawBuffer, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            buffer: Some(buffer),
            runtime,
        }
    }

    /// Base address of the arena.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.raw().as_ptr()
    }

    /// Arena size in bytes.
    pub fn len(&self) -> usize {
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn raw(&self) -> RawBuffer {
        // Only `drop` empties the slot.
        self.buffer.expect("committed buffer already released")
    }
}

impl Drop for CommittedBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            tracing::debug!(
                runtime = self.runtime.name(),
                nbytes = buffer.len(),
                "releasing committed arena"
            );
            self.runtime.dealloc(buffer);
        }
    }
}

impl std::fmt::Debug for CommittedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommittedBuffer")
            .field("runtime", &self.runtime.name())
            .field("len", &self.buffer.map(|b| b.len()))
            .field("ptr", &self.buffer.map(|b| b.as_ptr()))
            .finish()
    }
}
