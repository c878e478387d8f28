// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for offset planning and arena commit.
//!
//! Only recoverable failures live here. Planning after commit is a caller
//! bug and panics instead of returning an error.

/// Errors surfaced by the allocator, its runtimes, and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    /// The runtime could not provide a buffer of the requested size.
    #[error("out of memory: requested {requested_bytes} bytes, but only {available_bytes} available (budget: {budget_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        budget_bytes: usize,
    },

    /// Alignment must be non-zero (and a power of two for host buffers).
    #[error("invalid alignment {0}")]
    InvalidAlignment(usize),

    /// A human-readable budget string could not be parsed.
    #[error("invalid budget string '{0}': expected a number followed by an optional suffix (K, M, G)")]
    InvalidBudget(String),

    /// An offset lies outside the committed arena.
    #[error("offset {offset} is outside the committed arena of {len} bytes")]
    OffsetOutOfBounds { offset: usize, len: usize },

    /// Configuration could not be read, parsed, or serialised.
    #[error("configuration error: {0}")]
    Config(String),

    /// Free-list bookkeeping no longer satisfies its invariants.
    #[error("allocator integrity error: {0}")]
    Corrupted(String),

    /// A tensor lifetime plan is malformed.
    #[error("lifetime plan error: {0}")]
    Plan(String),
}
