// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # offset-allocator
//!
//! A planning allocator for tensor arenas. Instead of touching memory on
//! every request, it assigns byte offsets inside an arena that does not
//! exist yet, reuses ranges released by dead tensors, and only asks the
//! runtime for real memory once the final (peak) size is known.
//!
//! # Key Components
//!
//! - [`OffsetAllocator`]: the planner. First-fit reuse of free blocks,
//!   optional trailing-block extension, bump allocation at the frontier, and
//!   a one-shot commit.
//! - [`Runtime`]: where real memory comes from. [`HostRuntime`] is the
//!   heap-backed implementation, optionally capped by a [`MemoryBudget`].
//! - [`CommittedBuffer`]: RAII owner of the committed arena; returns it to
//!   the runtime on drop.
//! - [`FreePolicy`] and [`AllocatorConfig`]: coalescing and alignment
//!   settings, loadable from TOML.
//! - [`LifetimePlan`]: replays a JSON list of tensor births and deaths into
//!   a [`PlanLayout`].
//!
//! # Lifecycle
//!
//! ```text
//! OffsetAllocator::new(runtime)
//!       │
//!       │  alloc / free   (offsets only, no memory touched)
//!       ▼
//!   get_pointer()  ──► Runtime::alloc(peak)  ──► CommittedBuffer
//!       │
//!       │  alloc / free now panic
//!       ▼
//!     drop  ──► Runtime::dealloc
//! ```
//!
//! # Example
//! ```
//! use offset_allocator::{HostRuntime, OffsetAllocator};
//! use std::sync::Arc;
//!
//! let mut arena = OffsetAllocator::new(Arc::new(HostRuntime::new()));
//!
//! let activations = arena.alloc(1000);
//! let weights = arena.alloc(4000);
//! arena.free(activations, 1000);
//! let logits = arena.alloc(800); // lands in the activations' hole
//! assert_eq!(logits, activations);
//!
//! let base = arena.get_pointer().unwrap();
//! println!("{} at {base:p}", arena.info());
//! # let _ = weights;
//! ```

mod allocator;
mod budget;
mod config;
mod error;
mod guard;
pub mod plan;
mod policy;
pub mod runtime;
mod stats;

pub use allocator::OffsetAllocator;
pub use budget::MemoryBudget;
pub use config::{AllocatorConfig, DEFAULT_ALIGNMENT};
pub use error::AllocatorError;
pub use guard::CommittedBuffer;
pub use plan::{LifetimePlan, PlanEvent, PlanLayout, Placement};
pub use policy::FreePolicy;
pub use runtime::{HostRuntime, RawBuffer, Runtime};
pub use stats::{AllocatorInfo, AllocatorStats};
