// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocator configuration loaded from TOML files or built in code.
//!
//! # TOML Format
//! ```toml
//! alignment = 8
//! free_policy = "coalesce"
//! trailing_extension = true
//! memory_budget = "512M"
//! ```
//!
//! Every key is optional; missing keys take the values of
//! [`AllocatorConfig::default`].

use crate::{AllocatorError, FreePolicy, HostRuntime, MemoryBudget};
use std::path::Path;

/// Alignment used when none is configured: the width of the largest tensor
/// element type (`u64` / `f64`).
pub const DEFAULT_ALIGNMENT: usize = std::mem::size_of::<u64>();

/// Planning and commit settings for an [`OffsetAllocator`](crate::OffsetAllocator).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Rounding granularity for every size and offset. Must be non-zero.
    pub alignment: usize,
    /// How freed ranges enter the free list.
    pub free_policy: FreePolicy,
    /// Let a too-small free block sitting at the frontier grow past it
    /// instead of bump-allocating above it.
    pub trailing_extension: bool,
    /// Ceiling for the host runtime built by [`AllocatorConfig::create_runtime`]
    /// (human-readable, e.g. `"256M"`). `None` means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_budget: Option<String>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            free_policy: FreePolicy::Retain,
            trailing_extension: false,
            memory_budget: None,
        }
    }
}

impl AllocatorConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, AllocatorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AllocatorError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, AllocatorError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| AllocatorError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, AllocatorError> {
        toml::to_string_pretty(self)
            .map_err(|e| AllocatorError::Config(format!("TOML serialise error: {e}")))
    }

    /// Checks the alignment and budget without building anything.
    pub fn validate(&self) -> Result<(), AllocatorError> {
        if self.alignment == 0 {
            return Err(AllocatorError::InvalidAlignment(0));
        }
        self.parse_budget()?;
        Ok(())
    }

    pub fn parse_budget(&self) -> Result<Option<MemoryBudget>, AllocatorError> {
        self.memory_budget
            .as_deref()
            .map(MemoryBudget::parse)
            .transpose()
    }

    /// Builds a [`HostRuntime`] honouring the configured budget.
    ///
    /// Host buffers are aligned to the larger of the cache line and the
    /// configured alignment rounded up to a power of two. For power-of-two
    /// alignments every planned offset is then aligned in real memory too;
    /// other alignments only hold relative to the arena base.
    pub fn create_runtime(&self) -> Result<HostRuntime, AllocatorError> {
        let base_alignment = self
            .alignment
            .checked_next_power_of_two()
            .ok_or(AllocatorError::InvalidAlignment(self.alignment))?
            .max(crate::runtime::DEFAULT_HOST_ALIGNMENT);

        let runtime = HostRuntime::new().with_alignment(base_alignment)?;
        Ok(match self.parse_budget()? {
            Some(budget) => runtime.with_budget(budget),
            None => runtime,
        })
    }
}
