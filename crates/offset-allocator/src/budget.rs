// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Byte ceilings for committed arenas.
//!
//! A [`MemoryBudget`] caps how large an arena the [`HostRuntime`] will hand
//! out at commit time. It parses human-readable strings so budgets can live
//! in TOML configuration next to the rest of the allocator settings.
//!
//! [`HostRuntime`]: crate::HostRuntime

use crate::AllocatorError;
use std::fmt;

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const GB: usize = 1024 * MB;

/// Recognised suffixes, longest first so `"MB"` wins over `"B"`.
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

/// A hard ceiling on the size of a committed arena.
///
/// # Examples
/// ```
/// use offset_allocator::MemoryBudget;
///
/// let b = MemoryBudget::parse("64M").unwrap();
/// assert_eq!(b.as_bytes(), 64 * 1024 * 1024);
/// assert_eq!(b.to_string(), "64 MB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * KB }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MB }
    }

    pub fn from_gb(gb: usize) -> Self {
        Self { bytes: gb * GB }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns `true` if an arena of `nbytes` fits under this ceiling.
    pub fn admits(&self, nbytes: usize) -> bool {
        nbytes <= self.bytes
    }

    /// Parses `"512M"`, `"1GB"`, `"2048k"`, `"100B"` or a plain byte count.
    ///
    /// Case-insensitive and tolerant of surrounding whitespace. Zero,
    /// empty, non-numeric and overflowing inputs are rejected.
    pub fn parse(s: &str) -> Result<Self, AllocatorError> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        let (digits, multiplier) = SUFFIXES
            .iter()
            .find_map(|(suffix, mult)| {
                upper
                    .strip_suffix(suffix)
                    .map(|rest| (rest.trim_end(), *mult))
            })
            .unwrap_or((upper.as_str(), 1));

        let invalid = || AllocatorError::InvalidBudget(trimmed.to_string());

        let value: usize = digits.parse().map_err(|_| invalid())?;
        let bytes = value.checked_mul(multiplier).ok_or_else(invalid)?;
        if bytes == 0 {
            return Err(invalid());
        }

        Ok(Self { bytes })
    }
}

impl std::str::FromStr for MemoryBudget {
    type Err = AllocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, label) = [(GB, "GB"), (MB, "MB"), (KB, "KB")]
            .into_iter()
            .find(|(unit, _)| self.bytes >= *unit && self.bytes % unit == 0)
            .unwrap_or((1, "B"));
        write!(f, "{} {label}", self.bytes / unit)
    }
}
