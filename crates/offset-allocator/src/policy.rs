// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! What happens to a range when it is freed.
//!
//! | Policy | Neighbouring free blocks | Trade-off |
//! |---|---|---|
//! | [`FreePolicy::Retain`] | kept as separate entries | simplest, fragments |
//! | [`FreePolicy::Coalesce`] | merged into one block | larger reusable holes |

use crate::AllocatorError;
use std::fmt;
use std::str::FromStr;

/// Free-list maintenance policy applied by
/// [`OffsetAllocator::free`](crate::OffsetAllocator::free).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreePolicy {
    /// Insert the freed range as-is. Two adjacent frees stay two blocks.
    #[default]
    Retain,
    /// Merge the freed range with free blocks touching it on either side.
    Coalesce,
}

impl FreePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FreePolicy::Retain => "retain",
            FreePolicy::Coalesce => "coalesce",
        }
    }

    pub fn merges_neighbours(self) -> bool {
        matches!(self, FreePolicy::Coalesce)
    }
}

impl FromStr for FreePolicy {
    type Err = AllocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retain" | "no-coalesce" => Ok(FreePolicy::Retain),
            "coalesce" | "merge" => Ok(FreePolicy::Coalesce),
            other => Err(AllocatorError::Config(format!(
                "unknown free policy '{other}'; expected 'retain' or 'coalesce'"
            ))),
        }
    }
}

impl fmt::Display for FreePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
