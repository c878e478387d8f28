// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor lifetime plans.
//!
//! A [`LifetimePlan`] is the ordered list of tensor births and deaths that a
//! graph executor will perform. Replaying it through an
//! [`OffsetAllocator`] yields a [`PlanLayout`]: one offset per tensor and the
//! arena size the whole graph needs.
//!
//! # JSON Format
//! ```json
//! {
//!   "name": "mlp-block",
//!   "events": [
//!     { "op": "alloc", "tensor": "x",      "size": 4096 },
//!     { "op": "alloc", "tensor": "hidden", "size": 16384 },
//!     { "op": "free",  "tensor": "x" },
//!     { "op": "alloc", "tensor": "out",    "size": 4096 }
//!   ]
//! }
//! ```

use crate::{AllocatorError, OffsetAllocator};
use std::collections::HashMap;
use std::path::Path;

/// One step in a tensor's life.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PlanEvent {
    /// The tensor becomes live with `size` bytes.
    Alloc { tensor: String, size: usize },
    /// The tensor is dead; its range may be reused.
    Free { tensor: String },
}

/// An ordered sequence of tensor lifetime events.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LifetimePlan {
    #[serde(default)]
    pub name: String,
    pub events: Vec<PlanEvent>,
}

/// Where one tensor landed.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Placement {
    pub tensor: String,
    pub offset: usize,
    /// Requested size, before alignment.
    pub size: usize,
}

/// Result of replaying a [`LifetimePlan`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PlanLayout {
    /// Placements in the order the tensors were allocated.
    pub placements: Vec<Placement>,
    /// Arena size required by the plan.
    pub peak_bytes: usize,
    /// Tensors still live at the end of the plan.
    pub live_at_end: Vec<String>,
}

impl PlanLayout {
    /// Looks up the offset assigned to `tensor` (its last allocation if the
    /// name was reused).
    pub fn offset_of(&self, tensor: &str) -> Option<usize> {
        self.placements
            .iter()
            .rev()
            .find(|p| p.tensor == tensor)
            .map(|p| p.offset)
    }
}

impl LifetimePlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
        }
    }

    /// Appends an allocation event (builder style).
    pub fn alloc(mut self, tensor: impl Into<String>, size: usize) -> Self {
        self.events.push(PlanEvent::Alloc {
            tensor: tensor.into(),
            size,
        });
        self
    }

    /// Appends a free event (builder style).
    pub fn free(mut self, tensor: impl Into<String>) -> Self {
        self.events.push(PlanEvent::Free {
            tensor: tensor.into(),
        });
        self
    }

    pub fn from_json(json: &str) -> Result<Self, AllocatorError> {
        serde_json::from_str(json)
            .map_err(|e| AllocatorError::Plan(format!("JSON parse error: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, AllocatorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AllocatorError::Plan(format!("cannot read plan '{}': {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, AllocatorError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AllocatorError::Plan(format!("JSON serialise error: {e}")))
    }

    /// Checks the plan without touching an allocator: no zero sizes, no
    /// double allocation of a live tensor, no free of a dead one.
    pub fn validate(&self) -> Result<(), AllocatorError> {
        let mut live = HashMap::new();
        for (step, event) in self.events.iter().enumerate() {
            match event {
                PlanEvent::Alloc { tensor, size } => {
                    if *size == 0 {
                        return Err(AllocatorError::Plan(format!(
                            "step {step}: tensor '{tensor}' has zero size"
                        )));
                    }
                    if live.insert(tensor.as_str(), *size).is_some() {
                        return Err(AllocatorError::Plan(format!(
                            "step {step}: tensor '{tensor}' allocated while still live"
                        )));
                    }
                }
                PlanEvent::Free { tensor } => {
                    if live.remove(tensor.as_str()).is_none() {
                        return Err(AllocatorError::Plan(format!(
                            "step {step}: tensor '{tensor}' freed but not live"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Drives `allocator` through every event and reports the layout.
    ///
    /// The plan is validated first, so a malformed plan never leaves the
    /// allocator half-replayed. The allocator must still be planning.
    pub fn replay(&self, allocator: &mut OffsetAllocator) -> Result<PlanLayout, AllocatorError> {
        self.validate()?;

        let mut live: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut placements = Vec::new();

        for event in &self.events {
            match event {
                PlanEvent::Alloc { tensor, size } => {
                    let offset = allocator.alloc(*size);
                    live.insert(tensor.as_str(), (offset, *size));
                    placements.push(Placement {
                        tensor: tensor.clone(),
                        offset,
                        size: *size,
                    });
                }
                PlanEvent::Free { tensor } => {
                    // `validate` guarantees the tensor is live.
                    if let Some((offset, size)) = live.remove(tensor.as_str()) {
                        allocator.free(offset, size);
                    }
                }
            }
        }

        let mut live_at_end: Vec<String> = live.into_keys().map(str::to_string).collect();
        live_at_end.sort();

        tracing::debug!(
            plan = %self.name,
            events = self.events.len(),
            peak = allocator.peak_bytes(),
            "lifetime plan replayed"
        );

        Ok(PlanLayout {
            placements,
            peak_bytes: allocator.peak_bytes(),
            live_at_end,
        })
    }
}
