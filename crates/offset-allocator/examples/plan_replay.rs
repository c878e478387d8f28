// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: plan a transformer's activation memory and commit it once.
//!
//! Builds a synthetic lifetime plan (or loads one from a JSON file), replays
//! it under every allocator configuration, and prints how large an arena
//! each would need. The smallest layout is then committed on the host.
//!
//! ```bash
//! cargo run -p offset-allocator --example plan_replay
//! cargo run -p offset-allocator --example plan_replay -- ./plan.json
//! RUST_LOG=debug cargo run -p offset-allocator --example plan_replay
//! ```

use anyhow::Context;
use offset_allocator::{AllocatorConfig, FreePolicy, LifetimePlan, OffsetAllocator};
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let plan = match std::env::args().nth(1) {
        Some(path) => {
            let path = PathBuf::from(path);
            LifetimePlan::from_file(&path)
                .with_context(|| format!("failed to load plan from '{}'", path.display()))?
        }
        None => build_plan("gpt2-like", 8, 768, 64),
    };
    plan.validate()?;
    println!("Plan '{}': {} events\n", plan.name, plan.events.len());

    let configs = [
        ("retain", FreePolicy::Retain, false),
        ("retain+extend", FreePolicy::Retain, true),
        ("coalesce", FreePolicy::Coalesce, false),
        ("coalesce+extend", FreePolicy::Coalesce, true),
    ];

    println!(
        "{:<18} {:>12} {:>12} {:>12} {:>8}",
        "Config", "Peak KB", "Max live KB", "Frag KB", "Reuse",
    );
    println!("{}", "-".repeat(66));

    let mut best: Option<(usize, AllocatorConfig)> = None;
    for (label, free_policy, trailing_extension) in configs {
        let config = AllocatorConfig {
            free_policy,
            trailing_extension,
            ..Default::default()
        };
        let runtime = Arc::new(config.create_runtime()?);
        let mut allocator = OffsetAllocator::with_config(runtime, &config)?;
        let layout = plan.replay(&mut allocator)?;
        allocator.validate()?;

        let stats = allocator.stats();
        println!(
            "{:<18} {:>12.1} {:>12.1} {:>12.1} {:>7.0}%",
            label,
            layout.peak_bytes as f64 / 1024.0,
            stats.max_used_bytes as f64 / 1024.0,
            stats.fragmentation_bytes() as f64 / 1024.0,
            stats.reuse_ratio() * 100.0,
        );

        if best.as_ref().map_or(true, |(peak, _)| layout.peak_bytes < *peak) {
            best = Some((layout.peak_bytes, config));
        }
    }
    println!();

    let (_, config) = best.context("no configuration was evaluated")?;
    let runtime = Arc::new(config.create_runtime()?);
    let mut allocator = OffsetAllocator::with_config(runtime.clone(), &config)?;
    plan.replay(&mut allocator)?;

    let base = allocator.get_pointer()?;
    println!("Committed {} bytes at {base:p}", runtime.outstanding_bytes());
    println!("{}", allocator.info());
    println!("{}", allocator.stats().summary());

    Ok(())
}

/// Activation lifetimes for `blocks` transformer blocks at `seq_len` tokens.
///
/// Each block reads the residual stream, produces attention and MLP
/// intermediates, and frees them as soon as the next residual is written.
fn build_plan(name: &str, blocks: usize, hidden: usize, seq_len: usize) -> LifetimePlan {
    let f32_bytes = 4;
    let act = seq_len * hidden * f32_bytes;
    let attn_scores = seq_len * seq_len * 12 * f32_bytes;

    let mut plan = LifetimePlan::new(name).alloc("embed", act);
    let mut residual = "embed".to_string();

    for b in 0..blocks {
        let ln1 = format!("h.{b}.ln_1");
        let qkv = format!("h.{b}.qkv");
        let scores = format!("h.{b}.scores");
        let attn = format!("h.{b}.attn");
        let mid = format!("h.{b}.resid_mid");
        let ln2 = format!("h.{b}.ln_2");
        let fc = format!("h.{b}.mlp_fc");
        let out = format!("h.{b}.resid_out");

        plan = plan
            .alloc(&ln1, act)
            .alloc(&qkv, 3 * act)
            .free(&ln1)
            .alloc(&scores, attn_scores)
            .alloc(&attn, act)
            .free(&scores)
            .free(&qkv)
            .alloc(&mid, act)
            .free(&attn)
            .free(&residual)
            .alloc(&ln2, act)
            .alloc(&fc, 4 * act)
            .free(&ln2)
            .alloc(&out, act)
            .free(&fc)
            .free(&mid);
        residual = out;
    }

    plan.alloc("ln_f", act)
        .free(&residual)
        .alloc("logits", seq_len * 50257 * f32_bytes)
        .free("ln_f")
}
