// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod common;

use anyhow::{Context, Result};
use common::{Harness, TRIANGLE_PROGRAM, TRIANGLE_VB};
use prism_core::renderer::api::command::ResourceCommand;
use prism_core::renderer::api::native::{GpuCommand, NativeObject};
use prism_core::renderer::RendererContext;
use prism_infra::graphics::headless::GpuTimeline;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_cpu_never_runs_more_than_the_in_flight_limit_ahead() -> Result<()> {
    // --- 1. ARRANGE ---
    let mut harness = Harness::new()?;
    harness.device.set_timeline(GpuTimeline::Manual);
    let in_flight = harness.renderer.caps().frames_in_flight as usize;
    harness.create_programs();

    for _ in 0..in_flight {
        harness.draw_triangle(0, TRIANGLE_PROGRAM);
        harness.submit()?;
    }
    assert_eq!(harness.device.pending_submissions(), in_flight);

    // --- 2. ACT ---
    // The next frame reuses the oldest slot and must wait for its fence.
    // The GPU side notes how many submissions existed when it completed the
    // oldest one; a CPU that did not wait would already have added its own.
    let gpu = harness.device.clone();
    let completer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let seen = gpu.submissions().len();
        let completing_at = Instant::now();
        (seen, gpu.complete_next(), completing_at)
    });
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.submit()?;
    let returned = Instant::now();

    // --- 3. ASSERT ---
    let (seen, completed, completing_at) = completer
        .join()
        .map_err(|_| anyhow::anyhow!("completer panicked"))?;
    assert!(completed);
    assert_eq!(seen, in_flight, "the CPU submitted before the oldest slot was free");
    assert!(returned >= completing_at, "submit returned before the GPU freed a slot");
    assert_eq!(harness.device.pending_submissions(), in_flight);
    assert_eq!(harness.device.submissions().len(), in_flight + 1);

    harness.device.complete_all();
    Ok(())
}

#[test]
fn test_destroyed_buffers_outlive_their_last_use_on_the_gpu() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.device.set_timeline(GpuTimeline::Manual);
    let in_flight = harness.renderer.caps().frames_in_flight as usize;
    harness.create_programs();
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.submit()?;

    let buffer = harness
        .renderer
        .resources()
        .buffer(TRIANGLE_VB.into())
        .context("vertex buffer missing")?
        .buffer;

    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.frame.push_command(ResourceCommand::DestroyVertexBuffer(TRIANGLE_VB));
    harness.submit()?;

    let destroyed = |harness: &Harness| {
        harness
            .device
            .destructions()
            .into_iter()
            .find(|d| d.object == NativeObject::Buffer(buffer))
    };
    assert!(destroyed(&harness).is_none(), "the GPU still reads the buffer");

    for _ in 0..=in_flight {
        harness.device.complete_all();
        harness.submit()?;
    }
    harness.device.complete_all();

    let destruction = destroyed(&harness).context("buffer never destroyed")?;
    let last_use = harness
        .device
        .submissions()
        .into_iter()
        .filter(|s| {
            s.commands.iter().any(|c| match c {
                GpuCommand::BindVertexBuffers { buffers, .. } => buffers.iter().any(|(b, _)| *b == buffer),
                _ => false,
            })
        })
        .filter_map(|s| s.complete_tick)
        .max()
        .context("buffer never used")?;
    assert!(destruction.tick >= last_use);
    Ok(())
}
