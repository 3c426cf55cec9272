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
use common::{Harness, TEXTURED_PROGRAM, TRIANGLE_PROGRAM};
use prism_core::renderer::api::command::{Attachment, BlitItem, ClearFlags, ResourceCommand};
use prism_core::renderer::api::core::Resolution;
use prism_core::renderer::api::native::GpuCommand;
use prism_core::renderer::api::pipeline::SamplerFlags;
use prism_core::renderer::api::resource::{
    FrameBufferHandle, TextureDesc, TextureFlags, TextureFormat, TextureHandle,
};

fn count(commands: &[GpuCommand], predicate: impl Fn(&GpuCommand) -> bool) -> usize {
    commands.iter().filter(|c| predicate(c)).count()
}

fn create_texture(harness: &mut Harness, handle: TextureHandle, flags: TextureFlags) {
    harness.frame.push_command(ResourceCommand::CreateTexture {
        handle,
        desc: TextureDesc::new_2d(64, 64, false, 1, TextureFormat::Rgba8, flags),
        mem: None,
    });
}

#[test]
fn test_single_triangle_reaches_the_device() -> Result<()> {
    // --- 1. ARRANGE ---
    let mut harness = Harness::new()?;
    harness.create_programs();
    assert!(harness.draw_triangle(0, TRIANGLE_PROGRAM));

    // --- 2. ACT ---
    let stats = harness.submit()?;

    // --- 3. ASSERT ---
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.primitives[0], 1);
    assert_eq!(stats.dropped_draw_calls, 0);
    assert_eq!(stats.contract_violations, 0);
    assert_eq!(stats.render_passes, 1);

    let commands = harness.last_commands();
    let draw = commands
        .iter()
        .find(|c| matches!(c, GpuCommand::Draw { .. }))
        .context("no draw recorded")?;
    assert!(matches!(
        draw,
        GpuCommand::Draw {
            vertex_count: 3,
            instance_count: 1,
            ..
        }
    ));
    assert_eq!(count(&commands, |c| matches!(c, GpuCommand::BeginRenderPass { .. })), 1);
    assert_eq!(count(&commands, |c| matches!(c, GpuCommand::EndRenderPass)), 1);
    assert_eq!(harness.device.presents(), 1);
    Ok(())
}

#[test]
fn test_identical_draws_bind_state_once() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.create_programs();
    for _ in 0..10 {
        harness.draw_triangle(0, TRIANGLE_PROGRAM);
    }

    let stats = harness.submit()?;

    assert_eq!(stats.draw_calls, 10);
    assert_eq!(stats.pipeline_binds, 1);
    assert_eq!(stats.vertex_buffer_binds, 1);
    assert_eq!(stats.descriptor_binds, 1);
    assert_eq!(stats.scissor_sets, 1);
    assert_eq!(stats.pipelines_created, 1);

    let commands = harness.last_commands();
    assert_eq!(count(&commands, |c| matches!(c, GpuCommand::BindPipeline { .. })), 1);
    assert_eq!(count(&commands, |c| matches!(c, GpuCommand::BindVertexBuffers { .. })), 1);
    Ok(())
}

#[test]
fn test_second_frame_hits_the_pipeline_cache() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.create_programs();
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.submit()?;

    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    let stats = harness.submit()?;

    assert_eq!(stats.pipelines_created, 0);
    assert_eq!(stats.pipeline_cache_hits, 1);
    assert_eq!(harness.renderer.num_pipelines(), 1);
    Ok(())
}

#[test]
fn test_draw_without_streams_is_a_contract_violation() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.create_programs();
    // The vertex shader consumes a position attribute but no stream is bound.
    harness.frame.set_vertex_count(3);
    harness.frame.submit(0, TRIANGLE_PROGRAM, 0.0);
    harness.draw_triangle(0, TRIANGLE_PROGRAM);

    let stats = harness.submit()?;

    assert_eq!(stats.contract_violations, 1);
    assert_eq!(stats.draw_calls, 1, "the valid draw still renders");
    Ok(())
}

#[test]
fn test_zero_sized_resolution_skips_back_buffer_views() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.create_programs();
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.submit()?;

    // Minimize.
    let zero = Resolution {
        width: 0,
        height: 0,
        ..Resolution::default()
    };
    harness.frame.set_resolution(zero);
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    let stats = harness.submit()?;
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.skipped_views, 1);
    assert_eq!(stats.skipped_items, 1);
    assert_eq!(harness.device.presents(), 1);

    // Restore.
    harness.frame.set_resolution(Resolution::default());
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    let stats = harness.submit()?;
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(harness.device.presents(), 2);
    Ok(())
}

#[test]
fn test_textured_draws_share_one_descriptor_set() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.create_programs();
    create_texture(&mut harness, TextureHandle(0), TextureFlags::EMPTY);
    for _ in 0..4 {
        harness.frame.set_texture(0, TextureHandle(0), SamplerFlags::EMPTY);
        harness.draw_triangle(0, TEXTURED_PROGRAM);
    }

    let stats = harness.submit()?;

    assert_eq!(stats.draw_calls, 4);
    assert_eq!(stats.descriptor_sets_allocated, 1);
    assert_eq!(stats.descriptor_binds, 1);
    Ok(())
}

#[test]
fn test_draw_with_unknown_texture_touches_no_pipeline_state() -> Result<()> {
    let mut reference = Harness::new()?;
    reference.create_programs();
    reference.draw_triangle(0, TRIANGLE_PROGRAM);
    let expected = reference.submit()?;

    let mut harness = Harness::new()?;
    harness.create_programs();
    harness.frame.set_texture(0, TextureHandle(7), SamplerFlags::EMPTY);
    harness.draw_triangle(0, TEXTURED_PROGRAM);
    harness.draw_triangle(0, TRIANGLE_PROGRAM);

    let stats = harness.submit()?;

    assert_eq!(stats.contract_violations, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.pipelines_created, 1, "no pipeline built for the skipped draw");
    assert_eq!(stats.pipeline_binds, 1);
    assert_eq!(stats.uniform_bytes, expected.uniform_bytes);
    let commands = harness.last_commands();
    assert_eq!(count(&commands, |c| matches!(c, GpuCommand::BindPipeline { .. })), 1);
    Ok(())
}

#[test]
fn test_sampling_the_bound_render_target_is_rejected() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.create_programs();
    create_texture(&mut harness, TextureHandle(0), TextureFlags::RT);
    harness.frame.push_command(ResourceCommand::CreateFrameBuffer {
        handle: FrameBufferHandle(0),
        attachments: vec![Attachment::new(TextureHandle(0))],
    });
    harness.frame.set_view_frame_buffer(1, FrameBufferHandle(0));
    harness.frame.set_texture(0, TextureHandle(0), SamplerFlags::EMPTY);
    harness.draw_triangle(1, TEXTURED_PROGRAM);

    let stats = harness.submit()?;

    assert_eq!(stats.contract_violations, 1);
    assert_eq!(stats.draw_calls, 0);
    Ok(())
}

#[test]
fn test_clear_only_view_begins_a_pass() -> Result<()> {
    let mut harness = Harness::new()?;
    harness
        .frame
        .set_view_clear(0, ClearFlags::COLOR | ClearFlags::DEPTH, 0x3030_30ff, 1.0, 0);

    let stats = harness.submit()?;

    assert_eq!(stats.render_passes, 1);
    assert_eq!(stats.draw_calls, 0);
    let commands = harness.last_commands();
    let clears = commands.iter().find_map(|c| match c {
        GpuCommand::BeginRenderPass { clear_values, .. } => Some(clear_values.len()),
        _ => None,
    });
    assert_eq!(clears, Some(2), "color and depth clear values");
    Ok(())
}

#[test]
fn test_blit_copies_between_textures() -> Result<()> {
    let mut harness = Harness::new()?;
    create_texture(&mut harness, TextureHandle(0), TextureFlags::EMPTY);
    create_texture(&mut harness, TextureHandle(1), TextureFlags::BLIT_DST);
    harness.frame.blit(
        0,
        BlitItem {
            src: TextureHandle(0),
            dst: TextureHandle(1),
            extent: [u32::MAX, u32::MAX, 1],
            ..BlitItem::default()
        },
    );
    // Out of range on the destination.
    harness.frame.blit(
        0,
        BlitItem {
            src: TextureHandle(0),
            dst: TextureHandle(1),
            dst_origin: [32, 0, 0],
            extent: [64, 64, 1],
            ..BlitItem::default()
        },
    );

    let stats = harness.submit()?;

    assert_eq!(stats.blits, 1);
    assert_eq!(stats.contract_violations, 1);
    let commands = harness.last_commands();
    let copy = commands
        .iter()
        .find_map(|c| match c {
            GpuCommand::CopyImage { region, .. } => Some(region.extent),
            _ => None,
        })
        .context("no copy recorded")?;
    assert_eq!(copy, [64, 64, 1]);
    Ok(())
}
