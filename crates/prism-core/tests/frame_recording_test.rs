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

use anyhow::{ensure, Context, Result};
use prism_core::renderer::api::command::{Frame, RenderItem, SortKey, ViewMode};
use prism_core::renderer::api::core::Limits;
use prism_core::renderer::api::pipeline::{BlendFactor, StateFlags};
use prism_core::renderer::api::resource::ProgramHandle;

fn frame(max_draw_calls: u32) -> Frame {
    Frame::new(&Limits {
        max_draw_calls,
        ..Default::default()
    })
}

#[test]
fn test_sorted_frame_groups_views_and_keeps_submission_order() -> Result<()> {
    // --- 1. ARRANGE ---
    let mut frame = frame(1024);
    frame.set_view_mode(0, ViewMode::Sequential);
    frame.set_view_mode(1, ViewMode::Sequential);

    // Interleave submissions across two views; programs in reverse order so
    // any program-based grouping would be visible.
    for i in 0..20u16 {
        let view = i % 2;
        ensure!(frame.submit(view, ProgramHandle(100 - i), 0.0), "submit {i} rejected");
    }

    // --- 2. ACT ---
    frame.sort();

    // --- 3. ASSERT ---
    let keys: Vec<SortKey> = frame.sort_keys().iter().map(|k| SortKey::decode(*k)).collect();
    assert!(keys.windows(2).all(|w| w[0].view <= w[1].view));

    let submitted: Vec<u32> = frame.sort_values().to_vec();
    let expected: Vec<u32> = (0..20).step_by(2).chain((1..20).step_by(2)).collect();
    assert_eq!(submitted, expected, "sequential views keep submission order");
    Ok(())
}

#[test]
fn test_default_mode_draws_opaque_before_blended() -> Result<()> {
    let mut frame = frame(16);

    frame.set_state(StateFlags::DEFAULT | StateFlags::BLEND_ALPHA, 0);
    frame.submit(0, ProgramHandle(1), 1.0);
    frame.set_state(StateFlags::DEFAULT, 0);
    frame.submit(0, ProgramHandle(7), 50.0);
    frame.sort();

    let first = *frame.sort_values().first().context("frame is empty")?;
    let RenderItem::Draw(draw) = &frame.render_items()[first as usize] else {
        anyhow::bail!("expected a draw");
    };
    assert_eq!(draw.program, ProgramHandle(7));
    assert!(draw.state.blend().is_none());
    assert!(StateFlags::blend_func(BlendFactor::One, BlendFactor::One).blend().is_some());
    Ok(())
}

#[test]
fn test_soft_cap_counts_every_dropped_view() {
    let mut frame = frame(3);
    frame.submit(0, ProgramHandle(0), 0.0);

    // Four target views, two slots left.
    let recorded = frame.submit_mask(0b1111, ProgramHandle(0), 0.0);

    assert_eq!(recorded, 2);
    assert_eq!(frame.num_items(), 3);
    assert_eq!(frame.num_dropped(), 2);

    frame.finish();
    frame.reset();
    assert_eq!(frame.num_dropped(), 0, "reset clears the drop counter");
}
