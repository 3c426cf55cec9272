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

//! Performance statistics for the rendering system.

/// Counters describing one translated frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// A sequential counter for rendered frames.
    pub frame_number: u64,
    /// CPU time spent translating the frame, in milliseconds.
    pub cpu_submit_time_ms: f32,
    /// Draw calls issued to the native device.
    pub draw_calls: u32,
    /// Compute dispatches issued to the native device.
    pub dispatches: u32,
    /// Blits executed.
    pub blits: u32,
    /// Primitives submitted, per topology (triangle list, strip, lines, line strip, points).
    pub primitives: [u32; 5],
    /// Submissions dropped by the frame because it was full.
    pub dropped_draw_calls: u32,
    /// Blits dropped by the frame because it was full.
    pub dropped_blits: u32,
    /// Semaphores dropped because a submission hit its cap.
    pub dropped_semaphores: u32,
    /// Render items skipped because their view had no renderable target.
    pub skipped_items: u32,
    /// Views skipped because their target was not renderable.
    pub skipped_views: u32,
    /// Contract violations detected while translating.
    pub contract_violations: u32,
    /// Pipelines created on a cache miss.
    pub pipelines_created: u32,
    /// Pipeline lookups served by the cache.
    pub pipeline_cache_hits: u32,
    /// Pipeline binds recorded.
    pub pipeline_binds: u32,
    /// Descriptor sets allocated.
    pub descriptor_sets_allocated: u32,
    /// Descriptor set binds recorded.
    pub descriptor_binds: u32,
    /// Vertex buffer binds recorded.
    pub vertex_buffer_binds: u32,
    /// Index buffer binds recorded.
    pub index_buffer_binds: u32,
    /// Scissor updates recorded.
    pub scissor_sets: u32,
    /// Stencil reference updates recorded.
    pub stencil_ref_sets: u32,
    /// Blend constant updates recorded.
    pub blend_constant_sets: u32,
    /// Render passes begun.
    pub render_passes: u32,
    /// Uniform or staging writes that did not fit the scratch buffer.
    pub scratch_fallbacks: u32,
    /// Bytes written to the uniform scratch buffer.
    pub uniform_bytes: u32,
}

impl FrameStats {
    /// Total number of state-change commands recorded.
    pub fn state_changes(&self) -> u32 {
        self.pipeline_binds
            + self.descriptor_binds
            + self.vertex_buffer_binds
            + self.index_buffer_binds
            + self.scissor_sets
            + self.stencil_ref_sets
            + self.blend_constant_sets
    }
}
