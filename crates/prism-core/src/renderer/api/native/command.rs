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

//! Commands recorded into a native command buffer.

use super::desc::{
    BufferCopy, BufferImageCopy, ClearValue, ImageBarrier, ImageCopy, ImageLayout, PipelineStage,
};
use super::handles::{
    BufferId, DescriptorSetId, FramebufferId, ImageId, PipelineId, PipelineLayoutId,
    RenderPassId,
};
use crate::renderer::api::command::Rect;

/// Graphics or compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineBindPoint {
    /// Graphics.
    Graphics,
    /// Compute.
    Compute,
}

/// One command recorded into a command buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// Starts a render pass.
    BeginRenderPass {
        /// Render pass.
        render_pass: RenderPassId,
        /// Framebuffer.
        framebuffer: FramebufferId,
        /// Render area.
        area: Rect,
        /// One clear value per attachment.
        clear_values: Vec<ClearValue>,
    },
    /// Ends the current render pass.
    EndRenderPass,
    /// Binds a pipeline.
    BindPipeline {
        /// Bind point.
        bind_point: PipelineBindPoint,
        /// Pipeline.
        pipeline: PipelineId,
    },
    /// Binds a descriptor set at set index 0.
    BindDescriptorSet {
        /// Bind point.
        bind_point: PipelineBindPoint,
        /// Pipeline layout.
        layout: PipelineLayoutId,
        /// Set.
        set: DescriptorSetId,
        /// Offsets of the dynamic uniform buffers.
        dynamic_offsets: Vec<u32>,
    },
    /// Binds vertex buffers starting at slot `first`.
    BindVertexBuffers {
        /// First slot.
        first: u32,
        /// Buffers and byte offsets.
        buffers: Vec<(BufferId, u64)>,
    },
    /// Binds the index buffer.
    BindIndexBuffer {
        /// Buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// 32-bit indices.
        index32: bool,
    },
    /// Sets the viewport.
    SetViewport {
        /// Area.
        rect: Rect,
        /// Near depth.
        min_depth: f32,
        /// Far depth.
        max_depth: f32,
    },
    /// Sets the scissor.
    SetScissor(Rect),
    /// Sets the front and back stencil reference values.
    SetStencilReference {
        /// Front face.
        front: u32,
        /// Back face.
        back: u32,
    },
    /// Sets the blend constant.
    SetBlendConstants([f32; 4]),
    /// Non-indexed draw.
    Draw {
        /// Vertices.
        vertex_count: u32,
        /// Instances.
        instance_count: u32,
        /// First vertex.
        first_vertex: u32,
        /// First instance.
        first_instance: u32,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Indices.
        index_count: u32,
        /// Instances.
        instance_count: u32,
        /// First index.
        first_index: u32,
        /// Added to each index.
        vertex_offset: i32,
        /// First instance.
        first_instance: u32,
    },
    /// Draw with arguments read from a buffer.
    DrawIndirect {
        /// Argument buffer.
        buffer: BufferId,
        /// Byte offset of the first record.
        offset: u64,
        /// Number of records.
        draw_count: u32,
        /// Bytes between records.
        stride: u32,
        /// Indexed draws.
        indexed: bool,
    },
    /// Draw with arguments and draw count read from buffers.
    DrawIndirectCount {
        /// Argument buffer.
        buffer: BufferId,
        /// Byte offset of the first record.
        offset: u64,
        /// Buffer holding the draw count.
        count_buffer: BufferId,
        /// Byte offset of the draw count.
        count_offset: u64,
        /// Upper bound of the draw count.
        max_draw_count: u32,
        /// Bytes between records.
        stride: u32,
        /// Indexed draws.
        indexed: bool,
    },
    /// Compute dispatch.
    Dispatch {
        /// Workgroups on X.
        x: u32,
        /// Workgroups on Y.
        y: u32,
        /// Workgroups on Z.
        z: u32,
    },
    /// Compute dispatch with arguments read from a buffer.
    DispatchIndirect {
        /// Argument buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// Execution and memory dependency, with optional layout transitions.
    PipelineBarrier {
        /// Stages that must finish.
        src_stage: PipelineStage,
        /// Stages that wait.
        dst_stage: PipelineStage,
        /// Layout transitions.
        image_barriers: Vec<ImageBarrier>,
    },
    /// Buffer to buffer copy.
    CopyBuffer {
        /// Source.
        src: BufferId,
        /// Destination.
        dst: BufferId,
        /// Regions.
        regions: Vec<BufferCopy>,
    },
    /// Buffer to image copy.
    CopyBufferToImage {
        /// Source.
        src: BufferId,
        /// Destination.
        dst: ImageId,
        /// Destination layout.
        dst_layout: ImageLayout,
        /// Regions.
        regions: Vec<BufferImageCopy>,
    },
    /// Image to image copy.
    CopyImage {
        /// Source.
        src: ImageId,
        /// Source layout.
        src_layout: ImageLayout,
        /// Destination.
        dst: ImageId,
        /// Destination layout.
        dst_layout: ImageLayout,
        /// Region.
        region: ImageCopy,
    },
    /// Filtered downscale of one mip into the next.
    BlitImage {
        /// Image.
        image: ImageId,
        /// Source mip.
        src_mip: u32,
        /// Destination mip.
        dst_mip: u32,
        /// Layer count.
        layer_count: u32,
    },
    /// Multisample resolve.
    ResolveImage {
        /// Multisampled source.
        src: ImageId,
        /// Single-sample destination.
        dst: ImageId,
        /// Region.
        region: ImageCopy,
    },
}

impl GpuCommand {
    /// Returns `true` for draw and dispatch commands.
    pub fn is_work(&self) -> bool {
        matches!(
            self,
            GpuCommand::Draw { .. }
                | GpuCommand::DrawIndexed { .. }
                | GpuCommand::DrawIndirect { .. }
                | GpuCommand::DrawIndirectCount { .. }
                | GpuCommand::Dispatch { .. }
                | GpuCommand::DispatchIndirect { .. }
        )
    }
}
