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

//! The frame: everything recorded between two `frame()` calls.
//!
//! The API thread fills one frame while the render thread consumes the other.
//! Recording is append-only: each `submit` snapshots the accumulated encoder
//! state into a render item and appends its sort key. `sort` orders the keys
//! once, after which the backend walks them front to back.

use super::cache::{MatrixCache, RectCache};
use super::radix_sort::radix_sort64;
use super::render_item::{
    Access, Binding, BlitItem, IndexBinding, IndirectArgs, InstanceData, RenderCompute,
    RenderDraw, RenderItem, Stream,
};
use super::resource_command::{FreeHandle, ResourceCommand};
use super::sort_key::{depth_to_bits, encode_blit_key, SortKey, SORT_KEY_SEQ_MAX};
use super::uniform_buffer::UniformBuffer;
use super::view::{Clear, ClearFlags, Rect, View, ViewId, ViewMode};
use crate::renderer::api::core::{
    DebugFlags, Limits, Resolution, MAX_TEXTURE_SAMPLERS, MAX_VERTEX_STREAMS, MAX_VIEWS,
};
use crate::renderer::api::pipeline::{pack_stencil, SamplerFlags, StateFlags, StencilFlags};
use crate::renderer::api::resource::{
    BufferRef, FrameBufferHandle, IndirectBufferHandle, ProgramHandle, TextureFormat,
    TextureHandle, UniformHandle, UniformType, VertexLayoutHandle,
};
use glam::Mat4;

const TRANSIENT_ALIGNMENT: usize = 16;

/// A block of transient vertex or index data allocated in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransientBuffer {
    /// Byte offset in the frame's transient storage.
    pub offset: u32,
    /// Size in bytes.
    pub size: u32,
    /// Bytes per vertex or index.
    pub stride: u16,
}

impl TransientBuffer {
    /// Number of vertices or indices in the block.
    pub fn len(&self) -> u32 {
        if self.stride == 0 {
            0
        } else {
            self.size / self.stride as u32
        }
    }

    /// Returns `true` if the block holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything recorded for one frame.
#[derive(Debug)]
pub struct Frame {
    frame_number: u64,
    max_draw_calls: usize,
    max_blits: usize,
    max_transient_vb: usize,
    max_transient_ib: usize,

    sort_keys: Vec<u64>,
    sort_values: Vec<u32>,
    render_items: Vec<RenderItem>,
    blit_keys: Vec<u32>,
    blit_items: Vec<BlitItem>,
    temp_keys: Vec<u64>,
    temp_values: Vec<u32>,

    views: Vec<View>,
    view_seq: Vec<u32>,
    matrices: MatrixCache,
    rects: RectCache,
    uniforms: UniformBuffer,

    pre_commands: Vec<ResourceCommand>,
    post_commands: Vec<ResourceCommand>,
    free_handles: Vec<FreeHandle>,
    transient_vb: Vec<u8>,
    transient_ib: Vec<u8>,

    resolution: Resolution,
    debug: DebugFlags,

    num_dropped_draws: u32,
    num_dropped_blits: u32,

    // Encoder state.
    draw: RenderDraw,
    uniform_begin: u32,
    discard: bool,
}

impl Frame {
    /// Creates an empty frame sized by `limits`.
    pub fn new(limits: &Limits) -> Self {
        Self {
            frame_number: 0,
            max_draw_calls: limits.max_draw_calls as usize,
            max_blits: (limits.max_blits as usize).min(u16::MAX as usize + 1),
            max_transient_vb: limits.transient_vb_size as usize,
            max_transient_ib: limits.transient_ib_size as usize,
            sort_keys: Vec::new(),
            sort_values: Vec::new(),
            render_items: Vec::new(),
            blit_keys: Vec::new(),
            blit_items: Vec::new(),
            temp_keys: Vec::new(),
            temp_values: Vec::new(),
            views: vec![View::default(); MAX_VIEWS],
            view_seq: vec![0; MAX_VIEWS],
            matrices: MatrixCache::new(limits.max_matrices as usize),
            rects: RectCache::new(limits.max_rects as usize),
            uniforms: UniformBuffer::new(limits.uniform_log_size as usize),
            pre_commands: Vec::new(),
            post_commands: Vec::new(),
            free_handles: Vec::new(),
            transient_vb: Vec::new(),
            transient_ib: Vec::new(),
            resolution: Resolution::default(),
            debug: DebugFlags::EMPTY,
            num_dropped_draws: 0,
            num_dropped_blits: 0,
            draw: RenderDraw::default(),
            uniform_begin: 0,
            discard: false,
        }
    }

    /// Clears everything recorded, keeping views, resolution and debug flags.
    pub fn reset(&mut self) {
        self.sort_keys.clear();
        self.sort_values.clear();
        self.render_items.clear();
        self.blit_keys.clear();
        self.blit_items.clear();
        self.view_seq.fill(0);
        self.matrices.reset();
        self.rects.reset();
        self.uniforms.reset();
        self.pre_commands.clear();
        self.post_commands.clear();
        self.free_handles.clear();
        self.transient_vb.clear();
        self.transient_ib.clear();
        self.num_dropped_draws = 0;
        self.num_dropped_blits = 0;
        self.draw = RenderDraw::default();
        self.uniform_begin = 0;
        self.discard = false;
    }

    /// Ends recording. Reports soft-cap drops.
    pub fn finish(&mut self) {
        if self.num_dropped_draws > 0 {
            log::warn!(
                "Frame {}: dropped {} render items (limit {}).",
                self.frame_number,
                self.num_dropped_draws,
                self.max_draw_calls
            );
        }
        if self.num_dropped_blits > 0 {
            log::warn!(
                "Frame {}: dropped {} blits (limit {}).",
                self.frame_number,
                self.num_dropped_blits,
                self.max_blits
            );
        }
        log::trace!(
            "Frame {} finished: {} items, {} blits, {} uniform bytes.",
            self.frame_number,
            self.render_items.len(),
            self.blit_items.len(),
            self.uniforms.size()
        );
    }

    /// Sorts render items and blits.
    pub fn sort(&mut self) {
        radix_sort64(
            &mut self.sort_keys,
            &mut self.sort_values,
            &mut self.temp_keys,
            &mut self.temp_values,
        );
        // Blit keys are unique (view, index) pairs.
        self.blit_keys.sort_unstable();
    }

    // --- Views -------------------------------------------------------------

    fn view_mut(&mut self, view: ViewId) -> Option<&mut View> {
        let slot = self.views.get_mut(view as usize);
        if slot.is_none() {
            log::warn!("View id {view} is out of range (max {}).", MAX_VIEWS);
        }
        slot
    }

    /// Sets the viewport of a view.
    pub fn set_view_rect(&mut self, view: ViewId, rect: Rect) {
        if let Some(v) = self.view_mut(view) {
            v.rect = rect;
        }
    }

    /// Sets the scissor of a view. A zero rectangle disables it.
    pub fn set_view_scissor(&mut self, view: ViewId, scissor: Rect) {
        if let Some(v) = self.view_mut(view) {
            v.scissor = scissor;
        }
    }

    /// Sets the clear values of a view.
    pub fn set_view_clear(&mut self, view: ViewId, flags: ClearFlags, rgba: u32, depth: f32, stencil: u8) {
        if let Some(v) = self.view_mut(view) {
            v.clear = Clear {
                flags,
                rgba,
                depth,
                stencil,
            };
        }
    }

    /// Sets the view and projection matrices of a view.
    pub fn set_view_transform(&mut self, view: ViewId, view_mtx: Mat4, proj: Mat4) {
        if let Some(v) = self.view_mut(view) {
            v.view = view_mtx;
            v.proj = proj;
        }
    }

    /// Sets the render target of a view.
    pub fn set_view_frame_buffer(&mut self, view: ViewId, frame_buffer: FrameBufferHandle) {
        if let Some(v) = self.view_mut(view) {
            v.frame_buffer = frame_buffer;
        }
    }

    /// Sets the draw ordering of a view.
    pub fn set_view_mode(&mut self, view: ViewId, mode: ViewMode) {
        if let Some(v) = self.view_mut(view) {
            v.mode = mode;
        }
    }

    /// Copies the view configuration of another frame.
    pub fn copy_views(&mut self, other: &Frame) {
        self.views.clone_from(&other.views);
    }

    // --- Encoder state -----------------------------------------------------

    /// Sets the render state and the blend constant of the next draw.
    pub fn set_state(&mut self, state: StateFlags, rgba: u32) {
        self.draw.state = state;
        self.draw.rgba = rgba;
    }

    /// Sets the stencil state of the next draw. An empty back face mirrors the front.
    pub fn set_stencil(&mut self, front: StencilFlags, back: StencilFlags) {
        self.draw.stencil = pack_stencil(front, back);
    }

    /// Sets the scissor of the next draw. Returns the cached rectangle index,
    /// which can be reused with [`set_scissor_cached`](Self::set_scissor_cached).
    pub fn set_scissor(&mut self, rect: Rect) -> Option<u16> {
        let index = self.rects.add(rect);
        self.draw.scissor = index.unwrap_or(u16::MAX);
        index
    }

    /// Reuses a scissor rectangle cached earlier in the frame.
    pub fn set_scissor_cached(&mut self, index: u16) {
        self.draw.scissor = index;
    }

    /// Sets the model matrices of the next draw. Returns the first cache index.
    pub fn set_transform(&mut self, matrices: &[Mat4]) -> u32 {
        let (first, num) = self.matrices.add(matrices);
        self.draw.matrix = first;
        self.draw.num_matrices = num;
        first
    }

    /// Reuses matrices cached earlier in the frame.
    pub fn set_transform_cached(&mut self, first: u32, num: u16) {
        self.draw.matrix = first;
        self.draw.num_matrices = num.max(1);
    }

    /// Records a uniform update. `data` holds `num` packed elements of `ty`.
    pub fn set_uniform(&mut self, handle: UniformHandle, ty: UniformType, num: u16, data: &[u8]) {
        if !self.uniforms.write(handle, ty, num, data) {
            log::warn!("Uniform log full; update of {handle:?} dropped.");
        }
    }

    /// Binds a vertex stream.
    pub fn set_vertex_buffer(
        &mut self,
        stream: u8,
        buffer: impl Into<BufferRef>,
        start_vertex: u32,
        num_vertices: u32,
        layout: VertexLayoutHandle,
    ) {
        self.set_stream(
            stream,
            Stream {
                buffer: buffer.into(),
                offset: 0,
                layout,
                start_vertex,
                num_vertices,
            },
        );
    }

    /// Binds transient vertex data as a stream.
    pub fn set_transient_vertex_buffer(
        &mut self,
        stream: u8,
        tvb: &TransientBuffer,
        start_vertex: u32,
        num_vertices: u32,
        layout: VertexLayoutHandle,
    ) {
        let available = tvb.len().saturating_sub(start_vertex);
        self.set_stream(
            stream,
            Stream {
                buffer: BufferRef::TransientVertex,
                offset: tvb.offset,
                layout,
                start_vertex,
                num_vertices: num_vertices.min(available),
            },
        );
    }

    fn set_stream(&mut self, stream: u8, value: Stream) {
        match self.draw.streams.get_mut(stream as usize) {
            Some(slot) => *slot = Some(value),
            None => log::warn!("Vertex stream {stream} exceeds {MAX_VERTEX_STREAMS} streams."),
        }
    }

    /// Binds an index buffer.
    pub fn set_index_buffer(&mut self, buffer: impl Into<BufferRef>, start_index: u32, num_indices: u32) {
        self.draw.index = Some(IndexBinding {
            buffer: buffer.into(),
            offset: 0,
            start_index,
            num_indices,
            index32: false,
        });
    }

    /// Binds transient index data. Binding zero indices discards the next submit.
    pub fn set_transient_index_buffer(&mut self, tib: &TransientBuffer, start_index: u32, num_indices: u32) {
        let num_indices = num_indices.min(tib.len().saturating_sub(start_index));
        self.discard |= num_indices == 0;
        self.draw.index = Some(IndexBinding {
            buffer: BufferRef::TransientIndex,
            offset: tib.offset,
            start_index,
            num_indices,
            index32: tib.stride == 4,
        });
    }

    /// Binds per-instance data.
    pub fn set_instance_data_buffer(&mut self, buffer: impl Into<BufferRef>, offset: u32, num: u32, stride: u16) {
        self.draw.instance_data = Some(InstanceData {
            buffer: buffer.into(),
            offset,
            stride,
            num,
        });
    }

    /// Sets the instance count of a draw without instance data.
    pub fn set_instance_count(&mut self, num: u32) {
        self.draw.num_instances = num;
    }

    /// Sets the vertex count of a draw without vertex streams.
    pub fn set_vertex_count(&mut self, num: u32) {
        self.draw.vertex_count = num;
    }

    fn set_binding(&mut self, stage: u8, binding: Binding) {
        match self.draw.bind.bindings.get_mut(stage as usize) {
            Some(slot) => *slot = binding,
            None => log::warn!("Binding stage {stage} exceeds {MAX_TEXTURE_SAMPLERS} stages."),
        }
    }

    /// Binds a sampled texture.
    pub fn set_texture(&mut self, stage: u8, handle: TextureHandle, sampler: SamplerFlags) {
        self.set_binding(stage, Binding::Texture { handle, sampler });
    }

    /// Binds a storage image.
    pub fn set_image(&mut self, stage: u8, handle: TextureHandle, mip: u8, access: Access, format: Option<TextureFormat>) {
        self.set_binding(
            stage,
            Binding::Image {
                handle,
                mip,
                access,
                format,
            },
        );
    }

    /// Binds a storage buffer.
    pub fn set_buffer(&mut self, stage: u8, buffer: impl Into<BufferRef>, access: Access) {
        self.set_binding(
            stage,
            Binding::Buffer {
                buffer: buffer.into(),
                access,
            },
        );
    }

    /// Drops the accumulated encoder state without emitting anything.
    pub fn discard(&mut self) {
        self.draw = RenderDraw::default();
        self.discard = false;
    }

    // --- Submission --------------------------------------------------------

    fn next_seq(&mut self, view: ViewId) -> u32 {
        let seq = &mut self.view_seq[view as usize];
        let current = *seq;
        *seq = (*seq + 1).min(SORT_KEY_SEQ_MAX);
        current
    }

    fn take_uniform_range(&mut self) -> (u32, u32) {
        let range = (self.uniform_begin, self.uniforms.pos());
        self.uniform_begin = range.1;
        range
    }

    fn push_item(&mut self, key: u64, item: RenderItem) -> bool {
        if self.render_items.len() >= self.max_draw_calls {
            self.num_dropped_draws += 1;
            return false;
        }
        self.sort_values.push(self.render_items.len() as u32);
        self.sort_keys.push(key);
        self.render_items.push(item);
        true
    }

    fn draw_key(&mut self, view: ViewId, program: ProgramHandle, depth: f32) -> u64 {
        SortKey {
            view,
            is_draw: true,
            mode: self.views[view as usize].mode,
            trans: self.draw.state.transparency_class(),
            program,
            depth: depth_to_bits(depth),
            seq: self.next_seq(view),
        }
        .encode()
    }

    fn accepts(&mut self, view: ViewId, program: ProgramHandle) -> bool {
        if self.discard || !program.is_valid() {
            self.discard();
            return false;
        }
        if view as usize >= MAX_VIEWS {
            log::warn!("Submit to out-of-range view {view} ignored.");
            self.discard();
            return false;
        }
        if self.render_items.len() >= self.max_draw_calls {
            self.num_dropped_draws += 1;
            self.discard();
            return false;
        }
        true
    }

    /// Submits a draw with the accumulated state. Returns `false` if the draw
    /// was discarded or dropped.
    pub fn submit(&mut self, view: ViewId, program: ProgramHandle, depth: f32) -> bool {
        self.submit_draw(view, program, depth, None)
    }

    /// Submits an indirect draw.
    pub fn submit_indirect(
        &mut self,
        view: ViewId,
        program: ProgramHandle,
        indirect: IndirectBufferHandle,
        start: u32,
        num: u32,
        depth: f32,
    ) -> bool {
        let args = IndirectArgs {
            buffer: indirect,
            start,
            num,
            count: None,
        };
        self.submit_draw(view, program, depth, Some(args))
    }

    /// Submits an indirect draw whose draw count is read from `count_buffer`.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_indirect_count(
        &mut self,
        view: ViewId,
        program: ProgramHandle,
        indirect: IndirectBufferHandle,
        start: u32,
        count_buffer: impl Into<BufferRef>,
        count_index: u32,
        max_count: u32,
        depth: f32,
    ) -> bool {
        let args = IndirectArgs {
            buffer: indirect,
            start,
            num: max_count,
            count: Some((count_buffer.into(), count_index)),
        };
        self.submit_draw(view, program, depth, Some(args))
    }

    fn submit_draw(&mut self, view: ViewId, program: ProgramHandle, depth: f32, indirect: Option<IndirectArgs>) -> bool {
        if !self.accepts(view, program) {
            return false;
        }
        let key = self.draw_key(view, program, depth);
        let (uniform_begin, uniform_end) = self.take_uniform_range();
        let mut draw = std::mem::take(&mut self.draw);
        draw.program = program;
        draw.indirect = indirect;
        draw.uniform_begin = uniform_begin;
        draw.uniform_end = uniform_end;
        self.push_item(key, RenderItem::Draw(draw))
    }

    /// Submits the accumulated draw to every view set in `view_mask`. Each view
    /// gets its own sequence number. Returns the number of items recorded.
    pub fn submit_mask(&mut self, view_mask: u64, program: ProgramHandle, depth: f32) -> u32 {
        if self.discard || !program.is_valid() {
            self.discard();
            return 0;
        }
        let (uniform_begin, uniform_end) = self.take_uniform_range();
        let mut draw = std::mem::take(&mut self.draw);
        draw.program = program;
        draw.uniform_begin = uniform_begin;
        draw.uniform_end = uniform_end;

        let mut recorded = 0;
        let mut mask = view_mask;
        while mask != 0 {
            let view = mask.trailing_zeros() as ViewId;
            mask &= mask - 1;
            let key = SortKey {
                view,
                is_draw: true,
                mode: self.views[view as usize].mode,
                trans: draw.state.transparency_class(),
                program,
                depth: depth_to_bits(depth),
                seq: self.next_seq(view),
            }
            .encode();
            if self.push_item(key, RenderItem::Draw(draw.clone())) {
                recorded += 1;
            }
        }
        recorded
    }

    /// Records a compute dispatch using the bound images, buffers and uniforms.
    pub fn dispatch(&mut self, view: ViewId, program: ProgramHandle, x: u32, y: u32, z: u32) -> bool {
        self.submit_compute(view, program, [x.max(1), y.max(1), z.max(1)], None)
    }

    /// Records an indirect compute dispatch.
    pub fn dispatch_indirect(
        &mut self,
        view: ViewId,
        program: ProgramHandle,
        indirect: IndirectBufferHandle,
        start: u32,
        num: u32,
    ) -> bool {
        let args = IndirectArgs {
            buffer: indirect,
            start,
            num: num.max(1),
            count: None,
        };
        self.submit_compute(view, program, [0; 3], Some(args))
    }

    fn submit_compute(
        &mut self,
        view: ViewId,
        program: ProgramHandle,
        num_groups: [u32; 3],
        indirect: Option<IndirectArgs>,
    ) -> bool {
        if !self.accepts(view, program) {
            return false;
        }
        let key = SortKey {
            view,
            is_draw: false,
            mode: ViewMode::Sequential,
            trans: 0,
            program,
            depth: 0,
            seq: self.next_seq(view),
        }
        .encode();
        let (uniform_begin, uniform_end) = self.take_uniform_range();
        let draw = std::mem::take(&mut self.draw);
        let compute = RenderCompute {
            num_groups,
            indirect,
            matrix: draw.matrix,
            num_matrices: draw.num_matrices,
            uniform_begin,
            uniform_end,
            program,
            bind: draw.bind,
        };
        self.push_item(key, RenderItem::Compute(compute))
    }

    /// Records a texture copy executed when `view` is reached.
    pub fn blit(&mut self, view: ViewId, item: BlitItem) -> bool {
        if view as usize >= MAX_VIEWS {
            log::warn!("Blit on out-of-range view {view} ignored.");
            return false;
        }
        if self.blit_items.len() >= self.max_blits {
            self.num_dropped_blits += 1;
            return false;
        }
        let index = self.blit_items.len() as u16;
        self.blit_keys.push(encode_blit_key(view, index));
        self.blit_items.push(item);
        true
    }

    // --- Transient data ----------------------------------------------------

    fn alloc_transient(storage: &mut Vec<u8>, limit: usize, data: &[u8], stride: u16) -> Option<TransientBuffer> {
        let offset = storage.len().next_multiple_of(TRANSIENT_ALIGNMENT);
        if offset + data.len() > limit {
            return None;
        }
        storage.resize(offset, 0);
        storage.extend_from_slice(data);
        Some(TransientBuffer {
            offset: offset as u32,
            size: data.len() as u32,
            stride,
        })
    }

    /// Copies vertices into the frame's transient vertex storage.
    pub fn alloc_transient_vertex_buffer(&mut self, data: &[u8], stride: u16) -> Option<TransientBuffer> {
        let tvb = Self::alloc_transient(&mut self.transient_vb, self.max_transient_vb, data, stride);
        if tvb.is_none() {
            log::warn!("Transient vertex storage exhausted ({} bytes).", self.max_transient_vb);
        }
        tvb
    }

    /// Copies indices into the frame's transient index storage.
    pub fn alloc_transient_index_buffer(&mut self, data: &[u8], index32: bool) -> Option<TransientBuffer> {
        let stride = if index32 { 4 } else { 2 };
        let tib = Self::alloc_transient(&mut self.transient_ib, self.max_transient_ib, data, stride);
        if tib.is_none() {
            log::warn!("Transient index storage exhausted ({} bytes).", self.max_transient_ib);
        }
        tib
    }

    // --- Resource commands -------------------------------------------------

    /// Queues a resource command. Destroy commands run after rendering and
    /// free their handle once the frame is consumed.
    pub fn push_command(&mut self, command: ResourceCommand) {
        if command.is_destroy() {
            if let Some(handle) = command.freed_handle() {
                self.free_handles.push(handle);
            }
            self.post_commands.push(command);
        } else {
            self.pre_commands.push(command);
        }
    }

    /// Takes the commands to run before rendering.
    pub fn take_pre_commands(&mut self) -> Vec<ResourceCommand> {
        std::mem::take(&mut self.pre_commands)
    }

    /// Takes the commands to run after rendering.
    pub fn take_post_commands(&mut self) -> Vec<ResourceCommand> {
        std::mem::take(&mut self.post_commands)
    }

    /// Takes the handles to return to their allocators.
    pub fn take_free_handles(&mut self) -> Vec<FreeHandle> {
        std::mem::take(&mut self.free_handles)
    }

    // --- Accessors ---------------------------------------------------------

    /// The frame number.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Sets the frame number.
    pub fn set_frame_number(&mut self, frame_number: u64) {
        self.frame_number = frame_number;
    }

    /// Back buffer configuration for this frame.
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Sets the back buffer configuration.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    /// Debug flags for this frame.
    pub fn debug(&self) -> DebugFlags {
        self.debug
    }

    /// Sets the debug flags.
    pub fn set_debug(&mut self, debug: DebugFlags) {
        self.debug = debug;
    }

    /// Sort keys, parallel to [`sort_values`](Self::sort_values).
    pub fn sort_keys(&self) -> &[u64] {
        &self.sort_keys
    }

    /// Indices into the render items.
    pub fn sort_values(&self) -> &[u32] {
        &self.sort_values
    }

    /// Recorded render items in submission order.
    pub fn render_items(&self) -> &[RenderItem] {
        &self.render_items
    }

    /// Blit keys.
    pub fn blit_keys(&self) -> &[u32] {
        &self.blit_keys
    }

    /// Recorded blits in submission order.
    pub fn blit_items(&self) -> &[BlitItem] {
        &self.blit_items
    }

    /// Per-view state.
    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// The matrix cache.
    pub fn matrices(&self) -> &MatrixCache {
        &self.matrices
    }

    /// The rect cache.
    pub fn rects(&self) -> &RectCache {
        &self.rects
    }

    /// The uniform update log.
    pub fn uniforms(&self) -> &UniformBuffer {
        &self.uniforms
    }

    /// Transient vertex bytes.
    pub fn transient_vertices(&self) -> &[u8] {
        &self.transient_vb
    }

    /// Transient index bytes.
    pub fn transient_indices(&self) -> &[u8] {
        &self.transient_ib
    }

    /// Number of render items recorded.
    pub fn num_items(&self) -> usize {
        self.render_items.len()
    }

    /// Render items dropped because the frame was full.
    pub fn num_dropped(&self) -> u32 {
        self.num_dropped_draws
    }

    /// Blits dropped because the frame was full.
    pub fn num_dropped_blits(&self) -> u32 {
        self.num_dropped_blits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_capacity(max_draw_calls: u32) -> Frame {
        Frame::new(&Limits {
            max_draw_calls,
            ..Default::default()
        })
    }

    #[test]
    fn submit_records_item_and_resets_state() {
        let mut frame = frame_with_capacity(16);
        frame.set_state(StateFlags::DEFAULT | StateFlags::PT_LINES, 0);
        frame.set_vertex_count(3);
        assert!(frame.submit(0, ProgramHandle(1), 0.0));

        assert_eq!(frame.num_items(), 1);
        let RenderItem::Draw(draw) = &frame.render_items()[0] else {
            panic!("expected a draw");
        };
        assert_eq!(draw.state.topology(), crate::renderer::api::pipeline::PrimitiveTopology::LineList);
        assert_eq!(draw.num_vertices(), 3);

        // The next draw starts from defaults.
        assert!(frame.submit(0, ProgramHandle(1), 0.0));
        let RenderItem::Draw(draw) = &frame.render_items()[1] else {
            panic!("expected a draw");
        };
        assert_eq!(draw.state, StateFlags::DEFAULT);
    }

    #[test]
    fn invalid_program_discards() {
        let mut frame = frame_with_capacity(16);
        frame.set_vertex_count(3);
        assert!(!frame.submit(0, ProgramHandle::INVALID, 0.0));
        assert_eq!(frame.num_items(), 0);
        assert_eq!(frame.num_dropped(), 0);
    }

    #[test]
    fn over_capacity_submits_are_counted() {
        let mut frame = frame_with_capacity(2);
        for _ in 0..5 {
            frame.submit(0, ProgramHandle(0), 0.0);
        }
        assert_eq!(frame.num_items(), 2);
        assert_eq!(frame.num_dropped(), 3);
    }

    #[test]
    fn zero_index_transient_buffer_discards_next_submit_only() {
        let mut frame = frame_with_capacity(16);
        let tib = frame.alloc_transient_index_buffer(&[0; 12], false);
        let Some(tib) = tib else {
            panic!("transient storage should fit");
        };
        frame.set_transient_index_buffer(&tib, 0, 0);
        assert!(!frame.submit(0, ProgramHandle(0), 0.0));
        assert!(frame.submit(0, ProgramHandle(0), 0.0));
        assert_eq!(frame.num_items(), 1);
    }

    #[test]
    fn submit_mask_gives_each_view_its_own_sequence() {
        let mut frame = frame_with_capacity(16);
        frame.set_view_mode(2, ViewMode::Sequential);
        frame.set_view_mode(5, ViewMode::Sequential);
        frame.submit(5, ProgramHandle(0), 0.0);
        assert_eq!(frame.submit_mask((1 << 2) | (1 << 5), ProgramHandle(0), 0.0), 2);

        let keys: Vec<SortKey> = frame.sort_keys().iter().map(|k| SortKey::decode(*k)).collect();
        assert_eq!((keys[1].view, keys[1].seq), (2, 0));
        assert_eq!((keys[2].view, keys[2].seq), (5, 1));
    }

    #[test]
    fn uniform_ranges_partition_the_log() {
        let mut frame = frame_with_capacity(16);
        frame.set_uniform(UniformHandle(0), UniformType::Vec4, 1, &[0; 16]);
        frame.submit(0, ProgramHandle(0), 0.0);
        frame.submit(0, ProgramHandle(0), 0.0);
        frame.set_uniform(UniformHandle(1), UniformType::Vec4, 1, &[0; 16]);
        frame.set_uniform(UniformHandle(2), UniformType::Vec4, 1, &[0; 16]);
        frame.dispatch(0, ProgramHandle(1), 1, 1, 1);

        let ranges: Vec<(u32, u32)> = frame.render_items().iter().map(RenderItem::uniform_range).collect();
        assert_eq!(ranges, vec![(0, 1), (1, 1), (1, 3)]);
    }

    #[test]
    fn sort_orders_views_and_puts_compute_first() {
        let mut frame = frame_with_capacity(16);
        frame.submit(1, ProgramHandle(0), 0.0);
        frame.submit(0, ProgramHandle(0), 0.0);
        frame.dispatch(1, ProgramHandle(3), 1, 1, 1);
        frame.sort();

        let order: Vec<u32> = frame.sort_values().to_vec();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn blits_are_capped_and_sorted_by_view() {
        let mut frame = Frame::new(&Limits {
            max_blits: 2,
            ..Default::default()
        });
        assert!(frame.blit(3, BlitItem::default()));
        assert!(frame.blit(1, BlitItem::default()));
        assert!(!frame.blit(0, BlitItem::default()));
        assert_eq!(frame.num_dropped_blits(), 1);
        frame.sort();
        assert_eq!(frame.blit_keys(), &[encode_blit_key(1, 1), encode_blit_key(3, 0)]);
    }

    #[test]
    fn destroy_commands_are_deferred() {
        use crate::renderer::api::resource::IndirectBufferHandle;
        let mut frame = frame_with_capacity(16);
        frame.push_command(ResourceCommand::CreateIndirectBuffer {
            handle: IndirectBufferHandle(0),
            num: 4,
        });
        frame.push_command(ResourceCommand::DestroyIndirectBuffer(IndirectBufferHandle(0)));
        assert_eq!(frame.take_pre_commands().len(), 1);
        assert_eq!(frame.take_post_commands().len(), 1);
        assert_eq!(
            frame.take_free_handles(),
            vec![FreeHandle::IndirectBuffer(IndirectBufferHandle(0))]
        );
    }

    #[test]
    fn reset_keeps_views() {
        let mut frame = frame_with_capacity(16);
        frame.set_view_rect(0, Rect::new(0, 0, 64, 64));
        frame.submit(0, ProgramHandle(0), 0.0);
        frame.reset();
        assert_eq!(frame.num_items(), 0);
        assert_eq!(frame.views()[0].rect.width, 64);
    }
}
