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

//! Translation of a sorted frame into native commands.
//!
//! One pass over the sort keys, view by view. Bound state is tracked so a
//! command is only recorded when its value differs from what the command
//! buffer already holds. Render passes begin lazily on the first draw of a
//! view, or right away when the view clears.

use super::command_queue::CommandQueue;
use super::context::ExplicitRenderer;
use super::conversions::clear_values;
use super::descriptor::{bindings_resolve, DescriptorBinding, DescriptorCache, DescriptorContext};
use super::pipeline::{GraphicsPipelineInputs, PipelineCache};
use super::render_pass::{fetch_render_pass, RenderTarget};
use super::resources::{barrier, finish_uploads, Defaults, ProgramEntry, Resources};
use super::scratch::ScratchBuffer;
use super::state_cache::{LruCache, StateCache};
use super::swap_chain::SwapChain;
use super::uniforms::{pack_constants, DrawTransforms, UniformTable};
use prism_core::renderer::api::command::{
    decode_blit_key, BlitItem, Binding, ClearFlags, Frame, Rect, RenderBind, RenderCompute, RenderDraw,
    RenderItem, SortKey, ViewId,
};
use prism_core::renderer::api::core::{CapsFlags, DebugFlags, FrameStats, ResetFlags, MAX_VERTEX_STREAMS, MAX_VIEWS};
use prism_core::renderer::api::native::{
    BufferId, CommandBufferId, DescriptorSetId, FramebufferId, GpuCommand, ImageAspect, ImageCopy,
    ImageLayout, ImageSubresource, ImageViewId, PipelineBindPoint, PipelineId, PipelineStage,
    RenderPassId,
};
use prism_core::renderer::api::pipeline::unpack_stencil;
use prism_core::renderer::api::resource::{
    BufferRef, FrameBufferHandle, ProgramHandle, TextureDesc, TextureHandle, VertexLayout,
    VertexLayoutHandle, INDIRECT_DRAW_STRIDE,
};
use prism_core::renderer::{Callback, ContractViolation, NativeDevice, NativeError, RenderError};
use std::time::Instant;

const TRANSIENT_ALIGNMENT: u64 = 16;

/// Where the frame's transient vertex and index bytes landed.
#[derive(Debug, Clone, Copy, Default)]
struct Transient {
    vertices: Option<(BufferId, u64)>,
    indices: Option<(BufferId, u64)>,
}

/// Frame-wide switches derived from the configuration.
#[derive(Debug, Clone, Copy)]
struct Settings {
    wireframe: bool,
    depth_clamp: bool,
    max_anisotropy: f32,
    uniform_align: u64,
    supported: CapsFlags,
}

/// Inputs of the constant blocks, compared to skip repacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UniformKey {
    program: ProgramHandle,
    view: ViewId,
    matrix: u32,
    num_matrices: u16,
    alpha_ref: u8,
}

/// What the command buffer currently has bound.
#[derive(Debug, Default)]
struct BoundState {
    graphics_pipeline: Option<PipelineId>,
    compute_pipeline: Option<PipelineId>,
    graphics_set: Option<(DescriptorSetId, Vec<u32>)>,
    compute_set: Option<(DescriptorSetId, Vec<u32>)>,
    vertex_buffers: Vec<(BufferId, u64)>,
    index_buffer: Option<(BufferId, u64, bool)>,
    scissor: Option<Rect>,
    stencil_ref: Option<(u32, u32)>,
    blend_constant: Option<u32>,
    uniforms: Option<(UniformKey, BufferId, Vec<u32>)>,
}

/// The render target of the current view.
#[derive(Debug, Clone)]
struct ViewTarget {
    framebuffer: FramebufferId,
    target: RenderTarget,
    render_pass: RenderPassId,
    pass_hash: u64,
}

#[derive(Debug, Default)]
struct PassState {
    view: ViewId,
    frame_buffer: FrameBufferHandle,
    target: Option<ViewTarget>,
    rect: Rect,
    scissor: Rect,
    cleared: bool,
    compute: bool,
    resolve: Option<FrameBufferHandle>,
}

/// Split borrows of the renderer for the duration of one frame.
struct Recorder<'a, D: NativeDevice> {
    device: &'a D,
    cb: CommandBufferId,
    callback: &'a dyn Callback,
    frame: &'a Frame,
    resources: &'a Resources,
    defaults: &'a Defaults,
    swap_chain: &'a SwapChain,
    uniforms: &'a mut UniformTable,
    pipelines: &'a mut PipelineCache,
    descriptors: &'a mut DescriptorCache,
    render_passes: &'a mut StateCache<RenderPassId>,
    image_views: &'a mut LruCache<ImageViewId>,
    queue: &'a mut CommandQueue,
    uniform_scratch: &'a mut ScratchBuffer,
    stats: &'a mut FrameStats,
    in_render_pass: &'a mut bool,
    settings: Settings,
    transient: Transient,
    back_buffer: bool,
    bound: BoundState,
    pass: PassState,
    constants: Vec<u8>,
    block: Vec<u8>,
}

impl<D: NativeDevice> ExplicitRenderer<D> {
    /// Renders one frame: resource commands, transient uploads, the sorted
    /// items, then submission and presentation.
    pub(super) fn render_frame(&mut self, frame: &mut Frame) -> Result<FrameStats, RenderError> {
        let started = Instant::now();
        self.stats = FrameStats {
            frame_number: frame.frame_number(),
            ..FrameStats::default()
        };
        let resolution = frame.resolution().clone();
        self.apply_config(&resolution, frame.debug());

        let cb = self.queue.alloc(&self.device)?;
        let slot = self.queue.current_slot();
        self.uniform_scratch[slot].reset();
        self.staging[slot].reset();
        self.queue.finish(&self.device, false)?;

        let uploads = self.run_commands(cb, frame.take_pre_commands())?;
        let transient = self.upload_transient(frame, slot)?;
        if uploads > 0 {
            finish_uploads(&self.device, cb);
        }
        self.defaults.prepare(&self.device, cb);

        self.swap_chain
            .update(&self.device, &mut self.queue, &mut self.render_passes, &resolution)?;
        let back_buffer = self.swap_chain.acquire(&self.device, &mut self.queue, cb)?;

        frame.sort();
        let settings = Settings {
            wireframe: self.debug.contains(DebugFlags::WIREFRAME)
                && self.caps.supported.contains(CapsFlags::WIREFRAME),
            depth_clamp: resolution.reset.contains(ResetFlags::DEPTH_CLAMP),
            max_anisotropy: if resolution.reset.contains(ResetFlags::MAX_ANISOTROPY) {
                self.device_limits.max_anisotropy.max(1.0)
            } else {
                1.0
            },
            uniform_align: self.device_limits.min_uniform_buffer_offset_alignment.max(4),
            supported: self.caps.supported,
        };

        let mut uniforms = std::mem::take(self.resources.uniforms_mut());
        let recorded = {
            let mut recorder = Recorder {
                device: &self.device,
                cb,
                callback: &*self.callback,
                frame: &*frame,
                resources: &self.resources,
                defaults: &self.defaults,
                swap_chain: &self.swap_chain,
                uniforms: &mut uniforms,
                pipelines: &mut self.pipelines,
                descriptors: &mut self.descriptors,
                render_passes: &mut self.render_passes,
                image_views: &mut self.image_views,
                queue: &mut self.queue,
                uniform_scratch: &mut self.uniform_scratch[slot],
                stats: &mut self.stats,
                in_render_pass: &mut self.in_render_pass,
                settings,
                transient,
                back_buffer,
                bound: BoundState::default(),
                pass: PassState::default(),
                constants: Vec::new(),
                block: Vec::new(),
            };
            recorder.run()
        };
        *self.resources.uniforms_mut() = uniforms;
        recorded?;

        self.swap_chain.prepare_present(&self.device, &mut self.queue, cb);
        self.uniform_scratch[slot].flush(&self.device)?;
        self.staging[slot].flush(&self.device)?;
        self.descriptors.end_frame(&mut self.queue);
        self.stats.dropped_semaphores = self.queue.take_dropped_semaphores();
        let wait = resolution.reset.contains(ResetFlags::FLUSH_AFTER_RENDER);
        self.queue.kick(&self.device, wait)?;
        self.swap_chain.present(&self.device)?;

        self.run_commands(CommandBufferId::NULL, frame.take_post_commands())?;

        self.stats.dropped_draw_calls = frame.num_dropped();
        self.stats.dropped_blits = frame.num_dropped_blits();
        self.stats.cpu_submit_time_ms = started.elapsed().as_secs_f32() * 1000.0;
        if self.debug.contains(DebugFlags::STATS) {
            log::info!(
                "Frame {}: {} draws, {} dispatches, {} blits, {} state changes, {} violations, {:.3} ms.",
                self.stats.frame_number,
                self.stats.draw_calls,
                self.stats.dispatches,
                self.stats.blits,
                self.stats.state_changes(),
                self.stats.contract_violations,
                self.stats.cpu_submit_time_ms
            );
        }
        Ok(self.stats.clone())
    }

    fn upload_transient(&mut self, frame: &Frame, slot: usize) -> Result<Transient, NativeError> {
        let mut placed = [None, None];
        for (out, data) in placed
            .iter_mut()
            .zip([frame.transient_vertices(), frame.transient_indices()])
        {
            if data.is_empty() {
                continue;
            }
            let write =
                self.staging[slot].write_or_fallback(&self.device, &mut self.queue, data, TRANSIENT_ALIGNMENT)?;
            if write.fallback {
                self.stats.scratch_fallbacks += 1;
            }
            *out = Some((write.buffer, write.offset));
        }
        Ok(Transient {
            vertices: placed[0],
            indices: placed[1],
        })
    }
}

impl<'a, D: NativeDevice> Recorder<'a, D> {
    fn record(&self, command: GpuCommand) {
        self.device.record(self.cb, command);
    }

    fn violation(&mut self, violation: ContractViolation) {
        log::warn!("{violation}; item skipped.");
        self.stats.contract_violations += 1;
    }

    fn run(&mut self) -> Result<(), RenderError> {
        let frame = self.frame;
        let keys = frame.sort_keys();
        let values = frame.sort_values();
        let blit_keys = frame.blit_keys();
        let mut item = 0;
        let mut blit = 0;

        for view in 0..MAX_VIEWS as ViewId {
            let items_end = item
                + keys[item..]
                    .iter()
                    .take_while(|&&key| SortKey::decode_view(key) == view)
                    .count();
            let blits_end = blit
                + blit_keys[blit..]
                    .iter()
                    .take_while(|&&key| decode_blit_key(key).0 == view)
                    .count();
            let clears = frame.views()[view as usize].has_clear();
            if item == items_end && blit == blits_end && !clears {
                continue;
            }

            self.begin_view(view)?;
            for &key in &blit_keys[blit..blits_end] {
                self.blit(view, decode_blit_key(key).1);
            }

            let renderable = self.pass.target.is_some();
            if renderable && clears {
                self.ensure_pass()?;
            }
            if !renderable {
                log::trace!("View {view} has no renderable target; skipped.");
                self.stats.skipped_views += 1;
                self.stats.skipped_items += (items_end - item) as u32;
            }
            for &index in &values[item..items_end] {
                let Some(render_item) = frame.render_items().get(index as usize) else {
                    continue;
                };
                self.apply_uniforms(render_item);
                if !renderable {
                    continue;
                }
                match render_item {
                    RenderItem::Draw(draw) => self.draw(draw)?,
                    RenderItem::Compute(compute) => self.compute(compute)?,
                }
            }
            item = items_end;
            blit = blits_end;
        }

        self.close_pass();
        self.leave_compute();
        if let Some(fb) = self.pass.resolve.take() {
            self.resources.resolve_frame_buffer(self.device, self.cb, fb);
        }
        Ok(())
    }

    fn apply_uniforms(&mut self, item: &RenderItem) {
        let (begin, end) = item.uniform_range();
        if begin >= end {
            return;
        }
        let log = self.frame.uniforms();
        if self.uniforms.apply(log.range(begin, end), log) > 0 {
            self.bound.uniforms = None;
        }
    }

    // --- Views and passes ---

    fn close_pass(&mut self) {
        if *self.in_render_pass {
            self.record(GpuCommand::EndRenderPass);
            *self.in_render_pass = false;
        }
    }

    fn enter_compute(&mut self) {
        if !self.pass.compute {
            self.record(GpuCommand::PipelineBarrier {
                src_stage: PipelineStage::ALL_COMMANDS,
                dst_stage: PipelineStage::COMPUTE,
                image_barriers: Vec::new(),
            });
            self.pass.compute = true;
        }
    }

    fn leave_compute(&mut self) {
        if self.pass.compute {
            self.record(GpuCommand::PipelineBarrier {
                src_stage: PipelineStage::COMPUTE,
                dst_stage: PipelineStage::ALL_COMMANDS,
                image_barriers: Vec::new(),
            });
            self.pass.compute = false;
        }
    }

    fn begin_view(&mut self, view: ViewId) -> Result<(), NativeError> {
        self.close_pass();
        self.leave_compute();

        let state = &self.frame.views()[view as usize];
        let fb = state.frame_buffer;
        if let Some(previous) = self.pass.resolve.filter(|&previous| previous != fb) {
            self.resources.resolve_frame_buffer(self.device, self.cb, previous);
            self.pass.resolve = None;
        }

        let found = if fb.is_valid() {
            self.resources
                .frame_buffer(fb)
                .map(|entry| (entry.framebuffer, &entry.target, entry.width, entry.height))
        } else if self.back_buffer {
            let (width, height) = self.swap_chain.extent();
            self.swap_chain
                .framebuffer()
                .map(|framebuffer| (framebuffer, self.swap_chain.target(), width, height))
        } else {
            None
        };

        let mut target = None;
        let mut rect = Rect::default();
        if let Some((framebuffer, render_target, width, height)) = found {
            rect = view_rect(state.rect, width, height);
            if !rect.is_zero() {
                let (render_pass, pass_hash) =
                    fetch_render_pass(self.device, self.render_passes, &render_target.compatible_desc())?;
                target = Some(ViewTarget {
                    framebuffer,
                    target: render_target.clone(),
                    render_pass,
                    pass_hash,
                });
            }
        }
        let scissor = if state.scissor.is_zero() {
            rect
        } else {
            state.scissor.intersect(&rect)
        };
        if target.is_some() && fb.is_valid() {
            self.pass.resolve = Some(fb);
        }
        log::trace!("View {view}: target {fb:?}, rect {rect:?}.");

        self.pass.view = view;
        self.pass.frame_buffer = fb;
        self.pass.target = target;
        self.pass.rect = rect;
        self.pass.scissor = scissor;
        self.pass.cleared = false;
        Ok(())
    }

    fn ensure_pass(&mut self) -> Result<(), NativeError> {
        if *self.in_render_pass {
            return Ok(());
        }
        let Some(target) = self.pass.target.as_ref() else {
            return Ok(());
        };
        let view = &self.frame.views()[self.pass.view as usize];
        let clear = if self.pass.cleared {
            ClearFlags::EMPTY
        } else {
            view.clear.flags
        };
        let (render_pass, _) = fetch_render_pass(self.device, self.render_passes, &target.target.pass_desc(clear))?;
        let clear_values = clear_values(
            view,
            target.target.colors.len(),
            target.target.depth.is_some(),
            target.target.resolves.len(),
        );
        self.device.record(
            self.cb,
            GpuCommand::BeginRenderPass {
                render_pass,
                framebuffer: target.framebuffer,
                area: self.pass.rect,
                clear_values,
            },
        );
        self.record(GpuCommand::SetViewport {
            rect: self.pass.rect,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        self.record(GpuCommand::SetScissor(self.pass.scissor));
        *self.in_render_pass = true;
        self.pass.cleared = true;
        self.bound.scissor = Some(self.pass.scissor);
        self.stats.render_passes += 1;
        self.stats.scissor_sets += 1;
        Ok(())
    }

    fn feedback(&self, bind: &RenderBind) -> Option<TextureHandle> {
        if !self.pass.frame_buffer.is_valid() {
            return None;
        }
        let fb = self.resources.frame_buffer(self.pass.frame_buffer)?;
        bind.iter().find_map(|(_, binding)| match *binding {
            Binding::Texture { handle, .. } | Binding::Image { handle, .. } if fb.uses_texture(handle) => {
                Some(handle)
            }
            _ => None,
        })
    }

    fn vertex_source(&self, buffer: BufferRef) -> Option<(BufferId, u64, VertexLayoutHandle)> {
        match buffer {
            BufferRef::TransientVertex => self
                .transient
                .vertices
                .map(|(id, offset)| (id, offset, VertexLayoutHandle::INVALID)),
            other => self
                .resources
                .buffer(other)
                .map(|entry| (entry.buffer, 0, entry.layout)),
        }
    }

    fn index_source(&self, buffer: BufferRef) -> Option<(BufferId, u64)> {
        match buffer {
            BufferRef::TransientIndex => self.transient.indices,
            other => self.resources.buffer(other).map(|entry| (entry.buffer, 0)),
        }
    }

    // --- Uniforms and descriptors ---

    fn pack_uniforms(
        &mut self,
        program: &ProgramEntry,
        key: UniformKey,
    ) -> Result<(BufferId, Vec<u32>), NativeError> {
        if program.uniform_blocks.is_empty() {
            return Ok((BufferId::NULL, Vec::new()));
        }
        if let Some((bound_key, buffer, offsets)) = &self.bound.uniforms {
            if *bound_key == key {
                return Ok((*buffer, offsets.clone()));
            }
        }

        let align = self.settings.uniform_align;
        let transforms = DrawTransforms {
            view: &self.frame.views()[key.view as usize],
            rect: self.pass.rect,
            matrices: self.frame.matrices(),
            matrix: key.matrix,
            num_matrices: key.num_matrices,
            alpha_ref: key.alpha_ref,
        };
        self.constants.clear();
        let mut offsets = Vec::with_capacity(program.uniform_blocks.len());
        for block in &program.uniform_blocks {
            let start = (self.constants.len() as u64).next_multiple_of(align) as usize;
            self.constants.resize(start, 0);
            offsets.push(start as u32);
            let constants = self
                .resources
                .shader(block.shader)
                .map_or(&[][..], |shader| shader.constants.as_slice());
            pack_constants(constants, block.size as usize, self.uniforms, &transforms, &mut self.block);
            self.constants.extend_from_slice(&self.block);
        }

        let write = self
            .uniform_scratch
            .write_or_fallback(self.device, self.queue, &self.constants, align)?;
        if write.fallback {
            self.stats.scratch_fallbacks += 1;
        }
        self.stats.uniform_bytes += self.constants.len() as u32;
        for offset in &mut offsets {
            *offset += write.offset as u32;
        }
        self.bound.uniforms = Some((key, write.buffer, offsets.clone()));
        Ok((write.buffer, offsets))
    }

    /// Binds the descriptor set of an item. Returns `false` when a binding
    /// references an unknown resource.
    fn bind_descriptors(
        &mut self,
        bind_point: PipelineBindPoint,
        program: &ProgramEntry,
        bind: &RenderBind,
        uniforms: (BufferId, Vec<u32>),
    ) -> Result<bool, NativeError> {
        let mut ctx = DescriptorContext {
            device: self.device,
            resources: self.resources,
            defaults: self.defaults,
            image_views: &mut *self.image_views,
            queue: &mut *self.queue,
            max_anisotropy: self.settings.max_anisotropy,
        };
        let (buffer, offsets) = uniforms;
        let set = match self.descriptors.fetch(&mut ctx, program, bind, buffer, self.stats)? {
            DescriptorBinding::Set(set) => set,
            DescriptorBinding::NoBindings => return Ok(true),
            DescriptorBinding::UnknownResource => return Ok(false),
        };
        let bound = match bind_point {
            PipelineBindPoint::Graphics => &mut self.bound.graphics_set,
            PipelineBindPoint::Compute => &mut self.bound.compute_set,
        };
        if bound.as_ref().is_some_and(|(s, o)| *s == set && *o == offsets) {
            return Ok(true);
        }
        *bound = Some((set, offsets.clone()));
        self.device.record(
            self.cb,
            GpuCommand::BindDescriptorSet {
                bind_point,
                layout: program.pipeline_layout,
                set,
                dynamic_offsets: offsets,
            },
        );
        self.stats.descriptor_binds += 1;
        Ok(true)
    }

    // --- Items ---

    fn draw(&mut self, draw: &RenderDraw) -> Result<(), RenderError> {
        let resources = self.resources;
        let Some(program) = resources.program(draw.program).filter(|p| !p.compute) else {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        };
        let Some(vs) = resources.shader(program.vsh) else {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        };
        let fragment = match program.fsh.map(|fsh| resources.shader(fsh)) {
            Some(Some(fs)) => Some(fs.module),
            Some(None) => {
                self.violation(ContractViolation::UnknownResource);
                return Ok(());
            }
            None => None,
        };
        if vs.binary.uses_attributes() && !draw.has_streams() {
            self.violation(ContractViolation::MissingVertexStream { program: draw.program });
            return Ok(());
        }
        if let Some(texture) = self.feedback(&draw.bind) {
            self.violation(ContractViolation::FeedbackLoop { texture });
            return Ok(());
        }
        if !bindings_resolve(resources, program, &draw.bind) {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        }

        // Bound streams are compacted; instance data follows them.
        let mut layouts: [Option<&VertexLayout>; MAX_VERTEX_STREAMS] = [None; MAX_VERTEX_STREAMS];
        let mut vertex_buffers = Vec::with_capacity(MAX_VERTEX_STREAMS + 1);
        for (slot, stream) in draw.streams.iter().enumerate() {
            let Some(stream) = stream else {
                continue;
            };
            let source = self.vertex_source(stream.buffer);
            let layout = source.and_then(|(_, _, own)| {
                let handle = if stream.layout.is_valid() { stream.layout } else { own };
                resources.vertex_layout(handle)
            });
            let (Some((buffer, base, _)), Some(layout)) = (source, layout) else {
                self.violation(ContractViolation::UnknownResource);
                return Ok(());
            };
            layouts[slot] = Some(layout);
            let offset = base + stream.offset as u64 + stream.start_vertex as u64 * layout.stride() as u64;
            vertex_buffers.push((buffer, offset));
        }
        let mut instance_stride = 0;
        if let Some(data) = draw.instance_data {
            let Some((buffer, base, _)) = self.vertex_source(data.buffer) else {
                self.violation(ContractViolation::UnknownResource);
                return Ok(());
            };
            instance_stride = data.stride;
            vertex_buffers.push((buffer, base + data.offset as u64));
        }
        let index = match draw.index {
            Some(ib) => match self.index_source(ib.buffer) {
                Some((buffer, base)) => Some((buffer, base + ib.offset as u64, ib)),
                None => {
                    self.violation(ContractViolation::UnknownResource);
                    return Ok(());
                }
            },
            None => None,
        };

        let instances = draw.instances();
        let topology = draw.state.topology();
        let mut primitives = 0;
        let command = match draw.indirect {
            Some(args) => {
                if !self.settings.supported.contains(CapsFlags::DRAW_INDIRECT) {
                    log::warn!("Indirect draw skipped: the device does not support it.");
                    self.stats.skipped_items += 1;
                    return Ok(());
                }
                let Some(entry) = resources.buffer(BufferRef::Indirect(args.buffer)) else {
                    self.violation(ContractViolation::UnknownResource);
                    return Ok(());
                };
                let offset = args.start as u64 * INDIRECT_DRAW_STRIDE as u64;
                let indexed = index.is_some();
                let count = args.count.filter(|_| {
                    let supported = self.settings.supported.contains(CapsFlags::DRAW_INDIRECT_COUNT);
                    if !supported {
                        log::debug!("Indirect count unsupported; drawing {} records.", args.num);
                    }
                    supported
                });
                match count {
                    Some((count_buffer, count_index)) => {
                        let Some(count_entry) = resources.buffer(count_buffer) else {
                            self.violation(ContractViolation::UnknownResource);
                            return Ok(());
                        };
                        GpuCommand::DrawIndirectCount {
                            buffer: entry.buffer,
                            offset,
                            count_buffer: count_entry.buffer,
                            count_offset: count_index as u64 * 4,
                            max_draw_count: args.num,
                            stride: INDIRECT_DRAW_STRIDE,
                            indexed,
                        }
                    }
                    None => GpuCommand::DrawIndirect {
                        buffer: entry.buffer,
                        offset,
                        draw_count: args.num,
                        stride: INDIRECT_DRAW_STRIDE,
                        indexed,
                    },
                }
            }
            None => {
                let count = index.map_or_else(|| draw.num_vertices(), |(_, _, ib)| ib.num_indices);
                if count == 0 || instances == 0 {
                    return Ok(());
                }
                primitives = topology.primitive_count(count) * instances;
                match index {
                    Some((_, _, ib)) => GpuCommand::DrawIndexed {
                        index_count: count,
                        instance_count: instances,
                        first_index: ib.start_index,
                        vertex_offset: 0,
                        first_instance: 0,
                    },
                    None => GpuCommand::Draw {
                        vertex_count: count,
                        instance_count: instances,
                        first_vertex: 0,
                        first_instance: 0,
                    },
                }
            }
        };

        self.leave_compute();
        self.ensure_pass()?;
        let Some(target) = self.pass.target.as_ref() else {
            return Ok(());
        };
        let inputs = GraphicsPipelineInputs {
            state: draw.state,
            stencil: draw.stencil,
            program_hash: program.hash,
            layout: program.pipeline_layout,
            vertex: vs.module,
            fragment,
            attributes: &vs.binary.attributes,
            streams: layouts,
            instance_stride,
            render_pass: target.render_pass,
            render_pass_hash: target.pass_hash,
            samples: target.target.samples(),
            color_attachments: target.target.colors.len() as u32,
            wireframe: self.settings.wireframe,
            depth_clamp: self.settings.depth_clamp,
        };
        let pipeline = self
            .pipelines
            .fetch_graphics(self.device, self.callback, &inputs, self.stats)?;

        let key = UniformKey {
            program: draw.program,
            view: self.pass.view,
            matrix: draw.matrix,
            num_matrices: draw.num_matrices,
            alpha_ref: draw.state.alpha_ref_value(),
        };
        let uniforms = self.pack_uniforms(program, key)?;
        if self.bound.graphics_pipeline != Some(pipeline) {
            self.record(GpuCommand::BindPipeline {
                bind_point: PipelineBindPoint::Graphics,
                pipeline,
            });
            self.bound.graphics_pipeline = Some(pipeline);
            self.stats.pipeline_binds += 1;
        }
        if !self.bind_descriptors(PipelineBindPoint::Graphics, program, &draw.bind, uniforms)? {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        }

        if !vertex_buffers.is_empty() && self.bound.vertex_buffers != vertex_buffers {
            self.record(GpuCommand::BindVertexBuffers {
                first: 0,
                buffers: vertex_buffers.clone(),
            });
            self.bound.vertex_buffers = vertex_buffers;
            self.stats.vertex_buffer_binds += 1;
        }
        if let Some((buffer, offset, ib)) = index {
            let binding = (buffer, offset, ib.index32);
            if self.bound.index_buffer != Some(binding) {
                self.record(GpuCommand::BindIndexBuffer {
                    buffer,
                    offset,
                    index32: ib.index32,
                });
                self.bound.index_buffer = Some(binding);
                self.stats.index_buffer_binds += 1;
            }
        }

        let scissor = match self.frame.rects().get(draw.scissor) {
            Some(rect) => rect.intersect(&self.pass.scissor),
            None => self.pass.scissor,
        };
        if self.bound.scissor != Some(scissor) {
            self.record(GpuCommand::SetScissor(scissor));
            self.bound.scissor = Some(scissor);
            self.stats.scissor_sets += 1;
        }
        if draw.stencil != 0 {
            let (front, back) = unpack_stencil(draw.stencil);
            let reference = (front.reference() as u32, back.reference() as u32);
            if self.bound.stencil_ref != Some(reference) {
                self.record(GpuCommand::SetStencilReference {
                    front: reference.0,
                    back: reference.1,
                });
                self.bound.stencil_ref = Some(reference);
                self.stats.stencil_ref_sets += 1;
            }
        }
        if draw.state.uses_blend_constant() && self.bound.blend_constant != Some(draw.rgba) {
            self.record(GpuCommand::SetBlendConstants(rgba_to_floats(draw.rgba)));
            self.bound.blend_constant = Some(draw.rgba);
            self.stats.blend_constant_sets += 1;
        }

        self.record(command);
        self.stats.draw_calls += 1;
        self.stats.primitives[topology as usize] += primitives;
        Ok(())
    }

    fn compute(&mut self, compute: &RenderCompute) -> Result<(), RenderError> {
        let resources = self.resources;
        let Some(program) = resources.program(compute.program).filter(|p| p.compute) else {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        };
        let Some(shader) = resources.shader(program.vsh) else {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        };
        if !bindings_resolve(resources, program, &compute.bind) {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        }
        let command = match compute.indirect {
            Some(args) => match resources.buffer(BufferRef::Indirect(args.buffer)) {
                Some(entry) => GpuCommand::DispatchIndirect {
                    buffer: entry.buffer,
                    offset: args.start as u64 * INDIRECT_DRAW_STRIDE as u64,
                },
                None => {
                    self.violation(ContractViolation::UnknownResource);
                    return Ok(());
                }
            },
            None => {
                let [x, y, z] = compute.num_groups;
                GpuCommand::Dispatch { x, y, z }
            }
        };

        self.close_pass();
        self.enter_compute();
        let pipeline = self.pipelines.fetch_compute(
            self.device,
            program.hash,
            program.pipeline_layout,
            shader.module,
            self.stats,
        )?;
        let key = UniformKey {
            program: compute.program,
            view: self.pass.view,
            matrix: compute.matrix,
            num_matrices: compute.num_matrices,
            alpha_ref: 0,
        };
        let uniforms = self.pack_uniforms(program, key)?;
        if self.bound.compute_pipeline != Some(pipeline) {
            self.record(GpuCommand::BindPipeline {
                bind_point: PipelineBindPoint::Compute,
                pipeline,
            });
            self.bound.compute_pipeline = Some(pipeline);
            self.stats.pipeline_binds += 1;
        }
        if !self.bind_descriptors(PipelineBindPoint::Compute, program, &compute.bind, uniforms)? {
            self.violation(ContractViolation::UnknownResource);
            return Ok(());
        }
        self.record(command);
        self.stats.dispatches += 1;
        Ok(())
    }

    fn blit(&mut self, view: ViewId, index: u16) {
        let Some(item) = self.frame.blit_items().get(index as usize) else {
            return;
        };
        let (Some(src), Some(dst)) = (self.resources.texture(item.src), self.resources.texture(item.dst)) else {
            self.violation(ContractViolation::UnknownResource);
            return;
        };
        if src.samples() != dst.samples() {
            self.violation(ContractViolation::BlitSampleCountMismatch { view });
            return;
        }
        let Some(region) = blit_region(item, &src.desc, &dst.desc) else {
            self.violation(ContractViolation::BlitOutOfRange { view });
            return;
        };
        if region.extent.contains(&0) || region.src.layer_count == 0 {
            return;
        }

        let whole = |image, desc: &TextureDesc, old, new| {
            barrier(
                image,
                ImageAspect::of(desc.format),
                (0, desc.num_mips.max(1) as u32),
                (0, desc.array_layers()),
                old,
                new,
            )
        };
        let (src_layout, dst_layout, before, after) = if src.image == dst.image {
            (
                ImageLayout::General,
                ImageLayout::General,
                vec![whole(src.image, &src.desc, src.layout, ImageLayout::General)],
                vec![whole(src.image, &src.desc, ImageLayout::General, src.layout)],
            )
        } else {
            (
                ImageLayout::TransferSrc,
                ImageLayout::TransferDst,
                vec![
                    whole(src.image, &src.desc, src.layout, ImageLayout::TransferSrc),
                    whole(dst.image, &dst.desc, dst.layout, ImageLayout::TransferDst),
                ],
                vec![
                    whole(src.image, &src.desc, ImageLayout::TransferSrc, src.layout),
                    whole(dst.image, &dst.desc, ImageLayout::TransferDst, dst.layout),
                ],
            )
        };
        self.record(GpuCommand::PipelineBarrier {
            src_stage: PipelineStage::ALL_COMMANDS,
            dst_stage: PipelineStage::TRANSFER,
            image_barriers: before,
        });
        self.record(GpuCommand::CopyImage {
            src: src.image,
            src_layout,
            dst: dst.image,
            dst_layout,
            region,
        });
        self.record(GpuCommand::PipelineBarrier {
            src_stage: PipelineStage::TRANSFER,
            dst_stage: PipelineStage::ALL_COMMANDS,
            image_barriers: after,
        });
        self.stats.blits += 1;
    }
}

/// The viewport of a view: its rectangle clipped to the target, or the whole
/// target when the rectangle is empty.
fn view_rect(rect: Rect, width: u32, height: u32) -> Rect {
    if rect.is_zero() {
        Rect::new(0, 0, u16::MAX, u16::MAX).clamp_to(width, height)
    } else {
        rect.clamp_to(width, height)
    }
}

/// Per-axis size of a texture mip; the third axis is depth for volume
/// textures and array layers otherwise.
fn blit_size(desc: &TextureDesc, mip: u8) -> [u32; 3] {
    let (width, height, depth) = desc.mip_extent(mip);
    let third = if desc.depth > 1 { depth } else { desc.array_layers() };
    [width, height, third]
}

fn blit_subresource(desc: &TextureDesc, mip: u8, origin: u32, extent: u32) -> (ImageSubresource, u32) {
    let aspect = ImageAspect::of(desc.format);
    if desc.depth > 1 {
        let subresource = ImageSubresource {
            aspect,
            mip: mip as u32,
            base_layer: 0,
            layer_count: 1,
        };
        (subresource, origin)
    } else {
        let subresource = ImageSubresource {
            aspect,
            mip: mip as u32,
            base_layer: origin,
            layer_count: extent,
        };
        (subresource, 0)
    }
}

/// The copy region of a blit, or `None` when it leaves either texture.
fn blit_region(item: &BlitItem, src: &TextureDesc, dst: &TextureDesc) -> Option<ImageCopy> {
    if item.src_mip >= src.num_mips.max(1) || item.dst_mip >= dst.num_mips.max(1) {
        return None;
    }
    let src_size = blit_size(src, item.src_mip);
    let dst_size = blit_size(dst, item.dst_mip);
    let mut extent = [0u32; 3];
    for axis in 0..3 {
        extent[axis] = if item.extent[axis] == u32::MAX {
            src_size[axis].checked_sub(item.src_origin[axis])?
        } else {
            item.extent[axis]
        };
        let src_end = item.src_origin[axis].checked_add(extent[axis])?;
        let dst_end = item.dst_origin[axis].checked_add(extent[axis])?;
        if src_end > src_size[axis] || dst_end > dst_size[axis] {
            return None;
        }
    }
    let (src_sub, src_z) = blit_subresource(src, item.src_mip, item.src_origin[2], extent[2]);
    let (dst_sub, dst_z) = blit_subresource(dst, item.dst_mip, item.dst_origin[2], extent[2]);
    let depth = if src.depth > 1 { extent[2] } else { 1 };
    Some(ImageCopy {
        src: src_sub,
        src_offset: [item.src_origin[0], item.src_origin[1], src_z],
        dst: dst_sub,
        dst_offset: [item.dst_origin[0], item.dst_origin[1], dst_z],
        extent: [extent[0], extent[1], depth],
    })
}

fn rgba_to_floats(rgba: u32) -> [f32; 4] {
    rgba.to_be_bytes().map(|c| c as f32 / 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::api::resource::{TextureFlags, TextureFormat};

    fn desc(width: u16, height: u16, layers: u16) -> TextureDesc {
        TextureDesc::new_2d(width, height, false, layers, TextureFormat::Rgba8, TextureFlags::BLIT_DST)
    }

    #[test]
    fn empty_view_rect_covers_the_target() {
        assert_eq!(view_rect(Rect::default(), 640, 480), Rect::new(0, 0, 640, 480));
        assert_eq!(view_rect(Rect::new(600, 0, 100, 100), 640, 480), Rect::new(600, 0, 40, 100));
        assert!(view_rect(Rect::new(700, 0, 10, 10), 640, 480).is_zero());
    }

    #[test]
    fn blit_extent_extends_to_the_source_edge() {
        let item = BlitItem {
            src: TextureHandle(0),
            dst: TextureHandle(1),
            src_origin: [16, 0, 0],
            extent: [u32::MAX, u32::MAX, 1],
            ..Default::default()
        };
        let region = blit_region(&item, &desc(64, 32, 1), &desc(64, 32, 1)).unwrap();
        assert_eq!(region.extent, [48, 32, 1]);
        assert_eq!(region.src_offset, [16, 0, 0]);
        assert_eq!(region.dst.layer_count, 1);
    }

    #[test]
    fn blit_outside_the_destination_is_rejected() {
        let item = BlitItem {
            dst_origin: [40, 0, 0],
            extent: [32, 8, 1],
            ..Default::default()
        };
        assert!(blit_region(&item, &desc(64, 64, 1), &desc(64, 64, 1)).is_none());

        let bad_mip = BlitItem {
            src_mip: 3,
            extent: [1, 1, 1],
            ..Default::default()
        };
        assert!(blit_region(&bad_mip, &desc(64, 64, 1), &desc(64, 64, 1)).is_none());
    }

    #[test]
    fn array_blits_copy_layers() {
        let item = BlitItem {
            src_origin: [0, 0, 1],
            dst_origin: [0, 0, 2],
            extent: [8, 8, 2],
            ..Default::default()
        };
        let region = blit_region(&item, &desc(8, 8, 4), &desc(8, 8, 4)).unwrap();
        assert_eq!((region.src.base_layer, region.src.layer_count), (1, 2));
        assert_eq!((region.dst.base_layer, region.dst.layer_count), (2, 2));
        assert_eq!(region.extent, [8, 8, 1]);
    }

    #[test]
    fn blend_constant_unpacks_rgba() {
        assert_eq!(rgba_to_floats(0xff00_00ff), [1.0, 0.0, 0.0, 1.0]);
    }
}
