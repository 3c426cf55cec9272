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

//! Backend-side tables of the client resources.
//!
//! Every client handle indexes a `Vec<Option<Entry>>`. Creation uploads
//! initial data through the staging scratch buffer and records the copies and
//! layout transitions into the frame's command buffer. Destruction routes the
//! native objects through the deferred-release queue.

use super::command_queue::CommandQueue;
use super::conversions::{
    attachment_layout, attachment_usage, image_usage, resting_layout, sampled_aspect, sampler_desc,
    IntoNative,
};
use super::render_pass::{fetch_render_pass, RenderTarget, TargetAttachment};
use super::scratch::ScratchBuffer;
use super::staged_init::InitGuard;
use super::state_cache::{LruCache, StateCache};
use super::uniforms::{ConstantSource, ShaderConstant, UniformTable};
use prism_core::renderer::api::command::{Attachment, ResourceCommand, TextureRegion};
use prism_core::renderer::api::core::{FrameStats, MAX_TEXTURE_SAMPLERS};
use prism_core::renderer::api::native::{
    BufferCopy, BufferDesc, BufferId, BufferImageCopy, BufferUsage, CommandBufferId,
    DescriptorSetLayoutBinding, DescriptorSetLayoutId, DescriptorType, FramebufferDesc,
    FramebufferId, GpuCommand, ImageAspect, ImageBarrier, ImageCopy, ImageDesc, ImageId,
    ImageLayout, ImageSubresource, ImageUsage, ImageViewDesc, ImageViewId, MemoryLocation,
    NativeObject, PipelineLayoutId, PipelineStage, RenderPassId, SamplerId, ShaderModuleId,
    ShaderStages,
};
use prism_core::renderer::api::pipeline::SamplerFlags;
use prism_core::renderer::api::resource::{
    BufferFlags, BufferRef, FrameBufferHandle, ProgramHandle, ShaderHandle, TextureDesc,
    TextureFlags, TextureFormat, TextureHandle, TextureViewType, VertexLayout, VertexLayoutHandle,
    INDIRECT_DRAW_STRIDE,
};
use prism_core::renderer::api::shader::{PredefinedUniform, ShaderBinary, ShaderStage};
use prism_core::renderer::{NativeDevice, NativeError, ResourceError};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

/// Binding of the vertex stage constant block.
pub const VS_UNIFORM_BINDING: u32 = 0;
/// Binding of the fragment stage constant block.
pub const FS_UNIFORM_BINDING: u32 = 1;
/// Binding of texture stage 0; stage `n` binds at `RESOURCE_BINDING_BASE + n`.
pub const RESOURCE_BINDING_BASE: u32 = 2;

const UPLOAD_ALIGNMENT: u64 = 16;

fn entry_mut<T>(table: &mut Vec<Option<T>>, idx: usize) -> &mut Option<T> {
    if table.len() <= idx {
        table.resize_with(idx + 1, || None);
    }
    &mut table[idx]
}

fn entry<T>(table: &[Option<T>], idx: usize) -> Option<&T> {
    table.get(idx).and_then(Option::as_ref)
}

// --- Entries ---

/// A vertex, index or indirect buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferEntry {
    /// The native buffer.
    pub buffer: BufferId,
    /// Size in bytes.
    pub size: u64,
    /// Vertex layout of vertex buffers.
    pub layout: VertexLayoutHandle,
    /// Creation flags.
    pub flags: BufferFlags,
}

/// A parsed shader and its module.
#[derive(Debug)]
pub struct ShaderEntry {
    /// The container.
    pub binary: ShaderBinary,
    /// The native module.
    pub module: ShaderModuleId,
    /// Content hash of the container.
    pub hash: u64,
    /// Constants of the constant block.
    pub constants: Vec<ShaderConstant>,
    /// Texture stages read by the shader and how they are bound.
    pub slots: Vec<(u8, DescriptorType)>,
}

/// A bound resource slot of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSlot {
    /// Texture stage.
    pub stage: u8,
    /// Descriptor binding.
    pub binding: u32,
    /// Descriptor kind.
    pub ty: DescriptorType,
}

/// A constant block fed by one shader of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBlock {
    /// Descriptor binding.
    pub binding: u32,
    /// The shader whose constants fill the block.
    pub shader: ShaderHandle,
    /// Size in bytes.
    pub size: u32,
}

/// A linked program.
#[derive(Debug)]
pub struct ProgramEntry {
    /// Vertex or compute shader.
    pub vsh: ShaderHandle,
    /// Fragment shader.
    pub fsh: Option<ShaderHandle>,
    /// Hash of both shaders' contents.
    pub hash: u64,
    /// The program is a compute program.
    pub compute: bool,
    /// Descriptor set layout.
    pub set_layout: DescriptorSetLayoutId,
    /// Pipeline layout.
    pub pipeline_layout: PipelineLayoutId,
    /// Constant blocks, ordered by binding.
    pub uniform_blocks: Vec<UniformBlock>,
    /// Resource slots, ordered by binding.
    pub slots: Vec<ResourceSlot>,
}

/// A texture.
#[derive(Debug)]
pub struct TextureEntry {
    /// Creation parameters.
    pub desc: TextureDesc,
    /// The single-sample image sampled by shaders.
    pub image: ImageId,
    /// View of every mip and layer.
    pub view: ImageViewId,
    /// Layout the image rests in.
    pub layout: ImageLayout,
    /// Multisampled image rendered to, resolved into `image`.
    pub msaa: Option<ImageId>,
}

impl TextureEntry {
    /// Sample count of the rendered image.
    pub fn samples(&self) -> u8 {
        if self.msaa.is_some() {
            self.desc.flags.msaa_samples()
        } else {
            1
        }
    }
}

/// A texture frame buffer.
#[derive(Debug)]
pub struct FrameBufferEntry {
    /// Attachments as created.
    pub attachments: Vec<Attachment>,
    /// Views owned by the frame buffer, in target order.
    pub views: Vec<ImageViewId>,
    /// The native framebuffer.
    pub framebuffer: FramebufferId,
    /// Attachment signature.
    pub target: RenderTarget,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBufferEntry {
    /// Returns `true` if `texture` is attached.
    pub fn uses_texture(&self, texture: TextureHandle) -> bool {
        self.attachments.iter().any(|a| a.texture == texture)
    }
}

/// Placeholder objects bound to program slots left empty by a draw.
#[derive(Debug, Default)]
pub struct Defaults {
    /// 1x1 sampled and storage image.
    pub image: ImageId,
    /// Its view.
    pub view: ImageViewId,
    /// Linear clamp sampler.
    pub sampler: SamplerId,
    /// Small storage buffer.
    pub buffer: BufferId,
    transitioned: bool,
}

impl Defaults {
    /// Layout of the placeholder image once prepared.
    pub const LAYOUT: ImageLayout = ImageLayout::General;

    /// Creates the placeholders and registers them with the init guard.
    pub fn new<D: NativeDevice>(guard: &mut InitGuard<'_, D>) -> Result<Self, NativeError> {
        let device = guard.device();
        let image = device.create_image(&ImageDesc {
            format: TextureFormat::Rgba8,
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            samples: 1,
            usage: ImageUsage::SAMPLED | ImageUsage::STORAGE,
            cube: false,
        })?;
        guard.track(NativeObject::Image(image));
        let view = device.create_image_view(&ImageViewDesc {
            image,
            view_type: TextureViewType::D2,
            format: TextureFormat::Rgba8,
            aspect: ImageAspect::Color,
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        })?;
        guard.track(NativeObject::ImageView(view));
        let sampler = device.create_sampler(&sampler_desc(SamplerFlags::UVW_CLAMP, 1.0))?;
        guard.track(NativeObject::Sampler(sampler));
        let buffer = device.create_buffer(&BufferDesc {
            size: 16,
            usage: BufferUsage::STORAGE,
            location: MemoryLocation::DeviceLocal,
        })?;
        guard.track(NativeObject::Buffer(buffer));
        Ok(Self {
            image,
            view,
            sampler,
            buffer,
            transitioned: false,
        })
    }

    /// Moves the placeholder image into [`Self::LAYOUT`] on first use.
    pub fn prepare<D: NativeDevice>(&mut self, device: &D, cb: CommandBufferId) {
        if self.transitioned {
            return;
        }
        device.record(
            cb,
            GpuCommand::PipelineBarrier {
                src_stage: PipelineStage::TOP,
                dst_stage: PipelineStage::ALL_COMMANDS,
                image_barriers: vec![barrier(
                    self.image,
                    ImageAspect::Color,
                    (0, 1),
                    (0, 1),
                    ImageLayout::Undefined,
                    Self::LAYOUT,
                )],
            },
        );
        self.transitioned = true;
    }

    /// Destroys the placeholders.
    pub fn destroy<D: NativeDevice>(&mut self, device: &D) {
        device.destroy(NativeObject::ImageView(self.view));
        device.destroy(NativeObject::Image(self.image));
        device.destroy(NativeObject::Sampler(self.sampler));
        device.destroy(NativeObject::Buffer(self.buffer));
        *self = Self::default();
    }
}

/// A layout transition of a mip and layer range.
pub fn barrier(
    image: ImageId,
    aspect: ImageAspect,
    mips: (u32, u32),
    layers: (u32, u32),
    old_layout: ImageLayout,
    new_layout: ImageLayout,
) -> ImageBarrier {
    ImageBarrier {
        image,
        aspect,
        base_mip: mips.0,
        mip_count: mips.1,
        base_layer: layers.0,
        layer_count: layers.1,
        old_layout,
        new_layout,
    }
}

fn transition<D: NativeDevice>(
    device: &D,
    cb: CommandBufferId,
    src_stage: PipelineStage,
    dst_stage: PipelineStage,
    image_barriers: Vec<ImageBarrier>,
) {
    device.record(
        cb,
        GpuCommand::PipelineBarrier {
            src_stage,
            dst_stage,
            image_barriers,
        },
    );
}

/// Records a filtered downscale chain over every mip of a texture.
pub fn record_mip_chain<D: NativeDevice>(device: &D, cb: CommandBufferId, texture: &TextureEntry) {
    let mips = texture.desc.num_mips as u32;
    if mips < 2 {
        return;
    }
    let layers = texture.desc.array_layers();
    let aspect = sampled_aspect(texture.desc.format);
    let whole = |old, new| barrier(texture.image, aspect, (0, mips), (0, layers), old, new);
    transition(
        device,
        cb,
        PipelineStage::ALL_COMMANDS,
        PipelineStage::TRANSFER,
        vec![whole(texture.layout, ImageLayout::General)],
    );
    for mip in 1..mips {
        device.record(
            cb,
            GpuCommand::BlitImage {
                image: texture.image,
                src_mip: mip - 1,
                dst_mip: mip,
                layer_count: layers,
            },
        );
    }
    transition(
        device,
        cb,
        PipelineStage::TRANSFER,
        PipelineStage::ALL_COMMANDS,
        vec![whole(ImageLayout::General, texture.layout)],
    );
}

// --- Creation context ---

/// What resource commands need besides the tables.
#[derive(Debug)]
pub struct ResourceContext<'a, D: NativeDevice> {
    /// The device.
    pub device: &'a D,
    /// The frame's command buffer.
    pub cb: CommandBufferId,
    /// The slot's staging scratch buffer.
    pub staging: &'a mut ScratchBuffer,
    /// Deferred release.
    pub queue: &'a mut CommandQueue,
    /// Render pass cache.
    pub render_passes: &'a mut StateCache<RenderPassId>,
    /// Descriptor set and pipeline layouts keyed by binding signature.
    pub set_layouts: &'a mut StateCache<(DescriptorSetLayoutId, PipelineLayoutId)>,
    /// Image view cache, invalidated per texture.
    pub image_views: &'a mut LruCache<ImageViewId>,
    /// Statistics of the frame.
    pub stats: &'a mut FrameStats,
    /// Number of buffer and image copies recorded.
    pub uploads: u32,
}

impl<D: NativeDevice> ResourceContext<'_, D> {
    fn stage(&mut self, data: &[u8]) -> Result<(BufferId, u64), NativeError> {
        let write = self
            .staging
            .write_or_fallback(self.device, self.queue, data, UPLOAD_ALIGNMENT)?;
        if write.fallback {
            self.stats.scratch_fallbacks += 1;
        }
        Ok((write.buffer, write.offset))
    }

    fn record(&self, command: GpuCommand) {
        self.device.record(self.cb, command);
    }

    fn upload_buffer(&mut self, dst: BufferId, dst_offset: u64, data: &[u8]) -> Result<(), NativeError> {
        if data.is_empty() {
            return Ok(());
        }
        let (src, src_offset) = self.stage(data)?;
        self.record(GpuCommand::CopyBuffer {
            src,
            dst,
            regions: vec![BufferCopy {
                src_offset,
                dst_offset,
                size: data.len() as u64,
            }],
        });
        self.uploads += 1;
        Ok(())
    }

    fn release(&mut self, object: NativeObject) {
        self.queue.release(object);
    }
}

// --- Tables ---

/// Every client resource known to the backend.
#[derive(Debug, Default)]
pub struct Resources {
    vertex_layouts: Vec<Option<VertexLayout>>,
    vertex_buffers: Vec<Option<BufferEntry>>,
    index_buffers: Vec<Option<BufferEntry>>,
    dynamic_vertex_buffers: Vec<Option<BufferEntry>>,
    dynamic_index_buffers: Vec<Option<BufferEntry>>,
    indirect_buffers: Vec<Option<BufferEntry>>,
    shaders: Vec<Option<ShaderEntry>>,
    programs: Vec<Option<ProgramEntry>>,
    textures: Vec<Option<TextureEntry>>,
    frame_buffers: Vec<Option<FrameBufferEntry>>,
    uniforms: UniformTable,
}

impl Resources {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// A vertex layout.
    pub fn vertex_layout(&self, handle: VertexLayoutHandle) -> Option<&VertexLayout> {
        entry(&self.vertex_layouts, handle.idx())
    }

    /// A non-transient buffer referenced by a draw.
    pub fn buffer(&self, buffer: BufferRef) -> Option<BufferEntry> {
        match buffer {
            BufferRef::Vertex(h) => entry(&self.vertex_buffers, h.idx()),
            BufferRef::DynamicVertex(h) => entry(&self.dynamic_vertex_buffers, h.idx()),
            BufferRef::Index(h) => entry(&self.index_buffers, h.idx()),
            BufferRef::DynamicIndex(h) => entry(&self.dynamic_index_buffers, h.idx()),
            BufferRef::Indirect(h) => entry(&self.indirect_buffers, h.idx()),
            BufferRef::TransientVertex | BufferRef::TransientIndex => None,
        }
        .copied()
    }

    /// A shader.
    pub fn shader(&self, handle: ShaderHandle) -> Option<&ShaderEntry> {
        entry(&self.shaders, handle.idx())
    }

    /// A program.
    pub fn program(&self, handle: ProgramHandle) -> Option<&ProgramEntry> {
        entry(&self.programs, handle.idx())
    }

    /// A texture.
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureEntry> {
        entry(&self.textures, handle.idx())
    }

    /// A frame buffer.
    pub fn frame_buffer(&self, handle: FrameBufferHandle) -> Option<&FrameBufferEntry> {
        entry(&self.frame_buffers, handle.idx())
    }

    /// Client uniform values.
    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    /// Client uniform values, for applying a frame's updates.
    pub fn uniforms_mut(&mut self) -> &mut UniformTable {
        &mut self.uniforms
    }

    /// Executes one resource command.
    ///
    /// ## Errors
    /// * `ResourceError::Shader` - A shader container could not be parsed.
    /// * `ResourceError::Native` - A native object could not be created.
    pub fn execute<D: NativeDevice>(
        &mut self,
        ctx: &mut ResourceContext<'_, D>,
        command: ResourceCommand,
    ) -> Result<(), ResourceError> {
        match command {
            ResourceCommand::CreateVertexLayout { handle, layout } => {
                *entry_mut(&mut self.vertex_layouts, handle.idx()) = Some(layout);
            }
            ResourceCommand::CreateVertexBuffer {
                handle,
                mem,
                layout,
                flags,
            } => {
                let entry = create_buffer(ctx, mem.len() as u64, BufferUsage::VERTEX, layout, flags)?;
                ctx.upload_buffer(entry.buffer, 0, &mem)?;
                replace_buffer(ctx, entry_mut(&mut self.vertex_buffers, handle.idx()), entry);
            }
            ResourceCommand::CreateIndexBuffer { handle, mem, flags } => {
                let entry = create_buffer(
                    ctx,
                    mem.len() as u64,
                    BufferUsage::INDEX,
                    VertexLayoutHandle::INVALID,
                    flags,
                )?;
                ctx.upload_buffer(entry.buffer, 0, &mem)?;
                replace_buffer(ctx, entry_mut(&mut self.index_buffers, handle.idx()), entry);
            }
            ResourceCommand::CreateDynamicVertexBuffer {
                handle,
                size,
                layout,
                flags,
            } => {
                let entry = create_buffer(ctx, size as u64, BufferUsage::VERTEX, layout, flags)?;
                replace_buffer(ctx, entry_mut(&mut self.dynamic_vertex_buffers, handle.idx()), entry);
            }
            ResourceCommand::UpdateDynamicVertexBuffer { handle, offset, mem } => {
                let slot = entry_mut(&mut self.dynamic_vertex_buffers, handle.idx());
                update_dynamic_buffer(ctx, slot, BufferUsage::VERTEX, offset as u64, &mem)?;
            }
            ResourceCommand::CreateDynamicIndexBuffer { handle, size, flags } => {
                let entry = create_buffer(
                    ctx,
                    size as u64,
                    BufferUsage::INDEX,
                    VertexLayoutHandle::INVALID,
                    flags,
                )?;
                replace_buffer(ctx, entry_mut(&mut self.dynamic_index_buffers, handle.idx()), entry);
            }
            ResourceCommand::UpdateDynamicIndexBuffer { handle, offset, mem } => {
                let slot = entry_mut(&mut self.dynamic_index_buffers, handle.idx());
                update_dynamic_buffer(ctx, slot, BufferUsage::INDEX, offset as u64, &mem)?;
            }
            ResourceCommand::CreateIndirectBuffer { handle, num } => {
                let entry = create_buffer(
                    ctx,
                    num as u64 * INDIRECT_DRAW_STRIDE as u64,
                    BufferUsage::INDIRECT | BufferUsage::STORAGE,
                    VertexLayoutHandle::INVALID,
                    BufferFlags::DRAW_INDIRECT,
                )?;
                replace_buffer(ctx, entry_mut(&mut self.indirect_buffers, handle.idx()), entry);
            }
            ResourceCommand::CreateShader { handle, mem } => {
                let shader = self.create_shader(ctx.device, &mem)?;
                if let Some(old) = entry_mut(&mut self.shaders, handle.idx()).replace(shader) {
                    ctx.release(NativeObject::ShaderModule(old.module));
                }
            }
            ResourceCommand::CreateProgram { handle, vsh, fsh } => {
                if let Some(program) = self.create_program(ctx, vsh, fsh)? {
                    *entry_mut(&mut self.programs, handle.idx()) = Some(program);
                }
            }
            ResourceCommand::CreateTexture { handle, desc, mem } => {
                let texture = create_texture(ctx, desc, mem.as_deref())?;
                let slot = entry_mut(&mut self.textures, handle.idx());
                if let Some(old) = slot.replace(texture) {
                    release_texture(ctx, handle, old);
                }
            }
            ResourceCommand::UpdateTexture { handle, region, mem } => {
                match entry(&self.textures, handle.idx()) {
                    Some(texture) => update_texture(ctx, texture, &region, &mem)?,
                    None => log::warn!("Update of unknown texture {handle:?} ignored."),
                }
            }
            ResourceCommand::CreateFrameBuffer { handle, attachments } => {
                if let Some(fb) = self.create_frame_buffer(ctx, attachments)? {
                    if let Some(old) = entry_mut(&mut self.frame_buffers, handle.idx()).replace(fb) {
                        release_frame_buffer(ctx, old);
                    }
                }
            }
            ResourceCommand::CreateUniform { handle, name, ty, num } => {
                self.uniforms.create(handle, name, ty, num);
            }
            ResourceCommand::DestroyVertexLayout(h) => {
                take(&mut self.vertex_layouts, h.idx());
            }
            ResourceCommand::DestroyVertexBuffer(h) => {
                destroy_buffer(ctx, take(&mut self.vertex_buffers, h.idx()));
            }
            ResourceCommand::DestroyIndexBuffer(h) => {
                destroy_buffer(ctx, take(&mut self.index_buffers, h.idx()));
            }
            ResourceCommand::DestroyDynamicVertexBuffer(h) => {
                destroy_buffer(ctx, take(&mut self.dynamic_vertex_buffers, h.idx()));
            }
            ResourceCommand::DestroyDynamicIndexBuffer(h) => {
                destroy_buffer(ctx, take(&mut self.dynamic_index_buffers, h.idx()));
            }
            ResourceCommand::DestroyIndirectBuffer(h) => {
                destroy_buffer(ctx, take(&mut self.indirect_buffers, h.idx()));
            }
            ResourceCommand::DestroyShader(h) => {
                if let Some(shader) = take(&mut self.shaders, h.idx()) {
                    ctx.release(NativeObject::ShaderModule(shader.module));
                }
            }
            ResourceCommand::DestroyProgram(h) => {
                // Layouts are shared through the layout cache.
                take(&mut self.programs, h.idx());
            }
            ResourceCommand::DestroyTexture(h) => {
                if let Some(texture) = take(&mut self.textures, h.idx()) {
                    release_texture(ctx, h, texture);
                }
            }
            ResourceCommand::DestroyFrameBuffer(h) => {
                if let Some(fb) = take(&mut self.frame_buffers, h.idx()) {
                    release_frame_buffer(ctx, fb);
                }
            }
            ResourceCommand::DestroyUniform(h) => self.uniforms.destroy(h),
        }
        Ok(())
    }

    fn create_shader<D: NativeDevice>(&self, device: &D, mem: &[u8]) -> Result<ShaderEntry, ResourceError> {
        let binary = ShaderBinary::parse(mem).map_err(ResourceError::Shader)?;
        let module = device
            .create_shader_module(&binary.code, binary.stage.into_native())
            .map_err(ResourceError::Native)?;

        let mut constants = Vec::new();
        let mut slots = Vec::new();
        for uniform in &binary.uniforms {
            if uniform.is_sampler() {
                let stage = uniform.reg_index as usize;
                if stage >= MAX_TEXTURE_SAMPLERS {
                    log::warn!("Sampler '{}' uses stage {stage}, out of range.", uniform.name);
                    continue;
                }
                let ty = if uniform.tex_dimension == 0 {
                    DescriptorType::StorageBuffer
                } else if uniform.tex_format != 0 {
                    DescriptorType::StorageImage
                } else {
                    DescriptorType::CombinedImageSampler
                };
                slots.push((stage as u8, ty));
                continue;
            }
            let source = match PredefinedUniform::from_name(&uniform.name) {
                Some(predefined) => ConstantSource::Predefined(predefined),
                None => match self.uniforms.find(&uniform.name) {
                    Some(handle) => ConstantSource::User(handle),
                    None => {
                        log::warn!("Shader uniform '{}' is not registered; it stays zero.", uniform.name);
                        continue;
                    }
                },
            };
            constants.push(ShaderConstant {
                source,
                offset: uniform.reg_index as u32,
                size: uniform.reg_count as u32 * 16,
            });
        }
        log::debug!(
            "Shader module {module:?} created ({:?}, {} constants, {} slots).",
            binary.stage,
            constants.len(),
            slots.len()
        );
        Ok(ShaderEntry {
            hash: xxh3_64(mem),
            binary,
            module,
            constants,
            slots,
        })
    }

    fn create_program<D: NativeDevice>(
        &self,
        ctx: &mut ResourceContext<'_, D>,
        vsh: ShaderHandle,
        fsh: Option<ShaderHandle>,
    ) -> Result<Option<ProgramEntry>, ResourceError> {
        let Some(vs) = self.shader(vsh) else {
            log::warn!("Program references unknown shader {vsh:?}.");
            return Ok(None);
        };
        let fs = match fsh {
            Some(h) => match self.shader(h) {
                Some(fs) => Some((h, fs)),
                None => {
                    log::warn!("Program references unknown shader {h:?}.");
                    return Ok(None);
                }
            },
            None => None,
        };
        let compute = vs.binary.stage == ShaderStage::Compute;

        let mut uniform_blocks = Vec::new();
        let mut bindings: Vec<DescriptorSetLayoutBinding> = Vec::new();
        let vs_stages = vs.binary.stage.into_native();
        if vs.binary.constant_size > 0 {
            uniform_blocks.push(UniformBlock {
                binding: VS_UNIFORM_BINDING,
                shader: vsh,
                size: vs.binary.constant_size as u32,
            });
            bindings.push(DescriptorSetLayoutBinding {
                binding: VS_UNIFORM_BINDING,
                ty: DescriptorType::UniformBufferDynamic,
                stages: vs_stages,
            });
        }
        if let Some((h, fs)) = fs.filter(|(_, fs)| fs.binary.constant_size > 0) {
            uniform_blocks.push(UniformBlock {
                binding: FS_UNIFORM_BINDING,
                shader: h,
                size: fs.binary.constant_size as u32,
            });
            bindings.push(DescriptorSetLayoutBinding {
                binding: FS_UNIFORM_BINDING,
                ty: DescriptorType::UniformBufferDynamic,
                stages: ShaderStages::FRAGMENT,
            });
        }

        let mut slots: Vec<ResourceSlot> = Vec::new();
        let shader_slots = vs
            .slots
            .iter()
            .map(|s| (*s, vs_stages))
            .chain(fs.iter().flat_map(|(_, fs)| fs.slots.iter().map(|s| (*s, ShaderStages::FRAGMENT))));
        for ((stage, ty), stages) in shader_slots {
            let binding = RESOURCE_BINDING_BASE + stage as u32;
            match bindings.iter_mut().find(|b| b.binding == binding) {
                Some(existing) => {
                    if existing.ty != ty {
                        log::warn!("Stage {stage} is bound as {:?} and {ty:?}; keeping the first.", existing.ty);
                    }
                    existing.stages |= stages;
                }
                None => {
                    bindings.push(DescriptorSetLayoutBinding { binding, ty, stages });
                    slots.push(ResourceSlot { stage, binding, ty });
                }
            }
        }
        bindings.sort_by_key(|b| b.binding);
        slots.sort_by_key(|s| s.binding);

        let mut hasher = Xxh3::new();
        bindings.hash(&mut hasher);
        let layout_key = hasher.finish();
        let (set_layout, pipeline_layout) = match ctx.set_layouts.find(layout_key) {
            Some(layouts) => layouts,
            None => {
                let set_layout = ctx
                    .device
                    .create_descriptor_set_layout(&bindings)
                    .map_err(ResourceError::Native)?;
                let pipeline_layout = ctx
                    .device
                    .create_pipeline_layout(&[set_layout])
                    .map_err(ResourceError::Native)?;
                log::debug!("Descriptor set layout {set_layout:?} created ({} bindings).", bindings.len());
                ctx.set_layouts.add(layout_key, (set_layout, pipeline_layout));
                (set_layout, pipeline_layout)
            }
        };

        let mut hasher = Xxh3::new();
        vs.hash.hash(&mut hasher);
        fs.map(|(_, fs)| fs.hash).hash(&mut hasher);
        Ok(Some(ProgramEntry {
            vsh,
            fsh,
            hash: hasher.finish(),
            compute,
            set_layout,
            pipeline_layout,
            uniform_blocks,
            slots,
        }))
    }

    fn create_frame_buffer<D: NativeDevice>(
        &self,
        ctx: &mut ResourceContext<'_, D>,
        attachments: Vec<Attachment>,
    ) -> Result<Option<FrameBufferEntry>, ResourceError> {
        let mut colors = Vec::new();
        let mut depth = None;
        let mut color_views = Vec::new();
        let mut depth_view = None;
        let mut extent = None;
        for attachment in &attachments {
            let Some(texture) = self.texture(attachment.texture) else {
                log::warn!("Frame buffer attachment {:?} is not a texture.", attachment.texture);
                return Ok(None);
            };
            let format = texture.desc.format;
            let (image, base_mip, layout) = match texture.msaa {
                Some(msaa) => (msaa, 0, attachment_layout(format)),
                None => (texture.image, attachment.mip as u32, texture.layout),
            };
            let layers = attachment.num_layers.max(1) as u32;
            let view = ctx
                .device
                .create_image_view(&ImageViewDesc {
                    image,
                    view_type: if layers > 1 {
                        TextureViewType::D2Array
                    } else {
                        TextureViewType::D2
                    },
                    format,
                    aspect: ImageAspect::of(format),
                    base_mip,
                    mip_count: 1,
                    base_layer: attachment.layer as u32,
                    layer_count: layers,
                })
                .map_err(ResourceError::Native)?;
            let target = TargetAttachment {
                format,
                samples: texture.samples(),
                layout,
            };
            if format.is_depth() {
                if let Some(extra) = depth_view.replace(view) {
                    log::warn!("Frame buffer has more than one depth attachment; using the last.");
                    ctx.release(NativeObject::ImageView(extra));
                }
                depth = Some(target);
            } else {
                color_views.push(view);
                colors.push(target);
            }
            let (w, h, _) = texture.desc.mip_extent(attachment.mip);
            extent = Some(extent.map_or((w, h), |(ew, eh): (u32, u32)| (ew.min(w), eh.min(h))));
        }
        let Some((width, height)) = extent else {
            log::warn!("Frame buffer without attachments ignored.");
            return Ok(None);
        };

        let target = RenderTarget {
            colors,
            depth,
            resolves: Vec::new(),
        };
        let views: Vec<ImageViewId> = color_views.into_iter().chain(depth_view).collect();
        let (render_pass, _) = fetch_render_pass(ctx.device, ctx.render_passes, &target.compatible_desc())
            .map_err(ResourceError::Native)?;
        let layers = attachments.iter().map(|a| a.num_layers.max(1) as u32).min().unwrap_or(1);
        let framebuffer = ctx
            .device
            .create_framebuffer(&FramebufferDesc {
                render_pass,
                attachments: views.clone(),
                width,
                height,
                layers,
            })
            .map_err(ResourceError::Native)?;
        log::debug!("Frame buffer {framebuffer:?} created ({width}x{height}, {} views).", views.len());
        Ok(Some(FrameBufferEntry {
            attachments,
            views,
            framebuffer,
            target,
            width,
            height,
        }))
    }

    /// Resolves multisampled attachments and regenerates mips after a pass.
    pub fn resolve_frame_buffer<D: NativeDevice>(&self, device: &D, cb: CommandBufferId, handle: FrameBufferHandle) {
        let Some(fb) = self.frame_buffer(handle) else {
            return;
        };
        for attachment in fb.attachments.iter().filter(|a| a.resolve) {
            let Some(texture) = self.texture(attachment.texture) else {
                continue;
            };
            if let Some(msaa) = texture.msaa {
                if texture.desc.format.is_depth() {
                    log::trace!("Depth attachment {:?} is not resolved.", attachment.texture);
                } else {
                    record_resolve(device, cb, texture, msaa, attachment, fb.width, fb.height);
                }
            }
            if texture.desc.flags.contains(TextureFlags::AUTO_GEN_MIPS) {
                record_mip_chain(device, cb, texture);
            }
        }
    }

    /// Destroys every native object of every table immediately.
    pub fn destroy_all<D: NativeDevice>(&mut self, device: &D) {
        let buffers = self
            .vertex_buffers
            .drain(..)
            .chain(self.index_buffers.drain(..))
            .chain(self.dynamic_vertex_buffers.drain(..))
            .chain(self.dynamic_index_buffers.drain(..))
            .chain(self.indirect_buffers.drain(..))
            .flatten();
        for buffer in buffers {
            device.destroy(NativeObject::Buffer(buffer.buffer));
        }
        for fb in self.frame_buffers.drain(..).flatten() {
            device.destroy(NativeObject::Framebuffer(fb.framebuffer));
            for view in fb.views {
                device.destroy(NativeObject::ImageView(view));
            }
        }
        for texture in self.textures.drain(..).flatten() {
            device.destroy(NativeObject::ImageView(texture.view));
            device.destroy(NativeObject::Image(texture.image));
            if let Some(msaa) = texture.msaa {
                device.destroy(NativeObject::Image(msaa));
            }
        }
        for shader in self.shaders.drain(..).flatten() {
            device.destroy(NativeObject::ShaderModule(shader.module));
        }
        self.programs.clear();
        self.vertex_layouts.clear();
        self.uniforms = UniformTable::new();
    }
}

fn take<T>(table: &mut [Option<T>], idx: usize) -> Option<T> {
    let taken = table.get_mut(idx).and_then(Option::take);
    if taken.is_none() {
        log::trace!("Destroy of empty resource slot {idx}.");
    }
    taken
}

// --- Buffers ---

fn buffer_usage(base: BufferUsage, flags: BufferFlags) -> BufferUsage {
    let mut usage = base | BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC;
    if flags.intersects(BufferFlags::COMPUTE_READ | BufferFlags::COMPUTE_WRITE) {
        usage |= BufferUsage::STORAGE;
    }
    if flags.contains(BufferFlags::DRAW_INDIRECT) {
        usage |= BufferUsage::INDIRECT;
    }
    usage
}

fn create_buffer<D: NativeDevice>(
    ctx: &mut ResourceContext<'_, D>,
    size: u64,
    base: BufferUsage,
    layout: VertexLayoutHandle,
    flags: BufferFlags,
) -> Result<BufferEntry, NativeError> {
    let size = size.max(1);
    let buffer = ctx.device.create_buffer(&BufferDesc {
        size,
        usage: buffer_usage(base, flags),
        location: MemoryLocation::DeviceLocal,
    })?;
    log::debug!("Buffer {buffer:?} created ({size} bytes).");
    Ok(BufferEntry {
        buffer,
        size,
        layout,
        flags,
    })
}

fn replace_buffer<D: NativeDevice>(ctx: &mut ResourceContext<'_, D>, slot: &mut Option<BufferEntry>, entry: BufferEntry) {
    if let Some(old) = slot.replace(entry) {
        ctx.release(NativeObject::Buffer(old.buffer));
    }
}

fn destroy_buffer<D: NativeDevice>(ctx: &mut ResourceContext<'_, D>, entry: Option<BufferEntry>) {
    if let Some(entry) = entry {
        ctx.release(NativeObject::Buffer(entry.buffer));
    }
}

fn update_dynamic_buffer<D: NativeDevice>(
    ctx: &mut ResourceContext<'_, D>,
    slot: &mut Option<BufferEntry>,
    base: BufferUsage,
    offset: u64,
    data: &[u8],
) -> Result<(), NativeError> {
    let Some(current) = *slot else {
        log::warn!("Update of unknown dynamic buffer ignored.");
        return Ok(());
    };
    let end = offset + data.len() as u64;
    let mut data = data;
    if end > current.size {
        if current.flags.contains(BufferFlags::ALLOW_RESIZE) {
            let grown = create_buffer(ctx, end, base, current.layout, current.flags)?;
            ctx.record(GpuCommand::CopyBuffer {
                src: current.buffer,
                dst: grown.buffer,
                regions: vec![BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: current.size.min(offset),
                }],
            });
            log::debug!("Dynamic buffer grown from {} to {end} bytes.", current.size);
            replace_buffer(ctx, slot, grown);
        } else {
            let fits = current.size.saturating_sub(offset) as usize;
            log::warn!(
                "Dynamic buffer update of {} bytes at {offset} truncated to {fits} (size {}).",
                data.len(),
                current.size
            );
            data = &data[..fits.min(data.len())];
        }
    }
    let target = slot.map_or(current.buffer, |e| e.buffer);
    ctx.upload_buffer(target, offset, data)
}

// --- Textures ---

fn create_texture<D: NativeDevice>(
    ctx: &mut ResourceContext<'_, D>,
    desc: TextureDesc,
    mem: Option<&[u8]>,
) -> Result<TextureEntry, NativeError> {
    let layers = desc.array_layers();
    let image = ctx.device.create_image(&ImageDesc {
        format: desc.format,
        width: desc.width.max(1) as u32,
        height: desc.height.max(1) as u32,
        depth: desc.depth.max(1) as u32,
        mip_levels: desc.num_mips.max(1) as u32,
        array_layers: layers,
        samples: 1,
        usage: image_usage(&desc),
        cube: desc.cube_map,
    })?;
    let view = match ctx.device.create_image_view(&ImageViewDesc {
        image,
        view_type: desc.view_type(),
        format: desc.format,
        aspect: sampled_aspect(desc.format),
        base_mip: 0,
        mip_count: desc.num_mips.max(1) as u32,
        base_layer: 0,
        layer_count: layers,
    }) {
        Ok(view) => view,
        Err(err) => {
            ctx.release(NativeObject::Image(image));
            return Err(err);
        }
    };
    let samples = desc.flags.msaa_samples();
    let msaa = if desc.flags.is_render_target() && samples > 1 {
        let msaa = ctx.device.create_image(&ImageDesc {
            format: desc.format,
            width: desc.width.max(1) as u32,
            height: desc.height.max(1) as u32,
            depth: 1,
            mip_levels: 1,
            array_layers: layers,
            samples,
            usage: attachment_usage(desc.format) | ImageUsage::TRANSFER_SRC,
            cube: false,
        });
        match msaa {
            Ok(msaa) => Some(msaa),
            Err(err) => {
                ctx.release(NativeObject::ImageView(view));
                ctx.release(NativeObject::Image(image));
                return Err(err);
            }
        }
    } else {
        None
    };

    let texture = TextureEntry {
        layout: resting_layout(&desc),
        desc,
        image,
        view,
        msaa,
    };
    let aspect = ImageAspect::of(texture.desc.format);
    let mips = texture.desc.num_mips.max(1) as u32;
    let whole = |old, new| barrier(image, aspect, (0, mips), (0, layers), old, new);

    match mem.filter(|m| !m.is_empty()) {
        Some(data) => {
            let (src, base) = ctx.stage(data)?;
            let regions = upload_regions(&texture.desc, base, data.len() as u64);
            transition(
                ctx.device,
                ctx.cb,
                PipelineStage::TOP,
                PipelineStage::TRANSFER,
                vec![whole(ImageLayout::Undefined, ImageLayout::TransferDst)],
            );
            ctx.record(GpuCommand::CopyBufferToImage {
                src,
                dst: image,
                dst_layout: ImageLayout::TransferDst,
                regions,
            });
            ctx.uploads += 1;
            transition(
                ctx.device,
                ctx.cb,
                PipelineStage::TRANSFER,
                PipelineStage::ALL_COMMANDS,
                vec![whole(ImageLayout::TransferDst, texture.layout)],
            );
            if texture.desc.flags.contains(TextureFlags::AUTO_GEN_MIPS) && texture.desc.num_mips > 1 {
                record_mip_chain(ctx.device, ctx.cb, &texture);
            }
        }
        None => transition(
            ctx.device,
            ctx.cb,
            PipelineStage::TOP,
            PipelineStage::ALL_COMMANDS,
            vec![whole(ImageLayout::Undefined, texture.layout)],
        ),
    }
    if let Some(msaa) = msaa {
        let layout = attachment_layout(texture.desc.format);
        transition(
            ctx.device,
            ctx.cb,
            PipelineStage::TOP,
            PipelineStage::ALL_COMMANDS,
            vec![barrier(msaa, aspect, (0, 1), (0, layers), ImageLayout::Undefined, layout)],
        );
    }
    log::debug!(
        "Texture {image:?} created ({}x{}x{}, {} mips, {} layers, {:?}).",
        texture.desc.width,
        texture.desc.height,
        texture.desc.depth,
        mips,
        layers,
        texture.desc.format
    );
    Ok(texture)
}

/// Copy regions of tightly packed texture data: every mip of layer 0, then
/// every mip of layer 1, and so on. Regions past `len` are skipped.
fn upload_regions(desc: &TextureDesc, base: u64, len: u64) -> Vec<BufferImageCopy> {
    let aspect = sampled_aspect(desc.format);
    let mut regions = Vec::new();
    let mut offset = 0u64;
    'layers: for layer in 0..desc.array_layers() {
        for mip in 0..desc.num_mips.max(1) {
            let size = desc.mip_size(mip) as u64;
            if offset + size > len {
                log::warn!("Texture data ends at {len} bytes; layer {layer} mip {mip} and later are not uploaded.");
                break 'layers;
            }
            let (w, h, d) = desc.mip_extent(mip);
            regions.push(BufferImageCopy {
                buffer_offset: base + offset,
                buffer_row_length: 0,
                subresource: ImageSubresource {
                    aspect,
                    mip: mip as u32,
                    base_layer: layer,
                    layer_count: 1,
                },
                offset: [0; 3],
                extent: [w, h, d],
            });
            offset += size;
        }
    }
    regions
}

fn update_texture<D: NativeDevice>(
    ctx: &mut ResourceContext<'_, D>,
    texture: &TextureEntry,
    region: &TextureRegion,
    mem: &[u8],
) -> Result<(), NativeError> {
    let desc = &texture.desc;
    let (mw, mh, md) = desc.mip_extent(region.mip);
    let in_range = region.mip < desc.num_mips.max(1)
        && (region.layer as u32) < desc.array_layers()
        && region.x + region.width <= mw
        && region.y + region.height <= mh
        && region.z + region.depth.max(1) <= md;
    if !in_range {
        log::warn!("Texture update {region:?} is out of range; ignored.");
        return Ok(());
    }
    let (src, offset) = ctx.stage(mem)?;
    let bpp = desc.format.bytes_per_pixel().max(1);
    let aspect = sampled_aspect(desc.format);
    let range = barrier(
        texture.image,
        aspect,
        (region.mip as u32, 1),
        (region.layer as u32, 1),
        texture.layout,
        ImageLayout::TransferDst,
    );
    transition(
        ctx.device,
        ctx.cb,
        PipelineStage::ALL_COMMANDS,
        PipelineStage::TRANSFER,
        vec![range],
    );
    ctx.record(GpuCommand::CopyBufferToImage {
        src,
        dst: texture.image,
        dst_layout: ImageLayout::TransferDst,
        regions: vec![BufferImageCopy {
            buffer_offset: offset,
            buffer_row_length: if region.pitch == 0 { 0 } else { region.pitch / bpp },
            subresource: ImageSubresource {
                aspect,
                mip: region.mip as u32,
                base_layer: region.layer as u32,
                layer_count: 1,
            },
            offset: [region.x, region.y, region.z],
            extent: [region.width, region.height, region.depth.max(1)],
        }],
    });
    ctx.uploads += 1;
    transition(
        ctx.device,
        ctx.cb,
        PipelineStage::TRANSFER,
        PipelineStage::ALL_COMMANDS,
        vec![ImageBarrier {
            old_layout: ImageLayout::TransferDst,
            new_layout: texture.layout,
            ..range
        }],
    );
    Ok(())
}

fn release_texture<D: NativeDevice>(ctx: &mut ResourceContext<'_, D>, handle: TextureHandle, texture: TextureEntry) {
    for view in ctx.image_views.invalidate_with_parent(handle.0) {
        ctx.release(NativeObject::ImageView(view));
    }
    ctx.release(NativeObject::ImageView(texture.view));
    ctx.release(NativeObject::Image(texture.image));
    if let Some(msaa) = texture.msaa {
        ctx.release(NativeObject::Image(msaa));
    }
}

fn release_frame_buffer<D: NativeDevice>(ctx: &mut ResourceContext<'_, D>, fb: FrameBufferEntry) {
    ctx.release(NativeObject::Framebuffer(fb.framebuffer));
    for view in fb.views {
        ctx.release(NativeObject::ImageView(view));
    }
}

fn record_resolve<D: NativeDevice>(
    device: &D,
    cb: CommandBufferId,
    texture: &TextureEntry,
    msaa: ImageId,
    attachment: &Attachment,
    width: u32,
    height: u32,
) {
    let layers = attachment.num_layers.max(1) as u32;
    let layer = attachment.layer as u32;
    let mip = attachment.mip as u32;
    transition(
        device,
        cb,
        PipelineStage::COLOR_ATTACHMENT_OUTPUT,
        PipelineStage::TRANSFER,
        vec![
            barrier(
                msaa,
                ImageAspect::Color,
                (0, 1),
                (layer, layers),
                ImageLayout::ColorAttachment,
                ImageLayout::TransferSrc,
            ),
            barrier(
                texture.image,
                ImageAspect::Color,
                (mip, 1),
                (layer, layers),
                texture.layout,
                ImageLayout::TransferDst,
            ),
        ],
    );
    device.record(
        cb,
        GpuCommand::ResolveImage {
            src: msaa,
            dst: texture.image,
            region: ImageCopy {
                src: ImageSubresource {
                    aspect: ImageAspect::Color,
                    mip: 0,
                    base_layer: layer,
                    layer_count: layers,
                },
                src_offset: [0; 3],
                dst: ImageSubresource {
                    aspect: ImageAspect::Color,
                    mip,
                    base_layer: layer,
                    layer_count: layers,
                },
                dst_offset: [0; 3],
                extent: [width, height, 1],
            },
        },
    );
    transition(
        device,
        cb,
        PipelineStage::TRANSFER,
        PipelineStage::ALL_COMMANDS,
        vec![
            barrier(
                msaa,
                ImageAspect::Color,
                (0, 1),
                (layer, layers),
                ImageLayout::TransferSrc,
                ImageLayout::ColorAttachment,
            ),
            barrier(
                texture.image,
                ImageAspect::Color,
                (mip, 1),
                (layer, layers),
                ImageLayout::TransferDst,
                texture.layout,
            ),
        ],
    );
}

/// Records the pipeline barrier that makes uploads visible to later work.
pub fn finish_uploads<D: NativeDevice>(device: &D, cb: CommandBufferId) {
    transition(device, cb, PipelineStage::TRANSFER, PipelineStage::ALL_COMMANDS, Vec::new());
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::headless::{HeadlessDevice, ObjectKind};
    use prism_core::renderer::api::command::Attachment;
    use prism_core::renderer::api::resource::{
        Attrib, AttribType, IndexBufferHandle, TextureDesc, UniformHandle, UniformType,
        VertexBufferHandle,
    };
    use prism_core::renderer::api::shader::{ShaderUniform, UNIFORM_FRAGMENT_BIT, UNIFORM_SAMPLER_BIT};
    use prism_core::Memory;

    struct Fixture {
        device: HeadlessDevice,
        queue: CommandQueue,
        staging: ScratchBuffer,
        render_passes: StateCache<RenderPassId>,
        set_layouts: StateCache<(DescriptorSetLayoutId, PipelineLayoutId)>,
        image_views: LruCache<ImageViewId>,
        stats: FrameStats,
        resources: Resources,
    }

    impl Fixture {
        fn new() -> Self {
            let device = HeadlessDevice::new();
            let mut guard = InitGuard::new(&device);
            let queue = CommandQueue::new(&mut guard, 2, 4).unwrap();
            let staging = ScratchBuffer::new(&mut guard, 4096, BufferUsage::TRANSFER_SRC).unwrap();
            guard.commit();
            Self {
                device,
                queue,
                staging,
                render_passes: StateCache::new(),
                set_layouts: StateCache::new(),
                image_views: LruCache::new(8),
                stats: FrameStats::default(),
                resources: Resources::new(),
            }
        }

        fn run(&mut self, commands: Vec<ResourceCommand>) -> Vec<GpuCommand> {
            let cb = self.queue.alloc(&self.device).unwrap();
            let mut ctx = ResourceContext {
                device: &self.device,
                cb,
                staging: &mut self.staging,
                queue: &mut self.queue,
                render_passes: &mut self.render_passes,
                set_layouts: &mut self.set_layouts,
                image_views: &mut self.image_views,
                stats: &mut self.stats,
                uploads: 0,
            };
            for command in commands {
                self.resources.execute(&mut ctx, command).unwrap();
            }
            self.queue.kick(&self.device, true).unwrap();
            self.staging.reset();
            self.device.last_submission().unwrap().commands
        }
    }

    fn shader(stage: ShaderStage, uniforms: Vec<ShaderUniform>, constant_size: u16) -> Memory {
        let binary = ShaderBinary {
            stage,
            version: prism_core::renderer::api::shader::SHADER_CONTAINER_VERSION,
            hash_in: 0,
            hash_out: 0,
            uniforms,
            code: vec![0x03, 0x02, 0x23, 0x07],
            attributes: vec![Attrib::Position],
            constant_size,
        };
        let mut bytes = Vec::new();
        binary.write_to(&mut bytes).unwrap();
        Memory::from_vec(bytes)
    }

    fn uniform(name: &str, ty: UniformType, flags: u8, reg_index: u16, tex_dimension: u8) -> ShaderUniform {
        ShaderUniform {
            name: name.to_string(),
            ty,
            flags,
            num: 1,
            reg_index,
            reg_count: 4,
            tex_component: 0,
            tex_dimension,
            tex_format: 0,
        }
    }

    #[test]
    fn static_buffers_upload_through_staging() {
        let mut f = Fixture::new();
        let layout = VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .end();
        let commands = f.run(vec![
            ResourceCommand::CreateVertexLayout {
                handle: VertexLayoutHandle(0),
                layout,
            },
            ResourceCommand::CreateVertexBuffer {
                handle: VertexBufferHandle(0),
                mem: Memory::copy(&[1; 36]),
                layout: VertexLayoutHandle(0),
                flags: BufferFlags::EMPTY,
            },
            ResourceCommand::CreateIndexBuffer {
                handle: IndexBufferHandle(0),
                mem: Memory::copy(&[0; 6]),
                flags: BufferFlags::EMPTY,
            },
        ]);

        let copies = commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::CopyBuffer { .. }))
            .count();
        assert_eq!(copies, 2);
        let vb = f.resources.buffer(VertexBufferHandle(0).into()).unwrap();
        assert_eq!(vb.size, 36);
        assert_eq!(vb.layout, VertexLayoutHandle(0));
        assert!(f.resources.vertex_layout(VertexLayoutHandle(0)).is_some());
        assert!(f.resources.buffer(BufferRef::TransientVertex).is_none());
    }

    #[test]
    fn programs_share_layouts_by_binding_signature() {
        let mut f = Fixture::new();
        let vs = shader(
            ShaderStage::Vertex,
            vec![uniform("u_modelViewProj", UniformType::Mat4, 0, 0, 0)],
            64,
        );
        let fs = shader(
            ShaderStage::Fragment,
            vec![
                uniform("u_tint", UniformType::Vec4, UNIFORM_FRAGMENT_BIT, 0, 0),
                uniform(
                    "s_albedo",
                    UniformType::Sampler,
                    UNIFORM_FRAGMENT_BIT | UNIFORM_SAMPLER_BIT,
                    0,
                    2,
                ),
            ],
            16,
        );
        f.run(vec![
            ResourceCommand::CreateUniform {
                handle: UniformHandle(0),
                name: "u_tint".to_string(),
                ty: UniformType::Vec4,
                num: 1,
            },
            ResourceCommand::CreateShader {
                handle: ShaderHandle(0),
                mem: vs,
            },
            ResourceCommand::CreateShader {
                handle: ShaderHandle(1),
                mem: fs,
            },
            ResourceCommand::CreateProgram {
                handle: ProgramHandle(0),
                vsh: ShaderHandle(0),
                fsh: Some(ShaderHandle(1)),
            },
            ResourceCommand::CreateProgram {
                handle: ProgramHandle(1),
                vsh: ShaderHandle(0),
                fsh: Some(ShaderHandle(1)),
            },
        ]);

        let a = f.resources.program(ProgramHandle(0)).unwrap();
        let b = f.resources.program(ProgramHandle(1)).unwrap();
        assert_eq!(a.set_layout, b.set_layout);
        assert_eq!(a.hash, b.hash);
        assert_eq!(f.device.created(ObjectKind::DescriptorSetLayout), 1);
        assert_eq!(
            a.uniform_blocks.iter().map(|u| u.binding).collect::<Vec<_>>(),
            vec![VS_UNIFORM_BINDING, FS_UNIFORM_BINDING]
        );
        assert_eq!(
            a.slots,
            vec![ResourceSlot {
                stage: 0,
                binding: RESOURCE_BINDING_BASE,
                ty: DescriptorType::CombinedImageSampler,
            }]
        );
        let fs = f.resources.shader(ShaderHandle(1)).unwrap();
        assert_eq!(fs.constants[0].source, ConstantSource::User(UniformHandle(0)));
    }

    #[test]
    fn textures_rest_in_their_layout_and_frame_buffers_own_views() {
        let mut f = Fixture::new();
        let color = TextureDesc::new_2d(64, 32, false, 1, TextureFormat::Rgba8, TextureFlags::RT);
        let depth = TextureDesc::new_2d(64, 32, false, 1, TextureFormat::D24S8, TextureFlags::RT_WRITE_ONLY);
        let commands = f.run(vec![
            ResourceCommand::CreateTexture {
                handle: TextureHandle(0),
                desc: color,
                mem: None,
            },
            ResourceCommand::CreateTexture {
                handle: TextureHandle(1),
                desc: depth,
                mem: None,
            },
            ResourceCommand::CreateFrameBuffer {
                handle: FrameBufferHandle(0),
                attachments: vec![Attachment::new(TextureHandle(0)), Attachment::new(TextureHandle(1))],
            },
        ]);

        let transitions: Vec<ImageLayout> = commands
            .iter()
            .filter_map(|c| match c {
                GpuCommand::PipelineBarrier { image_barriers, .. } => image_barriers.first().map(|b| b.new_layout),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![ImageLayout::ShaderReadOnly, ImageLayout::DepthStencilAttachment]
        );

        let fb = f.resources.frame_buffer(FrameBufferHandle(0)).unwrap();
        assert_eq!((fb.width, fb.height), (64, 32));
        assert_eq!(fb.views.len(), 2);
        assert_eq!(fb.target.colors.len(), 1);
        assert!(fb.target.depth.is_some());
        assert!(fb.uses_texture(TextureHandle(1)));
        assert_eq!(f.render_passes.len(), 1);

        f.run(vec![
            ResourceCommand::DestroyFrameBuffer(FrameBufferHandle(0)),
            ResourceCommand::DestroyTexture(TextureHandle(0)),
        ]);
        f.queue.finish(&f.device, true).unwrap();
        // Texture 1's image and default view remain.
        assert_eq!(f.device.live(ObjectKind::Image), 1);
        assert_eq!(f.device.live(ObjectKind::ImageView), 1);
        assert_eq!(f.device.live(ObjectKind::Framebuffer), 0);
    }

    #[test]
    fn texture_data_is_split_per_mip() {
        let desc = TextureDesc::new_2d(4, 4, true, 1, TextureFormat::Rgba8, TextureFlags::EMPTY);
        assert_eq!(desc.num_mips, 3);
        let regions = upload_regions(&desc, 128, 64 + 16 + 4);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[1].buffer_offset, 128 + 64);
        assert_eq!(regions[2].extent, [1, 1, 1]);

        let partial = upload_regions(&desc, 0, 70);
        assert_eq!(partial.len(), 1);
    }

    #[test]
    fn dynamic_buffers_grow_when_allowed() {
        let mut f = Fixture::new();
        f.run(vec![
            ResourceCommand::CreateDynamicIndexBuffer {
                handle: prism_core::renderer::api::resource::DynamicIndexBufferHandle(0),
                size: 8,
                flags: BufferFlags::ALLOW_RESIZE,
            },
            ResourceCommand::UpdateDynamicIndexBuffer {
                handle: prism_core::renderer::api::resource::DynamicIndexBufferHandle(0),
                offset: 4,
                mem: Memory::copy(&[9; 12]),
            },
        ]);
        let entry = f
            .resources
            .buffer(prism_core::renderer::api::resource::DynamicIndexBufferHandle(0).into())
            .unwrap();
        assert_eq!(entry.size, 16);
    }
}
