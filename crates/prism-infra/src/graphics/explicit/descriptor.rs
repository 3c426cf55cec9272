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

//! Descriptor sets, samplers and derived image views.
//!
//! Sets are allocated per frame and keyed by a bind hash covering the
//! program, its resource bindings and the uniform buffer, so identical draws
//! in a frame share one set. They go back to the pool when the frame's slot
//! retires.

use super::command_queue::CommandQueue;
use super::conversions::sampler_desc;
use super::resources::{Defaults, ProgramEntry, Resources, TextureEntry};
use super::staged_init::InitGuard;
use super::state_cache::{LruCache, StateCache};
use ahash::AHashMap;
use prism_core::renderer::api::command::{Binding, RenderBind};
use prism_core::renderer::api::core::FrameStats;
use prism_core::renderer::api::native::{
    BufferId, DescriptorPoolId, DescriptorResource, DescriptorSetId, DescriptorType,
    DescriptorWrite, ImageAspect, ImageLayout, ImageViewDesc, ImageViewId, NativeObject,
    SamplerId,
};
use prism_core::renderer::api::pipeline::SamplerFlags;
use prism_core::renderer::api::resource::{TextureFormat, TextureHandle, TextureViewType};
use prism_core::renderer::{NativeDevice, NativeError};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// Size of the placeholder storage buffer.
const DEFAULT_BUFFER_RANGE: u64 = 16;

/// Outcome of a descriptor lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorBinding {
    /// The set to bind.
    Set(DescriptorSetId),
    /// The program has no bindings.
    NoBindings,
    /// A binding references a resource the backend does not know.
    UnknownResource,
}

/// Returns `true` when every resource slot of `program` refers to something
/// the backend knows. Creates nothing.
pub fn bindings_resolve(resources: &Resources, program: &ProgramEntry, bind: &RenderBind) -> bool {
    program.slots.iter().all(|slot| match (slot.ty, bind.bindings[slot.stage as usize]) {
        (DescriptorType::CombinedImageSampler, Binding::Texture { handle, .. }) => resources.texture(handle).is_some(),
        (DescriptorType::StorageImage, Binding::Image { handle, mip, .. }) => resources
            .texture(handle)
            .is_some_and(|texture| mip < texture.desc.num_mips.max(1)),
        (DescriptorType::StorageBuffer, Binding::Buffer { buffer, .. }) => resources.buffer(buffer).is_some(),
        (
            DescriptorType::CombinedImageSampler | DescriptorType::StorageImage | DescriptorType::StorageBuffer,
            Binding::None,
        ) => true,
        _ => false,
    })
}

/// Borrowed state a lookup resolves bindings against.
#[derive(Debug)]
pub struct DescriptorContext<'a, D: NativeDevice> {
    /// The device.
    pub device: &'a D,
    /// Backend resource tables.
    pub resources: &'a Resources,
    /// Placeholders for unbound slots.
    pub defaults: &'a Defaults,
    /// Derived image views.
    pub image_views: &'a mut LruCache<ImageViewId>,
    /// Deferred release of evicted views and retired sets.
    pub queue: &'a mut CommandQueue,
    /// Anisotropy of anisotropic samplers.
    pub max_anisotropy: f32,
}

impl<D: NativeDevice> DescriptorContext<'_, D> {
    fn cached_view(&mut self, handle: TextureHandle, key: u64, desc: ImageViewDesc) -> Result<ImageViewId, NativeError> {
        if let Some(view) = self.image_views.find(key) {
            return Ok(view);
        }
        let view = self.device.create_image_view(&desc)?;
        log::trace!("Image view {view:?} derived from texture {handle:?}.");
        if let Some(evicted) = self.image_views.add(key, view, handle.0) {
            self.queue.release(NativeObject::ImageView(evicted));
        }
        Ok(view)
    }

    fn storage_view(
        &mut self,
        handle: TextureHandle,
        texture: &TextureEntry,
        mip: u8,
        format: Option<TextureFormat>,
    ) -> Result<ImageViewId, NativeError> {
        let format = format.unwrap_or(texture.desc.format);
        let mut hasher = Xxh3::new();
        ("storage", handle, mip, format).hash(&mut hasher);
        let view_type = match texture.desc.view_type() {
            TextureViewType::Cube => TextureViewType::D2Array,
            other => other,
        };
        self.cached_view(
            handle,
            hasher.finish(),
            ImageViewDesc {
                image: texture.image,
                view_type,
                format,
                aspect: ImageAspect::Color,
                base_mip: mip as u32,
                mip_count: 1,
                base_layer: 0,
                layer_count: texture.desc.array_layers(),
            },
        )
    }

    fn stencil_view(&mut self, handle: TextureHandle, texture: &TextureEntry) -> Result<ImageViewId, NativeError> {
        let mut hasher = Xxh3::new();
        ("stencil", handle).hash(&mut hasher);
        self.cached_view(
            handle,
            hasher.finish(),
            ImageViewDesc {
                image: texture.image,
                view_type: texture.desc.view_type(),
                format: texture.desc.format,
                aspect: ImageAspect::Stencil,
                base_mip: 0,
                mip_count: texture.desc.num_mips.max(1) as u32,
                base_layer: 0,
                layer_count: texture.desc.array_layers(),
            },
        )
    }
}

/// The descriptor pool, per-frame sets and the sampler cache.
#[derive(Debug)]
pub struct DescriptorCache {
    pool: DescriptorPoolId,
    sets: AHashMap<u64, DescriptorSetId>,
    samplers: StateCache<SamplerId>,
}

impl DescriptorCache {
    /// Creates the pool and registers it with the init guard.
    pub fn new<D: NativeDevice>(guard: &mut InitGuard<'_, D>, max_sets: u32) -> Result<Self, NativeError> {
        let pool = guard.device().create_descriptor_pool(max_sets.max(1))?;
        guard.track(NativeObject::DescriptorPool(pool));
        log::debug!("Descriptor pool {pool:?} created ({max_sets} sets).");
        Ok(Self {
            pool,
            sets: AHashMap::new(),
            samplers: StateCache::new(),
        })
    }

    /// Number of sets allocated this frame.
    pub fn frame_sets(&self) -> usize {
        self.sets.len()
    }

    /// Returns the sampler for packed sampler flags, creating it on a miss.
    pub fn sampler<D: NativeDevice>(
        &mut self,
        device: &D,
        flags: SamplerFlags,
        max_anisotropy: f32,
    ) -> Result<SamplerId, NativeError> {
        let flags = flags & SamplerFlags::SAMPLER_BITS_MASK;
        let key = flags.bits() as u64 | ((max_anisotropy > 1.0) as u64) << 32;
        if let Some(sampler) = self.samplers.find(key) {
            return Ok(sampler);
        }
        let sampler = device.create_sampler(&sampler_desc(flags, max_anisotropy))?;
        log::debug!("Sampler {sampler:?} created for {flags:?}.");
        self.samplers.add(key, sampler);
        Ok(sampler)
    }

    /// Returns the set for a program and its bindings, allocating it on the
    /// first use this frame.
    ///
    /// ## Arguments
    /// * `program` - The program being bound.
    /// * `bind` - Texture, image and buffer bindings by stage.
    /// * `uniform_buffer` - Buffer the constant blocks are read from.
    ///
    /// ## Errors
    /// Native failures while creating views, samplers or the set.
    pub fn fetch<D: NativeDevice>(
        &mut self,
        ctx: &mut DescriptorContext<'_, D>,
        program: &ProgramEntry,
        bind: &RenderBind,
        uniform_buffer: BufferId,
        stats: &mut FrameStats,
    ) -> Result<DescriptorBinding, NativeError> {
        if program.uniform_blocks.is_empty() && program.slots.is_empty() {
            return Ok(DescriptorBinding::NoBindings);
        }
        let mut hasher = Xxh3::new();
        program.hash.hash(&mut hasher);
        program.set_layout.hash(&mut hasher);
        for slot in &program.slots {
            bind.bindings[slot.stage as usize].hash(&mut hasher);
        }
        uniform_buffer.hash(&mut hasher);
        for block in &program.uniform_blocks {
            block.size.hash(&mut hasher);
        }
        let key = hasher.finish();
        if let Some(set) = self.sets.get(&key) {
            return Ok(DescriptorBinding::Set(*set));
        }

        let mut writes = Vec::with_capacity(program.uniform_blocks.len() + program.slots.len());
        for block in &program.uniform_blocks {
            writes.push(DescriptorWrite {
                binding: block.binding,
                resource: DescriptorResource::UniformBufferDynamic {
                    buffer: uniform_buffer,
                    range: block.size as u64,
                },
            });
        }
        for slot in &program.slots {
            let binding = bind.bindings[slot.stage as usize];
            let Some(resource) = self.resolve(ctx, slot.ty, binding)? else {
                log::warn!("Stage {} binds an unknown resource ({binding:?}).", slot.stage);
                return Ok(DescriptorBinding::UnknownResource);
            };
            writes.push(DescriptorWrite {
                binding: slot.binding,
                resource,
            });
        }

        let set = ctx.device.allocate_descriptor_set(self.pool, program.set_layout)?;
        ctx.device.update_descriptor_set(set, &writes);
        stats.descriptor_sets_allocated += 1;
        self.sets.insert(key, set);
        Ok(DescriptorBinding::Set(set))
    }

    fn resolve<D: NativeDevice>(
        &mut self,
        ctx: &mut DescriptorContext<'_, D>,
        ty: DescriptorType,
        binding: Binding,
    ) -> Result<Option<DescriptorResource>, NativeError> {
        let defaults = ctx.defaults;
        let resource = match (ty, binding) {
            (DescriptorType::CombinedImageSampler, Binding::Texture { handle, sampler }) => {
                let Some(texture) = ctx.resources.texture(handle) else {
                    return Ok(None);
                };
                let flags = if sampler.contains(SamplerFlags::INTERNAL_DEFAULT) {
                    texture.desc.sampler
                } else {
                    sampler
                };
                let view = if flags.contains(SamplerFlags::SAMPLE_STENCIL) && texture.desc.format.has_stencil() {
                    ctx.stencil_view(handle, texture)?
                } else {
                    texture.view
                };
                DescriptorResource::CombinedImageSampler {
                    view,
                    sampler: self.sampler(ctx.device, flags, ctx.max_anisotropy)?,
                    layout: texture.layout,
                }
            }
            (DescriptorType::StorageImage, Binding::Image { handle, mip, format, .. }) => {
                let Some(texture) = ctx.resources.texture(handle) else {
                    return Ok(None);
                };
                if mip >= texture.desc.num_mips.max(1) {
                    return Ok(None);
                }
                DescriptorResource::StorageImage {
                    view: ctx.storage_view(handle, texture, mip, format)?,
                }
            }
            (DescriptorType::StorageBuffer, Binding::Buffer { buffer, .. }) => {
                let Some(entry) = ctx.resources.buffer(buffer) else {
                    return Ok(None);
                };
                DescriptorResource::StorageBuffer {
                    buffer: entry.buffer,
                    offset: 0,
                    range: entry.size,
                }
            }
            (DescriptorType::CombinedImageSampler, Binding::None) => DescriptorResource::CombinedImageSampler {
                view: defaults.view,
                sampler: defaults.sampler,
                layout: Defaults::LAYOUT,
            },
            (DescriptorType::StorageImage, Binding::None) => DescriptorResource::StorageImage { view: defaults.view },
            (DescriptorType::StorageBuffer, Binding::None) => DescriptorResource::StorageBuffer {
                buffer: defaults.buffer,
                offset: 0,
                range: DEFAULT_BUFFER_RANGE,
            },
            _ => return Ok(None),
        };
        Ok(Some(resource))
    }

    /// Returns this frame's sets to the pool once the frame retires.
    pub fn end_frame(&mut self, queue: &mut CommandQueue) {
        for (_, set) in self.sets.drain() {
            queue.release(NativeObject::DescriptorSet(self.pool, set));
        }
    }

    /// Destroys the samplers and the pool.
    pub fn destroy<D: NativeDevice>(&mut self, device: &D) {
        for sampler in self.samplers.invalidate() {
            device.destroy(NativeObject::Sampler(sampler));
        }
        self.sets.clear();
        device.destroy(NativeObject::DescriptorPool(self.pool));
        self.pool = DescriptorPoolId::NULL;
    }
}
