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

//! Graphics and compute pipeline lookup.
//!
//! A pipeline is selected by the render state bits that are not dynamic
//! state, the stencil state without reference values, the program, the
//! vertex layouts of the bound streams, the instance stride and the render
//! pass it is used in. Cache misses consult the host's persisted pipeline
//! cache before building.

use super::command_queue::CommandQueue;
use super::conversions::{instance_attributes, vertex_attributes, write_mask};
use super::state_cache::StateCache;
use prism_core::renderer::api::core::{FrameStats, MAX_VERTEX_STREAMS};
use prism_core::renderer::api::native::{
    ComputePipelineDesc, GraphicsPipelineDesc, NativeObject, PipelineId, PipelineLayoutId,
    RenderPassId, ShaderModuleId, VertexBindingDesc,
};
use prism_core::renderer::api::pipeline::{stencil_pipeline_bits, unpack_stencil, StateFlags};
use prism_core::renderer::api::resource::{Attrib, VertexLayout};
use prism_core::renderer::{Callback, NativeDevice, NativeError};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// What a draw needs from its pipeline.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipelineInputs<'a> {
    /// Render state.
    pub state: StateFlags,
    /// Packed front and back stencil state.
    pub stencil: u64,
    /// Content hash of the program.
    pub program_hash: u64,
    /// Pipeline layout of the program.
    pub layout: PipelineLayoutId,
    /// Vertex shader module.
    pub vertex: ShaderModuleId,
    /// Fragment shader module.
    pub fragment: Option<ShaderModuleId>,
    /// Attributes the vertex shader consumes.
    pub attributes: &'a [Attrib],
    /// Layouts of the bound vertex streams, by stream slot.
    pub streams: [Option<&'a VertexLayout>; MAX_VERTEX_STREAMS],
    /// Stride of the instance data, zero without instance data.
    pub instance_stride: u16,
    /// Render pass compatible with the target.
    pub render_pass: RenderPassId,
    /// Hash of the compatible render pass description.
    pub render_pass_hash: u64,
    /// Sample count of the target.
    pub samples: u8,
    /// Color attachments of the target.
    pub color_attachments: u32,
    /// Rasterize as lines.
    pub wireframe: bool,
    /// Clamp depth instead of clipping.
    pub depth_clamp: bool,
}

impl GraphicsPipelineInputs<'_> {
    /// Stable 64-bit key of the pipeline.
    pub fn key(&self) -> u64 {
        let mut hasher = Xxh3::new();
        self.state.pipeline_bits().hash(&mut hasher);
        stencil_pipeline_bits(self.stencil).hash(&mut hasher);
        self.program_hash.hash(&mut hasher);
        for layout in &self.streams {
            layout.map_or(0, |l| l.hash()).hash(&mut hasher);
        }
        self.instance_stride.hash(&mut hasher);
        self.render_pass_hash.hash(&mut hasher);
        self.samples.hash(&mut hasher);
        self.color_attachments.hash(&mut hasher);
        self.wireframe.hash(&mut hasher);
        self.depth_clamp.hash(&mut hasher);
        hasher.finish()
    }

    /// The full pipeline description.
    ///
    /// Bound streams get consecutive bindings in slot order; instance data
    /// takes the binding after the last stream.
    pub fn desc(&self) -> GraphicsPipelineDesc {
        let mut bindings = Vec::new();
        let mut attributes = Vec::new();
        let mut assigned = 0u32;
        for layout in self.streams.iter().flatten() {
            let binding = bindings.len() as u32;
            bindings.push(VertexBindingDesc {
                binding,
                stride: layout.stride() as u32,
                per_instance: false,
            });
            attributes.extend(vertex_attributes(layout, binding, self.attributes, &mut assigned));
        }
        if self.instance_stride > 0 {
            let binding = bindings.len() as u32;
            bindings.push(VertexBindingDesc {
                binding,
                stride: self.instance_stride as u32,
                per_instance: true,
            });
            attributes.extend(instance_attributes(self.instance_stride, binding));
        }

        let state = self.state;
        let (front, back) = unpack_stencil(self.stencil);
        GraphicsPipelineDesc {
            layout: self.layout,
            render_pass: self.render_pass,
            vertex: self.vertex,
            fragment: self.fragment,
            bindings,
            attributes,
            topology: state.topology(),
            cull: state.cull_mode(),
            front_ccw: state.contains(StateFlags::FRONT_CCW),
            depth_test: state.depth_test(),
            depth_write: state.contains(StateFlags::WRITE_Z),
            depth_clamp: self.depth_clamp,
            wireframe: self.wireframe,
            conservative: state.contains(StateFlags::CONSERVATIVE_RASTER),
            line_aa: state.contains(StateFlags::LINEAA),
            blend: state.blend(),
            write_mask: write_mask(state),
            alpha_to_coverage: state.contains(StateFlags::BLEND_ALPHA_TO_COVERAGE),
            samples: self.samples.max(1),
            stencil_front: front.decode(),
            stencil_back: back.decode(),
            color_attachments: self.color_attachments,
        }
    }
}

fn compute_key(program_hash: u64) -> u64 {
    let mut hasher = Xxh3::new();
    "compute".hash(&mut hasher);
    program_hash.hash(&mut hasher);
    hasher.finish()
}

/// Graphics and compute pipelines keyed by [`GraphicsPipelineInputs::key`].
#[derive(Debug, Default)]
pub struct PipelineCache {
    pipelines: StateCache<PipelineId>,
}

impl PipelineCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns `true` if no pipeline is cached.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Returns the pipeline for `inputs`, building it on a miss.
    ///
    /// ## Arguments
    /// * `callback` - Host cache consulted before building and written after.
    /// * `stats` - Counts hits and creations.
    ///
    /// ## Errors
    /// * `NativeError` - The device refused to create the pipeline.
    pub fn fetch_graphics<D: NativeDevice>(
        &mut self,
        device: &D,
        callback: &dyn Callback,
        inputs: &GraphicsPipelineInputs<'_>,
        stats: &mut FrameStats,
    ) -> Result<PipelineId, NativeError> {
        let key = inputs.key();
        if let Some(pipeline) = self.pipelines.find(key) {
            stats.pipeline_cache_hits += 1;
            return Ok(pipeline);
        }
        let blob = callback.cache_read(key);
        let pipeline = device.create_graphics_pipeline(&inputs.desc(), blob.as_deref())?;
        if blob.is_none() {
            if let Some(data) = device.pipeline_cache_data(pipeline) {
                callback.cache_write(key, &data);
            }
        }
        log::debug!(
            "Graphics pipeline {pipeline:?} created for key {key:#018x}{}.",
            if blob.is_some() { " from the host cache" } else { "" }
        );
        stats.pipelines_created += 1;
        self.pipelines.add(key, pipeline);
        Ok(pipeline)
    }

    /// Returns the compute pipeline of a program, building it on a miss.
    pub fn fetch_compute<D: NativeDevice>(
        &mut self,
        device: &D,
        program_hash: u64,
        layout: PipelineLayoutId,
        module: ShaderModuleId,
        stats: &mut FrameStats,
    ) -> Result<PipelineId, NativeError> {
        let key = compute_key(program_hash);
        if let Some(pipeline) = self.pipelines.find(key) {
            stats.pipeline_cache_hits += 1;
            return Ok(pipeline);
        }
        let pipeline = device.create_compute_pipeline(&ComputePipelineDesc { layout, module })?;
        log::debug!("Compute pipeline {pipeline:?} created.");
        stats.pipelines_created += 1;
        self.pipelines.add(key, pipeline);
        Ok(pipeline)
    }

    /// Drops every pipeline; in-flight frames keep theirs until retired.
    pub fn invalidate(&mut self, queue: &mut CommandQueue) {
        let pipelines = self.pipelines.invalidate();
        if !pipelines.is_empty() {
            log::debug!("Invalidated {} pipelines.", pipelines.len());
        }
        for pipeline in pipelines {
            queue.release(NativeObject::Pipeline(pipeline));
        }
    }

    /// Destroys every pipeline immediately.
    pub fn destroy<D: NativeDevice>(&mut self, device: &D) {
        for pipeline in self.pipelines.invalidate() {
            device.destroy(NativeObject::Pipeline(pipeline));
        }
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::explicit::render_pass::{fetch_render_pass, RenderTarget, TargetAttachment};
    use crate::graphics::headless::{HeadlessDevice, ObjectKind};
    use ahash::AHashMap;
    use prism_core::renderer::api::native::ImageLayout;
    use prism_core::renderer::api::pipeline::{CompareOp, StencilFlags, StencilOp, pack_stencil};
    use prism_core::renderer::api::resource::{AttribType, TextureFormat};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct MemoryCache {
        blobs: Mutex<AHashMap<u64, Vec<u8>>>,
    }

    impl Callback for MemoryCache {
        fn fatal(&self, _code: prism_core::renderer::Fatal, message: &str) {
            panic!("unexpected fatal error: {message}");
        }

        fn cache_read(&self, hash: u64) -> Option<Vec<u8>> {
            self.blobs.lock().unwrap().get(&hash).cloned()
        }

        fn cache_write(&self, hash: u64, data: &[u8]) {
            self.blobs.lock().unwrap().insert(hash, data.to_vec());
        }
    }

    fn layout() -> VertexLayout {
        VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Color0, 4, AttribType::Uint8, true, false)
            .end()
    }

    fn inputs<'a>(layout: &'a VertexLayout, render_pass: RenderPassId) -> GraphicsPipelineInputs<'a> {
        GraphicsPipelineInputs {
            state: StateFlags::DEFAULT,
            stencil: 0,
            program_hash: 7,
            layout: PipelineLayoutId(1),
            vertex: ShaderModuleId(2),
            fragment: Some(ShaderModuleId(3)),
            attributes: &[Attrib::Position, Attrib::Color0],
            streams: [Some(layout), None, None, None],
            instance_stride: 0,
            render_pass,
            render_pass_hash: 11,
            samples: 1,
            color_attachments: 1,
            wireframe: false,
            depth_clamp: false,
        }
    }

    fn color_pass(device: &HeadlessDevice) -> RenderPassId {
        let target = RenderTarget {
            colors: vec![TargetAttachment {
                format: TextureFormat::Rgba8,
                samples: 1,
                layout: ImageLayout::ColorAttachment,
            }],
            depth: None,
            resolves: Vec::new(),
        };
        fetch_render_pass(device, &mut StateCache::new(), &target.compatible_desc())
            .unwrap()
            .0
    }

    #[test]
    fn dynamic_state_does_not_change_the_key() {
        let layout = layout();
        let base = inputs(&layout, RenderPassId(1));
        let with_ref = GraphicsPipelineInputs {
            state: StateFlags::DEFAULT | StateFlags::alpha_ref(128),
            // Reference values only, the stencil test stays disabled.
            stencil: 0x0000_0001_0000_0001,
            ..base
        };
        assert_eq!(base.key(), with_ref.key());

        let blended = GraphicsPipelineInputs {
            state: StateFlags::DEFAULT | StateFlags::BLEND_ALPHA,
            ..base
        };
        assert_ne!(base.key(), blended.key());
    }

    #[test]
    fn desc_maps_streams_instances_and_stencil() {
        let layout = layout();
        let stencil = StencilFlags::face(
            CompareOp::Equal,
            1,
            0xff,
            StencilOp::Keep,
            StencilOp::Keep,
            StencilOp::Replace,
        );
        let desc = GraphicsPipelineInputs {
            instance_stride: 32,
            stencil: pack_stencil(stencil, StencilFlags::EMPTY),
            ..inputs(&layout, RenderPassId(1))
        }
        .desc();

        assert_eq!(desc.bindings.len(), 2);
        assert!(desc.bindings[1].per_instance);
        assert_eq!(desc.bindings[0].stride, layout.stride() as u32);
        // Two stream attributes, two instance vec4s.
        assert_eq!(desc.attributes.len(), 4);
        assert_eq!(desc.depth_test, Some(CompareOp::Less));
        assert_eq!(desc.write_mask, 0xf);
        let front = desc.stencil_front.unwrap();
        assert_eq!(front.pass, StencilOp::Replace);
        assert_eq!(desc.stencil_back, desc.stencil_front);
    }

    #[test]
    fn pipelines_are_built_once_and_persisted() {
        let device = HeadlessDevice::new();
        let callback = MemoryCache::default();
        let render_pass = color_pass(&device);
        let layout = layout();
        let inputs = inputs(&layout, render_pass);
        let mut stats = FrameStats::default();

        let mut cache = PipelineCache::new();
        let first = cache.fetch_graphics(&device, &callback, &inputs, &mut stats).unwrap();
        let second = cache.fetch_graphics(&device, &callback, &inputs, &mut stats).unwrap();
        assert_eq!(first, second);
        assert_eq!(stats.pipelines_created, 1);
        assert_eq!(stats.pipeline_cache_hits, 1);
        assert_eq!(device.created(ObjectKind::Pipeline), 1);
        assert_eq!(callback.blobs.lock().unwrap().len(), 1);

        // A fresh backend finds the blob in the host cache.
        cache.destroy(&device);
        let mut cache = PipelineCache::new();
        cache.fetch_graphics(&device, &callback, &inputs, &mut stats).unwrap();
        assert_eq!(device.pipelines_from_cache(), 1);
        assert_eq!(device.live(ObjectKind::Pipeline), 1);
    }
}
