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

//! The explicit backend: owns the native device and every cache built on it.

use super::command_queue::CommandQueue;
use super::descriptor::DescriptorCache;
use super::pipeline::PipelineCache;
use super::resources::{Defaults, ResourceContext, Resources};
use super::scratch::ScratchBuffer;
use super::staged_init::{InitGuard, InitStage};
use super::state_cache::{LruCache, StateCache};
use super::swap_chain::SwapChain;
use prism_core::renderer::api::command::{Frame, ResourceCommand};
use prism_core::renderer::api::core::{
    Caps, DebugFlags, FrameStats, Init, RendererType, Resolution, MAX_FRAME_BUFFER_ATTACHMENTS, MAX_VIEWS,
};
use prism_core::renderer::api::native::{
    BufferUsage, CommandBufferId, DescriptorSetLayoutId, DeviceLimits, GpuCommand, ImageViewId,
    NativeObject, PipelineLayoutId, RenderPassId,
};
use prism_core::renderer::{
    Callback, Fatal, NativeDevice, NativeError, RenderError, RendererContext, ResourceError,
};
use std::sync::Arc;
use thiserror::Error;

/// Why the explicit backend could not be created.
#[derive(Debug, Error)]
pub enum BackendInitError {
    /// A native object of an init stage could not be created. Everything
    /// created by earlier stages was destroyed again.
    #[error("backend initialization failed at stage {stage:?}: {source}")]
    Stage {
        /// The stage that failed.
        stage: InitStage,
        /// The native failure.
        #[source]
        source: NativeError,
    },
    /// The configuration cannot be honored.
    #[error("invalid renderer configuration: {0}")]
    InvalidConfig(String),
}

fn at(stage: InitStage) -> impl FnOnce(NativeError) -> BackendInitError {
    move |source| BackendInitError::Stage { stage, source }
}

/// Objects built by the init ladder, in stage order.
struct Stages {
    queue: CommandQueue,
    uniform_scratch: Vec<ScratchBuffer>,
    staging: Vec<ScratchBuffer>,
    descriptors: DescriptorCache,
    swap_chain: SwapChain,
    defaults: Defaults,
}

/// A renderer translating frames into commands of a [`NativeDevice`].
///
/// Every native object is owned here and only touched from the thread that
/// calls [`RendererContext::submit`].
#[derive(Debug)]
pub struct ExplicitRenderer<D: NativeDevice> {
    pub(super) device: D,
    pub(super) callback: Arc<dyn Callback>,
    pub(super) device_limits: DeviceLimits,
    pub(super) caps: Caps,
    pub(super) resolution: Resolution,
    pub(super) debug: DebugFlags,
    pub(super) queue: CommandQueue,
    pub(super) uniform_scratch: Vec<ScratchBuffer>,
    pub(super) staging: Vec<ScratchBuffer>,
    pub(super) descriptors: DescriptorCache,
    pub(super) swap_chain: SwapChain,
    pub(super) defaults: Defaults,
    pub(super) resources: Resources,
    pub(super) pipelines: PipelineCache,
    pub(super) render_passes: StateCache<RenderPassId>,
    pub(super) set_layouts: StateCache<(DescriptorSetLayoutId, PipelineLayoutId)>,
    pub(super) image_views: LruCache<ImageViewId>,
    pub(super) stats: FrameStats,
    pub(super) in_render_pass: bool,
    pub(super) device_lost: bool,
    pub(super) shut_down: bool,
}

impl<D: NativeDevice> ExplicitRenderer<D> {
    /// Initializes the backend on `device`.
    ///
    /// Initialization runs in stages (command queue, scratch buffers,
    /// descriptor pool, swap chain, defaults). When a stage fails, the objects
    /// of the earlier stages are destroyed in reverse order before returning.
    ///
    /// ## Arguments
    /// * `device` - The native device. The renderer takes ownership.
    /// * `init` - Back buffer, limits and debug configuration.
    /// * `callback` - Receives fatal errors and persists pipeline caches.
    ///
    /// ## Errors
    /// * `BackendInitError::InvalidConfig` - A limit is zero.
    /// * `BackendInitError::Stage` - A native object could not be created.
    pub fn new(device: D, init: &Init, callback: Arc<dyn Callback>) -> Result<Self, BackendInitError> {
        validate(init)?;
        let device_limits = device.limits();
        let frames_in_flight = init.frames_in_flight();
        let mut render_passes = StateCache::new();

        let stages = {
            let mut guard = InitGuard::new(&device);
            let stages = init_stages(&mut guard, init, &mut render_passes)?;
            guard.commit();
            stages
        };

        let caps = Caps {
            renderer_type: RendererType::Explicit,
            supported: device_limits.supported & init.capabilities,
            max_texture_size: device_limits.max_texture_size,
            max_fb_attachments: device_limits
                .max_color_attachments
                .min(MAX_FRAME_BUFFER_ATTACHMENTS as u32),
            max_draw_calls: init.limits.max_draw_calls,
            max_views: MAX_VIEWS as u32,
            frames_in_flight: frames_in_flight as u32,
            homogeneous_depth: device_limits.homogeneous_depth,
            origin_bottom_left: false,
        };
        log::info!(
            "Explicit backend ready: {}x{}, {} frames in flight, caps {:?}.",
            init.resolution.width,
            init.resolution.height,
            frames_in_flight,
            caps.supported
        );

        Ok(Self {
            device,
            callback,
            device_limits,
            caps,
            resolution: init.resolution.clone(),
            debug: init.debug,
            queue: stages.queue,
            uniform_scratch: stages.uniform_scratch,
            staging: stages.staging,
            descriptors: stages.descriptors,
            swap_chain: stages.swap_chain,
            defaults: stages.defaults,
            resources: Resources::new(),
            pipelines: PipelineCache::new(),
            render_passes,
            set_layouts: StateCache::new(),
            image_views: LruCache::new(init.limits.image_view_cache_capacity as usize),
            stats: FrameStats::default(),
            in_render_pass: false,
            device_lost: false,
            shut_down: false,
        })
    }

    /// The native device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The swap chain.
    pub fn swap_chain(&self) -> &SwapChain {
        &self.swap_chain
    }

    /// Number of cached pipelines.
    pub fn num_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    /// Number of cached render passes.
    pub fn num_render_passes(&self) -> usize {
        self.render_passes.len()
    }

    /// Backend-side resource tables.
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Applies a new back buffer configuration and debug flags.
    ///
    /// Pipelines are dropped when a flag baked into them changes. The swap
    /// chain itself is rebuilt lazily at the start of the next frame.
    pub(super) fn apply_config(&mut self, resolution: &Resolution, debug: DebugFlags) {
        let pipeline_flags = |r: &Resolution| r.reset.pipeline_affecting();
        let stale = pipeline_flags(&self.resolution) != pipeline_flags(resolution)
            || self.resolution.format != resolution.format
            || (self.debug ^ debug).contains(DebugFlags::WIREFRAME);
        if stale {
            log::debug!("Pipeline-affecting configuration changed; dropping pipelines.");
            self.pipelines.invalidate(&mut self.queue);
        }
        if self.resolution != *resolution {
            self.resolution = resolution.clone();
        }
        self.debug = debug;
    }

    /// Runs resource commands against the tables.
    ///
    /// Invalid handles and out-of-range updates are logged and skipped.
    /// Shader and native failures abort the frame.
    pub(super) fn run_commands(&mut self, cb: CommandBufferId, commands: Vec<ResourceCommand>) -> Result<u32, ResourceError> {
        let slot = self.queue.current_slot();
        let mut ctx = ResourceContext {
            device: &self.device,
            cb,
            staging: &mut self.staging[slot],
            queue: &mut self.queue,
            render_passes: &mut self.render_passes,
            set_layouts: &mut self.set_layouts,
            image_views: &mut self.image_views,
            stats: &mut self.stats,
            uploads: 0,
        };
        for command in commands {
            match self.resources.execute(&mut ctx, command) {
                Ok(()) => {}
                Err(err @ (ResourceError::InvalidHandle | ResourceError::OutOfBounds)) => {
                    log::warn!("Resource command skipped: {err}");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(ctx.uploads)
    }

    /// Reports a frame failure to the host and turns it into the error
    /// returned by [`RendererContext::submit`].
    fn fail(&mut self, err: RenderError) -> RenderError {
        let (code, message) = match &err {
            RenderError::DeviceLost => {
                self.device_lost = true;
                (Fatal::DeviceLost, err.to_string())
            }
            RenderError::ResourceError(ResourceError::Shader(shader)) => (Fatal::InvalidShader, shader.to_string()),
            RenderError::ResourceError(inner) => (Fatal::UnableToCreateResource, inner.to_string()),
            RenderError::Fatal { .. } | RenderError::NotInitialized => return err,
        };
        self.callback.fatal(code, &message);

        // Leave the queue in a state the next frame can start from.
        if !self.device_lost && self.queue.is_recording() {
            if self.in_render_pass {
                if let Ok(cb) = self.queue.alloc(&self.device) {
                    self.device.record(cb, GpuCommand::EndRenderPass);
                }
            }
            if let Err(kick) = self.queue.kick(&self.device, true) {
                log::error!("Could not submit the abandoned frame: {kick}");
            }
        }
        self.in_render_pass = false;

        if code == Fatal::DeviceLost {
            RenderError::DeviceLost
        } else {
            RenderError::Fatal { code, message }
        }
    }

    /// Runs the destroy commands a failed frame left behind. The host
    /// recycles their handles whatever the outcome of the frame.
    fn drain_post_commands(&mut self, frame: &mut Frame) {
        let post = frame.take_post_commands();
        if post.is_empty() {
            return;
        }
        if let Err(err) = self.run_commands(CommandBufferId::NULL, post) {
            log::error!("Destroy commands of a failed frame did not complete: {err}");
        }
    }

    fn destroy_all(&mut self) {
        if let Err(err) = self.device.wait_idle() {
            log::error!("Device did not go idle before shutdown: {err}");
        }
        self.queue.destroy(&self.device);
        self.pipelines.destroy(&self.device);
        self.resources.destroy_all(&self.device);
        for view in self.image_views.invalidate() {
            self.device.destroy(NativeObject::ImageView(view));
        }
        for (set_layout, pipeline_layout) in self.set_layouts.invalidate() {
            self.device.destroy(NativeObject::PipelineLayout(pipeline_layout));
            self.device.destroy(NativeObject::DescriptorSetLayout(set_layout));
        }
        self.descriptors.destroy(&self.device);
        self.swap_chain.destroy(&self.device);
        for pass in self.render_passes.invalidate() {
            self.device.destroy(NativeObject::RenderPass(pass));
        }
        self.defaults.destroy(&self.device);
        for scratch in self.uniform_scratch.iter_mut().chain(self.staging.iter_mut()) {
            scratch.destroy(&self.device);
        }
        self.uniform_scratch.clear();
        self.staging.clear();
    }
}

fn validate(init: &Init) -> Result<(), BackendInitError> {
    let limits = &init.limits;
    let checks = [
        ("max_draw_calls", limits.max_draw_calls),
        ("scratch_buffer_size", limits.scratch_buffer_size),
        ("staging_buffer_size", limits.staging_buffer_size),
        ("max_descriptor_sets", limits.max_descriptor_sets),
        ("max_semaphores", limits.max_semaphores),
    ];
    match checks.iter().find(|(_, value)| *value == 0) {
        Some((name, _)) => Err(BackendInitError::InvalidConfig(format!("{name} must be positive"))),
        None => Ok(()),
    }
}

fn init_stages<D: NativeDevice>(
    guard: &mut InitGuard<'_, D>,
    init: &Init,
    render_passes: &mut StateCache<RenderPassId>,
) -> Result<Stages, BackendInitError> {
    let frames_in_flight = init.frames_in_flight();
    let limits = &init.limits;

    guard.enter(InitStage::Device);
    log::info!("Initializing explicit backend on {:?}.", guard.device());

    guard.enter(InitStage::CommandQueue);
    let queue = CommandQueue::new(guard, frames_in_flight, limits.max_semaphores as usize)
        .map_err(at(InitStage::CommandQueue))?;

    guard.enter(InitStage::ScratchBuffers);
    let mut uniform_scratch = Vec::with_capacity(frames_in_flight);
    let mut staging = Vec::with_capacity(frames_in_flight);
    for _ in 0..frames_in_flight {
        uniform_scratch.push(
            ScratchBuffer::new(guard, limits.scratch_buffer_size as u64, BufferUsage::UNIFORM)
                .map_err(at(InitStage::ScratchBuffers))?,
        );
        staging.push(
            ScratchBuffer::new(
                guard,
                limits.staging_buffer_size as u64,
                BufferUsage::TRANSFER_SRC | BufferUsage::VERTEX | BufferUsage::INDEX,
            )
            .map_err(at(InitStage::ScratchBuffers))?,
        );
    }

    guard.enter(InitStage::DescriptorPool);
    let descriptors =
        DescriptorCache::new(guard, limits.max_descriptor_sets).map_err(at(InitStage::DescriptorPool))?;

    guard.enter(InitStage::SwapChain);
    let swap_chain = SwapChain::new(guard, &init.resolution, frames_in_flight, render_passes);
    // Render passes live in the cache, not in the swap chain.
    for pass in render_passes.values() {
        guard.track(NativeObject::RenderPass(pass));
    }
    let swap_chain = swap_chain.map_err(at(InitStage::SwapChain))?;

    guard.enter(InitStage::Defaults);
    let defaults = Defaults::new(guard).map_err(at(InitStage::Defaults))?;

    Ok(Stages {
        queue,
        uniform_scratch,
        staging,
        descriptors,
        swap_chain,
        defaults,
    })
}

impl<D: NativeDevice> RendererContext for ExplicitRenderer<D> {
    fn renderer_type(&self) -> RendererType {
        RendererType::Explicit
    }

    fn name(&self) -> &str {
        "Explicit"
    }

    fn caps(&self) -> &Caps {
        &self.caps
    }

    fn submit(&mut self, frame: &mut Frame) -> Result<FrameStats, RenderError> {
        if self.shut_down {
            return Err(RenderError::NotInitialized);
        }
        if self.device_lost {
            return Err(RenderError::DeviceLost);
        }
        match self.render_frame(frame) {
            Ok(stats) => Ok(stats),
            Err(err) => {
                let err = self.fail(err);
                self.drain_post_commands(frame);
                Err(err)
            }
        }
    }

    fn stats(&self) -> &FrameStats {
        &self.stats
    }

    fn is_device_lost(&self) -> bool {
        self.device_lost
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        log::info!("Shutting down the explicit backend.");
        self.destroy_all();
        self.shut_down = true;
    }
}

impl<D: NativeDevice> Drop for ExplicitRenderer<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
