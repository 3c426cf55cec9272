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

use ahash::AHashMap;
use prism_core::renderer::api::native::*;
use prism_core::renderer::{NativeDevice, NativeError};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// How submitted work completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuTimeline {
    /// Every submission completes as soon as it is submitted.
    #[default]
    Immediate,
    /// Submissions stay pending until [`HeadlessDevice::complete_next`] runs them.
    Manual,
}

/// Device entry points that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOp {
    /// [`NativeDevice::create_buffer`].
    CreateBuffer,
    /// [`NativeDevice::create_image`].
    CreateImage,
    /// [`NativeDevice::create_image_view`].
    CreateImageView,
    /// [`NativeDevice::create_sampler`].
    CreateSampler,
    /// [`NativeDevice::create_shader_module`].
    CreateShaderModule,
    /// [`NativeDevice::create_graphics_pipeline`].
    CreateGraphicsPipeline,
    /// [`NativeDevice::create_compute_pipeline`].
    CreateComputePipeline,
    /// [`NativeDevice::create_render_pass`].
    CreateRenderPass,
    /// [`NativeDevice::create_descriptor_pool`].
    CreateDescriptorPool,
    /// [`NativeDevice::allocate_descriptor_set`].
    AllocateDescriptorSet,
    /// [`NativeDevice::create_command_pool`].
    CreateCommandPool,
    /// [`NativeDevice::create_fence`].
    CreateFence,
    /// [`NativeDevice::create_semaphore`].
    CreateSemaphore,
    /// [`NativeDevice::submit`].
    Submit,
    /// [`NativeDevice::create_swapchain`].
    CreateSwapchain,
    /// [`NativeDevice::acquire_next_image`].
    AcquireNextImage,
    /// [`NativeDevice::present`].
    Present,
}

/// Kinds of objects the device tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Buffer.
    Buffer,
    /// Image, including swap chain images.
    Image,
    /// Image view.
    ImageView,
    /// Sampler.
    Sampler,
    /// Shader module.
    ShaderModule,
    /// Descriptor set layout.
    DescriptorSetLayout,
    /// Pipeline layout.
    PipelineLayout,
    /// Graphics or compute pipeline.
    Pipeline,
    /// Render pass.
    RenderPass,
    /// Framebuffer.
    Framebuffer,
    /// Descriptor pool.
    DescriptorPool,
    /// Descriptor set.
    DescriptorSet,
    /// Command pool.
    CommandPool,
    /// Command buffer.
    CommandBuffer,
    /// Fence.
    Fence,
    /// Semaphore.
    Semaphore,
    /// Swap chain.
    Swapchain,
}

impl ObjectKind {
    /// The kind of a native object.
    pub fn of(object: &NativeObject) -> Self {
        match object {
            NativeObject::Buffer(_) => ObjectKind::Buffer,
            NativeObject::Image(_) => ObjectKind::Image,
            NativeObject::ImageView(_) => ObjectKind::ImageView,
            NativeObject::Sampler(_) => ObjectKind::Sampler,
            NativeObject::ShaderModule(_) => ObjectKind::ShaderModule,
            NativeObject::DescriptorSetLayout(_) => ObjectKind::DescriptorSetLayout,
            NativeObject::PipelineLayout(_) => ObjectKind::PipelineLayout,
            NativeObject::Pipeline(_) => ObjectKind::Pipeline,
            NativeObject::RenderPass(_) => ObjectKind::RenderPass,
            NativeObject::Framebuffer(_) => ObjectKind::Framebuffer,
            NativeObject::DescriptorPool(_) => ObjectKind::DescriptorPool,
            NativeObject::DescriptorSet(..) => ObjectKind::DescriptorSet,
            NativeObject::CommandPool(_) => ObjectKind::CommandPool,
            NativeObject::Fence(_) => ObjectKind::Fence,
            NativeObject::Semaphore(_) => ObjectKind::Semaphore,
            NativeObject::Swapchain(_) => ObjectKind::Swapchain,
        }
    }

    fn raw(object: &NativeObject) -> u64 {
        match *object {
            NativeObject::Buffer(h) => h.0,
            NativeObject::Image(h) => h.0,
            NativeObject::ImageView(h) => h.0,
            NativeObject::Sampler(h) => h.0,
            NativeObject::ShaderModule(h) => h.0,
            NativeObject::DescriptorSetLayout(h) => h.0,
            NativeObject::PipelineLayout(h) => h.0,
            NativeObject::Pipeline(h) => h.0,
            NativeObject::RenderPass(h) => h.0,
            NativeObject::Framebuffer(h) => h.0,
            NativeObject::DescriptorPool(h) => h.0,
            NativeObject::DescriptorSet(_, h) => h.0,
            NativeObject::CommandPool(h) => h.0,
            NativeObject::Fence(h) => h.0,
            NativeObject::Semaphore(h) => h.0,
            NativeObject::Swapchain(h) => h.0,
        }
    }
}

/// A command buffer submitted to the simulated queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// The command buffer.
    pub command_buffer: CommandBufferId,
    /// Everything recorded into it.
    pub commands: Vec<GpuCommand>,
    /// Fence signaled on completion.
    pub fence: FenceId,
    /// Semaphores waited on.
    pub wait_semaphores: Vec<SemaphoreId>,
    /// Semaphores signaled.
    pub signal_semaphores: Vec<SemaphoreId>,
    /// GPU tick at submission.
    pub submit_tick: u64,
    /// GPU tick at completion, once completed.
    pub complete_tick: Option<u64>,
}

impl Submission {
    /// Counts the recorded commands matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GpuCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(*c)).count()
    }
}

/// A destroyed object and the GPU tick it was destroyed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destruction {
    /// The object.
    pub object: NativeObject,
    /// GPU tick at destruction.
    pub tick: u64,
}

#[derive(Debug)]
struct BufferState {
    data: Vec<u8>,
    location: MemoryLocation,
}

#[derive(Debug, Default)]
struct CommandBufferState {
    pool: CommandPoolId,
    recording: bool,
    commands: Vec<GpuCommand>,
}

#[derive(Debug, Default)]
struct FenceState {
    signaled: bool,
    signal_tick: Option<u64>,
}

#[derive(Debug)]
struct SwapchainState {
    images: Vec<ImageId>,
    extent: (u32, u32),
    next: u32,
}

#[derive(Debug)]
struct State {
    next_id: u64,
    tick: u64,
    timeline: GpuTimeline,
    limits: DeviceLimits,
    device_lost: bool,
    surface: Option<(u32, u32)>,

    live: AHashMap<u64, ObjectKind>,
    created: AHashMap<ObjectKind, usize>,
    buffers: AHashMap<BufferId, BufferState>,
    command_buffers: AHashMap<CommandBufferId, CommandBufferState>,
    fences: AHashMap<FenceId, FenceState>,
    swapchains: AHashMap<SwapchainId, SwapchainState>,

    submissions: Vec<Submission>,
    pending: VecDeque<usize>,
    destructions: Vec<Destruction>,
    failures: AHashMap<DeviceOp, NativeError>,
    pipelines_from_cache: usize,
    presents: usize,
}

impl State {
    fn new(limits: DeviceLimits, surface: Option<(u32, u32)>) -> Self {
        Self {
            next_id: 1,
            tick: 0,
            timeline: GpuTimeline::Immediate,
            limits,
            device_lost: false,
            surface,
            live: AHashMap::new(),
            created: AHashMap::new(),
            buffers: AHashMap::new(),
            command_buffers: AHashMap::new(),
            fences: AHashMap::new(),
            swapchains: AHashMap::new(),
            submissions: Vec::new(),
            pending: VecDeque::new(),
            destructions: Vec::new(),
            failures: AHashMap::new(),
            pipelines_from_cache: 0,
            presents: 0,
        }
    }

    fn check(&mut self, op: DeviceOp) -> Result<(), NativeError> {
        if self.device_lost {
            return Err(NativeError::DeviceLost);
        }
        match self.failures.remove(&op) {
            Some(err) => {
                log::debug!("HeadlessDevice: injected failure on {op:?}: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn alloc(&mut self, kind: ObjectKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, kind);
        *self.created.entry(kind).or_insert(0) += 1;
        id
    }

    fn is_live(&self, id: u64, kind: ObjectKind) -> bool {
        self.live.get(&id) == Some(&kind)
    }

    fn is_pending(&self, cb: CommandBufferId) -> bool {
        self.pending
            .iter()
            .any(|&i| self.submissions.get(i).is_some_and(|s| s.command_buffer == cb))
    }

    fn complete(&mut self, index: usize) {
        self.tick += 1;
        let tick = self.tick;
        let Some(submission) = self.submissions.get_mut(index) else {
            return;
        };
        submission.complete_tick = Some(tick);
        if let Some(fence) = self.fences.get_mut(&submission.fence) {
            fence.signaled = true;
            fence.signal_tick = Some(tick);
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    completed: Condvar,
}

/// An in-memory [`NativeDevice`] with a simulated GPU timeline.
///
/// Clones share the same device, so a test can keep a handle for inspection
/// while the backend owns another.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    shared: Arc<Shared>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Default surface extent of a new device.
    pub const DEFAULT_EXTENT: (u32, u32) = (1280, 720);

    /// Creates a device with default limits, a 1280x720 surface and an
    /// immediate timeline.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    /// Creates a device with the given limits.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new(limits, Some(Self::DEFAULT_EXTENT))),
                completed: Condvar::new(),
            }),
        }
    }

    /// Creates a device without a presentation surface.
    pub fn offscreen() -> Self {
        let device = Self::new();
        device.lock().surface = None;
        device
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // --- Control ---

    /// Switches the GPU timeline mode. Pending work stays pending.
    pub fn set_timeline(&self, timeline: GpuTimeline) {
        self.lock().timeline = timeline;
    }

    /// Sets the surface extent. `None` removes the surface.
    pub fn set_surface_extent(&self, extent: Option<(u32, u32)>) {
        self.lock().surface = extent;
    }

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: DeviceOp, err: NativeError) {
        self.lock().failures.insert(op, err);
    }

    /// Simulates a device loss. Every later call fails with
    /// [`NativeError::DeviceLost`] and blocked waits return.
    pub fn lose_device(&self) {
        self.lock().device_lost = true;
        self.shared.completed.notify_all();
    }

    /// Completes the oldest pending submission. Returns `false` if nothing was
    /// pending.
    pub fn complete_next(&self) -> bool {
        let mut state = self.lock();
        let Some(index) = state.pending.pop_front() else {
            return false;
        };
        state.complete(index);
        drop(state);
        self.shared.completed.notify_all();
        true
    }

    /// Completes every pending submission. Returns how many completed.
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }

    // --- Inspection ---

    /// The current GPU tick. It advances by one per completed submission.
    pub fn tick(&self) -> u64 {
        self.lock().tick
    }

    /// Submissions not yet completed.
    pub fn pending_submissions(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of objects of `kind` ever created.
    pub fn created(&self, kind: ObjectKind) -> usize {
        self.lock().created.get(&kind).copied().unwrap_or(0)
    }

    /// Number of objects of `kind` currently alive.
    pub fn live(&self, kind: ObjectKind) -> usize {
        self.lock().live.values().filter(|k| **k == kind).count()
    }

    /// Every submission so far, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    /// The most recent submission.
    pub fn last_submission(&self) -> Option<Submission> {
        self.lock().submissions.last().cloned()
    }

    /// Every destruction so far, oldest first.
    pub fn destructions(&self) -> Vec<Destruction> {
        self.lock().destructions.clone()
    }

    /// The GPU tick at which `fence` was last signaled by a submission.
    pub fn fence_signal_tick(&self, fence: FenceId) -> Option<u64> {
        self.lock().fences.get(&fence).and_then(|f| f.signal_tick)
    }

    /// Contents of a buffer.
    pub fn buffer_data(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.lock().buffers.get(&buffer).map(|b| b.data.clone())
    }

    /// Number of graphics pipelines created with a persisted cache blob.
    pub fn pipelines_from_cache(&self) -> usize {
        self.lock().pipelines_from_cache
    }

    /// Number of successful presents.
    pub fn presents(&self) -> usize {
        self.lock().presents
    }

    fn create<T>(&self, op: DeviceOp, kind: ObjectKind, wrap: impl FnOnce(u64) -> T) -> Result<T, NativeError> {
        let mut state = self.lock();
        state.check(op)?;
        Ok(wrap(state.alloc(kind)))
    }

    fn create_unchecked<T>(&self, kind: ObjectKind, wrap: impl FnOnce(u64) -> T) -> Result<T, NativeError> {
        let mut state = self.lock();
        if state.device_lost {
            return Err(NativeError::DeviceLost);
        }
        Ok(wrap(state.alloc(kind)))
    }
}

impl NativeDevice for HeadlessDevice {
    fn limits(&self) -> DeviceLimits {
        self.lock().limits.clone()
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferId, NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::CreateBuffer)?;
        let id = BufferId(state.alloc(ObjectKind::Buffer));
        state.buffers.insert(
            id,
            BufferState {
                data: vec![0; desc.size as usize],
                location: desc.location,
            },
        );
        Ok(id)
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), NativeError> {
        let mut state = self.lock();
        let Some(target) = state.buffers.get_mut(&buffer) else {
            return Err(NativeError::Other(format!("write to unknown buffer {buffer:?}")));
        };
        if target.location != MemoryLocation::HostVisible {
            return Err(NativeError::Other(format!("buffer {buffer:?} is not host visible")));
        }
        let start = offset as usize;
        let end = start + data.len();
        match target.data.get_mut(start..end) {
            Some(dst) => {
                dst.copy_from_slice(data);
                Ok(())
            }
            None => Err(NativeError::Other(format!(
                "write of {} bytes at {offset} overflows buffer {buffer:?}",
                data.len()
            ))),
        }
    }

    fn flush_buffer(&self, buffer: BufferId, offset: u64, size: u64) -> Result<(), NativeError> {
        let state = self.lock();
        match state.buffers.get(&buffer) {
            Some(b) if offset + size <= b.data.len() as u64 => Ok(()),
            Some(_) => Err(NativeError::Other(format!(
                "flush range {offset}+{size} overflows buffer {buffer:?}"
            ))),
            None => Err(NativeError::Other(format!("flush of unknown buffer {buffer:?}"))),
        }
    }

    fn create_image(&self, desc: &ImageDesc) -> Result<ImageId, NativeError> {
        let max = self.lock().limits.max_texture_size;
        if desc.width > max || desc.height > max {
            return Err(NativeError::Unsupported(format!(
                "image {}x{} exceeds the maximum size {max}",
                desc.width, desc.height
            )));
        }
        self.create(DeviceOp::CreateImage, ObjectKind::Image, ImageId)
    }

    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewId, NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::CreateImageView)?;
        if !state.is_live(desc.image.0, ObjectKind::Image) {
            return Err(NativeError::Other(format!("view of unknown image {:?}", desc.image)));
        }
        Ok(ImageViewId(state.alloc(ObjectKind::ImageView)))
    }

    fn create_sampler(&self, _desc: &SamplerDesc) -> Result<SamplerId, NativeError> {
        self.create(DeviceOp::CreateSampler, ObjectKind::Sampler, SamplerId)
    }

    fn create_shader_module(&self, code: &[u8], _stage: ShaderStages) -> Result<ShaderModuleId, NativeError> {
        if code.is_empty() {
            return Err(NativeError::Other("empty shader bytecode".to_string()));
        }
        self.create(DeviceOp::CreateShaderModule, ObjectKind::ShaderModule, ShaderModuleId)
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[DescriptorSetLayoutBinding],
    ) -> Result<DescriptorSetLayoutId, NativeError> {
        self.create_unchecked(ObjectKind::DescriptorSetLayout, DescriptorSetLayoutId)
    }

    fn create_pipeline_layout(&self, _set_layouts: &[DescriptorSetLayoutId]) -> Result<PipelineLayoutId, NativeError> {
        self.create_unchecked(ObjectKind::PipelineLayout, PipelineLayoutId)
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        cache: Option<&[u8]>,
    ) -> Result<PipelineId, NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::CreateGraphicsPipeline)?;
        if !state.is_live(desc.render_pass.0, ObjectKind::RenderPass) {
            return Err(NativeError::Other(format!(
                "pipeline references unknown render pass {:?}",
                desc.render_pass
            )));
        }
        if cache.is_some_and(|blob| !blob.is_empty()) {
            state.pipelines_from_cache += 1;
        }
        Ok(PipelineId(state.alloc(ObjectKind::Pipeline)))
    }

    fn create_compute_pipeline(&self, _desc: &ComputePipelineDesc) -> Result<PipelineId, NativeError> {
        self.create(DeviceOp::CreateComputePipeline, ObjectKind::Pipeline, PipelineId)
    }

    fn pipeline_cache_data(&self, pipeline: PipelineId) -> Option<Vec<u8>> {
        let state = self.lock();
        state
            .is_live(pipeline.0, ObjectKind::Pipeline)
            .then(|| pipeline.0.to_le_bytes().to_vec())
    }

    fn create_render_pass(&self, _desc: &RenderPassDesc) -> Result<RenderPassId, NativeError> {
        self.create(DeviceOp::CreateRenderPass, ObjectKind::RenderPass, RenderPassId)
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferId, NativeError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(NativeError::Other("zero-sized framebuffer".to_string()));
        }
        self.create_unchecked(ObjectKind::Framebuffer, FramebufferId)
    }

    fn create_descriptor_pool(&self, _max_sets: u32) -> Result<DescriptorPoolId, NativeError> {
        self.create(DeviceOp::CreateDescriptorPool, ObjectKind::DescriptorPool, DescriptorPoolId)
    }

    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolId,
        _layout: DescriptorSetLayoutId,
    ) -> Result<DescriptorSetId, NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::AllocateDescriptorSet)?;
        if !state.is_live(pool.0, ObjectKind::DescriptorPool) {
            return Err(NativeError::Other(format!("unknown descriptor pool {pool:?}")));
        }
        Ok(DescriptorSetId(state.alloc(ObjectKind::DescriptorSet)))
    }

    fn update_descriptor_set(&self, set: DescriptorSetId, writes: &[DescriptorWrite]) {
        let state = self.lock();
        if !state.is_live(set.0, ObjectKind::DescriptorSet) {
            log::warn!("HeadlessDevice: {} writes to unknown descriptor set {set:?}.", writes.len());
        }
    }

    fn create_command_pool(&self) -> Result<CommandPoolId, NativeError> {
        self.create(DeviceOp::CreateCommandPool, ObjectKind::CommandPool, CommandPoolId)
    }

    fn allocate_command_buffer(&self, pool: CommandPoolId) -> Result<CommandBufferId, NativeError> {
        let mut state = self.lock();
        if !state.is_live(pool.0, ObjectKind::CommandPool) {
            return Err(NativeError::Other(format!("unknown command pool {pool:?}")));
        }
        let id = CommandBufferId(state.alloc(ObjectKind::CommandBuffer));
        state.command_buffers.insert(
            id,
            CommandBufferState {
                pool,
                ..Default::default()
            },
        );
        Ok(id)
    }

    fn reset_command_pool(&self, pool: CommandPoolId) -> Result<(), NativeError> {
        let mut state = self.lock();
        if state.device_lost {
            return Err(NativeError::DeviceLost);
        }
        let busy = state
            .command_buffers
            .iter()
            .find(|(id, cb)| cb.pool == pool && state.is_pending(**id))
            .map(|(id, _)| *id);
        if let Some(cb) = busy {
            return Err(NativeError::Other(format!(
                "reset of {pool:?} while {cb:?} is still pending on the GPU"
            )));
        }
        for cb in state.command_buffers.values_mut().filter(|cb| cb.pool == pool) {
            cb.recording = false;
            cb.commands.clear();
        }
        Ok(())
    }

    fn begin_command_buffer(&self, cb: CommandBufferId) -> Result<(), NativeError> {
        let mut state = self.lock();
        if state.is_pending(cb) {
            return Err(NativeError::Other(format!(
                "begin of {cb:?} while it is still pending on the GPU"
            )));
        }
        match state.command_buffers.get_mut(&cb) {
            Some(buffer) if buffer.recording => Err(NativeError::Other(format!(
                "command buffer {cb:?} is already recording"
            ))),
            Some(buffer) => {
                buffer.recording = true;
                buffer.commands.clear();
                Ok(())
            }
            None => Err(NativeError::Other(format!("unknown command buffer {cb:?}"))),
        }
    }

    fn end_command_buffer(&self, cb: CommandBufferId) -> Result<(), NativeError> {
        let mut state = self.lock();
        match state.command_buffers.get_mut(&cb) {
            Some(buffer) if buffer.recording => {
                buffer.recording = false;
                Ok(())
            }
            Some(_) => Err(NativeError::Other(format!("command buffer {cb:?} is not recording"))),
            None => Err(NativeError::Other(format!("unknown command buffer {cb:?}"))),
        }
    }

    fn record(&self, cb: CommandBufferId, command: GpuCommand) {
        let mut state = self.lock();
        match state.command_buffers.get_mut(&cb) {
            Some(buffer) if buffer.recording => buffer.commands.push(command),
            _ => log::warn!("HeadlessDevice: {command:?} recorded outside of {cb:?}."),
        }
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceId, NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::CreateFence)?;
        let id = FenceId(state.alloc(ObjectKind::Fence));
        state.fences.insert(
            id,
            FenceState {
                signaled,
                signal_tick: None,
            },
        );
        Ok(id)
    }

    fn wait_fence(&self, fence: FenceId) -> Result<(), NativeError> {
        let state = self.lock();
        if !state.fences.contains_key(&fence) {
            return Err(NativeError::Other(format!("wait on unknown fence {fence:?}")));
        }
        let state = self
            .shared
            .completed
            .wait_while(state, |s| {
                !s.device_lost && !s.fences.get(&fence).is_some_and(|f| f.signaled)
            })
            .unwrap_or_else(PoisonError::into_inner);
        if state.device_lost {
            return Err(NativeError::DeviceLost);
        }
        Ok(())
    }

    fn is_fence_signaled(&self, fence: FenceId) -> bool {
        self.lock().fences.get(&fence).is_some_and(|f| f.signaled)
    }

    fn reset_fence(&self, fence: FenceId) -> Result<(), NativeError> {
        match self.lock().fences.get_mut(&fence) {
            Some(f) => {
                f.signaled = false;
                Ok(())
            }
            None => Err(NativeError::Other(format!("reset of unknown fence {fence:?}"))),
        }
    }

    fn create_semaphore(&self) -> Result<SemaphoreId, NativeError> {
        self.create(DeviceOp::CreateSemaphore, ObjectKind::Semaphore, SemaphoreId)
    }

    fn submit(&self, info: &SubmitInfo) -> Result<(), NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::Submit)?;
        let commands = match state.command_buffers.get(&info.command_buffer) {
            Some(cb) if !cb.recording => cb.commands.clone(),
            Some(_) => {
                return Err(NativeError::Other(format!(
                    "submit of {:?} while still recording",
                    info.command_buffer
                )))
            }
            None => {
                return Err(NativeError::Other(format!(
                    "submit of unknown command buffer {:?}",
                    info.command_buffer
                )))
            }
        };
        if state.fences.get(&info.fence).is_some_and(|f| f.signaled) {
            log::warn!("HeadlessDevice: submit with already signaled fence {:?}.", info.fence);
        }
        let index = state.submissions.len();
        let submit_tick = state.tick;
        state.submissions.push(Submission {
            command_buffer: info.command_buffer,
            commands,
            fence: info.fence,
            wait_semaphores: info.wait_semaphores.iter().map(|(s, _)| *s).collect(),
            signal_semaphores: info.signal_semaphores.clone(),
            submit_tick,
            complete_tick: None,
        });
        match state.timeline {
            GpuTimeline::Immediate => {
                state.complete(index);
                drop(state);
                self.shared.completed.notify_all();
            }
            GpuTimeline::Manual => state.pending.push_back(index),
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), NativeError> {
        let state = self.lock();
        let state = self
            .shared
            .completed
            .wait_while(state, |s| !s.device_lost && !s.pending.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        if state.device_lost {
            return Err(NativeError::DeviceLost);
        }
        Ok(())
    }

    fn surface_capabilities(&self) -> Result<SurfaceCapabilities, NativeError> {
        let state = self.lock();
        if state.device_lost {
            return Err(NativeError::DeviceLost);
        }
        match state.surface {
            Some(extent) => Ok(SurfaceCapabilities {
                current_extent: extent,
                min_image_count: 2,
                max_image_count: 3,
            }),
            None => Err(NativeError::Unsupported("headless device has no surface".to_string())),
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<SwapchainId, NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::CreateSwapchain)?;
        if state.surface.is_none() {
            return Err(NativeError::SurfaceLost);
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(NativeError::Other("zero-sized swap chain".to_string()));
        }
        if let Some(old) = desc.old {
            if let Some(retired) = state.swapchains.get_mut(&old) {
                retired.next = u32::MAX;
            }
        }
        let id = SwapchainId(state.alloc(ObjectKind::Swapchain));
        let images = (0..desc.image_count.max(1))
            .map(|_| ImageId(state.alloc(ObjectKind::Image)))
            .collect();
        state.swapchains.insert(
            id,
            SwapchainState {
                images,
                extent: (desc.width, desc.height),
                next: 0,
            },
        );
        Ok(id)
    }

    fn swapchain_images(&self, swapchain: SwapchainId) -> Result<Vec<ImageId>, NativeError> {
        self.lock()
            .swapchains
            .get(&swapchain)
            .map(|s| s.images.clone())
            .ok_or_else(|| NativeError::Other(format!("unknown swap chain {swapchain:?}")))
    }

    fn acquire_next_image(&self, swapchain: SwapchainId, _signal: SemaphoreId) -> Result<u32, NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::AcquireNextImage)?;
        let Some(surface) = state.surface else {
            return Err(NativeError::SurfaceLost);
        };
        let Some(chain) = state.swapchains.get_mut(&swapchain) else {
            return Err(NativeError::Other(format!("unknown swap chain {swapchain:?}")));
        };
        if chain.next == u32::MAX || chain.extent != surface {
            return Err(NativeError::OutOfDate);
        }
        let index = chain.next;
        chain.next = (chain.next + 1) % chain.images.len() as u32;
        Ok(index)
    }

    fn present(&self, swapchain: SwapchainId, image_index: u32, _wait: &[SemaphoreId]) -> Result<(), NativeError> {
        let mut state = self.lock();
        state.check(DeviceOp::Present)?;
        let Some(surface) = state.surface else {
            return Err(NativeError::SurfaceLost);
        };
        let Some(chain) = state.swapchains.get(&swapchain) else {
            return Err(NativeError::Other(format!("unknown swap chain {swapchain:?}")));
        };
        if image_index as usize >= chain.images.len() {
            return Err(NativeError::Other(format!("present of invalid image {image_index}")));
        }
        if chain.extent != surface {
            return Err(NativeError::OutOfDate);
        }
        state.presents += 1;
        Ok(())
    }

    fn destroy(&self, object: NativeObject) {
        let mut state = self.lock();
        let id = ObjectKind::raw(&object);
        let kind = ObjectKind::of(&object);
        if !state.is_live(id, kind) {
            log::warn!("HeadlessDevice: destroy of dead or unknown {object:?}.");
            return;
        }
        state.live.remove(&id);
        match object {
            NativeObject::Buffer(buffer) => {
                state.buffers.remove(&buffer);
            }
            NativeObject::Fence(fence) => {
                state.fences.remove(&fence);
            }
            NativeObject::CommandPool(pool) => {
                let owned: Vec<CommandBufferId> = state
                    .command_buffers
                    .iter()
                    .filter(|(_, cb)| cb.pool == pool)
                    .map(|(id, _)| *id)
                    .collect();
                for cb in owned {
                    state.command_buffers.remove(&cb);
                    state.live.remove(&cb.0);
                }
            }
            NativeObject::Swapchain(swapchain) => {
                if let Some(chain) = state.swapchains.remove(&swapchain) {
                    for image in chain.images {
                        state.live.remove(&image.0);
                    }
                }
            }
            _ => {}
        }
        let tick = state.tick;
        state.destructions.push(Destruction { object, tick });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn recorded_submit(device: &HeadlessDevice, fence: FenceId) -> CommandBufferId {
        let pool = device.create_command_pool().unwrap();
        let cb = device.allocate_command_buffer(pool).unwrap();
        device.begin_command_buffer(cb).unwrap();
        device.record(cb, GpuCommand::Dispatch { x: 1, y: 1, z: 1 });
        device.end_command_buffer(cb).unwrap();
        device
            .submit(&SubmitInfo {
                command_buffer: cb,
                wait_semaphores: Vec::new(),
                signal_semaphores: Vec::new(),
                fence,
            })
            .unwrap();
        cb
    }

    #[test]
    fn immediate_timeline_signals_on_submit() {
        let device = HeadlessDevice::new();
        let fence = device.create_fence(false).unwrap();
        recorded_submit(&device, fence);

        assert!(device.is_fence_signaled(fence));
        assert_eq!(device.fence_signal_tick(fence), Some(1));
        let submission = device.last_submission().unwrap();
        assert_eq!(submission.count(GpuCommand::is_work), 1);
    }

    #[test]
    fn manual_timeline_blocks_waiters_until_completion() {
        let device = HeadlessDevice::new();
        device.set_timeline(GpuTimeline::Manual);
        let fence = device.create_fence(false).unwrap();
        recorded_submit(&device, fence);
        assert!(!device.is_fence_signaled(fence));

        let waiter = {
            let device = device.clone();
            thread::spawn(move || device.wait_fence(fence))
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        assert!(device.complete_next());
        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(device.tick(), 1);
    }

    #[test]
    fn pending_command_buffers_cannot_be_reused() {
        let device = HeadlessDevice::new();
        device.set_timeline(GpuTimeline::Manual);
        let fence = device.create_fence(false).unwrap();
        let cb = recorded_submit(&device, fence);
        let pool = device.lock().command_buffers[&cb].pool;

        assert!(device.reset_command_pool(pool).is_err());
        assert!(device.begin_command_buffer(cb).is_err());

        assert!(device.complete_next());
        assert!(device.reset_command_pool(pool).is_ok());
        assert!(device.begin_command_buffer(cb).is_ok());
    }

    #[test]
    fn injected_failures_fire_once() {
        let device = HeadlessDevice::new();
        device.fail_next(DeviceOp::CreateSampler, NativeError::OutOfDeviceMemory);
        let desc = SamplerDesc {
            address: [prism_core::renderer::api::pipeline::AddressMode::Repeat; 3],
            min: prism_core::renderer::api::pipeline::FilterMode::Linear,
            mag: prism_core::renderer::api::pipeline::FilterMode::Linear,
            mip_point: false,
            compare: None,
            border_color: 0,
            max_anisotropy: 1.0,
        };
        assert_eq!(device.create_sampler(&desc), Err(NativeError::OutOfDeviceMemory));
        assert!(device.create_sampler(&desc).is_ok());
    }

    #[test]
    fn resized_surface_makes_swap_chain_out_of_date() {
        let device = HeadlessDevice::new();
        let semaphore = device.create_semaphore().unwrap();
        let swapchain = device
            .create_swapchain(&SwapchainDesc {
                width: 1280,
                height: 720,
                format: prism_core::renderer::api::resource::TextureFormat::Bgra8,
                image_count: 2,
                vsync: true,
                old: None,
            })
            .unwrap();
        assert_eq!(device.acquire_next_image(swapchain, semaphore), Ok(0));

        device.set_surface_extent(Some((640, 480)));
        assert_eq!(
            device.acquire_next_image(swapchain, semaphore),
            Err(NativeError::OutOfDate)
        );
    }

    #[test]
    fn destroy_records_the_gpu_tick() {
        let device = HeadlessDevice::new();
        let fence = device.create_fence(false).unwrap();
        recorded_submit(&device, fence);
        let buffer = device
            .create_buffer(&BufferDesc {
                size: 16,
                usage: BufferUsage::VERTEX,
                location: MemoryLocation::HostVisible,
            })
            .unwrap();
        device.destroy(NativeObject::Buffer(buffer));

        let destructions = device.destructions();
        assert_eq!(destructions.len(), 1);
        assert_eq!(destructions[0].tick, 1);
        assert_eq!(device.live(ObjectKind::Buffer), 0);
        assert_eq!(device.created(ObjectKind::Buffer), 1);
    }
}
