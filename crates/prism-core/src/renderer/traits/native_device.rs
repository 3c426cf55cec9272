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

use crate::renderer::api::native::*;
use crate::renderer::error::NativeError;
use std::fmt::Debug;

/// The seam between a backend and a native explicit graphics API.
///
/// Methods take `&self`; implementations synchronize internally. Objects are
/// referenced by opaque ids and destroyed through the single
/// [`destroy`](Self::destroy) entry point.
pub trait NativeDevice: Send + Debug + 'static {
    /// Limits and optional features of the device.
    fn limits(&self) -> DeviceLimits;

    /// Creates a buffer with its backing memory.
    /// ## Arguments
    /// * `desc` - Size, usage and memory location.
    /// ## Returns
    /// The id of the buffer.
    /// ## Errors
    /// * `NativeError::OutOfDeviceMemory` / `OutOfHostMemory` - The allocation failed.
    fn create_buffer(&self, desc: &BufferDesc) -> Result<BufferId, NativeError>;

    /// Writes into a host-visible buffer.
    /// ## Arguments
    /// * `buffer` - A buffer created with [`MemoryLocation::HostVisible`].
    /// * `offset` - Byte offset of the write.
    /// * `data` - The bytes to write.
    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), NativeError>;

    /// Makes host writes in `[offset, offset + size)` visible to the device.
    fn flush_buffer(&self, buffer: BufferId, offset: u64, size: u64) -> Result<(), NativeError>;

    /// Creates an image with its backing memory.
    fn create_image(&self, desc: &ImageDesc) -> Result<ImageId, NativeError>;

    /// Creates a view of an image.
    fn create_image_view(&self, desc: &ImageViewDesc) -> Result<ImageViewId, NativeError>;

    /// Creates a sampler.
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<SamplerId, NativeError>;

    /// Creates a shader module from native bytecode.
    fn create_shader_module(&self, code: &[u8], stage: ShaderStages) -> Result<ShaderModuleId, NativeError>;

    /// Creates a descriptor set layout.
    fn create_descriptor_set_layout(
        &self,
        bindings: &[DescriptorSetLayoutBinding],
    ) -> Result<DescriptorSetLayoutId, NativeError>;

    /// Creates a pipeline layout from descriptor set layouts.
    fn create_pipeline_layout(&self, set_layouts: &[DescriptorSetLayoutId]) -> Result<PipelineLayoutId, NativeError>;

    /// Creates a graphics pipeline.
    /// ## Arguments
    /// * `desc` - The full fixed-function and shader state.
    /// * `cache` - A blob previously returned by [`pipeline_cache_data`](Self::pipeline_cache_data)
    ///   for the same key, if the host persisted one.
    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc,
        cache: Option<&[u8]>,
    ) -> Result<PipelineId, NativeError>;

    /// Creates a compute pipeline.
    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc) -> Result<PipelineId, NativeError>;

    /// Serialized driver cache data of a pipeline, if the device produces any.
    fn pipeline_cache_data(&self, pipeline: PipelineId) -> Option<Vec<u8>>;

    /// Creates a render pass.
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<RenderPassId, NativeError>;

    /// Creates a framebuffer.
    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<FramebufferId, NativeError>;

    /// Creates a descriptor pool able to hold `max_sets` sets.
    fn create_descriptor_pool(&self, max_sets: u32) -> Result<DescriptorPoolId, NativeError>;

    /// Allocates a descriptor set from a pool.
    fn allocate_descriptor_set(
        &self,
        pool: DescriptorPoolId,
        layout: DescriptorSetLayoutId,
    ) -> Result<DescriptorSetId, NativeError>;

    /// Writes descriptors into a set.
    fn update_descriptor_set(&self, set: DescriptorSetId, writes: &[DescriptorWrite]);

    /// Creates a command pool.
    fn create_command_pool(&self) -> Result<CommandPoolId, NativeError>;

    /// Allocates a primary command buffer from a pool.
    fn allocate_command_buffer(&self, pool: CommandPoolId) -> Result<CommandBufferId, NativeError>;

    /// Returns every command buffer of the pool to the initial state.
    fn reset_command_pool(&self, pool: CommandPoolId) -> Result<(), NativeError>;

    /// Starts recording.
    fn begin_command_buffer(&self, cb: CommandBufferId) -> Result<(), NativeError>;

    /// Ends recording.
    fn end_command_buffer(&self, cb: CommandBufferId) -> Result<(), NativeError>;

    /// Records one command.
    fn record(&self, cb: CommandBufferId, command: GpuCommand);

    /// Creates a fence, optionally already signaled.
    fn create_fence(&self, signaled: bool) -> Result<FenceId, NativeError>;

    /// Blocks until the fence is signaled.
    fn wait_fence(&self, fence: FenceId) -> Result<(), NativeError>;

    /// Returns `true` if the fence is signaled.
    fn is_fence_signaled(&self, fence: FenceId) -> bool;

    /// Returns the fence to the unsignaled state.
    fn reset_fence(&self, fence: FenceId) -> Result<(), NativeError>;

    /// Creates a binary semaphore.
    fn create_semaphore(&self) -> Result<SemaphoreId, NativeError>;

    /// Submits a command buffer to the graphics queue.
    fn submit(&self, info: &SubmitInfo) -> Result<(), NativeError>;

    /// Blocks until the device is idle.
    fn wait_idle(&self) -> Result<(), NativeError>;

    /// Properties of the presentation surface.
    /// ## Errors
    /// * `NativeError::Unsupported` - The device has no surface (offscreen rendering).
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities, NativeError>;

    /// Creates a swap chain. The old swap chain in `desc` is retired.
    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<SwapchainId, NativeError>;

    /// The images of a swap chain.
    fn swapchain_images(&self, swapchain: SwapchainId) -> Result<Vec<ImageId>, NativeError>;

    /// Acquires the next presentable image. Blocks without timeout.
    /// ## Returns
    /// The image index.
    /// ## Errors
    /// * `NativeError::OutOfDate` / `SurfaceLost` - The swap chain must be recreated.
    fn acquire_next_image(&self, swapchain: SwapchainId, signal: SemaphoreId) -> Result<u32, NativeError>;

    /// Queues an image for presentation.
    fn present(&self, swapchain: SwapchainId, image_index: u32, wait: &[SemaphoreId]) -> Result<(), NativeError>;

    /// Destroys a native object. The caller guarantees the GPU no longer uses it.
    fn destroy(&self, object: NativeObject);
}
