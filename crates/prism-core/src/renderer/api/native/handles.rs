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

//! Opaque handles to native device objects.

macro_rules! define_native_ids {
    ($( $(#[$meta:meta])* $name:ident ),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
            pub struct $name(pub u64);

            impl $name {
                /// The null handle.
                pub const NULL: Self = Self(0);

                /// Returns `true` for the null handle.
                pub const fn is_null(self) -> bool {
                    self.0 == 0
                }
            }
        )*
    };
}

define_native_ids! {
    /// A native buffer with its memory.
    BufferId,
    /// A native image with its memory.
    ImageId,
    /// A view of an image.
    ImageViewId,
    /// A sampler.
    SamplerId,
    /// A compiled shader module.
    ShaderModuleId,
    /// A descriptor set layout.
    DescriptorSetLayoutId,
    /// A pipeline layout.
    PipelineLayoutId,
    /// A graphics or compute pipeline.
    PipelineId,
    /// A render pass.
    RenderPassId,
    /// A framebuffer.
    FramebufferId,
    /// A descriptor pool.
    DescriptorPoolId,
    /// A descriptor set.
    DescriptorSetId,
    /// A command pool.
    CommandPoolId,
    /// A command buffer.
    CommandBufferId,
    /// A fence.
    FenceId,
    /// A semaphore.
    SemaphoreId,
    /// A swap chain.
    SwapchainId,
}

/// Any native object that can be destroyed.
///
/// Every deferred destruction goes through one `NativeDevice::destroy` call
/// taking this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeObject {
    /// Buffer.
    Buffer(BufferId),
    /// Image.
    Image(ImageId),
    /// Image view.
    ImageView(ImageViewId),
    /// Sampler.
    Sampler(SamplerId),
    /// Shader module.
    ShaderModule(ShaderModuleId),
    /// Descriptor set layout.
    DescriptorSetLayout(DescriptorSetLayoutId),
    /// Pipeline layout.
    PipelineLayout(PipelineLayoutId),
    /// Pipeline.
    Pipeline(PipelineId),
    /// Render pass.
    RenderPass(RenderPassId),
    /// Framebuffer.
    Framebuffer(FramebufferId),
    /// Descriptor pool.
    DescriptorPool(DescriptorPoolId),
    /// Descriptor set, returned to its pool.
    DescriptorSet(DescriptorPoolId, DescriptorSetId),
    /// Command pool.
    CommandPool(CommandPoolId),
    /// Fence.
    Fence(FenceId),
    /// Semaphore.
    Semaphore(SemaphoreId),
    /// Swap chain.
    Swapchain(SwapchainId),
}

impl NativeObject {
    /// Returns `true` if the wrapped handle is null.
    pub fn is_null(&self) -> bool {
        match self {
            NativeObject::Buffer(h) => h.is_null(),
            NativeObject::Image(h) => h.is_null(),
            NativeObject::ImageView(h) => h.is_null(),
            NativeObject::Sampler(h) => h.is_null(),
            NativeObject::ShaderModule(h) => h.is_null(),
            NativeObject::DescriptorSetLayout(h) => h.is_null(),
            NativeObject::PipelineLayout(h) => h.is_null(),
            NativeObject::Pipeline(h) => h.is_null(),
            NativeObject::RenderPass(h) => h.is_null(),
            NativeObject::Framebuffer(h) => h.is_null(),
            NativeObject::DescriptorPool(h) => h.is_null(),
            NativeObject::DescriptorSet(_, h) => h.is_null(),
            NativeObject::CommandPool(h) => h.is_null(),
            NativeObject::Fence(h) => h.is_null(),
            NativeObject::Semaphore(h) => h.is_null(),
            NativeObject::Swapchain(h) => h.is_null(),
        }
    }
}
