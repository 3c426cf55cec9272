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

//! Descriptions of native objects, modeled on explicit graphics APIs.

use super::handles::{
    BufferId, CommandBufferId, FenceId, ImageId, ImageViewId, PipelineLayoutId, RenderPassId,
    SamplerId, SemaphoreId, ShaderModuleId, SwapchainId,
};
use crate::prism_bitflags;
use crate::renderer::api::core::CapsFlags;
use crate::renderer::api::pipeline::{
    AddressMode, BlendState, CompareOp, CullMode, FilterMode, PrimitiveTopology, StencilFace,
};
use crate::renderer::api::resource::{AttribType, TextureFormat, TextureViewType};

prism_bitflags! {
    /// How a native buffer is used.
    pub struct BufferUsage: u32 {
        /// Vertex input.
        const VERTEX = 1 << 0;
        /// Index input.
        const INDEX = 1 << 1;
        /// Uniform buffer.
        const UNIFORM = 1 << 2;
        /// Storage buffer.
        const STORAGE = 1 << 3;
        /// Indirect arguments.
        const INDIRECT = 1 << 4;
        /// Copy source.
        const TRANSFER_SRC = 1 << 5;
        /// Copy destination.
        const TRANSFER_DST = 1 << 6;
    }
}

/// Where a buffer's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// GPU memory, written through copies.
    DeviceLocal,
    /// CPU-mapped memory.
    HostVisible,
}

/// A buffer description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes.
    pub size: u64,
    /// Usage.
    pub usage: BufferUsage,
    /// Memory location.
    pub location: MemoryLocation,
}

prism_bitflags! {
    /// How a native image is used.
    pub struct ImageUsage: u32 {
        /// Sampled in shaders.
        const SAMPLED = 1 << 0;
        /// Storage image.
        const STORAGE = 1 << 1;
        /// Color attachment.
        const COLOR_ATTACHMENT = 1 << 2;
        /// Depth/stencil attachment.
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        /// Copy source.
        const TRANSFER_SRC = 1 << 4;
        /// Copy destination.
        const TRANSFER_DST = 1 << 5;
    }
}

/// An image description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    /// Texel format.
    pub format: TextureFormat,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Depth.
    pub depth: u32,
    /// Mip count.
    pub mip_levels: u32,
    /// Layer count (six per cube).
    pub array_layers: u32,
    /// Sample count.
    pub samples: u8,
    /// Usage.
    pub usage: ImageUsage,
    /// Cube compatible.
    pub cube: bool,
}

/// The aspect of an image a view or barrier covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageAspect {
    /// Color.
    Color,
    /// Depth only.
    Depth,
    /// Stencil only.
    Stencil,
    /// Depth and stencil.
    DepthStencil,
}

impl ImageAspect {
    /// The aspect covering everything in `format`.
    pub fn of(format: TextureFormat) -> Self {
        if format.has_stencil() {
            ImageAspect::DepthStencil
        } else if format.is_depth() {
            ImageAspect::Depth
        } else {
            ImageAspect::Color
        }
    }
}

/// An image view description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageViewDesc {
    /// The viewed image.
    pub image: ImageId,
    /// View dimensionality.
    pub view_type: TextureViewType,
    /// View format.
    pub format: TextureFormat,
    /// Aspect.
    pub aspect: ImageAspect,
    /// First mip.
    pub base_mip: u32,
    /// Mip count.
    pub mip_count: u32,
    /// First layer.
    pub base_layer: u32,
    /// Layer count.
    pub layer_count: u32,
}

/// A sampler description.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDesc {
    /// Addressing on U, V and W.
    pub address: [AddressMode; 3],
    /// Minification filter.
    pub min: FilterMode,
    /// Magnification filter.
    pub mag: FilterMode,
    /// Point mip filtering.
    pub mip_point: bool,
    /// Depth comparison.
    pub compare: Option<CompareOp>,
    /// Border color palette index.
    pub border_color: u8,
    /// Anisotropy, 1.0 when disabled.
    pub max_anisotropy: f32,
}

/// The layout an image is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents undefined.
    #[default]
    Undefined,
    /// Any access.
    General,
    /// Color attachment.
    ColorAttachment,
    /// Depth/stencil attachment.
    DepthStencilAttachment,
    /// Sampled.
    ShaderReadOnly,
    /// Copy source.
    TransferSrc,
    /// Copy destination.
    TransferDst,
    /// Ready for presentation.
    Present,
}

prism_bitflags! {
    /// Shader stages.
    pub struct ShaderStages: u8 {
        /// Vertex.
        const VERTEX = 1 << 0;
        /// Fragment.
        const FRAGMENT = 1 << 1;
        /// Compute.
        const COMPUTE = 1 << 2;
        /// Vertex and fragment.
        const GRAPHICS = (1 << 0) | (1 << 1);
    }
}

/// Kind of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// Uniform buffer with a dynamic offset.
    UniformBufferDynamic,
    /// Image and sampler.
    CombinedImageSampler,
    /// Storage image.
    StorageImage,
    /// Storage buffer.
    StorageBuffer,
}

/// One binding of a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutBinding {
    /// Binding number.
    pub binding: u32,
    /// Kind.
    pub ty: DescriptorType,
    /// Stages that see it.
    pub stages: ShaderStages,
}

/// The resource written into one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorResource {
    /// A uniform buffer range; the offset is supplied at bind time.
    UniformBufferDynamic {
        /// Buffer.
        buffer: BufferId,
        /// Bytes visible per bind.
        range: u64,
    },
    /// A sampled image.
    CombinedImageSampler {
        /// View.
        view: ImageViewId,
        /// Sampler.
        sampler: SamplerId,
        /// Layout at use.
        layout: ImageLayout,
    },
    /// A storage image.
    StorageImage {
        /// View.
        view: ImageViewId,
    },
    /// A storage buffer range.
    StorageBuffer {
        /// Buffer.
        buffer: BufferId,
        /// Offset.
        offset: u64,
        /// Range.
        range: u64,
    },
}

/// One descriptor write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorWrite {
    /// Binding number.
    pub binding: u32,
    /// Resource.
    pub resource: DescriptorResource,
}

/// What happens to an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadOp {
    /// Keep the contents.
    Load,
    /// Clear.
    Clear,
    /// Contents undefined.
    DontCare,
}

/// What happens to an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// Keep the results.
    Store,
    /// Discard the results.
    DontCare,
}

/// One attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDesc {
    /// Format.
    pub format: TextureFormat,
    /// Sample count.
    pub samples: u8,
    /// Load operation.
    pub load: LoadOp,
    /// Store operation.
    pub store: StoreOp,
    /// Layout on entry.
    pub initial_layout: ImageLayout,
    /// Layout on exit.
    pub final_layout: ImageLayout,
}

/// A render pass description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassDesc {
    /// Color attachments.
    pub colors: Vec<AttachmentDesc>,
    /// Depth/stencil attachment.
    pub depth_stencil: Option<AttachmentDesc>,
    /// Single-sample resolve targets, one per color attachment, when multisampled.
    pub resolves: Vec<AttachmentDesc>,
}

/// A framebuffer description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDesc {
    /// Compatible render pass.
    pub render_pass: RenderPassId,
    /// Attachment views, in render pass order.
    pub attachments: Vec<ImageViewId>,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Layers.
    pub layers: u32,
}

/// A clear value of one attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Color.
    Color([f32; 4]),
    /// Depth and stencil.
    DepthStencil {
        /// Depth.
        depth: f32,
        /// Stencil.
        stencil: u32,
    },
}

/// One vertex buffer binding of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBindingDesc {
    /// Binding slot.
    pub binding: u32,
    /// Bytes per element.
    pub stride: u32,
    /// Advance per instance instead of per vertex.
    pub per_instance: bool,
}

/// One vertex attribute of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttributeDesc {
    /// Shader location.
    pub location: u32,
    /// Binding slot.
    pub binding: u32,
    /// Component type.
    pub ty: AttribType,
    /// Component count.
    pub num: u8,
    /// Normalized integers.
    pub normalized: bool,
    /// Read as integers.
    pub as_int: bool,
    /// Byte offset in the element.
    pub offset: u32,
}

/// A graphics pipeline description.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDesc {
    /// Layout.
    pub layout: PipelineLayoutId,
    /// Compatible render pass.
    pub render_pass: RenderPassId,
    /// Vertex shader.
    pub vertex: ShaderModuleId,
    /// Fragment shader.
    pub fragment: Option<ShaderModuleId>,
    /// Vertex buffer bindings.
    pub bindings: Vec<VertexBindingDesc>,
    /// Vertex attributes.
    pub attributes: Vec<VertexAttributeDesc>,
    /// Topology.
    pub topology: PrimitiveTopology,
    /// Culling.
    pub cull: CullMode,
    /// Counter-clockwise faces are front faces.
    pub front_ccw: bool,
    /// Depth test.
    pub depth_test: Option<CompareOp>,
    /// Depth writes.
    pub depth_write: bool,
    /// Depth clamping.
    pub depth_clamp: bool,
    /// Fill mode lines.
    pub wireframe: bool,
    /// Conservative rasterization.
    pub conservative: bool,
    /// Line antialiasing.
    pub line_aa: bool,
    /// Blend state.
    pub blend: Option<BlendState>,
    /// Color write mask (RGBA in bits 0..=3).
    pub write_mask: u8,
    /// Alpha to coverage.
    pub alpha_to_coverage: bool,
    /// Sample count.
    pub samples: u8,
    /// Front stencil face.
    pub stencil_front: Option<StencilFace>,
    /// Back stencil face.
    pub stencil_back: Option<StencilFace>,
    /// Number of color attachments.
    pub color_attachments: u32,
}

/// A compute pipeline description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputePipelineDesc {
    /// Layout.
    pub layout: PipelineLayoutId,
    /// Compute shader.
    pub module: ShaderModuleId,
}

prism_bitflags! {
    /// Pipeline stages used by barriers and semaphore waits.
    pub struct PipelineStage: u32 {
        /// Start of the pipe.
        const TOP = 1 << 0;
        /// Vertex input.
        const VERTEX_INPUT = 1 << 1;
        /// Fragment shading.
        const FRAGMENT = 1 << 2;
        /// Color output.
        const COLOR_ATTACHMENT_OUTPUT = 1 << 3;
        /// Compute shading.
        const COMPUTE = 1 << 4;
        /// Copies.
        const TRANSFER = 1 << 5;
        /// Indirect argument reads.
        const DRAW_INDIRECT = 1 << 6;
        /// Everything.
        const ALL_COMMANDS = 1 << 7;
    }
}

/// A queue submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitInfo {
    /// Command buffer.
    pub command_buffer: CommandBufferId,
    /// Semaphores to wait on and the stage that waits.
    pub wait_semaphores: Vec<(SemaphoreId, PipelineStage)>,
    /// Semaphores to signal.
    pub signal_semaphores: Vec<SemaphoreId>,
    /// Fence signaled on completion.
    pub fence: FenceId,
}

/// Properties of the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceCapabilities {
    /// Current surface size. Zero while minimized.
    pub current_extent: (u32, u32),
    /// Fewest swap chain images.
    pub min_image_count: u32,
    /// Most swap chain images, zero for no limit.
    pub max_image_count: u32,
}

/// A swap chain description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainDesc {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Format.
    pub format: TextureFormat,
    /// Image count.
    pub image_count: u32,
    /// Wait for vertical blank.
    pub vsync: bool,
    /// Swap chain being replaced.
    pub old: Option<SwapchainId>,
}

/// Limits and features of a native device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLimits {
    /// Flush granularity of host-visible non-coherent memory.
    pub non_coherent_atom_size: u64,
    /// Alignment of dynamic uniform buffer offsets.
    pub min_uniform_buffer_offset_alignment: u64,
    /// Largest texture dimension.
    pub max_texture_size: u32,
    /// Largest sampler anisotropy.
    pub max_anisotropy: f32,
    /// Most color attachments.
    pub max_color_attachments: u32,
    /// Optional features.
    pub supported: CapsFlags,
    /// Depth range is `[-1, 1]`.
    pub homogeneous_depth: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            non_coherent_atom_size: 64,
            min_uniform_buffer_offset_alignment: 256,
            max_texture_size: 16384,
            max_anisotropy: 16.0,
            max_color_attachments: 8,
            supported: CapsFlags::ALL,
            homogeneous_depth: false,
        }
    }
}

/// A buffer-to-buffer copy region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferCopy {
    /// Source offset.
    pub src_offset: u64,
    /// Destination offset.
    pub dst_offset: u64,
    /// Size.
    pub size: u64,
}

/// A subresource of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSubresource {
    /// Aspect.
    pub aspect: ImageAspect,
    /// Mip level.
    pub mip: u32,
    /// First layer.
    pub base_layer: u32,
    /// Layer count.
    pub layer_count: u32,
}

/// A buffer-to-image copy region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferImageCopy {
    /// Source offset.
    pub buffer_offset: u64,
    /// Texels per source row, zero for tightly packed.
    pub buffer_row_length: u32,
    /// Target subresource.
    pub subresource: ImageSubresource,
    /// Target origin.
    pub offset: [u32; 3],
    /// Target extent.
    pub extent: [u32; 3],
}

/// An image-to-image copy region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageCopy {
    /// Source subresource.
    pub src: ImageSubresource,
    /// Source origin.
    pub src_offset: [u32; 3],
    /// Destination subresource.
    pub dst: ImageSubresource,
    /// Destination origin.
    pub dst_offset: [u32; 3],
    /// Extent.
    pub extent: [u32; 3],
}

/// A layout transition of an image range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBarrier {
    /// Image.
    pub image: ImageId,
    /// Aspect.
    pub aspect: ImageAspect,
    /// First mip.
    pub base_mip: u32,
    /// Mip count.
    pub mip_count: u32,
    /// First layer.
    pub base_layer: u32,
    /// Layer count.
    pub layer_count: u32,
    /// Layout before.
    pub old_layout: ImageLayout,
    /// Layout after.
    pub new_layout: ImageLayout,
}
