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

//! Translation of backend-agnostic descriptions into native ones.

use prism_core::renderer::api::command::{Access, ClearFlags, View};
use prism_core::renderer::api::native::{
    ClearValue, ImageAspect, ImageLayout, ImageUsage, SamplerDesc, ShaderStages,
    VertexAttributeDesc,
};
use prism_core::renderer::api::pipeline::{FilterMode, SamplerFlags, StateFlags};
use prism_core::renderer::api::resource::{
    Attrib, AttribType, TextureDesc, TextureFlags, TextureFormat, VertexLayout,
};
use prism_core::renderer::api::shader::ShaderStage;

/// A local extension trait converting core types into native descriptions.
pub trait IntoNative<T> {
    /// Consumes self and converts it into the native type.
    fn into_native(self) -> T;
}

impl IntoNative<ShaderStages> for ShaderStage {
    fn into_native(self) -> ShaderStages {
        match self {
            ShaderStage::Vertex => ShaderStages::VERTEX,
            ShaderStage::Fragment => ShaderStages::FRAGMENT,
            ShaderStage::Compute => ShaderStages::COMPUTE,
        }
    }
}

impl IntoNative<ImageLayout> for Access {
    /// Storage images are always accessed in the general layout.
    fn into_native(self) -> ImageLayout {
        ImageLayout::General
    }
}

/// Usage flags of the single-sample image of a texture.
pub fn image_usage(desc: &TextureDesc) -> ImageUsage {
    let mut usage = ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST | ImageUsage::TRANSFER_SRC;
    if desc.flags.contains(TextureFlags::COMPUTE_WRITE) {
        usage |= ImageUsage::STORAGE;
    }
    if desc.flags.is_render_target() {
        usage |= attachment_usage(desc.format);
    }
    if desc.flags.contains(TextureFlags::RT_WRITE_ONLY) {
        usage.remove(ImageUsage::SAMPLED);
    }
    usage
}

/// The attachment usage matching `format`.
pub fn attachment_usage(format: TextureFormat) -> ImageUsage {
    if format.is_depth() {
        ImageUsage::DEPTH_STENCIL_ATTACHMENT
    } else {
        ImageUsage::COLOR_ATTACHMENT
    }
}

/// The layout a texture rests in between uses.
pub fn resting_layout(desc: &TextureDesc) -> ImageLayout {
    if desc.flags.contains(TextureFlags::COMPUTE_WRITE) {
        ImageLayout::General
    } else if desc.flags.contains(TextureFlags::RT_WRITE_ONLY) {
        attachment_layout(desc.format)
    } else {
        ImageLayout::ShaderReadOnly
    }
}

/// The layout of an attachment of `format` inside a render pass.
pub fn attachment_layout(format: TextureFormat) -> ImageLayout {
    if format.is_depth() {
        ImageLayout::DepthStencilAttachment
    } else {
        ImageLayout::ColorAttachment
    }
}

/// The aspect sampled through the default view of a texture.
pub fn sampled_aspect(format: TextureFormat) -> ImageAspect {
    if format.is_depth() {
        ImageAspect::Depth
    } else {
        ImageAspect::Color
    }
}

/// Builds the native sampler of packed sampler flags.
///
/// ## Arguments
/// * `flags` - The packed sampler state.
/// * `max_anisotropy` - Anisotropy applied to anisotropic filters, 1.0 to disable.
pub fn sampler_desc(flags: SamplerFlags, max_anisotropy: f32) -> SamplerDesc {
    let min = flags.min_filter();
    let mag = flags.mag_filter();
    let anisotropic = min == FilterMode::Anisotropic || mag == FilterMode::Anisotropic;
    SamplerDesc {
        address: flags.address_modes(),
        min,
        mag,
        mip_point: flags.mip_point(),
        compare: flags.compare(),
        border_color: flags.border_color(),
        max_anisotropy: if anisotropic { max_anisotropy.max(1.0) } else { 1.0 },
    }
}

/// The color write mask of a render state, RGBA in bits 0..=3.
pub fn write_mask(state: StateFlags) -> u8 {
    (state.bits() & 0xf) as u8
}

/// Vertex attributes of `layout` read by a vertex shader consuming `used`.
///
/// Attributes already provided by a previous stream (`assigned`) are skipped
/// and newly provided ones are added to it.
pub fn vertex_attributes(
    layout: &VertexLayout,
    binding: u32,
    used: &[Attrib],
    assigned: &mut u32,
) -> Vec<VertexAttributeDesc> {
    layout
        .iter()
        .filter(|(attrib, _)| used.contains(attrib))
        .filter_map(|(attrib, desc)| {
            let bit = 1u32 << attrib.location();
            if *assigned & bit != 0 {
                return None;
            }
            *assigned |= bit;
            Some(VertexAttributeDesc {
                location: attrib.location(),
                binding,
                ty: desc.ty,
                num: desc.num,
                normalized: desc.normalized,
                as_int: desc.as_int,
                offset: desc.offset as u32,
            })
        })
        .collect()
}

/// Per-instance attributes: each 16 bytes of instance data feed one vec4,
/// counting down from `TexCoord7`.
pub fn instance_attributes(stride: u16, binding: u32) -> Vec<VertexAttributeDesc> {
    let top = Attrib::TexCoord7.location();
    (0..(stride / 16) as u32)
        .take_while(|k| *k <= top)
        .map(|k| VertexAttributeDesc {
            location: top - k,
            binding,
            ty: AttribType::Float,
            num: 4,
            normalized: false,
            as_int: false,
            offset: k * 16,
        })
        .collect()
}

/// Clear values of a render pass, one per attachment.
pub fn clear_values(view: &View, colors: usize, has_depth: bool, resolves: usize) -> Vec<ClearValue> {
    let color = ClearValue::Color(view.clear.color());
    let mut values = vec![color; colors];
    if has_depth {
        values.push(ClearValue::DepthStencil {
            depth: view.clear.depth,
            stencil: view.clear.stencil as u32,
        });
    }
    values.extend(std::iter::repeat(color).take(resolves));
    values
}

/// Returns `true` if the view clears color.
pub fn clears_color(flags: ClearFlags) -> bool {
    flags.contains(ClearFlags::COLOR)
}

/// Returns `true` if the view clears depth or stencil.
pub fn clears_depth(flags: ClearFlags) -> bool {
    flags.intersects(ClearFlags::DEPTH | ClearFlags::STENCIL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::api::pipeline::AddressMode;

    #[test]
    fn render_target_usage_and_layout() {
        let desc = TextureDesc::new_2d(64, 64, false, 1, TextureFormat::D24S8, TextureFlags::RT);
        let usage = image_usage(&desc);
        assert!(usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED));
        assert_eq!(resting_layout(&desc), ImageLayout::ShaderReadOnly);

        let storage = TextureDesc::new_2d(8, 8, false, 1, TextureFormat::R32F, TextureFlags::COMPUTE_WRITE);
        assert!(image_usage(&storage).contains(ImageUsage::STORAGE));
        assert_eq!(resting_layout(&storage), ImageLayout::General);
    }

    #[test]
    fn anisotropy_only_applies_to_anisotropic_filters() {
        let linear = sampler_desc(SamplerFlags::UVW_CLAMP, 16.0);
        assert_eq!(linear.max_anisotropy, 1.0);
        assert_eq!(linear.address, [AddressMode::Clamp; 3]);

        let aniso = sampler_desc(SamplerFlags::MIN_ANISOTROPIC, 16.0);
        assert_eq!(aniso.max_anisotropy, 16.0);
    }

    #[test]
    fn streams_do_not_provide_the_same_attribute_twice() {
        let a = VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Color0, 4, AttribType::Uint8, true, false)
            .end();
        let b = VertexLayout::begin()
            .add(Attrib::Color0, 4, AttribType::Uint8, true, false)
            .add(Attrib::TexCoord0, 2, AttribType::Float, false, false)
            .end();
        let used = [Attrib::Position, Attrib::Color0, Attrib::TexCoord0];
        let mut assigned = 0;
        let first = vertex_attributes(&a, 0, &used, &mut assigned);
        let second = vertex_attributes(&b, 1, &used, &mut assigned);
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].location, Attrib::TexCoord0.location());
        assert_eq!(second[0].offset, 4);
    }

    #[test]
    fn instance_data_maps_down_from_texcoord7() {
        let attrs = instance_attributes(32, 2);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].location, Attrib::TexCoord7.location());
        assert_eq!(attrs[1].location, Attrib::TexCoord6.location());
        assert_eq!(attrs[1].offset, 16);
    }
}
