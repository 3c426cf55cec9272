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

//! Texture formats, creation flags and descriptions.

use crate::prism_bitflags;
use crate::renderer::api::pipeline::SamplerFlags;
use serde::{Deserialize, Serialize};

/// Pixel formats understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFormat {
    /// 8-bit single channel.
    R8,
    /// 8-bit two channels.
    Rg8,
    /// 8-bit RGBA.
    #[default]
    Rgba8,
    /// 8-bit BGRA, the usual swap chain format.
    Bgra8,
    /// 16-bit float single channel.
    R16F,
    /// 16-bit float RGBA.
    Rgba16F,
    /// 32-bit float single channel.
    R32F,
    /// 32-bit unsigned single channel.
    R32U,
    /// 32-bit float RGBA.
    Rgba32F,
    /// 16-bit depth.
    D16,
    /// 24-bit depth with 8-bit stencil.
    D24S8,
    /// 32-bit float depth.
    D32F,
}

impl TextureFormat {
    /// Size of one texel in bytes.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rg8 | TextureFormat::R16F | TextureFormat::D16 => 2,
            TextureFormat::Rgba8
            | TextureFormat::Bgra8
            | TextureFormat::R32F
            | TextureFormat::R32U
            | TextureFormat::D24S8
            | TextureFormat::D32F => 4,
            TextureFormat::Rgba16F => 8,
            TextureFormat::Rgba32F => 16,
        }
    }

    /// Returns `true` for depth (and depth/stencil) formats.
    pub const fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::D16 | TextureFormat::D24S8 | TextureFormat::D32F
        )
    }

    /// Returns `true` for formats with a stencil aspect.
    pub const fn has_stencil(&self) -> bool {
        matches!(self, TextureFormat::D24S8)
    }
}

prism_bitflags! {
    /// Texture creation flags.
    pub struct TextureFlags: u32 {
        /// The texture can be a frame buffer attachment.
        const RT = 1 << 0;
        /// Render target that is never sampled.
        const RT_WRITE_ONLY = 1 << 1;
        /// Compute shaders can write the texture as a storage image.
        const COMPUTE_WRITE = 1 << 2;
        /// Sample with sRGB decoding.
        const SRGB = 1 << 3;
        /// The texture can be a blit destination.
        const BLIT_DST = 1 << 4;
        /// The texture can be read back to the CPU.
        const READ_BACK = 1 << 5;
        /// Regenerate the mip chain after the texture was rendered to.
        const AUTO_GEN_MIPS = 1 << 6;
        /// 2x multisampled render target.
        const RT_MSAA_X2 = 1 << 8;
        /// 4x multisampled render target.
        const RT_MSAA_X4 = 2 << 8;
        /// 8x multisampled render target.
        const RT_MSAA_X8 = 3 << 8;
        /// 16x multisampled render target.
        const RT_MSAA_X16 = 4 << 8;
        /// Mask of the render-target MSAA field.
        const RT_MSAA_MASK = 7 << 8;
    }
}

/// Bit position of [`TextureFlags::RT_MSAA_MASK`].
pub const TEXTURE_RT_MSAA_SHIFT: u32 = 8;

impl TextureFlags {
    /// Sample count of a render target created with these flags.
    pub fn msaa_samples(&self) -> u8 {
        match self.field(Self::RT_MSAA_MASK, TEXTURE_RT_MSAA_SHIFT) {
            0 => 1,
            level => 1 << level.min(4),
        }
    }

    /// Returns `true` if the texture can be attached to a frame buffer.
    pub fn is_render_target(&self) -> bool {
        self.intersects(Self::RT | Self::RT_WRITE_ONLY)
    }
}

/// How a texture is viewed by shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureViewType {
    /// A single 2D image.
    #[default]
    D2,
    /// An array of 2D images.
    D2Array,
    /// A volume.
    D3,
    /// Six faces of a cube.
    Cube,
}

/// Everything needed to create a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// Depth in pixels (1 for non-volume textures).
    pub depth: u16,
    /// Number of array layers.
    pub num_layers: u16,
    /// Number of mip levels.
    pub num_mips: u8,
    /// Pixel format.
    pub format: TextureFormat,
    /// Creation flags.
    pub flags: TextureFlags,
    /// Default sampler state when a binding does not override it.
    pub sampler: SamplerFlags,
    /// Cube map (six faces per layer).
    pub cube_map: bool,
}

impl TextureDesc {
    /// Describes a 2D texture, optionally with a full mip chain.
    pub fn new_2d(
        width: u16,
        height: u16,
        has_mips: bool,
        num_layers: u16,
        format: TextureFormat,
        flags: TextureFlags,
    ) -> Self {
        let num_mips = if has_mips {
            full_mip_count(width.max(height) as u32)
        } else {
            1
        };
        Self {
            width,
            height,
            depth: 1,
            num_layers: num_layers.max(1),
            num_mips,
            format,
            flags,
            sampler: SamplerFlags::EMPTY,
            cube_map: false,
        }
    }

    /// The shader view type of the whole texture.
    pub fn view_type(&self) -> TextureViewType {
        if self.cube_map {
            TextureViewType::Cube
        } else if self.depth > 1 {
            TextureViewType::D3
        } else if self.num_layers > 1 {
            TextureViewType::D2Array
        } else {
            TextureViewType::D2
        }
    }

    /// Number of array layers as seen by the native API (cube faces included).
    pub fn array_layers(&self) -> u32 {
        let layers = self.num_layers.max(1) as u32;
        if self.cube_map {
            layers * 6
        } else {
            layers
        }
    }

    /// Size of mip `mip` in pixels, never below one.
    pub fn mip_extent(&self, mip: u8) -> (u32, u32, u32) {
        let shrink = |v: u16| ((v as u32) >> mip).max(1);
        (shrink(self.width), shrink(self.height), shrink(self.depth))
    }

    /// Bytes of mip `mip` for a single layer.
    pub fn mip_size(&self, mip: u8) -> u32 {
        let (w, h, d) = self.mip_extent(mip);
        w * h * d * self.format.bytes_per_pixel()
    }
}

/// Number of mips of a full chain for a texture whose largest side is `size`.
pub fn full_mip_count(size: u32) -> u8 {
    (32 - size.max(1).leading_zeros()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mip_chain_length() {
        assert_eq!(full_mip_count(1), 1);
        assert_eq!(full_mip_count(256), 9);
        assert_eq!(full_mip_count(300), 9);
    }

    #[test]
    fn mip_sizes_shrink_to_one() {
        let desc = TextureDesc::new_2d(
            8,
            2,
            true,
            1,
            TextureFormat::Rgba8,
            TextureFlags::EMPTY,
        );
        assert_eq!(desc.num_mips, 4);
        assert_eq!(desc.mip_extent(0), (8, 2, 1));
        assert_eq!(desc.mip_extent(2), (2, 1, 1));
        assert_eq!(desc.mip_size(3), 4);
    }

    #[test]
    fn render_target_msaa_samples() {
        let flags = TextureFlags::RT | TextureFlags::RT_MSAA_X4;
        assert!(flags.is_render_target());
        assert_eq!(flags.msaa_samples(), 4);
        assert_eq!(TextureFlags::EMPTY.msaa_samples(), 1);
    }
}
