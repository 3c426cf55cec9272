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

//! Packed sampler state.

use super::enums::CompareOp;
use crate::prism_bitflags;

/// Bit position of the U address mode.
pub const SAMPLER_U_SHIFT: u32 = 0;
/// Bit position of the V address mode.
pub const SAMPLER_V_SHIFT: u32 = 2;
/// Bit position of the W address mode.
pub const SAMPLER_W_SHIFT: u32 = 4;
/// Bit position of the minification filter.
pub const SAMPLER_MIN_SHIFT: u32 = 6;
/// Bit position of the magnification filter.
pub const SAMPLER_MAG_SHIFT: u32 = 8;
/// Bit position of the comparison function.
pub const SAMPLER_COMPARE_SHIFT: u32 = 12;
/// Bit position of the border color index.
pub const SAMPLER_BORDER_COLOR_SHIFT: u32 = 16;

prism_bitflags! {
    /// Packed sampler state. The empty value samples with linear filtering and repeat addressing.
    pub struct SamplerFlags: u32 {
        /// Mirror U.
        const U_MIRROR = 1 << 0;
        /// Clamp U.
        const U_CLAMP = 2 << 0;
        /// Border color U.
        const U_BORDER = 3 << 0;
        /// U field.
        const U_MASK = 3 << 0;
        /// Mirror V.
        const V_MIRROR = 1 << 2;
        /// Clamp V.
        const V_CLAMP = 2 << 2;
        /// Border color V.
        const V_BORDER = 3 << 2;
        /// V field.
        const V_MASK = 3 << 2;
        /// Mirror W.
        const W_MIRROR = 1 << 4;
        /// Clamp W.
        const W_CLAMP = 2 << 4;
        /// Border color W.
        const W_BORDER = 3 << 4;
        /// W field.
        const W_MASK = 3 << 4;
        /// Point minification.
        const MIN_POINT = 1 << 6;
        /// Anisotropic minification.
        const MIN_ANISOTROPIC = 2 << 6;
        /// Minification field.
        const MIN_MASK = 3 << 6;
        /// Point magnification.
        const MAG_POINT = 1 << 8;
        /// Anisotropic magnification.
        const MAG_ANISOTROPIC = 2 << 8;
        /// Magnification field.
        const MAG_MASK = 3 << 8;
        /// Point mip filtering.
        const MIP_POINT = 1 << 10;
        /// Comparison field ([`CompareOp`] encoding).
        const COMPARE_MASK = 0xf << 12;
        /// Border color index field.
        const BORDER_COLOR_MASK = 0xf << 16;
        /// Sample the stencil aspect of a depth/stencil texture.
        const SAMPLE_STENCIL = 1 << 20;
        /// Clamp on every axis.
        const UVW_CLAMP = (2 << 0) | (2 << 2) | (2 << 4);
        /// Point filtering everywhere.
        const POINT = (1 << 6) | (1 << 8) | (1 << 10);
        /// Use the sampler state the texture was created with.
        const INTERNAL_DEFAULT = 1 << 28;
        /// Bits that describe a native sampler object.
        const SAMPLER_BITS_MASK = 0x000f_ffff;
    }
}

/// Texture addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Repeat.
    Repeat,
    /// Mirrored repeat.
    Mirror,
    /// Clamp to edge.
    Clamp,
    /// Clamp to border color.
    Border,
}

/// Texture filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Linear.
    Linear,
    /// Nearest.
    Point,
    /// Anisotropic.
    Anisotropic,
}

impl SamplerFlags {
    fn address(&self, mask: Self, shift: u32) -> AddressMode {
        match self.field(mask, shift) {
            1 => AddressMode::Mirror,
            2 => AddressMode::Clamp,
            3 => AddressMode::Border,
            _ => AddressMode::Repeat,
        }
    }

    fn filter(&self, mask: Self, shift: u32) -> FilterMode {
        match self.field(mask, shift) {
            1 => FilterMode::Point,
            2 => FilterMode::Anisotropic,
            _ => FilterMode::Linear,
        }
    }

    /// Addressing on U, V and W.
    pub fn address_modes(&self) -> [AddressMode; 3] {
        [
            self.address(Self::U_MASK, SAMPLER_U_SHIFT),
            self.address(Self::V_MASK, SAMPLER_V_SHIFT),
            self.address(Self::W_MASK, SAMPLER_W_SHIFT),
        ]
    }

    /// Minification filter.
    pub fn min_filter(&self) -> FilterMode {
        self.filter(Self::MIN_MASK, SAMPLER_MIN_SHIFT)
    }

    /// Magnification filter.
    pub fn mag_filter(&self) -> FilterMode {
        self.filter(Self::MAG_MASK, SAMPLER_MAG_SHIFT)
    }

    /// Returns `true` for point mip filtering.
    pub fn mip_point(&self) -> bool {
        self.contains(Self::MIP_POINT)
    }

    /// Depth comparison, if any.
    pub fn compare(&self) -> Option<CompareOp> {
        CompareOp::from_bits(self.field(Self::COMPARE_MASK, SAMPLER_COMPARE_SHIFT) as u64)
    }

    /// Border color palette index.
    pub fn border_color(&self) -> u8 {
        self.field(Self::BORDER_COLOR_MASK, SAMPLER_BORDER_COLOR_SHIFT) as u8
    }

    /// The bits that identify a native sampler.
    pub fn sampler_key(&self) -> u32 {
        (*self & Self::SAMPLER_BITS_MASK).bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sampler_is_linear_repeat() {
        let flags = SamplerFlags::EMPTY;
        assert_eq!(flags.address_modes(), [AddressMode::Repeat; 3]);
        assert_eq!(flags.min_filter(), FilterMode::Linear);
        assert!(flags.compare().is_none());
    }

    #[test]
    fn packed_fields_decode() {
        let flags = SamplerFlags::UVW_CLAMP | SamplerFlags::POINT | SamplerFlags::V_MIRROR;
        let [u, _, w] = flags.address_modes();
        assert_eq!((u, w), (AddressMode::Clamp, AddressMode::Clamp));
        assert_eq!(flags.mag_filter(), FilterMode::Point);
        assert!(flags.mip_point());
    }

    #[test]
    fn internal_default_is_not_part_of_the_key() {
        let flags = SamplerFlags::POINT | SamplerFlags::INTERNAL_DEFAULT;
        assert_eq!(flags.sampler_key(), SamplerFlags::POINT.bits());
    }
}
