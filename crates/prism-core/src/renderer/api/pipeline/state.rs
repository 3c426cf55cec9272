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

//! The packed 64-bit render state of a draw call.
//!
//! Layout (bit ranges are inclusive):
//!
//! | bits   | field                                               |
//! |--------|-----------------------------------------------------|
//! | 0..=4  | color channel and depth writes                      |
//! | 8..=11 | depth test ([`CompareOp`] encoding)                 |
//! | 12..=27| blend factors: src rgb, dst rgb, src alpha, dst alpha |
//! | 28..=33| blend equations: rgb, alpha                         |
//! | 36..=37| cull mode                                           |
//! | 40..=47| alpha reference                                     |
//! | 48..=50| primitive topology                                  |
//! | 52..=57| MSAA, line AA, conservative raster, front CCW, independent blend, alpha to coverage |

use super::enums::{BlendEquation, BlendFactor, CompareOp, CullMode, PrimitiveTopology};
use crate::prism_bitflags;

/// Bit position of the depth test field.
pub const STATE_DEPTH_TEST_SHIFT: u32 = 8;
/// Bit position of the blend factor field.
pub const STATE_BLEND_SHIFT: u32 = 12;
/// Bit position of the blend equation field.
pub const STATE_BLEND_EQUATION_SHIFT: u32 = 28;
/// Bit position of the cull field.
pub const STATE_CULL_SHIFT: u32 = 36;
/// Bit position of the alpha reference field.
pub const STATE_ALPHA_REF_SHIFT: u32 = 40;
/// Bit position of the primitive topology field.
pub const STATE_PT_SHIFT: u32 = 48;

prism_bitflags! {
    /// Packed render state of a draw call.
    pub struct StateFlags: u64 {
        /// Write red.
        const WRITE_R = 1 << 0;
        /// Write green.
        const WRITE_G = 1 << 1;
        /// Write blue.
        const WRITE_B = 1 << 2;
        /// Write alpha.
        const WRITE_A = 1 << 3;
        /// Write depth.
        const WRITE_Z = 1 << 4;
        /// Write red, green and blue.
        const WRITE_RGB = 0x7;
        /// All write bits.
        const WRITE_MASK = 0x1f;

        /// Depth test: less.
        const DEPTH_TEST_LESS = 1 << 8;
        /// Depth test: less or equal.
        const DEPTH_TEST_LEQUAL = 2 << 8;
        /// Depth test: equal.
        const DEPTH_TEST_EQUAL = 3 << 8;
        /// Depth test: greater or equal.
        const DEPTH_TEST_GEQUAL = 4 << 8;
        /// Depth test: greater.
        const DEPTH_TEST_GREATER = 5 << 8;
        /// Depth test: not equal.
        const DEPTH_TEST_NOTEQUAL = 6 << 8;
        /// Depth test: never.
        const DEPTH_TEST_NEVER = 7 << 8;
        /// Depth test: always.
        const DEPTH_TEST_ALWAYS = 8 << 8;
        /// Depth test field.
        const DEPTH_TEST_MASK = 0xf << 8;

        /// Blend factor field.
        const BLEND_MASK = 0xffff << 12;
        /// Blend equation field.
        const BLEND_EQUATION_MASK = 0x3f << 28;

        /// Cull clockwise faces.
        const CULL_CW = 1 << 36;
        /// Cull counter-clockwise faces.
        const CULL_CCW = 2 << 36;
        /// Cull field.
        const CULL_MASK = 3 << 36;

        /// Alpha reference field.
        const ALPHA_REF_MASK = 0xff << 40;

        /// Triangle strip topology.
        const PT_TRISTRIP = 1 << 48;
        /// Line list topology.
        const PT_LINES = 2 << 48;
        /// Line strip topology.
        const PT_LINESTRIP = 3 << 48;
        /// Point list topology.
        const PT_POINTS = 4 << 48;
        /// Topology field.
        const PT_MASK = 7 << 48;

        /// Multisampled rasterization.
        const MSAA = 1 << 52;
        /// Antialiased lines.
        const LINEAA = 1 << 53;
        /// Conservative rasterization.
        const CONSERVATIVE_RASTER = 1 << 54;
        /// Counter-clockwise faces are front faces.
        const FRONT_CCW = 1 << 55;
        /// Each color attachment uses its own blend state.
        const BLEND_INDEPENDENT = 1 << 56;
        /// Alpha to coverage.
        const BLEND_ALPHA_TO_COVERAGE = 1 << 57;

        /// Writes everything, depth test less, cull clockwise, MSAA.
        const DEFAULT = 0x1f | (1 << 8) | (1 << 36) | (1 << 52);
    }
}

/// The blend state decoded from a [`StateFlags`] word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Source factor for color.
    pub src_rgb: BlendFactor,
    /// Destination factor for color.
    pub dst_rgb: BlendFactor,
    /// Source factor for alpha.
    pub src_alpha: BlendFactor,
    /// Destination factor for alpha.
    pub dst_alpha: BlendFactor,
    /// Equation for color.
    pub equation_rgb: BlendEquation,
    /// Equation for alpha.
    pub equation_alpha: BlendEquation,
}

impl StateFlags {
    /// Standard alpha blending.
    pub const BLEND_ALPHA: Self = Self::blend_func(BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha);
    /// Additive blending.
    pub const BLEND_ADD: Self = Self::blend_func(BlendFactor::One, BlendFactor::One);

    /// Same blend factors for color and alpha.
    pub const fn blend_func(src: BlendFactor, dst: BlendFactor) -> Self {
        Self::blend_func_separate(src, dst, src, dst)
    }

    /// Separate blend factors for color and alpha.
    pub const fn blend_func_separate(
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) -> Self {
        let packed =
            src_rgb.bits() | (dst_rgb.bits() << 4) | (src_alpha.bits() << 8) | (dst_alpha.bits() << 12);
        Self::from_bits(packed << STATE_BLEND_SHIFT)
    }

    /// Separate blend equations for color and alpha.
    pub const fn blend_equation(rgb: BlendEquation, alpha: BlendEquation) -> Self {
        Self::from_bits(((rgb as u64) | ((alpha as u64) << 3)) << STATE_BLEND_EQUATION_SHIFT)
    }

    /// Alpha reference value used by the alpha-test predefined uniform.
    pub const fn alpha_ref(value: u8) -> Self {
        Self::from_bits((value as u64) << STATE_ALPHA_REF_SHIFT)
    }

    /// The depth test, if enabled.
    pub fn depth_test(&self) -> Option<CompareOp> {
        CompareOp::from_bits(self.field(Self::DEPTH_TEST_MASK, STATE_DEPTH_TEST_SHIFT))
    }

    /// The cull mode.
    pub fn cull_mode(&self) -> CullMode {
        match self.field(Self::CULL_MASK, STATE_CULL_SHIFT) {
            1 => CullMode::Cw,
            2 => CullMode::Ccw,
            _ => CullMode::None,
        }
    }

    /// The primitive topology.
    pub fn topology(&self) -> PrimitiveTopology {
        match self.field(Self::PT_MASK, STATE_PT_SHIFT) {
            1 => PrimitiveTopology::TriangleStrip,
            2 => PrimitiveTopology::LineList,
            3 => PrimitiveTopology::LineStrip,
            4 => PrimitiveTopology::PointList,
            _ => PrimitiveTopology::TriangleList,
        }
    }

    /// The blend state, if blending is enabled.
    pub fn blend(&self) -> Option<BlendState> {
        let packed = self.field(Self::BLEND_MASK, STATE_BLEND_SHIFT);
        if packed == 0 {
            return None;
        }
        let factor = |shift: u32| BlendFactor::from_bits((packed >> shift) & 0xf);
        let equations = self.field(Self::BLEND_EQUATION_MASK, STATE_BLEND_EQUATION_SHIFT);
        Some(BlendState {
            src_rgb: factor(0).unwrap_or(BlendFactor::One),
            dst_rgb: factor(4).unwrap_or(BlendFactor::Zero),
            src_alpha: factor(8).unwrap_or(BlendFactor::One),
            dst_alpha: factor(12).unwrap_or(BlendFactor::Zero),
            equation_rgb: BlendEquation::from_bits(equations & 0x7),
            equation_alpha: BlendEquation::from_bits(equations >> 3),
        })
    }

    /// The alpha reference value.
    pub fn alpha_ref_value(&self) -> u8 {
        self.field(Self::ALPHA_REF_MASK, STATE_ALPHA_REF_SHIFT) as u8
    }

    /// Returns `true` if the blend state reads the blend constant.
    pub fn uses_blend_constant(&self) -> bool {
        self.blend().is_some_and(|b| {
            b.src_rgb.uses_constant()
                || b.dst_rgb.uses_constant()
                || b.src_alpha.uses_constant()
                || b.dst_alpha.uses_constant()
        })
    }

    /// Transparency class used by the sort key: 0 opaque, 1 blended.
    pub fn transparency_class(&self) -> u8 {
        u8::from(self.intersects(Self::BLEND_MASK))
    }

    /// The bits that select a pipeline. The alpha reference is a uniform and
    /// never forces a new pipeline.
    pub fn pipeline_bits(&self) -> u64 {
        self.without(Self::ALPHA_REF_MASK).bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_decodes() {
        let state = StateFlags::DEFAULT;
        assert_eq!(state.depth_test(), Some(CompareOp::Less));
        assert_eq!(state.cull_mode(), CullMode::Cw);
        assert_eq!(state.topology(), PrimitiveTopology::TriangleList);
        assert!(state.contains(StateFlags::WRITE_Z | StateFlags::WRITE_RGB));
        assert!(state.blend().is_none());
        assert_eq!(state.transparency_class(), 0);
    }

    #[test]
    fn blend_fields_round_trip() {
        let state = StateFlags::DEFAULT
            | StateFlags::BLEND_ALPHA
            | StateFlags::blend_equation(BlendEquation::Add, BlendEquation::Max);
        let blend = state.blend();
        assert_eq!(
            blend.map(|b| (b.src_rgb, b.dst_rgb, b.equation_alpha)),
            Some((BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha, BlendEquation::Max))
        );
        assert_eq!(state.transparency_class(), 1);
        assert!(!state.uses_blend_constant());
        assert!(StateFlags::blend_func(BlendFactor::Factor, BlendFactor::Zero).uses_blend_constant());
    }

    #[test]
    fn alpha_ref_is_not_part_of_the_pipeline() {
        let a = StateFlags::DEFAULT | StateFlags::alpha_ref(10);
        let b = StateFlags::DEFAULT | StateFlags::alpha_ref(200);
        assert_eq!(a.alpha_ref_value(), 10);
        assert_eq!(a.pipeline_bits(), b.pipeline_bits());
        assert_ne!(a.pipeline_bits(), (a | StateFlags::PT_LINES).pipeline_bits());
    }
}
