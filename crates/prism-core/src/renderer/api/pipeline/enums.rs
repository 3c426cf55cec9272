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

//! Enumerations decoded from the packed state words.

/// Comparison function for depth and stencil tests.
///
/// Encoded as `1..=8` in packed words; zero means the test is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Passes if the incoming value is less.
    Less,
    /// Passes if the incoming value is less or equal.
    LessEqual,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the incoming value is greater or equal.
    GreaterEqual,
    /// Passes if the incoming value is greater.
    Greater,
    /// Passes if the values differ.
    NotEqual,
    /// Never passes.
    Never,
    /// Always passes.
    Always,
}

impl CompareOp {
    /// Decodes a packed 4-bit field. Zero and out-of-range values yield `None`.
    pub const fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            1 => Some(CompareOp::Less),
            2 => Some(CompareOp::LessEqual),
            3 => Some(CompareOp::Equal),
            4 => Some(CompareOp::GreaterEqual),
            5 => Some(CompareOp::Greater),
            6 => Some(CompareOp::NotEqual),
            7 => Some(CompareOp::Never),
            8 => Some(CompareOp::Always),
            _ => None,
        }
    }

    /// The packed 4-bit encoding.
    pub const fn bits(self) -> u64 {
        match self {
            CompareOp::Less => 1,
            CompareOp::LessEqual => 2,
            CompareOp::Equal => 3,
            CompareOp::GreaterEqual => 4,
            CompareOp::Greater => 5,
            CompareOp::NotEqual => 6,
            CompareOp::Never => 7,
            CompareOp::Always => 8,
        }
    }
}

/// Blend factor. Encoded as `1..=13` in packed words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0.
    Zero,
    /// 1.
    One,
    /// Source color.
    SrcColor,
    /// 1 - source color.
    InvSrcColor,
    /// Source alpha.
    SrcAlpha,
    /// 1 - source alpha.
    InvSrcAlpha,
    /// Destination alpha.
    DstAlpha,
    /// 1 - destination alpha.
    InvDstAlpha,
    /// Destination color.
    DstColor,
    /// 1 - destination color.
    InvDstColor,
    /// min(source alpha, 1 - destination alpha).
    SrcAlphaSat,
    /// The blend constant.
    Factor,
    /// 1 - the blend constant.
    InvFactor,
}

impl BlendFactor {
    const ALL: [BlendFactor; 13] = [
        BlendFactor::Zero,
        BlendFactor::One,
        BlendFactor::SrcColor,
        BlendFactor::InvSrcColor,
        BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha,
        BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha,
        BlendFactor::DstColor,
        BlendFactor::InvDstColor,
        BlendFactor::SrcAlphaSat,
        BlendFactor::Factor,
        BlendFactor::InvFactor,
    ];

    /// Decodes a packed 4-bit field.
    pub fn from_bits(bits: u64) -> Option<Self> {
        bits.checked_sub(1)
            .and_then(|i| Self::ALL.get(i as usize))
            .copied()
    }

    /// The packed 4-bit encoding.
    pub const fn bits(self) -> u64 {
        self as u64 + 1
    }

    /// Returns `true` if the factor reads the blend constant.
    pub const fn uses_constant(self) -> bool {
        matches!(self, BlendFactor::Factor | BlendFactor::InvFactor)
    }
}

/// Blend equation. Encoded as `0..=4` in packed words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendEquation {
    /// src + dst.
    #[default]
    Add,
    /// src - dst.
    Sub,
    /// dst - src.
    RevSub,
    /// min(src, dst).
    Min,
    /// max(src, dst).
    Max,
}

impl BlendEquation {
    /// Decodes a packed 3-bit field.
    pub const fn from_bits(bits: u64) -> Self {
        match bits {
            1 => BlendEquation::Sub,
            2 => BlendEquation::RevSub,
            3 => BlendEquation::Min,
            4 => BlendEquation::Max,
            _ => BlendEquation::Add,
        }
    }
}

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    #[default]
    None,
    /// Cull clockwise faces.
    Cw,
    /// Cull counter-clockwise faces.
    Ccw,
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
    /// Independent lines.
    LineList,
    /// Line strip.
    LineStrip,
    /// Points.
    PointList,
}

impl PrimitiveTopology {
    /// Number of primitives drawn from `count` vertices or indices.
    pub const fn primitive_count(self, count: u32) -> u32 {
        match self {
            PrimitiveTopology::TriangleList => count / 3,
            PrimitiveTopology::TriangleStrip => count.saturating_sub(2),
            PrimitiveTopology::LineList => count / 2,
            PrimitiveTopology::LineStrip => count.saturating_sub(1),
            PrimitiveTopology::PointList => count,
        }
    }
}

/// Stencil operation. Encoded as `0..=7` in packed words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    /// Write zero.
    Zero,
    /// Keep the current value.
    Keep,
    /// Write the reference value.
    Replace,
    /// Increment and wrap.
    IncrWrap,
    /// Increment and clamp.
    IncrSat,
    /// Decrement and wrap.
    DecrWrap,
    /// Decrement and clamp.
    DecrSat,
    /// Bitwise invert.
    Invert,
}

impl StencilOp {
    /// Decodes a packed 4-bit field.
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            0 => StencilOp::Zero,
            2 => StencilOp::Replace,
            3 => StencilOp::IncrWrap,
            4 => StencilOp::IncrSat,
            5 => StencilOp::DecrWrap,
            6 => StencilOp::DecrSat,
            7 => StencilOp::Invert,
            _ => StencilOp::Keep,
        }
    }
}
