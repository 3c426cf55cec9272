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

//! Packed per-face stencil state.
//!
//! One face fits in 32 bits: reference (0..=7), read mask (8..=15), test
//! (16..=19), and the fail-stencil / fail-depth / pass operations (20..=31).
//! A draw stores both faces in a `u64`, front in the low half.

use super::enums::{CompareOp, StencilOp};
use crate::prism_bitflags;

/// Bit position of the stencil read mask.
pub const STENCIL_READ_MASK_SHIFT: u32 = 8;
/// Bit position of the stencil test.
pub const STENCIL_TEST_SHIFT: u32 = 16;
/// Bit position of the stencil-fail operation.
pub const STENCIL_OP_FAIL_S_SHIFT: u32 = 20;
/// Bit position of the depth-fail operation.
pub const STENCIL_OP_FAIL_Z_SHIFT: u32 = 24;
/// Bit position of the pass operation.
pub const STENCIL_OP_PASS_Z_SHIFT: u32 = 28;

prism_bitflags! {
    /// Packed stencil state of one face.
    pub struct StencilFlags: u32 {
        /// Reference value field.
        const REF_MASK = 0xff;
        /// Read mask field.
        const READ_MASK_MASK = 0xff << 8;
        /// Test field.
        const TEST_MASK = 0xf << 16;
        /// Stencil-fail operation field.
        const OP_FAIL_S_MASK = 0xf << 20;
        /// Depth-fail operation field.
        const OP_FAIL_Z_MASK = 0xf << 24;
        /// Pass operation field.
        const OP_PASS_Z_MASK = 0xf << 28;
    }
}

/// A decoded stencil face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFace {
    /// Comparison against the reference.
    pub test: CompareOp,
    /// Bits read from the stencil buffer.
    pub read_mask: u8,
    /// Operation when the stencil test fails.
    pub fail_stencil: StencilOp,
    /// Operation when the depth test fails.
    pub fail_depth: StencilOp,
    /// Operation when both tests pass.
    pub pass: StencilOp,
}

impl StencilFlags {
    /// Builds a face from its parts.
    pub fn face(
        test: CompareOp,
        reference: u8,
        read_mask: u8,
        fail_stencil: StencilOp,
        fail_depth: StencilOp,
        pass: StencilOp,
    ) -> Self {
        Self::EMPTY
            .with_field(Self::REF_MASK, 0, reference as u32)
            .with_field(Self::READ_MASK_MASK, STENCIL_READ_MASK_SHIFT, read_mask as u32)
            .with_field(Self::TEST_MASK, STENCIL_TEST_SHIFT, test.bits() as u32)
            .with_field(Self::OP_FAIL_S_MASK, STENCIL_OP_FAIL_S_SHIFT, fail_stencil as u32)
            .with_field(Self::OP_FAIL_Z_MASK, STENCIL_OP_FAIL_Z_SHIFT, fail_depth as u32)
            .with_field(Self::OP_PASS_Z_MASK, STENCIL_OP_PASS_Z_SHIFT, pass as u32)
    }

    /// The reference value.
    pub fn reference(&self) -> u8 {
        self.field(Self::REF_MASK, 0) as u8
    }

    /// Decodes the face, or `None` if the stencil test is disabled.
    pub fn decode(&self) -> Option<StencilFace> {
        let test = CompareOp::from_bits(self.field(Self::TEST_MASK, STENCIL_TEST_SHIFT) as u64)?;
        Some(StencilFace {
            test,
            read_mask: self.field(Self::READ_MASK_MASK, STENCIL_READ_MASK_SHIFT) as u8,
            fail_stencil: StencilOp::from_bits(
                self.field(Self::OP_FAIL_S_MASK, STENCIL_OP_FAIL_S_SHIFT),
            ),
            fail_depth: StencilOp::from_bits(
                self.field(Self::OP_FAIL_Z_MASK, STENCIL_OP_FAIL_Z_SHIFT),
            ),
            pass: StencilOp::from_bits(self.field(Self::OP_PASS_Z_MASK, STENCIL_OP_PASS_Z_SHIFT)),
        })
    }
}

/// Packs front and back faces into one word. An empty back face mirrors the front.
pub fn pack_stencil(front: StencilFlags, back: StencilFlags) -> u64 {
    let back = if back.is_empty() { front } else { back };
    front.bits() as u64 | ((back.bits() as u64) << 32)
}

/// Splits a packed stencil word into front and back faces.
pub fn unpack_stencil(packed: u64) -> (StencilFlags, StencilFlags) {
    (
        StencilFlags::from_bits(packed as u32),
        StencilFlags::from_bits((packed >> 32) as u32),
    )
}

/// The packed stencil word with both reference values cleared. Reference
/// values are dynamic state and never select a pipeline.
pub fn stencil_pipeline_bits(packed: u64) -> u64 {
    let refs = StencilFlags::REF_MASK.bits() as u64;
    packed & !(refs | (refs << 32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_round_trips() {
        let face = StencilFlags::face(
            CompareOp::Equal,
            7,
            0xff,
            StencilOp::Keep,
            StencilOp::Zero,
            StencilOp::Replace,
        );
        assert_eq!(face.reference(), 7);
        let decoded = face.decode();
        assert_eq!(decoded.map(|f| f.test), Some(CompareOp::Equal));
        assert_eq!(decoded.map(|f| f.pass), Some(StencilOp::Replace));
        assert_eq!(decoded.map(|f| f.fail_depth), Some(StencilOp::Zero));
        assert!(StencilFlags::EMPTY.decode().is_none());
    }

    #[test]
    fn empty_back_face_mirrors_front() {
        let front = StencilFlags::face(
            CompareOp::Always,
            1,
            0xff,
            StencilOp::Keep,
            StencilOp::Keep,
            StencilOp::Replace,
        );
        let (f, b) = unpack_stencil(pack_stencil(front, StencilFlags::EMPTY));
        assert_eq!(f, front);
        assert_eq!(b, front);
    }

    #[test]
    fn reference_is_masked_out_of_pipeline_bits() {
        let a = StencilFlags::face(CompareOp::Less, 1, 0xff, StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        let b = StencilFlags::face(CompareOp::Less, 9, 0xff, StencilOp::Keep, StencilOp::Keep, StencilOp::Keep);
        assert_eq!(
            stencil_pipeline_bits(pack_stencil(a, a)),
            stencil_pipeline_bits(pack_stencil(b, b))
        );
    }
}
