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

//! The 64-bit sort key of render items.
//!
//! ```text
//! 63      56 55 54 53 52                                            0
//! | view    | D | type | payload (depends on the view mode)           |
//! ```
//!
//! `D` is set for draws and clear for compute, so compute work sorts before the
//! draws of the same view. The draw type records which payload layout is used,
//! which makes decoding lossless without knowing the view mode.
//!
//! | payload     | fields (high to low)                         |
//! |-------------|----------------------------------------------|
//! | `Default`   | transparency(2) program(11) depth(32)        |
//! | `Sequential`| seq(20) transparency(2) program(11)          |
//! | `Depth*`    | depth(32) transparency(2) program(11)        |
//! | compute     | seq(20) program(11)                          |

use super::view::{ViewId, ViewMode};
use crate::renderer::api::resource::ProgramHandle;

/// Bit position of the view id.
pub const SORT_KEY_VIEW_SHIFT: u32 = 56;
/// Set for draw items.
pub const SORT_KEY_DRAW_BIT: u64 = 1 << 55;
/// Bit position of the draw type.
pub const SORT_KEY_DRAW_TYPE_SHIFT: u32 = 53;

/// Bits used by the sequence counter.
pub const SORT_KEY_SEQ_BITS: u32 = 20;
/// Largest sequence number that fits in a key.
pub const SORT_KEY_SEQ_MAX: u32 = (1 << SORT_KEY_SEQ_BITS) - 1;
/// Bits used by the program index.
pub const SORT_KEY_PROGRAM_BITS: u32 = 11;
const PROGRAM_MASK: u64 = (1 << SORT_KEY_PROGRAM_BITS) - 1;
const SEQ_MASK: u64 = SORT_KEY_SEQ_MAX as u64;
const TRANS_MASK: u64 = 0x3;
const DEPTH_MASK: u64 = 0xffff_ffff;

// Default draw layout.
const DEFAULT_TRANS_SHIFT: u32 = 51;
const DEFAULT_PROGRAM_SHIFT: u32 = 40;
const DEFAULT_DEPTH_SHIFT: u32 = 8;

// Sequential draw layout.
const SEQ_SEQ_SHIFT: u32 = 33;
const SEQ_TRANS_SHIFT: u32 = 31;
const SEQ_PROGRAM_SHIFT: u32 = 20;

// Depth ordered draw layout.
const DEPTH_DEPTH_SHIFT: u32 = 21;
const DEPTH_TRANS_SHIFT: u32 = 19;
const DEPTH_PROGRAM_SHIFT: u32 = 8;

// Compute layout.
const COMPUTE_SEQ_SHIFT: u32 = 35;
const COMPUTE_PROGRAM_SHIFT: u32 = 24;

const DRAW_TYPE_DEFAULT: u64 = 0;
const DRAW_TYPE_SEQUENTIAL: u64 = 1;
const DRAW_TYPE_DEPTH: u64 = 2;

/// Maps a float depth to a `u32` with the same ordering.
pub fn depth_to_bits(depth: f32) -> u32 {
    let bits = depth.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

/// Inverse of [`depth_to_bits`].
pub fn bits_to_depth(bits: u32) -> f32 {
    if bits & 0x8000_0000 != 0 {
        f32::from_bits(bits & 0x7fff_ffff)
    } else {
        f32::from_bits(!bits)
    }
}

/// The fields of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortKey {
    /// The view.
    pub view: ViewId,
    /// Draw or compute.
    pub is_draw: bool,
    /// Ordering mode the key was encoded with. Always `Sequential` for compute.
    pub mode: ViewMode,
    /// Transparency class (0 opaque, 1 blended).
    pub trans: u8,
    /// Program.
    pub program: ProgramHandle,
    /// Order-preserving depth bits, see [`depth_to_bits`].
    pub depth: u32,
    /// Per-view submission sequence.
    pub seq: u32,
}

impl SortKey {
    /// Encodes the key. Fields outside their bit range are truncated.
    pub fn encode(&self) -> u64 {
        let view = (self.view as u64 & 0xff) << SORT_KEY_VIEW_SHIFT;
        let program = self.program.0 as u64 & PROGRAM_MASK;
        let seq = self.seq as u64 & SEQ_MASK;
        let trans = self.trans as u64 & TRANS_MASK;
        let depth = self.depth as u64;

        if !self.is_draw {
            return view | (seq << COMPUTE_SEQ_SHIFT) | (program << COMPUTE_PROGRAM_SHIFT);
        }

        let payload = match self.mode {
            ViewMode::Default => {
                (DRAW_TYPE_DEFAULT << SORT_KEY_DRAW_TYPE_SHIFT)
                    | (trans << DEFAULT_TRANS_SHIFT)
                    | (program << DEFAULT_PROGRAM_SHIFT)
                    | (depth << DEFAULT_DEPTH_SHIFT)
            }
            ViewMode::Sequential => {
                (DRAW_TYPE_SEQUENTIAL << SORT_KEY_DRAW_TYPE_SHIFT)
                    | (seq << SEQ_SEQ_SHIFT)
                    | (trans << SEQ_TRANS_SHIFT)
                    | (program << SEQ_PROGRAM_SHIFT)
            }
            ViewMode::DepthAscending | ViewMode::DepthDescending => {
                let depth = if self.mode == ViewMode::DepthDescending {
                    !self.depth as u64
                } else {
                    depth
                };
                (DRAW_TYPE_DEPTH << SORT_KEY_DRAW_TYPE_SHIFT)
                    | (depth << DEPTH_DEPTH_SHIFT)
                    | (trans << DEPTH_TRANS_SHIFT)
                    | (program << DEPTH_PROGRAM_SHIFT)
            }
        };
        view | SORT_KEY_DRAW_BIT | payload
    }

    /// Decodes a key produced by [`encode`](Self::encode).
    ///
    /// The sequence number is only recovered for sequential and compute keys,
    /// and the depth only for depth-carrying keys. Depth-ordered keys decode as
    /// [`ViewMode::DepthAscending`] because both depth modes share one layout.
    pub fn decode(key: u64) -> SortKey {
        let view = Self::decode_view(key);
        if Self::is_compute(key) {
            return SortKey {
                view,
                is_draw: false,
                mode: ViewMode::Sequential,
                trans: 0,
                program: ProgramHandle(((key >> COMPUTE_PROGRAM_SHIFT) & PROGRAM_MASK) as u16),
                depth: 0,
                seq: ((key >> COMPUTE_SEQ_SHIFT) & SEQ_MASK) as u32,
            };
        }

        let field = |shift: u32, mask: u64| (key >> shift) & mask;
        match field(SORT_KEY_DRAW_TYPE_SHIFT, 0x3) {
            DRAW_TYPE_SEQUENTIAL => SortKey {
                view,
                is_draw: true,
                mode: ViewMode::Sequential,
                trans: field(SEQ_TRANS_SHIFT, TRANS_MASK) as u8,
                program: ProgramHandle(field(SEQ_PROGRAM_SHIFT, PROGRAM_MASK) as u16),
                depth: 0,
                seq: field(SEQ_SEQ_SHIFT, SEQ_MASK) as u32,
            },
            DRAW_TYPE_DEPTH => SortKey {
                view,
                is_draw: true,
                mode: ViewMode::DepthAscending,
                trans: field(DEPTH_TRANS_SHIFT, TRANS_MASK) as u8,
                program: ProgramHandle(field(DEPTH_PROGRAM_SHIFT, PROGRAM_MASK) as u16),
                depth: field(DEPTH_DEPTH_SHIFT, DEPTH_MASK) as u32,
                seq: 0,
            },
            _ => SortKey {
                view,
                is_draw: true,
                mode: ViewMode::Default,
                trans: field(DEFAULT_TRANS_SHIFT, TRANS_MASK) as u8,
                program: ProgramHandle(field(DEFAULT_PROGRAM_SHIFT, PROGRAM_MASK) as u16),
                depth: field(DEFAULT_DEPTH_SHIFT, DEPTH_MASK) as u32,
                seq: 0,
            },
        }
    }

    /// The view of an encoded key.
    pub fn decode_view(key: u64) -> ViewId {
        (key >> SORT_KEY_VIEW_SHIFT) as ViewId
    }

    /// Returns `true` if the encoded key belongs to a compute item.
    pub fn is_compute(key: u64) -> bool {
        key & SORT_KEY_DRAW_BIT == 0
    }
}

/// Encodes the sort key of a blit: view first, then submission order.
pub fn encode_blit_key(view: ViewId, index: u16) -> u32 {
    ((view as u32) << 16) | index as u32
}

/// Splits a blit key into view and item index.
pub fn decode_blit_key(key: u32) -> (ViewId, u16) {
    ((key >> 16) as ViewId, key as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(view: ViewId, mode: ViewMode) -> SortKey {
        SortKey {
            view,
            is_draw: true,
            mode,
            ..Default::default()
        }
    }

    #[test]
    fn depth_bits_preserve_order() {
        let values = [-100.0f32, -1.5, -0.0, 0.0, 0.25, 1.0, 1000.0];
        let bits: Vec<u32> = values.iter().map(|d| depth_to_bits(*d)).collect();
        assert!(bits.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(bits_to_depth(depth_to_bits(0.25)), 0.25);
        assert_eq!(bits_to_depth(depth_to_bits(-1.5)), -1.5);
    }

    #[test]
    fn view_and_compute_flag_decode_losslessly() {
        for mode in [
            ViewMode::Default,
            ViewMode::Sequential,
            ViewMode::DepthAscending,
            ViewMode::DepthDescending,
        ] {
            let key = SortKey {
                program: ProgramHandle(42),
                seq: 7,
                depth: 99,
                trans: 1,
                ..draw(200, mode)
            }
            .encode();
            let decoded = SortKey::decode(key);
            assert_eq!(decoded.view, 200);
            assert!(decoded.is_draw);
            assert_eq!(decoded.program, ProgramHandle(42));
            assert_eq!(decoded.trans, 1);
        }

        let compute = SortKey {
            view: 3,
            program: ProgramHandle(5),
            seq: 11,
            ..Default::default()
        };
        let decoded = SortKey::decode(compute.encode());
        assert!(!decoded.is_draw);
        assert_eq!((decoded.view, decoded.seq, decoded.program), (3, 11, ProgramHandle(5)));
    }

    #[test]
    fn views_order_before_everything_else() {
        let late_view = SortKey {
            seq: 0,
            ..draw(1, ViewMode::Sequential)
        };
        let early_view = SortKey {
            seq: SORT_KEY_SEQ_MAX,
            program: ProgramHandle(2047),
            ..draw(0, ViewMode::Sequential)
        };
        assert!(early_view.encode() < late_view.encode());
    }

    #[test]
    fn compute_sorts_before_draws_of_the_same_view() {
        let compute = SortKey {
            view: 4,
            seq: SORT_KEY_SEQ_MAX,
            ..Default::default()
        };
        assert!(compute.encode() < draw(4, ViewMode::Default).encode());
        assert!(compute.encode() > draw(3, ViewMode::Default).encode());
    }

    #[test]
    fn sequential_keys_follow_submission_order() {
        let keys: Vec<u64> = (0..10)
            .map(|seq| {
                SortKey {
                    seq,
                    program: ProgramHandle(10 - seq as u16),
                    ..draw(0, ViewMode::Sequential)
                }
                .encode()
            })
            .collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn default_mode_puts_blended_after_opaque_then_groups_programs() {
        let opaque_far = SortKey {
            program: ProgramHandle(9),
            depth: depth_to_bits(100.0),
            ..draw(0, ViewMode::Default)
        };
        let blended_near = SortKey {
            trans: 1,
            program: ProgramHandle(1),
            depth: depth_to_bits(0.1),
            ..draw(0, ViewMode::Default)
        };
        assert!(opaque_far.encode() < blended_near.encode());

        let same_program_near = SortKey {
            program: ProgramHandle(9),
            depth: depth_to_bits(1.0),
            ..draw(0, ViewMode::Default)
        };
        assert!(same_program_near.encode() < opaque_far.encode());
    }

    #[test]
    fn depth_descending_reverses_depth_order() {
        let near = SortKey {
            depth: depth_to_bits(1.0),
            ..draw(0, ViewMode::DepthDescending)
        };
        let far = SortKey {
            depth: depth_to_bits(10.0),
            ..draw(0, ViewMode::DepthDescending)
        };
        assert!(far.encode() < near.encode());
    }

    #[test]
    fn blit_keys_round_trip() {
        let key = encode_blit_key(12, 345);
        assert_eq!(decode_blit_key(key), (12, 345));
        assert!(encode_blit_key(1, 1000) < encode_blit_key(2, 0));
    }
}
