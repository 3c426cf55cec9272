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

//! Reset, debug and capability flag words.

use crate::prism_bitflags;
use serde::{Deserialize, Serialize};

prism_bitflags! {
    /// Flags applied when the back buffer is (re)created.
    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ResetFlags: u32 {
        /// Wait for vertical blank when presenting.
        const VSYNC = 1 << 0;
        /// 2x multisampled back buffer.
        const MSAA_X2 = 1 << 4;
        /// 4x multisampled back buffer.
        const MSAA_X4 = 2 << 4;
        /// 8x multisampled back buffer.
        const MSAA_X8 = 3 << 4;
        /// 16x multisampled back buffer.
        const MSAA_X16 = 4 << 4;
        /// Mask of the MSAA level field.
        const MSAA_MASK = 7 << 4;
        /// Use the maximum supported anisotropy for anisotropic samplers.
        const MAX_ANISOTROPY = 1 << 8;
        /// Clamp depth instead of clipping.
        const DEPTH_CLAMP = 1 << 9;
        /// sRGB back buffer.
        const SRGB_BACKBUFFER = 1 << 10;
        /// Wait for the GPU after every submission.
        const FLUSH_AFTER_RENDER = 1 << 11;
    }
}

/// Bit position of [`ResetFlags::MSAA_MASK`].
pub const RESET_MSAA_SHIFT: u32 = 4;

impl ResetFlags {
    /// The back buffer sample count selected by the MSAA field.
    pub fn msaa_samples(&self) -> u8 {
        match self.field(Self::MSAA_MASK, RESET_MSAA_SHIFT) {
            0 => 1,
            level => 1 << level.min(4),
        }
    }

    /// Flags whose change invalidates already built pipelines.
    pub fn pipeline_affecting(&self) -> Self {
        *self & (Self::MSAA_MASK | Self::DEPTH_CLAMP)
    }
}

prism_bitflags! {
    /// Debug features of the renderer.
    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DebugFlags: u32 {
        /// Rasterize polygons as lines.
        const WIREFRAME = 1 << 0;
        /// Collect and log frame statistics.
        const STATS = 1 << 1;
        /// Log every recorded native command at trace level.
        const TRACE_COMMANDS = 1 << 2;
    }
}

prism_bitflags! {
    /// Features a backend can expose.
    #[derive(Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct CapsFlags: u64 {
        /// Compute dispatches.
        const COMPUTE = 1 << 0;
        /// Indirect draws and dispatches.
        const DRAW_INDIRECT = 1 << 1;
        /// Indirect draws with a GPU-side draw count.
        const DRAW_INDIRECT_COUNT = 1 << 2;
        /// Conservative rasterization.
        const CONSERVATIVE_RASTER = 1 << 3;
        /// Texture-to-texture copies.
        const TEXTURE_BLIT = 1 << 4;
        /// Instanced draws.
        const INSTANCING = 1 << 5;
        /// 32-bit index buffers.
        const INDEX32 = 1 << 6;
        /// Presentation to a window surface.
        const SWAP_CHAIN = 1 << 7;
        /// Wireframe rasterization.
        const WIREFRAME = 1 << 8;
        /// Every feature.
        const ALL = u64::MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msaa_levels_map_to_sample_counts() {
        assert_eq!(ResetFlags::EMPTY.msaa_samples(), 1);
        assert_eq!(ResetFlags::MSAA_X2.msaa_samples(), 2);
        assert_eq!((ResetFlags::VSYNC | ResetFlags::MSAA_X8).msaa_samples(), 8);
        assert_eq!(ResetFlags::MSAA_X16.msaa_samples(), 16);
    }

    #[test]
    fn vsync_does_not_affect_pipelines() {
        let flags = ResetFlags::VSYNC | ResetFlags::MSAA_X4;
        assert_eq!(flags.pipeline_affecting(), ResetFlags::MSAA_X4);
    }

    #[test]
    fn flags_serialize_as_plain_integers() {
        let json = serde_json::to_string(&ResetFlags::VSYNC).unwrap_or_default();
        assert_eq!(json, "1");
        let back: ResetFlags = serde_json::from_str("1").unwrap_or_default();
        assert_eq!(back, ResetFlags::VSYNC);
    }
}
