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

//! Initialization parameters of a renderer.

use super::flags::{CapsFlags, DebugFlags, ResetFlags};
use super::{
    DEFAULT_IMAGE_VIEW_CACHE_CAPACITY, MAX_BLIT_ITEMS, MAX_DRAW_CALLS, MAX_FRAMES_IN_FLIGHT,
    MAX_FRAMES_IN_FLIGHT_LIMIT, MAX_MATRIX_CACHE, MAX_RECT_CACHE, MAX_SEMAPHORES,
};
use crate::renderer::api::resource::TextureFormat;
use serde::{Deserialize, Serialize};

/// The kind of backend a renderer context implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RendererType {
    /// Accepts every frame and renders nothing.
    Noop,
    /// The explicit backend driving a native device.
    #[default]
    Explicit,
}

/// Back buffer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    /// Back buffer color format.
    pub format: TextureFormat,
    /// Back buffer width in pixels.
    pub width: u32,
    /// Back buffer height in pixels.
    pub height: u32,
    /// Reset flags (vsync, MSAA, ...).
    pub reset: ResetFlags,
    /// Requested number of swap chain images.
    pub num_back_buffers: u8,
    /// Frames the CPU may record ahead of the GPU. Zero selects the default.
    pub max_frame_latency: u8,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            format: TextureFormat::Bgra8,
            width: 1280,
            height: 720,
            reset: ResetFlags::EMPTY,
            num_back_buffers: 2,
            max_frame_latency: 0,
        }
    }
}

impl Resolution {
    /// Number of frame-in-flight slots this resolution asks for.
    pub fn frames_in_flight(&self) -> usize {
        match self.max_frame_latency {
            0 => MAX_FRAMES_IN_FLIGHT,
            n => (n as usize).clamp(1, MAX_FRAMES_IN_FLIGHT_LIMIT),
        }
    }

    /// Returns `true` if either dimension is zero (e.g. a minimized window).
    pub fn is_zero_sized(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Soft capacities of the frame log and the backend's per-frame resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Sort keys per frame. Submissions beyond it are dropped and counted.
    pub max_draw_calls: u32,
    /// Blits per frame.
    pub max_blits: u32,
    /// Transforms per frame.
    pub max_matrices: u32,
    /// Scissor rectangles per frame.
    pub max_rects: u32,
    /// Bytes of uniform updates a frame can log.
    pub uniform_log_size: u32,
    /// Bytes of transient vertex data per frame.
    pub transient_vb_size: u32,
    /// Bytes of transient index data per frame.
    pub transient_ib_size: u32,
    /// Bytes of the per-slot uniform scratch buffer.
    pub scratch_buffer_size: u32,
    /// Bytes of the per-slot staging scratch buffer.
    pub staging_buffer_size: u32,
    /// Descriptor sets the pool can hold at once.
    pub max_descriptor_sets: u32,
    /// Capacity of the image-view cache.
    pub image_view_cache_capacity: u32,
    /// Wait or signal semaphores per submission.
    pub max_semaphores: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_draw_calls: MAX_DRAW_CALLS as u32,
            max_blits: MAX_BLIT_ITEMS as u32,
            max_matrices: MAX_MATRIX_CACHE as u32,
            max_rects: MAX_RECT_CACHE as u32,
            uniform_log_size: 1 << 20,
            transient_vb_size: 6 << 20,
            transient_ib_size: 2 << 20,
            scratch_buffer_size: 4 << 20,
            staging_buffer_size: 16 << 20,
            max_descriptor_sets: 4096,
            image_view_cache_capacity: DEFAULT_IMAGE_VIEW_CACHE_CAPACITY as u32,
            max_semaphores: MAX_SEMAPHORES as u32,
        }
    }
}

/// Opaque platform handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformData {
    /// Native window handle used to create the presentation surface, if any.
    pub window: Option<u64>,
}

/// Everything needed to initialize a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Init {
    /// Which backend to create.
    pub renderer_type: RendererType,
    /// Back buffer configuration.
    pub resolution: Resolution,
    /// Frame log and backend capacities.
    pub limits: Limits,
    /// Platform handles.
    pub platform_data: PlatformData,
    /// Debug features enabled at startup.
    pub debug: DebugFlags,
    /// Enables per-frame CPU timing.
    pub profile: bool,
    /// Features the backend is allowed to expose.
    pub capabilities: CapsFlags,
}

impl Default for Init {
    fn default() -> Self {
        Self {
            renderer_type: RendererType::default(),
            resolution: Resolution::default(),
            limits: Limits::default(),
            platform_data: PlatformData::default(),
            debug: DebugFlags::EMPTY,
            profile: false,
            capabilities: CapsFlags::ALL,
        }
    }
}

impl Init {
    /// Parses an `Init` from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Number of frame-in-flight slots the backend will create.
    pub fn frames_in_flight(&self) -> usize {
        self.resolution.frames_in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() -> Result<(), serde_json::Error> {
        let init = Init::from_json(
            r#"{ "resolution": { "width": 640, "height": 480, "reset": 1 },
                 "limits": { "max_draw_calls": 128 } }"#,
        )?;
        assert_eq!(init.resolution.width, 640);
        assert_eq!(init.resolution.reset, ResetFlags::VSYNC);
        assert_eq!(init.resolution.format, TextureFormat::Bgra8);
        assert_eq!(init.limits.max_draw_calls, 128);
        assert_eq!(init.limits.max_blits, MAX_BLIT_ITEMS as u32);
        assert_eq!(init.capabilities, CapsFlags::ALL);
        Ok(())
    }

    #[test]
    fn frames_in_flight_is_clamped() {
        let mut res = Resolution::default();
        assert_eq!(res.frames_in_flight(), MAX_FRAMES_IN_FLIGHT);
        res.max_frame_latency = 9;
        assert_eq!(res.frames_in_flight(), MAX_FRAMES_IN_FLIGHT_LIMIT);
        res.max_frame_latency = 1;
        assert_eq!(res.frames_in_flight(), 1);
    }
}
