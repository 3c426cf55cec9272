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

//! Capabilities reported by a renderer backend.

use super::flags::CapsFlags;
use super::init::RendererType;
use super::{MAX_DRAW_CALLS, MAX_FRAME_BUFFER_ATTACHMENTS, MAX_VIEWS};

/// What a backend supports, as seen by the API thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Caps {
    /// The backend kind.
    pub renderer_type: RendererType,
    /// Supported features, already intersected with the requested ones.
    pub supported: CapsFlags,
    /// Largest 2D texture dimension.
    pub max_texture_size: u32,
    /// Maximum number of frame buffer attachments.
    pub max_fb_attachments: u32,
    /// Sort keys per frame.
    pub max_draw_calls: u32,
    /// Number of views.
    pub max_views: u32,
    /// Frame-in-flight slots.
    pub frames_in_flight: u32,
    /// Clip-space depth spans [-1, 1] instead of [0, 1].
    pub homogeneous_depth: bool,
    /// Texture coordinate origin is the bottom-left corner.
    pub origin_bottom_left: bool,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            renderer_type: RendererType::Noop,
            supported: CapsFlags::EMPTY,
            max_texture_size: 16384,
            max_fb_attachments: MAX_FRAME_BUFFER_ATTACHMENTS as u32,
            max_draw_calls: MAX_DRAW_CALLS as u32,
            max_views: MAX_VIEWS as u32,
            frames_in_flight: 1,
            homogeneous_depth: false,
            origin_bottom_left: false,
        }
    }
}
