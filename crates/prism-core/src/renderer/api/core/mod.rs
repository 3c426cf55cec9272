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

//! Limits, initialization parameters, capabilities and statistics.

/// The default number of frames the CPU may record ahead of the GPU.
/// This determines the number of slots in ring buffers and other per-frame resources.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound accepted for the frames-in-flight setting.
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 4;

/// Number of views a frame can address. View ids are 8-bit in the sort key.
pub const MAX_VIEWS: usize = 256;

/// Default and maximum number of sort keys per frame. Render items are
/// indexed with 16-bit sort values.
pub const MAX_DRAW_CALLS: usize = 65535;

/// Default number of blits per frame.
pub const MAX_BLIT_ITEMS: usize = 1024;

/// Number of vertex streams a draw can bind.
pub const MAX_VERTEX_STREAMS: usize = 4;

/// Number of texture/image/buffer binding slots per draw.
pub const MAX_TEXTURE_SAMPLERS: usize = 16;

/// Number of programs. Program ids use 11 bits of the sort key.
pub const MAX_PROGRAMS: usize = 2048;

/// Number of color and depth attachments of a frame buffer.
pub const MAX_FRAME_BUFFER_ATTACHMENTS: usize = 8;

/// Default capacity of the image-view cache.
pub const DEFAULT_IMAGE_VIEW_CACHE_CAPACITY: usize = 1024;

/// Default cap on the wait and signal semaphores of one submission.
pub const MAX_SEMAPHORES: usize = 4;

/// Default number of transforms one frame can cache.
pub const MAX_MATRIX_CACHE: usize = 65536;

/// Default number of scissor rectangles one frame can cache.
pub const MAX_RECT_CACHE: usize = 4096;

pub mod caps;
pub mod flags;
pub mod init;
pub mod stats;

pub use self::caps::*;
pub use self::flags::*;
pub use self::init::*;
pub use self::stats::*;
