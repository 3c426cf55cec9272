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

//! The explicit backend.
//!
//! [`ExplicitRenderer`] translates a sorted frame into commands for an
//! explicit graphics API reached through [`NativeDevice`](prism_core::renderer::NativeDevice).
//! Native state objects are built lazily and cached by content hash, the
//! command queue keeps several frames in flight, and every object that may
//! still be referenced by the GPU is released through the queue once its
//! frame has retired.

mod command_queue;
mod context;
mod conversions;
mod descriptor;
mod pipeline;
mod render_pass;
mod resources;
mod scratch;
mod staged_init;
mod state_cache;
mod submit;
mod swap_chain;
mod uniforms;

pub use self::command_queue::{CommandQueue, SlotState};
pub use self::context::{BackendInitError, ExplicitRenderer};
pub use self::descriptor::{DescriptorBinding, DescriptorCache};
pub use self::pipeline::PipelineCache;
pub use self::render_pass::{RenderTarget, TargetAttachment};
pub use self::resources::{
    BufferEntry, FrameBufferEntry, ProgramEntry, Resources, ShaderEntry, TextureEntry,
};
pub use self::scratch::{ScratchBuffer, ScratchWrite};
pub use self::staged_init::{InitGuard, InitStage};
pub use self::state_cache::{LruCache, StateCache};
pub use self::swap_chain::{SwapChain, SwapChainState, BACK_BUFFER_DEPTH_FORMAT};
pub use self::uniforms::UniformTable;
