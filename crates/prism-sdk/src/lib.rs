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


//! The public-facing API of Prism.
//!
//! Applications create a [`Renderer`] around a backend, create resources
//! through it, record draws into its [`encoder`](Renderer::encoder) and end
//! every frame with [`Renderer::frame`].

#![warn(missing_docs)]

mod handles;
mod render_thread;
mod renderer;

pub use handles::{
    MAX_FRAME_BUFFERS, MAX_INDEX_BUFFERS, MAX_INDIRECT_BUFFERS, MAX_SHADERS, MAX_TEXTURES, MAX_UNIFORMS,
    MAX_VERTEX_BUFFERS, MAX_VERTEX_LAYOUTS,
};
pub use renderer::Renderer;

use prism_core::renderer::api::core::{Init, RendererType};
use prism_core::renderer::{Callback, NativeDevice, RendererContext};
use prism_infra::{ExplicitRenderer, NoopRenderer};
use std::sync::Arc;

/// Common types for applications.
pub mod prelude {
    pub use crate::Renderer;
    pub use prism_core::renderer::api::command::{Attachment, BlitItem, ClearFlags, Rect, TextureRegion, ViewMode};
    pub use prism_core::renderer::api::core::{Caps, DebugFlags, FrameStats, Init, RendererType, ResetFlags};
    pub use prism_core::renderer::api::pipeline::{SamplerFlags, StateFlags};
    pub use prism_core::renderer::api::resource::{
        Attrib, AttribType, BufferFlags, ProgramHandle, TextureDesc, TextureFormat, UniformType, VertexLayout,
    };
    pub use prism_core::renderer::{Callback, LogCallback, RenderError};
    pub use prism_core::Memory;
}

/// Builds the backend `init` asks for on `device`.
///
/// Falls back to a [`NoopRenderer`] when the explicit backend cannot be
/// initialized, so the application keeps running and recording frames.
pub fn create_context<D: NativeDevice>(
    device: D,
    init: &Init,
    callback: Arc<dyn Callback>,
) -> Box<dyn RendererContext> {
    match init.renderer_type {
        RendererType::Noop => Box::new(NoopRenderer::new(init)),
        RendererType::Explicit => match ExplicitRenderer::new(device, init, callback) {
            Ok(renderer) => Box::new(renderer),
            Err(err) => {
                log::error!("{err}. Falling back to the no-op renderer.");
                Box::new(NoopRenderer::new(init))
            }
        },
    }
}
