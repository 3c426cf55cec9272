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

use crate::renderer::api::command::Frame;
use crate::renderer::api::core::{Caps, FrameStats, RendererType};
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// A renderer backend. Owned by the render thread; consumes one frame at a time.
pub trait RendererContext: Debug + Send {
    /// The backend type.
    fn renderer_type(&self) -> RendererType;

    /// A human-readable backend name.
    fn name(&self) -> &str;

    /// Capabilities of the backend and its device.
    fn caps(&self) -> &Caps;

    /// Translates and submits a frame.
    /// ## Arguments
    /// * `frame` - The recorded frame. Its resource commands are consumed; the
    ///   render items are only read.
    /// ## Returns
    /// The statistics of the submitted frame.
    /// ## Errors
    /// * `RenderError::Fatal` - A native object could not be created. The host
    ///   callback has already been told.
    /// * `RenderError::DeviceLost` - The device is gone; the backend must be recreated.
    fn submit(&mut self, frame: &mut Frame) -> Result<FrameStats, RenderError>;

    /// Statistics of the last submitted frame.
    fn stats(&self) -> &FrameStats;

    /// Returns `true` once the device was lost.
    fn is_device_lost(&self) -> bool;

    /// Waits for the GPU and destroys every native object.
    fn shutdown(&mut self);
}
