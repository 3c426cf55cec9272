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

//! Backend-agnostic rendering contracts.
//!
//! This module defines the "common language" between the API thread and the
//! render thread. The API thread records draw, compute and blit work into a
//! [`Frame`]; a [`RendererContext`] consumes the frame on the render thread and
//! translates it into native commands through a [`NativeDevice`].
//!
//! The 'what' lives here. The 'how' is handled by a concrete backend in the
//! `prism-infra` crate.
//!
//! [`Frame`]: api::command::Frame

pub mod api;
pub mod error;
pub mod traits;

pub use self::api::*;
pub use self::error::{ContractViolation, NativeError, RenderError, ResourceError, ShaderError};
pub use self::traits::{Callback, Fatal, LogCallback, NativeDevice, RendererContext};
