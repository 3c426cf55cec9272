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

//! Backend-agnostic rendering API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`core`]**: Limits, initialization parameters, capabilities and statistics.
//! - **[`resource`]**: Typed handles, vertex layouts, textures, buffers and uniforms.
//! - **[`pipeline`]**: Packed render state, stencil and sampler words.
//! - **[`shader`]**: The shader container format.
//! - **[`command`]**: The frame log, sort keys, render items and views.
//! - **[`native`]**: Raw native objects, descriptors and recorded GPU commands.

pub mod command;
pub mod core;
pub mod native;
pub mod pipeline;
pub mod resource;
pub mod shader;
