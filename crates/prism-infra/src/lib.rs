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

//! # Prism Infra
//!
//! Concrete implementations of the contracts defined in `prism-core`.
//!
//! - [`graphics::explicit`]: the explicit backend. It translates a sorted
//!   [`Frame`](prism_core::renderer::Frame) into native commands through any
//!   [`NativeDevice`](prism_core::renderer::NativeDevice), caching pipelines,
//!   render passes, samplers and image views, and keeping several frames in
//!   flight.
//! - [`graphics::headless`]: an in-memory native device with a simulated GPU
//!   timeline, used for offscreen runs and tests.
//! - [`graphics::noop`]: a renderer that consumes frames and draws nothing.

#![warn(missing_docs)]

pub mod graphics;

pub use graphics::explicit::{BackendInitError, ExplicitRenderer};
#[cfg(feature = "headless")]
pub use graphics::headless::HeadlessDevice;
pub use graphics::noop::NoopRenderer;
