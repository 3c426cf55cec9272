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

//! An in-memory native device.
//!
//! [`HeadlessDevice`] implements [`NativeDevice`](prism_core::renderer::NativeDevice)
//! without a GPU. It hands out ids, records every command buffer, and runs a
//! simulated GPU timeline so that fences, frames in flight and deferred
//! destruction behave as they would on hardware. Everything it records can be
//! inspected, which makes it the device of choice for tests and offscreen runs.

mod device;

pub use self::device::{
    DeviceOp, Destruction, GpuTimeline, HeadlessDevice, ObjectKind, Submission,
};
