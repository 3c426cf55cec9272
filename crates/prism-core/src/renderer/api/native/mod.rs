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

//! The vocabulary of the native device seam.
//!
//! Backends talk to the GPU through [`NativeDevice`](crate::renderer::traits::NativeDevice)
//! using the handles, descriptions and commands defined here. They mirror the
//! object model of explicit graphics APIs, so a thin adapter maps them onto a
//! real driver.

pub mod command;
pub mod desc;
pub mod handles;

pub use self::command::*;
pub use self::desc::*;
pub use self::handles::*;
