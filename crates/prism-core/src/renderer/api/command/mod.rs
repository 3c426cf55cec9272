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

//! Frame recording: views, sort keys, render items and the frame itself.

pub mod cache;
pub mod frame;
pub mod radix_sort;
pub mod render_item;
pub mod resource_command;
pub mod sort_key;
pub mod uniform_buffer;
pub mod view;

pub use self::cache::*;
pub use self::frame::*;
pub use self::radix_sort::*;
pub use self::render_item::*;
pub use self::resource_command::*;
pub use self::sort_key::*;
pub use self::uniform_buffer::*;
pub use self::view::*;
