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

//! Uniform types.

/// The type of a named uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    /// A texture sampler slot. The value is the stage index as `i32`.
    Sampler,
    /// Four floats.
    Vec4,
    /// A 3x3 matrix, stored as three vec4 rows.
    Mat3,
    /// A 4x4 matrix.
    Mat4,
}

impl UniformType {
    /// Size in bytes of one element.
    pub const fn size(&self) -> u32 {
        match self {
            UniformType::Sampler => 4,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
        }
    }

    /// Decodes the type tag used in shader containers.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(UniformType::Sampler),
            2 => Some(UniformType::Vec4),
            3 => Some(UniformType::Mat3),
            4 => Some(UniformType::Mat4),
            _ => None,
        }
    }

    /// The type tag used in shader containers.
    pub const fn tag(&self) -> u8 {
        match self {
            UniformType::Sampler => 0,
            UniformType::Vec4 => 2,
            UniformType::Mat3 => 3,
            UniformType::Mat4 => 4,
        }
    }
}
