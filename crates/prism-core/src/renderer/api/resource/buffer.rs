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

//! Buffer flags and references to any kind of vertex/index/indirect buffer.

use super::handle::{
    DynamicIndexBufferHandle, DynamicVertexBufferHandle, IndexBufferHandle,
    IndirectBufferHandle, VertexBufferHandle,
};
use crate::prism_bitflags;

prism_bitflags! {
    /// Creation flags of vertex, index and indirect buffers.
    pub struct BufferFlags: u16 {
        /// Compute shaders may read the buffer.
        const COMPUTE_READ = 1 << 0;
        /// Compute shaders may write the buffer.
        const COMPUTE_WRITE = 1 << 1;
        /// The buffer holds indirect draw arguments.
        const DRAW_INDIRECT = 1 << 2;
        /// A dynamic buffer may grow on update.
        const ALLOW_RESIZE = 1 << 3;
        /// Index buffer with 32-bit indices.
        const INDEX32 = 1 << 4;
        /// Compute read and write.
        const COMPUTE_READ_WRITE = (1 << 0) | (1 << 1);
    }
}

/// Size in bytes of one indirect draw argument record.
pub const INDIRECT_DRAW_STRIDE: u32 = 32;

/// Any buffer a draw or compute binding can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRef {
    /// A static vertex buffer.
    Vertex(VertexBufferHandle),
    /// A dynamic vertex buffer.
    DynamicVertex(DynamicVertexBufferHandle),
    /// The frame's transient vertex buffer.
    TransientVertex,
    /// A static index buffer.
    Index(IndexBufferHandle),
    /// A dynamic index buffer.
    DynamicIndex(DynamicIndexBufferHandle),
    /// The frame's transient index buffer.
    TransientIndex,
    /// An indirect argument buffer.
    Indirect(IndirectBufferHandle),
}

impl BufferRef {
    /// Returns `false` if the reference wraps an invalid handle.
    pub fn is_valid(&self) -> bool {
        match self {
            BufferRef::Vertex(h) => h.is_valid(),
            BufferRef::DynamicVertex(h) => h.is_valid(),
            BufferRef::Index(h) => h.is_valid(),
            BufferRef::DynamicIndex(h) => h.is_valid(),
            BufferRef::Indirect(h) => h.is_valid(),
            BufferRef::TransientVertex | BufferRef::TransientIndex => true,
        }
    }
}

impl From<VertexBufferHandle> for BufferRef {
    fn from(h: VertexBufferHandle) -> Self {
        BufferRef::Vertex(h)
    }
}

impl From<DynamicVertexBufferHandle> for BufferRef {
    fn from(h: DynamicVertexBufferHandle) -> Self {
        BufferRef::DynamicVertex(h)
    }
}

impl From<IndexBufferHandle> for BufferRef {
    fn from(h: IndexBufferHandle) -> Self {
        BufferRef::Index(h)
    }
}

impl From<DynamicIndexBufferHandle> for BufferRef {
    fn from(h: DynamicIndexBufferHandle) -> Self {
        BufferRef::DynamicIndex(h)
    }
}

impl From<IndirectBufferHandle> for BufferRef {
    fn from(h: IndirectBufferHandle) -> Self {
        BufferRef::Indirect(h)
    }
}
