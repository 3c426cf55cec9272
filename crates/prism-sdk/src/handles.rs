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


//! Per-kind handle allocation for the public API.

use ahash::AHashSet;
use prism_core::renderer::api::command::FreeHandle;
use prism_core::renderer::api::core::MAX_PROGRAMS;
use prism_core::renderer::api::resource::HandleAllocator;

/// Number of vertex layouts that can be live at once.
pub const MAX_VERTEX_LAYOUTS: u16 = 64;
/// Number of static and dynamic vertex buffers of each kind.
pub const MAX_VERTEX_BUFFERS: u16 = 4096;
/// Number of static and dynamic index buffers of each kind.
pub const MAX_INDEX_BUFFERS: u16 = 4096;
/// Number of indirect buffers.
pub const MAX_INDIRECT_BUFFERS: u16 = 1024;
/// Number of shaders.
pub const MAX_SHADERS: u16 = 512;
/// Number of textures.
pub const MAX_TEXTURES: u16 = 4096;
/// Number of frame buffers.
pub const MAX_FRAME_BUFFERS: u16 = 128;
/// Number of uniforms.
pub const MAX_UNIFORMS: u16 = 512;

/// One allocator per resource kind, plus the handles whose destruction is
/// queued in a frame that has not been consumed yet.
#[derive(Debug)]
pub(crate) struct HandleTable {
    pub vertex_layouts: HandleAllocator,
    pub vertex_buffers: HandleAllocator,
    pub index_buffers: HandleAllocator,
    pub dynamic_vertex_buffers: HandleAllocator,
    pub dynamic_index_buffers: HandleAllocator,
    pub indirect_buffers: HandleAllocator,
    pub shaders: HandleAllocator,
    pub programs: HandleAllocator,
    pub textures: HandleAllocator,
    pub frame_buffers: HandleAllocator,
    pub uniforms: HandleAllocator,
    pending: AHashSet<FreeHandle>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            vertex_layouts: HandleAllocator::new(MAX_VERTEX_LAYOUTS),
            vertex_buffers: HandleAllocator::new(MAX_VERTEX_BUFFERS),
            index_buffers: HandleAllocator::new(MAX_INDEX_BUFFERS),
            dynamic_vertex_buffers: HandleAllocator::new(MAX_VERTEX_BUFFERS),
            dynamic_index_buffers: HandleAllocator::new(MAX_INDEX_BUFFERS),
            indirect_buffers: HandleAllocator::new(MAX_INDIRECT_BUFFERS),
            shaders: HandleAllocator::new(MAX_SHADERS),
            programs: HandleAllocator::new(MAX_PROGRAMS as u16),
            textures: HandleAllocator::new(MAX_TEXTURES),
            frame_buffers: HandleAllocator::new(MAX_FRAME_BUFFERS),
            uniforms: HandleAllocator::new(MAX_UNIFORMS),
            pending: AHashSet::new(),
        }
    }

    fn allocator(&self, handle: FreeHandle) -> (&HandleAllocator, u16) {
        match handle {
            FreeHandle::VertexLayout(h) => (&self.vertex_layouts, h.0),
            FreeHandle::VertexBuffer(h) => (&self.vertex_buffers, h.0),
            FreeHandle::IndexBuffer(h) => (&self.index_buffers, h.0),
            FreeHandle::DynamicVertexBuffer(h) => (&self.dynamic_vertex_buffers, h.0),
            FreeHandle::DynamicIndexBuffer(h) => (&self.dynamic_index_buffers, h.0),
            FreeHandle::IndirectBuffer(h) => (&self.indirect_buffers, h.0),
            FreeHandle::Shader(h) => (&self.shaders, h.0),
            FreeHandle::Program(h) => (&self.programs, h.0),
            FreeHandle::Texture(h) => (&self.textures, h.0),
            FreeHandle::FrameBuffer(h) => (&self.frame_buffers, h.0),
            FreeHandle::Uniform(h) => (&self.uniforms, h.0),
        }
    }

    fn allocator_mut(&mut self, handle: FreeHandle) -> (&mut HandleAllocator, u16) {
        match handle {
            FreeHandle::VertexLayout(h) => (&mut self.vertex_layouts, h.0),
            FreeHandle::VertexBuffer(h) => (&mut self.vertex_buffers, h.0),
            FreeHandle::IndexBuffer(h) => (&mut self.index_buffers, h.0),
            FreeHandle::DynamicVertexBuffer(h) => (&mut self.dynamic_vertex_buffers, h.0),
            FreeHandle::DynamicIndexBuffer(h) => (&mut self.dynamic_index_buffers, h.0),
            FreeHandle::IndirectBuffer(h) => (&mut self.indirect_buffers, h.0),
            FreeHandle::Shader(h) => (&mut self.shaders, h.0),
            FreeHandle::Program(h) => (&mut self.programs, h.0),
            FreeHandle::Texture(h) => (&mut self.textures, h.0),
            FreeHandle::FrameBuffer(h) => (&mut self.frame_buffers, h.0),
            FreeHandle::Uniform(h) => (&mut self.uniforms, h.0),
        }
    }

    /// Returns `true` if the handle is allocated and not already queued for destruction.
    pub fn is_usable(&self, handle: FreeHandle) -> bool {
        let (allocator, idx) = self.allocator(handle);
        allocator.is_live(idx) && !self.pending.contains(&handle)
    }

    /// Marks a handle as destroyed. It stays allocated until [`release`](Self::release).
    ///
    /// ## Returns
    /// `false` if the handle is dead or its destruction is already queued.
    pub fn retire(&mut self, handle: FreeHandle) -> bool {
        if !self.is_usable(handle) {
            return false;
        }
        self.pending.insert(handle)
    }

    /// Returns the handles of a consumed frame to their allocators.
    pub fn release(&mut self, handles: impl IntoIterator<Item = FreeHandle>) {
        for handle in handles {
            self.pending.remove(&handle);
            let (allocator, idx) = self.allocator_mut(handle);
            if !allocator.free(idx) {
                log::warn!("Released handle {handle:?} was not live.");
            }
        }
    }

    /// Number of destroyed handles waiting for their frame to be consumed.
    pub fn num_pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::api::resource::TextureHandle;

    #[test]
    fn retired_handle_is_reused_only_after_release() {
        let mut table = HandleTable::new();
        let first = table.textures.alloc();
        assert_eq!(first, Some(0));
        let handle = FreeHandle::Texture(TextureHandle(0));

        assert!(table.retire(handle));
        assert!(!table.retire(handle), "a handle is retired once");
        assert_eq!(table.textures.alloc(), Some(1));

        table.release([handle]);
        assert_eq!(table.num_pending(), 0);
        assert_eq!(table.textures.alloc(), Some(0));
    }

    #[test]
    fn dead_handles_cannot_be_retired() {
        let mut table = HandleTable::new();
        assert!(!table.retire(FreeHandle::Texture(TextureHandle(3))));
        assert!(!table.retire(FreeHandle::Texture(TextureHandle::INVALID)));
    }
}
