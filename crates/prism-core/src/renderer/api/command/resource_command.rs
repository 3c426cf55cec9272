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

//! Resource creation, update and destruction commands carried by a frame.
//!
//! Create and update commands run before the frame's render items; destroy
//! commands run after them, so a resource destroyed in the same frame it was
//! used in is still alive while that frame is translated.

use crate::memory::Memory;
use crate::renderer::api::resource::{
    BufferFlags, DynamicIndexBufferHandle, DynamicVertexBufferHandle, FrameBufferHandle,
    IndexBufferHandle, IndirectBufferHandle, ProgramHandle, ShaderHandle, TextureDesc,
    TextureHandle, UniformHandle, UniformType, VertexBufferHandle, VertexLayout,
    VertexLayoutHandle,
};

/// One attachment of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attachment {
    /// The texture rendered to.
    pub texture: TextureHandle,
    /// Mip level.
    pub mip: u8,
    /// Array layer (or cube face).
    pub layer: u16,
    /// Number of layers rendered to.
    pub num_layers: u16,
    /// Resolve MSAA into the texture's resolve image and regenerate mips after the pass.
    pub resolve: bool,
}

impl Attachment {
    /// A whole-texture attachment at mip 0.
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            mip: 0,
            layer: 0,
            num_layers: 1,
            resolve: true,
        }
    }
}

/// A region of a texture updated from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureRegion {
    /// Array layer (or cube face).
    pub layer: u16,
    /// Mip level.
    pub mip: u8,
    /// Origin.
    pub x: u32,
    /// Origin.
    pub y: u32,
    /// Origin.
    pub z: u32,
    /// Extent.
    pub width: u32,
    /// Extent.
    pub height: u32,
    /// Extent.
    pub depth: u32,
    /// Bytes per source row, zero for tightly packed rows.
    pub pitch: u32,
}

/// A resource command.
#[derive(Debug, Clone)]
pub enum ResourceCommand {
    /// Registers a vertex layout.
    CreateVertexLayout {
        /// Handle.
        handle: VertexLayoutHandle,
        /// Layout.
        layout: VertexLayout,
    },
    /// Creates an immutable vertex buffer.
    CreateVertexBuffer {
        /// Handle.
        handle: VertexBufferHandle,
        /// Contents.
        mem: Memory,
        /// Layout of the vertices.
        layout: VertexLayoutHandle,
        /// Usage flags.
        flags: BufferFlags,
    },
    /// Creates an immutable index buffer.
    CreateIndexBuffer {
        /// Handle.
        handle: IndexBufferHandle,
        /// Contents.
        mem: Memory,
        /// Usage flags.
        flags: BufferFlags,
    },
    /// Creates an updatable vertex buffer.
    CreateDynamicVertexBuffer {
        /// Handle.
        handle: DynamicVertexBufferHandle,
        /// Size in bytes.
        size: u32,
        /// Layout of the vertices.
        layout: VertexLayoutHandle,
        /// Usage flags.
        flags: BufferFlags,
    },
    /// Writes into an updatable vertex buffer.
    UpdateDynamicVertexBuffer {
        /// Handle.
        handle: DynamicVertexBufferHandle,
        /// Byte offset.
        offset: u32,
        /// New contents.
        mem: Memory,
    },
    /// Creates an updatable index buffer.
    CreateDynamicIndexBuffer {
        /// Handle.
        handle: DynamicIndexBufferHandle,
        /// Size in bytes.
        size: u32,
        /// Usage flags.
        flags: BufferFlags,
    },
    /// Writes into an updatable index buffer.
    UpdateDynamicIndexBuffer {
        /// Handle.
        handle: DynamicIndexBufferHandle,
        /// Byte offset.
        offset: u32,
        /// New contents.
        mem: Memory,
    },
    /// Creates a buffer of indirect draw/dispatch arguments.
    CreateIndirectBuffer {
        /// Handle.
        handle: IndirectBufferHandle,
        /// Number of argument records.
        num: u32,
    },
    /// Creates a shader from a shader container.
    CreateShader {
        /// Handle.
        handle: ShaderHandle,
        /// The container bytes.
        mem: Memory,
    },
    /// Links a program. A compute program has no fragment shader.
    CreateProgram {
        /// Handle.
        handle: ProgramHandle,
        /// Vertex or compute shader.
        vsh: ShaderHandle,
        /// Fragment shader.
        fsh: Option<ShaderHandle>,
    },
    /// Creates a texture, optionally with initial contents for every mip and layer.
    CreateTexture {
        /// Handle.
        handle: TextureHandle,
        /// Description.
        desc: TextureDesc,
        /// Initial contents.
        mem: Option<Memory>,
    },
    /// Writes a region of a texture.
    UpdateTexture {
        /// Handle.
        handle: TextureHandle,
        /// Target region.
        region: TextureRegion,
        /// New contents.
        mem: Memory,
    },
    /// Creates a frame buffer from texture attachments.
    CreateFrameBuffer {
        /// Handle.
        handle: FrameBufferHandle,
        /// Attachments, color first.
        attachments: Vec<Attachment>,
    },
    /// Declares a uniform.
    CreateUniform {
        /// Handle.
        handle: UniformHandle,
        /// Name matched against shader uniform tables.
        name: String,
        /// Type.
        ty: UniformType,
        /// Number of array elements.
        num: u16,
    },
    /// Destroys a vertex layout.
    DestroyVertexLayout(VertexLayoutHandle),
    /// Destroys a vertex buffer.
    DestroyVertexBuffer(VertexBufferHandle),
    /// Destroys an index buffer.
    DestroyIndexBuffer(IndexBufferHandle),
    /// Destroys an updatable vertex buffer.
    DestroyDynamicVertexBuffer(DynamicVertexBufferHandle),
    /// Destroys an updatable index buffer.
    DestroyDynamicIndexBuffer(DynamicIndexBufferHandle),
    /// Destroys an indirect buffer.
    DestroyIndirectBuffer(IndirectBufferHandle),
    /// Destroys a shader.
    DestroyShader(ShaderHandle),
    /// Destroys a program.
    DestroyProgram(ProgramHandle),
    /// Destroys a texture.
    DestroyTexture(TextureHandle),
    /// Destroys a frame buffer.
    DestroyFrameBuffer(FrameBufferHandle),
    /// Destroys a uniform.
    DestroyUniform(UniformHandle),
}

impl ResourceCommand {
    /// Returns `true` for commands that run after the frame's render items.
    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            ResourceCommand::DestroyVertexLayout(_)
                | ResourceCommand::DestroyVertexBuffer(_)
                | ResourceCommand::DestroyIndexBuffer(_)
                | ResourceCommand::DestroyDynamicVertexBuffer(_)
                | ResourceCommand::DestroyDynamicIndexBuffer(_)
                | ResourceCommand::DestroyIndirectBuffer(_)
                | ResourceCommand::DestroyShader(_)
                | ResourceCommand::DestroyProgram(_)
                | ResourceCommand::DestroyTexture(_)
                | ResourceCommand::DestroyFrameBuffer(_)
                | ResourceCommand::DestroyUniform(_)
        )
    }

    /// The handle a destroy command releases, returned to the allocator once
    /// the frame has been consumed.
    pub fn freed_handle(&self) -> Option<FreeHandle> {
        Some(match *self {
            ResourceCommand::DestroyVertexLayout(h) => FreeHandle::VertexLayout(h),
            ResourceCommand::DestroyVertexBuffer(h) => FreeHandle::VertexBuffer(h),
            ResourceCommand::DestroyIndexBuffer(h) => FreeHandle::IndexBuffer(h),
            ResourceCommand::DestroyDynamicVertexBuffer(h) => FreeHandle::DynamicVertexBuffer(h),
            ResourceCommand::DestroyDynamicIndexBuffer(h) => FreeHandle::DynamicIndexBuffer(h),
            ResourceCommand::DestroyIndirectBuffer(h) => FreeHandle::IndirectBuffer(h),
            ResourceCommand::DestroyShader(h) => FreeHandle::Shader(h),
            ResourceCommand::DestroyProgram(h) => FreeHandle::Program(h),
            ResourceCommand::DestroyTexture(h) => FreeHandle::Texture(h),
            ResourceCommand::DestroyFrameBuffer(h) => FreeHandle::FrameBuffer(h),
            ResourceCommand::DestroyUniform(h) => FreeHandle::Uniform(h),
            _ => return None,
        })
    }
}

/// A handle to return to its allocator after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FreeHandle {
    /// Vertex layout.
    VertexLayout(VertexLayoutHandle),
    /// Vertex buffer.
    VertexBuffer(VertexBufferHandle),
    /// Index buffer.
    IndexBuffer(IndexBufferHandle),
    /// Updatable vertex buffer.
    DynamicVertexBuffer(DynamicVertexBufferHandle),
    /// Updatable index buffer.
    DynamicIndexBuffer(DynamicIndexBufferHandle),
    /// Indirect buffer.
    IndirectBuffer(IndirectBufferHandle),
    /// Shader.
    Shader(ShaderHandle),
    /// Program.
    Program(ProgramHandle),
    /// Texture.
    Texture(TextureHandle),
    /// Frame buffer.
    FrameBuffer(FrameBufferHandle),
    /// Uniform.
    Uniform(UniformHandle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destroy_commands_carry_their_handle() {
        let cmd = ResourceCommand::DestroyTexture(TextureHandle(4));
        assert!(cmd.is_destroy());
        assert_eq!(cmd.freed_handle(), Some(FreeHandle::Texture(TextureHandle(4))));

        let cmd = ResourceCommand::CreateIndirectBuffer {
            handle: IndirectBufferHandle(0),
            num: 16,
        };
        assert!(!cmd.is_destroy());
        assert_eq!(cmd.freed_handle(), None);
    }
}
