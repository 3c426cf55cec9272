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

//! Render items: the snapshots of encoder state recorded by a frame.

use crate::renderer::api::core::{MAX_TEXTURE_SAMPLERS, MAX_VERTEX_STREAMS};
use crate::renderer::api::pipeline::{SamplerFlags, StateFlags};
use crate::renderer::api::resource::{
    BufferRef, IndirectBufferHandle, ProgramHandle, TextureFormat, TextureHandle,
    VertexLayoutHandle,
};

/// Access mode of a storage image or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Read only.
    Read,
    /// Write only.
    Write,
    /// Read and write.
    ReadWrite,
}

/// One bound vertex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stream {
    /// Source buffer.
    pub buffer: BufferRef,
    /// Byte offset into the buffer (non-zero for transient data).
    pub offset: u32,
    /// Layout override. [`VertexLayoutHandle::INVALID`] uses the buffer's own layout.
    pub layout: VertexLayoutHandle,
    /// First vertex.
    pub start_vertex: u32,
    /// Number of vertices.
    pub num_vertices: u32,
}

/// The index buffer of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBinding {
    /// Source buffer.
    pub buffer: BufferRef,
    /// Byte offset into the buffer (non-zero for transient data).
    pub offset: u32,
    /// First index.
    pub start_index: u32,
    /// Number of indices.
    pub num_indices: u32,
    /// 32-bit indices.
    pub index32: bool,
}

/// Per-instance vertex data of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceData {
    /// Source buffer.
    pub buffer: BufferRef,
    /// Byte offset of the first instance.
    pub offset: u32,
    /// Bytes per instance.
    pub stride: u16,
    /// Number of instances.
    pub num: u32,
}

/// Indirect arguments of a draw or dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndirectArgs {
    /// Buffer holding the arguments.
    pub buffer: IndirectBufferHandle,
    /// First argument record.
    pub start: u32,
    /// Number of argument records.
    pub num: u32,
    /// Buffer holding the actual draw count, and the index of the count in it.
    pub count: Option<(BufferRef, u32)>,
}

/// One texture, image or buffer binding of a draw or dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Binding {
    /// Nothing bound.
    #[default]
    None,
    /// A sampled texture.
    Texture {
        /// The texture.
        handle: TextureHandle,
        /// Sampler state. [`SamplerFlags::INTERNAL_DEFAULT`] uses the texture's own.
        sampler: SamplerFlags,
    },
    /// A storage image.
    Image {
        /// The texture.
        handle: TextureHandle,
        /// Mip level.
        mip: u8,
        /// Access mode.
        access: Access,
        /// View format, `None` for the texture's format.
        format: Option<TextureFormat>,
    },
    /// A storage buffer.
    Buffer {
        /// The buffer.
        buffer: BufferRef,
        /// Access mode.
        access: Access,
    },
}

/// The bindings of a draw or dispatch, indexed by stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderBind {
    /// Bindings by stage.
    pub bindings: [Binding; MAX_TEXTURE_SAMPLERS],
}

impl RenderBind {
    /// Unbinds every stage.
    pub fn clear(&mut self) {
        self.bindings = [Binding::None; MAX_TEXTURE_SAMPLERS];
    }

    /// Iterates over the bound stages.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| !matches!(b, Binding::None))
    }

    /// Returns `true` if `texture` is bound as a sampled texture or image.
    pub fn uses_texture(&self, texture: TextureHandle) -> bool {
        self.bindings.iter().any(|b| match b {
            Binding::Texture { handle, .. } | Binding::Image { handle, .. } => *handle == texture,
            _ => false,
        })
    }
}

/// A recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderDraw {
    /// Render state.
    pub state: StateFlags,
    /// Packed front and back stencil state.
    pub stencil: u64,
    /// Blend constant as `0xRRGGBBAA`.
    pub rgba: u32,
    /// Vertex streams.
    pub streams: [Option<Stream>; MAX_VERTEX_STREAMS],
    /// Index buffer.
    pub index: Option<IndexBinding>,
    /// Instance data.
    pub instance_data: Option<InstanceData>,
    /// Instance count when no instance data is bound.
    pub num_instances: u32,
    /// Vertex count for draws without vertex streams.
    pub vertex_count: u32,
    /// Indirect arguments.
    pub indirect: Option<IndirectArgs>,
    /// Index into the rect cache, `u16::MAX` for no scissor.
    pub scissor: u16,
    /// First model matrix in the matrix cache.
    pub matrix: u32,
    /// Number of model matrices.
    pub num_matrices: u16,
    /// First uniform update in the uniform log.
    pub uniform_begin: u32,
    /// One past the last uniform update.
    pub uniform_end: u32,
    /// Program.
    pub program: ProgramHandle,
    /// Texture and buffer bindings.
    pub bind: RenderBind,
}

impl Default for RenderDraw {
    fn default() -> Self {
        Self {
            state: StateFlags::DEFAULT,
            stencil: 0,
            rgba: 0,
            streams: [None; MAX_VERTEX_STREAMS],
            index: None,
            instance_data: None,
            num_instances: 1,
            vertex_count: 0,
            indirect: None,
            scissor: u16::MAX,
            matrix: 0,
            num_matrices: 1,
            uniform_begin: 0,
            uniform_end: 0,
            program: ProgramHandle::INVALID,
            bind: RenderBind::default(),
        }
    }
}

impl RenderDraw {
    /// Returns `true` if any vertex stream is bound.
    pub fn has_streams(&self) -> bool {
        self.streams.iter().any(Option::is_some)
    }

    /// Number of vertices drawn by a non-indexed draw: the smallest bound
    /// stream, or the explicit vertex count without streams.
    pub fn num_vertices(&self) -> u32 {
        self.streams
            .iter()
            .flatten()
            .map(|s| s.num_vertices)
            .min()
            .unwrap_or(self.vertex_count)
    }

    /// Number of instances drawn.
    pub fn instances(&self) -> u32 {
        self.instance_data.map_or(self.num_instances, |d| d.num)
    }

    /// Bitmask of bound stream slots.
    pub fn stream_mask(&self) -> u8 {
        self.streams
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }
}

/// A recorded compute dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCompute {
    /// Workgroup counts.
    pub num_groups: [u32; 3],
    /// Indirect arguments.
    pub indirect: Option<IndirectArgs>,
    /// First model matrix in the matrix cache.
    pub matrix: u32,
    /// Number of model matrices.
    pub num_matrices: u16,
    /// First uniform update in the uniform log.
    pub uniform_begin: u32,
    /// One past the last uniform update.
    pub uniform_end: u32,
    /// Program.
    pub program: ProgramHandle,
    /// Image and buffer bindings.
    pub bind: RenderBind,
}

/// A recorded item.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderItem {
    /// A draw call.
    Draw(RenderDraw),
    /// A compute dispatch.
    Compute(RenderCompute),
}

impl RenderItem {
    /// The program of the item.
    pub fn program(&self) -> ProgramHandle {
        match self {
            RenderItem::Draw(draw) => draw.program,
            RenderItem::Compute(compute) => compute.program,
        }
    }

    /// The uniform log range of the item.
    pub fn uniform_range(&self) -> (u32, u32) {
        match self {
            RenderItem::Draw(draw) => (draw.uniform_begin, draw.uniform_end),
            RenderItem::Compute(compute) => (compute.uniform_begin, compute.uniform_end),
        }
    }
}

/// A texture-to-texture copy recorded on a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlitItem {
    /// Source texture.
    pub src: TextureHandle,
    /// Source mip.
    pub src_mip: u8,
    /// Source origin.
    pub src_origin: [u32; 3],
    /// Destination texture.
    pub dst: TextureHandle,
    /// Destination mip.
    pub dst_mip: u8,
    /// Destination origin.
    pub dst_origin: [u32; 3],
    /// Copied extent. `u32::MAX` extends to the edge of the source.
    pub extent: [u32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::resource::VertexBufferHandle;

    fn stream(num_vertices: u32) -> Stream {
        Stream {
            buffer: BufferRef::Vertex(VertexBufferHandle(0)),
            offset: 0,
            layout: VertexLayoutHandle::INVALID,
            start_vertex: 0,
            num_vertices,
        }
    }

    #[test]
    fn vertex_count_is_smallest_stream() {
        let mut draw = RenderDraw {
            vertex_count: 6,
            ..Default::default()
        };
        assert_eq!(draw.num_vertices(), 6);
        draw.streams[0] = Some(stream(30));
        draw.streams[2] = Some(stream(12));
        assert_eq!(draw.num_vertices(), 12);
        assert_eq!(draw.stream_mask(), 0b101);
    }

    #[test]
    fn bind_reports_texture_use() {
        let mut bind = RenderBind::default();
        bind.bindings[3] = Binding::Texture {
            handle: TextureHandle(8),
            sampler: SamplerFlags::EMPTY,
        };
        assert!(bind.uses_texture(TextureHandle(8)));
        assert!(!bind.uses_texture(TextureHandle(9)));
        assert_eq!(bind.iter().map(|(stage, _)| stage).collect::<Vec<_>>(), vec![3]);
        bind.clear();
        assert_eq!(bind.iter().count(), 0);
    }
}
