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


//! The [`Renderer`] facade.

use crate::handles::HandleTable;
use crate::render_thread::{Consumed, RenderThread};
use ahash::AHashMap;
use anyhow::{Context, Result};
use prism_core::renderer::api::command::{
    Attachment, BlitItem, ClearFlags, Frame, FreeHandle, Rect, ResourceCommand, TextureRegion,
    ViewId, ViewMode,
};
use prism_core::renderer::api::core::{Caps, DebugFlags, FrameStats, Init, RendererType, ResetFlags};
use prism_core::renderer::api::resource::{
    BufferFlags, DynamicIndexBufferHandle, DynamicVertexBufferHandle, FrameBufferHandle,
    HandleAllocator, IndexBufferHandle, IndirectBufferHandle, ProgramHandle, ShaderHandle,
    TextureDesc, TextureHandle, UniformHandle, UniformType, VertexBufferHandle, VertexLayout,
    VertexLayoutHandle,
};
use prism_core::renderer::{RenderError, RendererContext};
use prism_core::Memory;

#[derive(Debug)]
enum Backend {
    Inline(Box<dyn RendererContext>),
    Threaded(RenderThread),
    Stopped,
}

#[derive(Debug)]
struct UniformEntry {
    handle: UniformHandle,
    refs: u32,
}

fn alloc(allocator: &mut HandleAllocator, kind: &str) -> u16 {
    allocator.alloc().unwrap_or_else(|| {
        log::warn!("Out of {kind} handles ({} live).", allocator.len());
        u16::MAX
    })
}

/// The application-facing renderer.
///
/// Owns the frame being recorded, the handle allocators and the backend. The
/// backend runs either inline, inside [`frame`](Self::frame), or on a render
/// thread that consumes frame `N` while the application records frame `N + 1`.
///
/// Resource creation returns a handle immediately and queues the native work
/// in the current frame. Destroyed handles are recycled once the frame that
/// destroyed them has been consumed by the backend.
#[derive(Debug)]
pub struct Renderer {
    init: Init,
    caps: Caps,
    renderer_type: RendererType,
    backend_name: String,
    frame: Frame,
    spare: Option<Frame>,
    backend: Backend,
    handles: HandleTable,
    uniforms: AHashMap<String, UniformEntry>,
    frame_number: u64,
    stats: FrameStats,
}

impl Renderer {
    /// Creates a renderer that runs `context` on the calling thread.
    pub fn new(init: Init, context: Box<dyn RendererContext>) -> Self {
        let caps = context.caps().clone();
        let renderer_type = context.renderer_type();
        let backend_name = context.name().to_owned();
        Self::assemble(init, caps, renderer_type, backend_name, Backend::Inline(context), None)
    }

    /// Creates a renderer that runs `context` on a dedicated render thread.
    ///
    /// ## Errors
    /// Fails if the thread cannot be spawned.
    pub fn with_render_thread(init: Init, context: Box<dyn RendererContext>) -> Result<Self> {
        let caps = context.caps().clone();
        let renderer_type = context.renderer_type();
        let backend_name = context.name().to_owned();
        let thread = RenderThread::spawn(context).context("failed to spawn the render thread")?;
        let spare = Frame::new(&init.limits);
        Ok(Self::assemble(
            init,
            caps,
            renderer_type,
            backend_name,
            Backend::Threaded(thread),
            Some(spare),
        ))
    }

    fn assemble(
        init: Init,
        caps: Caps,
        renderer_type: RendererType,
        backend_name: String,
        backend: Backend,
        spare: Option<Frame>,
    ) -> Self {
        let mut frame = Frame::new(&init.limits);
        frame.set_resolution(init.resolution.clone());
        frame.set_debug(init.debug);
        log::info!(
            "Renderer ready: {backend_name} ({renderer_type:?}), {}x{}, {} frame(s) in flight{}.",
            init.resolution.width,
            init.resolution.height,
            init.frames_in_flight(),
            if spare.is_some() { ", render thread" } else { "" },
        );
        Self {
            init,
            caps,
            renderer_type,
            backend_name,
            frame,
            spare,
            backend,
            handles: HandleTable::new(),
            uniforms: AHashMap::new(),
            frame_number: 0,
            stats: FrameStats::default(),
        }
    }

    // --- Queries -------------------------------------------------------------

    /// Capabilities of the backend.
    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    /// The backend type. [`RendererType::Noop`] after a failed initialization.
    pub fn renderer_type(&self) -> RendererType {
        self.renderer_type
    }

    /// The backend name.
    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// The configuration the renderer was created with.
    pub fn init(&self) -> &Init {
        &self.init
    }

    /// Statistics of the last frame the backend finished.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Number of the frame being recorded.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Returns `true` until [`shutdown`](Self::shutdown).
    pub fn is_running(&self) -> bool {
        !matches!(self.backend, Backend::Stopped)
    }

    // --- Frame control -------------------------------------------------------

    /// Changes the back buffer size and reset flags. Takes effect with the next frame.
    pub fn reset(&mut self, width: u32, height: u32, flags: ResetFlags) {
        let resolution = &mut self.init.resolution;
        resolution.width = width;
        resolution.height = height;
        resolution.reset = flags;
        self.frame.set_resolution(resolution.clone());
    }

    /// Sets the debug flags of the next frame.
    pub fn set_debug(&mut self, debug: DebugFlags) {
        self.init.debug = debug;
        self.frame.set_debug(debug);
    }

    /// The frame being recorded. Every draw, compute, blit and state setter
    /// lives here.
    pub fn encoder(&mut self) -> &mut Frame {
        &mut self.frame
    }

    /// Ends the frame being recorded and hands it to the backend.
    ///
    /// Inline, the frame is rendered before this returns. With a render
    /// thread, this first waits for the previous frame to come back, then
    /// sends the current one and returns while it renders.
    ///
    /// ## Returns
    /// The number of the frame that was handed over.
    /// ## Errors
    /// The error of the frame the backend just finished: the current frame
    /// inline, the previous one with a render thread. Recording can continue
    /// after a `Fatal` error; `DeviceLost` and `NotInitialized` are permanent.
    pub fn frame(&mut self) -> Result<u64, RenderError> {
        let number = self.frame_number;
        self.frame.set_frame_number(number);
        self.frame.finish();

        let result = match &mut self.backend {
            Backend::Stopped => {
                self.frame.reset();
                return Err(RenderError::NotInitialized);
            }
            Backend::Inline(context) => {
                let result = context.submit(&mut self.frame);
                let freed = self.frame.take_free_handles();
                self.handles.release(freed);
                self.frame.reset();
                result
            }
            Backend::Threaded(thread) => {
                let previous = thread.wait();
                let (mut next, result) = match previous {
                    Some(Consumed { mut frame, result }) => {
                        self.handles.release(frame.take_free_handles());
                        (frame, result)
                    }
                    None => {
                        let frame = self.spare.take().unwrap_or_else(|| Frame::new(&self.init.limits));
                        (frame, Ok(self.stats.clone()))
                    }
                };
                next.reset();
                next.copy_views(&self.frame);
                next.set_resolution(self.frame.resolution().clone());
                next.set_debug(self.frame.debug());
                let finished = std::mem::replace(&mut self.frame, next);
                thread.kick(finished)?;
                result
            }
        };

        self.frame_number += 1;
        match result {
            Ok(stats) => {
                self.stats = stats;
                Ok(number)
            }
            Err(err) => {
                log::error!("Frame {number}: {err}");
                Err(err)
            }
        }
    }

    /// Waits for the backend, destroys every native object and stops the
    /// render thread. Idempotent.
    pub fn shutdown(&mut self) {
        match std::mem::replace(&mut self.backend, Backend::Stopped) {
            Backend::Stopped => {}
            Backend::Inline(mut context) => context.shutdown(),
            Backend::Threaded(mut thread) => {
                if let Some(Consumed { mut frame, result }) = thread.stop() {
                    self.handles.release(frame.take_free_handles());
                    if let Ok(stats) = result {
                        self.stats = stats;
                    }
                }
            }
        }
        log::info!("Renderer shut down after {} frame(s).", self.frame_number);
    }

    // --- View setters --------------------------------------------------------

    /// Sets the viewport of a view. A zero rectangle covers the whole target.
    pub fn set_view_rect(&mut self, view: ViewId, rect: Rect) {
        self.frame.set_view_rect(view, rect);
    }

    /// Sets the clear values of a view.
    pub fn set_view_clear(&mut self, view: ViewId, flags: ClearFlags, rgba: u32, depth: f32, stencil: u8) {
        self.frame.set_view_clear(view, flags, rgba, depth, stencil);
    }

    /// Renders a view into `frame_buffer` instead of the back buffer.
    pub fn set_view_frame_buffer(&mut self, view: ViewId, frame_buffer: FrameBufferHandle) {
        self.frame.set_view_frame_buffer(view, frame_buffer);
    }

    /// Sets the draw ordering of a view.
    pub fn set_view_mode(&mut self, view: ViewId, mode: ViewMode) {
        self.frame.set_view_mode(view, mode);
    }

    /// Records a draw with the pending encoder state. See [`Frame::submit`].
    pub fn submit(&mut self, view: ViewId, program: ProgramHandle, depth: f32) -> bool {
        self.frame.submit(view, program, depth)
    }

    /// Records a blit. See [`Frame::blit`].
    pub fn blit(&mut self, view: ViewId, item: BlitItem) -> bool {
        self.frame.blit(view, item)
    }

    // --- Resources -----------------------------------------------------------

    fn destroy(&mut self, handle: FreeHandle, command: ResourceCommand) {
        if self.handles.retire(handle) {
            self.frame.push_command(command);
        } else {
            log::warn!("Ignoring destruction of dead handle {handle:?}.");
        }
    }

    /// Registers a vertex layout.
    pub fn create_vertex_layout(&mut self, layout: VertexLayout) -> VertexLayoutHandle {
        let handle = VertexLayoutHandle(alloc(&mut self.handles.vertex_layouts, "vertex layout"));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateVertexLayout { handle, layout });
        }
        handle
    }

    /// Destroys a vertex layout.
    pub fn destroy_vertex_layout(&mut self, handle: VertexLayoutHandle) {
        self.destroy(FreeHandle::VertexLayout(handle), ResourceCommand::DestroyVertexLayout(handle));
    }

    /// Creates an immutable vertex buffer.
    /// ## Arguments
    /// * `mem` - The vertex data.
    /// * `layout` - The layout of one vertex.
    /// * `flags` - Compute access flags.
    /// ## Returns
    /// The new handle, or an invalid handle when every vertex buffer handle is in use.
    pub fn create_vertex_buffer(
        &mut self,
        mem: Memory,
        layout: VertexLayoutHandle,
        flags: BufferFlags,
    ) -> VertexBufferHandle {
        let handle = VertexBufferHandle(alloc(&mut self.handles.vertex_buffers, "vertex buffer"));
        if handle.is_valid() {
            self.frame.push_command(ResourceCommand::CreateVertexBuffer {
                handle,
                mem,
                layout,
                flags,
            });
        }
        handle
    }

    /// Destroys a vertex buffer.
    pub fn destroy_vertex_buffer(&mut self, handle: VertexBufferHandle) {
        self.destroy(FreeHandle::VertexBuffer(handle), ResourceCommand::DestroyVertexBuffer(handle));
    }

    /// Creates an immutable index buffer. 32-bit indices are selected with
    /// `BufferFlags::INDEX32`.
    pub fn create_index_buffer(&mut self, mem: Memory, flags: BufferFlags) -> IndexBufferHandle {
        let handle = IndexBufferHandle(alloc(&mut self.handles.index_buffers, "index buffer"));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateIndexBuffer { handle, mem, flags });
        }
        handle
    }

    /// Destroys an index buffer.
    pub fn destroy_index_buffer(&mut self, handle: IndexBufferHandle) {
        self.destroy(FreeHandle::IndexBuffer(handle), ResourceCommand::DestroyIndexBuffer(handle));
    }

    /// Creates an updatable vertex buffer of `size` vertices.
    pub fn create_dynamic_vertex_buffer(
        &mut self,
        size: u32,
        layout: VertexLayoutHandle,
        flags: BufferFlags,
    ) -> DynamicVertexBufferHandle {
        let handle = DynamicVertexBufferHandle(alloc(
            &mut self.handles.dynamic_vertex_buffers,
            "dynamic vertex buffer",
        ));
        if handle.is_valid() {
            self.frame.push_command(ResourceCommand::CreateDynamicVertexBuffer {
                handle,
                size,
                layout,
                flags,
            });
        }
        handle
    }

    /// Overwrites part of an updatable vertex buffer, starting at vertex `offset`.
    pub fn update_dynamic_vertex_buffer(&mut self, handle: DynamicVertexBufferHandle, offset: u32, mem: Memory) {
        if self.handles.is_usable(FreeHandle::DynamicVertexBuffer(handle)) {
            self.frame
                .push_command(ResourceCommand::UpdateDynamicVertexBuffer { handle, offset, mem });
        } else {
            log::warn!("Ignoring update of dead {handle:?}.");
        }
    }

    /// Destroys an updatable vertex buffer.
    pub fn destroy_dynamic_vertex_buffer(&mut self, handle: DynamicVertexBufferHandle) {
        self.destroy(
            FreeHandle::DynamicVertexBuffer(handle),
            ResourceCommand::DestroyDynamicVertexBuffer(handle),
        );
    }

    /// Creates an updatable index buffer of `size` indices.
    pub fn create_dynamic_index_buffer(&mut self, size: u32, flags: BufferFlags) -> DynamicIndexBufferHandle {
        let handle = DynamicIndexBufferHandle(alloc(
            &mut self.handles.dynamic_index_buffers,
            "dynamic index buffer",
        ));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateDynamicIndexBuffer { handle, size, flags });
        }
        handle
    }

    /// Overwrites part of an updatable index buffer, starting at index `offset`.
    pub fn update_dynamic_index_buffer(&mut self, handle: DynamicIndexBufferHandle, offset: u32, mem: Memory) {
        if self.handles.is_usable(FreeHandle::DynamicIndexBuffer(handle)) {
            self.frame
                .push_command(ResourceCommand::UpdateDynamicIndexBuffer { handle, offset, mem });
        } else {
            log::warn!("Ignoring update of dead {handle:?}.");
        }
    }

    /// Destroys an updatable index buffer.
    pub fn destroy_dynamic_index_buffer(&mut self, handle: DynamicIndexBufferHandle) {
        self.destroy(
            FreeHandle::DynamicIndexBuffer(handle),
            ResourceCommand::DestroyDynamicIndexBuffer(handle),
        );
    }

    /// Creates a buffer of `num` indirect draw or dispatch records.
    pub fn create_indirect_buffer(&mut self, num: u32) -> IndirectBufferHandle {
        let handle = IndirectBufferHandle(alloc(&mut self.handles.indirect_buffers, "indirect buffer"));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateIndirectBuffer { handle, num });
        }
        handle
    }

    /// Destroys an indirect buffer.
    pub fn destroy_indirect_buffer(&mut self, handle: IndirectBufferHandle) {
        self.destroy(FreeHandle::IndirectBuffer(handle), ResourceCommand::DestroyIndirectBuffer(handle));
    }

    /// Creates a shader from a serialized shader container.
    pub fn create_shader(&mut self, mem: Memory) -> ShaderHandle {
        let handle = ShaderHandle(alloc(&mut self.handles.shaders, "shader"));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateShader { handle, mem });
        }
        handle
    }

    /// Destroys a shader. Programs already linked from it stay valid.
    pub fn destroy_shader(&mut self, handle: ShaderHandle) {
        self.destroy(FreeHandle::Shader(handle), ResourceCommand::DestroyShader(handle));
    }

    /// Links a vertex and a fragment shader into a program.
    pub fn create_program(&mut self, vsh: ShaderHandle, fsh: ShaderHandle) -> ProgramHandle {
        self.link(vsh, Some(fsh))
    }

    /// Wraps a compute shader into a program.
    pub fn create_compute_program(&mut self, csh: ShaderHandle) -> ProgramHandle {
        self.link(csh, None)
    }

    fn link(&mut self, vsh: ShaderHandle, fsh: Option<ShaderHandle>) -> ProgramHandle {
        let shaders_live = self.handles.is_usable(FreeHandle::Shader(vsh))
            && fsh.is_none_or(|fsh| self.handles.is_usable(FreeHandle::Shader(fsh)));
        if !shaders_live {
            log::warn!("Cannot link a program from dead shaders ({vsh:?}, {fsh:?}).");
            return ProgramHandle::INVALID;
        }
        let handle = ProgramHandle(alloc(&mut self.handles.programs, "program"));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateProgram { handle, vsh, fsh });
        }
        handle
    }

    /// Destroys a program.
    pub fn destroy_program(&mut self, handle: ProgramHandle) {
        self.destroy(FreeHandle::Program(handle), ResourceCommand::DestroyProgram(handle));
    }

    /// Creates a texture, optionally with the initial contents of every mip and layer.
    pub fn create_texture(&mut self, desc: TextureDesc, mem: Option<Memory>) -> TextureHandle {
        let handle = TextureHandle(alloc(&mut self.handles.textures, "texture"));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateTexture { handle, desc, mem });
        }
        handle
    }

    /// Uploads a region of one mip of a texture.
    pub fn update_texture(&mut self, handle: TextureHandle, region: TextureRegion, mem: Memory) {
        if self.handles.is_usable(FreeHandle::Texture(handle)) {
            self.frame
                .push_command(ResourceCommand::UpdateTexture { handle, region, mem });
        } else {
            log::warn!("Ignoring update of dead {handle:?}.");
        }
    }

    /// Destroys a texture.
    pub fn destroy_texture(&mut self, handle: TextureHandle) {
        self.destroy(FreeHandle::Texture(handle), ResourceCommand::DestroyTexture(handle));
    }

    /// Creates a render target from texture attachments.
    pub fn create_frame_buffer(&mut self, attachments: Vec<Attachment>) -> FrameBufferHandle {
        let handle = FrameBufferHandle(alloc(&mut self.handles.frame_buffers, "frame buffer"));
        if handle.is_valid() {
            self.frame
                .push_command(ResourceCommand::CreateFrameBuffer { handle, attachments });
        }
        handle
    }

    /// Destroys a frame buffer. The attached textures are not destroyed.
    pub fn destroy_frame_buffer(&mut self, handle: FrameBufferHandle) {
        self.destroy(FreeHandle::FrameBuffer(handle), ResourceCommand::DestroyFrameBuffer(handle));
    }

    /// Creates a named uniform.
    ///
    /// Uniforms are shared by name: creating a name that already exists
    /// returns the existing handle and adds a reference.
    pub fn create_uniform(&mut self, name: &str, ty: UniformType, num: u16) -> UniformHandle {
        if let Some(entry) = self.uniforms.get_mut(name) {
            entry.refs += 1;
            return entry.handle;
        }
        let handle = UniformHandle(alloc(&mut self.handles.uniforms, "uniform"));
        if handle.is_valid() {
            self.frame.push_command(ResourceCommand::CreateUniform {
                handle,
                name: name.to_owned(),
                ty,
                num,
            });
            self.uniforms.insert(name.to_owned(), UniformEntry { handle, refs: 1 });
        }
        handle
    }

    /// Drops a reference to a uniform. The uniform is destroyed with its last reference.
    pub fn destroy_uniform(&mut self, handle: UniformHandle) {
        let Some(name) = self
            .uniforms
            .iter()
            .find(|(_, entry)| entry.handle == handle)
            .map(|(name, _)| name.clone())
        else {
            log::warn!("Ignoring destruction of unknown {handle:?}.");
            return;
        };
        let remaining = match self.uniforms.get_mut(&name) {
            Some(entry) => {
                entry.refs -= 1;
                entry.refs
            }
            None => return,
        };
        if remaining == 0 {
            self.uniforms.remove(&name);
            self.destroy(FreeHandle::Uniform(handle), ResourceCommand::DestroyUniform(handle));
        }
    }

    /// Number of destroyed handles waiting for their frame to be consumed.
    pub fn num_pending_frees(&self) -> usize {
        self.handles.num_pending()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}
