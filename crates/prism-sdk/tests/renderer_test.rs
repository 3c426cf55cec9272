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


use anyhow::Result;
use prism_core::renderer::api::core::{Init, RendererType};
use prism_core::renderer::api::resource::{
    Attrib, AttribType, BufferFlags, ProgramHandle, UniformType, VertexBufferHandle, VertexLayout,
    VertexLayoutHandle,
};
use prism_core::renderer::api::shader::{ShaderBinary, ShaderStage, ShaderUniform, SHADER_CONTAINER_VERSION};
use prism_core::renderer::{LogCallback, RenderError};
use prism_core::Memory;
use prism_infra::HeadlessDevice;
use prism_sdk::{create_context, Renderer};
use std::sync::Arc;

fn shader(stage: ShaderStage, attributes: Vec<Attrib>) -> Memory {
    let (uniforms, constant_size) = match stage {
        ShaderStage::Vertex => {
            let mvp = ShaderUniform {
                name: "u_modelViewProj".into(),
                ty: UniformType::Mat4,
                flags: 0,
                num: 1,
                reg_index: 0,
                reg_count: 4,
                tex_component: 0,
                tex_dimension: 0,
                tex_format: 0,
            };
            (vec![mvp], 64)
        }
        _ => (Vec::new(), 0),
    };
    let binary = ShaderBinary {
        stage,
        version: SHADER_CONTAINER_VERSION,
        hash_in: 0,
        hash_out: 0,
        uniforms,
        code: vec![0x03, 0x02, 0x23, 0x07],
        attributes,
        constant_size,
    };
    let mut bytes = Vec::new();
    binary
        .write_to(&mut bytes)
        .unwrap_or_else(|err| panic!("shader container: {err}"));
    Memory::from_vec(bytes)
}

fn renderer(device: &HeadlessDevice, init: Init, threaded: bool) -> Result<Renderer> {
    let _ = env_logger::builder().is_test(true).try_init();
    let context = create_context(device.clone(), &init, Arc::new(LogCallback));
    if threaded {
        Renderer::with_render_thread(init, context)
    } else {
        Ok(Renderer::new(init, context))
    }
}

struct Triangle {
    layout: VertexLayoutHandle,
    vb: VertexBufferHandle,
    program: ProgramHandle,
}

fn create_triangle(renderer: &mut Renderer) -> Triangle {
    let layout = VertexLayout::begin()
        .add(Attrib::Position, 3, AttribType::Float, false, false)
        .end();
    let vertices: Vec<u8> = [0.0f32, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let layout_handle = renderer.create_vertex_layout(layout);
    let vb = renderer.create_vertex_buffer(Memory::from_vec(vertices), layout_handle, BufferFlags::EMPTY);
    let vsh = renderer.create_shader(shader(ShaderStage::Vertex, vec![Attrib::Position]));
    let fsh = renderer.create_shader(shader(ShaderStage::Fragment, Vec::new()));
    let program = renderer.create_program(vsh, fsh);
    Triangle {
        layout: layout_handle,
        vb,
        program,
    }
}

fn draw(renderer: &mut Renderer, triangle: &Triangle) -> bool {
    renderer
        .encoder()
        .set_vertex_buffer(0, triangle.vb, 0, 3, VertexLayoutHandle::INVALID);
    renderer.submit(0, triangle.program, 0.0)
}

#[test]
fn test_inline_frame_renders_before_returning() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), false)?;
    assert_eq!(renderer.renderer_type(), RendererType::Explicit);

    let triangle = create_triangle(&mut renderer);
    assert!(triangle.layout.is_valid());
    assert!(draw(&mut renderer, &triangle));

    assert_eq!(renderer.frame()?, 0);
    assert_eq!(renderer.stats().draw_calls, 1);
    assert_eq!(renderer.frame_number(), 1);
    assert_eq!(device.presents(), 1);
    Ok(())
}

#[test]
fn test_destroyed_handles_are_recycled_after_the_frame() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), false)?;
    let triangle = create_triangle(&mut renderer);
    renderer.frame()?;

    renderer.destroy_vertex_buffer(triangle.vb);
    renderer.destroy_vertex_buffer(triangle.vb);
    assert_eq!(renderer.num_pending_frees(), 1, "double destruction is ignored");

    // Still allocated until the destroying frame is consumed.
    let other = renderer.create_vertex_buffer(Memory::zeroed(36), triangle.layout, BufferFlags::EMPTY);
    assert_ne!(other, triangle.vb);

    renderer.frame()?;
    assert_eq!(renderer.num_pending_frees(), 0);
    let reused = renderer.create_vertex_buffer(Memory::zeroed(36), triangle.layout, BufferFlags::EMPTY);
    assert_eq!(reused, triangle.vb);
    Ok(())
}

#[test]
fn test_render_thread_reports_the_previous_frame() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), true)?;
    let triangle = create_triangle(&mut renderer);
    assert!(draw(&mut renderer, &triangle));

    // Frame 0 is now rendering on the other thread.
    assert_eq!(renderer.frame()?, 0);
    assert_eq!(renderer.stats().draw_calls, 0);

    // Handing over frame 1 collects frame 0 first.
    assert_eq!(renderer.frame()?, 1);
    assert_eq!(renderer.stats().draw_calls, 1);
    assert_eq!(renderer.stats().frame_number, 0);

    renderer.shutdown();
    assert_eq!(device.presents(), 2);
    assert_eq!(renderer.stats().frame_number, 1);
    Ok(())
}

#[test]
fn test_render_thread_releases_handles_when_the_frame_returns() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), true)?;
    let triangle = create_triangle(&mut renderer);
    renderer.frame()?;

    renderer.destroy_vertex_buffer(triangle.vb);
    renderer.frame()?;
    assert_eq!(renderer.num_pending_frees(), 1, "the destroying frame is still in flight");

    renderer.frame()?;
    assert_eq!(renderer.num_pending_frees(), 0);
    let reused = renderer.create_vertex_buffer(Memory::zeroed(36), triangle.layout, BufferFlags::EMPTY);
    assert_eq!(reused, triangle.vb);
    Ok(())
}

#[test]
fn test_failed_backend_falls_back_to_noop() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut init = Init::default();
    init.limits.max_descriptor_sets = 0;
    let mut renderer = renderer(&device, init, false)?;

    assert_eq!(renderer.renderer_type(), RendererType::Noop);
    let triangle = create_triangle(&mut renderer);
    assert!(draw(&mut renderer, &triangle));
    renderer.frame()?;
    assert_eq!(renderer.stats().draw_calls, 0);
    assert_eq!(renderer.stats().skipped_items, 1);
    assert_eq!(device.presents(), 0);
    Ok(())
}

#[test]
fn test_uniforms_are_shared_by_name() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), false)?;
    let first = renderer.create_uniform("u_color", UniformType::Vec4, 1);
    let second = renderer.create_uniform("u_color", UniformType::Vec4, 1);
    assert_eq!(first, second);

    renderer.destroy_uniform(first);
    assert_eq!(renderer.num_pending_frees(), 0, "one reference left");
    renderer.destroy_uniform(second);
    assert_eq!(renderer.num_pending_frees(), 1);
    Ok(())
}

#[test]
fn test_program_from_dead_shader_is_invalid() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), false)?;
    let vsh = renderer.create_shader(shader(ShaderStage::Vertex, vec![Attrib::Position]));
    let fsh = renderer.create_shader(shader(ShaderStage::Fragment, Vec::new()));
    renderer.destroy_shader(fsh);
    assert!(!renderer.create_program(vsh, fsh).is_valid());
    Ok(())
}

#[test]
fn test_frame_after_shutdown_is_rejected() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), true)?;
    renderer.frame()?;
    renderer.shutdown();
    renderer.shutdown();
    assert!(!renderer.is_running());
    assert!(matches!(renderer.frame(), Err(RenderError::NotInitialized)));
    Ok(())
}

#[test]
fn test_lost_device_is_reported() -> Result<()> {
    let device = HeadlessDevice::new();
    let mut renderer = renderer(&device, Init::default(), false)?;
    renderer.frame()?;
    device.lose_device();
    assert!(matches!(renderer.frame(), Err(RenderError::DeviceLost)));
    Ok(())
}
