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


//! Renders a spinning triangle for a few frames on the headless device.
//!
//! Usage: `sandbox [init.json] [--render-thread] [--frames N]`

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use prism_core::renderer::api::shader::{ShaderBinary, ShaderStage, ShaderUniform, SHADER_CONTAINER_VERSION};
use prism_infra::HeadlessDevice;
use prism_sdk::prelude::*;
use prism_sdk::{create_context, Renderer};
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    abgr: u32,
}

const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [0.0, 0.5, 0.0],
        abgr: 0xff0000ff,
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        abgr: 0xff00ff00,
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        abgr: 0xffff0000,
    },
];

struct Args {
    init: Option<String>,
    render_thread: bool,
    frames: u32,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        init: None,
        render_thread: false,
        frames: 5,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--render-thread" => args.render_thread = true,
            "--frames" => {
                let value = iter.next().context("--frames needs a value")?;
                args.frames = value.parse().with_context(|| format!("invalid frame count {value:?}"))?;
            }
            path => args.init = Some(path.to_owned()),
        }
    }
    Ok(args)
}

fn load_init(path: Option<&str>) -> Result<Init> {
    let Some(path) = path else {
        return Ok(Init::default());
    };
    let json = std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?;
    Init::from_json(&json).with_context(|| format!("invalid renderer configuration in {path}"))
}

/// Builds a shader container around placeholder bytecode. The headless device
/// accepts any code.
fn shader(stage: ShaderStage) -> Result<Memory> {
    let (uniforms, attributes, constant_size) = match stage {
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
            (vec![mvp], vec![Attrib::Position, Attrib::Color0], 64)
        }
        _ => (Vec::new(), Vec::new(), 0),
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
    binary.write_to(&mut bytes)?;
    Ok(Memory::from_vec(bytes))
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let init = load_init(args.init.as_deref())?;
    let device = HeadlessDevice::new();
    let context = create_context(device.clone(), &init, Arc::new(LogCallback));
    let mut renderer = if args.render_thread {
        Renderer::with_render_thread(init, context)?
    } else {
        Renderer::new(init, context)
    };

    let layout = VertexLayout::begin()
        .add(Attrib::Position, 3, AttribType::Float, false, false)
        .add(Attrib::Color0, 4, AttribType::Uint8, true, false)
        .end();
    let layout = renderer.create_vertex_layout(layout);
    let vb = renderer.create_vertex_buffer(Memory::of(&TRIANGLE), layout, BufferFlags::EMPTY);
    let vsh = renderer.create_shader(shader(ShaderStage::Vertex)?);
    let fsh = renderer.create_shader(shader(ShaderStage::Fragment)?);
    let program = renderer.create_program(vsh, fsh);
    renderer.set_view_clear(0, ClearFlags::COLOR | ClearFlags::DEPTH, 0x303030ff, 1.0, 0);

    for i in 0..args.frames {
        let angle = i as f32 * 0.25;
        let encoder = renderer.encoder();
        encoder.set_transform(&[Mat4::from_rotation_z(angle)]);
        encoder.set_vertex_buffer(0, vb, 0, 3, layout);
        encoder.set_state(StateFlags::DEFAULT, 0);
        renderer.submit(0, program, 0.0);

        match renderer.frame() {
            Ok(number) => {
                let stats = renderer.stats();
                log::info!(
                    "frame {number}: {} draw(s), {} pass(es), {} pipeline(s) created, {:.3} ms",
                    stats.draw_calls,
                    stats.render_passes,
                    stats.pipelines_created,
                    stats.cpu_submit_time_ms,
                );
            }
            Err(err) => log::error!("frame {i} failed: {err}"),
        }
    }

    renderer.destroy_program(program);
    renderer.destroy_shader(vsh);
    renderer.destroy_shader(fsh);
    renderer.destroy_vertex_buffer(vb);
    renderer.destroy_vertex_layout(layout);
    renderer.frame()?;
    renderer.shutdown();

    log::info!(
        "{} submission(s), {} present(s) on the headless device.",
        device.submissions().len(),
        device.presents(),
    );
    Ok(())
}
