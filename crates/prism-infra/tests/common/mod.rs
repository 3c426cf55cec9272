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

//! Shared fixtures for the backend integration tests.

#![allow(dead_code)]

use anyhow::Result;
use prism_core::renderer::api::command::{Frame, ResourceCommand};
use prism_core::renderer::api::core::{FrameStats, Init};
use prism_core::renderer::api::resource::{
    Attrib, AttribType, BufferFlags, ProgramHandle, ShaderHandle, UniformType, VertexBufferHandle,
    VertexLayout, VertexLayoutHandle,
};
use prism_core::renderer::api::shader::{
    ShaderBinary, ShaderStage, ShaderUniform, SHADER_CONTAINER_VERSION, UNIFORM_FRAGMENT_BIT,
    UNIFORM_SAMPLER_BIT,
};
use prism_core::renderer::{Callback, LogCallback, RendererContext};
use prism_core::Memory;
use prism_infra::{ExplicitRenderer, HeadlessDevice};
use std::sync::Arc;

pub const TRIANGLE_LAYOUT: VertexLayoutHandle = VertexLayoutHandle(0);
pub const TRIANGLE_VB: VertexBufferHandle = VertexBufferHandle(0);
pub const TRIANGLE_PROGRAM: ProgramHandle = ProgramHandle(0);
pub const TEXTURED_PROGRAM: ProgramHandle = ProgramHandle(1);

/// A backend on a headless device plus the frame fed to it.
pub struct Harness {
    pub device: HeadlessDevice,
    pub renderer: ExplicitRenderer<HeadlessDevice>,
    pub frame: Frame,
    frame_number: u64,
}

impl Harness {
    pub fn new() -> Result<Self> {
        Self::with(HeadlessDevice::new(), Init::default(), Arc::new(LogCallback))
    }

    pub fn with(device: HeadlessDevice, init: Init, callback: Arc<dyn Callback>) -> Result<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        let renderer = ExplicitRenderer::new(device.clone(), &init, callback)?;
        let mut frame = Frame::new(&init.limits);
        frame.set_resolution(init.resolution.clone());
        Ok(Self {
            device,
            renderer,
            frame,
            frame_number: 0,
        })
    }

    /// Finishes the recorded frame, submits it and starts the next one, even
    /// when the submission failed.
    pub fn submit(&mut self) -> Result<FrameStats> {
        self.frame.set_frame_number(self.frame_number);
        self.frame.finish();
        let stats = self.renderer.submit(&mut self.frame);
        self.frame.reset();
        self.frame_number += 1;
        Ok(stats?)
    }

    /// Queues a triangle vertex buffer and two programs: a plain one and one
    /// sampling a texture on stage 0.
    pub fn create_programs(&mut self) {
        let layout = VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .end();
        let vertices: Vec<u8> = [0.0f32, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
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
        let sampler = ShaderUniform {
            name: "s_albedo".into(),
            ty: UniformType::Sampler,
            flags: UNIFORM_FRAGMENT_BIT | UNIFORM_SAMPLER_BIT,
            num: 1,
            reg_index: 0,
            reg_count: 1,
            tex_component: 0,
            tex_dimension: 1,
            tex_format: 0,
        };

        let commands = [
            ResourceCommand::CreateVertexLayout {
                handle: TRIANGLE_LAYOUT,
                layout,
            },
            ResourceCommand::CreateVertexBuffer {
                handle: TRIANGLE_VB,
                mem: Memory::from_vec(vertices),
                layout: TRIANGLE_LAYOUT,
                flags: BufferFlags::EMPTY,
            },
            ResourceCommand::CreateShader {
                handle: ShaderHandle(0),
                mem: shader(ShaderStage::Vertex, vec![mvp], vec![Attrib::Position], 64),
            },
            ResourceCommand::CreateShader {
                handle: ShaderHandle(1),
                mem: shader(ShaderStage::Fragment, Vec::new(), Vec::new(), 0),
            },
            ResourceCommand::CreateShader {
                handle: ShaderHandle(2),
                mem: shader(ShaderStage::Fragment, vec![sampler], Vec::new(), 0),
            },
            ResourceCommand::CreateProgram {
                handle: TRIANGLE_PROGRAM,
                vsh: ShaderHandle(0),
                fsh: Some(ShaderHandle(1)),
            },
            ResourceCommand::CreateProgram {
                handle: TEXTURED_PROGRAM,
                vsh: ShaderHandle(0),
                fsh: Some(ShaderHandle(2)),
            },
        ];
        for command in commands {
            self.frame.push_command(command);
        }
    }

    /// Records one triangle draw on `view`.
    pub fn draw_triangle(&mut self, view: u16, program: ProgramHandle) -> bool {
        self.frame
            .set_vertex_buffer(0, TRIANGLE_VB, 0, 3, VertexLayoutHandle::INVALID);
        self.frame.submit(view, program, 0.0)
    }

    pub fn last_commands(&self) -> Vec<prism_core::renderer::api::native::GpuCommand> {
        self.device
            .last_submission()
            .map(|s| s.commands)
            .unwrap_or_default()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.renderer.shutdown();
    }
}

/// Serializes a shader container.
pub fn shader(stage: ShaderStage, uniforms: Vec<ShaderUniform>, attributes: Vec<Attrib>, constant_size: u16) -> Memory {
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
