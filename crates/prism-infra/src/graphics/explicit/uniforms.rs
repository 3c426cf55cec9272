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

//! Uniform values and constant block packing.
//!
//! Uniform updates recorded in a frame are applied, in order, to a persistent
//! per-handle value table. Shader constant blocks are packed from that table
//! and from the predefined uniforms derived from the view and draw transforms.

use ahash::AHashMap;
use glam::Mat4;
use prism_core::renderer::api::command::{MatrixCache, Rect, UniformBuffer, UniformUpdate, View};
use prism_core::renderer::api::resource::{UniformHandle, UniformType};
use prism_core::renderer::api::shader::PredefinedUniform;

const MAT4_SIZE: usize = 64;

#[derive(Debug)]
struct UniformValue {
    name: String,
    data: Vec<u8>,
}

/// The current value of every client uniform.
#[derive(Debug, Default)]
pub struct UniformTable {
    values: Vec<Option<UniformValue>>,
    names: AHashMap<String, UniformHandle>,
}

impl UniformTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a uniform with a zeroed value.
    pub fn create(&mut self, handle: UniformHandle, name: String, ty: UniformType, num: u16) {
        let idx = handle.idx();
        if self.values.len() <= idx {
            self.values.resize_with(idx + 1, || None);
        }
        let size = ty.size() as usize * num.max(1) as usize;
        if let Some(previous) = self.names.insert(name.clone(), handle) {
            if previous != handle {
                log::warn!("Uniform '{name}' re-registered as {handle:?}, replacing {previous:?}.");
            }
        }
        self.values[idx] = Some(UniformValue {
            name,
            data: vec![0; size],
        });
    }

    /// Forgets a uniform.
    pub fn destroy(&mut self, handle: UniformHandle) {
        if let Some(value) = self.values.get_mut(handle.idx()).and_then(Option::take) {
            if self.names.get(&value.name) == Some(&handle) {
                self.names.remove(&value.name);
            }
        }
    }

    /// Looks a uniform up by name.
    pub fn find(&self, name: &str) -> Option<UniformHandle> {
        self.names.get(name).copied()
    }

    /// The current bytes of a uniform.
    pub fn value(&self, handle: UniformHandle) -> Option<&[u8]> {
        self.values
            .get(handle.idx())
            .and_then(Option::as_ref)
            .map(|v| v.data.as_slice())
    }

    /// Applies logged updates in order.
    ///
    /// ## Returns
    /// The number of updates applied. Updates of unknown uniforms are ignored.
    pub fn apply(&mut self, updates: &[UniformUpdate], log: &UniformBuffer) -> usize {
        let mut applied = 0;
        for update in updates {
            let Some(value) = self.values.get_mut(update.handle.idx()).and_then(Option::as_mut) else {
                log::trace!("Update of unknown uniform {:?} ignored.", update.handle);
                continue;
            };
            let payload = log.payload(update);
            let len = payload.len().min(value.data.len());
            value.data[..len].copy_from_slice(&payload[..len]);
            applied += 1;
        }
        applied
    }
}

/// Where a constant of a shader's constant block takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantSource {
    /// Computed per draw.
    Predefined(PredefinedUniform),
    /// A client uniform.
    User(UniformHandle),
}

/// One constant of a shader's constant block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderConstant {
    /// The value source.
    pub source: ConstantSource,
    /// Byte offset in the block.
    pub offset: u32,
    /// Bytes reserved in the block.
    pub size: u32,
}

/// View and draw state the predefined uniforms are derived from.
#[derive(Debug, Clone, Copy)]
pub struct DrawTransforms<'a> {
    /// The view being rendered.
    pub view: &'a View,
    /// Its clamped rectangle.
    pub rect: Rect,
    /// The frame's matrix cache.
    pub matrices: &'a MatrixCache,
    /// First model matrix.
    pub matrix: u32,
    /// Number of model matrices.
    pub num_matrices: u16,
    /// Alpha reference of the render state.
    pub alpha_ref: u8,
}

/// Packs a constant block.
///
/// ## Arguments
/// * `constants` - The shader's constants.
/// * `size` - Size of the block in bytes.
/// * `table` - Current client uniform values.
/// * `transforms` - Inputs of the predefined uniforms.
/// * `out` - Receives the block; cleared first.
pub fn pack_constants(
    constants: &[ShaderConstant],
    size: usize,
    table: &UniformTable,
    transforms: &DrawTransforms<'_>,
    out: &mut Vec<u8>,
) {
    out.clear();
    out.resize(size, 0);
    for constant in constants {
        let start = constant.offset as usize;
        let end = (start + constant.size as usize).min(size);
        if start >= end {
            continue;
        }
        let dst = &mut out[start..end];
        match constant.source {
            ConstantSource::User(handle) => {
                if let Some(value) = table.value(handle) {
                    let len = value.len().min(dst.len());
                    dst[..len].copy_from_slice(&value[..len]);
                }
            }
            ConstantSource::Predefined(uniform) => write_predefined(uniform, transforms, dst),
        }
    }
}

fn write_predefined(uniform: PredefinedUniform, t: &DrawTransforms<'_>, dst: &mut [u8]) {
    let view = t.view.view;
    let proj = t.view.proj;
    let model = t.matrices.get(t.matrix);
    match uniform {
        PredefinedUniform::ViewRect => write_floats(
            dst,
            &[
                t.rect.x as f32,
                t.rect.y as f32,
                t.rect.width as f32,
                t.rect.height as f32,
            ],
        ),
        PredefinedUniform::ViewTexel => write_floats(
            dst,
            &[
                1.0 / t.rect.width.max(1) as f32,
                1.0 / t.rect.height.max(1) as f32,
                0.0,
                0.0,
            ],
        ),
        PredefinedUniform::View => write_matrix(dst, view),
        PredefinedUniform::InvView => write_matrix(dst, view.inverse()),
        PredefinedUniform::Proj => write_matrix(dst, proj),
        PredefinedUniform::ViewProj => write_matrix(dst, proj * view),
        PredefinedUniform::Model => {
            for (i, chunk) in dst
                .chunks_mut(MAT4_SIZE)
                .take(t.num_matrices.max(1) as usize)
                .enumerate()
            {
                write_matrix(chunk, t.matrices.get(t.matrix + i as u32));
            }
        }
        PredefinedUniform::ModelView => write_matrix(dst, view * model),
        PredefinedUniform::ModelViewProj => write_matrix(dst, proj * view * model),
        PredefinedUniform::AlphaRef => write_floats(dst, &[t.alpha_ref as f32 / 255.0, 0.0, 0.0, 0.0]),
    }
}

fn write_matrix(dst: &mut [u8], matrix: Mat4) {
    write_floats(dst, &matrix.to_cols_array());
}

fn write_floats(dst: &mut [u8], values: &[f32]) {
    let bytes: &[u8] = bytemuck::cast_slice(values);
    let len = bytes.len().min(dst.len());
    dst[..len].copy_from_slice(&bytes[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn updates_apply_in_order_and_truncate_to_the_declared_size() {
        let mut table = UniformTable::new();
        let color = UniformHandle(0);
        table.create(color, "u_color".to_string(), UniformType::Vec4, 1);

        let mut log = UniformBuffer::new(1024);
        assert!(log.write(color, UniformType::Vec4, 1, bytemuck::cast_slice(&[1.0f32; 4])));
        assert!(log.write(color, UniformType::Vec4, 1, bytemuck::cast_slice(&[2.0f32; 8])));
        assert!(log.write(UniformHandle(9), UniformType::Vec4, 1, &[0; 16]));

        let updates = log.range(0, log.pos());
        assert_eq!(table.apply(updates, &log), 2);
        assert_eq!(floats(table.value(color).unwrap()), vec![2.0; 4]);
        assert_eq!(table.find("u_color"), Some(color));

        table.destroy(color);
        assert_eq!(table.find("u_color"), None);
        assert!(table.value(color).is_none());
    }

    #[test]
    fn packs_user_and_predefined_constants() {
        let mut table = UniformTable::new();
        let tint = UniformHandle(3);
        table.create(tint, "u_tint".to_string(), UniformType::Vec4, 1);
        let mut log = UniformBuffer::new(256);
        log.write(tint, UniformType::Vec4, 1, bytemuck::cast_slice(&[0.5f32; 4]));
        table.apply(log.range(0, log.pos()), &log);

        let view = View {
            view: Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            proj: Mat4::from_scale(Vec3::splat(2.0)),
            ..Default::default()
        };
        let mut matrices = MatrixCache::new(16);
        let (first, num) = matrices.add(&[Mat4::from_translation(Vec3::X)]);
        let transforms = DrawTransforms {
            view: &view,
            rect: Rect::new(0, 0, 640, 480),
            matrices: &matrices,
            matrix: first,
            num_matrices: num,
            alpha_ref: 255,
        };
        let constants = [
            ShaderConstant {
                source: ConstantSource::Predefined(PredefinedUniform::ModelViewProj),
                offset: 0,
                size: 64,
            },
            ShaderConstant {
                source: ConstantSource::User(tint),
                offset: 64,
                size: 16,
            },
            ShaderConstant {
                source: ConstantSource::Predefined(PredefinedUniform::ViewTexel),
                offset: 80,
                size: 16,
            },
            ShaderConstant {
                source: ConstantSource::Predefined(PredefinedUniform::AlphaRef),
                offset: 96,
                size: 16,
            },
        ];

        let mut block = Vec::new();
        pack_constants(&constants, 112, &table, &transforms, &mut block);
        assert_eq!(block.len(), 112);

        let expected = view.proj * view.view * Mat4::from_translation(Vec3::X);
        assert_eq!(floats(&block[0..64]), expected.to_cols_array().to_vec());
        assert_eq!(floats(&block[64..80]), vec![0.5; 4]);
        assert_eq!(floats(&block[80..88]), vec![1.0 / 640.0, 1.0 / 480.0]);
        assert_eq!(floats(&block[96..100]), vec![1.0]);
    }

    #[test]
    fn constants_past_the_block_are_clipped() {
        let table = UniformTable::new();
        let view = View::default();
        let matrices = MatrixCache::new(1);
        let transforms = DrawTransforms {
            view: &view,
            rect: Rect::new(0, 0, 1, 1),
            matrices: &matrices,
            matrix: 0,
            num_matrices: 1,
            alpha_ref: 0,
        };
        let constants = [ShaderConstant {
            source: ConstantSource::Predefined(PredefinedUniform::Model),
            offset: 32,
            size: 64,
        }];
        let mut block = Vec::new();
        pack_constants(&constants, 48, &table, &transforms, &mut block);
        assert_eq!(floats(&block[32..48]), vec![1.0, 0.0, 0.0, 0.0]);
    }
}
