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

//! The shader container format.
//!
//! All integers are little-endian:
//!
//! ```text
//! magic[3] ("VSH" | "FSH" | "CSH")  version: u8
//! hash_in: u32  hash_out: u32
//! count: u16, then per uniform:
//!     name_len: u8  name[name_len]  type: u8  num: u8
//!     reg_index: u16  reg_count: u16
//!     tex_component: u8  tex_dimension: u8  tex_format: u16
//! code_size: u32  code[code_size]  0u8
//! num_attrs: u8  attr_id: u16 * num_attrs
//! constant_size: u16
//! ```
//!
//! The low nibble of `type` is the [`UniformType`] tag; the high nibble holds
//! the fragment, sampler, read-only and compare flags.

use crate::renderer::api::resource::{Attrib, UniformType};
use crate::renderer::error::ShaderError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// Newest container version understood by the parser.
pub const SHADER_CONTAINER_VERSION: u8 = 11;

/// Uniform is used by the fragment stage.
pub const UNIFORM_FRAGMENT_BIT: u8 = 0x10;
/// Uniform is a sampler.
pub const UNIFORM_SAMPLER_BIT: u8 = 0x20;
/// Uniform is a read-only storage resource.
pub const UNIFORM_READONLY_BIT: u8 = 0x40;
/// Sampler performs depth comparison.
pub const UNIFORM_COMPARE_BIT: u8 = 0x80;
const UNIFORM_TYPE_MASK: u8 = 0x0f;

/// The pipeline stage a shader runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Fragment shader.
    Fragment,
    /// Compute shader.
    Compute,
}

impl ShaderStage {
    fn magic(self) -> [u8; 3] {
        match self {
            ShaderStage::Vertex => *b"VSH",
            ShaderStage::Fragment => *b"FSH",
            ShaderStage::Compute => *b"CSH",
        }
    }

    fn from_magic(magic: [u8; 3]) -> Option<Self> {
        match &magic {
            b"VSH" => Some(ShaderStage::Vertex),
            b"FSH" => Some(ShaderStage::Fragment),
            b"CSH" => Some(ShaderStage::Compute),
            _ => None,
        }
    }
}

/// One entry of a shader's uniform table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderUniform {
    /// Name.
    pub name: String,
    /// Type.
    pub ty: UniformType,
    /// Raw flag nibble (fragment, sampler, read-only, compare).
    pub flags: u8,
    /// Array size.
    pub num: u8,
    /// Byte offset in the constant block, or binding slot for samplers.
    pub reg_index: u16,
    /// Number of registers (vec4) covered.
    pub reg_count: u16,
    /// Texture component type.
    pub tex_component: u8,
    /// Texture dimension.
    pub tex_dimension: u8,
    /// Storage texture format.
    pub tex_format: u16,
}

impl ShaderUniform {
    /// Returns `true` if the fragment stage reads the uniform.
    pub fn is_fragment(&self) -> bool {
        self.flags & UNIFORM_FRAGMENT_BIT != 0
    }

    /// Returns `true` for samplers and storage resources.
    pub fn is_sampler(&self) -> bool {
        self.flags & UNIFORM_SAMPLER_BIT != 0 || self.ty == UniformType::Sampler
    }
}

/// A parsed shader container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBinary {
    /// Stage.
    pub stage: ShaderStage,
    /// Container version.
    pub version: u8,
    /// Hash of the stage inputs.
    pub hash_in: u32,
    /// Hash of the stage outputs. Vertex and fragment shaders link when they match.
    pub hash_out: u32,
    /// Uniform table.
    pub uniforms: Vec<ShaderUniform>,
    /// Native bytecode.
    pub code: Vec<u8>,
    /// Vertex attributes consumed (vertex shaders).
    pub attributes: Vec<Attrib>,
    /// Size of the constant block in bytes.
    pub constant_size: u16,
}

fn truncated(field: &'static str) -> impl FnOnce(io::Error) -> ShaderError {
    move |_| ShaderError::Truncated(field)
}

impl ShaderBinary {
    /// Parses a container.
    pub fn parse(bytes: &[u8]) -> Result<Self, ShaderError> {
        let mut reader = Cursor::new(bytes);

        let mut magic = [0u8; 3];
        reader.read_exact(&mut magic).map_err(truncated("magic"))?;
        let stage = ShaderStage::from_magic(magic).ok_or(ShaderError::InvalidMagic(magic))?;
        let version = reader.read_u8().map_err(truncated("version"))?;
        if version > SHADER_CONTAINER_VERSION {
            return Err(ShaderError::UnsupportedVersion(version));
        }

        let hash_in = reader.read_u32::<LittleEndian>().map_err(truncated("hash_in"))?;
        let hash_out = reader.read_u32::<LittleEndian>().map_err(truncated("hash_out"))?;

        let count = reader.read_u16::<LittleEndian>().map_err(truncated("uniform count"))?;
        let mut uniforms = Vec::with_capacity(count as usize);
        for _ in 0..count {
            uniforms.push(Self::read_uniform(&mut reader)?);
        }

        let code_size = reader.read_u32::<LittleEndian>().map_err(truncated("code size"))?;
        let mut code = vec![0u8; code_size as usize];
        reader.read_exact(&mut code).map_err(truncated("code"))?;

        // Containers written before the attribute table end here.
        if reader.position() as usize == bytes.len() {
            return Ok(Self {
                stage,
                version,
                hash_in,
                hash_out,
                uniforms,
                code,
                attributes: Vec::new(),
                constant_size: 0,
            });
        }

        let _terminator = reader.read_u8().map_err(truncated("code terminator"))?;
        let num_attrs = reader.read_u8().map_err(truncated("attribute count"))?;
        let mut attributes = Vec::with_capacity(num_attrs as usize);
        for _ in 0..num_attrs {
            let id = reader.read_u16::<LittleEndian>().map_err(truncated("attribute"))?;
            match Attrib::from_id(id) {
                Some(attrib) => attributes.push(attrib),
                None => log::debug!("Skipping unknown vertex attribute id {id}."),
            }
        }
        let constant_size = reader.read_u16::<LittleEndian>().map_err(truncated("constant size"))?;

        Ok(Self {
            stage,
            version,
            hash_in,
            hash_out,
            uniforms,
            code,
            attributes,
            constant_size,
        })
    }

    fn read_uniform(reader: &mut Cursor<&[u8]>) -> Result<ShaderUniform, ShaderError> {
        let name_len = reader.read_u8().map_err(truncated("uniform name length"))?;
        let mut name = vec![0u8; name_len as usize];
        reader.read_exact(&mut name).map_err(truncated("uniform name"))?;
        let name = String::from_utf8(name).map_err(|_| ShaderError::InvalidName)?;

        let type_byte = reader.read_u8().map_err(truncated("uniform type"))?;
        let ty = UniformType::from_tag(type_byte & UNIFORM_TYPE_MASK)
            .ok_or(ShaderError::InvalidUniformType(type_byte))?;
        let num = reader.read_u8().map_err(truncated("uniform array size"))?;
        let reg_index = reader.read_u16::<LittleEndian>().map_err(truncated("register index"))?;
        let reg_count = reader.read_u16::<LittleEndian>().map_err(truncated("register count"))?;
        let tex_component = reader.read_u8().map_err(truncated("texture component"))?;
        let tex_dimension = reader.read_u8().map_err(truncated("texture dimension"))?;
        let tex_format = reader.read_u16::<LittleEndian>().map_err(truncated("texture format"))?;

        Ok(ShaderUniform {
            name,
            ty,
            flags: type_byte & !UNIFORM_TYPE_MASK,
            num,
            reg_index,
            reg_count,
            tex_component,
            tex_dimension,
            tex_format,
        })
    }

    /// Serializes the container.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.stage.magic())?;
        writer.write_u8(self.version)?;
        writer.write_u32::<LittleEndian>(self.hash_in)?;
        writer.write_u32::<LittleEndian>(self.hash_out)?;

        writer.write_u16::<LittleEndian>(self.uniforms.len() as u16)?;
        for uniform in &self.uniforms {
            let name = uniform.name.as_bytes();
            let name_len = u8::try_from(name.len())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "uniform name too long"))?;
            writer.write_u8(name_len)?;
            writer.write_all(name)?;
            writer.write_u8(uniform.ty.tag() | (uniform.flags & !UNIFORM_TYPE_MASK))?;
            writer.write_u8(uniform.num)?;
            writer.write_u16::<LittleEndian>(uniform.reg_index)?;
            writer.write_u16::<LittleEndian>(uniform.reg_count)?;
            writer.write_u8(uniform.tex_component)?;
            writer.write_u8(uniform.tex_dimension)?;
            writer.write_u16::<LittleEndian>(uniform.tex_format)?;
        }

        writer.write_u32::<LittleEndian>(self.code.len() as u32)?;
        writer.write_all(&self.code)?;
        writer.write_u8(0)?;

        writer.write_u8(self.attributes.len() as u8)?;
        for attrib in &self.attributes {
            writer.write_u16::<LittleEndian>(*attrib as u16)?;
        }
        writer.write_u16::<LittleEndian>(self.constant_size)
    }

    /// Returns `true` if this shader consumes vertex attributes.
    pub fn uses_attributes(&self) -> bool {
        !self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ShaderBinary {
        ShaderBinary {
            stage: ShaderStage::Vertex,
            version: SHADER_CONTAINER_VERSION,
            hash_in: 0,
            hash_out: 0xdead_beef,
            uniforms: vec![
                ShaderUniform {
                    name: "u_modelViewProj".into(),
                    ty: UniformType::Mat4,
                    flags: 0,
                    num: 1,
                    reg_index: 0,
                    reg_count: 4,
                    tex_component: 0,
                    tex_dimension: 0,
                    tex_format: 0,
                },
                ShaderUniform {
                    name: "s_albedo".into(),
                    ty: UniformType::Sampler,
                    flags: UNIFORM_FRAGMENT_BIT | UNIFORM_SAMPLER_BIT,
                    num: 1,
                    reg_index: 0,
                    reg_count: 1,
                    tex_component: 0,
                    tex_dimension: 1,
                    tex_format: 0,
                },
            ],
            code: vec![0x03, 0x02, 0x23, 0x07],
            attributes: vec![Attrib::Position, Attrib::TexCoord0],
            constant_size: 64,
        }
    }

    #[test]
    fn written_container_parses_back() -> io::Result<()> {
        let shader = sample();
        let mut bytes = Vec::new();
        shader.write_to(&mut bytes)?;
        assert_eq!(&bytes[..3], b"VSH");

        let parsed = ShaderBinary::parse(&bytes);
        assert_eq!(parsed.as_ref(), Ok(&shader));
        let Ok(parsed) = parsed else { return Ok(()) };
        assert!(parsed.uniforms[1].is_fragment());
        assert!(parsed.uniforms[1].is_sampler());
        assert!(parsed.uses_attributes());
        Ok(())
    }

    #[test]
    fn bad_magic_and_version_are_rejected() {
        assert_eq!(
            ShaderBinary::parse(b"XYZ\x01"),
            Err(ShaderError::InvalidMagic(*b"XYZ"))
        );
        assert_eq!(
            ShaderBinary::parse(&[b'F', b'S', b'H', SHADER_CONTAINER_VERSION + 1]),
            Err(ShaderError::UnsupportedVersion(SHADER_CONTAINER_VERSION + 1))
        );
    }

    #[test]
    fn truncation_names_the_missing_field() -> io::Result<()> {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes)?;
        bytes.truncate(12);
        assert_eq!(
            ShaderBinary::parse(&bytes),
            Err(ShaderError::Truncated("uniform count"))
        );
        Ok(())
    }

    #[test]
    fn container_without_attribute_table_parses() -> io::Result<()> {
        let mut shader = sample();
        shader.attributes.clear();
        shader.constant_size = 0;
        let mut bytes = Vec::new();
        shader.write_to(&mut bytes)?;
        // Drop terminator, attribute count and constant size.
        bytes.truncate(bytes.len() - 4);
        assert_eq!(ShaderBinary::parse(&bytes), Ok(shader));
        Ok(())
    }

    #[test]
    fn unknown_uniform_type_is_an_error() -> io::Result<()> {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes)?;
        // magic(3) version(1) hashes(8) count(2) name_len(1) name(15) -> type byte
        let type_at = 3 + 1 + 8 + 2 + 1 + "u_modelViewProj".len();
        bytes[type_at] = 0x0e;
        assert_eq!(
            ShaderBinary::parse(&bytes),
            Err(ShaderError::InvalidUniformType(0x0e))
        );
        Ok(())
    }
}
