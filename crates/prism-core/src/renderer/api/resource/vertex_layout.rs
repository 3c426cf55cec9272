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

//! Vertex layouts: which attributes a vertex carries and where.

use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// Vertex attributes a shader can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Attrib {
    /// Position.
    Position,
    /// Normal.
    Normal,
    /// Tangent.
    Tangent,
    /// Bitangent.
    Bitangent,
    /// Color 0.
    Color0,
    /// Color 1.
    Color1,
    /// Color 2.
    Color2,
    /// Color 3.
    Color3,
    /// Skinning indices.
    Indices,
    /// Skinning weights.
    Weight,
    /// Texture coordinate 0.
    TexCoord0,
    /// Texture coordinate 1.
    TexCoord1,
    /// Texture coordinate 2.
    TexCoord2,
    /// Texture coordinate 3.
    TexCoord3,
    /// Texture coordinate 4.
    TexCoord4,
    /// Texture coordinate 5.
    TexCoord5,
    /// Texture coordinate 6.
    TexCoord6,
    /// Texture coordinate 7.
    TexCoord7,
}

impl Attrib {
    /// Number of attributes.
    pub const COUNT: usize = 18;

    /// Every attribute, in location order.
    pub const ALL: [Attrib; Self::COUNT] = [
        Attrib::Position,
        Attrib::Normal,
        Attrib::Tangent,
        Attrib::Bitangent,
        Attrib::Color0,
        Attrib::Color1,
        Attrib::Color2,
        Attrib::Color3,
        Attrib::Indices,
        Attrib::Weight,
        Attrib::TexCoord0,
        Attrib::TexCoord1,
        Attrib::TexCoord2,
        Attrib::TexCoord3,
        Attrib::TexCoord4,
        Attrib::TexCoord5,
        Attrib::TexCoord6,
        Attrib::TexCoord7,
    ];

    /// Decodes an attribute id as stored in shader containers.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// The shader input location of this attribute.
    pub const fn location(self) -> u32 {
        self as u32
    }
}

/// Component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttribType {
    /// Unsigned 8-bit.
    Uint8,
    /// Unsigned 10-bit, packed three per 32 bits.
    Uint10,
    /// Signed 16-bit.
    Int16,
    /// 16-bit float.
    Half,
    /// 32-bit float.
    Float,
}

impl AttribType {
    /// Size in bytes of `num` components (1..=4).
    pub const fn size_of(self, num: u8) -> u16 {
        const SIZES: [[u16; 4]; 5] = [
            [1, 2, 4, 4],
            [4, 4, 4, 4],
            [2, 4, 6, 8],
            [2, 4, 6, 8],
            [4, 8, 12, 16],
        ];
        let num = if num == 0 { 1 } else if num > 4 { 4 } else { num };
        SIZES[self as usize][num as usize - 1]
    }
}

/// Placement of one attribute inside a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribDesc {
    /// Number of components (1..=4).
    pub num: u8,
    /// Component type.
    pub ty: AttribType,
    /// Integer components are normalized to [0, 1] / [-1, 1].
    pub normalized: bool,
    /// Components are read as integers by the shader.
    pub as_int: bool,
    /// Byte offset from the start of the vertex.
    pub offset: u16,
}

/// Describes the attributes of one vertex stream.
///
/// Built with [`VertexLayout::begin`], [`add`](VertexLayout::add) and
/// [`end`](VertexLayout::end). The layout hash is stable across runs, so it
/// can be part of persisted pipeline keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    hash: u32,
    stride: u16,
    attributes: [Option<AttribDesc>; Attrib::COUNT],
}

impl Default for VertexLayout {
    fn default() -> Self {
        Self::begin()
    }
}

impl VertexLayout {
    /// Starts an empty layout.
    pub fn begin() -> Self {
        Self {
            hash: 0,
            stride: 0,
            attributes: [None; Attrib::COUNT],
        }
    }

    /// Appends an attribute at the current end of the vertex.
    #[must_use]
    pub fn add(
        mut self,
        attrib: Attrib,
        num: u8,
        ty: AttribType,
        normalized: bool,
        as_int: bool,
    ) -> Self {
        let num = num.clamp(1, 4);
        self.attributes[attrib as usize] = Some(AttribDesc {
            num,
            ty,
            normalized,
            as_int,
            offset: self.stride,
        });
        self.stride += ty.size_of(num);
        self
    }

    /// Leaves `bytes` of padding at the current end of the vertex.
    #[must_use]
    pub fn skip(mut self, bytes: u8) -> Self {
        self.stride += bytes as u16;
        self
    }

    /// Finishes the layout and computes its hash.
    #[must_use]
    pub fn end(mut self) -> Self {
        let mut hasher = Xxh3::new();
        self.attributes.hash(&mut hasher);
        self.stride.hash(&mut hasher);
        self.hash = hasher.finish() as u32;
        self
    }

    /// Content hash, valid after [`end`](Self::end).
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> u16 {
        self.stride
    }

    /// Returns the placement of `attrib`, if the layout has it.
    pub fn attribute(&self, attrib: Attrib) -> Option<AttribDesc> {
        self.attributes[attrib as usize]
    }

    /// Returns `true` if the layout has `attrib`.
    pub fn has(&self, attrib: Attrib) -> bool {
        self.attributes[attrib as usize].is_some()
    }

    /// Iterates over the attributes present in the layout.
    pub fn iter(&self) -> impl Iterator<Item = (Attrib, AttribDesc)> + '_ {
        Attrib::ALL
            .iter()
            .zip(self.attributes.iter())
            .filter_map(|(attrib, desc)| desc.map(|d| (*attrib, d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_color() -> VertexLayout {
        VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .add(Attrib::Color0, 4, AttribType::Uint8, true, false)
            .end()
    }

    #[test]
    fn offsets_and_stride_accumulate() {
        let layout = pos_color();
        assert_eq!(layout.stride(), 16);
        assert_eq!(layout.attribute(Attrib::Color0).map(|a| a.offset), Some(12));
        assert!(!layout.has(Attrib::Normal));
        assert_eq!(layout.iter().count(), 2);
    }

    #[test]
    fn hash_is_deterministic_and_content_sensitive() {
        assert_eq!(pos_color().hash(), pos_color().hash());
        let padded = VertexLayout::begin()
            .add(Attrib::Position, 3, AttribType::Float, false, false)
            .skip(4)
            .add(Attrib::Color0, 4, AttribType::Uint8, true, false)
            .end();
        assert_ne!(padded.hash(), pos_color().hash());
    }

    #[test]
    fn attribute_ids_round_trip() {
        assert_eq!(Attrib::from_id(10), Some(Attrib::TexCoord0));
        assert_eq!(Attrib::from_id(99), None);
        assert_eq!(AttribType::Uint10.size_of(3), 4);
    }
}
