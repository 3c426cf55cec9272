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

//! Render targets and render pass lookup.

use super::conversions::{clears_color, clears_depth};
use super::state_cache::StateCache;
use prism_core::renderer::api::command::ClearFlags;
use prism_core::renderer::api::native::{
    AttachmentDesc, ImageLayout, LoadOp, RenderPassDesc, RenderPassId, StoreOp,
};
use prism_core::renderer::api::resource::TextureFormat;
use prism_core::renderer::{NativeDevice, NativeError};
use std::hash::{Hash, Hasher};
use xxhash_rust::xxh3::Xxh3;

/// One attachment of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetAttachment {
    /// Pixel format.
    pub format: TextureFormat,
    /// Sample count.
    pub samples: u8,
    /// Layout the attachment rests in before and after a pass.
    pub layout: ImageLayout,
}

/// The attachment signature of a frame buffer or of the back buffer.
///
/// Attachment views of a framebuffer are ordered colors, depth, resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RenderTarget {
    /// Color attachments.
    pub colors: Vec<TargetAttachment>,
    /// Depth/stencil attachment.
    pub depth: Option<TargetAttachment>,
    /// Single-sample resolve targets of the color attachments.
    pub resolves: Vec<TargetAttachment>,
}

impl RenderTarget {
    /// Sample count of the rendered attachments.
    pub fn samples(&self) -> u8 {
        self.colors
            .first()
            .or(self.depth.as_ref())
            .map_or(1, |a| a.samples)
    }

    /// Number of attachments, resolves included.
    pub fn num_attachments(&self) -> usize {
        self.colors.len() + self.depth.is_some() as usize + self.resolves.len()
    }

    /// The render pass clearing what `clear` asks for and loading the rest.
    pub fn pass_desc(&self, clear: ClearFlags) -> RenderPassDesc {
        let color_load = if clears_color(clear) { LoadOp::Clear } else { LoadOp::Load };
        let depth_load = if clears_depth(clear) { LoadOp::Clear } else { LoadOp::Load };
        let attachment = |a: &TargetAttachment, load: LoadOp| AttachmentDesc {
            format: a.format,
            samples: a.samples,
            load,
            store: StoreOp::Store,
            initial_layout: a.layout,
            final_layout: a.layout,
        };
        RenderPassDesc {
            colors: self.colors.iter().map(|a| attachment(a, color_load)).collect(),
            depth_stencil: self.depth.as_ref().map(|a| attachment(a, depth_load)),
            resolves: self
                .resolves
                .iter()
                .map(|a| attachment(a, LoadOp::DontCare))
                .collect(),
        }
    }

    /// The render pass pipelines and framebuffers are created against.
    pub fn compatible_desc(&self) -> RenderPassDesc {
        self.pass_desc(ClearFlags::EMPTY)
    }
}

/// Stable hash of a render pass description.
pub fn pass_hash(desc: &RenderPassDesc) -> u64 {
    let mut hasher = Xxh3::new();
    desc.hash(&mut hasher);
    hasher.finish()
}

/// Returns the cached render pass for `desc`, creating it on a miss.
///
/// ## Returns
/// The render pass and its hash.
pub fn fetch_render_pass<D: NativeDevice>(
    device: &D,
    cache: &mut StateCache<RenderPassId>,
    desc: &RenderPassDesc,
) -> Result<(RenderPassId, u64), NativeError> {
    let hash = pass_hash(desc);
    if let Some(pass) = cache.find(hash) {
        return Ok((pass, hash));
    }
    let pass = device.create_render_pass(desc)?;
    log::debug!(
        "Render pass {pass:?} created ({} colors, depth: {}, {} resolves).",
        desc.colors.len(),
        desc.depth_stencil.is_some(),
        desc.resolves.len()
    );
    cache.add(hash, pass);
    Ok((pass, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> RenderTarget {
        RenderTarget {
            colors: vec![TargetAttachment {
                format: TextureFormat::Rgba8,
                samples: 4,
                layout: ImageLayout::ColorAttachment,
            }],
            depth: Some(TargetAttachment {
                format: TextureFormat::D24S8,
                samples: 4,
                layout: ImageLayout::DepthStencilAttachment,
            }),
            resolves: vec![TargetAttachment {
                format: TextureFormat::Bgra8,
                samples: 1,
                layout: ImageLayout::ColorAttachment,
            }],
        }
    }

    #[test]
    fn clear_flags_select_load_ops() {
        let target = target();
        let desc = target.pass_desc(ClearFlags::COLOR);
        assert_eq!(desc.colors[0].load, LoadOp::Clear);
        assert_eq!(desc.depth_stencil.map(|d| d.load), Some(LoadOp::Load));
        assert_eq!(desc.resolves[0].load, LoadOp::DontCare);
        assert_eq!(target.samples(), 4);
        assert_eq!(target.num_attachments(), 3);
    }

    #[test]
    fn equal_signatures_hash_equal() {
        let a = target().pass_desc(ClearFlags::DEPTH);
        let b = target().pass_desc(ClearFlags::STENCIL);
        assert_eq!(pass_hash(&a), pass_hash(&b));
        assert_ne!(pass_hash(&a), pass_hash(&target().compatible_desc()));
    }
}
