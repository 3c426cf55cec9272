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

//! Per-view state: viewport, scissor, clear values, transforms and target.

use crate::prism_bitflags;
use crate::renderer::api::resource::FrameBufferHandle;
use glam::Mat4;

/// Identifies a view. Views are rendered in ascending id order.
pub type ViewId = u16;

/// An integer rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge.
    pub x: u16,
    /// Top edge.
    pub y: u16,
    /// Width.
    pub width: u16,
    /// Height.
    pub height: u16,
}

impl Rect {
    /// Creates a rectangle.
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns `true` if the rectangle covers no pixel.
    pub const fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// One past the right edge.
    pub fn right(&self) -> u32 {
        self.x as u32 + self.width as u32
    }

    /// One past the bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y as u32 + self.height as u32
    }

    /// The overlap of two rectangles. Disjoint rectangles yield a zero-sized one.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect {
            x,
            y,
            width: right.saturating_sub(x as u32) as u16,
            height: bottom.saturating_sub(y as u32) as u16,
        }
    }

    /// Clips the rectangle to a `width` x `height` target.
    pub fn clamp_to(&self, width: u32, height: u32) -> Rect {
        let bounds = Rect::new(
            0,
            0,
            width.min(u16::MAX as u32) as u16,
            height.min(u16::MAX as u32) as u16,
        );
        self.intersect(&bounds)
    }
}

prism_bitflags! {
    /// Which attachments a view clears when its render pass begins.
    pub struct ClearFlags: u16 {
        /// Clear color attachments.
        const COLOR = 1 << 0;
        /// Clear depth.
        const DEPTH = 1 << 1;
        /// Clear stencil.
        const STENCIL = 1 << 2;
    }
}

/// Clear values of a view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clear {
    /// What to clear.
    pub flags: ClearFlags,
    /// Packed `0xRRGGBBAA` color.
    pub rgba: u32,
    /// Depth value.
    pub depth: f32,
    /// Stencil value.
    pub stencil: u8,
}

impl Default for Clear {
    fn default() -> Self {
        Self {
            flags: ClearFlags::EMPTY,
            rgba: 0x0000_00ff,
            depth: 1.0,
            stencil: 0,
        }
    }
}

impl Clear {
    /// The clear color as normalized floats.
    pub fn color(&self) -> [f32; 4] {
        let c = self.rgba.to_be_bytes();
        [
            c[0] as f32 / 255.0,
            c[1] as f32 / 255.0,
            c[2] as f32 / 255.0,
            c[3] as f32 / 255.0,
        ]
    }
}

/// How draw calls of a view are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewMode {
    /// Opaque before blended, then grouped by program, then front to back.
    #[default]
    Default,
    /// Submission order.
    Sequential,
    /// Front to back.
    DepthAscending,
    /// Back to front.
    DepthDescending,
}

/// Everything the backend needs to know about one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    /// Viewport. A zero rectangle covers the whole target.
    pub rect: Rect,
    /// Scissor applied to every draw of the view. A zero rectangle disables it.
    pub scissor: Rect,
    /// Clear values.
    pub clear: Clear,
    /// View matrix.
    pub view: Mat4,
    /// Projection matrix.
    pub proj: Mat4,
    /// Render target. [`FrameBufferHandle::INVALID`] selects the back buffer.
    pub frame_buffer: FrameBufferHandle,
    /// Draw ordering.
    pub mode: ViewMode,
}

impl Default for View {
    fn default() -> Self {
        Self {
            rect: Rect::default(),
            scissor: Rect::default(),
            clear: Clear::default(),
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            frame_buffer: FrameBufferHandle::INVALID,
            mode: ViewMode::Default,
        }
    }
}

impl View {
    /// Returns `true` if a render pass for this view would clear something.
    pub fn has_clear(&self) -> bool {
        !self.clear.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_overlapping_and_disjoint() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 60, 100, 100);
        assert_eq!(a.intersect(&b), Rect::new(50, 60, 50, 40));

        let c = Rect::new(200, 200, 10, 10);
        assert!(a.intersect(&c).is_zero());
    }

    #[test]
    fn clamp_to_target() {
        let r = Rect::new(10, 10, 1000, 1000);
        assert_eq!(r.clamp_to(640, 480), Rect::new(10, 10, 630, 470));
    }

    #[test]
    fn clear_color_unpacks_rgba() {
        let clear = Clear {
            rgba: 0xff00_80ff,
            ..Default::default()
        };
        let [r, g, b, a] = clear.color();
        assert_eq!((r, g, a), (1.0, 0.0, 1.0));
        assert!((b - 128.0 / 255.0).abs() < f32::EPSILON);
    }
}
