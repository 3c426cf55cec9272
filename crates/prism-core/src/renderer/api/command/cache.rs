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

//! Per-frame transform and scissor caches.
//!
//! Render items reference matrices and scissor rectangles by index so a draw
//! stays small and transforms shared by several draws are stored once.

use super::view::Rect;
use glam::Mat4;

/// Transforms recorded during a frame. Index 0 always holds the identity.
#[derive(Debug, Clone)]
pub struct MatrixCache {
    matrices: Vec<Mat4>,
    capacity: usize,
}

impl MatrixCache {
    /// Creates a cache holding at most `capacity` matrices (identity included).
    pub fn new(capacity: usize) -> Self {
        let mut cache = Self {
            matrices: Vec::new(),
            capacity: capacity.max(1),
        };
        cache.reset();
        cache
    }

    /// Drops every matrix but the identity.
    pub fn reset(&mut self) {
        self.matrices.clear();
        self.matrices.push(Mat4::IDENTITY);
    }

    /// Appends matrices and returns the index of the first one together with the
    /// number actually stored. Matrices past the capacity are dropped; an empty
    /// input or a full cache yields the identity.
    pub fn add(&mut self, matrices: &[Mat4]) -> (u32, u16) {
        let room = self.capacity - self.matrices.len();
        let num = matrices.len().min(room).min(u16::MAX as usize);
        if num == 0 {
            return (0, 1);
        }
        let first = self.matrices.len() as u32;
        self.matrices.extend_from_slice(&matrices[..num]);
        (first, num as u16)
    }

    /// The matrix at `index`, or the identity when out of range.
    pub fn get(&self, index: u32) -> Mat4 {
        self.matrices
            .get(index as usize)
            .copied()
            .unwrap_or(Mat4::IDENTITY)
    }

    /// Number of stored matrices, identity included.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// Always `false`: the identity is never removed.
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }
}

/// Scissor rectangles recorded during a frame.
#[derive(Debug, Clone)]
pub struct RectCache {
    rects: Vec<Rect>,
    capacity: usize,
}

impl RectCache {
    /// Creates a cache holding at most `capacity` rectangles.
    pub fn new(capacity: usize) -> Self {
        Self {
            rects: Vec::new(),
            capacity: capacity.min(u16::MAX as usize),
        }
    }

    /// Drops every rectangle.
    pub fn reset(&mut self) {
        self.rects.clear();
    }

    /// Appends a rectangle, or returns `None` when the cache is full.
    pub fn add(&mut self, rect: Rect) -> Option<u16> {
        if self.rects.len() >= self.capacity {
            return None;
        }
        self.rects.push(rect);
        Some(self.rects.len() as u16 - 1)
    }

    /// The rectangle at `index`.
    pub fn get(&self, index: u16) -> Option<Rect> {
        self.rects.get(index as usize).copied()
    }

    /// Number of stored rectangles.
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Returns `true` if no rectangle is stored.
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn matrix_cache_keeps_identity_at_zero() {
        let mut cache = MatrixCache::new(4);
        let m = Mat4::from_translation(Vec3::X);
        assert_eq!(cache.add(&[m, m]), (1, 2));
        assert_eq!(cache.get(2), m);
        assert_eq!(cache.get(0), Mat4::IDENTITY);

        // One slot left.
        assert_eq!(cache.add(&[m, m]), (3, 1));
        assert_eq!(cache.add(&[m]), (0, 1));
        cache.reset();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rect_cache_soft_caps() {
        let mut cache = RectCache::new(1);
        assert_eq!(cache.add(Rect::new(0, 0, 8, 8)), Some(0));
        assert_eq!(cache.add(Rect::new(0, 0, 8, 8)), None);
        assert_eq!(cache.get(0).map(|r| r.width), Some(8));
    }
}
