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

//! Typed 16-bit resource handles and their allocator.

macro_rules! define_handles {
    ($( $(#[$meta:meta])* $name:ident ),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub u16);

            impl $name {
                /// The sentinel for "no resource".
                pub const INVALID: Self = Self(u16::MAX);

                /// Returns `true` unless this is [`Self::INVALID`].
                pub const fn is_valid(self) -> bool {
                    self.0 != u16::MAX
                }

                /// The handle as a table index.
                pub const fn idx(self) -> usize {
                    self.0 as usize
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::INVALID
                }
            }
        )*
    };
}

define_handles! {
    /// A registered vertex layout.
    VertexLayoutHandle,
    /// A static vertex buffer.
    VertexBufferHandle,
    /// A static index buffer.
    IndexBufferHandle,
    /// A vertex buffer whose contents can be updated.
    DynamicVertexBufferHandle,
    /// An index buffer whose contents can be updated.
    DynamicIndexBufferHandle,
    /// A buffer of indirect draw or dispatch arguments.
    IndirectBufferHandle,
    /// A shader module.
    ShaderHandle,
    /// A linked program (vertex + fragment, or compute).
    ProgramHandle,
    /// A texture.
    TextureHandle,
    /// A frame buffer. [`FrameBufferHandle::INVALID`] addresses the back buffer.
    FrameBufferHandle,
    /// A named uniform.
    UniformHandle,
}

/// Hands out handle indices from a fixed range and recycles freed ones.
#[derive(Debug, Clone)]
pub struct HandleAllocator {
    capacity: u16,
    next: u16,
    free: Vec<u16>,
    live: Vec<bool>,
}

impl HandleAllocator {
    /// Creates an allocator for indices `0..capacity`.
    ///
    /// `u16::MAX` is reserved for the invalid sentinel and never handed out.
    pub fn new(capacity: u16) -> Self {
        let capacity = capacity.min(u16::MAX - 1);
        Self {
            capacity,
            next: 0,
            free: Vec::new(),
            live: vec![false; capacity as usize],
        }
    }

    /// Returns a free index, or `None` if every index is live.
    pub fn alloc(&mut self) -> Option<u16> {
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None if self.next < self.capacity => {
                self.next += 1;
                self.next - 1
            }
            None => return None,
        };
        self.live[idx as usize] = true;
        Some(idx)
    }

    /// Returns `idx` to the pool. Freeing a dead index is ignored and reported as `false`.
    pub fn free(&mut self, idx: u16) -> bool {
        match self.live.get_mut(idx as usize) {
            Some(live) if *live => {
                *live = false;
                self.free.push(idx);
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if `idx` is currently allocated.
    pub fn is_live(&self, idx: u16) -> bool {
        self.live.get(idx as usize).copied().unwrap_or(false)
    }

    /// Number of live indices.
    pub fn len(&self) -> usize {
        self.next as usize - self.free.len()
    }

    /// Returns `true` if no index is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of live indices.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handles_are_invalid() {
        assert!(!TextureHandle::default().is_valid());
        assert!(ProgramHandle(3).is_valid());
        assert_eq!(ProgramHandle(3).idx(), 3);
    }

    #[test]
    fn allocator_recycles_and_exhausts() {
        let mut alloc = HandleAllocator::new(2);
        let a = alloc.alloc();
        let b = alloc.alloc();
        assert_eq!((a, b), (Some(0), Some(1)));
        assert_eq!(alloc.alloc(), None);

        assert!(alloc.free(0));
        assert!(!alloc.free(0), "double free is rejected");
        assert_eq!(alloc.len(), 1);
        assert_eq!(alloc.alloc(), Some(0));
        assert!(alloc.is_live(0));
        assert!(!alloc.is_live(7));
    }
}
