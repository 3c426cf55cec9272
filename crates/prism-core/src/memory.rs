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

//! Immutable memory blocks passed from the API thread to the renderer.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A reference-counted, immutable block of bytes.
///
/// Resource creation and update commands carry their payload as a `Memory`
/// block. Cloning only bumps the reference count, so a block can sit in a
/// frame's command list while the API thread keeps its own copy.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    data: Arc<[u8]>,
}

impl Memory {
    /// Copies `data` into a new block.
    pub fn copy(data: &[u8]) -> Self {
        Self {
            data: Arc::from(data),
        }
    }

    /// Takes ownership of `data` without copying the bytes again.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            data: Arc::from(data),
        }
    }

    /// Copies a slice of plain-old-data values into a new block.
    pub fn of<T: bytemuck::Pod>(items: &[T]) -> Self {
        Self::copy(bytemuck::cast_slice(items))
    }

    /// Allocates a zero-filled block of `size` bytes.
    pub fn zeroed(size: usize) -> Self {
        Self::from_vec(vec![0; size])
    }

    /// The size of the block in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the block holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes of the block.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of live references to this block.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl Deref for Memory {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Memory {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for Memory {
    fn from(data: &[u8]) -> Self {
        Self::copy(data)
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_casts_pod_values() {
        let mem = Memory::of(&[1.0f32, 2.0, 3.0]);
        assert_eq!(mem.len(), 12);
        assert_eq!(&mem[0..4], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn clones_share_the_allocation() {
        let mem = Memory::copy(&[1, 2, 3]);
        let other = mem.clone();
        assert_eq!(mem.ref_count(), 2);
        drop(other);
        assert_eq!(mem.ref_count(), 1);
    }

    #[test]
    fn debug_does_not_dump_contents() {
        let mem = Memory::zeroed(1024);
        assert_eq!(format!("{mem:?}"), "Memory { len: 1024 }");
        assert!(Memory::default().is_empty());
    }
}
