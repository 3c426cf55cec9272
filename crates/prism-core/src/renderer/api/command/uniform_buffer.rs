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

//! The per-frame uniform update log.
//!
//! `set_uniform` appends an update; render items remember the range of updates
//! recorded since the previous item. The backend replays those ranges in sorted
//! order into its own uniform storage.

use crate::renderer::api::resource::{UniformHandle, UniformType};

/// One recorded uniform update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformUpdate {
    /// The uniform.
    pub handle: UniformHandle,
    /// Its type.
    pub ty: UniformType,
    /// Number of array elements written.
    pub num: u16,
    /// Byte offset of the payload in the log.
    pub offset: u32,
    /// Payload size in bytes.
    pub size: u32,
}

/// Append-only log of uniform updates with a byte budget.
#[derive(Debug, Clone)]
pub struct UniformBuffer {
    entries: Vec<UniformUpdate>,
    data: Vec<u8>,
    capacity: usize,
}

impl UniformBuffer {
    /// Creates a log that holds at most `capacity` payload bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            data: Vec::new(),
            capacity,
        }
    }

    /// Records an update. Returns `false` when the log is full.
    pub fn write(&mut self, handle: UniformHandle, ty: UniformType, num: u16, payload: &[u8]) -> bool {
        if self.data.len() + payload.len() > self.capacity {
            return false;
        }
        self.entries.push(UniformUpdate {
            handle,
            ty,
            num,
            offset: self.data.len() as u32,
            size: payload.len() as u32,
        });
        self.data.extend_from_slice(payload);
        true
    }

    /// Number of recorded updates. Used as the end of an item's range.
    pub fn pos(&self) -> u32 {
        self.entries.len() as u32
    }

    /// The updates in `[begin, end)`.
    pub fn range(&self, begin: u32, end: u32) -> &[UniformUpdate] {
        let end = (end as usize).min(self.entries.len());
        let begin = (begin as usize).min(end);
        &self.entries[begin..end]
    }

    /// The payload of an update.
    pub fn payload(&self, update: &UniformUpdate) -> &[u8] {
        let start = update.offset as usize;
        self.data
            .get(start..start + update.size as usize)
            .unwrap_or(&[])
    }

    /// Payload bytes recorded so far.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Drops every update.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_replay_in_order() {
        let mut log = UniformBuffer::new(1024);
        assert!(log.write(UniformHandle(0), UniformType::Vec4, 1, &[1; 16]));
        let mid = log.pos();
        assert!(log.write(UniformHandle(1), UniformType::Vec4, 1, &[2; 16]));
        assert!(log.write(UniformHandle(0), UniformType::Vec4, 1, &[3; 16]));

        let second = log.range(mid, log.pos());
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].handle, UniformHandle(1));
        assert_eq!(log.payload(&second[1]), &[3; 16]);
    }

    #[test]
    fn full_log_rejects_updates() {
        let mut log = UniformBuffer::new(32);
        assert!(log.write(UniformHandle(0), UniformType::Vec4, 2, &[0; 32]));
        assert!(!log.write(UniformHandle(0), UniformType::Vec4, 1, &[0; 16]));
        assert_eq!(log.pos(), 1);
        log.reset();
        assert_eq!(log.size(), 0);
    }
}
