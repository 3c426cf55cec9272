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

//! Per-slot linear allocators.
//!
//! Each frame in flight owns a uniform scratch buffer and a staging scratch
//! buffer. Both are host-visible, bump-allocated during recording, flushed
//! before submission and reset only after the slot's fence was waited.

use super::command_queue::CommandQueue;
use super::staged_init::InitGuard;
use prism_core::renderer::api::native::{BufferDesc, BufferId, BufferUsage, MemoryLocation, NativeObject};
use prism_core::renderer::{NativeDevice, NativeError};
use prism_core::utils::align_up;

/// A fixed-capacity bump allocator over one host-visible buffer.
#[derive(Debug)]
pub struct ScratchBuffer {
    buffer: BufferId,
    size: u64,
    pos: u64,
    flush_align: u64,
    usage: BufferUsage,
}

/// Where [`ScratchBuffer::write_or_fallback`] put the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchWrite {
    /// The buffer holding the data.
    pub buffer: BufferId,
    /// Byte offset of the data.
    pub offset: u64,
    /// The scratch buffer was full and a one-off buffer was used.
    pub fallback: bool,
}

impl ScratchBuffer {
    /// Creates the buffer and registers it with the init guard.
    ///
    /// ## Arguments
    /// * `size` - Capacity in bytes.
    /// * `usage` - Usage of the backing buffer.
    pub fn new<D: NativeDevice>(
        guard: &mut InitGuard<'_, D>,
        size: u64,
        usage: BufferUsage,
    ) -> Result<Self, NativeError> {
        let device = guard.device();
        let flush_align = device.limits().non_coherent_atom_size.max(1);
        let buffer = device.create_buffer(&BufferDesc {
            size,
            usage,
            location: MemoryLocation::HostVisible,
        })?;
        guard.track(NativeObject::Buffer(buffer));
        Ok(Self {
            buffer,
            size,
            pos: 0,
            flush_align,
            usage,
        })
    }

    /// The backing buffer.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.size
    }

    /// Bytes allocated since the last reset.
    pub fn used(&self) -> u64 {
        self.pos
    }

    /// Reserves `size` bytes at an offset aligned to `align`. Returns `None`
    /// when the buffer is full; nothing is reserved in that case.
    pub fn alloc(&mut self, size: u64, align: u64) -> Option<u64> {
        let offset = align_up(self.pos, align);
        let end = offset.checked_add(size)?;
        if end > self.size {
            return None;
        }
        self.pos = end;
        Some(offset)
    }

    /// Copies `data` into the buffer.
    ///
    /// ## Returns
    /// The offset of the copy, or `None` when the buffer is full.
    pub fn write<D: NativeDevice>(
        &mut self,
        device: &D,
        data: &[u8],
        align: u64,
    ) -> Result<Option<u64>, NativeError> {
        let Some(offset) = self.alloc(data.len() as u64, align) else {
            return Ok(None);
        };
        if !data.is_empty() {
            device.write_buffer(self.buffer, offset, data)?;
        }
        Ok(Some(offset))
    }

    /// Copies `data` into the buffer, or into a one-off host-visible buffer
    /// when the scratch buffer is full. The one-off buffer is released through
    /// `queue` and lives until the current slot retires.
    pub fn write_or_fallback<D: NativeDevice>(
        &mut self,
        device: &D,
        queue: &mut CommandQueue,
        data: &[u8],
        align: u64,
    ) -> Result<ScratchWrite, NativeError> {
        if let Some(offset) = self.write(device, data, align)? {
            return Ok(ScratchWrite {
                buffer: self.buffer,
                offset,
                fallback: false,
            });
        }
        let size = data.len().max(1) as u64;
        let buffer = device.create_buffer(&BufferDesc {
            size,
            usage: self.usage,
            location: MemoryLocation::HostVisible,
        })?;
        queue.release(NativeObject::Buffer(buffer));
        device.write_buffer(buffer, 0, data)?;
        device.flush_buffer(buffer, 0, size)?;
        log::debug!(
            "Scratch buffer full ({} of {} bytes used), {} bytes went to a one-off buffer.",
            self.pos,
            self.size,
            data.len()
        );
        Ok(ScratchWrite {
            buffer,
            offset: 0,
            fallback: true,
        })
    }

    /// Makes everything written since the last reset visible to the GPU.
    pub fn flush<D: NativeDevice>(&self, device: &D) -> Result<(), NativeError> {
        if self.pos == 0 {
            return Ok(());
        }
        let size = align_up(self.pos, self.flush_align).min(self.size);
        device.flush_buffer(self.buffer, 0, size)
    }

    /// Rewinds the allocator. Only valid once the GPU finished reading.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Destroys the backing buffer.
    pub fn destroy<D: NativeDevice>(&mut self, device: &D) {
        device.destroy(NativeObject::Buffer(self.buffer));
        self.buffer = BufferId::NULL;
        self.size = 0;
        self.pos = 0;
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::headless::HeadlessDevice;

    fn scratch(device: &HeadlessDevice, size: u64) -> ScratchBuffer {
        let mut guard = InitGuard::new(device);
        let scratch = ScratchBuffer::new(&mut guard, size, BufferUsage::UNIFORM).unwrap();
        guard.commit();
        scratch
    }

    #[test]
    fn write_round_trips_and_respects_alignment() {
        let device = HeadlessDevice::new();
        let mut scratch = scratch(&device, 1024);

        let first = scratch.write(&device, &[1, 2, 3], 256).unwrap();
        let second = scratch.write(&device, &[7; 4], 256).unwrap();
        assert_eq!(first, Some(0));
        assert_eq!(second, Some(256));
        assert_eq!(scratch.used(), 260);

        let data = device.buffer_data(scratch.buffer()).unwrap();
        assert_eq!(&data[0..3], &[1, 2, 3]);
        assert_eq!(&data[256..260], &[7; 4]);
        assert!(scratch.flush(&device).is_ok());
    }

    #[test]
    fn full_buffer_reports_none_and_reset_rewinds() {
        let device = HeadlessDevice::new();
        let mut scratch = scratch(&device, 512);

        assert_eq!(scratch.alloc(400, 16), Some(0));
        assert_eq!(scratch.alloc(200, 16), None);
        assert_eq!(scratch.used(), 400, "a failed alloc reserves nothing");

        scratch.reset();
        assert_eq!(scratch.used(), 0);
        assert_eq!(scratch.alloc(200, 16), Some(0));
    }

    #[test]
    fn full_buffer_falls_back_to_a_released_one_off_buffer() {
        let device = HeadlessDevice::new();
        let mut guard = InitGuard::new(&device);
        let mut queue = CommandQueue::new(&mut guard, 1, 4).unwrap();
        let mut scratch = ScratchBuffer::new(&mut guard, 64, BufferUsage::UNIFORM).unwrap();
        guard.commit();
        queue.alloc(&device).unwrap();

        let write = scratch.write_or_fallback(&device, &mut queue, &[5; 100], 16).unwrap();
        assert!(write.fallback);
        assert_ne!(write.buffer, scratch.buffer());
        assert_eq!(device.buffer_data(write.buffer).unwrap(), vec![5; 100]);

        queue.kick(&device, true).unwrap();
        assert!(device.buffer_data(write.buffer).is_none(), "released once the slot retired");
    }
}
