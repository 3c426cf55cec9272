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

//! Frames in flight.
//!
//! The queue owns one command pool, command buffer and fence per frame in
//! flight and cycles through them round-robin. A slot is never re-recorded
//! before its fence signals, which bounds how far the CPU runs ahead of the
//! GPU. Objects released while a slot records are destroyed only once that
//! slot's fence has been observed signaled.

use super::staged_init::InitGuard;
use prism_core::renderer::api::native::{
    CommandBufferId, CommandPoolId, FenceId, NativeObject, PipelineStage, SemaphoreId, SubmitInfo,
};
use prism_core::renderer::{NativeDevice, NativeError};

/// Lifecycle of a frame-in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Free to record. Its fence is signaled.
    Idle,
    /// Commands are being recorded.
    Recording,
    /// Submitted; the GPU may still be executing it.
    Submitted,
}

#[derive(Debug)]
struct Slot {
    pool: CommandPoolId,
    command_buffer: CommandBufferId,
    fence: FenceId,
    state: SlotState,
    release: Vec<NativeObject>,
}

/// Round-robin manager of command buffers and fences.
#[derive(Debug)]
pub struct CommandQueue {
    slots: Vec<Slot>,
    current: usize,
    pending_release: Vec<NativeObject>,
    wait_semaphores: Vec<(SemaphoreId, PipelineStage)>,
    signal_semaphores: Vec<SemaphoreId>,
    max_semaphores: usize,
    dropped_semaphores: u32,
    submitted: u64,
}

impl CommandQueue {
    /// Creates `frames_in_flight` slots. Fences start signaled so the first
    /// `alloc` of every slot does not block.
    ///
    /// ## Arguments
    /// * `guard` - Registers every created object for unwinding.
    /// * `frames_in_flight` - Number of slots, at least one.
    /// * `max_semaphores` - Soft cap of wait and signal semaphores per submission.
    pub fn new<D: NativeDevice>(
        guard: &mut InitGuard<'_, D>,
        frames_in_flight: usize,
        max_semaphores: usize,
    ) -> Result<Self, NativeError> {
        let device = guard.device();
        let mut slots = Vec::with_capacity(frames_in_flight.max(1));
        for _ in 0..frames_in_flight.max(1) {
            let pool = device.create_command_pool()?;
            guard.track(NativeObject::CommandPool(pool));
            let command_buffer = device.allocate_command_buffer(pool)?;
            let fence = device.create_fence(true)?;
            guard.track(NativeObject::Fence(fence));
            slots.push(Slot {
                pool,
                command_buffer,
                fence,
                state: SlotState::Idle,
                release: Vec::new(),
            });
        }
        log::debug!("Command queue created with {} frames in flight.", slots.len());
        Ok(Self {
            slots,
            current: 0,
            pending_release: Vec::new(),
            wait_semaphores: Vec::new(),
            signal_semaphores: Vec::new(),
            max_semaphores,
            dropped_semaphores: 0,
            submitted: 0,
        })
    }

    /// Number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Index of the slot being (or about to be) recorded.
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// State of a slot.
    pub fn slot_state(&self, slot: usize) -> Option<SlotState> {
        self.slots.get(slot).map(|s| s.state)
    }

    /// The fence of a slot.
    pub fn slot_fence(&self, slot: usize) -> Option<FenceId> {
        self.slots.get(slot).map(|s| s.fence)
    }

    /// Returns `true` while a command buffer is recording.
    pub fn is_recording(&self) -> bool {
        self.slots
            .get(self.current)
            .is_some_and(|s| s.state == SlotState::Recording)
    }

    /// Number of submissions so far.
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Semaphores dropped by the soft cap since the last call.
    pub fn take_dropped_semaphores(&mut self) -> u32 {
        std::mem::take(&mut self.dropped_semaphores)
    }

    /// Returns the recording command buffer, starting one if needed.
    ///
    /// Blocks on the slot's fence when the GPU is still using it, then
    /// destroys the objects released during that slot's previous use.
    ///
    /// ## Errors
    /// Propagates fence wait, pool reset and begin failures.
    pub fn alloc<D: NativeDevice>(&mut self, device: &D) -> Result<CommandBufferId, NativeError> {
        let slot = &mut self.slots[self.current];
        if slot.state == SlotState::Recording {
            return Ok(slot.command_buffer);
        }
        if slot.state == SlotState::Submitted {
            log::trace!("Waiting for frame-in-flight slot {}.", self.current);
            device.wait_fence(slot.fence)?;
            slot.state = SlotState::Idle;
        }
        for object in slot.release.drain(..) {
            device.destroy(object);
        }
        device.reset_command_pool(slot.pool)?;
        device.begin_command_buffer(slot.command_buffer)?;
        slot.state = SlotState::Recording;
        Ok(slot.command_buffer)
    }

    /// Adds a semaphore the next submission waits on.
    pub fn add_wait_semaphore(&mut self, semaphore: SemaphoreId, stage: PipelineStage) {
        if self.wait_semaphores.len() >= self.max_semaphores {
            log::warn!("Wait semaphore {semaphore:?} dropped (limit {}).", self.max_semaphores);
            self.dropped_semaphores += 1;
            return;
        }
        self.wait_semaphores.push((semaphore, stage));
    }

    /// Adds a semaphore the next submission signals.
    pub fn add_signal_semaphore(&mut self, semaphore: SemaphoreId) {
        if self.signal_semaphores.len() >= self.max_semaphores {
            log::warn!("Signal semaphore {semaphore:?} dropped (limit {}).", self.max_semaphores);
            self.dropped_semaphores += 1;
            return;
        }
        self.signal_semaphores.push(semaphore);
    }

    /// Defers the destruction of `object` until the GPU is done with the
    /// current slot.
    pub fn release(&mut self, object: NativeObject) {
        if !object.is_null() {
            self.pending_release.push(object);
        }
    }

    /// Ends and submits the recording command buffer, then moves to the next
    /// slot. With `wait`, blocks until the submission completes.
    pub fn kick<D: NativeDevice>(&mut self, device: &D, wait: bool) -> Result<(), NativeError> {
        let index = self.current;
        let slot = &mut self.slots[index];
        if slot.state != SlotState::Recording {
            return Ok(());
        }
        device.end_command_buffer(slot.command_buffer)?;
        device.reset_fence(slot.fence)?;

        let info = SubmitInfo {
            command_buffer: slot.command_buffer,
            wait_semaphores: std::mem::take(&mut self.wait_semaphores),
            signal_semaphores: std::mem::take(&mut self.signal_semaphores),
            fence: slot.fence,
        };
        slot.release.append(&mut self.pending_release);
        slot.state = SlotState::Submitted;
        if let Err(err) = device.submit(&info) {
            self.slots[index].state = SlotState::Idle;
            return Err(err);
        }

        self.submitted += 1;
        self.current = (index + 1) % self.slots.len();
        log::trace!("Kicked slot {index} (submission {}).", self.submitted);

        if wait {
            device.wait_fence(info.fence)?;
            self.retire(device, index);
        }
        Ok(())
    }

    /// Destroys deferred objects of retired slots.
    ///
    /// With `all`, waits every submitted slot (and releases objects still
    /// pending when nothing is recording). Otherwise processes the oldest
    /// submitted slot if its fence already signaled.
    pub fn finish<D: NativeDevice>(&mut self, device: &D, all: bool) -> Result<(), NativeError> {
        if all {
            for index in 0..self.slots.len() {
                if self.slots[index].state == SlotState::Submitted {
                    device.wait_fence(self.slots[index].fence)?;
                }
                self.retire(device, index);
            }
            if !self.is_recording() {
                for object in self.pending_release.drain(..) {
                    device.destroy(object);
                }
            }
            return Ok(());
        }

        // After a kick the current slot is the oldest one.
        let count = self.slots.len();
        let oldest = (0..count)
            .map(|k| (self.current + k) % count)
            .find(|&i| self.slots[i].state == SlotState::Submitted);
        if let Some(index) = oldest {
            if device.is_fence_signaled(self.slots[index].fence) {
                self.retire(device, index);
            }
        }
        Ok(())
    }

    fn retire<D: NativeDevice>(&mut self, device: &D, index: usize) {
        let slot = &mut self.slots[index];
        if slot.state == SlotState::Recording {
            return;
        }
        slot.state = SlotState::Idle;
        for object in slot.release.drain(..) {
            device.destroy(object);
        }
    }

    /// Waits for every slot and destroys the queue's own objects.
    pub fn destroy<D: NativeDevice>(&mut self, device: &D) {
        if let Err(err) = self.finish(device, true) {
            log::error!("Command queue teardown could not wait for the GPU: {err}");
        }
        for slot in self.slots.drain(..) {
            device.destroy(NativeObject::CommandPool(slot.pool));
            device.destroy(NativeObject::Fence(slot.fence));
        }
        self.pending_release.clear();
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::headless::{GpuTimeline, HeadlessDevice, ObjectKind};
    use prism_core::renderer::api::native::{BufferDesc, BufferUsage, MemoryLocation};

    fn queue(device: &HeadlessDevice, slots: usize) -> CommandQueue {
        let mut guard = InitGuard::new(device);
        let queue = CommandQueue::new(&mut guard, slots, 2).unwrap();
        guard.commit();
        queue
    }

    #[test]
    fn alloc_is_idempotent_while_recording() {
        let device = HeadlessDevice::new();
        let mut queue = queue(&device, 2);
        let a = queue.alloc(&device).unwrap();
        let b = queue.alloc(&device).unwrap();
        assert_eq!(a, b);
        assert_eq!(queue.slot_state(0), Some(SlotState::Recording));

        queue.kick(&device, false).unwrap();
        assert_eq!(queue.current_slot(), 1);
        assert_eq!(device.submissions().len(), 1);
    }

    #[test]
    fn released_objects_outlive_their_slot_fence() {
        let device = HeadlessDevice::new();
        device.set_timeline(GpuTimeline::Manual);
        let mut queue = queue(&device, 2);
        let buffer = device
            .create_buffer(&BufferDesc {
                size: 64,
                usage: BufferUsage::VERTEX,
                location: MemoryLocation::DeviceLocal,
            })
            .unwrap();

        queue.alloc(&device).unwrap();
        queue.release(NativeObject::Buffer(buffer));
        queue.kick(&device, false).unwrap();
        queue.finish(&device, false).unwrap();
        assert!(device.destructions().is_empty(), "GPU has not finished the slot");

        device.complete_next();
        queue.finish(&device, false).unwrap();
        let destructions = device.destructions();
        assert_eq!(destructions.len(), 1);
        let fence_tick = queue.slot_fence(0).and_then(|f| device.fence_signal_tick(f));
        assert!(Some(destructions[0].tick) >= fence_tick);
        assert_eq!(queue.slot_state(0), Some(SlotState::Idle));
    }

    #[test]
    fn semaphores_are_soft_capped() {
        let device = HeadlessDevice::new();
        let mut queue = queue(&device, 1);
        for _ in 0..3 {
            let s = device.create_semaphore().unwrap();
            queue.add_signal_semaphore(s);
        }
        assert_eq!(queue.take_dropped_semaphores(), 1);
        assert_eq!(queue.take_dropped_semaphores(), 0);
    }

    #[test]
    fn destroy_frees_pools_and_fences() {
        let device = HeadlessDevice::new();
        let mut queue = queue(&device, 3);
        queue.alloc(&device).unwrap();
        queue.kick(&device, true).unwrap();
        queue.destroy(&device);
        assert_eq!(device.live(ObjectKind::CommandPool), 0);
        assert_eq!(device.live(ObjectKind::Fence), 0);
        assert_eq!(device.live(ObjectKind::CommandBuffer), 0);
    }
}
