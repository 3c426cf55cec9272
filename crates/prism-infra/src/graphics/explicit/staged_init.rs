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

//! Staged construction of the backend.
//!
//! Initialization is a ladder of stages. Every native object created along the
//! way is registered with an [`InitGuard`]; if a later stage fails the guard is
//! dropped uncommitted and destroys everything in reverse creation order.

use prism_core::renderer::api::native::NativeObject;
use prism_core::renderer::NativeDevice;

/// The stages of backend initialization, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InitStage {
    /// Device limits and capabilities were queried.
    Device,
    /// Command pools, command buffers and fences of every frame in flight.
    CommandQueue,
    /// Uniform and staging scratch buffers.
    ScratchBuffers,
    /// The descriptor pool.
    DescriptorPool,
    /// The swap chain and its back buffer resources.
    SwapChain,
    /// Default objects (placeholder texture and sampler).
    Defaults,
}

/// Destroys every registered object in reverse order unless committed.
#[derive(Debug)]
pub struct InitGuard<'d, D: NativeDevice> {
    device: &'d D,
    stage: InitStage,
    created: Vec<(InitStage, NativeObject)>,
    committed: bool,
}

impl<'d, D: NativeDevice> InitGuard<'d, D> {
    /// Starts a new ladder at [`InitStage::Device`].
    pub fn new(device: &'d D) -> Self {
        Self {
            device,
            stage: InitStage::Device,
            created: Vec::new(),
            committed: false,
        }
    }

    /// The device the guard destroys objects on.
    pub fn device(&self) -> &'d D {
        self.device
    }

    /// Marks the start of a new stage.
    pub fn enter(&mut self, stage: InitStage) {
        log::debug!("Explicit backend init: entering stage {stage:?}.");
        self.stage = stage;
    }

    /// The stage currently being built.
    pub fn stage(&self) -> InitStage {
        self.stage
    }

    /// Registers an object created by the current stage.
    pub fn track(&mut self, object: NativeObject) {
        if !object.is_null() {
            self.created.push((self.stage, object));
        }
    }

    /// Number of objects registered so far.
    pub fn len(&self) -> usize {
        self.created.len()
    }

    /// Returns `true` if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Accepts everything created; ownership moves to the caller's structures.
    pub fn commit(mut self) {
        log::info!(
            "Explicit backend init complete ({} native objects).",
            self.created.len()
        );
        self.committed = true;
    }
}

impl<D: NativeDevice> Drop for InitGuard<'_, D> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        log::warn!(
            "Explicit backend init failed at stage {:?}; destroying {} objects.",
            self.stage,
            self.created.len()
        );
        while let Some((stage, object)) = self.created.pop() {
            log::trace!("Unwinding {object:?} from stage {stage:?}.");
            self.device.destroy(object);
        }
    }
}
