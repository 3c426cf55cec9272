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

use std::fmt::Debug;

/// The class of an unrecoverable renderer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fatal {
    /// A debug check failed.
    DebugCheck,
    /// A shader failed to compile or link.
    InvalidShader,
    /// The backend could not be initialized.
    UnableToInitialize,
    /// A native object could not be created.
    UnableToCreateResource,
    /// The device was lost.
    DeviceLost,
}

/// Hooks the host provides to the renderer.
///
/// Called from the render thread.
pub trait Callback: Send + Sync + Debug {
    /// Reports an unrecoverable failure. The frame being rendered is abandoned.
    /// ## Arguments
    /// * `code` - The failure class.
    /// * `message` - A human-readable description.
    fn fatal(&self, code: Fatal, message: &str);

    /// Looks up a persisted pipeline cache blob.
    /// ## Arguments
    /// * `hash` - The pipeline key.
    /// ## Returns
    /// The blob written earlier by [`cache_write`](Self::cache_write), if any.
    fn cache_read(&self, hash: u64) -> Option<Vec<u8>> {
        let _ = hash;
        None
    }

    /// Persists a pipeline cache blob.
    fn cache_write(&self, hash: u64, data: &[u8]) {
        let _ = (hash, data);
    }
}

/// A [`Callback`] that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCallback;

impl Callback for LogCallback {
    fn fatal(&self, code: Fatal, message: &str) {
        log::error!("Fatal renderer error ({code:?}): {message}");
    }
}
