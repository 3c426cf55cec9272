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

//! A renderer that accepts every frame and draws nothing.

use prism_core::renderer::api::command::Frame;
use prism_core::renderer::api::core::{Caps, FrameStats, Init, RendererType};
use prism_core::renderer::{RenderError, RendererContext};

/// Consumes frames without a device.
///
/// Resource commands are drained so handle lifetimes behave as with a real
/// backend. Useful on headless servers and as the fallback when no device can
/// be created.
#[derive(Debug)]
pub struct NoopRenderer {
    caps: Caps,
    stats: FrameStats,
    shut_down: bool,
}

impl NoopRenderer {
    /// Creates the renderer for `init`.
    pub fn new(init: &Init) -> Self {
        log::info!("Using the no-op renderer.");
        Self {
            caps: Caps {
                renderer_type: RendererType::Noop,
                max_draw_calls: init.limits.max_draw_calls,
                frames_in_flight: init.frames_in_flight() as u32,
                ..Caps::default()
            },
            stats: FrameStats::default(),
            shut_down: false,
        }
    }
}

impl RendererContext for NoopRenderer {
    fn renderer_type(&self) -> RendererType {
        RendererType::Noop
    }

    fn name(&self) -> &str {
        "Noop"
    }

    fn caps(&self) -> &Caps {
        &self.caps
    }

    fn submit(&mut self, frame: &mut Frame) -> Result<FrameStats, RenderError> {
        if self.shut_down {
            return Err(RenderError::NotInitialized);
        }
        let pre = frame.take_pre_commands().len();
        let post = frame.take_post_commands().len();
        log::trace!(
            "Noop frame {}: {} items, {} resource commands.",
            frame.frame_number(),
            frame.render_items().len(),
            pre + post
        );
        self.stats = FrameStats {
            frame_number: frame.frame_number(),
            skipped_items: frame.render_items().len() as u32,
            dropped_draw_calls: frame.num_dropped(),
            dropped_blits: frame.num_dropped_blits(),
            ..FrameStats::default()
        };
        Ok(self.stats.clone())
    }

    fn stats(&self) -> &FrameStats {
        &self.stats
    }

    fn is_device_lost(&self) -> bool {
        false
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::renderer::api::core::Limits;
    use prism_core::renderer::api::resource::ProgramHandle;

    #[test]
    fn noop_consumes_resource_commands() {
        let init = Init::default();
        let mut renderer = NoopRenderer::new(&init);
        let mut frame = Frame::new(&Limits::default());
        assert!(frame.submit(0, ProgramHandle(0), 0.0));

        let stats = renderer.submit(&mut frame).unwrap();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.skipped_items, 1);
        assert!(frame.take_pre_commands().is_empty());

        renderer.shutdown();
        assert!(matches!(renderer.submit(&mut frame), Err(RenderError::NotInitialized)));
    }
}
