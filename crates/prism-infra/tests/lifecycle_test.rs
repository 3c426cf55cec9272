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

mod common;

use anyhow::{Context, Result};
use common::{Harness, TRIANGLE_PROGRAM, TRIANGLE_VB};
use prism_core::renderer::api::command::ResourceCommand;
use prism_core::renderer::api::core::Init;
use prism_core::renderer::api::native::NativeObject;
use prism_core::renderer::{Callback, Fatal, LogCallback, NativeError, RenderError, RendererContext};
use prism_infra::graphics::explicit::InitStage;
use prism_infra::graphics::headless::{DeviceOp, ObjectKind};
use prism_infra::{BackendInitError, ExplicitRenderer, HeadlessDevice};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Records fatal reports and persists pipeline cache blobs in memory.
#[derive(Debug, Default)]
struct RecordingCallback {
    fatals: Mutex<Vec<Fatal>>,
    blobs: Mutex<HashMap<u64, Vec<u8>>>,
}

impl RecordingCallback {
    fn fatals(&self) -> Vec<Fatal> {
        self.fatals.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl Callback for RecordingCallback {
    fn fatal(&self, code: Fatal, _message: &str) {
        if let Ok(mut fatals) = self.fatals.lock() {
            fatals.push(code);
        }
    }

    fn cache_read(&self, hash: u64) -> Option<Vec<u8>> {
        self.blobs.lock().ok()?.get(&hash).cloned()
    }

    fn cache_write(&self, hash: u64, data: &[u8]) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(hash, data.to_vec());
        }
    }
}

const OWNED_KINDS: [ObjectKind; 12] = [
    ObjectKind::Buffer,
    ObjectKind::Image,
    ObjectKind::ImageView,
    ObjectKind::Sampler,
    ObjectKind::ShaderModule,
    ObjectKind::Pipeline,
    ObjectKind::PipelineLayout,
    ObjectKind::DescriptorSetLayout,
    ObjectKind::RenderPass,
    ObjectKind::Framebuffer,
    ObjectKind::Fence,
    ObjectKind::Swapchain,
];

#[test]
fn test_failed_init_releases_every_created_object() {
    // --- 1. ARRANGE ---
    let device = HeadlessDevice::new();
    device.fail_next(DeviceOp::CreateSampler, NativeError::OutOfDeviceMemory);

    // --- 2. ACT ---
    let result = ExplicitRenderer::new(device.clone(), &Init::default(), Arc::new(LogCallback));

    // --- 3. ASSERT ---
    match result {
        Err(BackendInitError::Stage { stage, source }) => {
            assert_eq!(stage, InitStage::Defaults);
            assert_eq!(source, NativeError::OutOfDeviceMemory);
        }
        other => panic!("unexpected init result: {other:?}"),
    }
    for kind in OWNED_KINDS {
        assert_eq!(device.live(kind), 0, "{kind:?} leaked");
    }
    assert!(device.created(ObjectKind::Buffer) > 0, "earlier stages did run");
}

#[test]
fn test_invalid_limits_are_rejected_before_touching_the_device() {
    let device = HeadlessDevice::new();
    let mut init = Init::default();
    init.limits.max_draw_calls = 0;

    let result = ExplicitRenderer::new(device.clone(), &init, Arc::new(LogCallback));

    assert!(matches!(result, Err(BackendInitError::InvalidConfig(_))));
    assert_eq!(device.created(ObjectKind::Fence), 0);
}

#[test]
fn test_shutdown_destroys_everything() -> Result<()> {
    let mut harness = Harness::new()?;
    harness.create_programs();
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.submit()?;
    harness.submit()?;

    harness.renderer.shutdown();
    harness.renderer.shutdown();

    for kind in OWNED_KINDS {
        assert_eq!(harness.device.live(kind), 0, "{kind:?} leaked");
    }
    assert!(matches!(harness.submit(), Err(e) if matches!(e.downcast_ref::<RenderError>(), Some(RenderError::NotInitialized))));
    Ok(())
}

#[test]
fn test_lost_device_is_reported_once_and_sticks() -> Result<()> {
    let callback = Arc::new(RecordingCallback::default());
    let mut harness = Harness::with(HeadlessDevice::new(), Init::default(), callback.clone())?;
    harness.create_programs();
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.submit()?;

    harness.device.lose_device();
    let first = harness.renderer.submit(&mut harness.frame);
    let second = harness.renderer.submit(&mut harness.frame);

    assert!(matches!(first, Err(RenderError::DeviceLost)));
    assert!(matches!(second, Err(RenderError::DeviceLost)));
    assert!(harness.renderer.is_device_lost());
    assert_eq!(callback.fatals(), vec![Fatal::DeviceLost]);
    Ok(())
}

#[test]
fn test_pipeline_creation_failure_is_fatal_for_the_frame_only() -> Result<()> {
    let callback = Arc::new(RecordingCallback::default());
    let mut harness = Harness::with(HeadlessDevice::new(), Init::default(), callback.clone())?;
    harness.create_programs();
    harness
        .device
        .fail_next(DeviceOp::CreateGraphicsPipeline, NativeError::OutOfDeviceMemory);
    harness.draw_triangle(0, TRIANGLE_PROGRAM);

    let failed = harness.submit();
    assert!(failed.is_err());
    assert_eq!(callback.fatals(), vec![Fatal::UnableToCreateResource]);

    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    let stats = harness.submit()?;
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.pipelines_created, 1);
    Ok(())
}

#[test]
fn test_destroys_queued_on_a_failed_frame_still_run() -> Result<()> {
    let callback = Arc::new(RecordingCallback::default());
    let mut harness = Harness::with(HeadlessDevice::new(), Init::default(), callback.clone())?;
    let in_flight = harness.renderer.caps().frames_in_flight as usize;
    harness.create_programs();
    harness.submit()?;
    let buffer = harness
        .renderer
        .resources()
        .buffer(TRIANGLE_VB.into())
        .context("vertex buffer missing")?
        .buffer;

    harness
        .device
        .fail_next(DeviceOp::CreateGraphicsPipeline, NativeError::OutOfDeviceMemory);
    harness.draw_triangle(0, TRIANGLE_PROGRAM);
    harness.frame.push_command(ResourceCommand::DestroyVertexBuffer(TRIANGLE_VB));
    assert!(harness.submit().is_err());
    assert_eq!(callback.fatals(), vec![Fatal::UnableToCreateResource]);
    assert!(
        harness.renderer.resources().buffer(TRIANGLE_VB.into()).is_none(),
        "the handle is free on the host but still owned by the backend"
    );

    for _ in 0..=in_flight {
        harness.submit()?;
    }
    assert!(harness
        .device
        .destructions()
        .iter()
        .any(|d| d.object == NativeObject::Buffer(buffer)));
    Ok(())
}

#[test]
fn test_persisted_pipeline_blobs_seed_a_new_device() -> Result<()> {
    let callback = Arc::new(RecordingCallback::default());
    {
        let mut first = Harness::with(HeadlessDevice::new(), Init::default(), callback.clone())?;
        first.create_programs();
        first.draw_triangle(0, TRIANGLE_PROGRAM);
        first.submit()?;
        assert_eq!(first.device.pipelines_from_cache(), 0);
    }
    assert!(!callback.blobs.lock().map(|b| b.is_empty()).unwrap_or(true));

    let mut second = Harness::with(HeadlessDevice::new(), Init::default(), callback.clone())?;
    second.create_programs();
    second.draw_triangle(0, TRIANGLE_PROGRAM);
    second.submit()?;

    assert_eq!(second.device.pipelines_from_cache(), 1);
    Ok(())
}
