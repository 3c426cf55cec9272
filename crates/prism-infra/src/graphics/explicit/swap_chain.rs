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

//! Back buffer presentation.
//!
//! The swap chain cycles `Created -> acquire -> Rendering -> present ->
//! Created`. Size, vsync, format or sample count changes rebuild it at the
//! start of the next frame, as does an out-of-date or lost surface. A zero
//! sized resolution leaves the back buffer non-renderable until it grows again.
//! Devices without a surface render into a single offscreen image.

use super::command_queue::CommandQueue;
use super::render_pass::{fetch_render_pass, RenderTarget, TargetAttachment};
use super::resources::barrier;
use super::staged_init::InitGuard;
use super::state_cache::StateCache;
use prism_core::renderer::api::core::{ResetFlags, Resolution};
use prism_core::renderer::api::native::{
    CommandBufferId, FramebufferDesc, FramebufferId, GpuCommand, ImageAspect, ImageBarrier,
    ImageDesc, ImageId, ImageLayout, ImageUsage, ImageViewDesc, ImageViewId, NativeObject,
    PipelineStage, RenderPassId, SemaphoreId, SurfaceCapabilities, SwapchainDesc, SwapchainId,
};
use prism_core::renderer::api::resource::{TextureFormat, TextureViewType};
use prism_core::renderer::{NativeDevice, NativeError};

/// Format of the back buffer depth/stencil attachment.
pub const BACK_BUFFER_DEPTH_FORMAT: TextureFormat = TextureFormat::D24S8;

/// Presentation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapChainState {
    /// No image is held.
    #[default]
    Created,
    /// An image was acquired and is being rendered to.
    Rendering,
}

#[derive(Debug)]
struct Chain {
    swapchain: Option<SwapchainId>,
    images: Vec<ImageId>,
    layouts: Vec<ImageLayout>,
    views: Vec<ImageViewId>,
    framebuffers: Vec<FramebufferId>,
    render_done: Vec<SemaphoreId>,
    depth: (ImageId, ImageViewId),
    msaa: Option<(ImageId, ImageViewId)>,
    width: u32,
    height: u32,
    attachments_ready: bool,
}

impl Chain {
    fn objects(&self) -> Vec<NativeObject> {
        let mut objects: Vec<NativeObject> = self
            .framebuffers
            .iter()
            .map(|&f| NativeObject::Framebuffer(f))
            .chain(self.views.iter().map(|&v| NativeObject::ImageView(v)))
            .chain(self.render_done.iter().map(|&s| NativeObject::Semaphore(s)))
            .collect();
        objects.push(NativeObject::ImageView(self.depth.1));
        objects.push(NativeObject::Image(self.depth.0));
        if let Some((image, view)) = self.msaa {
            objects.push(NativeObject::ImageView(view));
            objects.push(NativeObject::Image(image));
        }
        match self.swapchain {
            // Swap chain images go with the swap chain.
            Some(swapchain) => objects.push(NativeObject::Swapchain(swapchain)),
            None => objects.extend(self.images.iter().map(|&i| NativeObject::Image(i))),
        }
        objects
    }
}

/// The back buffer and its presentation resources.
#[derive(Debug)]
pub struct SwapChain {
    chain: Option<Chain>,
    acquire: Vec<SemaphoreId>,
    target: RenderTarget,
    render_pass: RenderPassId,
    resolution: Resolution,
    state: SwapChainState,
    current: u32,
    needs_refresh: bool,
    offscreen: bool,
}

fn back_buffer_target(format: TextureFormat, samples: u8) -> RenderTarget {
    let color = |samples| TargetAttachment {
        format,
        samples,
        layout: ImageLayout::ColorAttachment,
    };
    RenderTarget {
        colors: vec![color(samples)],
        depth: Some(TargetAttachment {
            format: BACK_BUFFER_DEPTH_FORMAT,
            samples,
            layout: ImageLayout::DepthStencilAttachment,
        }),
        resolves: if samples > 1 { vec![color(1)] } else { Vec::new() },
    }
}

fn config_changed(old: &Resolution, new: &Resolution) -> bool {
    old.width != new.width
        || old.height != new.height
        || old.format != new.format
        || old.reset.contains(ResetFlags::VSYNC) != new.reset.contains(ResetFlags::VSYNC)
        || old.reset.msaa_samples() != new.reset.msaa_samples()
}

impl SwapChain {
    /// Creates the presentation resources and registers them with the guard.
    ///
    /// ## Arguments
    /// * `guard` - Init guard of the backend.
    /// * `resolution` - Back buffer configuration.
    /// * `frames_in_flight` - One acquire semaphore is created per slot.
    /// * `render_passes` - Cache the back buffer render pass is looked up in.
    ///
    /// ## Errors
    /// Propagates native creation failures. A device without a surface is not
    /// an error; the back buffer is then an offscreen image.
    pub fn new<D: NativeDevice>(
        guard: &mut InitGuard<'_, D>,
        resolution: &Resolution,
        frames_in_flight: usize,
        render_passes: &mut StateCache<RenderPassId>,
    ) -> Result<Self, NativeError> {
        let device = guard.device();
        let mut acquire = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight.max(1) {
            let semaphore = device.create_semaphore()?;
            guard.track(NativeObject::Semaphore(semaphore));
            acquire.push(semaphore);
        }
        let mut swap_chain = Self {
            chain: None,
            acquire,
            target: RenderTarget::default(),
            render_pass: RenderPassId::NULL,
            resolution: resolution.clone(),
            state: SwapChainState::Created,
            current: 0,
            needs_refresh: false,
            offscreen: false,
        };
        swap_chain.rebuild(device, render_passes, None)?;
        if let Some(chain) = &swap_chain.chain {
            for object in chain.objects() {
                guard.track(object);
            }
        }
        Ok(swap_chain)
    }

    /// Returns `true` if the back buffer can be rendered to.
    pub fn is_renderable(&self) -> bool {
        self.chain.is_some()
    }

    /// Returns `true` when rendering into an offscreen image.
    pub fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    /// Returns `true` if the next frame rebuilds the swap chain.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Presentation state.
    pub fn state(&self) -> SwapChainState {
        self.state
    }

    /// Size of the back buffer, zero when not renderable.
    pub fn extent(&self) -> (u32, u32) {
        self.chain.as_ref().map_or((0, 0), |c| (c.width, c.height))
    }

    /// Attachment signature of the back buffer.
    pub fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Compatible render pass of the back buffer.
    pub fn render_pass(&self) -> RenderPassId {
        self.render_pass
    }

    /// Framebuffer of the acquired image.
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        if self.state != SwapChainState::Rendering {
            return None;
        }
        let chain = self.chain.as_ref()?;
        chain.framebuffers.get(self.current as usize).copied()
    }

    /// Index of the acquired image.
    pub fn current_image(&self) -> Option<u32> {
        (self.state == SwapChainState::Rendering).then_some(self.current)
    }

    /// Rebuilds the swap chain if the configuration changed or the surface
    /// asked for it.
    ///
    /// ## Returns
    /// `true` if the swap chain was rebuilt.
    pub fn update<D: NativeDevice>(
        &mut self,
        device: &D,
        queue: &mut CommandQueue,
        render_passes: &mut StateCache<RenderPassId>,
        resolution: &Resolution,
    ) -> Result<bool, NativeError> {
        let changed = config_changed(&self.resolution, resolution);
        if !changed && !self.needs_refresh && (self.chain.is_some() || resolution.is_zero_sized()) {
            return Ok(false);
        }
        self.resolution = resolution.clone();
        if resolution.is_zero_sized() {
            if self.chain.is_some() {
                log::info!("Back buffer resized to zero; rendering suspended.");
            }
            self.release_chain(queue);
            return Ok(false);
        }
        let old = self.release_chain(queue);
        log::info!(
            "Recreating swap chain ({}x{}, {:?}, {} samples).",
            resolution.width,
            resolution.height,
            resolution.format,
            resolution.reset.msaa_samples()
        );
        match self.rebuild(device, render_passes, old) {
            Ok(()) => {
                self.needs_refresh = false;
                Ok(true)
            }
            Err(err) if err.needs_swap_chain_refresh() => {
                log::warn!("Swap chain recreation failed ({err}); retrying next frame.");
                self.needs_refresh = true;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Hands the current chain's objects to the release queue.
    ///
    /// ## Returns
    /// The retired swap chain, for the next creation to replace.
    fn release_chain(&mut self, queue: &mut CommandQueue) -> Option<SwapchainId> {
        let chain = self.chain.take()?;
        self.state = SwapChainState::Created;
        for object in chain.objects() {
            queue.release(object);
        }
        chain.swapchain
    }

    fn rebuild<D: NativeDevice>(
        &mut self,
        device: &D,
        render_passes: &mut StateCache<RenderPassId>,
        old: Option<SwapchainId>,
    ) -> Result<(), NativeError> {
        let resolution = &self.resolution;
        let samples = resolution.reset.msaa_samples();
        let caps = match device.surface_capabilities() {
            Ok(caps) => Some(caps),
            Err(NativeError::Unsupported(reason)) => {
                if !self.offscreen {
                    log::info!("No presentation surface ({reason}); rendering offscreen.");
                }
                None
            }
            Err(err) => return Err(err),
        };
        self.offscreen = caps.is_none();
        let (width, height) = match caps {
            Some(caps) if caps.current_extent != (u32::MAX, u32::MAX) => caps.current_extent,
            _ => (resolution.width, resolution.height),
        };
        if width == 0 || height == 0 || resolution.is_zero_sized() {
            log::debug!("Back buffer extent is zero; nothing to build.");
            return Ok(());
        }

        let target = back_buffer_target(resolution.format, samples);
        let (render_pass, _) = fetch_render_pass(device, render_passes, &target.compatible_desc())?;

        let mut created: Vec<NativeObject> = Vec::new();
        let built = self.build_chain(device, caps, old, render_pass, (width, height), &mut created);
        match built {
            Ok(chain) => {
                self.target = target;
                self.render_pass = render_pass;
                self.chain = Some(chain);
                self.state = SwapChainState::Created;
                Ok(())
            }
            Err(err) => {
                while let Some(object) = created.pop() {
                    device.destroy(object);
                }
                Err(err)
            }
        }
    }

    fn build_chain<D: NativeDevice>(
        &self,
        device: &D,
        caps: Option<SurfaceCapabilities>,
        old: Option<SwapchainId>,
        render_pass: RenderPassId,
        (width, height): (u32, u32),
        created: &mut Vec<NativeObject>,
    ) -> Result<Chain, NativeError> {
        let resolution = &self.resolution;
        let format = resolution.format;
        let samples = resolution.reset.msaa_samples();

        let (swapchain, images) = match caps {
            Some(caps) => {
                let image_count = (resolution.num_back_buffers as u32)
                    .clamp(caps.min_image_count, caps.max_image_count.max(caps.min_image_count));
                let swapchain = device.create_swapchain(&SwapchainDesc {
                    width,
                    height,
                    format,
                    image_count,
                    vsync: resolution.reset.contains(ResetFlags::VSYNC),
                    old,
                })?;
                created.push(NativeObject::Swapchain(swapchain));
                (Some(swapchain), device.swapchain_images(swapchain)?)
            }
            None => {
                let image = device.create_image(&ImageDesc {
                    format,
                    width,
                    height,
                    depth: 1,
                    mip_levels: 1,
                    array_layers: 1,
                    samples: 1,
                    usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_SRC | ImageUsage::SAMPLED,
                    cube: false,
                })?;
                created.push(NativeObject::Image(image));
                (None, vec![image])
            }
        };

        let view_of = |image: ImageId, format: TextureFormat| ImageViewDesc {
            image,
            view_type: TextureViewType::D2,
            format,
            aspect: ImageAspect::of(format),
            base_mip: 0,
            mip_count: 1,
            base_layer: 0,
            layer_count: 1,
        };
        let mut attachment = |usage: ImageUsage, format: TextureFormat| -> Result<(ImageId, ImageViewId), NativeError> {
            let image = device.create_image(&ImageDesc {
                format,
                width,
                height,
                depth: 1,
                mip_levels: 1,
                array_layers: 1,
                samples,
                usage,
                cube: false,
            })?;
            created.push(NativeObject::Image(image));
            let view = device.create_image_view(&view_of(image, format))?;
            created.push(NativeObject::ImageView(view));
            Ok((image, view))
        };
        let depth = attachment(ImageUsage::DEPTH_STENCIL_ATTACHMENT, BACK_BUFFER_DEPTH_FORMAT)?;
        let msaa = if samples > 1 {
            Some(attachment(ImageUsage::COLOR_ATTACHMENT, format)?)
        } else {
            None
        };

        let mut views = Vec::with_capacity(images.len());
        let mut framebuffers = Vec::with_capacity(images.len());
        let mut render_done = Vec::with_capacity(images.len());
        for &image in &images {
            let view = device.create_image_view(&view_of(image, format))?;
            created.push(NativeObject::ImageView(view));
            let attachments = match msaa {
                Some((_, msaa_view)) => vec![msaa_view, depth.1, view],
                None => vec![view, depth.1],
            };
            let framebuffer = device.create_framebuffer(&FramebufferDesc {
                render_pass,
                attachments,
                width,
                height,
                layers: 1,
            })?;
            created.push(NativeObject::Framebuffer(framebuffer));
            views.push(view);
            framebuffers.push(framebuffer);
            if swapchain.is_some() {
                let semaphore = device.create_semaphore()?;
                created.push(NativeObject::Semaphore(semaphore));
                render_done.push(semaphore);
            }
        }
        log::debug!(
            "Back buffer built: {} image(s) of {width}x{height}{}.",
            images.len(),
            if swapchain.is_none() { ", offscreen" } else { "" }
        );
        Ok(Chain {
            swapchain,
            layouts: vec![ImageLayout::Undefined; images.len()],
            images,
            views,
            framebuffers,
            render_done,
            depth,
            msaa,
            width,
            height,
            attachments_ready: false,
        })
    }

    /// Acquires the next image and moves it into the attachment layout.
    ///
    /// ## Returns
    /// `true` if an image is ready. `false` when the back buffer is not
    /// renderable or the surface needs a refresh.
    ///
    /// ## Errors
    /// Native failures other than the surface refresh ones.
    pub fn acquire<D: NativeDevice>(
        &mut self,
        device: &D,
        queue: &mut CommandQueue,
        cb: CommandBufferId,
    ) -> Result<bool, NativeError> {
        if self.state == SwapChainState::Rendering {
            return Ok(true);
        }
        if self.needs_refresh {
            return Ok(false);
        }
        let slot = queue.current_slot();
        let Some(chain) = self.chain.as_mut() else {
            return Ok(false);
        };
        let index = match chain.swapchain {
            Some(swapchain) => {
                let semaphore = self.acquire[slot % self.acquire.len().max(1)];
                match device.acquire_next_image(swapchain, semaphore) {
                    Ok(index) => {
                        queue.add_wait_semaphore(semaphore, PipelineStage::COLOR_ATTACHMENT_OUTPUT);
                        index
                    }
                    Err(err) if err.needs_swap_chain_refresh() => {
                        log::debug!("Acquire failed ({err}); swap chain will be recreated.");
                        self.needs_refresh = true;
                        return Ok(false);
                    }
                    Err(err) => return Err(err),
                }
            }
            None => 0,
        };

        let mut barriers: Vec<ImageBarrier> = Vec::new();
        let color = |image, old, new| barrier(image, ImageAspect::Color, (0, 1), (0, 1), old, new);
        let layout = &mut chain.layouts[index as usize];
        if *layout != ImageLayout::ColorAttachment {
            barriers.push(color(chain.images[index as usize], *layout, ImageLayout::ColorAttachment));
            *layout = ImageLayout::ColorAttachment;
        }
        if !chain.attachments_ready {
            barriers.push(barrier(
                chain.depth.0,
                ImageAspect::of(BACK_BUFFER_DEPTH_FORMAT),
                (0, 1),
                (0, 1),
                ImageLayout::Undefined,
                ImageLayout::DepthStencilAttachment,
            ));
            if let Some((msaa, _)) = chain.msaa {
                barriers.push(color(msaa, ImageLayout::Undefined, ImageLayout::ColorAttachment));
            }
            chain.attachments_ready = true;
        }
        if !barriers.is_empty() {
            device.record(
                cb,
                GpuCommand::PipelineBarrier {
                    src_stage: PipelineStage::TOP,
                    dst_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
                    image_barriers: barriers,
                },
            );
        }
        self.current = index;
        self.state = SwapChainState::Rendering;
        log::trace!("Acquired back buffer image {index}.");
        Ok(true)
    }

    /// Records the transition to the present layout and registers the
    /// render-done semaphore with the submission.
    pub fn prepare_present<D: NativeDevice>(&mut self, device: &D, queue: &mut CommandQueue, cb: CommandBufferId) {
        if self.state != SwapChainState::Rendering {
            return;
        }
        let Some(chain) = self.chain.as_mut() else {
            return;
        };
        if chain.swapchain.is_none() {
            return;
        }
        let index = self.current as usize;
        device.record(
            cb,
            GpuCommand::PipelineBarrier {
                src_stage: PipelineStage::COLOR_ATTACHMENT_OUTPUT,
                dst_stage: PipelineStage::ALL_COMMANDS,
                image_barriers: vec![barrier(
                    chain.images[index],
                    ImageAspect::Color,
                    (0, 1),
                    (0, 1),
                    chain.layouts[index],
                    ImageLayout::Present,
                )],
            },
        );
        chain.layouts[index] = ImageLayout::Present;
        queue.add_signal_semaphore(chain.render_done[index]);
    }

    /// Presents the acquired image. Call after the frame was submitted.
    ///
    /// ## Returns
    /// `true` if an image was queued for presentation.
    pub fn present<D: NativeDevice>(&mut self, device: &D) -> Result<bool, NativeError> {
        if self.state != SwapChainState::Rendering {
            return Ok(false);
        }
        self.state = SwapChainState::Created;
        let Some(chain) = self.chain.as_ref() else {
            return Ok(false);
        };
        let Some(swapchain) = chain.swapchain else {
            return Ok(false);
        };
        let index = self.current;
        match device.present(swapchain, index, &[chain.render_done[index as usize]]) {
            Ok(()) => Ok(true),
            Err(err) if err.needs_swap_chain_refresh() => {
                log::debug!("Present failed ({err}); swap chain will be recreated.");
                self.needs_refresh = true;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Destroys every presentation object immediately.
    pub fn destroy<D: NativeDevice>(&mut self, device: &D) {
        if let Some(chain) = self.chain.take() {
            for object in chain.objects() {
                device.destroy(object);
            }
        }
        for semaphore in self.acquire.drain(..) {
            device.destroy(NativeObject::Semaphore(semaphore));
        }
        self.state = SwapChainState::Created;
    }
}

#[cfg(all(test, feature = "headless"))]
mod tests {
    use super::*;
    use crate::graphics::headless::{HeadlessDevice, ObjectKind};

    struct Fixture {
        device: HeadlessDevice,
        queue: CommandQueue,
        render_passes: StateCache<RenderPassId>,
        swap_chain: SwapChain,
    }

    fn fixture(device: HeadlessDevice, resolution: &Resolution) -> Fixture {
        let mut render_passes = StateCache::new();
        let mut guard = InitGuard::new(&device);
        let queue = CommandQueue::new(&mut guard, 2, 4).unwrap();
        let swap_chain = SwapChain::new(&mut guard, resolution, 2, &mut render_passes).unwrap();
        guard.commit();
        Fixture {
            device,
            queue,
            render_passes,
            swap_chain,
        }
    }

    impl Fixture {
        fn frame(&mut self) -> bool {
            let cb = self.queue.alloc(&self.device).unwrap();
            let acquired = self.swap_chain.acquire(&self.device, &mut self.queue, cb).unwrap();
            self.swap_chain.prepare_present(&self.device, &mut self.queue, cb);
            self.queue.kick(&self.device, false).unwrap();
            self.swap_chain.present(&self.device).unwrap();
            acquired
        }
    }

    #[test]
    fn frames_cycle_through_acquire_and_present() {
        let mut f = fixture(HeadlessDevice::new(), &Resolution::default());
        assert!(f.swap_chain.is_renderable());
        assert_eq!(f.swap_chain.extent(), HeadlessDevice::DEFAULT_EXTENT);

        assert!(f.frame());
        assert!(f.frame());
        assert_eq!(f.device.presents(), 2);
        assert_eq!(f.swap_chain.state(), SwapChainState::Created);

        let first = f.device.submissions()[0].clone();
        assert_eq!(first.wait_semaphores.len(), 1);
        assert_eq!(first.signal_semaphores.len(), 1);
    }

    #[test]
    fn surface_resize_refreshes_on_next_update() {
        let mut f = fixture(HeadlessDevice::new(), &Resolution::default());
        f.device.set_surface_extent(Some((800, 600)));
        assert!(!f.frame());
        assert!(f.swap_chain.needs_refresh());

        let resolution = Resolution::default();
        let rebuilt = f
            .swap_chain
            .update(&f.device, &mut f.queue, &mut f.render_passes, &resolution)
            .unwrap();
        assert!(rebuilt);
        assert_eq!(f.swap_chain.extent(), (800, 600));
        assert!(f.frame());
    }

    #[test]
    fn zero_resolution_suspends_rendering() {
        let mut f = fixture(HeadlessDevice::new(), &Resolution::default());
        let created = f.device.created(ObjectKind::Swapchain);
        let zero = Resolution {
            width: 0,
            height: 0,
            ..Resolution::default()
        };
        let rebuilt = f
            .swap_chain
            .update(&f.device, &mut f.queue, &mut f.render_passes, &zero)
            .unwrap();
        assert!(!rebuilt);
        assert!(!f.swap_chain.is_renderable());
        assert!(!f.frame());
        assert_eq!(f.device.created(ObjectKind::Swapchain), created);
    }

    #[test]
    fn msaa_back_buffer_resolves_into_the_swap_image() {
        let resolution = Resolution {
            reset: ResetFlags::MSAA_X4,
            ..Resolution::default()
        };
        let f = fixture(HeadlessDevice::new(), &resolution);
        let target = f.swap_chain.target();
        assert_eq!(target.samples(), 4);
        assert_eq!(target.resolves.len(), 1);
        assert_eq!(target.resolves[0].samples, 1);
    }

    #[test]
    fn offscreen_device_renders_into_one_image() {
        let mut f = fixture(HeadlessDevice::offscreen(), &Resolution::default());
        assert!(f.swap_chain.is_offscreen());
        assert!(f.frame());
        assert_eq!(f.device.presents(), 0);

        f.queue.finish(&f.device, true).unwrap();
        f.swap_chain.destroy(&f.device);
        assert_eq!(f.device.live(ObjectKind::Image), 0);
        assert_eq!(f.device.live(ObjectKind::Framebuffer), 0);
        assert_eq!(f.device.live(ObjectKind::Semaphore), 0);
    }
}
