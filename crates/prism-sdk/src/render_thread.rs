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


//! The render thread and the frame handoff.
//!
//! The API thread and the render thread each own one [`Frame`]. At the end of a
//! frame the API thread sends its frame over a bounded channel and receives the
//! previous one back once the backend consumed it. Nothing else crosses threads.

use crossbeam_channel::{Receiver, Sender};
use prism_core::renderer::api::command::Frame;
use prism_core::renderer::api::core::FrameStats;
use prism_core::renderer::{RenderError, RendererContext};
use std::io;
use std::thread;

/// A frame handed back by the render thread.
#[derive(Debug)]
pub(crate) struct Consumed {
    pub frame: Frame,
    pub result: Result<FrameStats, RenderError>,
}

/// Owns the thread that runs the backend.
#[derive(Debug)]
pub(crate) struct RenderThread {
    submit_tx: Option<Sender<Frame>>,
    done_rx: Receiver<Consumed>,
    in_flight: bool,
    handle: Option<thread::JoinHandle<()>>,
}

impl RenderThread {
    /// Moves `context` to a new thread.
    pub fn spawn(mut context: Box<dyn RendererContext>) -> io::Result<Self> {
        let (submit_tx, submit_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<Consumed>(1);

        let handle = thread::Builder::new()
            .name("prism-render".into())
            .spawn(move || {
                log::info!("Render thread started ({}).", context.name());
                while let Ok(mut frame) = submit_rx.recv() {
                    let result = context.submit(&mut frame);
                    if done_tx.send(Consumed { frame, result }).is_err() {
                        break;
                    }
                }
                context.shutdown();
                log::info!("Render thread stopped.");
            })?;

        Ok(Self {
            submit_tx: Some(submit_tx),
            done_rx,
            in_flight: false,
            handle: Some(handle),
        })
    }

    /// Blocks until the frame in flight comes back.
    ///
    /// ## Returns
    /// `None` if no frame was in flight or the thread is gone.
    pub fn wait(&mut self) -> Option<Consumed> {
        if !self.in_flight {
            return None;
        }
        self.in_flight = false;
        match self.done_rx.recv() {
            Ok(consumed) => Some(consumed),
            Err(_) => {
                log::error!("Render thread exited with a frame in flight.");
                None
            }
        }
    }

    /// Hands a finished frame to the render thread. The previous frame must
    /// have been collected with [`wait`](Self::wait).
    ///
    /// ## Errors
    /// * `RenderError::NotInitialized` - The thread was stopped or has exited.
    pub fn kick(&mut self, frame: Frame) -> Result<(), RenderError> {
        let tx = self.submit_tx.as_ref().ok_or(RenderError::NotInitialized)?;
        tx.send(frame).map_err(|_| {
            log::error!("Render thread is gone; frame dropped.");
            RenderError::NotInitialized
        })?;
        self.in_flight = true;
        Ok(())
    }

    /// Collects the frame in flight, closes the channel and joins the thread.
    /// The backend is shut down on its own thread before the join returns.
    pub fn stop(&mut self) -> Option<Consumed> {
        let last = self.wait();
        self.submit_tx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Render thread panicked.");
            }
        }
        last
    }

    /// Returns `true` while the thread accepts frames.
    pub fn is_running(&self) -> bool {
        self.submit_tx.is_some()
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}
