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

//! Presentation surfaces and the per-frame acquisition protocol.
//!
//! Each acquisition hands out a frame texture and a pair of signals. The
//! caller waits on `available` before its first write to the image and
//! signals `complete` after its last one; the surface then presents once
//! the queue has set `complete`.

use super::device::DeviceShared;
use super::registry::{FrameInfo, TextureRecord, TextureViewRecord};
use crate::math::Extent2D;
use crate::platform::window::SurfaceTarget;
use crate::renderer::api::command::Signal;
use crate::renderer::api::core::{SurfaceConfiguration, SurfaceDescriptor};
use crate::renderer::api::resource::{
    ImageAspect, ResourceState, TextureDimension, TextureId, TextureUsage, TextureViewDimension,
    TextureViewId,
};
use crate::renderer::api::util::TextureFormat;
use crate::renderer::error::{RenderError, ValidationError};
use crate::renderer::traits::SurfaceBackend;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Where a frame is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Handed out by `get_current_texture`.
    Acquired {
        /// The image must not be rendered to; the frame can only be skipped.
        suboptimal: bool,
    },
    /// A submitted command buffer is going to signal `complete`.
    InFlight,
    /// Handed to the presentation engine.
    Presented,
    /// Abandoned without presentation.
    Skipped,
}

/// A presentation surface created by
/// [`Device::create_surface`](super::Device::create_surface).
pub struct Surface {
    device: Arc<DeviceShared>,
    backend: Box<dyn SurfaceBackend>,
    label: String,
    target: SurfaceTarget,
    config: SurfaceConfiguration,
    frames_in_flight: usize,
    in_flight: VecDeque<Signal>,
    frame_index: u64,
    needs_reconfigure: bool,
    last_frame: Option<FrameState>,
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("label", &self.label)
            .field("config", &self.config)
            .field("frames_in_flight", &self.frames_in_flight)
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

impl Surface {
    pub(crate) fn new(
        device: Arc<DeviceShared>,
        mut backend: Box<dyn SurfaceBackend>,
        descriptor: &SurfaceDescriptor,
    ) -> Result<Self, RenderError> {
        let config = SurfaceConfiguration {
            format: backend.format(),
            extent: descriptor.target.extent(),
            present_mode: descriptor.present_mode,
        };
        let needs_reconfigure = config.extent.is_empty();
        if !needs_reconfigure {
            backend.configure(&config)?;
        }
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or("Surface")
            .to_string();
        log::info!(
            "Surface: '{label}' configured at {}x{} ({:?}, {:?}, {} frame(s) in flight)",
            config.extent.width,
            config.extent.height,
            config.format,
            config.present_mode,
            descriptor.frames_in_flight.max(1)
        );
        Ok(Self {
            device,
            backend,
            label,
            target: descriptor.target.clone(),
            config,
            frames_in_flight: descriptor.frames_in_flight.max(1) as usize,
            in_flight: VecDeque::new(),
            frame_index: 0,
            needs_reconfigure,
            last_frame: None,
        })
    }

    /// The live configuration.
    pub fn config(&self) -> &SurfaceConfiguration {
        &self.config
    }

    /// The format of the frame textures.
    pub fn format(&self) -> TextureFormat {
        self.config.format
    }

    /// The size of the frame textures.
    pub fn extent(&self) -> Extent2D {
        self.config.extent
    }

    /// Number of frames acquired so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }

    /// How the most recent frame ended, once it has.
    pub fn last_frame_state(&self) -> Option<FrameState> {
        self.last_frame
    }

    /// Resizes the swapchain. A zero-sized request is ignored, the way a
    /// minimized window keeps its previous swapchain.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        let extent = Extent2D::new(width, height);
        if extent.is_empty() {
            log::debug!("Surface: '{}' ignores a resize to {width}x{height}", self.label);
            return Ok(());
        }
        match &mut self.target {
            SurfaceTarget::Window { extent: current, .. } => *current = extent,
            SurfaceTarget::Headless(target) => target.resize(width, height),
        }
        self.reconfigure(extent)
    }

    fn reconfigure(&mut self, extent: Extent2D) -> Result<(), RenderError> {
        self.retire_all();
        let config = SurfaceConfiguration { extent, ..self.config };
        self.backend.configure(&config)?;
        self.config = config;
        self.needs_reconfigure = false;
        log::info!(
            "Surface: '{}' reconfigured to {}x{}",
            self.label,
            extent.width,
            extent.height
        );
        Ok(())
    }

    fn retire_finished(&mut self) {
        while self.in_flight.front().is_some_and(Signal::is_set) {
            self.in_flight.pop_front();
        }
    }

    fn retire_all(&mut self) {
        for signal in self.in_flight.drain(..) {
            signal.wait();
        }
    }

    /// Acquires the next frame.
    ///
    /// Blocks on the oldest frame in flight when the configured number of
    /// frames are still in flight. A suboptimal frame is not an error: the
    /// caller must skip it, and the surface reconfigures itself so the next
    /// acquisition can succeed.
    pub fn get_current_texture(&mut self) -> Result<SurfaceTexture<'_>, RenderError> {
        if self.device.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        self.retire_finished();
        if self.in_flight.len() >= self.frames_in_flight {
            if let Some(oldest) = self.in_flight.pop_front() {
                log::trace!("Surface: '{}' waits for '{}'", self.label, oldest.label());
                oldest.wait();
            }
        }

        // A target resized behind our back is reported by the backend as a
        // suboptimal acquisition first, and picked up here on the next one.
        let target_extent = self.target.extent();
        if self.needs_reconfigure {
            if target_extent.is_empty() {
                log::debug!("Surface: '{}' keeps its configuration for an empty target", self.label);
            } else {
                self.reconfigure(target_extent)?;
            }
        }

        self.frame_index += 1;
        let index = self.frame_index;
        let (texture, view) = self.register_frame(index);
        let available = Signal::new(format!("{} frame {index} available", self.label));
        let complete = Signal::new(format!("{} frame {index} complete", self.label));

        let suboptimal = match self.backend.acquire(texture, view, &available) {
            Ok(suboptimal) => suboptimal,
            Err(err) => {
                self.unregister_frame(texture);
                log::error!("Surface: '{}' failed to acquire frame {index}: {err}", self.label);
                return Err(err);
            }
        };
        available.mark_scheduled();

        if suboptimal {
            log::warn!(
                "Surface: '{}' frame {index} is suboptimal and must be skipped",
                self.label
            );
            self.needs_reconfigure = true;
            if let Ok(record) = self.device.registry().texture_mut(texture) {
                record.frame = Some(FrameInfo { suboptimal: true });
            }
        }

        self.last_frame = Some(FrameState::Acquired { suboptimal });
        Ok(SurfaceTexture {
            surface: self,
            texture,
            view,
            index,
            suboptimal,
            available,
            complete,
            finished: false,
        })
    }

    fn register_frame(&mut self, index: u64) -> (TextureId, TextureViewId) {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC;
        let extent = self.config.extent;
        let mut registry = self.device.registry();
        let texture = TextureId(registry.textures.insert(TextureRecord {
            label: Some(format!("{} frame {index}", self.label)),
            format: self.config.format,
            width: extent.width,
            height: extent.height,
            depth: 1,
            array_layers: 1,
            mip_levels: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            usage,
            views: Vec::new(),
            frame: Some(FrameInfo { suboptimal: false }),
        }));
        let view = TextureViewId(registry.views.insert(TextureViewRecord {
            texture,
            format: self.config.format,
            dimension: TextureViewDimension::D2,
            aspect: ImageAspect::All,
            extent,
            sample_count: 1,
            usage,
        }));
        if let Ok(record) = registry.texture_mut(texture) {
            record.views.push(view);
        }
        drop(registry);
        self.device.tracker.register(texture);
        (texture, view)
    }

    fn unregister_frame(&self, texture: TextureId) {
        self.device.registry().remove(texture.into());
        self.device.tracker.unregister(texture);
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.retire_all();
        log::debug!(
            "Surface: '{}' dropped after {} frame(s)",
            self.label,
            self.frame_index
        );
    }
}

/// One acquired frame.
///
/// Borrowing the surface mutably, it must be presented or skipped before
/// the next frame can be acquired. Dropping it skips it.
pub struct SurfaceTexture<'s> {
    surface: &'s mut Surface,
    texture: TextureId,
    view: TextureViewId,
    index: u64,
    suboptimal: bool,
    available: Signal,
    complete: Signal,
    finished: bool,
}

impl fmt::Debug for SurfaceTexture<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceTexture")
            .field("texture", &self.texture)
            .field("view", &self.view)
            .field("index", &self.index)
            .field("state", &self.state())
            .finish()
    }
}

impl SurfaceTexture<'_> {
    /// The frame texture, registered as `Undefined`.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// The view of the whole frame texture.
    pub fn view(&self) -> TextureViewId {
        self.view
    }

    /// The size of the frame texture.
    pub fn extent(&self) -> Extent2D {
        self.surface.config.extent
    }

    /// The frame must be skipped, not rendered to.
    pub fn is_suboptimal(&self) -> bool {
        self.suboptimal
    }

    /// Set once the image can be written.
    pub fn available(&self) -> &Signal {
        &self.available
    }

    /// To be signaled by the submission that renders the frame.
    pub fn complete(&self) -> &Signal {
        &self.complete
    }

    /// 1-based acquisition index.
    pub fn frame_index(&self) -> u64 {
        self.index
    }

    /// Where this frame is in its lifecycle.
    pub fn state(&self) -> FrameState {
        if self.complete.is_scheduled() {
            FrameState::InFlight
        } else {
            FrameState::Acquired {
                suboptimal: self.suboptimal,
            }
        }
    }

    /// Presents the frame once `complete` is set.
    ///
    /// ## Errors
    /// * `ValidationError::PresentNotReady` - If the frame is suboptimal or no
    ///   submission signals `complete`.
    /// * `ValidationError::UnexpectedState` - If the texture is not in `PresentSource`.
    ///
    /// A frame that fails validation is skipped.
    pub fn present(mut self) -> Result<(), RenderError> {
        if self.suboptimal {
            return Err(ValidationError::PresentNotReady(
                "a suboptimal frame cannot be presented".to_string(),
            )
            .into());
        }
        if !self.complete.is_scheduled() {
            return Err(ValidationError::PresentNotReady(format!(
                "no submitted command buffer signals '{}'",
                self.complete.label()
            ))
            .into());
        }
        let tracked = self
            .surface
            .device
            .tracker
            .current(self.texture)
            .unwrap_or_default();
        if tracked != ResourceState::PresentSource {
            return Err(ValidationError::UnexpectedState {
                resource: self.texture.into(),
                required: vec![ResourceState::PresentSource],
                tracked,
            }
            .into());
        }

        self.finished = true;
        let result = self.surface.backend.present(self.texture, &self.complete);
        self.surface.unregister_frame(self.texture);
        self.surface.in_flight.push_back(self.complete.clone());
        match result {
            Ok(()) => {
                self.surface.last_frame = Some(FrameState::Presented);
                log::trace!("Surface: '{}' presented frame {}", self.surface.label, self.index);
                Ok(())
            }
            Err(err) => {
                self.surface.needs_reconfigure = true;
                self.surface.last_frame = Some(FrameState::Skipped);
                log::error!("Surface: '{}' failed to present frame {}: {err}", self.surface.label, self.index);
                Err(err)
            }
        }
    }

    /// Abandons the frame without presenting it.
    pub fn skip(mut self) {
        self.abandon();
    }

    fn abandon(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if self.complete.is_scheduled() {
            // The queue may still be writing the image.
            self.complete.wait();
        }
        self.surface.backend.discard(self.texture);
        self.surface.unregister_frame(self.texture);
        self.surface.last_frame = Some(FrameState::Skipped);
        log::debug!("Surface: '{}' skipped frame {}", self.surface.label, self.index);
    }
}

impl Drop for SurfaceTexture<'_> {
    fn drop(&mut self) {
        self.abandon();
    }
}
