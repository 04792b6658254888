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

//! Offscreen swapchain of the software backend.

use super::device::SoftwareShared;
use super::image::Image;
use super::queue::QueueOp;
use super::resources::ViewInfo;
use lyra_core::math::Extent2D;
use lyra_core::platform::window::SurfaceTarget;
use lyra_core::renderer::api::command::Signal;
use lyra_core::renderer::api::core::{SurfaceConfiguration, SurfaceDescriptor};
use lyra_core::renderer::api::resource::{TextureId, TextureViewId};
use lyra_core::renderer::api::util::TextureFormat;
use lyra_core::renderer::error::RenderError;
use lyra_core::renderer::traits::SurfaceBackend;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The format of software swapchain images.
pub const SOFTWARE_SURFACE_FORMAT: TextureFormat = TextureFormat::Bgra8Unorm;

/// A swapchain whose images live in the software store. Presenting records
/// the image as the device's last presented frame.
///
/// Window targets are treated as offscreen targets of a fixed size.
pub(crate) struct SoftwareSurface {
    shared: Arc<SoftwareShared>,
    label: String,
    target: SurfaceTarget,
    config: Option<SurfaceConfiguration>,
    acquired: HashMap<TextureId, TextureViewId>,
}

impl fmt::Debug for SoftwareSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareSurface")
            .field("label", &self.label)
            .field("config", &self.config)
            .field("acquired", &self.acquired.len())
            .finish()
    }
}

impl SoftwareSurface {
    pub fn new(shared: Arc<SoftwareShared>, descriptor: &SurfaceDescriptor) -> Self {
        if let SurfaceTarget::Window { .. } = descriptor.target {
            log::warn!("SoftwareSurface: window targets are rendered offscreen");
        }
        Self {
            shared,
            label: descriptor
                .label
                .as_deref()
                .unwrap_or("Surface")
                .to_string(),
            target: descriptor.target.clone(),
            config: None,
            acquired: HashMap::new(),
        }
    }
}

impl SurfaceBackend for SoftwareSurface {
    fn format(&self) -> TextureFormat {
        SOFTWARE_SURFACE_FORMAT
    }

    fn configure(&mut self, config: &SurfaceConfiguration) -> Result<(), RenderError> {
        log::debug!(
            "SoftwareSurface: '{}' configured at {}x{}",
            self.label,
            config.extent.width,
            config.extent.height
        );
        self.config = Some(*config);
        Ok(())
    }

    fn acquire(
        &mut self,
        texture: TextureId,
        view: TextureViewId,
        available: &Signal,
    ) -> Result<bool, RenderError> {
        if self.shared.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        let config = self.config.ok_or_else(|| {
            RenderError::SurfaceAcquisitionFailed(format!("surface '{}' is not configured", self.label))
        })?;
        // Images are created lazily, so nothing waits on the queue.
        available.set();

        let current: Extent2D = self.target.extent();
        if current != config.extent {
            return Ok(true);
        }
        let mut store = self.shared.store();
        store.images.insert(
            texture,
            Image::frame(config.format, config.extent.width, config.extent.height),
        );
        store.views.insert(
            view,
            ViewInfo {
                texture,
                level: 0,
                layer: 0,
            },
        );
        drop(store);
        self.acquired.insert(texture, view);
        Ok(false)
    }

    fn present(&mut self, texture: TextureId, complete: &Signal) -> Result<(), RenderError> {
        let view = self.acquired.remove(&texture).ok_or_else(|| {
            RenderError::SurfaceAcquisitionFailed(format!("{texture:?} is not an acquired frame"))
        })?;
        let extent = self.config.map(|c| c.extent).unwrap_or_default();
        self.shared.queue.push(QueueOp::Present {
            texture,
            view,
            extent,
            complete: complete.clone(),
        })
    }

    fn discard(&mut self, texture: TextureId) {
        if let Some(view) = self.acquired.remove(&texture) {
            if let Err(err) = self.shared.queue.push(QueueOp::Discard { texture, view }) {
                log::error!("SoftwareSurface: cannot discard {texture:?}: {err}");
            }
        }
    }
}
