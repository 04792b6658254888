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


//! Swapchains of the `wgpu` backend.

use super::conversions::{from_wgpu_texture_format, IntoWgpu};
use super::device::{TextureEntry, ViewEntry, WgpuShared};
use lyra_core::platform::window::{HeadlessTarget, LyraWindowHandle, SurfaceTarget};
use lyra_core::renderer::api::command::Signal;
use lyra_core::renderer::api::core::{SurfaceConfiguration, SurfaceDescriptor};
use lyra_core::renderer::api::resource::{TextureId, TextureViewId};
use lyra_core::renderer::api::util::TextureFormat;
use lyra_core::renderer::error::RenderError;
use lyra_core::renderer::traits::SurfaceBackend;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The format of offscreen swapchain images.
const HEADLESS_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

enum Target {
    Window {
        surface: wgpu::Surface<'static>,
        // Keeps the native window alive as long as its surface.
        _handle: LyraWindowHandle,
        caps: wgpu::SurfaceCapabilities,
    },
    Headless(HeadlessTarget),
}

/// A presentable image handed out by `acquire`.
enum Frame {
    Window(wgpu::SurfaceTexture),
    Headless,
}

pub(crate) struct WgpuSurface {
    shared: Arc<WgpuShared>,
    label: String,
    target: Target,
    format: TextureFormat,
    config: Option<SurfaceConfiguration>,
    frames_in_flight: u32,
    acquired: HashMap<TextureId, (TextureViewId, Frame)>,
}

impl fmt::Debug for WgpuSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuSurface")
            .field("label", &self.label)
            .field("format", &self.format)
            .field("config", &self.config)
            .field("acquired", &self.acquired.len())
            .finish()
    }
}

impl WgpuSurface {
    pub fn new(shared: Arc<WgpuShared>, descriptor: &SurfaceDescriptor) -> Result<Self, RenderError> {
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or("Surface")
            .to_string();
        let (target, format) = match &descriptor.target {
            SurfaceTarget::Window { handle, .. } => {
                let surface = shared
                    .context
                    .instance
                    .create_surface(handle.clone())
                    .map_err(|e| {
                        RenderError::InitializationFailed(format!("cannot create surface '{label}': {e}"))
                    })?;
                let caps = surface.get_capabilities(&shared.context.adapter);
                // Prefer an sRGB format the RHI can describe.
                let format = caps
                    .formats
                    .iter()
                    .filter_map(|f| from_wgpu_texture_format(*f))
                    .find(|f| f.is_srgb())
                    .or_else(|| caps.formats.iter().find_map(|f| from_wgpu_texture_format(*f)))
                    .ok_or_else(|| {
                        RenderError::InitializationFailed(format!(
                            "surface '{label}' supports no known format: {:?}",
                            caps.formats
                        ))
                    })?;
                let target = Target::Window {
                    surface,
                    _handle: handle.clone(),
                    caps,
                };
                (target, format)
            }
            SurfaceTarget::Headless(headless) => (Target::Headless(headless.clone()), HEADLESS_FORMAT),
        };
        log::debug!("WgpuSurface: '{label}' created with format {format:?}");
        Ok(Self {
            shared,
            label,
            target,
            format,
            config: None,
            frames_in_flight: descriptor.frames_in_flight.max(1),
            acquired: HashMap::new(),
        })
    }

    fn bind(&self, texture: TextureId, view: TextureViewId, native: wgpu::Texture) {
        let native_view = native.create_view(&wgpu::TextureViewDescriptor::default());
        let mut objects = self.shared.objects();
        objects.textures.insert(
            texture,
            TextureEntry {
                texture: native,
                format: self.format,
            },
        );
        objects.views.insert(
            view,
            ViewEntry {
                view: native_view,
                format: self.format,
            },
        );
    }

    fn unbind(&self, texture: TextureId, view: TextureViewId) {
        let mut objects = self.shared.objects();
        objects.views.remove(&view);
        objects.textures.remove(&texture);
    }
}

impl SurfaceBackend for WgpuSurface {
    fn format(&self) -> TextureFormat {
        self.format
    }

    fn configure(&mut self, config: &SurfaceConfiguration) -> Result<(), RenderError> {
        if let Target::Window { surface, caps, .. } = &self.target {
            let wanted: wgpu::PresentMode = config.present_mode.into_wgpu();
            let present_mode = if caps.present_modes.contains(&wanted) {
                wanted
            } else {
                log::warn!("WgpuSurface: {wanted:?} is unsupported, falling back to Fifo");
                wgpu::PresentMode::Fifo
            };
            let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
            if caps.usages.contains(wgpu::TextureUsages::COPY_SRC) {
                usage |= wgpu::TextureUsages::COPY_SRC;
            }
            surface.configure(
                &self.shared.context.device,
                &wgpu::SurfaceConfiguration {
                    usage,
                    format: config.format.into_wgpu(),
                    width: config.extent.width.max(1),
                    height: config.extent.height.max(1),
                    present_mode,
                    alpha_mode: caps
                        .alpha_modes
                        .first()
                        .copied()
                        .unwrap_or(wgpu::CompositeAlphaMode::Auto),
                    view_formats: vec![],
                    desired_maximum_frame_latency: self.frames_in_flight,
                },
            );
        }
        log::debug!(
            "WgpuSurface: '{}' configured at {}x{}",
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
        if self.shared.context.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        let config = self.config.ok_or_else(|| {
            RenderError::SurfaceAcquisitionFailed(format!("surface '{}' is not configured", self.label))
        })?;
        // Acquisition is synchronous with the queue on this backend.
        available.set();

        let (native, frame) = match &self.target {
            Target::Window { surface, .. } => match surface.get_current_texture() {
                Ok(frame) if frame.suboptimal => {
                    log::debug!("WgpuSurface: '{}' returned a suboptimal image", self.label);
                    return Ok(true);
                }
                Ok(frame) => (frame.texture.clone(), Frame::Window(frame)),
                Err(e @ (wgpu::SurfaceError::Outdated
                | wgpu::SurfaceError::Lost
                | wgpu::SurfaceError::Timeout)) => {
                    log::warn!("WgpuSurface: '{}' needs recreation ({e:?})", self.label);
                    return Ok(true);
                }
                Err(e) => {
                    return Err(RenderError::SurfaceAcquisitionFailed(format!(
                        "surface '{}': {e:?}",
                        self.label
                    )))
                }
            },
            Target::Headless(headless) => {
                if headless.extent() != config.extent {
                    return Ok(true);
                }
                let native = self
                    .shared
                    .context
                    .device
                    .create_texture(&wgpu::TextureDescriptor {
                        label: Some(&self.label),
                        size: wgpu::Extent3d {
                            width: config.extent.width.max(1),
                            height: config.extent.height.max(1),
                            depth_or_array_layers: 1,
                        },
                        mip_level_count: 1,
                        sample_count: 1,
                        dimension: wgpu::TextureDimension::D2,
                        format: config.format.into_wgpu(),
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                            | wgpu::TextureUsages::COPY_SRC,
                        view_formats: &[],
                    });
                (native, Frame::Headless)
            }
        };
        self.bind(texture, view, native);
        self.acquired.insert(texture, (view, frame));
        Ok(false)
    }

    fn present(&mut self, texture: TextureId, complete: &Signal) -> Result<(), RenderError> {
        let (view, frame) = self.acquired.remove(&texture).ok_or_else(|| {
            RenderError::SurfaceAcquisitionFailed(format!("{texture:?} is not an acquired frame"))
        })?;
        self.unbind(texture, view);
        if let Frame::Window(frame) = frame {
            frame.present();
        }
        // Presentation is ordered after all submitted work.
        self.shared.signal_on_completion(vec![complete.clone()]);
        Ok(())
    }

    fn discard(&mut self, texture: TextureId) {
        if let Some((view, _frame)) = self.acquired.remove(&texture) {
            self.unbind(texture, view);
            log::trace!("WgpuSurface: '{}' discarded {texture:?}", self.label);
        }
    }
}
