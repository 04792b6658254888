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

//! The software implementation of [`DeviceBackend`].

use super::image::Image;
use super::kernel::{Kernel, KernelLibrary, SamplerState};
use super::queue::{PresentedFrame, Queue, QueueOp};
use super::resources::{BoundEntry, PipelineState, Resources, ViewInfo};
use super::surface::SoftwareSurface;
use lyra_core::renderer::api::command::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId, BindingType,
    CommandBuffer,
};
use lyra_core::renderer::api::core::{
    AdapterInfo, BackendKind, DeviceType, ShaderModuleDescriptor, ShaderModuleId,
    SurfaceDescriptor,
};
use lyra_core::renderer::api::pipeline::{
    PipelineLayoutDescriptor, PipelineLayoutId, RenderPipelineDescriptor, RenderPipelineId,
};
use lyra_core::renderer::api::resource::{
    BufferDescriptor, BufferId, ImageAspect, SamplerDescriptor, SamplerId, TextureDescriptor,
    TextureId, TextureViewDescriptor, TextureViewId,
};
use lyra_core::renderer::api::AnyResource;
use lyra_core::renderer::error::{PipelineError, RenderError, ResourceError, ShaderError};
use lyra_core::renderer::traits::{DeviceBackend, SurfaceBackend};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Counters of what a software device did, shared with its owner.
#[derive(Debug, Default)]
pub struct SoftwareStats {
    pub(crate) submissions: AtomicU64,
    pub(crate) presents: AtomicU64,
    pub(crate) allocations: AtomicU64,
    pub(crate) releases: AtomicU64,
    pub(crate) last_presented: Mutex<Option<PresentedFrame>>,
}

impl SoftwareStats {
    /// Command buffers submitted.
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Frames presented.
    pub fn presents(&self) -> u64 {
        self.presents.load(Ordering::Relaxed)
    }

    /// Native objects created.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Native objects released.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Objects created and not yet released.
    pub fn live(&self) -> u64 {
        self.allocations().saturating_sub(self.releases())
    }

    /// The last frame that reached the screen, if any.
    pub fn last_presented(&self) -> Option<PresentedFrame> {
        self.last_presented
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// State shared by the device and its surfaces.
pub(crate) struct SoftwareShared {
    pub store: Arc<Mutex<Resources>>,
    pub stats: Arc<SoftwareStats>,
    pub queue: Queue,
    pub lost: AtomicBool,
}

impl SoftwareShared {
    pub fn store(&self) -> MutexGuard<'_, Resources> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

/// A device that rasterizes on the CPU.
///
/// Shader entry points run as native kernels looked up in a
/// [`KernelLibrary`]. Every operation goes through a single queue thread,
/// so results are deterministic.
#[derive(Clone)]
pub struct SoftwareDevice {
    shared: Arc<SoftwareShared>,
    library: Arc<KernelLibrary>,
}

impl fmt::Debug for SoftwareDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareDevice")
            .field("stats", &self.shared.stats)
            .field("kernels", &self.library.len())
            .finish()
    }
}

impl SoftwareDevice {
    /// Creates a device and starts its queue thread.
    pub fn new(library: Arc<KernelLibrary>) -> Result<Self, RenderError> {
        let store = Arc::new(Mutex::new(Resources::default()));
        let stats = Arc::new(SoftwareStats::default());
        let queue = Queue::spawn(store.clone(), stats.clone()).map_err(|e| {
            RenderError::DeviceRequestFailed(format!("cannot start the software queue: {e}"))
        })?;
        log::info!(
            "SoftwareDevice: created with {} registered kernel(s)",
            library.len()
        );
        Ok(Self {
            shared: Arc::new(SoftwareShared {
                store,
                stats,
                queue,
                lost: AtomicBool::new(false),
            }),
            library,
        })
    }

    /// The device counters. They outlive the device.
    pub fn stats(&self) -> Arc<SoftwareStats> {
        self.shared.stats.clone()
    }

    /// Makes every later submission fail with `RenderError::DeviceLost`.
    pub fn simulate_device_loss(&self) {
        log::warn!("SoftwareDevice: simulating device loss");
        self.shared.lost.store(true, Ordering::Release);
    }

    fn created(&self) {
        self.shared.stats.allocations.fetch_add(1, Ordering::Relaxed);
    }
}

fn unknown(what: &str, id: impl fmt::Debug) -> ResourceError {
    ResourceError::BackendError(format!("{what} {id:?} has no software object"))
}

impl DeviceBackend for SoftwareDevice {
    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: "Lyra Software Rasterizer".to_string(),
            backend: BackendKind::Software,
            device_type: DeviceType::Cpu,
            driver: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn create_buffer(&self, id: BufferId, descriptor: &BufferDescriptor) -> Result<(), ResourceError> {
        let size = usize::try_from(descriptor.size).map_err(|_| ResourceError::OutOfMemory {
            label: descriptor.label.as_deref().map(str::to_string),
            requested: descriptor.size,
        })?;
        self.shared.store().buffers.insert(id, vec![0; size]);
        self.created();
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        self.shared
            .queue
            .push(QueueOp::WriteBuffer {
                buffer: id,
                offset,
                data: data.to_vec(),
            })
            .map_err(|e| ResourceError::BackendError(e.to_string()))
    }

    fn write_mapped(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut store = self.shared.store();
        let bytes = store.buffers.get_mut(&id).ok_or_else(|| unknown("buffer", id))?;
        let start = offset as usize;
        bytes
            .get_mut(start..start + data.len())
            .ok_or_else(|| ResourceError::BackendError(format!("mapped write out of range on {id:?}")))?
            .copy_from_slice(data);
        Ok(())
    }

    fn unmap_buffer(&self, _id: BufferId) -> Result<(), ResourceError> {
        // Mapped writes land in the store directly.
        Ok(())
    }

    fn create_texture(&self, id: TextureId, descriptor: &TextureDescriptor) -> Result<(), ResourceError> {
        self.shared.store().images.insert(id, Image::new(descriptor));
        self.created();
        Ok(())
    }

    fn create_texture_view(
        &self,
        id: TextureViewId,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<(), ResourceError> {
        self.shared.store().views.insert(
            id,
            ViewInfo {
                texture,
                level: descriptor.base_mip_level,
                layer: descriptor.base_array_layer,
            },
        );
        self.created();
        Ok(())
    }

    fn create_sampler(&self, id: SamplerId, descriptor: &SamplerDescriptor) -> Result<(), ResourceError> {
        self.shared
            .store()
            .samplers
            .insert(id, SamplerState::from(descriptor));
        self.created();
        Ok(())
    }

    fn create_shader_module(
        &self,
        id: ShaderModuleId,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<(), ResourceError> {
        let blob = descriptor.blob;
        let key = std::str::from_utf8(blob.as_bytes()).map_err(|_| {
            ShaderError::LoadError {
                path: blob.entry_point.clone(),
                source_error: "the blob was not compiled for the software backend".to_string(),
            }
        })?;
        let kernel = self.library.get(key).ok_or_else(|| ShaderError::EntryPointNotFound {
            module: key.to_string(),
            entry_point: blob.entry_point.clone(),
        })?;
        self.shared.store().shaders.insert(id, kernel);
        self.created();
        Ok(())
    }

    fn create_bind_group_layout(
        &self,
        id: BindGroupLayoutId,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<(), ResourceError> {
        self.shared
            .store()
            .bind_group_layouts
            .insert(id, descriptor.entries.to_vec());
        self.created();
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        _id: PipelineLayoutId,
        _descriptor: &PipelineLayoutDescriptor,
    ) -> Result<(), ResourceError> {
        self.created();
        Ok(())
    }

    fn create_bind_group(&self, id: BindGroupId, descriptor: &BindGroupDescriptor) -> Result<(), ResourceError> {
        let mut store = self.shared.store();
        let layout = store
            .bind_group_layouts
            .get(&descriptor.layout)
            .ok_or_else(|| unknown("bind group layout", descriptor.layout))?;
        let mut entries: Vec<BoundEntry> = descriptor
            .entries
            .iter()
            .map(|entry| BoundEntry {
                binding: entry.binding,
                resource: entry.resource,
                dynamic: layout.iter().any(|slot| {
                    slot.binding == entry.binding
                        && matches!(
                            slot.ty,
                            BindingType::Buffer {
                                has_dynamic_offset: true,
                                ..
                            }
                        )
                }),
            })
            .collect();
        entries.sort_by_key(|entry| entry.binding);
        store.bind_groups.insert(id, entries);
        drop(store);
        self.created();
        Ok(())
    }

    fn create_render_pipeline(
        &self,
        id: RenderPipelineId,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<(), ResourceError> {
        let label = descriptor.label.as_deref().map(str::to_string);
        let invalid = |module: ShaderModuleId| PipelineError::InvalidShaderModuleForPipeline {
            id: module,
            pipeline_label: label.clone(),
        };
        let mut store = self.shared.store();
        let vertex = match store.shaders.get(&descriptor.vertex.module) {
            Some(Kernel::Vertex(kernel)) => kernel.clone(),
            _ => return Err(invalid(descriptor.vertex.module).into()),
        };
        let fragment = match &descriptor.fragment {
            Some(stage) => match store.shaders.get(&stage.module) {
                Some(Kernel::Fragment(kernel)) => Some(kernel.clone()),
                _ => return Err(invalid(stage.module).into()),
            },
            None => None,
        };
        let state = PipelineState {
            label: label.clone().unwrap_or_else(|| "Unknown".to_string()),
            vertex,
            fragment,
            vertex_buffers: descriptor
                .vertex
                .buffers
                .iter()
                .cloned()
                .map(|layout| layout.into_owned())
                .collect(),
            primitive: descriptor.primitive,
            depth_stencil: descriptor.depth_stencil.clone(),
            targets: descriptor
                .fragment
                .as_ref()
                .map(|stage| stage.targets.to_vec())
                .unwrap_or_default(),
        };
        log::debug!("SoftwareDevice: built pipeline '{}'", state.label);
        store.pipelines.insert(id, Arc::new(state));
        drop(store);
        self.created();
        Ok(())
    }

    fn release(&self, resource: AnyResource) {
        self.shared.stats.releases.fetch_add(1, Ordering::Relaxed);
        // Ordered after every submission that may still use the object.
        if self.shared.queue.push(QueueOp::Release(resource)).is_err() {
            self.shared.store().release(resource);
        }
    }

    fn submit(&self, commands: &CommandBuffer) -> Result<(), RenderError> {
        if self.shared.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        self.shared.queue.push(QueueOp::Submit {
            label: commands.label().unwrap_or("Unknown").to_string(),
            commands: commands.commands().to_vec(),
        })?;
        self.shared.stats.submissions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        self.shared.queue.flush()
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let store = self.shared.store();
        let bytes = store.buffers.get(&id).ok_or_else(|| unknown("buffer", id))?;
        bytes
            .get(offset as usize..(offset + size) as usize)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ResourceError::BackendError(format!("read out of range on {id:?}")))
    }

    fn read_texture(&self, id: TextureId, aspect: ImageAspect) -> Result<Vec<u8>, ResourceError> {
        let store = self.shared.store();
        let image = store.images.get(&id).ok_or_else(|| unknown("texture", id))?;
        Ok(image.read(aspect))
    }

    fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<Box<dyn SurfaceBackend>, RenderError> {
        Ok(Box::new(SoftwareSurface::new(self.shared.clone(), descriptor)))
    }
}
