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

//! The device: owner of every GPU object and entry point of queue submission.

use super::factory;
use super::recorder::CommandRecorder;
use super::registry::{
    self, BufferRecord, ResourceRegistry, SamplerRecord, TextureRecord, TextureViewRecord,
};
use super::surface::Surface;
use super::tracker::StateTracker;
use crate::math::Extent2D;
use crate::renderer::api::command::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId, CommandBuffer,
    CommandBufferDescriptor,
};
use crate::renderer::api::core::{
    AdapterInfo, DeviceDescriptor, ShaderModuleDescriptor, ShaderModuleId, SurfaceDescriptor,
};
use crate::renderer::api::pipeline::{
    PipelineLayoutDescriptor, PipelineLayoutId, RenderPipelineDescriptor, RenderPipelineId,
};
use crate::renderer::api::resource::{
    BufferDescriptor, BufferId, BufferUsage, FilterMode, ImageAspect, ResourceState,
    SamplerDescriptor, SamplerId, TextureDescriptor, TextureId, TextureUsage,
    TextureViewDescriptor, TextureViewId,
};
use crate::renderer::api::{AnyResource, ResourceId};
use crate::renderer::error::{RenderError, ResourceError, ValidationError};
use crate::renderer::traits::DeviceBackend;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) struct DeviceShared {
    pub(crate) backend: Box<dyn DeviceBackend>,
    pub(crate) tracker: StateTracker,
    registry: Mutex<ResourceRegistry>,
    info: AdapterInfo,
    label: Option<String>,
    lost: AtomicBool,
}

impl DeviceShared {
    pub(crate) fn registry(&self) -> MutexGuard<'_, ResourceRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub(crate) fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("Device")
    }

    /// Validates and enqueues a finished command buffer.
    pub(crate) fn submit(&self, commands: CommandBuffer) -> Result<(), RenderError> {
        if self.lost.load(Ordering::Acquire) {
            return Err(RenderError::DeviceLost);
        }

        // The registry stays locked until the buffer is enqueued, so no
        // referenced object can be destroyed in between.
        let mut registry = self.registry();
        for resource in commands.referenced() {
            if !registry.contains(*resource) {
                return Err(ValidationError::StaleHandle(*resource).into());
            }
        }
        // A wait on a signal nothing will ever set would stall the queue.
        for signal in commands.waits() {
            if !signal.is_scheduled() {
                return Err(ValidationError::RecordingOrder(format!(
                    "waited signal '{}' is not scheduled by any prior submission",
                    signal.label()
                ))
                .into());
            }
        }
        for signal in commands.signals() {
            if signal.is_scheduled() {
                return Err(ValidationError::RecordingOrder(format!(
                    "signal '{}' is already scheduled by another submission",
                    signal.label()
                ))
                .into());
            }
        }

        self.tracker.commit(commands.requirements())?;

        for buffer in commands.referenced_buffers() {
            let record = registry.buffer_mut(buffer)?;
            if record.mapped {
                if let Err(err) = self.backend.unmap_buffer(buffer) {
                    self.tracker.rollback(commands.requirements());
                    return Err(err.into());
                }
                record.mapped = false;
                log::debug!(
                    "Device: closed the creation-time mapping of buffer '{}' on first submission",
                    record.label.as_deref().unwrap_or("Unknown")
                );
            }
        }

        log::trace!(
            "Device: submitting '{}' ({} commands)",
            commands.label().unwrap_or("Unknown"),
            commands.commands().len()
        );
        // Signals are only promised once the queue holds the buffer. A failed
        // submission restores the tracked states and schedules nothing.
        if let Err(err) = self.backend.submit(&commands) {
            self.tracker.rollback(commands.requirements());
            if matches!(err, RenderError::DeviceLost) {
                self.lost.store(true, Ordering::Release);
                log::error!("Device: '{}' was lost during submission", self.label());
            } else {
                log::error!(
                    "Device: submission of '{}' failed: {err}",
                    commands.label().unwrap_or("Unknown")
                );
            }
            return Err(err);
        }
        for signal in commands.signals() {
            signal.mark_scheduled();
        }
        Ok(())
    }

    pub(crate) fn wait_idle(&self) -> Result<(), RenderError> {
        match self.backend.wait_idle() {
            Err(RenderError::DeviceLost) => {
                self.lost.store(true, Ordering::Release);
                Err(RenderError::DeviceLost)
            }
            other => other,
        }
    }

    /// Releases objects that were just removed from the registry.
    pub(crate) fn release(&self, removed: &[AnyResource]) {
        for resource in removed {
            match resource {
                AnyResource::Buffer(id) => self.tracker.unregister(*id),
                AnyResource::Texture(id) => self.tracker.unregister(*id),
                _ => {}
            }
            self.backend.release(*resource);
            log::trace!("Device: released {resource:?}");
        }
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        if let Err(err) = self.backend.wait_idle() {
            log::error!("Device: wait before teardown failed: {err}");
        }
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        let remaining = registry.drain_all();
        for resource in &remaining {
            self.backend.release(*resource);
        }
        log::info!(
            "Device: '{}' torn down, {} resource(s) reclaimed",
            self.label.as_deref().unwrap_or("Device"),
            remaining.len()
        );
    }
}

/// A logical device on one adapter.
///
/// `Device` is a cheap handle: clones refer to the same device. The device
/// is torn down when the last handle, surface and command recorder are
/// gone: it waits for the queue to drain, then releases every object that
/// was not destroyed explicitly, exactly once.
#[derive(Clone)]
pub struct Device {
    shared: Arc<DeviceShared>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("label", &self.shared.label)
            .field("adapter", &self.shared.info.name)
            .field("backend", &self.shared.info.backend)
            .field("live_resources", &self.live_resource_count())
            .finish()
    }
}

fn label_of<'a>(label: &'a Option<std::borrow::Cow<'_, str>>) -> &'a str {
    label.as_deref().unwrap_or("Unknown")
}

impl Device {
    /// Wraps a backend into a device. Called by the RHI entry point once a
    /// backend has been selected.
    pub fn new(backend: Box<dyn DeviceBackend>, descriptor: &DeviceDescriptor) -> Self {
        let info = backend.adapter_info();
        log::info!(
            "Device: created on '{}' ({}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );
        Self {
            shared: Arc::new(DeviceShared {
                backend,
                tracker: StateTracker::new(),
                registry: Mutex::new(ResourceRegistry::default()),
                info,
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                lost: AtomicBool::new(false),
            }),
        }
    }

    /// The adapter this device runs on.
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.shared.info
    }

    /// `true` once the device has been lost. A lost device refuses submissions.
    pub fn is_lost(&self) -> bool {
        self.shared.lost.load(Ordering::Acquire)
    }

    /// Number of live objects of every kind, including surface frames.
    pub fn live_resource_count(&self) -> usize {
        self.shared.registry().live_count()
    }

    /// The tracked state of a buffer or texture, `None` once it is destroyed.
    pub fn resource_state(&self, resource: impl Into<ResourceId>) -> Option<ResourceState> {
        self.shared.tracker.current(resource)
    }

    /// Creates a buffer, registered as `Undefined`.
    ///
    /// With `mapped_at_creation`, the buffer can be filled with
    /// [`Device::write_mapped`] until it is unmapped or first submitted.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        registry::validate_buffer(descriptor)?;
        let backend = &self.shared.backend;
        let handle = self.shared.registry().buffers.insert_with(|handle| {
            backend.create_buffer(BufferId(handle), descriptor)?;
            Ok::<_, ResourceError>(BufferRecord {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                size: descriptor.size,
                usage: descriptor.usage,
                mapped: descriptor.mapped_at_creation,
            })
        })?;
        let id = BufferId(handle);
        self.shared.tracker.register(id);
        log::debug!(
            "Device: created buffer '{}' ({} bytes, {:?})",
            label_of(&descriptor.label),
            descriptor.size,
            descriptor.usage
        );
        Ok(id)
    }

    /// Creates a buffer holding `contents`, padded to a multiple of 4 bytes.
    pub fn create_buffer_init(
        &self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<BufferId, ResourceError> {
        let size = (contents.len() as u64).div_ceil(4).max(1) * 4;
        let buffer = self.create_buffer(&BufferDescriptor::new(label, size, usage).mapped())?;
        self.write_mapped(buffer, 0, contents)?;
        self.unmap(buffer)?;
        Ok(buffer)
    }

    /// Writes into the creation-time mapping of a buffer.
    ///
    /// Fails with `BufferNotMapped` once the buffer was unmapped or
    /// referenced by a submitted command buffer.
    pub fn write_mapped(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let registry = self.shared.registry();
        let record = registry.buffer(buffer)?;
        if !record.mapped {
            return Err(ValidationError::BufferNotMapped(buffer).into());
        }
        check_range(record, offset, data.len() as u64)?;
        self.shared.backend.write_mapped(buffer, offset, data)
    }

    /// Closes the creation-time mapping of a buffer.
    pub fn unmap(&self, buffer: BufferId) -> Result<(), ResourceError> {
        let mut registry = self.shared.registry();
        let record = registry.buffer_mut(buffer)?;
        if !record.mapped {
            return Err(ValidationError::BufferNotMapped(buffer).into());
        }
        self.shared.backend.unmap_buffer(buffer)?;
        record.mapped = false;
        Ok(())
    }

    /// Enqueues a write into a buffer, ordered before later submissions.
    /// Requires `COPY_DST` and 4-byte aligned offset and size.
    pub fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let registry = self.shared.registry();
        let record = registry.buffer(buffer)?;
        if !record.usage.contains(BufferUsage::COPY_DST) {
            return Err(ValidationError::MissingUsage {
                resource: AnyResource::Buffer(buffer),
                usage: "COPY_DST".to_string(),
            }
            .into());
        }
        if offset % 4 != 0 || data.len() % 4 != 0 {
            return Err(ValidationError::OutOfBounds(format!(
                "buffer writes must be 4-byte aligned, got offset {offset} and {} bytes",
                data.len()
            ))
            .into());
        }
        check_range(record, offset, data.len() as u64)?;
        self.shared.backend.write_buffer(buffer, offset, data)
    }

    /// Creates a texture, registered as `Undefined`.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        registry::validate_texture(descriptor)?;
        let backend = &self.shared.backend;
        let handle = self.shared.registry().textures.insert_with(|handle| {
            backend.create_texture(TextureId(handle), descriptor)?;
            Ok::<_, ResourceError>(TextureRecord::from_descriptor(descriptor, None))
        })?;
        let id = TextureId(handle);
        self.shared.tracker.register(id);
        log::debug!(
            "Device: created texture '{}' ({}x{}, {:?})",
            label_of(&descriptor.label),
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        Ok(id)
    }

    /// Creates a view of a subresource range of `texture`.
    pub fn create_view(
        &self,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<TextureViewId, ResourceError> {
        let mut registry = self.shared.registry();
        let record = registry.texture(texture)?;
        if record.frame.is_some() {
            return Err(ValidationError::InvalidDescriptor {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                reason: "surface frames come with their own view".to_string(),
            }
            .into());
        }
        let resolved = registry::resolve_view(record, descriptor)?;
        let base_mip = resolved.base_mip_level;
        let view_record = TextureViewRecord {
            texture,
            format: resolved.format.unwrap_or(record.format),
            dimension: resolved.dimension.unwrap_or(crate::renderer::api::resource::TextureViewDimension::D2),
            aspect: resolved.aspect,
            extent: Extent2D::new((record.width >> base_mip).max(1), (record.height >> base_mip).max(1)),
            sample_count: record.sample_count,
            usage: record.usage,
        };
        let backend = &self.shared.backend;
        let handle = registry.views.insert_with(|handle| {
            backend.create_texture_view(TextureViewId(handle), texture, &resolved)?;
            Ok::<_, ResourceError>(view_record)
        })?;
        let id = TextureViewId(handle);
        registry.texture_mut(texture)?.views.push(id);
        log::debug!("Device: created view {id:?} of texture {texture:?}");
        Ok(id)
    }

    /// Creates a sampler.
    pub fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerId, ResourceError> {
        let backend = &self.shared.backend;
        let handle = self.shared.registry().samplers.insert_with(|handle| {
            backend.create_sampler(SamplerId(handle), descriptor)?;
            Ok::<_, ResourceError>(SamplerRecord {
                comparison: descriptor.compare.is_some(),
                filtering: [descriptor.mag_filter, descriptor.min_filter, descriptor.mipmap_filter]
                    .contains(&FilterMode::Linear),
            })
        })?;
        log::debug!("Device: created sampler '{}'", label_of(&descriptor.label));
        Ok(SamplerId(handle))
    }

    /// Creates a shader module from one entry point of a compiled module.
    pub fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<ShaderModuleId, ResourceError> {
        let record = factory::shader_module_record(descriptor)?;
        let backend = &self.shared.backend;
        let handle = self.shared.registry().shader_modules.insert_with(|handle| {
            backend.create_shader_module(ShaderModuleId(handle), descriptor)?;
            Ok::<_, ResourceError>(record)
        })?;
        log::debug!(
            "Device: created {:?} shader module '{}' ({} bytes)",
            descriptor.blob.stage,
            descriptor.blob.entry_point,
            descriptor.blob.size()
        );
        Ok(ShaderModuleId(handle))
    }

    /// Creates a bind group layout.
    pub fn create_bind_group_layout(
        &self,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<BindGroupLayoutId, ResourceError> {
        let record = factory::bind_group_layout_record(descriptor)?;
        let backend = &self.shared.backend;
        let handle = self.shared.registry().bind_group_layouts.insert_with(|handle| {
            backend.create_bind_group_layout(BindGroupLayoutId(handle), descriptor)?;
            Ok::<_, ResourceError>(record)
        })?;
        log::debug!(
            "Device: created bind group layout '{}' ({} entries)",
            label_of(&descriptor.label),
            descriptor.entries.len()
        );
        Ok(BindGroupLayoutId(handle))
    }

    /// Creates a pipeline layout.
    pub fn create_pipeline_layout(
        &self,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<PipelineLayoutId, ResourceError> {
        let mut registry = self.shared.registry();
        let record = factory::pipeline_layout_record(&registry, descriptor)?;
        let backend = &self.shared.backend;
        let handle = registry.pipeline_layouts.insert_with(|handle| {
            backend.create_pipeline_layout(PipelineLayoutId(handle), descriptor)?;
            Ok::<_, ResourceError>(record)
        })?;
        log::debug!("Device: created pipeline layout '{}'", label_of(&descriptor.label));
        Ok(PipelineLayoutId(handle))
    }

    /// Creates a bind group. Its entries must match the layout slot for slot.
    pub fn create_bind_group(&self, descriptor: &BindGroupDescriptor) -> Result<BindGroupId, ResourceError> {
        let mut registry = self.shared.registry();
        let record = factory::bind_group_record(&registry, descriptor)?;
        let backend = &self.shared.backend;
        let handle = registry.bind_groups.insert_with(|handle| {
            backend.create_bind_group(BindGroupId(handle), descriptor)?;
            Ok::<_, ResourceError>(record)
        })?;
        log::debug!("Device: created bind group '{}'", label_of(&descriptor.label));
        Ok(BindGroupId(handle))
    }

    /// Creates a render pipeline after cross-checking it against its shaders
    /// and layout.
    pub fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        let mut registry = self.shared.registry();
        let record = factory::render_pipeline_record(&registry, descriptor)?;
        let backend = &self.shared.backend;
        let handle = registry.render_pipelines.insert_with(|handle| {
            backend.create_render_pipeline(RenderPipelineId(handle), descriptor)?;
            Ok::<_, ResourceError>(record)
        })?;
        log::debug!("Device: created render pipeline '{}'", label_of(&descriptor.label));
        Ok(RenderPipelineId(handle))
    }

    /// Destroys an object now instead of at teardown. Destroying a texture
    /// also destroys its views. Destroying an object twice is a no-op.
    pub fn destroy(&self, resource: impl Into<AnyResource>) -> Result<(), ValidationError> {
        let resource = resource.into();
        let mut registry = self.shared.registry();
        if registry.is_frame_object(resource) {
            return Err(ValidationError::InvalidDescriptor {
                label: None,
                reason: format!("{resource:?} belongs to a surface frame"),
            });
        }
        let removed = registry.remove(resource);
        if removed.is_empty() {
            log::trace!("Device: {resource:?} is already destroyed");
            return Ok(());
        }
        self.shared.release(&removed);
        Ok(())
    }

    /// Starts recording a command buffer.
    pub fn create_command_buffer(&self, descriptor: &CommandBufferDescriptor) -> CommandRecorder {
        CommandRecorder::new(Arc::clone(&self.shared), descriptor)
    }

    /// Enqueues a finished command buffer. Returns once enqueued.
    ///
    /// The buffer's first-use state expectations are validated against the
    /// tracker and its final states committed, atomically. Creation-time
    /// mappings of referenced buffers are closed.
    pub fn submit(&self, commands: CommandBuffer) -> Result<(), RenderError> {
        self.shared.submit(commands)
    }

    /// Blocks until every enqueued operation has completed.
    pub fn wait(&self) -> Result<(), RenderError> {
        self.shared.wait_idle()
    }

    /// Waits for the queue, then copies `size` bytes of a buffer back.
    /// Requires `COPY_SRC` or `MAP_READ`.
    pub fn read_buffer(&self, buffer: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, RenderError> {
        {
            let registry = self.shared.registry();
            let record = registry.buffer(buffer)?;
            if !record.usage.intersects(BufferUsage::COPY_SRC | BufferUsage::MAP_READ) {
                return Err(ValidationError::MissingUsage {
                    resource: AnyResource::Buffer(buffer),
                    usage: "COPY_SRC or MAP_READ".to_string(),
                }
                .into());
            }
            check_range(record, offset, size)?;
        }
        self.wait()?;
        Ok(self.shared.backend.read_buffer(buffer, offset, size)?)
    }

    /// Waits for the queue, then copies one aspect of mip level 0 back,
    /// tightly packed in the texture's format. Requires `COPY_SRC`.
    pub fn read_texture(&self, texture: TextureId, aspect: ImageAspect) -> Result<Vec<u8>, RenderError> {
        {
            let registry = self.shared.registry();
            let record = registry.texture(texture)?;
            if !record.usage.contains(TextureUsage::COPY_SRC) {
                return Err(ValidationError::MissingUsage {
                    resource: AnyResource::Texture(texture),
                    usage: "COPY_SRC".to_string(),
                }
                .into());
            }
            let aspect_ok = match aspect {
                ImageAspect::All => !(record.format.has_depth() && record.format.has_stencil()),
                ImageAspect::DepthOnly => record.format.has_depth(),
                ImageAspect::StencilOnly => record.format.has_stencil(),
            };
            if !aspect_ok {
                return Err(ValidationError::InvalidDescriptor {
                    label: record.label.clone(),
                    reason: format!("cannot read aspect {aspect:?} of {:?}", record.format),
                }
                .into());
            }
        }
        self.wait()?;
        Ok(self.shared.backend.read_texture(texture, aspect)?)
    }

    /// Creates a presentation surface.
    pub fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<Surface, RenderError> {
        let backend = self.shared.backend.create_surface(descriptor)?;
        Surface::new(Arc::clone(&self.shared), backend, descriptor)
    }
}

fn check_range(record: &BufferRecord, offset: u64, size: u64) -> Result<(), ValidationError> {
    match offset.checked_add(size) {
        Some(end) if end <= record.size => Ok(()),
        _ => Err(ValidationError::OutOfBounds(format!(
            "bytes {offset}..{} of buffer '{}' ({} bytes)",
            offset.saturating_add(size),
            record.label.as_deref().unwrap_or("Unknown"),
            record.size
        ))),
    }
}
