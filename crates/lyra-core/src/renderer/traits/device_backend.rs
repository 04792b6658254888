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

use crate::renderer::api::command::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId, CommandBuffer,
    Signal,
};
use crate::renderer::api::core::{
    AdapterInfo, ShaderModuleDescriptor, ShaderModuleId, SurfaceConfiguration, SurfaceDescriptor,
};
use crate::renderer::api::pipeline::{
    PipelineLayoutDescriptor, PipelineLayoutId, RenderPipelineDescriptor, RenderPipelineId,
};
use crate::renderer::api::resource::{
    BufferDescriptor, BufferId, ImageAspect, SamplerDescriptor, SamplerId, TextureDescriptor,
    TextureId, TextureViewDescriptor, TextureViewId,
};
use crate::renderer::api::util::TextureFormat;
use crate::renderer::api::AnyResource;
use crate::renderer::error::{RenderError, ResourceError};
use std::fmt::Debug;

/// The seam between the RHI core and a native graphics API.
///
/// The core allocates every id, validates every descriptor and tracks every
/// resource state before calling into the backend. A backend only has to
/// create the native object behind an id it is given, and may assume the
/// descriptor is valid and the id unused.
pub trait DeviceBackend: Send + Sync + Debug + 'static {
    /// Describes the adapter the device runs on.
    fn adapter_info(&self) -> AdapterInfo;

    /// Creates the native buffer behind `id`.
    /// ## Errors
    /// * `ResourceError::OutOfMemory` - If the allocation fails.
    fn create_buffer(&self, id: BufferId, descriptor: &BufferDescriptor) -> Result<(), ResourceError>;

    /// Enqueues a write of `data` at `offset`. The write is ordered before any
    /// command buffer submitted afterwards.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Writes directly into the creation-time mapping of a buffer.
    fn write_mapped(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Closes the creation-time mapping of a buffer.
    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Creates the native texture behind `id`.
    fn create_texture(&self, id: TextureId, descriptor: &TextureDescriptor) -> Result<(), ResourceError>;

    /// Creates a view of `texture`. Every `Option` of the descriptor is already resolved.
    fn create_texture_view(
        &self,
        id: TextureViewId,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, id: SamplerId, descriptor: &SamplerDescriptor) -> Result<(), ResourceError>;

    /// Creates a shader module from a compiled blob.
    /// ## Errors
    /// * `ResourceError::Shader` - If the blob cannot be loaded by the native API.
    fn create_shader_module(
        &self,
        id: ShaderModuleId,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<(), ResourceError>;

    /// Creates a bind group layout.
    fn create_bind_group_layout(
        &self,
        id: BindGroupLayoutId,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<(), ResourceError>;

    /// Creates a pipeline layout.
    fn create_pipeline_layout(
        &self,
        id: PipelineLayoutId,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<(), ResourceError>;

    /// Creates a bind group.
    fn create_bind_group(&self, id: BindGroupId, descriptor: &BindGroupDescriptor) -> Result<(), ResourceError>;

    /// Creates a render pipeline.
    /// ## Errors
    /// * `ResourceError::Pipeline` - If the native API rejects the pipeline.
    fn create_render_pipeline(
        &self,
        id: RenderPipelineId,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<(), ResourceError>;

    /// Releases a native object. Called exactly once per created object.
    fn release(&self, resource: AnyResource);

    /// Enqueues a finished command buffer. Returns once enqueued.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the queue can no longer accept work.
    fn submit(&self, commands: &CommandBuffer) -> Result<(), RenderError>;

    /// Blocks until every enqueued operation has completed.
    fn wait_idle(&self) -> Result<(), RenderError>;

    /// Copies `size` bytes of a buffer back to the CPU. Called after `wait_idle`.
    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError>;

    /// Copies one aspect of mip level 0, layer 0 of a texture back to the CPU,
    /// tightly packed. Called after `wait_idle`.
    fn read_texture(&self, id: TextureId, aspect: ImageAspect) -> Result<Vec<u8>, ResourceError>;

    /// Creates the native swapchain of a surface.
    /// ## Errors
    /// * `RenderError::SurfaceAcquisitionFailed` - If the target cannot be presented to.
    fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<Box<dyn SurfaceBackend>, RenderError>;
}

/// The native side of a presentation surface.
pub trait SurfaceBackend: Send + Debug {
    /// The swapchain image format.
    fn format(&self) -> TextureFormat;

    /// (Re)creates the swapchain with the given configuration.
    fn configure(&mut self, config: &SurfaceConfiguration) -> Result<(), RenderError>;

    /// Acquires the next image and binds it to the given texture and view ids.
    ///
    /// `available` must be set once the image can be written. Returns `true`
    /// when the image is suboptimal: it must not be rendered to, and may not
    /// be backed by a native image at all.
    fn acquire(
        &mut self,
        texture: TextureId,
        view: TextureViewId,
        available: &Signal,
    ) -> Result<bool, RenderError>;

    /// Presents the image bound to `texture` once `complete` is set, then unbinds it.
    fn present(&mut self, texture: TextureId, complete: &Signal) -> Result<(), RenderError>;

    /// Returns the image bound to `texture` to the swapchain without presenting it.
    fn discard(&mut self, texture: TextureId);
}
