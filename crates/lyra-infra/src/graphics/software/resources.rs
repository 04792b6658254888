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

//! The native objects of the software backend, keyed by core ids.

use super::image::Image;
use super::kernel::{FragmentKernel, Kernel, SamplerState, VertexKernel};
use lyra_core::renderer::api::command::{BindGroupId, BindGroupLayoutEntry, BindGroupLayoutId, BindingResource};
use lyra_core::renderer::api::core::ShaderModuleId;
use lyra_core::renderer::api::pipeline::{
    ColorTargetStateDescriptor, DepthStencilStateDescriptor, PrimitiveStateDescriptor,
    RenderPipelineId, VertexBufferLayoutDescriptor,
};
use lyra_core::renderer::api::resource::{BufferId, SamplerId, TextureId, TextureViewId};
use lyra_core::renderer::api::AnyResource;
use std::collections::HashMap;
use std::sync::Arc;

/// The subresource a view selects.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ViewInfo {
    pub texture: TextureId,
    pub level: u32,
    pub layer: u32,
}

/// One bind group slot. `dynamic` slots take a dynamic offset at bind time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundEntry {
    pub binding: u32,
    pub resource: BindingResource,
    pub dynamic: bool,
}

/// Everything a draw needs from a pipeline.
pub(crate) struct PipelineState {
    pub label: String,
    pub vertex: VertexKernel,
    pub fragment: Option<FragmentKernel>,
    pub vertex_buffers: Vec<VertexBufferLayoutDescriptor<'static>>,
    pub primitive: PrimitiveStateDescriptor,
    pub depth_stencil: Option<DepthStencilStateDescriptor>,
    pub targets: Vec<ColorTargetStateDescriptor>,
}

#[derive(Default)]
pub(crate) struct Resources {
    pub buffers: HashMap<BufferId, Vec<u8>>,
    pub images: HashMap<TextureId, Image>,
    pub views: HashMap<TextureViewId, ViewInfo>,
    pub samplers: HashMap<SamplerId, SamplerState>,
    pub shaders: HashMap<ShaderModuleId, Kernel>,
    pub bind_group_layouts: HashMap<BindGroupLayoutId, Vec<BindGroupLayoutEntry>>,
    pub bind_groups: HashMap<BindGroupId, Vec<BoundEntry>>,
    pub pipelines: HashMap<RenderPipelineId, Arc<PipelineState>>,
}

impl Resources {
    /// Drops the native object behind `resource`. Returns `false` if there
    /// was none.
    pub fn release(&mut self, resource: AnyResource) -> bool {
        match resource {
            AnyResource::Buffer(id) => self.buffers.remove(&id).is_some(),
            AnyResource::Texture(id) => self.images.remove(&id).is_some(),
            AnyResource::TextureView(id) => self.views.remove(&id).is_some(),
            AnyResource::Sampler(id) => self.samplers.remove(&id).is_some(),
            AnyResource::ShaderModule(id) => self.shaders.remove(&id).is_some(),
            AnyResource::BindGroupLayout(id) => self.bind_group_layouts.remove(&id).is_some(),
            // Pipeline layouts have no software representation.
            AnyResource::PipelineLayout(_) => true,
            AnyResource::BindGroup(id) => self.bind_groups.remove(&id).is_some(),
            AnyResource::RenderPipeline(id) => self.pipelines.remove(&id).is_some(),
        }
    }
}
