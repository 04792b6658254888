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

//! Render pipeline descriptors.

use super::layout::PipelineLayoutId;
use super::state::*;
use crate::renderer::api::core::ShaderModuleId;
use crate::renderer::api::handle::lyra_handle;
use std::borrow::Cow;

lyra_handle! {
    /// An opaque handle to a compiled render pipeline state object.
    RenderPipelineId
}

/// The vertex stage: a vertex shader module and the buffers feeding it.
#[derive(Debug, Clone)]
pub struct VertexStateDescriptor<'a> {
    /// The vertex shader module. Its blob names the entry point.
    pub module: ShaderModuleId,
    /// Layouts of the vertex buffers, where position `i` is buffer slot `i`.
    pub buffers: Cow<'a, [VertexBufferLayoutDescriptor<'a>]>,
}

/// The fragment stage: a fragment shader module and its color targets.
#[derive(Debug, Clone)]
pub struct FragmentStateDescriptor<'a> {
    /// The fragment shader module. Its blob names the entry point.
    pub module: ShaderModuleId,
    /// Color targets, where position `i` is `@location(i)` of the output.
    pub targets: Cow<'a, [ColorTargetStateDescriptor]>,
}

/// A complete descriptor for a render pipeline.
///
/// This aggregates everything the GPU needs to turn vertices into fragments.
/// Every piece is validated against the others when the pipeline is created.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The pipeline layout.
    pub layout: PipelineLayoutId,
    /// Primitive assembly and rasterization.
    pub primitive: PrimitiveStateDescriptor,
    /// Depth and stencil testing. If `None`, the pipeline can only be used in
    /// passes without a depth-stencil attachment.
    pub depth_stencil: Option<DepthStencilStateDescriptor>,
    /// Multisampling.
    pub multisample: MultisampleStateDescriptor,
    /// The vertex stage.
    pub vertex: VertexStateDescriptor<'a>,
    /// The fragment stage, if any.
    pub fragment: Option<FragmentStateDescriptor<'a>>,
}
