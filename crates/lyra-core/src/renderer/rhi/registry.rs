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

//! The Resource Registry: every live object of a device, with the metadata
//! the core needs to validate later uses of it.

use super::arena::Arena;
use crate::math::Extent2D;
use crate::renderer::api::command::{BindGroupId, BindGroupLayoutEntry, BindGroupLayoutId};
use crate::renderer::api::core::{ShaderModuleId, ShaderReflection};
use crate::renderer::api::pipeline::{
    ColorTargetStateDescriptor, DepthStencilStateDescriptor, PipelineLayoutId, PrimitiveTopology,
    RenderPipelineId, VertexBufferLayoutDescriptor,
};
use crate::renderer::api::resource::{
    BufferDescriptor, BufferId, BufferUsage, ImageAspect, SamplerId, TextureDescriptor,
    TextureDimension, TextureId, TextureUsage, TextureViewDescriptor, TextureViewDimension,
    TextureViewId,
};
use crate::renderer::api::util::{IndexFormat, ShaderStage, TextureFormat, TextureSampleKind};
use crate::renderer::api::AnyResource;
use crate::renderer::error::ValidationError;

#[derive(Debug)]
pub(crate) struct BufferRecord {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
    pub mapped: bool,
}

/// Set on textures owned by a surface.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameInfo {
    pub suboptimal: bool,
}

#[derive(Debug)]
pub(crate) struct TextureRecord {
    pub label: Option<String>,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub array_layers: u32,
    pub mip_levels: u32,
    pub sample_count: u32,
    pub dimension: TextureDimension,
    pub usage: TextureUsage,
    pub views: Vec<TextureViewId>,
    pub frame: Option<FrameInfo>,
}

impl TextureRecord {
    pub fn from_descriptor(descriptor: &TextureDescriptor, frame: Option<FrameInfo>) -> Self {
        Self {
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            format: descriptor.format,
            width: descriptor.width,
            height: descriptor.height,
            depth: descriptor.depth,
            array_layers: descriptor.array_layers,
            mip_levels: descriptor.mip_levels,
            sample_count: descriptor.sample_count.count(),
            dimension: descriptor.dimension,
            usage: descriptor.usage,
            views: Vec::new(),
            frame,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TextureViewRecord {
    pub texture: TextureId,
    pub format: TextureFormat,
    pub dimension: TextureViewDimension,
    pub aspect: ImageAspect,
    pub extent: Extent2D,
    pub sample_count: u32,
    pub usage: TextureUsage,
}

impl TextureViewRecord {
    /// The sample kind a shader sees when it reads this view.
    pub fn sample_kind(&self) -> TextureSampleKind {
        match self.aspect {
            ImageAspect::StencilOnly => TextureSampleKind::Uint,
            ImageAspect::DepthOnly => TextureSampleKind::Depth,
            ImageAspect::All => self.format.sample_kind(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SamplerRecord {
    pub comparison: bool,
    pub filtering: bool,
}

#[derive(Debug)]
pub(crate) struct ShaderModuleRecord {
    pub label: Option<String>,
    pub entry_point: String,
    pub stage: ShaderStage,
    pub reflection: Option<ShaderReflection>,
}

#[derive(Debug)]
pub(crate) struct BindGroupLayoutRecord {
    pub label: Option<String>,
    pub entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayoutRecord {
    /// Dynamic-offset buffer slots, in binding order.
    pub fn dynamic_bindings(&self) -> impl Iterator<Item = &BindGroupLayoutEntry> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .filter(|e| {
                matches!(
                    e.ty,
                    crate::renderer::api::command::BindingType::Buffer {
                        has_dynamic_offset: true,
                        ..
                    }
                )
            })
            .collect();
        entries.sort_by_key(|e| e.binding);
        entries.into_iter()
    }
}

#[derive(Debug)]
pub(crate) struct PipelineLayoutRecord {
    pub label: Option<String>,
    pub bind_group_layouts: Vec<BindGroupLayoutId>,
}

/// A buffer slot bound with a dynamic offset.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DynamicBinding {
    pub buffer: BufferId,
    pub offset: u64,
    pub size: u64,
    pub buffer_size: u64,
}

#[derive(Debug)]
pub(crate) struct BindGroupRecord {
    pub label: Option<String>,
    pub layout: BindGroupLayoutId,
    pub dynamic: Vec<DynamicBinding>,
    pub sampled_textures: Vec<TextureId>,
    pub resources: Vec<AnyResource>,
}

#[derive(Debug)]
pub(crate) struct RenderPipelineRecord {
    pub label: Option<String>,
    pub bind_group_layouts: Vec<BindGroupLayoutId>,
    pub vertex_buffers: Vec<VertexBufferLayoutDescriptor<'static>>,
    pub color_targets: Vec<ColorTargetStateDescriptor>,
    pub depth_stencil: Option<DepthStencilStateDescriptor>,
    pub topology: PrimitiveTopology,
    pub strip_index_format: Option<IndexFormat>,
    pub sample_count: u32,
}

macro_rules! registry_lookup {
    ($($get:ident, $get_mut:ident: $arena:ident, $id:ident => $record:ident;)*) => {
        $(
            pub fn $get(&self, id: $id) -> Result<&$record, ValidationError> {
                self.$arena
                    .get(id.0)
                    .ok_or(ValidationError::StaleHandle(AnyResource::from(id)))
            }

            #[allow(dead_code)]
            pub fn $get_mut(&mut self, id: $id) -> Result<&mut $record, ValidationError> {
                self.$arena
                    .get_mut(id.0)
                    .ok_or(ValidationError::StaleHandle(AnyResource::from(id)))
            }
        )*
    };
}

/// One arena per object kind.
#[derive(Default)]
pub(crate) struct ResourceRegistry {
    pub buffers: Arena<BufferRecord>,
    pub textures: Arena<TextureRecord>,
    pub views: Arena<TextureViewRecord>,
    pub samplers: Arena<SamplerRecord>,
    pub shader_modules: Arena<ShaderModuleRecord>,
    pub bind_group_layouts: Arena<BindGroupLayoutRecord>,
    pub pipeline_layouts: Arena<PipelineLayoutRecord>,
    pub bind_groups: Arena<BindGroupRecord>,
    pub render_pipelines: Arena<RenderPipelineRecord>,
}

impl ResourceRegistry {
    registry_lookup! {
        buffer, buffer_mut: buffers, BufferId => BufferRecord;
        texture, texture_mut: textures, TextureId => TextureRecord;
        view, view_mut: views, TextureViewId => TextureViewRecord;
        sampler, sampler_mut: samplers, SamplerId => SamplerRecord;
        shader_module, shader_module_mut: shader_modules, ShaderModuleId => ShaderModuleRecord;
        bind_group_layout, bind_group_layout_mut: bind_group_layouts, BindGroupLayoutId => BindGroupLayoutRecord;
        pipeline_layout, pipeline_layout_mut: pipeline_layouts, PipelineLayoutId => PipelineLayoutRecord;
        bind_group, bind_group_mut: bind_groups, BindGroupId => BindGroupRecord;
        render_pipeline, render_pipeline_mut: render_pipelines, RenderPipelineId => RenderPipelineRecord;
    }

    pub fn contains(&self, resource: AnyResource) -> bool {
        match resource {
            AnyResource::Buffer(id) => self.buffers.contains(id.0),
            AnyResource::Texture(id) => self.textures.contains(id.0),
            AnyResource::TextureView(id) => self.views.contains(id.0),
            AnyResource::Sampler(id) => self.samplers.contains(id.0),
            AnyResource::ShaderModule(id) => self.shader_modules.contains(id.0),
            AnyResource::BindGroupLayout(id) => self.bind_group_layouts.contains(id.0),
            AnyResource::PipelineLayout(id) => self.pipeline_layouts.contains(id.0),
            AnyResource::BindGroup(id) => self.bind_groups.contains(id.0),
            AnyResource::RenderPipeline(id) => self.render_pipelines.contains(id.0),
        }
    }

    /// Total number of live objects of every kind.
    pub fn live_count(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.views.len()
            + self.samplers.len()
            + self.shader_modules.len()
            + self.bind_group_layouts.len()
            + self.pipeline_layouts.len()
            + self.bind_groups.len()
            + self.render_pipelines.len()
    }

    /// `true` if `resource` is a texture or view owned by a surface.
    pub fn is_frame_object(&self, resource: AnyResource) -> bool {
        let texture = match resource {
            AnyResource::Texture(id) => Some(id),
            AnyResource::TextureView(id) => self.views.get(id.0).map(|v| v.texture),
            _ => None,
        };
        texture
            .and_then(|id| self.textures.get(id.0))
            .is_some_and(|t| t.frame.is_some())
    }

    /// Removes an object, and the views of a texture. Returns what was
    /// actually removed, views first. A stale handle removes nothing.
    pub fn remove(&mut self, resource: AnyResource) -> Vec<AnyResource> {
        let mut removed = Vec::new();
        match resource {
            AnyResource::Buffer(id) => {
                if self.buffers.remove(id.0).is_some() {
                    removed.push(resource);
                }
            }
            AnyResource::Texture(id) => {
                if let Some(record) = self.textures.remove(id.0) {
                    for view in record.views {
                        if self.views.remove(view.0).is_some() {
                            removed.push(AnyResource::TextureView(view));
                        }
                    }
                    removed.push(resource);
                }
            }
            AnyResource::TextureView(id) => {
                if let Some(record) = self.views.remove(id.0) {
                    if let Some(texture) = self.textures.get_mut(record.texture.0) {
                        texture.views.retain(|v| *v != id);
                    }
                    removed.push(resource);
                }
            }
            AnyResource::Sampler(id) => {
                if self.samplers.remove(id.0).is_some() {
                    removed.push(resource);
                }
            }
            AnyResource::ShaderModule(id) => {
                if self.shader_modules.remove(id.0).is_some() {
                    removed.push(resource);
                }
            }
            AnyResource::BindGroupLayout(id) => {
                if self.bind_group_layouts.remove(id.0).is_some() {
                    removed.push(resource);
                }
            }
            AnyResource::PipelineLayout(id) => {
                if self.pipeline_layouts.remove(id.0).is_some() {
                    removed.push(resource);
                }
            }
            AnyResource::BindGroup(id) => {
                if self.bind_groups.remove(id.0).is_some() {
                    removed.push(resource);
                }
            }
            AnyResource::RenderPipeline(id) => {
                if self.render_pipelines.remove(id.0).is_some() {
                    removed.push(resource);
                }
            }
        }
        removed
    }

    /// Empties the registry, dependents first.
    pub fn drain_all(&mut self) -> Vec<AnyResource> {
        let mut all = Vec::with_capacity(self.live_count());
        all.extend(
            self.bind_groups
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::BindGroup(BindGroupId(h))),
        );
        all.extend(
            self.render_pipelines
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::RenderPipeline(RenderPipelineId(h))),
        );
        all.extend(
            self.pipeline_layouts
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::PipelineLayout(PipelineLayoutId(h))),
        );
        all.extend(
            self.bind_group_layouts
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::BindGroupLayout(BindGroupLayoutId(h))),
        );
        all.extend(
            self.shader_modules
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::ShaderModule(ShaderModuleId(h))),
        );
        all.extend(
            self.views
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::TextureView(TextureViewId(h))),
        );
        all.extend(
            self.samplers
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::Sampler(SamplerId(h))),
        );
        all.extend(
            self.textures
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::Texture(TextureId(h))),
        );
        all.extend(
            self.buffers
                .drain()
                .into_iter()
                .map(|(h, _)| AnyResource::Buffer(BufferId(h))),
        );
        all
    }
}

fn invalid(label: &Option<std::borrow::Cow<'_, str>>, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidDescriptor {
        label: label.as_ref().map(|l| l.to_string()),
        reason: reason.into(),
    }
}

/// Checks a buffer descriptor.
pub(crate) fn validate_buffer(descriptor: &BufferDescriptor) -> Result<(), ValidationError> {
    let label = &descriptor.label;
    if descriptor.size == 0 {
        return Err(invalid(label, "buffer size must be at least 1 byte"));
    }
    if descriptor.usage.is_empty() {
        return Err(invalid(label, "buffer usage must not be empty"));
    }
    if descriptor.mapped_at_creation && descriptor.size % 4 != 0 {
        return Err(invalid(
            label,
            format!(
                "a buffer mapped at creation must have a size multiple of 4, got {}",
                descriptor.size
            ),
        ));
    }
    let usage = descriptor.usage;
    if usage.contains(BufferUsage::MAP_READ)
        && !(usage & !(BufferUsage::MAP_READ | BufferUsage::COPY_DST)).is_empty()
    {
        return Err(invalid(label, "MAP_READ may only be combined with COPY_DST"));
    }
    if usage.contains(BufferUsage::MAP_WRITE)
        && !(usage & !(BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC)).is_empty()
    {
        return Err(invalid(label, "MAP_WRITE may only be combined with COPY_SRC"));
    }
    Ok(())
}

/// Checks a texture descriptor.
pub(crate) fn validate_texture(descriptor: &TextureDescriptor) -> Result<(), ValidationError> {
    let label = &descriptor.label;
    let d = descriptor;
    if d.width == 0 || d.height == 0 || d.depth == 0 || d.array_layers == 0 || d.mip_levels == 0 {
        return Err(invalid(
            label,
            "width, height, depth, array layers and mip levels must all be at least 1",
        ));
    }
    if d.depth > 1 && d.array_layers > 1 {
        return Err(invalid(label, "a texture cannot have both depth and array layers"));
    }
    if d.depth > 1 && d.dimension != TextureDimension::D3 {
        return Err(invalid(label, "only 3D textures may have a depth above 1"));
    }
    if d.dimension == TextureDimension::D1 && d.height != 1 {
        return Err(invalid(label, "1D textures must have a height of 1"));
    }
    if d.usage.is_empty() {
        return Err(invalid(label, "texture usage must not be empty"));
    }
    let largest = d.width.max(d.height).max(if d.dimension == TextureDimension::D3 {
        d.depth
    } else {
        1
    });
    let max_mips = 32 - largest.leading_zeros();
    if d.mip_levels > max_mips {
        return Err(invalid(
            label,
            format!("{} mip levels requested but at most {max_mips} fit", d.mip_levels),
        ));
    }
    if d.format.is_depth_stencil() && d.dimension != TextureDimension::D2 {
        return Err(invalid(label, "depth-stencil textures must be 2D"));
    }
    if d.sample_count.count() > 1 {
        if d.mip_levels != 1 || d.array_layers != 1 || d.dimension != TextureDimension::D2 {
            return Err(invalid(
                label,
                "multisampled textures must be 2D with one mip level and one layer",
            ));
        }
        if !d.usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            return Err(invalid(label, "multisampled textures must be render attachments"));
        }
    }
    Ok(())
}

/// Resolves every defaulted field of a view descriptor against its texture.
pub(crate) fn resolve_view<'a>(
    texture: &TextureRecord,
    descriptor: &TextureViewDescriptor<'a>,
) -> Result<TextureViewDescriptor<'a>, ValidationError> {
    let label = &descriptor.label;
    let format = descriptor.format.unwrap_or(texture.format);
    if format != texture.format {
        return Err(invalid(
            label,
            format!(
                "view format {format:?} differs from texture format {:?}",
                texture.format
            ),
        ));
    }
    match descriptor.aspect {
        ImageAspect::DepthOnly if !format.has_depth() => {
            return Err(invalid(label, format!("{format:?} has no depth aspect")));
        }
        ImageAspect::StencilOnly if !format.has_stencil() => {
            return Err(invalid(label, format!("{format:?} has no stencil aspect")));
        }
        _ => {}
    }

    let mip_count = descriptor
        .mip_level_count
        .unwrap_or(texture.mip_levels.saturating_sub(descriptor.base_mip_level));
    let mip_end = descriptor.base_mip_level.checked_add(mip_count);
    if mip_count == 0 || !mip_end.is_some_and(|end| end <= texture.mip_levels) {
        return Err(invalid(
            label,
            format!(
                "mip range {}..{} is outside the texture's {} levels",
                descriptor.base_mip_level,
                descriptor.base_mip_level.saturating_add(mip_count),
                texture.mip_levels
            ),
        ));
    }
    let layer_count = descriptor
        .array_layer_count
        .unwrap_or(texture.array_layers.saturating_sub(descriptor.base_array_layer));
    let layer_end = descriptor.base_array_layer.checked_add(layer_count);
    if layer_count == 0 || !layer_end.is_some_and(|end| end <= texture.array_layers) {
        return Err(invalid(
            label,
            format!(
                "layer range {}..{} is outside the texture's {} layers",
                descriptor.base_array_layer,
                descriptor.base_array_layer.saturating_add(layer_count),
                texture.array_layers
            ),
        ));
    }

    let dimension = descriptor.dimension.unwrap_or(match texture.dimension {
        TextureDimension::D1 => TextureViewDimension::D1,
        TextureDimension::D3 => TextureViewDimension::D3,
        TextureDimension::D2 if layer_count > 1 => TextureViewDimension::D2Array,
        TextureDimension::D2 => TextureViewDimension::D2,
    });
    let compatible = match (texture.dimension, dimension) {
        (TextureDimension::D1, TextureViewDimension::D1) => layer_count == 1,
        (TextureDimension::D3, TextureViewDimension::D3) => true,
        (TextureDimension::D2, TextureViewDimension::D2) => layer_count == 1,
        (TextureDimension::D2, TextureViewDimension::D2Array) => true,
        (TextureDimension::D2, TextureViewDimension::Cube) => layer_count == 6,
        (TextureDimension::D2, TextureViewDimension::CubeArray) => layer_count % 6 == 0,
        _ => false,
    };
    if !compatible {
        return Err(invalid(
            label,
            format!(
                "a {dimension:?} view of {layer_count} layer(s) cannot be made from a {:?} texture",
                texture.dimension
            ),
        ));
    }

    Ok(TextureViewDescriptor {
        label: descriptor.label.clone(),
        format: Some(format),
        dimension: Some(dimension),
        aspect: descriptor.aspect,
        base_mip_level: descriptor.base_mip_level,
        mip_level_count: Some(mip_count),
        base_array_layer: descriptor.base_array_layer,
        array_layer_count: Some(layer_count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::util::SampleCount;

    fn depth_texture() -> TextureDescriptor<'static> {
        TextureDescriptor::new_2d(
            "Depth",
            TextureFormat::Depth24PlusStencil8,
            64,
            32,
            TextureUsage::RENDER_ATTACHMENT,
        )
    }

    #[test]
    fn mapped_buffers_need_four_byte_sizes() {
        let desc = BufferDescriptor::new("Vertices", 6, BufferUsage::VERTEX).mapped();
        assert!(matches!(
            validate_buffer(&desc),
            Err(ValidationError::InvalidDescriptor { .. })
        ));
        let desc = BufferDescriptor::new("Vertices", 8, BufferUsage::VERTEX).mapped();
        assert!(validate_buffer(&desc).is_ok());
        let desc = BufferDescriptor::new("Readback", 8, BufferUsage::MAP_READ | BufferUsage::VERTEX);
        assert!(validate_buffer(&desc).is_err());
    }

    #[test]
    fn texture_extents_are_checked() {
        assert!(validate_texture(&depth_texture()).is_ok());

        let mut desc = depth_texture();
        desc.width = 0;
        assert!(validate_texture(&desc).is_err());

        let mut desc = depth_texture();
        desc.mip_levels = 8;
        assert!(validate_texture(&desc).is_err());

        let mut desc = TextureDescriptor::new_2d(
            "Volume",
            TextureFormat::Rgba8Unorm,
            4,
            4,
            TextureUsage::TEXTURE_BINDING,
        );
        desc.dimension = TextureDimension::D3;
        desc.depth = 4;
        assert!(validate_texture(&desc).is_ok());
        desc.array_layers = 2;
        assert!(validate_texture(&desc).is_err());

        let mut desc = depth_texture();
        desc.sample_count = SampleCount::X4;
        desc.mip_levels = 2;
        assert!(validate_texture(&desc).is_err());
    }

    #[test]
    fn views_resolve_their_defaults() {
        let record = TextureRecord::from_descriptor(&depth_texture(), None);
        let view = resolve_view(&record, &TextureViewDescriptor::default()).unwrap();
        assert_eq!(view.format, Some(TextureFormat::Depth24PlusStencil8));
        assert_eq!(view.dimension, Some(TextureViewDimension::D2));
        assert_eq!(view.mip_level_count, Some(1));

        let stencil = TextureViewDescriptor {
            aspect: ImageAspect::StencilOnly,
            ..Default::default()
        };
        assert!(resolve_view(&record, &stencil).is_ok());

        let out_of_range = TextureViewDescriptor {
            base_mip_level: 1,
            ..Default::default()
        };
        assert!(resolve_view(&record, &out_of_range).is_err());
    }

    #[test]
    fn destroying_a_texture_takes_its_views() {
        let mut registry = ResourceRegistry::default();
        let texture = TextureId(
            registry
                .textures
                .insert(TextureRecord::from_descriptor(&depth_texture(), None)),
        );
        let view = TextureViewId(registry.views.insert(TextureViewRecord {
            texture,
            format: TextureFormat::Depth24PlusStencil8,
            dimension: TextureViewDimension::D2,
            aspect: ImageAspect::All,
            extent: Extent2D::new(64, 32),
            sample_count: 1,
            usage: TextureUsage::RENDER_ATTACHMENT,
        }));
        registry.texture_mut(texture).unwrap().views.push(view);

        let removed = registry.remove(AnyResource::Texture(texture));
        assert_eq!(
            removed,
            [AnyResource::TextureView(view), AnyResource::Texture(texture)]
        );
        assert!(registry.remove(AnyResource::Texture(texture)).is_empty());
        assert_eq!(registry.live_count(), 0);
    }
}
