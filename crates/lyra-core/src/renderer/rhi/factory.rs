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

//! Static checks of the Pipeline Factory.
//!
//! Every join of the chain shader module -> bind group layout -> pipeline
//! layout -> render pipeline (and bind group -> layout) is checked here,
//! at creation time. Each function returns the registry record of the new
//! object, so nothing is registered unless every check passed.

use super::registry::{
    BindGroupLayoutRecord, BindGroupRecord, DynamicBinding, PipelineLayoutRecord,
    RenderPipelineRecord, ResourceRegistry, ShaderModuleRecord,
};
use crate::renderer::api::command::{
    BindGroupDescriptor, BindGroupLayoutDescriptor, BindingResource, BindingType,
    BufferBindingType, SamplerBindingType, TextureSampleType,
};
use crate::renderer::api::core::{ReflectedBindingType, ShaderModuleDescriptor};
use crate::renderer::api::pipeline::{
    ColorWrites, PipelineLayoutDescriptor, RenderPipelineDescriptor, ScalarKind, MAX_BIND_GROUPS,
};
use crate::renderer::api::resource::{BufferUsage, TextureUsage};
use crate::renderer::api::util::{ShaderStage, ShaderStageFlags, TextureFormat, TextureSampleKind};
use crate::renderer::api::AnyResource;
use crate::renderer::error::{PipelineError, ResourceError, ShaderError, ValidationError};
use std::borrow::Cow;
use std::collections::HashSet;

/// Alignment of bind group buffer offsets, static and dynamic.
pub const BUFFER_OFFSET_ALIGNMENT: u64 = 256;

/// Largest vertex buffer stride a pipeline may declare.
pub const MAX_VERTEX_BUFFER_STRIDE: u64 = 2048;

fn owned(label: &Option<Cow<'_, str>>) -> Option<String> {
    label.as_ref().map(|l| l.to_string())
}

fn bind_group_mismatch(label: &Option<Cow<'_, str>>, reason: impl Into<String>) -> ValidationError {
    ValidationError::BindGroupMismatch {
        label: owned(label),
        reason: reason.into(),
    }
}

pub(crate) fn shader_module_record(
    descriptor: &ShaderModuleDescriptor,
) -> Result<ShaderModuleRecord, ResourceError> {
    let blob = descriptor.blob;
    if blob.entry_point.is_empty() {
        return Err(ValidationError::InvalidDescriptor {
            label: owned(&descriptor.label),
            reason: "shader blob has no entry point name".to_string(),
        }
        .into());
    }
    if blob.size() == 0 {
        return Err(ShaderError::EmptyBlob {
            entry_point: blob.entry_point.clone(),
        }
        .into());
    }
    Ok(ShaderModuleRecord {
        label: owned(&descriptor.label),
        entry_point: blob.entry_point.clone(),
        stage: blob.stage,
        reflection: blob.reflection.clone(),
    })
}

pub(crate) fn bind_group_layout_record(
    descriptor: &BindGroupLayoutDescriptor,
) -> Result<BindGroupLayoutRecord, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidDescriptor {
        label: owned(&descriptor.label),
        reason,
    };
    let mut seen = HashSet::new();
    for entry in descriptor.entries {
        if !seen.insert(entry.binding) {
            return Err(invalid(format!("binding {} is declared twice", entry.binding)));
        }
        if entry.visibility.is_empty() {
            return Err(invalid(format!("binding {} is visible to no stage", entry.binding)));
        }
        if let BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only: false },
            ..
        } = entry.ty
        {
            if entry.visibility.contains(ShaderStageFlags::VERTEX) {
                return Err(invalid(format!(
                    "writable storage buffer at binding {} cannot be visible to the vertex stage",
                    entry.binding
                )));
            }
        }
    }
    Ok(BindGroupLayoutRecord {
        label: owned(&descriptor.label),
        entries: descriptor.entries.to_vec(),
    })
}

pub(crate) fn pipeline_layout_record(
    registry: &ResourceRegistry,
    descriptor: &PipelineLayoutDescriptor,
) -> Result<PipelineLayoutRecord, ValidationError> {
    if descriptor.bind_group_layouts.len() > MAX_BIND_GROUPS {
        return Err(ValidationError::InvalidDescriptor {
            label: owned(&descriptor.label),
            reason: format!(
                "{} bind group layouts given, at most {MAX_BIND_GROUPS} are allowed",
                descriptor.bind_group_layouts.len()
            ),
        });
    }
    for layout in descriptor.bind_group_layouts {
        registry.bind_group_layout(*layout)?;
    }
    Ok(PipelineLayoutRecord {
        label: owned(&descriptor.label),
        bind_group_layouts: descriptor.bind_group_layouts.to_vec(),
    })
}

fn texture_sample_type_accepts(layout: TextureSampleType, view: TextureSampleKind) -> bool {
    match layout {
        TextureSampleType::Float { filterable: true } => view == TextureSampleKind::Float,
        TextureSampleType::Float { filterable: false } => {
            matches!(view, TextureSampleKind::Float | TextureSampleKind::Depth)
        }
        TextureSampleType::Depth => view == TextureSampleKind::Depth,
        TextureSampleType::Uint => view == TextureSampleKind::Uint,
        TextureSampleType::Sint => view == TextureSampleKind::Sint,
    }
}

/// Checks a bind group against its layout: same entry count, same binding
/// indices, same resource kinds, and resources fit for their slots.
pub(crate) fn bind_group_record(
    registry: &ResourceRegistry,
    descriptor: &BindGroupDescriptor,
) -> Result<BindGroupRecord, ValidationError> {
    let label = &descriptor.label;
    let layout = registry.bind_group_layout(descriptor.layout)?;

    if descriptor.entries.len() != layout.entries.len() {
        return Err(bind_group_mismatch(
            label,
            format!(
                "{} entries given but the layout declares {}",
                descriptor.entries.len(),
                layout.entries.len()
            ),
        ));
    }

    let mut seen = HashSet::new();
    let mut dynamic = Vec::new();
    let mut sampled_textures = Vec::new();
    let mut resources = Vec::new();

    for entry in descriptor.entries {
        if !seen.insert(entry.binding) {
            return Err(bind_group_mismatch(
                label,
                format!("binding {} is given twice", entry.binding),
            ));
        }
        let slot = layout
            .entries
            .iter()
            .find(|e| e.binding == entry.binding)
            .ok_or_else(|| {
                bind_group_mismatch(
                    label,
                    format!("binding {} does not exist in the layout", entry.binding),
                )
            })?;

        match (slot.ty, entry.resource) {
            (
                BindingType::Buffer {
                    ty,
                    has_dynamic_offset,
                    min_binding_size,
                },
                BindingResource::Buffer(binding),
            ) => {
                let buffer = registry.buffer(binding.buffer)?;
                let required = match ty {
                    BufferBindingType::Uniform => BufferUsage::UNIFORM,
                    BufferBindingType::Storage { .. } => BufferUsage::STORAGE,
                };
                if !buffer.usage.contains(required) {
                    return Err(ValidationError::MissingUsage {
                        resource: AnyResource::Buffer(binding.buffer),
                        usage: format!("{required:?}"),
                    });
                }
                if binding.offset % BUFFER_OFFSET_ALIGNMENT != 0 {
                    return Err(bind_group_mismatch(
                        label,
                        format!(
                            "offset {} of binding {} is not a multiple of {BUFFER_OFFSET_ALIGNMENT}",
                            binding.offset, entry.binding
                        ),
                    ));
                }
                let size = match binding.size {
                    Some(size) => size.get(),
                    None => buffer.size.saturating_sub(binding.offset),
                };
                let fits = binding
                    .offset
                    .checked_add(size)
                    .is_some_and(|end| end <= buffer.size);
                if size == 0 || !fits {
                    return Err(ValidationError::OutOfBounds(format!(
                        "binding {} covers bytes {}..{} of a {}-byte buffer",
                        entry.binding,
                        binding.offset,
                        binding.offset.saturating_add(size),
                        buffer.size
                    )));
                }
                if let Some(min) = min_binding_size {
                    if size < min.get() {
                        return Err(bind_group_mismatch(
                            label,
                            format!(
                                "binding {} is {size} bytes but the layout requires at least {min}",
                                entry.binding
                            ),
                        ));
                    }
                }
                if has_dynamic_offset {
                    dynamic.push((
                        entry.binding,
                        DynamicBinding {
                            buffer: binding.buffer,
                            offset: binding.offset,
                            size,
                            buffer_size: buffer.size,
                        },
                    ));
                }
                resources.push(AnyResource::Buffer(binding.buffer));
            }
            (
                BindingType::Texture {
                    sample_type,
                    view_dimension,
                    multisampled,
                },
                BindingResource::TextureView(view_id),
            ) => {
                let view = registry.view(view_id)?;
                if !view.usage.contains(TextureUsage::TEXTURE_BINDING) {
                    return Err(ValidationError::MissingUsage {
                        resource: AnyResource::Texture(view.texture),
                        usage: "TEXTURE_BINDING".to_string(),
                    });
                }
                if view.format.has_depth()
                    && view.format.has_stencil()
                    && view.aspect == crate::renderer::api::resource::ImageAspect::All
                {
                    return Err(bind_group_mismatch(
                        label,
                        format!(
                            "binding {} needs a single-aspect view of {:?}",
                            entry.binding, view.format
                        ),
                    ));
                }
                if view.dimension != view_dimension {
                    return Err(bind_group_mismatch(
                        label,
                        format!(
                            "binding {} expects a {view_dimension:?} view, got {:?}",
                            entry.binding, view.dimension
                        ),
                    ));
                }
                if !texture_sample_type_accepts(sample_type, view.sample_kind()) {
                    return Err(bind_group_mismatch(
                        label,
                        format!(
                            "binding {} expects {sample_type:?} samples, the view gives {:?}",
                            entry.binding,
                            view.sample_kind()
                        ),
                    ));
                }
                if multisampled != (view.sample_count > 1) {
                    return Err(bind_group_mismatch(
                        label,
                        format!("binding {} disagrees on multisampling", entry.binding),
                    ));
                }
                sampled_textures.push(view.texture);
                resources.push(AnyResource::TextureView(view_id));
            }
            (BindingType::Sampler(ty), BindingResource::Sampler(sampler_id)) => {
                let sampler = registry.sampler(sampler_id)?;
                let accepted = match ty {
                    SamplerBindingType::Filtering => !sampler.comparison,
                    SamplerBindingType::NonFiltering => !sampler.comparison && !sampler.filtering,
                    SamplerBindingType::Comparison => sampler.comparison,
                };
                if !accepted {
                    return Err(bind_group_mismatch(
                        label,
                        format!("sampler at binding {} is not a {ty:?} sampler", entry.binding),
                    ));
                }
                resources.push(AnyResource::Sampler(sampler_id));
            }
            (expected, given) => {
                return Err(bind_group_mismatch(
                    label,
                    format!(
                        "binding {} expects a {} but a {} was given",
                        entry.binding,
                        expected.kind_name(),
                        given.kind_name()
                    ),
                ));
            }
        }
    }

    dynamic.sort_by_key(|(binding, _)| *binding);
    Ok(BindGroupRecord {
        label: owned(label),
        layout: descriptor.layout,
        dynamic: dynamic.into_iter().map(|(_, d)| d).collect(),
        sampled_textures,
        resources,
    })
}

fn reflected_matches_layout(reflected: ReflectedBindingType, layout: BindingType) -> bool {
    match (reflected, layout) {
        (ReflectedBindingType::Buffer(shader), BindingType::Buffer { ty, .. }) => shader == ty,
        (
            ReflectedBindingType::Texture {
                sample_kind,
                dimension,
                multisampled,
            },
            BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled: layout_multisampled,
            },
        ) => {
            let kind_ok = match sample_kind {
                TextureSampleKind::Float => matches!(sample_type, TextureSampleType::Float { .. }),
                TextureSampleKind::Depth => sample_type == TextureSampleType::Depth,
                TextureSampleKind::Uint => sample_type == TextureSampleType::Uint,
                TextureSampleKind::Sint => sample_type == TextureSampleType::Sint,
            };
            kind_ok && dimension == view_dimension && multisampled == layout_multisampled
        }
        (shader @ ReflectedBindingType::Sampler { .. }, BindingType::Sampler(ty)) => {
            shader.accepts_sampler(ty)
        }
        _ => false,
    }
}

fn output_kind(format: TextureFormat) -> ScalarKind {
    match format.sample_kind() {
        TextureSampleKind::Uint => ScalarKind::Uint,
        TextureSampleKind::Sint => ScalarKind::Sint,
        _ => ScalarKind::Float,
    }
}

fn is_blendable(format: TextureFormat) -> bool {
    !matches!(
        format,
        TextureFormat::R32Uint
            | TextureFormat::R32Float
            | TextureFormat::Rg32Float
            | TextureFormat::Rgba32Float
    )
}

/// Cross-checks a render pipeline against its shaders and layout.
pub(crate) fn render_pipeline_record(
    registry: &ResourceRegistry,
    descriptor: &RenderPipelineDescriptor,
) -> Result<RenderPipelineRecord, ResourceError> {
    let pipeline_label = owned(&descriptor.label);
    let layout = registry.pipeline_layout(descriptor.layout)?;

    // Stages
    let vertex = registry
        .shader_module(descriptor.vertex.module)
        .map_err(|_| PipelineError::InvalidShaderModuleForPipeline {
            id: descriptor.vertex.module,
            pipeline_label: pipeline_label.clone(),
        })?;
    if vertex.stage != ShaderStage::Vertex {
        return Err(PipelineError::StageMismatch {
            pipeline_label,
            expected: ShaderStage::Vertex,
            found: vertex.stage,
        }
        .into());
    }
    let fragment = match &descriptor.fragment {
        Some(state) => {
            let module = registry.shader_module(state.module).map_err(|_| {
                PipelineError::InvalidShaderModuleForPipeline {
                    id: state.module,
                    pipeline_label: pipeline_label.clone(),
                }
            })?;
            if module.stage != ShaderStage::Fragment {
                return Err(PipelineError::StageMismatch {
                    pipeline_label,
                    expected: ShaderStage::Fragment,
                    found: module.stage,
                }
                .into());
            }
            Some((state, module))
        }
        None => None,
    };

    // Vertex buffers
    let mut locations = HashSet::new();
    for (slot, buffer) in descriptor.vertex.buffers.iter().enumerate() {
        if buffer.array_stride > MAX_VERTEX_BUFFER_STRIDE || buffer.array_stride % 4 != 0 {
            return Err(ValidationError::InvalidDescriptor {
                label: pipeline_label.clone(),
                reason: format!(
                    "vertex buffer {slot} has stride {}, it must be a multiple of 4 up to {MAX_VERTEX_BUFFER_STRIDE}",
                    buffer.array_stride
                ),
            }
            .into());
        }
        for attribute in buffer.attributes.iter() {
            if !locations.insert(attribute.shader_location) {
                return Err(PipelineError::VertexInputMismatch {
                    pipeline_label,
                    location: attribute.shader_location,
                    reason: "location is fed by more than one attribute".to_string(),
                }
                .into());
            }
            let end = attribute.offset.checked_add(attribute.format.size());
            let alignment = attribute.format.component_size().min(4);
            if attribute.offset % alignment != 0
                || end.is_none()
                || (buffer.array_stride != 0 && end.is_some_and(|end| end > buffer.array_stride))
            {
                return Err(PipelineError::VertexInputMismatch {
                    pipeline_label,
                    location: attribute.shader_location,
                    reason: format!(
                        "{:?} at offset {} does not fit a stride of {}",
                        attribute.format, attribute.offset, buffer.array_stride
                    ),
                }
                .into());
            }
        }
    }

    // Vertex attributes must cover the shader inputs.
    if let Some(reflection) = &vertex.reflection {
        for input in &reflection.inputs {
            let attribute = descriptor
                .vertex
                .buffers
                .iter()
                .flat_map(|b| b.attributes.iter())
                .find(|a| a.shader_location == input.location)
                .ok_or_else(|| PipelineError::VertexInputMismatch {
                    pipeline_label: pipeline_label.clone(),
                    location: input.location,
                    reason: "the shader reads it but no vertex attribute provides it".to_string(),
                })?;
            if attribute.format.scalar_kind() != input.kind {
                return Err(PipelineError::VertexInputMismatch {
                    pipeline_label,
                    location: input.location,
                    reason: format!(
                        "the shader expects {:?} values, the attribute is {:?}",
                        input.kind, attribute.format
                    ),
                }
                .into());
            }
        }
    }

    // Bind slots used by each stage must exist in the layout.
    let stages = std::iter::once((ShaderStage::Vertex, vertex))
        .chain(fragment.map(|(_, module)| (ShaderStage::Fragment, module)));
    for (stage, module) in stages {
        let Some(reflection) = &module.reflection else {
            continue;
        };
        for reflected in &reflection.bindings {
            let mismatch = |reason: String| PipelineError::BindSlotMismatch {
                pipeline_label: pipeline_label.clone(),
                group: reflected.group,
                binding: reflected.binding,
                reason,
            };
            let group_layout = layout
                .bind_group_layouts
                .get(reflected.group as usize)
                .ok_or_else(|| {
                    mismatch(format!(
                        "the layout has only {} bind group(s)",
                        layout.bind_group_layouts.len()
                    ))
                })?;
            let group_layout = registry.bind_group_layout(*group_layout)?;
            let entry = group_layout
                .entries
                .iter()
                .find(|e| e.binding == reflected.binding)
                .ok_or_else(|| mismatch("the bind group layout has no such binding".to_string()))?;
            if !reflected_matches_layout(reflected.ty, entry.ty) {
                return Err(mismatch(format!(
                    "the shader declares {:?}, the layout {:?}",
                    reflected.ty, entry.ty
                ))
                .into());
            }
            if !entry.visibility.contains_stage(stage) {
                return Err(mismatch(format!("the binding is not visible to the {stage:?} stage")).into());
            }
        }
    }

    // Depth-stencil state
    if let Some(ds) = &descriptor.depth_stencil {
        if !ds.format.is_depth_stencil() {
            return Err(PipelineError::IncompatibleDepthStencilFormat(format!(
                "{:?} is not a depth or stencil format",
                ds.format
            ))
            .into());
        }
        let uses_stencil = ds.is_stencil_enabled() && (ds.stencil_read_mask != 0 || ds.writes_stencil());
        if uses_stencil && !ds.format.has_stencil() {
            return Err(PipelineError::IncompatibleDepthStencilFormat(format!(
                "stencil state is set but {:?} has no stencil aspect",
                ds.format
            ))
            .into());
        }
        let uses_depth = ds.depth_write_enabled
            || ds.depth_compare != crate::renderer::api::pipeline::CompareFunction::Always;
        if uses_depth && !ds.format.has_depth() {
            return Err(PipelineError::IncompatibleDepthStencilFormat(format!(
                "depth state is set but {:?} has no depth aspect",
                ds.format
            ))
            .into());
        }
    }

    // Color targets
    let color_targets = match fragment {
        Some((state, module)) => {
            for (index, target) in state.targets.iter().enumerate() {
                if target.format.is_depth_stencil() {
                    return Err(PipelineError::IncompatibleColorTarget(format!(
                        "target {index} uses depth-stencil format {:?}",
                        target.format
                    ))
                    .into());
                }
                if target.blend.is_some() && !is_blendable(target.format) {
                    return Err(PipelineError::IncompatibleColorTarget(format!(
                        "target {index} format {:?} cannot be blended",
                        target.format
                    ))
                    .into());
                }
                if !(target.write_mask & !ColorWrites::ALL).is_empty() {
                    return Err(PipelineError::IncompatibleColorTarget(format!(
                        "target {index} write mask has unknown bits"
                    ))
                    .into());
                }
            }
            if let Some(reflection) = &module.reflection {
                if reflection.outputs.len() != state.targets.len() {
                    return Err(PipelineError::IncompatibleColorTarget(format!(
                        "the fragment shader writes {} output(s) but {} target(s) are declared",
                        reflection.outputs.len(),
                        state.targets.len()
                    ))
                    .into());
                }
                for output in &reflection.outputs {
                    let target = state.targets.get(output.location as usize).ok_or_else(|| {
                        PipelineError::IncompatibleColorTarget(format!(
                            "no target for fragment output @location({})",
                            output.location
                        ))
                    })?;
                    if output_kind(target.format) != output.kind {
                        return Err(PipelineError::IncompatibleColorTarget(format!(
                            "output @location({}) is {:?} but the target is {:?}",
                            output.location, output.kind, target.format
                        ))
                        .into());
                    }
                }
            }
            state.targets.to_vec()
        }
        None => Vec::new(),
    };

    if descriptor.primitive.strip_index_format.is_some() && !descriptor.primitive.topology.is_strip() {
        return Err(ValidationError::InvalidDescriptor {
            label: pipeline_label,
            reason: "strip_index_format is only valid for strip topologies".to_string(),
        }
        .into());
    }

    Ok(RenderPipelineRecord {
        label: pipeline_label,
        bind_group_layouts: layout.bind_group_layouts.clone(),
        vertex_buffers: descriptor
            .vertex
            .buffers
            .iter()
            .cloned()
            .map(|b| b.into_owned())
            .collect(),
        color_targets,
        depth_stencil: descriptor.depth_stencil.clone(),
        topology: descriptor.primitive.topology,
        strip_index_format: descriptor.primitive.strip_index_format,
        sample_count: descriptor.multisample.count.count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::command::{BindGroupEntry, BindGroupLayoutEntry};
    use crate::renderer::api::resource::BufferId;
    use crate::renderer::rhi::registry::{BufferRecord, SamplerRecord};
    use crate::renderer::api::resource::SamplerId;

    struct Fixture {
        registry: ResourceRegistry,
        layout: crate::renderer::api::command::BindGroupLayoutId,
        uniform: BufferId,
        sampler: SamplerId,
    }

    fn fixture() -> Fixture {
        let mut registry = ResourceRegistry::default();
        let entries = [
            BindGroupLayoutEntry::uniform_buffer(0, ShaderStageFlags::VERTEX),
            BindGroupLayoutEntry::sampler(1, ShaderStageFlags::FRAGMENT, SamplerBindingType::Filtering),
        ];
        let record = bind_group_layout_record(&BindGroupLayoutDescriptor {
            label: Some("Camera".into()),
            entries: &entries,
        })
        .unwrap();
        let layout = crate::renderer::api::command::BindGroupLayoutId(
            registry.bind_group_layouts.insert(record),
        );
        let uniform = BufferId(registry.buffers.insert(BufferRecord {
            label: Some("MVP".into()),
            size: 64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            mapped: false,
        }));
        let sampler = SamplerId(registry.samplers.insert(SamplerRecord {
            comparison: false,
            filtering: true,
        }));
        Fixture {
            registry,
            layout,
            uniform,
            sampler,
        }
    }

    fn create(f: &Fixture, entries: &[BindGroupEntry]) -> Result<BindGroupRecord, ValidationError> {
        bind_group_record(
            &f.registry,
            &BindGroupDescriptor {
                label: Some("Camera Group".into()),
                layout: f.layout,
                entries,
            },
        )
    }

    #[test]
    fn matching_entries_are_accepted() {
        let f = fixture();
        let record = create(
            &f,
            &[
                BindGroupEntry::whole_buffer(0, f.uniform),
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(f.sampler),
                },
            ],
        )
        .unwrap();
        assert_eq!(record.resources.len(), 2);
    }

    #[test]
    fn missing_extra_and_wrong_kind_entries_are_rejected() {
        let f = fixture();
        let missing = create(&f, &[BindGroupEntry::whole_buffer(0, f.uniform)]);
        assert!(matches!(missing, Err(ValidationError::BindGroupMismatch { .. })));

        let renumbered = create(
            &f,
            &[
                BindGroupEntry::whole_buffer(0, f.uniform),
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(f.sampler),
                },
            ],
        );
        assert!(matches!(renumbered, Err(ValidationError::BindGroupMismatch { .. })));

        let swapped = create(
            &f,
            &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Sampler(f.sampler),
                },
                BindGroupEntry::whole_buffer(1, f.uniform),
            ],
        );
        match swapped {
            Err(ValidationError::BindGroupMismatch { reason, .. }) => {
                assert_eq!(reason, "binding 0 expects a buffer but a sampler was given")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn duplicate_layout_bindings_are_rejected() {
        let entries = [
            BindGroupLayoutEntry::uniform_buffer(0, ShaderStageFlags::VERTEX),
            BindGroupLayoutEntry::uniform_buffer(0, ShaderStageFlags::FRAGMENT),
        ];
        let result = bind_group_layout_record(&BindGroupLayoutDescriptor {
            label: None,
            entries: &entries,
        });
        assert!(result.is_err());
    }
}
