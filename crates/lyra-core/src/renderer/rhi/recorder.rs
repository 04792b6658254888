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

//! The Command Recorder.
//!
//! Commands are validated as they are recorded, against a local overlay of
//! resource states that starts from the tracker. The overlay remembers the
//! state each resource was first seen in and the state it ends up in; the
//! device checks and applies both, atomically, when the buffer is submitted.

use super::device::DeviceShared;
use super::factory::BUFFER_OFFSET_ALIGNMENT;
use super::registry::ResourceRegistry;
use crate::math::Extent2D;
use crate::renderer::api::command::{
    BarrierSync, BindGroupId, Command, CommandBuffer, CommandBufferDescriptor, LoadOp, QueueType,
    RenderPassCommand, RenderPassDepthStencilAttachment, RenderPassDescriptor, ScissorRect, Signal,
    Viewport,
};
use crate::renderer::api::pipeline::{RenderPipelineId, VertexStepMode, MAX_BIND_GROUPS};
use crate::renderer::api::resource::{
    BufferId, BufferUsage, ResourceState, StateRequirement, StateTransition, TextureId,
    TextureUsage,
};
use crate::renderer::api::util::{IndexFormat, TextureFormat};
use crate::renderer::api::{AnyResource, ResourceId};
use crate::renderer::error::{RenderError, ValidationError};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct LocalState {
    expected: ResourceState,
    current: ResourceState,
}

#[derive(Debug)]
struct PassState {
    extent: Extent2D,
    color_formats: Vec<TextureFormat>,
    depth_format: Option<TextureFormat>,
    depth_read_only: bool,
    stencil_read_only: bool,
    sample_count: u32,
    pipeline: Option<RenderPipelineId>,
    bind_groups: [Option<BindGroupId>; MAX_BIND_GROUPS],
    vertex_buffers: HashMap<u32, (BufferId, u64)>,
    index_buffer: Option<(BufferId, IndexFormat, u64)>,
}

fn order(msg: impl Into<String>) -> ValidationError {
    ValidationError::RecordingOrder(msg.into())
}

/// Records commands into a [`CommandBuffer`].
///
/// Obtained from [`Device::create_command_buffer`](super::Device::create_command_buffer).
/// Every method validates its command before recording it; a rejected
/// command leaves the recording unchanged. `submit` consumes the recorder.
pub struct CommandRecorder {
    device: Arc<DeviceShared>,
    label: Option<String>,
    queue: QueueType,
    commands: Vec<Command>,
    states: HashMap<ResourceId, LocalState>,
    first_use: Vec<ResourceId>,
    referenced: Vec<AnyResource>,
    referenced_set: HashSet<AnyResource>,
    waits: HashSet<u64>,
    signals: HashSet<u64>,
    pass: Option<PassState>,
}

impl fmt::Debug for CommandRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRecorder")
            .field("label", &self.label)
            .field("queue", &self.queue)
            .field("commands", &self.commands.len())
            .field("in_render_pass", &self.pass.is_some())
            .finish()
    }
}

impl CommandRecorder {
    pub(crate) fn new(device: Arc<DeviceShared>, descriptor: &CommandBufferDescriptor) -> Self {
        Self {
            device,
            label: descriptor.label.as_ref().map(|l| l.to_string()),
            queue: descriptor.queue,
            commands: Vec::new(),
            states: HashMap::new(),
            first_use: Vec::new(),
            referenced: Vec::new(),
            referenced_set: HashSet::new(),
            waits: HashSet::new(),
            signals: HashSet::new(),
            pass: None,
        }
    }

    /// The state `resource` will be in at this point of the recording.
    fn state_of(&mut self, resource: ResourceId) -> Result<ResourceState, ValidationError> {
        if let Some(local) = self.states.get(&resource) {
            return Ok(local.current);
        }
        let tracked = self
            .device
            .tracker
            .current(resource)
            .ok_or(ValidationError::StaleHandle(resource.into()))?;
        self.states.insert(
            resource,
            LocalState {
                expected: tracked,
                current: tracked,
            },
        );
        self.first_use.push(resource);
        Ok(tracked)
    }

    fn require_state(&mut self, resource: ResourceId, required: &[ResourceState]) -> Result<(), ValidationError> {
        let tracked = self.state_of(resource)?;
        if required.contains(&tracked) {
            Ok(())
        } else {
            Err(ValidationError::UnexpectedState {
                resource,
                required: required.to_vec(),
                tracked,
            })
        }
    }

    fn reference(&mut self, resource: impl Into<AnyResource>) {
        let resource = resource.into();
        if self.referenced_set.insert(resource) {
            self.referenced.push(resource);
        }
    }

    fn pass(&self, command: &str) -> Result<&PassState, ValidationError> {
        self.pass
            .as_ref()
            .ok_or_else(|| order(format!("{command} outside of a render pass")))
    }

    fn outside_pass(&self, command: &str) -> Result<(), ValidationError> {
        if self.pass.is_some() {
            return Err(order(format!("{command} inside a render pass")));
        }
        Ok(())
    }

    /// Records an explicit state transition.
    ///
    /// `transition.before` must equal the state the resource is in at this
    /// point of the recording. Not allowed inside a render pass.
    pub fn resource_barrier(&mut self, transition: StateTransition) -> Result<(), ValidationError> {
        self.outside_pass("resource_barrier")?;
        let tracked = self.state_of(transition.resource)?;
        if tracked != transition.before {
            log::error!(
                "CommandRecorder: barrier on {:?} declares {} but {} is tracked",
                transition.resource,
                transition.before,
                tracked
            );
            return Err(ValidationError::StateMismatch {
                resource: transition.resource,
                declared: transition.before,
                tracked,
            });
        }
        if let Some(local) = self.states.get_mut(&transition.resource) {
            local.current = transition.after;
        }
        self.reference(transition.resource);
        self.commands.push(Command::Barrier(transition));
        Ok(())
    }

    /// Makes `stage` of the following commands wait until `signal` is set.
    pub fn wait(&mut self, signal: &Signal, stage: BarrierSync) -> Result<(), ValidationError> {
        self.outside_pass("wait")?;
        if self.signals.contains(&signal.id()) {
            return Err(order(format!(
                "waiting on signal '{}' which this buffer sets itself",
                signal.label()
            )));
        }
        self.waits.insert(signal.id());
        self.commands.push(Command::Wait {
            signal: signal.clone(),
            stage,
        });
        Ok(())
    }

    /// Sets `signal` once `stage` of every previous command has completed.
    pub fn signal(&mut self, signal: &Signal, stage: BarrierSync) -> Result<(), ValidationError> {
        self.outside_pass("signal")?;
        if signal.is_scheduled() || !self.signals.insert(signal.id()) {
            return Err(order(format!("signal '{}' is already scheduled", signal.label())));
        }
        if self.waits.contains(&signal.id()) {
            self.signals.remove(&signal.id());
            return Err(order(format!(
                "signal '{}' is waited on earlier in the same buffer",
                signal.label()
            )));
        }
        self.commands.push(Command::Signal {
            signal: signal.clone(),
            stage,
        });
        Ok(())
    }

    /// Opens a render pass.
    ///
    /// Color attachments must be in `ColorAttachment`. The depth-stencil
    /// attachment must be in `DepthStencilAttachment`, or in
    /// `DepthStencilReadOnly` when every plane is read-only. A read-only
    /// plane is left untouched: its load and store operations are ignored.
    pub fn begin_render_pass(&mut self, descriptor: &RenderPassDescriptor) -> Result<(), ValidationError> {
        if self.pass.is_some() {
            return Err(order("begin_render_pass while a render pass is open"));
        }
        if self.queue != QueueType::Default {
            return Err(order(format!("render pass recorded for the {:?} queue", self.queue)));
        }
        if descriptor.color_attachments.is_empty() && descriptor.depth_stencil_attachment.is_none() {
            return Err(ValidationError::InvalidDescriptor {
                label: descriptor.label.map(str::to_string),
                reason: "a render pass needs at least one attachment".to_string(),
            });
        }

        let device = Arc::clone(&self.device);
        let registry = device.registry();
        let mut extent: Option<Extent2D> = None;
        let mut sample_count: Option<u32> = None;
        let mut match_extent = |e: Extent2D, samples: u32| -> Result<(), ValidationError> {
            match (extent, sample_count) {
                (Some(expected), _) if expected != e => Err(ValidationError::InvalidDescriptor {
                    label: descriptor.label.map(str::to_string),
                    reason: format!("attachment of {e:?} differs from {expected:?}"),
                }),
                (_, Some(expected)) if expected != samples => Err(ValidationError::InvalidDescriptor {
                    label: descriptor.label.map(str::to_string),
                    reason: format!("attachment has {samples} samples instead of {expected}"),
                }),
                _ => {
                    extent = Some(e);
                    sample_count = Some(samples);
                    Ok(())
                }
            }
        };

        let mut touched: Vec<(ResourceId, Vec<ResourceState>)> = Vec::new();
        let mut color_formats = Vec::with_capacity(descriptor.color_attachments.len());
        for attachment in descriptor.color_attachments {
            let view = registry.view(attachment.view)?;
            check_attachment_texture(&registry, view.texture, view.usage)?;
            if view.format.is_depth_stencil() {
                return Err(ValidationError::InvalidDescriptor {
                    label: descriptor.label.map(str::to_string),
                    reason: format!("{:?} cannot be a color attachment", view.format),
                });
            }
            match_extent(view.extent, view.sample_count)?;
            if let Some(resolve) = attachment.resolve_target {
                let target = registry.view(resolve)?;
                check_attachment_texture(&registry, target.texture, target.usage)?;
                if view.sample_count == 1 || target.sample_count != 1 || target.format != view.format || target.extent != view.extent {
                    return Err(ValidationError::InvalidDescriptor {
                        label: descriptor.label.map(str::to_string),
                        reason: "a resolve target needs a multisampled source of the same format and size".to_string(),
                    });
                }
                touched.push((target.texture.into(), vec![ResourceState::ColorAttachment]));
            }
            color_formats.push(view.format);
            touched.push((view.texture.into(), vec![ResourceState::ColorAttachment]));
        }

        let mut recorded_depth: Option<RenderPassDepthStencilAttachment> = None;
        let mut depth_format = None;
        let (mut depth_read_only, mut stencil_read_only) = (true, true);
        if let Some(ds) = &descriptor.depth_stencil_attachment {
            let view = registry.view(ds.view)?;
            check_attachment_texture(&registry, view.texture, view.usage)?;
            let format = view.format;
            if !format.is_depth_stencil() {
                return Err(ValidationError::InvalidDescriptor {
                    label: descriptor.label.map(str::to_string),
                    reason: format!("{format:?} cannot be a depth-stencil attachment"),
                });
            }
            match_extent(view.extent, view.sample_count)?;
            let plane_ops = |has: bool, read_only: bool, given: bool, plane: &str| {
                if !has && given {
                    Err(format!("{format:?} has no {plane} plane but {plane} ops are given"))
                } else if has && !read_only && !given {
                    Err(format!("the {plane} plane is writable but has no load/store ops"))
                } else {
                    Ok(())
                }
            };
            plane_ops(format.has_depth(), ds.depth_read_only, ds.depth_ops.is_some(), "depth")
                .and(plane_ops(format.has_stencil(), ds.stencil_read_only, ds.stencil_ops.is_some(), "stencil"))
                .map_err(|reason| ValidationError::InvalidDescriptor {
                    label: descriptor.label.map(str::to_string),
                    reason,
                })?;
            if let Some(LoadOp::Clear(depth)) = ds.depth_ops.map(|o| o.load) {
                if !(0.0..=1.0).contains(&depth) {
                    return Err(ValidationError::InvalidDescriptor {
                        label: descriptor.label.map(str::to_string),
                        reason: format!("depth clear value {depth} is outside 0..=1"),
                    });
                }
            }
            depth_read_only = ds.depth_read_only || !format.has_depth();
            stencil_read_only = ds.stencil_read_only || !format.has_stencil();
            let states = if depth_read_only && stencil_read_only {
                vec![ResourceState::DepthStencilReadOnly, ResourceState::DepthStencilAttachment]
            } else {
                vec![ResourceState::DepthStencilAttachment]
            };
            touched.push((view.texture.into(), states));
            depth_format = Some(format);
            recorded_depth = Some(RenderPassDepthStencilAttachment {
                view: ds.view,
                depth_ops: if depth_read_only { None } else { ds.depth_ops },
                depth_read_only,
                stencil_ops: if stencil_read_only { None } else { ds.stencil_ops },
                stencil_read_only,
            });
        }
        drop(registry);

        for (resource, states) in &touched {
            self.require_state(*resource, states)?;
        }
        for attachment in descriptor.color_attachments {
            self.reference(attachment.view);
            if let Some(resolve) = attachment.resolve_target {
                self.reference(resolve);
            }
        }
        if let Some(ds) = &descriptor.depth_stencil_attachment {
            self.reference(ds.view);
        }
        for (resource, _) in touched {
            self.reference(resource);
        }

        let extent = extent.unwrap_or_default();
        self.commands.push(Command::BeginRenderPass(RenderPassCommand {
            label: descriptor.label.map(str::to_string),
            color_attachments: descriptor.color_attachments.to_vec(),
            depth_stencil_attachment: recorded_depth,
            extent,
        }));
        self.pass = Some(PassState {
            extent,
            color_formats,
            depth_format,
            depth_read_only,
            stencil_read_only,
            sample_count: sample_count.unwrap_or(1),
            pipeline: None,
            bind_groups: [None; MAX_BIND_GROUPS],
            vertex_buffers: HashMap::new(),
            index_buffer: None,
        });
        Ok(())
    }

    /// Closes the open render pass.
    pub fn end_render_pass(&mut self) -> Result<(), ValidationError> {
        self.pass("end_render_pass")?;
        self.pass = None;
        self.commands.push(Command::EndRenderPass);
        Ok(())
    }

    /// Sets the viewport. It must lie within the attachments, with
    /// `0 <= min_depth <= max_depth <= 1`.
    pub fn set_viewport(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) -> Result<(), ValidationError> {
        let pass = self.pass("set_viewport")?;
        let inside = x >= 0.0
            && y >= 0.0
            && width > 0.0
            && height > 0.0
            && x + width <= pass.extent.width as f32
            && y + height <= pass.extent.height as f32;
        if !inside || !(0.0 <= min_depth && min_depth <= max_depth && max_depth <= 1.0) {
            return Err(ValidationError::OutOfBounds(format!(
                "viewport ({x}, {y}, {width}x{height}, depth {min_depth}..{max_depth}) does not fit {:?}",
                pass.extent
            )));
        }
        self.commands.push(Command::SetViewport(Viewport {
            x,
            y,
            width,
            height,
            min_depth,
            max_depth,
        }));
        Ok(())
    }

    /// Sets the scissor rectangle. It must lie within the attachments.
    pub fn set_scissor_rect(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<(), ValidationError> {
        let pass = self.pass("set_scissor_rect")?;
        if x as u64 + width as u64 > pass.extent.width as u64 || y as u64 + height as u64 > pass.extent.height as u64 {
            return Err(ValidationError::OutOfBounds(format!(
                "scissor ({x}, {y}, {width}x{height}) does not fit {:?}",
                pass.extent
            )));
        }
        self.commands.push(Command::SetScissorRect(ScissorRect { x, y, width, height }));
        Ok(())
    }

    /// Binds a render pipeline. Its color targets and depth-stencil format
    /// must match the attachments of the pass, and it must not write to a
    /// read-only plane.
    pub fn set_pipeline(&mut self, pipeline: RenderPipelineId) -> Result<(), ValidationError> {
        let device = Arc::clone(&self.device);
        let registry = device.registry();
        let record = registry.render_pipeline(pipeline)?;
        let pass = self
            .pass
            .as_mut()
            .ok_or_else(|| order("set_pipeline outside of a render pass"))?;

        let target_formats: Vec<TextureFormat> = record.color_targets.iter().map(|t| t.format).collect();
        if target_formats != pass.color_formats {
            return Err(ValidationError::ColorTargetMismatch {
                pipeline: record.label.clone(),
                reason: format!(
                    "pipeline targets {target_formats:?}, pass attachments {:?}",
                    pass.color_formats
                ),
            });
        }
        let pipeline_format = record.depth_stencil.as_ref().map(|ds| ds.format);
        if pipeline_format != pass.depth_format {
            return Err(ValidationError::DepthStencilFormatMismatch {
                pipeline: record.label.clone(),
                pipeline_format,
                attachment_format: pass.depth_format,
            });
        }
        if record.sample_count != pass.sample_count {
            return Err(ValidationError::ColorTargetMismatch {
                pipeline: record.label.clone(),
                reason: format!(
                    "pipeline uses {} samples, attachments {}",
                    record.sample_count, pass.sample_count
                ),
            });
        }
        if let Some(ds) = &record.depth_stencil {
            if pass.depth_read_only && ds.writes_depth() {
                return Err(order(format!(
                    "pipeline '{}' writes depth into a read-only depth plane",
                    record.label.as_deref().unwrap_or("Unknown")
                )));
            }
            if pass.stencil_read_only && ds.writes_stencil() {
                return Err(order(format!(
                    "pipeline '{}' writes stencil into a read-only stencil plane",
                    record.label.as_deref().unwrap_or("Unknown")
                )));
            }
        }
        pass.pipeline = Some(pipeline);
        drop(registry);
        self.reference(pipeline);
        self.commands.push(Command::SetPipeline(pipeline));
        Ok(())
    }

    /// Binds a bind group at `index`. Textures it samples must be in
    /// `ShaderResource`; `dynamic_offsets` gives one offset per dynamic
    /// buffer slot, in binding order.
    pub fn set_bind_group(
        &mut self,
        index: u32,
        bind_group: BindGroupId,
        dynamic_offsets: &[u32],
    ) -> Result<(), ValidationError> {
        self.pass("set_bind_group")?;
        if index as usize >= MAX_BIND_GROUPS {
            return Err(ValidationError::OutOfBounds(format!(
                "bind group index {index} is not below {MAX_BIND_GROUPS}"
            )));
        }
        let device = Arc::clone(&self.device);
        let registry = device.registry();
        let record = registry.bind_group(bind_group)?;
        if dynamic_offsets.len() != record.dynamic.len() {
            return Err(ValidationError::BindGroupMismatch {
                label: record.label.clone(),
                reason: format!(
                    "{} dynamic offsets given for {} dynamic slots",
                    dynamic_offsets.len(),
                    record.dynamic.len()
                ),
            });
        }
        for (offset, slot) in dynamic_offsets.iter().zip(&record.dynamic) {
            let offset = *offset as u64;
            let end = slot
                .offset
                .checked_add(offset)
                .and_then(|start| start.checked_add(slot.size));
            if offset % BUFFER_OFFSET_ALIGNMENT != 0 || !end.is_some_and(|end| end <= slot.buffer_size) {
                return Err(ValidationError::OutOfBounds(format!(
                    "dynamic offset {offset} for buffer {:?} ({} bytes)",
                    slot.buffer, slot.buffer_size
                )));
            }
        }
        let sampled = record.sampled_textures.clone();
        let resources = record.resources.clone();
        drop(registry);

        for texture in &sampled {
            self.require_state((*texture).into(), &[ResourceState::ShaderResource])?;
        }
        for texture in sampled {
            self.reference(texture);
        }
        for resource in resources {
            self.reference(resource);
        }
        self.reference(bind_group);
        if let Some(pass) = self.pass.as_mut() {
            pass.bind_groups[index as usize] = Some(bind_group);
        }
        self.commands.push(Command::SetBindGroup {
            index,
            bind_group,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
        Ok(())
    }

    /// Binds a vertex buffer to `slot`, starting at byte `offset`.
    pub fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) -> Result<(), ValidationError> {
        self.pass("set_vertex_buffer")?;
        check_buffer_binding(&self.device.registry(), buffer, BufferUsage::VERTEX, offset, 4)?;
        if let Some(pass) = self.pass.as_mut() {
            pass.vertex_buffers.insert(slot, (buffer, offset));
        }
        self.reference(buffer);
        self.commands.push(Command::SetVertexBuffer { slot, buffer, offset });
        Ok(())
    }

    /// Binds the index buffer.
    pub fn set_index_buffer(&mut self, buffer: BufferId, format: IndexFormat, offset: u64) -> Result<(), ValidationError> {
        self.pass("set_index_buffer")?;
        check_buffer_binding(&self.device.registry(), buffer, BufferUsage::INDEX, offset, format.size())?;
        if let Some(pass) = self.pass.as_mut() {
            pass.index_buffer = Some((buffer, format, offset));
        }
        self.reference(buffer);
        self.commands.push(Command::SetIndexBuffer { buffer, format, offset });
        Ok(())
    }

    /// Sets the reference value of stencil tests and `Replace` operations.
    pub fn set_stencil_reference(&mut self, reference: u32) -> Result<(), ValidationError> {
        self.pass("set_stencil_reference")?;
        self.commands.push(Command::SetStencilReference(reference));
        Ok(())
    }

    /// Checks that everything the bound pipeline reads is bound and in range.
    fn validate_draw(&self, vertex_count: u32, instance_count: u32, indexed: bool) -> Result<(), ValidationError> {
        let pass = self.pass("draw")?;
        let pipeline = pass
            .pipeline
            .ok_or_else(|| ValidationError::IncompleteDrawState("no pipeline is bound".to_string()))?;
        let registry = self.device.registry();
        let record = registry.render_pipeline(pipeline)?;

        for (index, layout) in record.bind_group_layouts.iter().enumerate() {
            let group = pass.bind_groups[index].ok_or_else(|| {
                ValidationError::IncompleteDrawState(format!("bind group {index} is not set"))
            })?;
            if registry.bind_group(group)?.layout != *layout {
                return Err(ValidationError::IncompleteDrawState(format!(
                    "bind group {index} was created for another layout than the pipeline's"
                )));
            }
        }

        for (slot, layout) in record.vertex_buffers.iter().enumerate() {
            let (buffer, offset) = *pass.vertex_buffers.get(&(slot as u32)).ok_or_else(|| {
                ValidationError::IncompleteDrawState(format!("vertex buffer slot {slot} is not set"))
            })?;
            let count = match layout.step_mode {
                VertexStepMode::Vertex if indexed => continue,
                VertexStepMode::Vertex => vertex_count,
                VertexStepMode::Instance => instance_count,
            };
            let Some(attribute_end) = layout
                .attributes
                .iter()
                .map(|a| a.offset.saturating_add(a.format.size()))
                .max()
            else {
                continue;
            };
            if count == 0 {
                continue;
            }
            let available = registry.buffer(buffer)?.size.saturating_sub(offset);
            let required = (count as u64 - 1)
                .saturating_mul(layout.array_stride)
                .saturating_add(attribute_end);
            if required > available {
                return Err(ValidationError::OutOfBounds(format!(
                    "vertex buffer slot {slot} needs {required} bytes, {available} are bound"
                )));
            }
        }

        if indexed {
            let (buffer, format, offset) = pass.index_buffer.ok_or_else(|| {
                ValidationError::IncompleteDrawState("no index buffer is bound".to_string())
            })?;
            if let Some(strip) = record.strip_index_format {
                if strip != format {
                    return Err(ValidationError::IncompleteDrawState(format!(
                        "the pipeline restarts strips on {strip:?} but the index buffer is {format:?}"
                    )));
                }
            }
            let available = registry.buffer(buffer)?.size.saturating_sub(offset);
            let required = (vertex_count as u64).saturating_mul(format.size());
            if required > available {
                return Err(ValidationError::OutOfBounds(format!(
                    "{vertex_count} indices need {required} bytes, {available} are bound"
                )));
            }
        }
        Ok(())
    }

    /// Draws non-indexed primitives.
    pub fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) -> Result<(), ValidationError> {
        self.validate_draw(vertices.end, instances.end, false)?;
        self.commands.push(Command::Draw { vertices, instances });
        Ok(())
    }

    /// Draws indexed primitives. `base_vertex` is added to each index.
    pub fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) -> Result<(), ValidationError> {
        self.validate_draw(indices.end, instances.end, true)?;
        self.commands.push(Command::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
        Ok(())
    }

    /// Copies `size` bytes between two buffers. Not allowed inside a render pass.
    pub fn copy_buffer_to_buffer(
        &mut self,
        source: BufferId,
        source_offset: u64,
        destination: BufferId,
        destination_offset: u64,
        size: u64,
    ) -> Result<(), ValidationError> {
        self.outside_pass("copy_buffer_to_buffer")?;
        if source == destination {
            return Err(order("copy_buffer_to_buffer within one buffer"));
        }
        if size % 4 != 0 || source_offset % 4 != 0 || destination_offset % 4 != 0 {
            return Err(ValidationError::OutOfBounds(
                "buffer copies must be 4-byte aligned".to_string(),
            ));
        }
        {
            let registry = self.device.registry();
            for (buffer, usage, offset) in [
                (source, BufferUsage::COPY_SRC, source_offset),
                (destination, BufferUsage::COPY_DST, destination_offset),
            ] {
                let record = registry.buffer(buffer)?;
                if !record.usage.contains(usage) {
                    return Err(ValidationError::MissingUsage {
                        resource: buffer.into(),
                        usage: format!("{usage:?}"),
                    });
                }
                if !offset.checked_add(size).is_some_and(|end| end <= record.size) {
                    return Err(ValidationError::OutOfBounds(format!(
                        "copy of {size} bytes at {offset} overruns buffer {buffer:?} ({} bytes)",
                        record.size
                    )));
                }
            }
        }
        self.reference(source);
        self.reference(destination);
        self.commands.push(Command::CopyBufferToBuffer {
            source,
            source_offset,
            destination,
            destination_offset,
            size,
        });
        Ok(())
    }

    /// Ends recording. Fails if a render pass is still open.
    pub fn finish(self) -> Result<CommandBuffer, ValidationError> {
        if self.pass.is_some() {
            return Err(order("finish with an open render pass"));
        }
        let requirements = self
            .first_use
            .iter()
            .filter_map(|resource| {
                self.states.get(resource).map(|local| StateRequirement {
                    resource: *resource,
                    expected: local.expected,
                    last: local.current,
                })
            })
            .collect();
        Ok(CommandBuffer {
            label: self.label,
            queue: self.queue,
            commands: self.commands,
            requirements,
            referenced: self.referenced,
        })
    }

    /// Ends recording and hands the buffer to the device queue.
    pub fn submit(self) -> Result<(), RenderError> {
        let device = Arc::clone(&self.device);
        let commands = self.finish()?;
        device.submit(commands)
    }
}

fn check_attachment_texture(
    registry: &ResourceRegistry,
    texture: TextureId,
    usage: TextureUsage,
) -> Result<(), ValidationError> {
    let record = registry.texture(texture)?;
    if let Some(frame) = record.frame {
        if frame.suboptimal {
            return Err(order("a suboptimal surface frame must be skipped, not rendered to"));
        }
    }
    if !usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        return Err(ValidationError::MissingUsage {
            resource: texture.into(),
            usage: "RENDER_ATTACHMENT".to_string(),
        });
    }
    Ok(())
}

fn check_buffer_binding(
    registry: &ResourceRegistry,
    buffer: BufferId,
    usage: BufferUsage,
    offset: u64,
    alignment: u64,
) -> Result<(), ValidationError> {
    let record = registry.buffer(buffer)?;
    if !record.usage.contains(usage) {
        return Err(ValidationError::MissingUsage {
            resource: buffer.into(),
            usage: format!("{usage:?}"),
        });
    }
    if offset % alignment != 0 || offset > record.size {
        return Err(ValidationError::OutOfBounds(format!(
            "offset {offset} into buffer {buffer:?} ({} bytes)",
            record.size
        )));
    }
    Ok(())
}
