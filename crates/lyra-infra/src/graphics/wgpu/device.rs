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


//! The `wgpu` implementation of [`DeviceBackend`].

use super::context::WgpuContext;
use super::conversions::IntoWgpu;
use super::surface::WgpuSurface;
use lyra_core::renderer::api::command::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId, BindingResource,
    BindingType, Command, CommandBuffer, Operations, RenderPassCommand, Signal,
};
use lyra_core::renderer::api::core::{
    AdapterInfo, ShaderModuleDescriptor, ShaderModuleId, SurfaceDescriptor,
};
use lyra_core::renderer::api::pipeline::{
    PipelineLayoutDescriptor, PipelineLayoutId, RenderPipelineDescriptor, RenderPipelineId,
};
use lyra_core::renderer::api::resource::{
    BufferDescriptor, BufferId, BufferUsage, ImageAspect, SamplerDescriptor, SamplerId,
    TextureDescriptor, TextureId, TextureViewDescriptor, TextureViewId,
};
use lyra_core::renderer::api::util::TextureFormat;
use lyra_core::renderer::api::AnyResource;
use lyra_core::renderer::error::{PipelineError, RenderError, ResourceError, ShaderError};
use lyra_core::renderer::traits::{DeviceBackend, SurfaceBackend};
use std::collections::HashMap;
use std::fmt;
use std::slice::Iter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

const COPY_ALIGNMENT: u64 = wgpu::COPY_BUFFER_ALIGNMENT;
const ROW_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

pub(crate) struct BufferEntry {
    pub buffer: wgpu::Buffer,
    pub size: u64,
}

pub(crate) struct TextureEntry {
    pub texture: wgpu::Texture,
    pub format: TextureFormat,
}

pub(crate) struct ViewEntry {
    pub view: wgpu::TextureView,
    pub format: TextureFormat,
}

struct ShaderEntry {
    module: wgpu::ShaderModule,
    entry_point: String,
}

/// Every native object of a device, keyed by its RHI handle.
#[derive(Default)]
pub(crate) struct Objects {
    pub buffers: HashMap<BufferId, BufferEntry>,
    pub textures: HashMap<TextureId, TextureEntry>,
    pub views: HashMap<TextureViewId, ViewEntry>,
    samplers: HashMap<SamplerId, wgpu::Sampler>,
    shaders: HashMap<ShaderModuleId, ShaderEntry>,
    bind_group_layouts: HashMap<BindGroupLayoutId, wgpu::BindGroupLayout>,
    pipeline_layouts: HashMap<PipelineLayoutId, wgpu::PipelineLayout>,
    bind_groups: HashMap<BindGroupId, wgpu::BindGroup>,
    pipelines: HashMap<RenderPipelineId, wgpu::RenderPipeline>,
}

impl Objects {
    fn release(&mut self, resource: AnyResource) -> bool {
        match resource {
            AnyResource::Buffer(id) => self.buffers.remove(&id).is_some(),
            AnyResource::Texture(id) => self.textures.remove(&id).is_some(),
            AnyResource::TextureView(id) => self.views.remove(&id).is_some(),
            AnyResource::Sampler(id) => self.samplers.remove(&id).is_some(),
            AnyResource::ShaderModule(id) => self.shaders.remove(&id).is_some(),
            AnyResource::BindGroupLayout(id) => self.bind_group_layouts.remove(&id).is_some(),
            AnyResource::PipelineLayout(id) => self.pipeline_layouts.remove(&id).is_some(),
            AnyResource::BindGroup(id) => self.bind_groups.remove(&id).is_some(),
            AnyResource::RenderPipeline(id) => self.pipelines.remove(&id).is_some(),
        }
    }
}

/// Drives `device.poll` on a background thread so that completion callbacks
/// fire without the owner having to wait.
struct Poller {
    sender: Option<flume::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Poller {
    fn spawn(device: wgpu::Device) -> std::io::Result<Self> {
        let (sender, receiver) = flume::unbounded::<()>();
        let thread = std::thread::Builder::new()
            .name("lyra-wgpu-poll".to_string())
            .spawn(move || {
                while receiver.recv().is_ok() {
                    if let Err(e) = device.poll(wgpu::PollType::wait_indefinitely()) {
                        log::warn!("WgpuDevice: background poll failed: {e:?}");
                    }
                }
                log::debug!("WgpuDevice: poll thread exiting");
            })?;
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
        })
    }

    fn kick(&self) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(());
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("WgpuDevice: poll thread panicked");
            }
        }
    }
}

/// State shared by the device and its surfaces.
pub(crate) struct WgpuShared {
    pub context: WgpuContext,
    objects: Mutex<Objects>,
    poller: Poller,
}

impl WgpuShared {
    pub fn objects(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets every signal once the work submitted so far has completed.
    pub fn signal_on_completion(&self, signals: Vec<Signal>) {
        if signals.is_empty() {
            return;
        }
        self.context.queue.on_submitted_work_done(move || {
            for signal in &signals {
                signal.set();
            }
        });
        self.poller.kick();
    }
}

/// A device running on a native API through `wgpu`.
pub struct WgpuDevice {
    shared: Arc<WgpuShared>,
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.shared.context.info)
            .finish_non_exhaustive()
    }
}

fn unknown(what: &str, id: impl fmt::Debug) -> ResourceError {
    ResourceError::BackendError(format!("{what} {id:?} has no wgpu object"))
}

fn label_of<'a>(label: &'a Option<std::borrow::Cow<'_, str>>) -> Option<&'a str> {
    label.as_deref()
}

impl WgpuDevice {
    /// Wraps an opened context and starts its poll thread.
    pub fn new(context: WgpuContext) -> Result<Self, RenderError> {
        let poller = Poller::spawn(context.device.clone()).map_err(|e| {
            RenderError::DeviceRequestFailed(format!("cannot start the wgpu poll thread: {e}"))
        })?;
        log::info!("WgpuDevice: created on \"{}\"", context.info.name);
        Ok(Self {
            shared: Arc::new(WgpuShared {
                context,
                objects: Mutex::new(Objects::default()),
                poller,
            }),
        })
    }

    fn device(&self) -> &wgpu::Device {
        &self.shared.context.device
    }

    fn queue(&self) -> &wgpu::Queue {
        &self.shared.context.queue
    }

    fn block_on_map(&self, slice: wgpu::BufferSlice<'_>, mode: wgpu::MapMode) -> Result<(), ResourceError> {
        let (sender, receiver) = flume::bounded(1);
        slice.map_async(mode, move |result| {
            let _ = sender.send(result);
        });
        self.shared
            .context
            .poll_blocking()
            .map_err(|e| ResourceError::BackendError(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| ResourceError::BackendError(format!("map callback dropped: {e}")))?
            .map_err(|e| ResourceError::BackendError(format!("map_async failed: {e:?}")))
    }

    /// Copies `size` bytes from `source` through a mappable staging buffer.
    fn read_through_staging(
        &self,
        label: &str,
        encode: impl FnOnce(&mut wgpu::CommandEncoder, &wgpu::Buffer),
        size: u64,
    ) -> Result<Vec<u8>, ResourceError> {
        let staging = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: align_up(size.max(1), COPY_ALIGNMENT),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        encode(&mut encoder, &staging);
        self.queue().submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        self.block_on_map(slice, wgpu::MapMode::Read)?;
        let bytes = slice.get_mapped_range()[..size as usize].to_vec();
        staging.unmap();
        Ok(bytes)
    }

    fn depth_ops(
        format: TextureFormat,
        ops: Option<Operations<f32>>,
        read_only: bool,
    ) -> Option<wgpu::Operations<f32>> {
        if !format.has_depth() || read_only {
            return None;
        }
        Some(ops.unwrap_or_else(Operations::load_store).into_wgpu())
    }

    fn stencil_ops(
        format: TextureFormat,
        ops: Option<Operations<u32>>,
        read_only: bool,
    ) -> Option<wgpu::Operations<u32>> {
        if !format.has_stencil() || read_only {
            return None;
        }
        Some(ops.unwrap_or_else(Operations::load_store).into_wgpu())
    }

    /// Encodes one render pass, consuming commands up to its `EndRenderPass`.
    fn encode_render_pass(
        objects: &Objects,
        encoder: &mut wgpu::CommandEncoder,
        pass: &RenderPassCommand,
        commands: &mut Iter<'_, Command>,
    ) -> Result<(), RenderError> {
        let view = |id: TextureViewId| {
            objects
                .views
                .get(&id)
                .ok_or_else(|| RenderError::Internal(format!("texture view {id:?} has no wgpu object")))
        };

        let mut color_attachments = Vec::with_capacity(pass.color_attachments.len());
        for attachment in &pass.color_attachments {
            color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                view: &view(attachment.view)?.view,
                depth_slice: None,
                resolve_target: match attachment.resolve_target {
                    Some(target) => Some(&view(target)?.view),
                    None => None,
                },
                ops: attachment.ops.into_wgpu(),
            }));
        }

        let depth_stencil_attachment = match &pass.depth_stencil_attachment {
            Some(attachment) => {
                let entry = view(attachment.view)?;
                Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &entry.view,
                    depth_ops: Self::depth_ops(
                        entry.format,
                        attachment.depth_ops,
                        attachment.depth_read_only,
                    ),
                    stencil_ops: Self::stencil_ops(
                        entry.format,
                        attachment.stencil_ops,
                        attachment.stencil_read_only,
                    ),
                })
            }
            None => None,
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: pass.label.as_deref(),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            ..Default::default()
        });

        for command in commands.by_ref() {
            match command {
                Command::EndRenderPass => return Ok(()),
                Command::SetViewport(viewport) => render_pass.set_viewport(
                    viewport.x,
                    viewport.y,
                    viewport.width,
                    viewport.height,
                    viewport.min_depth,
                    viewport.max_depth,
                ),
                Command::SetScissorRect(rect) => {
                    render_pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height)
                }
                Command::SetPipeline(id) => match objects.pipelines.get(id) {
                    Some(pipeline) => render_pass.set_pipeline(pipeline),
                    None => log::warn!("WgpuDevice: pipeline {id:?} not found"),
                },
                Command::SetBindGroup {
                    index,
                    bind_group,
                    dynamic_offsets,
                } => match objects.bind_groups.get(bind_group) {
                    Some(group) => render_pass.set_bind_group(*index, group, dynamic_offsets),
                    None => log::warn!("WgpuDevice: bind group {bind_group:?} not found"),
                },
                Command::SetVertexBuffer {
                    slot,
                    buffer,
                    offset,
                } => match objects.buffers.get(buffer) {
                    Some(entry) => render_pass.set_vertex_buffer(*slot, entry.buffer.slice(*offset..)),
                    None => log::warn!("WgpuDevice: vertex buffer {buffer:?} not found"),
                },
                Command::SetIndexBuffer {
                    buffer,
                    format,
                    offset,
                } => match objects.buffers.get(buffer) {
                    Some(entry) => render_pass
                        .set_index_buffer(entry.buffer.slice(*offset..), format.into_wgpu()),
                    None => log::warn!("WgpuDevice: index buffer {buffer:?} not found"),
                },
                Command::SetStencilReference(reference) => {
                    render_pass.set_stencil_reference(*reference)
                }
                Command::Draw {
                    vertices,
                    instances,
                } => render_pass.draw(vertices.clone(), instances.clone()),
                Command::DrawIndexed {
                    indices,
                    base_vertex,
                    instances,
                } => render_pass.draw_indexed(indices.clone(), *base_vertex, instances.clone()),
                // Ordering inside a pass is implicit on a single queue.
                Command::Barrier(_) | Command::Wait { .. } | Command::Signal { .. } => {}
                Command::BeginRenderPass(_) | Command::CopyBufferToBuffer { .. } => {
                    return Err(RenderError::Internal(format!(
                        "{command:?} recorded inside a render pass"
                    )))
                }
            }
        }
        Err(RenderError::Internal(
            "render pass was never ended".to_string(),
        ))
    }

    fn bytes_per_texel(format: TextureFormat, aspect: ImageAspect) -> Result<u32, ResourceError> {
        let plane = match (format, aspect) {
            (_, ImageAspect::StencilOnly) if format.has_stencil() => 1,
            (TextureFormat::Stencil8, ImageAspect::All) => 1,
            (TextureFormat::Depth16Unorm, ImageAspect::All | ImageAspect::DepthOnly) => 2,
            (TextureFormat::Depth32Float, ImageAspect::All | ImageAspect::DepthOnly) => 4,
            (TextureFormat::Depth32FloatStencil8, ImageAspect::DepthOnly) => 4,
            (format, ImageAspect::All) if !format.is_depth_stencil() => format.bytes_per_pixel(),
            _ => {
                return Err(ResourceError::Unsupported(format!(
                    "reading the {aspect:?} aspect of a {format:?} texture"
                )))
            }
        };
        Ok(plane)
    }
}

impl DeviceBackend for WgpuDevice {
    fn adapter_info(&self) -> AdapterInfo {
        self.shared.context.info.clone()
    }

    fn create_buffer(&self, id: BufferId, descriptor: &BufferDescriptor) -> Result<(), ResourceError> {
        let usage: wgpu::BufferUsages = descriptor.usage.into_wgpu();
        // Mapped creation needs a size that is a multiple of the copy alignment.
        let size = if descriptor.mapped_at_creation {
            align_up(descriptor.size, COPY_ALIGNMENT)
        } else {
            descriptor.size
        };
        let buffer = self.device().create_buffer(&wgpu::BufferDescriptor {
            label: label_of(&descriptor.label),
            size,
            usage,
            mapped_at_creation: descriptor.mapped_at_creation,
        });
        log::debug!(
            "WgpuDevice: created buffer '{}' {id:?}, {} bytes, {usage:?}",
            descriptor.label.as_deref().unwrap_or("Unknown"),
            descriptor.size
        );
        self.shared.objects().buffers.insert(
            id,
            BufferEntry {
                buffer,
                size: descriptor.size,
            },
        );
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let objects = self.shared.objects();
        let entry = objects.buffers.get(&id).ok_or_else(|| unknown("buffer", id))?;
        if offset % COPY_ALIGNMENT == 0 && data.len() as u64 % COPY_ALIGNMENT == 0 {
            self.queue().write_buffer(&entry.buffer, offset, data);
            return Ok(());
        }
        // Widen unaligned writes with the bytes already on the device.
        let start = offset - offset % COPY_ALIGNMENT;
        let end = align_up(offset + data.len() as u64, COPY_ALIGNMENT).min(align_up(entry.size, COPY_ALIGNMENT));
        drop(objects);
        let mut widened = self.read_buffer(id, start, end - start)?;
        let at = (offset - start) as usize;
        widened[at..at + data.len()].copy_from_slice(data);
        widened.resize(align_up(widened.len() as u64, COPY_ALIGNMENT) as usize, 0);
        let objects = self.shared.objects();
        let entry = objects.buffers.get(&id).ok_or_else(|| unknown("buffer", id))?;
        self.queue().write_buffer(&entry.buffer, start, &widened);
        Ok(())
    }

    fn write_mapped(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let objects = self.shared.objects();
        let entry = objects.buffers.get(&id).ok_or_else(|| unknown("buffer", id))?;
        let start = offset as usize;
        let mut mapped = entry.buffer.slice(..).get_mapped_range_mut();
        mapped
            .get_mut(start..start + data.len())
            .ok_or_else(|| ResourceError::BackendError(format!("mapped write out of range on {id:?}")))?
            .copy_from_slice(data);
        Ok(())
    }

    fn unmap_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let objects = self.shared.objects();
        let entry = objects.buffers.get(&id).ok_or_else(|| unknown("buffer", id))?;
        entry.buffer.unmap();
        Ok(())
    }

    fn create_texture(&self, id: TextureId, descriptor: &TextureDescriptor) -> Result<(), ResourceError> {
        let texture = self.device().create_texture(&wgpu::TextureDescriptor {
            label: label_of(&descriptor.label),
            size: descriptor.extent().into_wgpu(),
            mip_level_count: descriptor.mip_levels,
            sample_count: descriptor.sample_count.into_wgpu(),
            dimension: descriptor.dimension.into_wgpu(),
            format: descriptor.format.into_wgpu(),
            usage: descriptor.usage.into_wgpu(),
            view_formats: &[],
        });
        log::debug!(
            "WgpuDevice: created texture '{}' {id:?}, {}x{} {:?}",
            descriptor.label.as_deref().unwrap_or("Unknown"),
            descriptor.width,
            descriptor.height,
            descriptor.format
        );
        self.shared.objects().textures.insert(
            id,
            TextureEntry {
                texture,
                format: descriptor.format,
            },
        );
        Ok(())
    }

    fn create_texture_view(
        &self,
        id: TextureViewId,
        texture: TextureId,
        descriptor: &TextureViewDescriptor,
    ) -> Result<(), ResourceError> {
        let mut objects = self.shared.objects();
        let entry = objects
            .textures
            .get(&texture)
            .ok_or_else(|| unknown("texture", texture))?;
        let format = descriptor.format.unwrap_or(entry.format);
        let view = entry.texture.create_view(&wgpu::TextureViewDescriptor {
            label: label_of(&descriptor.label),
            format: Some(format.into_wgpu()),
            dimension: descriptor.dimension.map(IntoWgpu::into_wgpu),
            aspect: descriptor.aspect.into_wgpu(),
            base_mip_level: descriptor.base_mip_level,
            mip_level_count: descriptor.mip_level_count,
            base_array_layer: descriptor.base_array_layer,
            array_layer_count: descriptor.array_layer_count,
            usage: None,
        });
        objects.views.insert(id, ViewEntry { view, format });
        Ok(())
    }

    fn create_sampler(&self, id: SamplerId, descriptor: &SamplerDescriptor) -> Result<(), ResourceError> {
        let sampler = self.device().create_sampler(&wgpu::SamplerDescriptor {
            label: label_of(&descriptor.label),
            address_mode_u: descriptor.address_mode_u.into_wgpu(),
            address_mode_v: descriptor.address_mode_v.into_wgpu(),
            address_mode_w: descriptor.address_mode_w.into_wgpu(),
            mag_filter: descriptor.mag_filter.into_wgpu(),
            min_filter: descriptor.min_filter.into_wgpu(),
            mipmap_filter: descriptor.mipmap_filter.into_wgpu(),
            compare: descriptor.compare.map(IntoWgpu::into_wgpu),
            ..Default::default()
        });
        self.shared.objects().samplers.insert(id, sampler);
        Ok(())
    }

    fn create_shader_module(
        &self,
        id: ShaderModuleId,
        descriptor: &ShaderModuleDescriptor,
    ) -> Result<(), ResourceError> {
        let blob = descriptor.blob;
        let source = std::str::from_utf8(blob.as_bytes()).map_err(|_| ShaderError::LoadError {
            path: blob.entry_point.clone(),
            source_error: "the blob is not WGSL text".to_string(),
        })?;
        let module = self.device().create_shader_module(wgpu::ShaderModuleDescriptor {
            label: label_of(&descriptor.label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        log::debug!(
            "WgpuDevice: created shader module {id:?} for entry point '{}'",
            blob.entry_point
        );
        self.shared.objects().shaders.insert(
            id,
            ShaderEntry {
                module,
                entry_point: blob.entry_point.clone(),
            },
        );
        Ok(())
    }

    fn create_bind_group_layout(
        &self,
        id: BindGroupLayoutId,
        descriptor: &BindGroupLayoutDescriptor,
    ) -> Result<(), ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> = descriptor
            .entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into_wgpu(),
                ty: match entry.ty {
                    BindingType::Buffer {
                        ty,
                        has_dynamic_offset,
                        min_binding_size,
                    } => wgpu::BindingType::Buffer {
                        ty: ty.into_wgpu(),
                        has_dynamic_offset,
                        min_binding_size,
                    },
                    BindingType::Texture {
                        sample_type,
                        view_dimension,
                        multisampled,
                    } => wgpu::BindingType::Texture {
                        sample_type: sample_type.into_wgpu(),
                        view_dimension: view_dimension.into_wgpu(),
                        multisampled,
                    },
                    BindingType::Sampler(ty) => wgpu::BindingType::Sampler(ty.into_wgpu()),
                },
                count: None,
            })
            .collect();
        let layout = self
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: label_of(&descriptor.label),
                entries: &entries,
            });
        self.shared.objects().bind_group_layouts.insert(id, layout);
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        id: PipelineLayoutId,
        descriptor: &PipelineLayoutDescriptor,
    ) -> Result<(), ResourceError> {
        let mut objects = self.shared.objects();
        let layouts = descriptor
            .bind_group_layouts
            .iter()
            .map(|layout| {
                objects
                    .bind_group_layouts
                    .get(layout)
                    .ok_or_else(|| unknown("bind group layout", layout))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let layout = self
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: label_of(&descriptor.label),
                bind_group_layouts: &layouts,
                immediate_size: 0,
            });
        objects.pipeline_layouts.insert(id, layout);
        Ok(())
    }

    fn create_bind_group(&self, id: BindGroupId, descriptor: &BindGroupDescriptor) -> Result<(), ResourceError> {
        let mut objects = self.shared.objects();
        let layout = objects
            .bind_group_layouts
            .get(&descriptor.layout)
            .ok_or_else(|| unknown("bind group layout", descriptor.layout))?;
        let entries = descriptor
            .entries
            .iter()
            .map(|entry| {
                let resource = match entry.resource {
                    BindingResource::Buffer(binding) => {
                        let buffer = objects
                            .buffers
                            .get(&binding.buffer)
                            .ok_or_else(|| unknown("buffer", binding.buffer))?;
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &buffer.buffer,
                            offset: binding.offset,
                            size: binding.size,
                        })
                    }
                    BindingResource::TextureView(view) => wgpu::BindingResource::TextureView(
                        &objects
                            .views
                            .get(&view)
                            .ok_or_else(|| unknown("texture view", view))?
                            .view,
                    ),
                    BindingResource::Sampler(sampler) => wgpu::BindingResource::Sampler(
                        objects
                            .samplers
                            .get(&sampler)
                            .ok_or_else(|| unknown("sampler", sampler))?,
                    ),
                };
                Ok(wgpu::BindGroupEntry {
                    binding: entry.binding,
                    resource,
                })
            })
            .collect::<Result<Vec<_>, ResourceError>>()?;
        let group = self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: label_of(&descriptor.label),
            layout,
            entries: &entries,
        });
        drop(entries);
        objects.bind_groups.insert(id, group);
        Ok(())
    }

    fn create_render_pipeline(
        &self,
        id: RenderPipelineId,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<(), ResourceError> {
        let label = descriptor.label.as_deref();
        let invalid = |module: ShaderModuleId| PipelineError::InvalidShaderModuleForPipeline {
            id: module,
            pipeline_label: label.map(str::to_string),
        };
        let mut objects = self.shared.objects();

        let vertex = objects
            .shaders
            .get(&descriptor.vertex.module)
            .ok_or_else(|| invalid(descriptor.vertex.module))?;
        let fragment = match &descriptor.fragment {
            Some(stage) => Some(
                objects
                    .shaders
                    .get(&stage.module)
                    .ok_or_else(|| invalid(stage.module))?,
            ),
            None => None,
        };
        let layout = objects
            .pipeline_layouts
            .get(&descriptor.layout)
            .ok_or_else(|| unknown("pipeline layout", descriptor.layout))?;

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex
            .buffers
            .iter()
            .map(|buffer| {
                buffer
                    .attributes
                    .iter()
                    .map(|attribute| wgpu::VertexAttribute {
                        format: attribute.format.into_wgpu(),
                        offset: attribute.offset,
                        shader_location: attribute.shader_location,
                    })
                    .collect()
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex
            .buffers
            .iter()
            .zip(&attributes)
            .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                array_stride: buffer.array_stride,
                step_mode: buffer.step_mode.into_wgpu(),
                attributes,
            })
            .collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .fragment
            .iter()
            .flat_map(|stage| stage.targets.iter())
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format.into_wgpu(),
                    blend: target.blend.map(IntoWgpu::into_wgpu),
                    write_mask: target.write_mask.into_wgpu(),
                })
            })
            .collect();

        let pipeline = self
            .device()
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label,
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(vertex.entry_point.as_str()),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: fragment.map(|fragment| wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some(fragment.entry_point.as_str()),
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: descriptor.primitive.into_wgpu(),
                depth_stencil: descriptor.depth_stencil.as_ref().map(IntoWgpu::into_wgpu),
                multisample: descriptor.multisample.into_wgpu(),
                multiview_mask: None,
                cache: None,
            });
        log::debug!(
            "WgpuDevice: created render pipeline '{}' {id:?}",
            label.unwrap_or("Unknown")
        );
        objects.pipelines.insert(id, pipeline);
        Ok(())
    }

    fn release(&self, resource: AnyResource) {
        if !self.shared.objects().release(resource) {
            log::warn!("WgpuDevice: released {resource:?} twice or never created it");
        }
    }

    fn submit(&self, commands: &CommandBuffer) -> Result<(), RenderError> {
        if self.shared.context.is_lost() {
            return Err(RenderError::DeviceLost);
        }

        let mut encoder = self
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: commands.label(),
            });
        {
            let objects = self.shared.objects();
            let mut iter = commands.commands().iter();
            while let Some(command) = iter.next() {
                match command {
                    Command::BeginRenderPass(pass) => {
                        Self::encode_render_pass(&objects, &mut encoder, pass, &mut iter)?
                    }
                    Command::CopyBufferToBuffer {
                        source,
                        source_offset,
                        destination,
                        destination_offset,
                        size,
                    } => {
                        let (Some(from), Some(to)) =
                            (objects.buffers.get(source), objects.buffers.get(destination))
                        else {
                            return Err(RenderError::Internal(format!(
                                "copy between unknown buffers {source:?} and {destination:?}"
                            )));
                        };
                        encoder.copy_buffer_to_buffer(
                            &from.buffer,
                            *source_offset,
                            &to.buffer,
                            *destination_offset,
                            *size,
                        );
                    }
                    // A single queue executes submissions in order.
                    Command::Barrier(_) | Command::Wait { .. } | Command::Signal { .. } => {}
                    other => {
                        return Err(RenderError::Internal(format!(
                            "{other:?} recorded outside a render pass"
                        )))
                    }
                }
            }
        }

        self.queue().submit(Some(encoder.finish()));
        self.shared
            .signal_on_completion(commands.signals().cloned().collect());
        log::trace!(
            "WgpuDevice: submitted '{}'",
            commands.label().unwrap_or("Unknown")
        );
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        if self.shared.context.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        self.shared
            .context
            .poll_blocking()
            .map_err(|e| RenderError::Internal(e.to_string()))
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let objects = self.shared.objects();
        let entry = objects.buffers.get(&id).ok_or_else(|| unknown("buffer", id))?;
        if offset + size > entry.size {
            return Err(ResourceError::BackendError(format!("read out of range on {id:?}")));
        }
        let start = offset - offset % COPY_ALIGNMENT;
        let end = align_up(offset + size, COPY_ALIGNMENT).min(entry.buffer.size());
        let skip = (offset - start) as usize;
        let source = entry.buffer.clone();
        drop(objects);

        let bytes = self.read_through_staging(
            "lyra-readback",
            |encoder, staging| encoder.copy_buffer_to_buffer(&source, start, staging, 0, end - start),
            end - start,
        )?;
        Ok(bytes[skip..skip + size as usize].to_vec())
    }

    fn read_texture(&self, id: TextureId, aspect: ImageAspect) -> Result<Vec<u8>, ResourceError> {
        let objects = self.shared.objects();
        let entry = objects.textures.get(&id).ok_or_else(|| unknown("texture", id))?;
        let texel = Self::bytes_per_texel(entry.format, aspect)?;
        let texture = entry.texture.clone();
        drop(objects);

        let (width, height) = (texture.width(), texture.height());
        let row = width * texel;
        let padded_row = row.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT;
        let padded = self.read_through_staging(
            "lyra-texture-readback",
            |encoder, staging| {
                encoder.copy_texture_to_buffer(
                    wgpu::TexelCopyTextureInfo {
                        texture: &texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: aspect.into_wgpu(),
                    },
                    wgpu::TexelCopyBufferInfo {
                        buffer: staging,
                        layout: wgpu::TexelCopyBufferLayout {
                            offset: 0,
                            bytes_per_row: Some(padded_row),
                            rows_per_image: Some(height),
                        },
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                )
            },
            u64::from(padded_row) * u64::from(height),
        )?;

        let mut bytes = Vec::with_capacity((row * height) as usize);
        for line in padded.chunks(padded_row as usize).take(height as usize) {
            bytes.extend_from_slice(&line[..row as usize]);
        }
        Ok(bytes)
    }

    fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<Box<dyn SurfaceBackend>, RenderError> {
        Ok(Box::new(WgpuSurface::new(self.shared.clone(), descriptor)?))
    }
}

impl Drop for WgpuDevice {
    fn drop(&mut self) {
        if let Err(e) = self.shared.context.poll_blocking() {
            log::warn!("WgpuDevice: final poll failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(8, 4), 8);
        assert_eq!(align_up(300, 256), 512);
    }

    #[test]
    fn readable_aspects() {
        assert_eq!(
            WgpuDevice::bytes_per_texel(TextureFormat::Rgba8Unorm, ImageAspect::All).unwrap(),
            4
        );
        assert_eq!(
            WgpuDevice::bytes_per_texel(TextureFormat::Depth24PlusStencil8, ImageAspect::StencilOnly)
                .unwrap(),
            1
        );
        assert_eq!(
            WgpuDevice::bytes_per_texel(TextureFormat::Depth32Float, ImageAspect::DepthOnly).unwrap(),
            4
        );
    }

    #[test]
    fn unreadable_aspects() {
        for (format, aspect) in [
            (TextureFormat::Depth24Plus, ImageAspect::DepthOnly),
            (TextureFormat::Depth24PlusStencil8, ImageAspect::All),
            (TextureFormat::Rgba8Unorm, ImageAspect::StencilOnly),
        ] {
            assert!(matches!(
                WgpuDevice::bytes_per_texel(format, aspect),
                Err(ResourceError::Unsupported(_))
            ));
        }
    }

    #[test]
    fn read_only_planes_have_no_ops() {
        let ops = Some(Operations::clear_store(1.0));
        assert!(WgpuDevice::depth_ops(TextureFormat::Depth32Float, ops, true).is_none());
        assert!(WgpuDevice::depth_ops(TextureFormat::Stencil8, ops, false).is_none());
        assert!(WgpuDevice::stencil_ops(TextureFormat::Depth32Float, Some(Operations::clear_store(0)), false).is_none());
        let stencil = WgpuDevice::stencil_ops(TextureFormat::Depth24PlusStencil8, None, false);
        assert_eq!(stencil.map(|ops| ops.load), Some(wgpu::LoadOp::Load));
    }
}
