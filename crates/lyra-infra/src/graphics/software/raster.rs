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

//! Execution of recorded commands on the CPU.
//!
//! Conventions follow the native APIs: NDC has y up and z in `[0, 1]`,
//! pixel centers sit at half-integer coordinates, and a pixel on a shared
//! triangle edge belongs to the triangle for which that edge is a top or
//! left edge.

use super::image::{quantize_depth, Image, Level};
use super::kernel::{Bindings, Bound, FragmentInput, VertexInput, VertexOutput, MAX_VARYINGS};
use super::resources::{PipelineState, Resources, ViewInfo};
use anyhow::{anyhow, bail, Context, Result};
use lyra_core::math::Extent2D;
use lyra_core::renderer::api::command::{
    BindGroupId, BindingResource, Command, LoadOp, RenderPassCommand, ScissorRect, StoreOp,
    Viewport,
};
use lyra_core::renderer::api::pipeline::{
    BlendFactor, BlendOperation, BlendStateDescriptor, ColorWrites, CullMode, FrontFace,
    PolygonMode, PrimitiveTopology, StencilOperation, VertexFormat, VertexStepMode,
    MAX_BIND_GROUPS,
};
use lyra_core::renderer::api::resource::{BufferId, TextureId, TextureViewId};
use lyra_core::renderer::api::util::IndexFormat;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

const MAX_COLOR_TARGETS: usize = 8;
const CHANNELS: [ColorWrites; 4] = [ColorWrites::R, ColorWrites::G, ColorWrites::B, ColorWrites::A];

struct ColorTarget {
    texture: TextureId,
    image: Image,
    level: u32,
    layer: u32,
    store: StoreOp,
    resolve: Option<ViewInfo>,
}

struct DepthTarget {
    texture: TextureId,
    image: Image,
    level: u32,
    layer: u32,
    // `None` when the plane is left untouched.
    depth_store: Option<StoreOp>,
    stencil_store: Option<StoreOp>,
    depth_read_only: bool,
    stencil_read_only: bool,
}

/// State of the render pass being executed. Its attachment images are
/// moved out of the store for the duration of the pass.
struct PassState {
    label: String,
    extent: Extent2D,
    colors: Vec<ColorTarget>,
    depth: Option<DepthTarget>,
    viewport: Viewport,
    scissor: ScissorRect,
    pipeline: Option<Arc<PipelineState>>,
    bind_groups: [Option<(BindGroupId, Vec<u32>)>; MAX_BIND_GROUPS],
    vertex_buffers: HashMap<u32, (BufferId, u64)>,
    index_buffer: Option<(BufferId, IndexFormat, u64)>,
    stencil_reference: u32,
}

/// Executes the commands of one submission, in order.
///
/// A failing command is logged and skipped. Signals are set regardless, so
/// nothing waiting on this submission can hang.
pub(crate) fn execute(store: &Mutex<Resources>, label: &str, commands: &[Command]) {
    let mut pass: Option<PassState> = None;
    for command in commands {
        match command {
            Command::Wait { signal, .. } => {
                signal.wait();
                continue;
            }
            Command::Signal { signal, .. } => {
                signal.set();
                continue;
            }
            _ => {}
        }

        let mut resources = store.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match command {
            Command::BeginRenderPass(descriptor) => {
                if let Some(open) = pass.take() {
                    open.finish(&mut resources);
                }
                PassState::begin(&mut resources, descriptor).map(|p| pass = Some(p))
            }
            Command::EndRenderPass => {
                if let Some(open) = pass.take() {
                    open.finish(&mut resources);
                }
                Ok(())
            }
            Command::CopyBufferToBuffer {
                source,
                source_offset,
                destination,
                destination_offset,
                size,
            } => copy_buffer(
                &mut resources,
                *source,
                *source_offset,
                *destination,
                *destination_offset,
                *size,
            ),
            Command::Barrier(transition) => {
                log::trace!("SoftwareQueue: {transition:?}");
                Ok(())
            }
            other => match pass.as_mut() {
                Some(open) => open.apply(&resources, other),
                None => Err(anyhow!("{other:?} outside of a render pass")),
            },
        };
        if let Err(err) = result {
            log::error!("SoftwareQueue: command buffer '{label}': {err:#}");
        }
    }

    if let Some(open) = pass.take() {
        log::warn!("SoftwareQueue: render pass '{}' was never ended", open.label);
        let mut resources = store.lock().unwrap_or_else(PoisonError::into_inner);
        open.finish(&mut resources);
    }
}

fn copy_buffer(
    resources: &mut Resources,
    source: BufferId,
    source_offset: u64,
    destination: BufferId,
    destination_offset: u64,
    size: u64,
) -> Result<()> {
    let range = |offset: u64| offset as usize..(offset + size) as usize;
    let bytes = resources
        .buffers
        .get(&source)
        .and_then(|data| data.get(range(source_offset)))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| anyhow!("copy source {source:?} is not resident or too small"))?;
    resources
        .buffers
        .get_mut(&destination)
        .and_then(|data| data.get_mut(range(destination_offset)))
        .ok_or_else(|| anyhow!("copy destination {destination:?} is not resident or too small"))?
        .copy_from_slice(&bytes);
    Ok(())
}

fn view_info(resources: &Resources, view: TextureViewId) -> Result<ViewInfo> {
    resources
        .views
        .get(&view)
        .copied()
        .ok_or_else(|| anyhow!("view {view:?} is not resident"))
}

impl PassState {
    fn begin(resources: &mut Resources, descriptor: &RenderPassCommand) -> Result<Self> {
        let extent = descriptor.extent;
        let mut pass = Self {
            label: descriptor.label.clone().unwrap_or_else(|| "Unknown".to_string()),
            extent,
            colors: Vec::with_capacity(descriptor.color_attachments.len()),
            depth: None,
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: ScissorRect {
                x: 0,
                y: 0,
                width: extent.width,
                height: extent.height,
            },
            pipeline: None,
            bind_groups: Default::default(),
            vertex_buffers: HashMap::new(),
            index_buffer: None,
            stencil_reference: 0,
        };
        if let Err(err) = pass.attach(resources, descriptor) {
            pass.finish(resources);
            return Err(err);
        }
        log::trace!("SoftwareQueue: begin render pass '{}'", pass.label);
        Ok(pass)
    }

    fn attach(&mut self, resources: &mut Resources, descriptor: &RenderPassCommand) -> Result<()> {
        for attachment in &descriptor.color_attachments {
            let view = view_info(resources, attachment.view)?;
            let resolve = attachment
                .resolve_target
                .map(|target| view_info(resources, target))
                .transpose()?;
            let mut image = resources
                .images
                .remove(&view.texture)
                .ok_or_else(|| anyhow!("color attachment {:?} is not resident", view.texture))?;
            if let LoadOp::Clear(color) = attachment.ops.load {
                image.clear(view.level, view.layer, Some(color.to_array()), None, None);
            }
            self.colors.push(ColorTarget {
                texture: view.texture,
                image,
                level: view.level,
                layer: view.layer,
                store: attachment.ops.store,
                resolve,
            });
        }

        if let Some(attachment) = &descriptor.depth_stencil_attachment {
            let view = view_info(resources, attachment.view)?;
            let mut image = resources
                .images
                .remove(&view.texture)
                .ok_or_else(|| anyhow!("depth-stencil attachment {:?} is not resident", view.texture))?;
            let depth_clear = attachment.depth_ops.and_then(|ops| match ops.load {
                LoadOp::Clear(depth) => Some(depth),
                LoadOp::Load => None,
            });
            let stencil_clear = attachment.stencil_ops.and_then(|ops| match ops.load {
                LoadOp::Clear(stencil) => Some(stencil as u8),
                LoadOp::Load => None,
            });
            image.clear(view.level, view.layer, None, depth_clear, stencil_clear);
            self.depth = Some(DepthTarget {
                texture: view.texture,
                image,
                level: view.level,
                layer: view.layer,
                depth_store: attachment.depth_ops.map(|ops| ops.store),
                stencil_store: attachment.stencil_ops.map(|ops| ops.store),
                depth_read_only: attachment.depth_read_only,
                stencil_read_only: attachment.stencil_read_only,
            });
        }
        Ok(())
    }

    /// Applies store operations and resolves, then hands the images back.
    fn finish(self, resources: &mut Resources) {
        for mut target in self.colors {
            if target.store == StoreOp::Discard {
                target
                    .image
                    .clear(target.level, target.layer, Some([0.0; 4]), None, None);
            }
            if let Some(resolve) = target.resolve {
                match resources.images.get_mut(&resolve.texture) {
                    Some(dest) => target.image.resolve_into(
                        target.level,
                        target.layer,
                        dest,
                        resolve.level,
                        resolve.layer,
                    ),
                    None => log::error!(
                        "SoftwareQueue: resolve target {:?} is not resident",
                        resolve.texture
                    ),
                }
            }
            resources.images.insert(target.texture, target.image);
        }
        if let Some(mut target) = self.depth {
            let discard = |store: Option<StoreOp>| store == Some(StoreOp::Discard);
            let depth = discard(target.depth_store).then_some(0.0);
            let stencil = discard(target.stencil_store).then_some(0);
            target.image.clear(target.level, target.layer, None, depth, stencil);
            resources.images.insert(target.texture, target.image);
        }
        log::trace!("SoftwareQueue: end render pass '{}'", self.label);
    }

    fn apply(&mut self, resources: &Resources, command: &Command) -> Result<()> {
        match command {
            Command::SetViewport(viewport) => self.viewport = *viewport,
            Command::SetScissorRect(rect) => self.scissor = *rect,
            Command::SetPipeline(id) => {
                let pipeline = resources
                    .pipelines
                    .get(id)
                    .cloned()
                    .ok_or_else(|| anyhow!("pipeline {id:?} is not resident"))?;
                self.pipeline = Some(pipeline);
            }
            Command::SetBindGroup {
                index,
                bind_group,
                dynamic_offsets,
            } => {
                let slot = self
                    .bind_groups
                    .get_mut(*index as usize)
                    .ok_or_else(|| anyhow!("bind group index {index} out of range"))?;
                *slot = Some((*bind_group, dynamic_offsets.clone()));
            }
            Command::SetVertexBuffer {
                slot,
                buffer,
                offset,
            } => {
                self.vertex_buffers.insert(*slot, (*buffer, *offset));
            }
            Command::SetIndexBuffer {
                buffer,
                format,
                offset,
            } => self.index_buffer = Some((*buffer, *format, *offset)),
            Command::SetStencilReference(reference) => self.stencil_reference = *reference,
            Command::Draw {
                vertices,
                instances,
            } => {
                let indices = vertices.clone().map(Some).collect();
                self.draw(resources, indices, instances.clone())?;
            }
            Command::DrawIndexed {
                indices,
                base_vertex,
                instances,
            } => {
                let indices = self.fetch_indices(resources, indices.clone(), *base_vertex)?;
                self.draw(resources, indices, instances.clone())?;
            }
            other => bail!("{other:?} is not valid inside a render pass"),
        }
        Ok(())
    }

    /// Reads an index range. Restart markers come back as `None`.
    fn fetch_indices(
        &self,
        resources: &Resources,
        range: Range<u32>,
        base_vertex: i32,
    ) -> Result<Vec<Option<u32>>> {
        let pipeline = self.pipeline.as_ref().context("indexed draw without a pipeline")?;
        let (buffer, format, offset) = self.index_buffer.context("indexed draw without an index buffer")?;
        let data = resources
            .buffers
            .get(&buffer)
            .ok_or_else(|| anyhow!("index buffer {buffer:?} is not resident"))?;
        let restart = pipeline.primitive.topology.is_strip()
            && pipeline.primitive.strip_index_format.is_some();
        let size = format.size() as usize;

        range
            .map(|i| -> Result<Option<u32>> {
                let at = offset as usize + i as usize * size;
                let bytes = data
                    .get(at..at + size)
                    .ok_or_else(|| anyhow!("index {i} lies outside of the index buffer"))?;
                let (value, marker) = match format {
                    IndexFormat::Uint16 => (u16::from_le_bytes([bytes[0], bytes[1]]) as u32, u16::MAX as u32),
                    IndexFormat::Uint32 => (
                        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                        u32::MAX,
                    ),
                };
                Ok(if restart && value == marker {
                    None
                } else {
                    Some((value as i64 + base_vertex as i64) as u32)
                })
            })
            .collect()
    }

    fn draw(&mut self, resources: &Resources, indices: Vec<Option<u32>>, instances: Range<u32>) -> Result<()> {
        let pipeline = self.pipeline.clone().context("draw without a pipeline")?;
        let bindings = bind(resources, &self.bind_groups)?;
        let fetcher = VertexFetcher::new(resources, &pipeline, &self.vertex_buffers)?;
        let clip = self.clip_rect();
        if clip.is_empty() {
            return Ok(());
        }

        let mut raster = Raster {
            pipeline: &pipeline,
            bindings: &bindings,
            colors: &mut self.colors,
            depth: self.depth.as_mut(),
            viewport: self.viewport,
            clip,
            stencil_reference: self.stencil_reference as u8,
        };

        let mut attributes = vec![[0.0, 0.0, 0.0, 1.0]; fetcher.locations];
        for instance in instances {
            let mut cache: HashMap<u32, VertexOutput> = HashMap::new();
            let outputs: Vec<Option<VertexOutput>> = indices
                .iter()
                .map(|index| {
                    index.map(|vertex| {
                        *cache.entry(vertex).or_insert_with(|| {
                            fetcher.fetch(vertex, instance, &mut attributes);
                            let input = VertexInput {
                                vertex_index: vertex,
                                instance_index: instance,
                                attributes: &attributes,
                                bindings: &bindings,
                            };
                            let mut out = VertexOutput::default();
                            (pipeline.vertex)(&input, &mut out);
                            out
                        })
                    })
                })
                .collect();

            for segment in outputs.split(Option::is_none) {
                let segment: Vec<VertexOutput> = segment.iter().flatten().copied().collect();
                raster.primitives(&segment);
            }
        }
        Ok(())
    }

    /// Scissor, viewport bounds and framebuffer, intersected.
    fn clip_rect(&self) -> Rect {
        let vp = self.viewport;
        let x0 = (self.scissor.x as f32).max(vp.x.floor()).max(0.0);
        let y0 = (self.scissor.y as f32).max(vp.y.floor()).max(0.0);
        let x1 = ((self.scissor.x + self.scissor.width) as f32)
            .min((vp.x + vp.width).ceil())
            .min(self.extent.width as f32);
        let y1 = ((self.scissor.y + self.scissor.height) as f32)
            .min((vp.y + vp.height).ceil())
            .min(self.extent.height as f32);
        Rect {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1.max(x0) as u32,
            y1: y1.max(y0) as u32,
        }
    }
}

fn bind<'a>(
    resources: &'a Resources,
    groups: &[Option<(BindGroupId, Vec<u32>)>],
) -> Result<Bindings<'a>> {
    let mut bindings = Bindings::default();
    for (group, slot) in groups.iter().enumerate() {
        let Some((id, offsets)) = slot else {
            continue;
        };
        let entries = resources
            .bind_groups
            .get(id)
            .ok_or_else(|| anyhow!("bind group {id:?} is not resident"))?;
        // Entries are sorted by binding, which is the order of dynamic offsets.
        let mut dynamic = offsets.iter();
        for entry in entries {
            let bound = match entry.resource {
                BindingResource::Buffer(binding) => {
                    let data = resources
                        .buffers
                        .get(&binding.buffer)
                        .ok_or_else(|| anyhow!("buffer {:?} is not resident", binding.buffer))?;
                    let extra = if entry.dynamic {
                        dynamic.next().copied().unwrap_or(0) as u64
                    } else {
                        0
                    };
                    let start = ((binding.offset + extra) as usize).min(data.len());
                    let end = binding
                        .size
                        .map_or(data.len(), |size| start + size.get() as usize)
                        .min(data.len());
                    Bound::Buffer(&data[start..end])
                }
                BindingResource::TextureView(view) => {
                    let view = view_info(resources, view)?;
                    let image = resources.images.get(&view.texture).ok_or_else(|| {
                        anyhow!("texture {:?} is sampled while attached to the pass", view.texture)
                    })?;
                    let level = image
                        .levels
                        .get(view.level as usize)
                        .ok_or_else(|| anyhow!("view level {} is out of range", view.level))?;
                    Bound::Texture {
                        level,
                        layer: view.layer,
                    }
                }
                BindingResource::Sampler(sampler) => Bound::Sampler(
                    *resources
                        .samplers
                        .get(&sampler)
                        .ok_or_else(|| anyhow!("sampler {sampler:?} is not resident"))?,
                ),
            };
            bindings.push(group as u32, entry.binding, bound);
        }
    }
    Ok(bindings)
}

struct VertexFetcher<'a> {
    slots: Vec<&'a [u8]>,
    pipeline: &'a PipelineState,
    locations: usize,
}

impl<'a> VertexFetcher<'a> {
    fn new(
        resources: &'a Resources,
        pipeline: &'a PipelineState,
        bound: &HashMap<u32, (BufferId, u64)>,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(pipeline.vertex_buffers.len());
        let mut locations = 0;
        for (slot, layout) in pipeline.vertex_buffers.iter().enumerate() {
            for attribute in layout.attributes.iter() {
                locations = locations.max(attribute.shader_location as usize + 1);
            }
            let (buffer, offset) = bound
                .get(&(slot as u32))
                .copied()
                .ok_or_else(|| anyhow!("vertex buffer slot {slot} is not bound"))?;
            let data = resources
                .buffers
                .get(&buffer)
                .ok_or_else(|| anyhow!("vertex buffer {buffer:?} is not resident"))?;
            slots.push(data.get(offset as usize..).unwrap_or(&[]));
        }
        Ok(Self {
            slots,
            pipeline,
            locations,
        })
    }

    /// Decodes every attribute of one vertex. Reads past the end of a
    /// buffer yield `(0, 0, 0, 1)`.
    fn fetch(&self, vertex: u32, instance: u32, out: &mut [[f32; 4]]) {
        out.fill([0.0, 0.0, 0.0, 1.0]);
        for (layout, data) in self.pipeline.vertex_buffers.iter().zip(&self.slots) {
            let element = match layout.step_mode {
                VertexStepMode::Vertex => vertex,
                VertexStepMode::Instance => instance,
            } as u64;
            for attribute in layout.attributes.iter() {
                let start = (element * layout.array_stride + attribute.offset) as usize;
                let end = start + attribute.format.size() as usize;
                if let Some(bytes) = data.get(start..end) {
                    out[attribute.shader_location as usize] = decode_attribute(attribute.format, bytes);
                }
            }
        }
    }
}

fn f16_to_f32(half: u16) -> f32 {
    let sign = if half & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = ((half >> 10) & 0x1f) as i32;
    let mantissa = (half & 0x3ff) as f32;
    match exponent {
        0 => sign * mantissa * 2f32.powi(-24),
        31 if mantissa == 0.0 => sign * f32::INFINITY,
        31 => f32::NAN,
        e => sign * (1.0 + mantissa / 1024.0) * 2f32.powi(e - 15),
    }
}

fn decode_attribute(format: VertexFormat, bytes: &[u8]) -> [f32; 4] {
    use VertexFormat::*;
    let mut out = [0.0, 0.0, 0.0, 1.0];
    let size = format.component_size() as usize;
    for (i, c) in bytes.chunks_exact(size).take(format.components() as usize).enumerate() {
        out[i] = match format {
            Uint8x2 | Uint8x4 => c[0] as f32,
            Sint8x2 | Sint8x4 => c[0] as i8 as f32,
            Unorm8x2 | Unorm8x4 => c[0] as f32 / 255.0,
            Snorm8x2 | Snorm8x4 => (c[0] as i8 as f32 / 127.0).max(-1.0),
            Uint16x2 | Uint16x4 => u16::from_le_bytes([c[0], c[1]]) as f32,
            Sint16x2 | Sint16x4 => i16::from_le_bytes([c[0], c[1]]) as f32,
            Unorm16x2 | Unorm16x4 => u16::from_le_bytes([c[0], c[1]]) as f32 / 65535.0,
            Snorm16x2 | Snorm16x4 => (i16::from_le_bytes([c[0], c[1]]) as f32 / 32767.0).max(-1.0),
            Float16x2 | Float16x4 => f16_to_f32(u16::from_le_bytes([c[0], c[1]])),
            Float32 | Float32x2 | Float32x3 | Float32x4 => f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            Uint32 | Uint32x2 | Uint32x3 | Uint32x4 => {
                u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32
            }
            Sint32 | Sint32x2 | Sint32x3 | Sint32x4 => {
                i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f32
            }
        };
    }
    out
}

/// Pixel bounds, exclusive on the far side.
#[derive(Debug, Clone, Copy)]
struct Rect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Rect {
    fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 as f32 && y >= self.y0 as f32 && x < self.x1 as f32 && y < self.y1 as f32
    }
}

/// A vertex after the viewport transform. Varyings are premultiplied by
/// `1 / w` so that plain barycentric interpolation is perspective-correct.
#[derive(Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
    varyings: [[f32; 4]; MAX_VARYINGS],
}

fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

fn is_top_left(from: &ScreenVertex, to: &ScreenVertex) -> bool {
    let dy = to.y - from.y;
    dy < 0.0 || (dy == 0.0 && to.x > from.x)
}

fn covers(w: f32, from: &ScreenVertex, to: &ScreenVertex) -> bool {
    w > 0.0 || (w == 0.0 && is_top_left(from, to))
}

fn lerp_vertex(a: &VertexOutput, b: &VertexOutput, t: f32) -> VertexOutput {
    let mix = |x: [f32; 4], y: [f32; 4]| -> [f32; 4] {
        std::array::from_fn(|c| x[c] + (y[c] - x[c]) * t)
    };
    VertexOutput {
        position: mix(a.position, b.position),
        varyings: std::array::from_fn(|k| mix(a.varyings[k], b.varyings[k])),
    }
}

fn near_distance(position: &[f32; 4]) -> f32 {
    position[2]
}

fn w_distance(position: &[f32; 4]) -> f32 {
    position[3] - 1e-6
}

/// Signed distances to the clip planes that matter for rasterization:
/// the near plane `z >= 0`, and `w > 0` so the perspective divide is defined.
const CLIP_PLANES: [fn(&[f32; 4]) -> f32; 2] = [near_distance, w_distance];

/// Sutherland-Hodgman clipping of a convex polygon.
fn clip_polygon(mut polygon: Vec<VertexOutput>) -> Vec<VertexOutput> {
    for plane in CLIP_PLANES {
        if polygon.len() < 3 {
            break;
        }
        let mut out = Vec::with_capacity(polygon.len() + 1);
        for (i, current) in polygon.iter().enumerate() {
            let next = &polygon[(i + 1) % polygon.len()];
            let dc = plane(&current.position);
            let dn = plane(&next.position);
            if dc >= 0.0 {
                out.push(*current);
            }
            if (dc >= 0.0) != (dn >= 0.0) {
                out.push(lerp_vertex(current, next, dc / (dc - dn)));
            }
        }
        polygon = out;
    }
    polygon
}

fn clip_segment(mut a: VertexOutput, mut b: VertexOutput) -> Option<(VertexOutput, VertexOutput)> {
    for plane in CLIP_PLANES {
        let da = plane(&a.position);
        let db = plane(&b.position);
        match (da >= 0.0, db >= 0.0) {
            (true, true) => {}
            (false, false) => return None,
            (true, false) => b = lerp_vertex(&a, &b, da / (da - db)),
            (false, true) => a = lerp_vertex(&a, &b, da / (da - db)),
        }
    }
    Some((a, b))
}

struct Raster<'r, 'b> {
    pipeline: &'r PipelineState,
    bindings: &'r Bindings<'b>,
    colors: &'r mut [ColorTarget],
    depth: Option<&'r mut DepthTarget>,
    viewport: Viewport,
    clip: Rect,
    stencil_reference: u8,
}

impl Raster<'_, '_> {
    /// Assembles and rasterizes the primitives of one restart-free run of vertices.
    fn primitives(&mut self, vertices: &[VertexOutput]) {
        match self.pipeline.primitive.topology {
            PrimitiveTopology::PointList => {
                for v in vertices {
                    self.point(v);
                }
            }
            PrimitiveTopology::LineList => {
                for pair in vertices.chunks_exact(2) {
                    self.line(&pair[0], &pair[1]);
                }
            }
            PrimitiveTopology::LineStrip => {
                for pair in vertices.windows(2) {
                    self.line(&pair[0], &pair[1]);
                }
            }
            PrimitiveTopology::TriangleList => {
                for tri in vertices.chunks_exact(3) {
                    self.triangle([tri[0], tri[1], tri[2]]);
                }
            }
            PrimitiveTopology::TriangleStrip => {
                for i in 0..vertices.len().saturating_sub(2) {
                    // Odd triangles are flipped to keep a consistent winding.
                    let tri = if i % 2 == 0 {
                        [vertices[i], vertices[i + 1], vertices[i + 2]]
                    } else {
                        [vertices[i + 1], vertices[i], vertices[i + 2]]
                    };
                    self.triangle(tri);
                }
            }
        }
    }

    fn project(&self, v: &VertexOutput) -> ScreenVertex {
        let vp = self.viewport;
        let inv_w = 1.0 / v.position[3];
        let ndc = [v.position[0] * inv_w, v.position[1] * inv_w, v.position[2] * inv_w];
        ScreenVertex {
            x: vp.x + (ndc[0] + 1.0) * 0.5 * vp.width,
            y: vp.y + (1.0 - ndc[1]) * 0.5 * vp.height,
            z: ndc[2],
            inv_w,
            varyings: v.varyings.map(|var| var.map(|c| c * inv_w)),
        }
    }

    fn triangle(&mut self, vertices: [VertexOutput; 3]) {
        let polygon = clip_polygon(vertices.to_vec());
        if polygon.len() < 3 {
            return;
        }
        let screen: Vec<ScreenVertex> = polygon.iter().map(|v| self.project(v)).collect();

        // Shoelace area, in the same sign convention as `edge`.
        let area: f32 = (0..screen.len())
            .map(|i| {
                let a = &screen[i];
                let b = &screen[(i + 1) % screen.len()];
                a.x * b.y - b.x * a.y
            })
            .sum();
        if area == 0.0 {
            return;
        }
        let pipeline = self.pipeline;
        let primitive = &pipeline.primitive;
        // NDC is y-up and the framebuffer y-down, so a counter-clockwise
        // triangle has a negative area here.
        let front_facing = match primitive.front_face {
            FrontFace::Ccw => area < 0.0,
            FrontFace::Cw => area > 0.0,
        };
        let culled = match primitive.cull_mode {
            Some(CullMode::Front) => front_facing,
            Some(CullMode::Back) => !front_facing,
            None => false,
        };
        if culled {
            return;
        }

        match primitive.polygon_mode {
            PolygonMode::Fill => {
                for i in 1..screen.len() - 1 {
                    self.fill(&screen[0], &screen[i], &screen[i + 1], front_facing);
                }
            }
            PolygonMode::Line => {
                for i in 0..screen.len() {
                    self.segment(&screen[i], &screen[(i + 1) % screen.len()], front_facing);
                }
            }
            PolygonMode::Point => {
                for v in &screen {
                    self.dot(v, front_facing);
                }
            }
        }
    }

    fn depth_bias(&self, a: &ScreenVertex, b: &ScreenVertex, c: &ScreenVertex, area: f32) -> f32 {
        let Some(state) = &self.pipeline.depth_stencil else {
            return 0.0;
        };
        let bias = state.bias;
        if bias.constant == 0 && bias.slope_scale == 0.0 {
            return 0.0;
        }
        let dzdx = ((b.z - a.z) * (c.y - a.y) - (c.z - a.z) * (b.y - a.y)) / area;
        let dzdy = ((b.x - a.x) * (c.z - a.z) - (c.x - a.x) * (b.z - a.z)) / area;
        let value = bias.constant as f32 * 2f32.powi(-24) + bias.slope_scale * dzdx.abs().max(dzdy.abs());
        if bias.clamp > 0.0 {
            value.min(bias.clamp)
        } else if bias.clamp < 0.0 {
            value.max(bias.clamp)
        } else {
            value
        }
    }

    fn fill(&mut self, a: &ScreenVertex, b: &ScreenVertex, c: &ScreenVertex, front_facing: bool) {
        let area = edge(a, b, c.x, c.y);
        if area == 0.0 {
            return;
        }
        let (b, c) = if area < 0.0 { (c, b) } else { (b, c) };
        let area = area.abs();
        let bias = self.depth_bias(a, b, c, area);

        let clip = self.clip;
        let x_start = a.x.min(b.x).min(c.x).floor().max(clip.x0 as f32) as u32;
        let x_end = a.x.max(b.x).max(c.x).ceil().min(clip.x1 as f32).max(0.0) as u32;
        let y_start = a.y.min(b.y).min(c.y).floor().max(clip.y0 as f32) as u32;
        let y_end = a.y.max(b.y).max(c.y).ceil().min(clip.y1 as f32).max(0.0) as u32;

        for py in y_start..y_end {
            for px in x_start..x_end {
                let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(b, c, cx, cy);
                let w1 = edge(c, a, cx, cy);
                let w2 = edge(a, b, cx, cy);
                if !(covers(w0, b, c) && covers(w1, c, a) && covers(w2, a, b)) {
                    continue;
                }
                let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
                let z = l0 * a.z + l1 * b.z + l2 * c.z;
                let inv_w = l0 * a.inv_w + l1 * b.inv_w + l2 * c.inv_w;
                let varyings: [[f32; 4]; MAX_VARYINGS] = std::array::from_fn(|k| {
                    std::array::from_fn(|i| {
                        (l0 * a.varyings[k][i] + l1 * b.varyings[k][i] + l2 * c.varyings[k][i]) / inv_w
                    })
                });
                self.fragment(px, py, z, bias, inv_w, front_facing, &varyings);
            }
        }
    }

    fn point(&mut self, v: &VertexOutput) {
        if CLIP_PLANES.iter().any(|plane| plane(&v.position) < 0.0) {
            return;
        }
        let screen = self.project(v);
        self.dot(&screen, true);
    }

    fn dot(&mut self, v: &ScreenVertex, front_facing: bool) {
        if !self.clip.contains(v.x, v.y) {
            return;
        }
        let varyings = v.varyings.map(|var| var.map(|c| c / v.inv_w));
        self.fragment(v.x as u32, v.y as u32, v.z, 0.0, v.inv_w, front_facing, &varyings);
    }

    fn line(&mut self, a: &VertexOutput, b: &VertexOutput) {
        let Some((a, b)) = clip_segment(*a, *b) else {
            return;
        };
        let (a, b) = (self.project(&a), self.project(&b));
        self.segment(&a, &b, true);
    }

    /// Walks a segment one pixel at a time along its major axis. The end
    /// pixel is left out so that strips do not shade joints twice.
    fn segment(&mut self, a: &ScreenVertex, b: &ScreenVertex, front_facing: bool) {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let steps = dx.abs().max(dy.abs()).ceil() as u32;
        for step in 0..steps.max(1) {
            let t = step as f32 / steps.max(1) as f32;
            let (x, y) = (a.x + dx * t, a.y + dy * t);
            if !self.clip.contains(x, y) {
                continue;
            }
            let z = a.z + (b.z - a.z) * t;
            let inv_w = a.inv_w + (b.inv_w - a.inv_w) * t;
            let varyings: [[f32; 4]; MAX_VARYINGS] = std::array::from_fn(|k| {
                std::array::from_fn(|i| (a.varyings[k][i] + (b.varyings[k][i] - a.varyings[k][i]) * t) / inv_w)
            });
            self.fragment(x as u32, y as u32, z, 0.0, inv_w, front_facing, &varyings);
        }
    }

    /// Shades one fragment, then runs the stencil test, the depth test and
    /// blending, in that order.
    #[allow(clippy::too_many_arguments)]
    fn fragment(
        &mut self,
        x: u32,
        y: u32,
        z: f32,
        bias: f32,
        inv_w: f32,
        front_facing: bool,
        varyings: &[[f32; 4]; MAX_VARYINGS],
    ) {
        let pipeline = self.pipeline;
        let unclipped = pipeline.primitive.unclipped_depth;
        if !unclipped && !(0.0..=1.0).contains(&z) {
            return;
        }
        let vp = self.viewport;
        let depth = (vp.min_depth + z * (vp.max_depth - vp.min_depth) + bias).clamp(0.0, 1.0);

        let mut outputs = [[0.0f32; 4]; MAX_COLOR_TARGETS];
        if let Some(kernel) = &pipeline.fragment {
            let input = FragmentInput {
                position: [x as f32 + 0.5, y as f32 + 0.5, depth, inv_w],
                front_facing,
                varyings,
                bindings: self.bindings,
            };
            let count = self.colors.len().clamp(1, MAX_COLOR_TARGETS);
            if !kernel(&input, &mut outputs[..count]) {
                return;
            }
        }

        if let (Some(state), Some(target)) = (&pipeline.depth_stencil, self.depth.as_deref_mut()) {
            let format = target.image.format;
            let Some(level) = target.image.levels.get_mut(target.level as usize) else {
                return;
            };
            let index = level.index(target.layer, x, y);
            let face = if front_facing {
                &state.stencil_front
            } else {
                &state.stencil_back
            };
            let reference = self.stencil_reference;
            let read_mask = state.stencil_read_mask as u8;
            let write_mask = if target.stencil_read_only {
                0
            } else {
                state.stencil_write_mask as u8
            };
            let has_depth = !level.depth.is_empty();
            let stencil = StencilUpdate {
                index,
                reference,
                write_mask,
            };

            if !level.stencil.is_empty()
                && !face
                    .compare
                    .passes(reference & read_mask, level.stencil[index] & read_mask)
            {
                stencil.apply(level, face.fail_op);
                return;
            }
            let depth = quantize_depth(format, depth);
            if has_depth && !state.depth_compare.passes(depth, level.depth[index]) {
                stencil.apply(level, face.depth_fail_op);
                return;
            }
            stencil.apply(level, face.pass_op);
            if has_depth && state.depth_write_enabled && !target.depth_read_only {
                level.depth[index] = depth;
            }
        }

        for (i, target) in self.colors.iter_mut().enumerate() {
            let Some(state) = pipeline.targets.get(i) else {
                continue;
            };
            let format = target.image.format;
            let Some(level) = target.image.levels.get_mut(target.level as usize) else {
                continue;
            };
            let index = level.index(target.layer, x, y);
            let dst = level.color[index];
            let mut value = match &state.blend {
                Some(blend_state) => blend(blend_state, outputs[i], dst),
                None => outputs[i],
            };
            for (c, channel) in CHANNELS.iter().enumerate() {
                if !state.write_mask.contains(*channel) {
                    value[c] = dst[c];
                }
            }
            Image::store_color(format, level, index, value);
        }
    }
}

struct StencilUpdate {
    index: usize,
    reference: u8,
    write_mask: u8,
}

impl StencilUpdate {
    /// Writes `op` through the write mask. No-op on images without stencil.
    fn apply(&self, level: &mut Level, op: StencilOperation) {
        if let Some(old) = level.stencil.get(self.index).copied() {
            let new = op.apply(old, self.reference);
            level.stencil[self.index] = (old & !self.write_mask) | (new & self.write_mask);
        }
    }
}

fn blend_factor(factor: BlendFactor, src: [f32; 4], dst: [f32; 4], c: usize) -> f32 {
    match factor {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::Src => src[c],
        BlendFactor::OneMinusSrc => 1.0 - src[c],
        BlendFactor::SrcAlpha => src[3],
        BlendFactor::OneMinusSrcAlpha => 1.0 - src[3],
        BlendFactor::Dst => dst[c],
        BlendFactor::OneMinusDst => 1.0 - dst[c],
        BlendFactor::DstAlpha => dst[3],
        BlendFactor::OneMinusDstAlpha => 1.0 - dst[3],
    }
}

fn blend(state: &BlendStateDescriptor, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
    std::array::from_fn(|c| {
        let component = if c == 3 { &state.alpha } else { &state.color };
        let s = src[c] * blend_factor(component.src_factor, src, dst, c);
        let d = dst[c] * blend_factor(component.dst_factor, src, dst, c);
        match component.operation {
            BlendOperation::Add => s + d,
            BlendOperation::Subtract => s - d,
            BlendOperation::ReverseSubtract => d - s,
            BlendOperation::Min => src[c].min(dst[c]),
            BlendOperation::Max => src[c].max(dst[c]),
        }
    })
}
