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


// Renders one RGB triangle into an offscreen target on the configured
// backend, reads it back and prints it.
//
//     cargo run -p lyra-demos --bin triangle -- --backend software

use anyhow::{Context, Result};
use lyra_core::math::LinearRgba;
use lyra_core::renderer::api::command::{
    CommandBufferDescriptor, Operations, RenderPassColorAttachment, RenderPassDescriptor,
};
use lyra_core::renderer::api::core::DeviceDescriptor;
use lyra_core::renderer::api::resource::{
    BufferUsage, ImageAspect, ResourceState, StateTransition, TextureDescriptor, TextureUsage,
    TextureViewDescriptor,
};
use lyra_core::renderer::api::pipeline::ColorTargetStateDescriptor;
use lyra_core::renderer::api::util::{IndexFormat, TextureFormat};
use lyra_demos::{ascii_art, init_logging, kernel_library, triangle_pipeline, DemoArgs, Vertex};
use lyra_infra::Rhi;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 32;

const VERTICES: &[Vertex] = &[
    Vertex::new([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
    Vertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
];

const INDICES: &[u32] = &[0, 1, 2];

fn main() -> Result<()> {
    init_logging();
    let config = DemoArgs::from_env()?.resolve_config()?;

    // --- Step 1: Bring up the RHI ---
    let rhi = Rhi::with_kernels(config.rhi_descriptor(None), kernel_library())?;
    let adapter = rhi.request_adapter(&config.adapter_descriptor())?;
    log::info!("Triangle: running on {} ({})", adapter.info().name, adapter.backend());
    let device = adapter.request_device(&DeviceDescriptor {
        label: Some("triangle device".into()),
    })?;
    let compiler = adapter.create_compiler();

    // --- Step 2: Create the GPU objects ---
    let format = TextureFormat::Rgba8Unorm;
    let pipeline = triangle_pipeline(
        &device,
        compiler.as_ref(),
        "Triangle Pipeline",
        ColorTargetStateDescriptor::replace(format),
        None,
    )?;
    let vertex_buffer =
        device.create_buffer_init("Triangle Vertices", BufferUsage::VERTEX, bytemuck::cast_slice(VERTICES))?;
    let index_buffer =
        device.create_buffer_init("Triangle Indices", BufferUsage::INDEX, bytemuck::cast_slice(INDICES))?;
    let target = device.create_texture(&TextureDescriptor::new_2d(
        "Triangle Target",
        format,
        WIDTH,
        HEIGHT,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
    ))?;
    let view = device.create_view(target, &TextureViewDescriptor::default())?;

    // --- Step 3: Record and submit ---
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor {
        label: Some("Triangle Commands".into()),
        ..Default::default()
    });
    recorder.resource_barrier(StateTransition::new(
        target,
        ResourceState::Undefined,
        ResourceState::ColorAttachment,
    ))?;
    recorder.begin_render_pass(&RenderPassDescriptor {
        label: Some("Triangle Pass"),
        color_attachments: &[RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: Operations::clear_store(LinearRgba::BLACK),
        }],
        depth_stencil_attachment: None,
    })?;
    recorder.set_pipeline(pipeline)?;
    recorder.set_vertex_buffer(0, vertex_buffer, 0)?;
    recorder.set_index_buffer(index_buffer, IndexFormat::Uint32, 0)?;
    recorder.draw_indexed(0..INDICES.len() as u32, 0, 0..1)?;
    recorder.end_render_pass()?;
    recorder.resource_barrier(StateTransition::new(
        target,
        ResourceState::ColorAttachment,
        ResourceState::CopySource,
    ))?;
    recorder.submit().context("Failed to submit the triangle")?;

    // --- Step 4: Read the result back ---
    let pixels = device.read_texture(target, ImageAspect::All)?;
    let covered = pixels.chunks_exact(4).filter(|p| p[..3] != [0, 0, 0]).count();
    log::info!(
        "Triangle: {covered} of {} pixels covered, {} live objects",
        WIDTH * HEIGHT,
        device.live_resource_count()
    );
    for line in ascii_art(&pixels, WIDTH) {
        println!("{line}");
    }
    Ok(())
}
