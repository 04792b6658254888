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

// Two-pass stencil masking on one shared depth-stencil attachment. Pass one
// stamps a triangle into the stencil plane without touching color; pass two
// draws that triangle plus a cyan copy behind it, and only the stamped
// region comes out.
//
//     cargo run -p lyra-demos --bin stencil_test -- --backend software

use anyhow::{Context, Result};
use lyra_core::math::LinearRgba;
use lyra_core::renderer::api::command::{
    CommandBufferDescriptor, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, StoreOp,
};
use lyra_core::renderer::api::core::DeviceDescriptor;
use lyra_core::renderer::api::pipeline::{
    ColorTargetStateDescriptor, ColorWrites, CompareFunction, DepthStencilStateDescriptor,
    StencilFaceState, StencilOperation,
};
use lyra_core::renderer::api::resource::{
    BufferUsage, ImageAspect, ResourceState, StateTransition, TextureDescriptor, TextureUsage,
    TextureViewDescriptor,
};
use lyra_core::renderer::api::util::{IndexFormat, TextureFormat};
use lyra_demos::{ascii_art, init_logging, kernel_library, triangle_pipeline, DemoArgs, Vertex};
use lyra_infra::Rhi;

const SIZE: u32 = 24;
const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;
const STENCIL_REFERENCE: u32 = 1;

const YELLOW: [f32; 3] = [1.0, 1.0, 0.0];
const CYAN: [f32; 3] = [0.0, 1.0, 1.0];

const MASK_VERTICES: &[Vertex] = &[
    Vertex::new([0.0, 0.0, 0.0], YELLOW),
    Vertex::new([1.0, 0.0, 0.0], YELLOW),
    Vertex::new([0.0, 1.0, 0.0], YELLOW),
];
const MASK_INDICES: &[u32] = &[0, 1, 2];

const DRAW_VERTICES: &[Vertex] = &[
    Vertex::new([0.0, 0.0, 0.0], YELLOW),
    Vertex::new([1.0, 0.0, 0.0], YELLOW),
    Vertex::new([0.0, 1.0, 0.0], YELLOW),
    Vertex::new([-0.25, -0.25, 0.5], CYAN),
    Vertex::new([0.75, -0.25, 0.5], CYAN),
    Vertex::new([-0.25, 0.75, 0.5], CYAN),
];
const DRAW_INDICES: &[u32] = &[0, 1, 2, 3, 4, 5];

/// Pass 1 stencil state: always passes, replaces bit 0, never reads.
fn mask_state() -> DepthStencilStateDescriptor {
    let face = StencilFaceState {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Replace,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Replace,
    };
    DepthStencilStateDescriptor {
        stencil_front: face,
        stencil_back: face,
        stencil_read_mask: 0x0,
        stencil_write_mask: 0x1,
        ..DepthStencilStateDescriptor::depth(DEPTH_FORMAT, false, CompareFunction::Always)
    }
}

/// Pass 2 stencil state: equal to the reference on bit 0, never written.
fn draw_state() -> DepthStencilStateDescriptor {
    let face = StencilFaceState {
        compare: CompareFunction::Equal,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
    DepthStencilStateDescriptor {
        stencil_front: face,
        stencil_back: face,
        stencil_read_mask: 0x1,
        stencil_write_mask: 0x0,
        ..DepthStencilStateDescriptor::depth(DEPTH_FORMAT, true, CompareFunction::LessEqual)
    }
}

fn main() -> Result<()> {
    init_logging();
    let config = DemoArgs::from_env()?.resolve_config()?;

    // --- Step 1: Bring up the RHI ---
    let rhi = Rhi::with_kernels(config.rhi_descriptor(None), kernel_library())?;
    let adapter = rhi.request_adapter(&config.adapter_descriptor())?;
    log::info!("StencilTest: running on {} ({})", adapter.info().name, adapter.backend());
    let device = adapter.request_device(&DeviceDescriptor {
        label: Some("stencil device".into()),
    })?;
    let compiler = adapter.create_compiler();

    // --- Step 2: Create the GPU objects ---
    let mask_pipeline = triangle_pipeline(
        &device,
        compiler.as_ref(),
        "Stencil Mask Pipeline",
        ColorTargetStateDescriptor {
            write_mask: ColorWrites::EMPTY,
            ..ColorTargetStateDescriptor::replace(COLOR_FORMAT)
        },
        Some(mask_state()),
    )?;
    let draw_pipeline = triangle_pipeline(
        &device,
        compiler.as_ref(),
        "Stencil Draw Pipeline",
        ColorTargetStateDescriptor::replace(COLOR_FORMAT),
        Some(draw_state()),
    )?;
    let mask_vertices =
        device.create_buffer_init("Mask Vertices", BufferUsage::VERTEX, bytemuck::cast_slice(MASK_VERTICES))?;
    let mask_indices =
        device.create_buffer_init("Mask Indices", BufferUsage::INDEX, bytemuck::cast_slice(MASK_INDICES))?;
    let draw_vertices =
        device.create_buffer_init("Draw Vertices", BufferUsage::VERTEX, bytemuck::cast_slice(DRAW_VERTICES))?;
    let draw_indices =
        device.create_buffer_init("Draw Indices", BufferUsage::INDEX, bytemuck::cast_slice(DRAW_INDICES))?;

    let color = device.create_texture(&TextureDescriptor::new_2d(
        "Stencil Color",
        COLOR_FORMAT,
        SIZE,
        SIZE,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
    ))?;
    let color_view = device.create_view(color, &TextureViewDescriptor::default())?;
    let depth = device.create_texture(&TextureDescriptor::new_2d(
        "Stencil Depth",
        DEPTH_FORMAT,
        SIZE,
        SIZE,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
    ))?;
    let depth_view = device.create_view(depth, &TextureViewDescriptor::default())?;

    // --- Step 3: Record both passes ---
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor {
        label: Some("Stencil Commands".into()),
        ..Default::default()
    });
    recorder.resource_barrier(StateTransition::new(
        color,
        ResourceState::Undefined,
        ResourceState::ColorAttachment,
    ))?;
    recorder.resource_barrier(StateTransition::new(
        depth,
        ResourceState::Undefined,
        ResourceState::DepthStencilAttachment,
    ))?;

    // Pass 1 keeps the stencil plane and throws the depth plane away.
    recorder.begin_render_pass(&RenderPassDescriptor {
        label: Some("Write Mask"),
        color_attachments: &[RenderPassColorAttachment {
            view: color_view,
            resolve_target: None,
            ops: Operations {
                load: LoadOp::Clear(LinearRgba::BLACK),
                store: StoreOp::Discard,
            },
        }],
        depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
            view: depth_view,
            depth_ops: Some(Operations {
                load: LoadOp::Clear(1.0),
                store: StoreOp::Discard,
            }),
            depth_read_only: false,
            stencil_ops: Some(Operations::clear_store(0)),
            stencil_read_only: false,
        }),
    })?;
    recorder.set_pipeline(mask_pipeline)?;
    recorder.set_stencil_reference(STENCIL_REFERENCE)?;
    recorder.set_vertex_buffer(0, mask_vertices, 0)?;
    recorder.set_index_buffer(mask_indices, IndexFormat::Uint32, 0)?;
    recorder.draw_indexed(0..MASK_INDICES.len() as u32, 0, 0..1)?;
    recorder.end_render_pass()?;

    // Pass 2 loads the stencil plane read-only and depth-tests its own draws.
    recorder.begin_render_pass(&RenderPassDescriptor {
        label: Some("Masked Draw"),
        color_attachments: &[RenderPassColorAttachment {
            view: color_view,
            resolve_target: None,
            ops: Operations::clear_store(LinearRgba::BLACK),
        }],
        depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
            view: depth_view,
            depth_ops: Some(Operations::clear_store(1.0)),
            depth_read_only: false,
            stencil_ops: Some(Operations::load_store()),
            stencil_read_only: true,
        }),
    })?;
    recorder.set_pipeline(draw_pipeline)?;
    recorder.set_stencil_reference(STENCIL_REFERENCE)?;
    recorder.set_vertex_buffer(0, draw_vertices, 0)?;
    recorder.set_index_buffer(draw_indices, IndexFormat::Uint32, 0)?;
    recorder.draw_indexed(0..DRAW_INDICES.len() as u32, 0, 0..1)?;
    recorder.end_render_pass()?;

    recorder.resource_barrier(StateTransition::new(
        color,
        ResourceState::ColorAttachment,
        ResourceState::CopySource,
    ))?;
    recorder.submit().context("Failed to submit the stencil passes")?;

    // --- Step 4: Check the result ---
    let pixels = device.read_texture(color, ImageAspect::All)?;
    let stencil = device.read_texture(depth, ImageAspect::StencilOnly)?;
    for line in ascii_art(&pixels, SIZE) {
        println!("{line}");
    }
    let stamped = stencil.iter().filter(|&&s| s == 1).count();
    let leaked = pixels
        .chunks_exact(4)
        .zip(&stencil)
        .filter(|(p, &s)| (p[..3] != [0, 0, 0]) != (s == 1))
        .count();
    if stamped > 0 && leaked == 0 {
        log::info!("StencilTest: {stamped} stamped pixels, color exactly inside the mask: OK");
        Ok(())
    } else {
        anyhow::bail!("StencilTest: {stamped} stamped pixels, {leaked} disagree with the mask")
    }
}
