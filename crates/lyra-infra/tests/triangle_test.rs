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


mod common;

use approx::assert_abs_diff_eq;
use common::{
    clear, colored_pipeline, index_buffer, kernel_library, positioned_pipeline, software_device, texel,
    texture, vertex_buffer,
};
use lyra_core::math::LinearRgba;
use lyra_core::renderer::api::command::{
    CommandBufferDescriptor, Operations, RenderPassColorAttachment, RenderPassDescriptor,
};
use lyra_core::renderer::api::pipeline::ColorTargetStateDescriptor;
use lyra_core::renderer::api::resource::{BufferUsage, ImageAspect, ResourceState, StateTransition};
use lyra_core::renderer::api::util::{IndexFormat, TextureFormat};

const SIZE: u32 = 8;

#[test]
fn test_rgb_triangle_is_interpolated_across_its_surface() {
    // --- 1. ARRANGE ---
    let library = kernel_library();
    let (device, stats) = software_device(library.clone());
    let (target, view) = texture(&device, "target", TextureFormat::Rgba8Unorm, SIZE, SIZE);
    let pipeline = positioned_pipeline(
        &device,
        library,
        ColorTargetStateDescriptor::replace(TextureFormat::Rgba8Unorm),
        None,
    );
    let vertices = vertex_buffer(
        &device,
        &[
            [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        ],
    );
    let indices = index_buffer(&device, &[0, 1, 2]);

    // --- 2. ACT ---
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor {
        label: Some("triangle".into()),
        ..Default::default()
    });
    recorder
        .resource_barrier(StateTransition::new(
            target,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("triangle pass"),
            color_attachments: &[RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations::clear_store(LinearRgba::BLACK),
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    recorder.set_pipeline(pipeline).unwrap();
    recorder.set_vertex_buffer(0, vertices, 0).unwrap();
    recorder.set_index_buffer(indices, IndexFormat::Uint32, 0).unwrap();
    recorder.draw_indexed(0..3, 0, 0..1).unwrap();
    recorder.end_render_pass().unwrap();
    recorder
        .resource_barrier(StateTransition::new(
            target,
            ResourceState::ColorAttachment,
            ResourceState::CopySource,
        ))
        .unwrap();
    recorder.submit().unwrap();
    let pixels = device.read_texture(target, ImageAspect::All).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(pixels.len(), (SIZE * SIZE * 4) as usize);
    assert_eq!(device.resource_state(target), Some(ResourceState::CopySource));
    assert_eq!(stats.submissions(), 1);

    // The triangle lives in the upper-right quadrant, below its diagonal.
    for y in 0..SIZE {
        for x in 0..SIZE {
            if x < SIZE / 2 || y >= SIZE / 2 {
                assert_eq!(texel(&pixels, SIZE, x, y), [0, 0, 0, 255], "pixel ({x}, {y})");
            }
        }
    }
    assert_eq!(texel(&pixels, SIZE, SIZE - 1, 0), [0, 0, 0, 255]);

    // Pixel (4, 3) is centered on NDC (0.125, 0.125): weights 0.75 red,
    // 0.125 green and 0.125 blue.
    let [r, g, b, a] = texel(&pixels, SIZE, 4, 3);
    assert_abs_diff_eq!(r as f32, 0.75 * 255.0, epsilon = 2.0);
    assert_abs_diff_eq!(g as f32, 0.125 * 255.0, epsilon = 2.0);
    assert_abs_diff_eq!(b as f32, 0.125 * 255.0, epsilon = 2.0);
    assert_eq!(a, 255);

    // Pixel (5, 2) at NDC (0.375, 0.375) leans towards green and blue.
    let [r, g, b, _] = texel(&pixels, SIZE, 5, 2);
    assert_abs_diff_eq!(r as f32, 0.25 * 255.0, epsilon = 2.0);
    assert_abs_diff_eq!(g as f32, 0.375 * 255.0, epsilon = 2.0);
    assert_abs_diff_eq!(b as f32, 0.375 * 255.0, epsilon = 2.0);
}

#[test]
fn test_full_screen_triangle_covers_every_pixel() {
    let library = kernel_library();
    let (device, _stats) = software_device(library.clone());
    let (target, view) = texture(&device, "target", TextureFormat::Rgba8Unorm, SIZE, SIZE);
    let pipeline = colored_pipeline(&device, library, TextureFormat::Rgba8Unorm, None);
    let vertices = vertex_buffer(
        &device,
        &[
            [-1.0, -1.0, 0.0, 1.0, 0.0],
            [3.0, -1.0, 0.0, 1.0, 0.0],
            [-1.0, 3.0, 0.0, 1.0, 0.0],
        ],
    );
    clear(&device, target, view, LinearRgba::RED);

    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor::default());
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: None,
            color_attachments: &[RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations::load_store(),
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    recorder.set_pipeline(pipeline).unwrap();
    recorder.set_vertex_buffer(0, vertices, 0).unwrap();
    recorder.draw(0..3, 0..1).unwrap();
    recorder.end_render_pass().unwrap();
    recorder.submit().unwrap();

    let pixels = device.read_texture(target, ImageAspect::All).unwrap();
    assert!(
        pixels.chunks_exact(4).all(|p| p == [0, 255, 0, 255]),
        "every pixel should be green"
    );
}

#[test]
fn test_indexed_quad_fills_only_its_half() {
    let library = kernel_library();
    let (device, _stats) = software_device(library.clone());
    let (target, view) = texture(&device, "target", TextureFormat::Rgba8Unorm, SIZE, SIZE);
    let pipeline = colored_pipeline(&device, library, TextureFormat::Rgba8Unorm, None);
    let vertices = vertex_buffer(
        &device,
        &[
            [-1.0, -1.0, 1.0, 0.0, 0.0],
            [0.0, -1.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 1.0, 0.0, 0.0],
            [-1.0, 1.0, 1.0, 0.0, 0.0],
        ],
    );
    let indices: Vec<u8> = [0u16, 1, 2, 2, 3, 0]
        .iter()
        .flat_map(|i| i.to_le_bytes())
        .collect();
    let indices = device
        .create_buffer_init("indices", BufferUsage::INDEX, &indices)
        .unwrap();

    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor::default());
    recorder
        .resource_barrier(StateTransition::new(
            target,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("quad"),
            color_attachments: &[RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations::clear_store(LinearRgba::BLACK),
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    recorder.set_pipeline(pipeline).unwrap();
    recorder.set_vertex_buffer(0, vertices, 0).unwrap();
    recorder.set_index_buffer(indices, IndexFormat::Uint16, 0).unwrap();
    recorder.draw_indexed(0..6, 0, 0..1).unwrap();
    recorder.end_render_pass().unwrap();
    recorder.submit().unwrap();

    let pixels = device.read_texture(target, ImageAspect::All).unwrap();
    for y in 0..SIZE {
        for x in 0..SIZE {
            let expected = if x < SIZE / 2 { [255, 0, 0, 255] } else { [0, 0, 0, 255] };
            assert_eq!(texel(&pixels, SIZE, x, y), expected, "pixel ({x}, {y})");
        }
    }
}
