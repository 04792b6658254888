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

use common::{
    clear, colored_pipeline, index_buffer, kernel_library, positioned_pipeline, software_device, texel,
    texture, vertex_buffer,
};
use lyra_core::math::LinearRgba;
use lyra_core::renderer::api::command::{
    CommandBufferDescriptor, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor, StoreOp,
};
use lyra_core::renderer::api::pipeline::{
    ColorTargetStateDescriptor, ColorWrites, CompareFunction, DepthStencilStateDescriptor,
    StencilFaceState, StencilOperation,
};
use lyra_core::renderer::api::resource::{ImageAspect, ResourceState, StateTransition};
use lyra_core::renderer::api::util::{IndexFormat, TextureFormat};
use lyra_core::renderer::error::ValidationError;

const SIZE: u32 = 8;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;
const STENCIL_REFERENCE: u32 = 1;

const YELLOW: [f32; 3] = [1.0, 1.0, 0.0];
const CYAN: [f32; 3] = [0.0, 1.0, 1.0];

/// The mask triangle T.
fn mask_triangle() -> [[f32; 6]; 3] {
    [
        [0.0, 0.0, 0.0, YELLOW[0], YELLOW[1], YELLOW[2]],
        [1.0, 0.0, 0.0, YELLOW[0], YELLOW[1], YELLOW[2]],
        [0.0, 1.0, 0.0, YELLOW[0], YELLOW[1], YELLOW[2]],
    ]
}

/// T again, then a cyan copy moved down-left and further away.
fn draw_triangles() -> [[f32; 6]; 6] {
    let [a, b, c] = mask_triangle();
    let behind = |v: [f32; 6]| [v[0] - 0.25, v[1] - 0.25, 0.5, CYAN[0], CYAN[1], CYAN[2]];
    [a, b, c, behind(a), behind(b), behind(c)]
}

fn stencil_state(compare: CompareFunction, pass_op: StencilOperation) -> DepthStencilStateDescriptor {
    let face = StencilFaceState {
        compare,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op,
    };
    DepthStencilStateDescriptor {
        stencil_front: face,
        stencil_back: face,
        ..DepthStencilStateDescriptor::depth(DEPTH_FORMAT, false, CompareFunction::Always)
    }
}

/// Pass 1: no color writes, no depth, stencil always replaced through bit 0.
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

/// Pass 2: depth tested and written, stencil compared through bit 0 and kept.
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

/// Where the center of pixel `(x, y)` falls against T, or `None` when it
/// sits on an edge and the fill rule decides.
fn inside_mask(x: u32, y: u32) -> Option<bool> {
    let half = SIZE as f32 / 2.0;
    let u = (x as f32 + 0.5) / half - 1.0;
    let v = 1.0 - (y as f32 + 0.5) / half;
    let edges = [u, v, 1.0 - u - v];
    if edges.iter().all(|&e| e > 1e-4) {
        Some(true)
    } else if edges.iter().any(|&e| e < -1e-4) {
        Some(false)
    } else {
        None
    }
}

/// Whether the center of pixel `(x, y)` is strictly inside the cyan copy.
fn inside_behind(x: u32, y: u32) -> bool {
    let half = SIZE as f32 / 2.0;
    let u = (x as f32 + 0.5) / half - 1.0 + 0.25;
    let v = 1.0 - (y as f32 + 0.5) / half + 0.25;
    u > 1e-4 && v > 1e-4 && 1.0 - u - v > 1e-4
}

#[test]
fn test_second_pass_draws_only_where_the_first_wrote_stencil() {
    // --- 1. ARRANGE ---
    let library = kernel_library();
    let (device, _stats) = software_device(library.clone());
    let (color, color_view) = texture(&device, "color", TextureFormat::Rgba8Unorm, SIZE, SIZE);
    let (depth, depth_view) = texture(&device, "depth-stencil", DEPTH_FORMAT, SIZE, SIZE);
    let mask_pipeline = positioned_pipeline(
        &device,
        library.clone(),
        ColorTargetStateDescriptor {
            write_mask: ColorWrites::EMPTY,
            ..ColorTargetStateDescriptor::replace(TextureFormat::Rgba8Unorm)
        },
        Some(mask_state()),
    );
    let draw_pipeline = positioned_pipeline(
        &device,
        library,
        ColorTargetStateDescriptor::replace(TextureFormat::Rgba8Unorm),
        Some(draw_state()),
    );
    let mask_vertices = vertex_buffer(&device, &mask_triangle());
    let mask_indices = index_buffer(&device, &[0, 1, 2]);
    let draw_vertices = vertex_buffer(&device, &draw_triangles());
    let draw_indices = index_buffer(&device, &[0, 1, 2, 3, 4, 5]);
    // Red marks anything pass 1 would have touched.
    clear(&device, color, color_view, LinearRgba::RED);

    // --- 2. ACT ---
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor {
        label: Some("stencil mask".into()),
        ..Default::default()
    });
    recorder
        .resource_barrier(StateTransition::new(
            depth,
            ResourceState::Undefined,
            ResourceState::DepthStencilAttachment,
        ))
        .unwrap();
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("write mask"),
            color_attachments: &[RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: Operations::load_store(),
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
        })
        .unwrap();
    recorder.set_pipeline(mask_pipeline).unwrap();
    recorder.set_stencil_reference(STENCIL_REFERENCE).unwrap();
    recorder.set_vertex_buffer(0, mask_vertices, 0).unwrap();
    recorder.set_index_buffer(mask_indices, IndexFormat::Uint32, 0).unwrap();
    recorder.draw_indexed(0..3, 0, 0..1).unwrap();
    recorder.end_render_pass().unwrap();
    recorder.submit().unwrap();
    let masked_color = device.read_texture(color, ImageAspect::All).unwrap();
    let stencil = device.read_texture(depth, ImageAspect::StencilOnly).unwrap();

    // The stencil plane is loaded, the depth plane cleared and written.
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor {
        label: Some("stencil draw".into()),
        ..Default::default()
    });
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("masked draw"),
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
        })
        .unwrap();
    recorder.set_pipeline(draw_pipeline).unwrap();
    recorder.set_stencil_reference(STENCIL_REFERENCE).unwrap();
    recorder.set_vertex_buffer(0, draw_vertices, 0).unwrap();
    recorder.set_index_buffer(draw_indices, IndexFormat::Uint32, 0).unwrap();
    recorder.draw_indexed(0..6, 0, 0..1).unwrap();
    recorder.end_render_pass().unwrap();
    recorder.submit().unwrap();
    let pixels = device.read_texture(color, ImageAspect::All).unwrap();
    let stencil_after = device.read_texture(depth, ImageAspect::StencilOnly).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(stencil.len(), (SIZE * SIZE) as usize);
    assert_eq!(stencil_after, stencil, "pass 2 must not change the stencil plane");
    assert_eq!(device.resource_state(depth), Some(ResourceState::DepthStencilAttachment));
    assert!(
        masked_color.chunks_exact(4).all(|p| p == [255, 0, 0, 255]),
        "pass 1 must not write color"
    );

    let mut stamped = 0;
    let mut hidden_behind = 0;
    for y in 0..SIZE {
        for x in 0..SIZE {
            let value = stencil[(y * SIZE + x) as usize];
            match inside_mask(x, y) {
                Some(inside) => {
                    assert_eq!(value, u8::from(inside), "stencil at ({x}, {y})");
                }
                None => assert!(value <= 1, "stencil at ({x}, {y}) is {value}"),
            }
            stamped += usize::from(value == 1);

            let expected = if value == 1 { [255, 255, 0, 255] } else { [0, 0, 0, 255] };
            assert_eq!(texel(&pixels, SIZE, x, y), expected, "color at ({x}, {y})");
            if inside_mask(x, y) == Some(false) && inside_behind(x, y) {
                hidden_behind += 1;
            }
        }
    }
    assert!(stamped > 0, "the mask stamped nothing");
    assert!(hidden_behind > 0, "the cyan copy should reach past T");
}

#[test]
fn test_pass_on_untransitioned_attachment_is_rejected() {
    let library = kernel_library();
    let (device, _stats) = software_device(library);
    let (_, color_view) = texture(&device, "color", TextureFormat::Rgba8Unorm, SIZE, SIZE);
    let (depth, depth_view) = texture(&device, "depth-stencil", DEPTH_FORMAT, SIZE, SIZE);

    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor::default());
    recorder
        .resource_barrier(StateTransition::new(
            depth,
            ResourceState::Undefined,
            ResourceState::DepthStencilReadOnly,
        ))
        .unwrap();
    // The color target is still `Undefined`.
    let err = recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("read only"),
            color_attachments: &[RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: Operations::clear_store(LinearRgba::BLACK),
            }],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: None,
                depth_read_only: true,
                stencil_ops: None,
                stencil_read_only: true,
            }),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::UnexpectedState {
            ref required,
            tracked: ResourceState::Undefined,
            ..
        } if *required == [ResourceState::ColorAttachment]
    ));

    // A writable stencil plane needs its own load and store operations.
    let err = recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("missing ops"),
            color_attachments: &[],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: None,
                depth_read_only: true,
                stencil_ops: None,
                stencil_read_only: false,
            }),
        })
        .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidDescriptor { .. }));
}

#[test]
fn test_pipeline_without_depth_state_is_rejected_in_depth_pass() {
    let library = kernel_library();
    let (device, _stats) = software_device(library.clone());
    let (color, color_view) = texture(&device, "color", TextureFormat::Rgba8Unorm, SIZE, SIZE);
    let (depth, depth_view) = texture(&device, "depth-stencil", DEPTH_FORMAT, SIZE, SIZE);
    let plain = colored_pipeline(&device, library.clone(), TextureFormat::Rgba8Unorm, None);
    let writer = colored_pipeline(
        &device,
        library,
        TextureFormat::Rgba8Unorm,
        Some(stencil_state(CompareFunction::Always, StencilOperation::Replace)),
    );

    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor::default());
    recorder
        .resource_barrier(StateTransition::new(
            color,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    recorder
        .resource_barrier(StateTransition::new(
            depth,
            ResourceState::Undefined,
            ResourceState::DepthStencilReadOnly,
        ))
        .unwrap();
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("read only"),
            color_attachments: &[RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: Operations::clear_store(LinearRgba::BLACK),
            }],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: None,
                depth_read_only: true,
                stencil_ops: None,
                stencil_read_only: true,
            }),
        })
        .unwrap();

    let err = recorder.set_pipeline(plain).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::DepthStencilFormatMismatch {
            pipeline_format: None,
            attachment_format: Some(DEPTH_FORMAT),
            ..
        }
    ));
    let err = recorder.set_pipeline(writer).unwrap_err();
    assert!(matches!(err, ValidationError::RecordingOrder(_)));

    // Nothing usable was bound, so the buffer cannot draw.
    assert!(matches!(
        recorder.draw(0..3, 0..1),
        Err(ValidationError::IncompleteDrawState(_))
    ));
    recorder.end_render_pass().unwrap();
    let commands = recorder.finish().unwrap();
    device.submit(commands).unwrap();
}

#[test]
fn test_read_only_attachment_error_names_both_accepted_states() {
    // --- 1. ARRANGE ---
    let library = kernel_library();
    let (device, _stats) = software_device(library);
    let (depth, depth_view) = texture(&device, "depth-stencil", DEPTH_FORMAT, SIZE, SIZE);
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor::default());

    // --- 2. ACT ---
    let err = recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("depth test only"),
            color_attachments: &[],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: None,
                depth_read_only: true,
                stencil_ops: None,
                stencil_read_only: true,
            }),
        })
        .unwrap_err();

    // --- 3. ASSERT ---
    assert_eq!(
        err,
        ValidationError::UnexpectedState {
            resource: depth.into(),
            required: vec![
                ResourceState::DepthStencilReadOnly,
                ResourceState::DepthStencilAttachment,
            ],
            tracked: ResourceState::Undefined,
        }
    );
    assert!(format!("{err}").contains("DepthStencilReadOnly or DepthStencilAttachment"));
}
