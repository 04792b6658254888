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


//! Integration tests for the usage rules the device enforces: state
//! tracking across submissions, handle lifetimes, bind groups, pipelines
//! and buffer mappings.

mod common;

use common::*;
use lyra_core::math::{LinearRgba, Mat4, Vec3};
use lyra_core::renderer::api::command::{
    BarrierSync, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindGroupLayoutId, BindingResource, BufferBinding,
    CommandBufferDescriptor, Operations, RenderPassColorAttachment, RenderPassDescriptor, Signal,
};
use lyra_core::renderer::api::pipeline::{VertexAttributeDescriptor, VertexFormat};
use lyra_core::renderer::api::resource::{
    BufferDescriptor, BufferId, BufferUsage, ImageAspect, ResourceState, StateTransition,
};
use lyra_core::renderer::api::util::{ShaderStageFlags, TextureFormat};
use lyra_core::renderer::error::{PipelineError, RenderError, ResourceError, ValidationError};
use lyra_core::renderer::CommandRecorder;
use lyra_core::Device;
use lyra_infra::graphics::software::KernelLibrary;
use std::num::NonZeroU64;
use std::sync::Arc;

const WIDTH: u32 = 8;
const HEIGHT: u32 = 8;
const FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const RED: [u8; 4] = [255, 0, 0, 255];
const BLACK: [u8; 4] = [0, 0, 0, 255];

fn recorder(device: &Device, label: &'static str) -> CommandRecorder {
    device.create_command_buffer(&CommandBufferDescriptor {
        label: Some(label.into()),
        ..Default::default()
    })
}

fn left_half_red(device: &Device) -> BufferId {
    vertex_buffer(
        device,
        &[
            [-1.0, -1.0, 1.0, 0.0, 0.0],
            [0.0, -1.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 1.0, 0.0, 0.0],
            [-1.0, -1.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 1.0, 0.0, 0.0],
            [-1.0, 1.0, 1.0, 0.0, 0.0],
        ],
    )
}

fn uniform_layout(device: &Device) -> BindGroupLayoutId {
    device
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("transform layout".into()),
            entries: &[BindGroupLayoutEntry::uniform_buffer(0, ShaderStageFlags::VERTEX)],
        })
        .unwrap()
}

/// Draws the left-half quad through the `transformed` pipeline into a
/// fresh black target and reads it back.
fn draw_transformed(
    device: &Device,
    library: Arc<KernelLibrary>,
    uniform: BufferId,
) -> Vec<u8> {
    let layout = uniform_layout(device);
    let bind_group = device
        .create_bind_group(&BindGroupDescriptor {
            label: Some("transform".into()),
            layout,
            entries: &[BindGroupEntry::whole_buffer(0, uniform)],
        })
        .unwrap();
    let stages = shader_stages(device, library, "transformed", TRANSFORMED_WGSL);
    let pipeline = device
        .create_render_pipeline(&pipeline_descriptor(
            pipeline_layout(device, &[layout]),
            stages,
            &ATTRIBUTES,
            FORMAT,
            None,
        ))
        .unwrap();
    let vertices = left_half_red(device);
    let (target, view) = texture(device, "target", FORMAT, WIDTH, HEIGHT);
    clear(device, target, view, LinearRgba::BLACK);

    let mut recorder = recorder(device, "transformed");
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("transformed"),
            color_attachments: &[RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations::load_store(),
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    recorder.set_pipeline(pipeline).unwrap();
    recorder.set_bind_group(0, bind_group, &[]).unwrap();
    recorder.set_vertex_buffer(0, vertices, 0).unwrap();
    recorder.draw(0..6, 0..1).unwrap();
    recorder.end_render_pass().unwrap();
    recorder
        .resource_barrier(StateTransition::new(
            target,
            ResourceState::ColorAttachment,
            ResourceState::CopySource,
        ))
        .unwrap();
    recorder.submit().unwrap();
    device.read_texture(target, ImageAspect::All).unwrap()
}

#[test]
fn test_barrier_must_declare_the_state_left_by_earlier_submissions() {
    // --- 1. ARRANGE ---
    let (device, _stats) = software_device(kernel_library());
    let (target, _view) = texture(&device, "target", FORMAT, WIDTH, HEIGHT);
    let mut first = recorder(&device, "first");
    first
        .resource_barrier(StateTransition::new(
            target,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    first.submit().unwrap();

    // --- 2. ACT ---
    let mut second = recorder(&device, "second");
    let result = second.resource_barrier(StateTransition::new(
        target,
        ResourceState::Undefined,
        ResourceState::CopySource,
    ));

    // --- 3. ASSERT ---
    assert_eq!(
        result,
        Err(ValidationError::StateMismatch {
            resource: target.into(),
            declared: ResourceState::Undefined,
            tracked: ResourceState::ColorAttachment,
        })
    );
    assert_eq!(
        device.resource_state(target),
        Some(ResourceState::ColorAttachment)
    );
}

#[test]
fn test_buffers_recorded_against_the_same_state_cannot_both_submit() {
    // --- 1. ARRANGE ---
    let (device, stats) = software_device(kernel_library());
    let (target, _view) = texture(&device, "target", FORMAT, WIDTH, HEIGHT);
    let transition =
        StateTransition::new(target, ResourceState::Undefined, ResourceState::ColorAttachment);
    let mut first = recorder(&device, "first");
    first.resource_barrier(transition).unwrap();
    let mut second = recorder(&device, "second");
    second.resource_barrier(transition).unwrap();
    let first = first.finish().unwrap();
    let second = second.finish().unwrap();

    // --- 2. ACT ---
    device.submit(first).unwrap();
    let result = device.submit(second);

    // --- 3. ASSERT ---
    assert!(matches!(
        result,
        Err(RenderError::Validation(ValidationError::StateMismatch {
            declared: ResourceState::Undefined,
            tracked: ResourceState::ColorAttachment,
            ..
        }))
    ));
    device.wait().unwrap();
    assert_eq!(stats.submissions(), 1);
}

#[test]
fn test_destroyed_handle_is_stale_at_submit() {
    // --- 1. ARRANGE ---
    let (device, stats) = software_device(kernel_library());
    let source = device
        .create_buffer_init("source", BufferUsage::COPY_SRC, &[1, 2, 3, 4])
        .unwrap();
    let destination = device
        .create_buffer(&BufferDescriptor::new("destination", 4, BufferUsage::COPY_DST))
        .unwrap();
    let mut recorder = recorder(&device, "copy");
    recorder
        .copy_buffer_to_buffer(source, 0, destination, 0, 4)
        .unwrap();

    // --- 2. ACT ---
    device.destroy(source).unwrap();
    let result = recorder.submit();

    // --- 3. ASSERT ---
    assert!(matches!(
        result,
        Err(RenderError::Validation(ValidationError::StaleHandle(_)))
    ));
    assert!(device.resource_state(source).is_none());
    device.wait().unwrap();
    assert_eq!(stats.submissions(), 0);
}

#[test]
fn test_bind_group_must_match_its_layout() {
    // --- 1. ARRANGE ---
    let (device, _stats) = software_device(kernel_library());
    let layout = uniform_layout(&device);
    let uniform = device
        .create_buffer(&BufferDescriptor::new("uniform", 64, BufferUsage::UNIFORM))
        .unwrap();
    let vertex_only = device
        .create_buffer(&BufferDescriptor::new("vertices", 64, BufferUsage::VERTEX))
        .unwrap();
    let bind = |entries: &[BindGroupEntry]| {
        device.create_bind_group(&BindGroupDescriptor {
            label: Some("bad".into()),
            layout,
            entries,
        })
    };

    // --- 2. ACT ---
    let missing = bind(&[]);
    let wrong_binding = bind(&[BindGroupEntry::whole_buffer(1, uniform)]);
    let wrong_usage = bind(&[BindGroupEntry::whole_buffer(0, vertex_only)]);
    let overrun = bind(&[BindGroupEntry {
        binding: 0,
        resource: BindingResource::Buffer(BufferBinding {
            buffer: uniform,
            offset: 0,
            size: NonZeroU64::new(128),
        }),
    }]);
    let good = bind(&[BindGroupEntry::whole_buffer(0, uniform)]);

    // --- 3. ASSERT ---
    assert!(matches!(
        missing,
        Err(ResourceError::Validation(ValidationError::BindGroupMismatch { .. }))
    ));
    assert!(matches!(
        wrong_binding,
        Err(ResourceError::Validation(ValidationError::BindGroupMismatch { .. }))
    ));
    assert!(matches!(
        wrong_usage,
        Err(ResourceError::Validation(ValidationError::MissingUsage { .. }))
    ));
    assert!(matches!(
        overrun,
        Err(ResourceError::Validation(ValidationError::OutOfBounds(_)))
    ));
    assert!(good.is_ok());
}

#[test]
fn test_pipeline_is_cross_checked_against_its_shaders() {
    // --- 1. ARRANGE ---
    let library = kernel_library();
    let (device, _stats) = software_device(library.clone());
    let colored = shader_stages(&device, library.clone(), "colored", COLORED_WGSL);
    let transformed = shader_stages(&device, library, "transformed", TRANSFORMED_WGSL);
    let empty_layout = pipeline_layout(&device, &[]);
    let position_only = [VertexAttributeDescriptor {
        shader_location: 0,
        format: VertexFormat::Float32x2,
        offset: 0,
    }];

    // --- 2. ACT ---
    let missing_input = device.create_render_pipeline(&pipeline_descriptor(
        empty_layout,
        colored,
        &position_only,
        FORMAT,
        None,
    ));
    let missing_uniform = device.create_render_pipeline(&pipeline_descriptor(
        empty_layout,
        transformed,
        &ATTRIBUTES,
        FORMAT,
        None,
    ));
    let swapped_stages = device.create_render_pipeline(&pipeline_descriptor(
        empty_layout,
        (colored.1, colored.0),
        &ATTRIBUTES,
        FORMAT,
        None,
    ));

    // --- 3. ASSERT ---
    assert!(matches!(
        missing_input,
        Err(ResourceError::Pipeline(PipelineError::VertexInputMismatch { location: 1, .. }))
    ));
    assert!(matches!(
        missing_uniform,
        Err(ResourceError::Pipeline(PipelineError::BindSlotMismatch {
            group: 0,
            binding: 0,
            ..
        }))
    ));
    assert!(matches!(
        swapped_stages,
        Err(ResourceError::Pipeline(PipelineError::StageMismatch { .. }))
    ));
}

#[test]
fn test_draw_without_its_bind_group_is_rejected() {
    // --- 1. ARRANGE ---
    let library = kernel_library();
    let (device, _stats) = software_device(library.clone());
    let layout = uniform_layout(&device);
    let stages = shader_stages(&device, library, "transformed", TRANSFORMED_WGSL);
    let pipeline = device
        .create_render_pipeline(&pipeline_descriptor(
            pipeline_layout(&device, &[layout]),
            stages,
            &ATTRIBUTES,
            FORMAT,
            None,
        ))
        .unwrap();
    let vertices = left_half_red(&device);
    let (target, view) = texture(&device, "target", FORMAT, WIDTH, HEIGHT);
    let mut recorder = recorder(&device, "unbound");
    recorder
        .resource_barrier(StateTransition::new(
            target,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("unbound"),
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

    // --- 2. ACT ---
    let result = recorder.draw(0..6, 0..1);

    // --- 3. ASSERT ---
    assert!(matches!(result, Err(ValidationError::IncompleteDrawState(_))));
    assert!(matches!(
        recorder.draw(0..7, 0..1),
        Err(ValidationError::IncompleteDrawState(_))
    ));
}

#[test]
fn test_uniform_transform_moves_geometry() {
    // --- 1. ARRANGE ---
    let library = kernel_library();
    let (device, _stats) = software_device(library.clone());
    let shift = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
    let uniform = device
        .create_buffer_init(
            "transform",
            BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            bytemuck::bytes_of(&shift),
        )
        .unwrap();

    // --- 2. ACT ---
    let shifted = draw_transformed(&device, library.clone(), uniform);
    device
        .write_buffer(uniform, 0, bytemuck::bytes_of(&Mat4::IDENTITY))
        .unwrap();
    let identity = draw_transformed(&device, library, uniform);

    // --- 3. ASSERT ---
    assert_eq!(texel(&shifted, WIDTH, 2, 4), BLACK);
    assert_eq!(texel(&shifted, WIDTH, 6, 4), RED);
    assert_eq!(texel(&identity, WIDTH, 2, 4), RED);
    assert_eq!(texel(&identity, WIDTH, 6, 4), BLACK);
}

#[test]
fn test_buffer_copy_is_read_back() {
    // --- 1. ARRANGE ---
    let (device, _stats) = software_device(kernel_library());
    let bytes: Vec<u8> = (1..=16).collect();
    let source = device
        .create_buffer_init("source", BufferUsage::COPY_SRC, &bytes)
        .unwrap();
    let destination = device
        .create_buffer(&BufferDescriptor::new(
            "destination",
            16,
            BufferUsage::COPY_DST | BufferUsage::MAP_READ,
        ))
        .unwrap();
    let mut recorder = recorder(&device, "copy");
    recorder
        .copy_buffer_to_buffer(source, 4, destination, 0, 8)
        .unwrap();

    // --- 2. ACT ---
    recorder.submit().unwrap();
    let read = device.read_buffer(destination, 0, 16).unwrap();

    // --- 3. ASSERT ---
    assert_eq!(&read[..8], &bytes[4..12]);
    assert_eq!(&read[8..], &[0; 8]);
    assert!(matches!(
        device.read_buffer(source, 8, 16),
        Err(RenderError::Validation(ValidationError::OutOfBounds(_)))
    ));
}

#[test]
fn test_ranges_that_overflow_are_out_of_bounds() {
    let (device, _stats) = software_device(kernel_library());
    let layout = uniform_layout(&device);
    let uniform = device
        .create_buffer(&BufferDescriptor::new("uniform", 64, BufferUsage::UNIFORM))
        .unwrap();
    let source = device
        .create_buffer(&BufferDescriptor::new("source", 16, BufferUsage::COPY_SRC))
        .unwrap();
    let destination = device
        .create_buffer(&BufferDescriptor::new("destination", 16, BufferUsage::COPY_DST))
        .unwrap();

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("huge".into()),
        layout,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: BindingResource::Buffer(BufferBinding {
                buffer: uniform,
                offset: 256,
                size: NonZeroU64::new(u64::MAX),
            }),
        }],
    });
    assert!(matches!(
        bind_group,
        Err(ResourceError::Validation(ValidationError::OutOfBounds(_)))
    ));

    let mut recorder = recorder(&device, "huge copy");
    assert!(matches!(
        recorder.copy_buffer_to_buffer(source, 4, destination, 0, u64::MAX - 3),
        Err(ValidationError::OutOfBounds(_))
    ));
    assert!(matches!(
        recorder.copy_buffer_to_buffer(source, 0, destination, 4, u64::MAX - 3),
        Err(ValidationError::OutOfBounds(_))
    ));
    recorder.submit().unwrap();
}

#[test]
fn test_mapping_closes_on_first_submission() {
    // --- 1. ARRANGE ---
    let (device, _stats) = software_device(kernel_library());
    let staging = device
        .create_buffer(
            &BufferDescriptor::new("staging", 8, BufferUsage::COPY_SRC | BufferUsage::MAP_WRITE)
                .mapped(),
        )
        .unwrap();
    let destination = device
        .create_buffer(&BufferDescriptor::new(
            "destination",
            8,
            BufferUsage::COPY_DST | BufferUsage::MAP_READ,
        ))
        .unwrap();
    device.write_mapped(staging, 0, &[9, 8, 7, 6]).unwrap();
    let mut recorder = recorder(&device, "upload");
    recorder
        .copy_buffer_to_buffer(staging, 0, destination, 0, 8)
        .unwrap();

    // --- 2. ACT ---
    recorder.submit().unwrap();
    let late_write = device.write_mapped(staging, 4, &[1, 2, 3, 4]);

    // --- 3. ASSERT ---
    assert!(matches!(
        late_write,
        Err(ResourceError::Validation(ValidationError::BufferNotMapped(id))) if id == staging
    ));
    assert_eq!(
        device.read_buffer(destination, 0, 8).unwrap(),
        vec![9, 8, 7, 6, 0, 0, 0, 0]
    );
}

#[test]
fn test_invalid_buffer_descriptors_are_rejected() {
    // --- 1. ARRANGE ---
    let (device, stats) = software_device(kernel_library());

    // --- 2. ACT ---
    let empty = device.create_buffer(&BufferDescriptor::new("empty", 0, BufferUsage::VERTEX));
    let no_usage = device.create_buffer(&BufferDescriptor::new("none", 16, BufferUsage::EMPTY));
    let odd_mapping = device.create_buffer(
        &BufferDescriptor::new("odd", 6, BufferUsage::COPY_SRC | BufferUsage::MAP_WRITE).mapped(),
    );
    let readable_vertices = device.create_buffer(&BufferDescriptor::new(
        "readable",
        16,
        BufferUsage::VERTEX | BufferUsage::MAP_READ,
    ));

    // --- 3. ASSERT ---
    for result in [empty, no_usage, odd_mapping, readable_vertices] {
        assert!(matches!(
            result,
            Err(ResourceError::Validation(ValidationError::InvalidDescriptor { .. }))
        ));
    }
    assert_eq!(stats.allocations(), 0);
}

#[test]
fn test_signal_ordering_is_enforced() {
    // --- 1. ARRANGE ---
    let (device, _stats) = software_device(kernel_library());
    let done = Signal::new("done");
    let never = Signal::new("never");

    // --- 2. ACT ---
    let mut first = recorder(&device, "first");
    first.signal(&done, BarrierSync::ALL).unwrap();
    let twice = first.signal(&done, BarrierSync::ALL);
    first.submit().unwrap();

    let mut again = recorder(&device, "again");
    let rescheduled = again.signal(&done, BarrierSync::ALL);

    let mut waiting = recorder(&device, "waiting");
    waiting.wait(&never, BarrierSync::ALL).unwrap();
    let unscheduled = waiting.submit();

    let mut after = recorder(&device, "after");
    after.wait(&done, BarrierSync::ALL).unwrap();
    after.submit().unwrap();
    device.wait().unwrap();

    // --- 3. ASSERT ---
    assert!(matches!(twice, Err(ValidationError::RecordingOrder(_))));
    assert!(matches!(rescheduled, Err(ValidationError::RecordingOrder(_))));
    assert!(matches!(
        unscheduled,
        Err(RenderError::Validation(ValidationError::RecordingOrder(_)))
    ));
    assert!(done.is_set());
    assert!(!never.is_set());
}

#[test]
fn test_commands_out_of_place_are_rejected() {
    // --- 1. ARRANGE ---
    let (device, _stats) = software_device(kernel_library());
    let (target, view) = texture(&device, "target", FORMAT, WIDTH, HEIGHT);
    let mut recorder = recorder(&device, "order");

    // --- 2. ACT ---
    let draw_outside = recorder.draw(0..3, 0..1);
    recorder
        .resource_barrier(StateTransition::new(
            target,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("open"),
            color_attachments: &[RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations::clear_store(LinearRgba::BLACK),
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    let barrier_inside = recorder.resource_barrier(StateTransition::new(
        target,
        ResourceState::ColorAttachment,
        ResourceState::CopySource,
    ));
    let finished = recorder.finish();

    // --- 3. ASSERT ---
    assert!(matches!(draw_outside, Err(ValidationError::RecordingOrder(_))));
    assert!(matches!(barrier_inside, Err(ValidationError::RecordingOrder(_))));
    assert!(matches!(finished, Err(ValidationError::RecordingOrder(_))));
    assert_eq!(device.resource_state(target), Some(ResourceState::Undefined));
}
