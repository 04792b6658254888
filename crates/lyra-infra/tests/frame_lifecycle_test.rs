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

use common::{headless_surface, kernel_library, render, software_device};
use lyra_core::math::{Extent2D, LinearRgba};
use lyra_core::platform::window::HeadlessTarget;
use lyra_core::renderer::api::command::{BarrierSync, CommandBufferDescriptor};
use lyra_core::renderer::api::resource::{ResourceState, StateTransition};
use lyra_core::renderer::error::{RenderError, ValidationError};
use lyra_core::renderer::FrameState;
use lyra_infra::graphics::software::SOFTWARE_SURFACE_FORMAT;

#[test]
fn test_rendered_frame_is_presented() {
    // --- 1. ARRANGE ---
    let (device, stats) = software_device(kernel_library());
    let target = HeadlessTarget::new(4, 2);
    let mut surface = headless_surface(&device, &target, 2);
    assert_eq!(surface.format(), SOFTWARE_SURFACE_FORMAT);

    // --- 2. ACT ---
    let frame = surface.get_current_texture().unwrap();
    assert!(!frame.is_suboptimal());
    assert_eq!(frame.state(), FrameState::Acquired { suboptimal: false });
    assert_eq!(frame.frame_index(), 1);
    assert_eq!(device.resource_state(frame.texture()), Some(ResourceState::Undefined));

    render(&device, &frame, LinearRgba::RED).unwrap();
    assert_eq!(frame.state(), FrameState::InFlight);
    frame.present().unwrap();
    device.wait().unwrap();

    // --- 3. ASSERT ---
    assert_eq!(surface.last_frame_state(), Some(FrameState::Presented));
    assert_eq!(stats.presents(), 1);
    let presented = stats.last_presented().expect("a presented frame");
    assert_eq!(presented.extent, Extent2D::new(4, 2));
    // Bgra8Unorm: red lands in the third byte.
    assert!(presented.pixels.chunks_exact(4).all(|p| p == [0, 0, 255, 255]));
}

#[test]
fn test_present_without_complete_signal_is_rejected() {
    let (device, stats) = software_device(kernel_library());
    let target = HeadlessTarget::new(4, 4);
    let mut surface = headless_surface(&device, &target, 2);

    let frame = surface.get_current_texture().unwrap();
    let err = frame.present().unwrap_err();

    assert!(matches!(
        err,
        RenderError::Validation(ValidationError::PresentNotReady(_))
    ));
    assert_eq!(surface.last_frame_state(), Some(FrameState::Skipped));
    assert_eq!(stats.presents(), 0);
}

#[test]
fn test_present_requires_present_source_state() {
    let (device, _stats) = software_device(kernel_library());
    let target = HeadlessTarget::new(4, 4);
    let mut surface = headless_surface(&device, &target, 2);

    let frame = surface.get_current_texture().unwrap();
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor::default());
    recorder.wait(frame.available(), BarrierSync::ALL).unwrap();
    recorder
        .resource_barrier(StateTransition::new(
            frame.texture(),
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    recorder.signal(frame.complete(), BarrierSync::ALL).unwrap();
    recorder.submit().unwrap();

    let err = frame.present().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Validation(ValidationError::UnexpectedState {
            ref required,
            tracked: ResourceState::ColorAttachment,
            ..
        }) if *required == [ResourceState::PresentSource]
    ));
    assert_eq!(surface.last_frame_state(), Some(FrameState::Skipped));
}

#[test]
fn test_resized_target_yields_one_suboptimal_frame() {
    // --- 1. ARRANGE ---
    let (device, stats) = software_device(kernel_library());
    let target = HeadlessTarget::new(4, 4);
    let mut surface = headless_surface(&device, &target, 2);
    let live_before = device.live_resource_count();

    // --- 2. ACT ---
    target.resize(6, 3);
    let frame = surface.get_current_texture().unwrap();

    // --- 3. ASSERT ---
    assert!(frame.is_suboptimal());
    assert_eq!(frame.state(), FrameState::Acquired { suboptimal: true });
    // Rendering into it is refused; the caller skips it instead.
    let err = render(&device, &frame, LinearRgba::GREEN).unwrap_err();
    assert!(matches!(
        err,
        RenderError::Validation(ValidationError::RecordingOrder(_))
    ));
    frame.skip();
    assert_eq!(surface.last_frame_state(), Some(FrameState::Skipped));
    assert_eq!(stats.submissions(), 0);
    assert_eq!(stats.presents(), 0);
    assert_eq!(device.live_resource_count(), live_before);

    // The surface reconfigured itself and the next frame is usable.
    let frame = surface.get_current_texture().unwrap();
    assert!(!frame.is_suboptimal());
    assert_eq!(frame.extent(), Extent2D::new(6, 3));
    render(&device, &frame, LinearRgba::GREEN).unwrap();
    frame.present().unwrap();
    device.wait().unwrap();

    assert_eq!(surface.extent(), Extent2D::new(6, 3));
    assert_eq!(stats.presents(), 1);
    let presented = stats.last_presented().unwrap();
    assert_eq!(presented.extent, Extent2D::new(6, 3));
    assert_eq!(presented.pixels.len(), 6 * 3 * 4);
}

#[test]
fn test_dropped_frame_is_skipped_and_released() {
    let (device, _stats) = software_device(kernel_library());
    let target = HeadlessTarget::new(4, 4);
    let mut surface = headless_surface(&device, &target, 2);
    let live_before = device.live_resource_count();

    {
        let frame = surface.get_current_texture().unwrap();
        let texture = frame.texture();
        assert!(device.destroy(texture).is_err(), "frame textures belong to the surface");
    }

    assert_eq!(surface.last_frame_state(), Some(FrameState::Skipped));
    assert_eq!(device.live_resource_count(), live_before);
}

#[test]
fn test_frames_beyond_the_in_flight_limit_wait_for_older_ones() {
    let (device, stats) = software_device(kernel_library());
    let target = HeadlessTarget::new(2, 2);
    let mut surface = headless_surface(&device, &target, 1);

    for (i, color) in [LinearRgba::RED, LinearRgba::GREEN, LinearRgba::BLUE].into_iter().enumerate() {
        let frame = surface.get_current_texture().unwrap();
        assert_eq!(frame.frame_index(), i as u64 + 1);
        render(&device, &frame, color).unwrap();
        frame.present().unwrap();
    }
    device.wait().unwrap();

    assert_eq!(surface.frame_count(), 3);
    assert_eq!(stats.presents(), 3);
    let presented = stats.last_presented().unwrap();
    assert!(presented.pixels.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
}

#[test]
fn test_explicit_resize_reconfigures_and_ignores_zero_sizes() {
    let (device, _stats) = software_device(kernel_library());
    let target = HeadlessTarget::new(4, 4);
    let mut surface = headless_surface(&device, &target, 2);

    surface.resize(0, 0).unwrap();
    assert_eq!(surface.extent(), Extent2D::new(4, 4));

    surface.resize(8, 2).unwrap();
    assert_eq!(surface.extent(), Extent2D::new(8, 2));
    assert_eq!(target.extent(), Extent2D::new(8, 2));
    let frame = surface.get_current_texture().unwrap();
    assert!(!frame.is_suboptimal());
}
