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
    headless_surface, kernel_library, render, software_device_with_backend, vertex_buffer,
};
use lyra_core::math::LinearRgba;
use lyra_core::platform::window::HeadlessTarget;
use lyra_core::renderer::api::command::CommandBufferDescriptor;
use lyra_core::renderer::api::resource::ResourceState;
use lyra_core::renderer::error::RenderError;
use lyra_core::renderer::FrameState;

#[test]
fn test_device_lost_mid_frame_fails_without_hanging() {
    // --- 1. ARRANGE ---
    let (device, backend, stats) = software_device_with_backend(kernel_library());
    let target = HeadlessTarget::new(4, 4);
    let mut surface = headless_surface(&device, &target, 2);
    let vertices = vertex_buffer(&device, &[[0.0, 0.0, 1.0, 1.0, 1.0]]);

    // One frame reaches the screen before the loss.
    let frame = surface.get_current_texture().unwrap();
    render(&device, &frame, LinearRgba::RED).unwrap();
    frame.present().unwrap();

    // --- 2. ACT ---
    let frame = surface.get_current_texture().unwrap();
    backend.simulate_device_loss();
    let result = render(&device, &frame, LinearRgba::BLUE);

    // --- 3. ASSERT ---
    assert!(matches!(result, Err(RenderError::DeviceLost)));
    assert!(device.is_lost());
    // Nothing of the failed buffer took effect.
    assert_eq!(device.resource_state(frame.texture()), Some(ResourceState::Undefined));
    assert!(!frame.complete().is_scheduled());
    assert_eq!(frame.state(), FrameState::Acquired { suboptimal: false });

    // Dropping the frame returns instead of waiting on a signal nobody sets.
    drop(frame);
    assert_eq!(surface.last_frame_state(), Some(FrameState::Skipped));

    assert!(matches!(
        surface.get_current_texture(),
        Err(RenderError::DeviceLost)
    ));
    let recorder = device.create_command_buffer(&CommandBufferDescriptor::default());
    assert!(matches!(recorder.submit(), Err(RenderError::DeviceLost)));
    assert!(matches!(device.destroy(vertices), Ok(())));

    drop(surface);
    assert_eq!(device.live_resource_count(), 0);
    drop(device);
    assert_eq!(stats.presents(), 1);
    assert_eq!(stats.submissions(), 1);
    assert_eq!(stats.live(), 0);
}

#[test]
fn test_loss_seen_first_by_acquisition_refuses_later_work() {
    let (device, backend, stats) = software_device_with_backend(kernel_library());
    let target = HeadlessTarget::new(2, 2);
    let mut surface = headless_surface(&device, &target, 1);
    let _vertices = vertex_buffer(&device, &[[0.0, 0.0, 0.0, 0.0, 0.0]]);

    backend.simulate_device_loss();
    assert!(matches!(
        surface.get_current_texture(),
        Err(RenderError::DeviceLost)
    ));
    // The failed acquisition leaves no frame behind.
    assert_eq!(device.live_resource_count(), 1);

    let recorder = device.create_command_buffer(&CommandBufferDescriptor::default());
    assert!(matches!(recorder.submit(), Err(RenderError::DeviceLost)));
    assert!(device.is_lost());

    // Teardown still reclaims what was left alive.
    drop(surface);
    drop(device);
    assert_eq!(stats.submissions(), 0);
    assert_eq!(stats.releases(), stats.allocations());
}
