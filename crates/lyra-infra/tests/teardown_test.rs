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

use common::*;
use lyra_core::math::LinearRgba;
use lyra_core::platform::window::{HeadlessTarget, SurfaceTarget};
use lyra_core::renderer::api::core::{
    AdapterDescriptor, BackendKind, DeviceDescriptor, PresentMode, RhiDescriptor,
    SurfaceDescriptor,
};
use lyra_core::renderer::api::resource::{BufferDescriptor, BufferUsage, ImageAspect};
use lyra_core::renderer::api::util::TextureFormat;
use lyra_core::renderer::FrameState;
use lyra_infra::Rhi;

#[test]
fn test_teardown_releases_every_object_exactly_once() {
    // --- 1. ARRANGE ---
    let library = kernel_library();
    let (device, stats) = software_device(library.clone());
    let _pipeline = colored_pipeline(&device, library, TextureFormat::Rgba8Unorm, None);
    let _vertices = vertex_buffer(&device, &[[0.0; 5]; 3]);
    let (texture, view) = texture(&device, "target", TextureFormat::Rgba8Unorm, 4, 4);
    clear(&device, texture, view, LinearRgba::GREEN);
    let scratch = device
        .create_buffer(&BufferDescriptor::new("scratch", 16, BufferUsage::COPY_DST))
        .unwrap();
    device.destroy(scratch).unwrap();
    let target = HeadlessTarget::new(4, 4);
    let mut surface = device
        .create_surface(&SurfaceDescriptor {
            label: Some("teardown".into()),
            target: SurfaceTarget::Headless(target),
            present_mode: PresentMode::Fifo,
            frames_in_flight: 2,
        })
        .unwrap();
    let frame = surface.get_current_texture().unwrap();
    frame.skip();
    let live_before = device.live_resource_count();
    assert!(live_before > 0);
    assert!(stats.live() > 0);

    // --- 2. ACT ---
    let _ = device.read_texture(texture, ImageAspect::All).unwrap();
    drop(surface);
    drop(device);

    // --- 3. ASSERT ---
    assert_eq!(stats.live(), 0);
    assert_eq!(stats.releases(), stats.allocations());
    assert_eq!(stats.submissions(), 1);
}

#[test]
fn test_device_outlives_its_cloned_handles() {
    // --- 1. ARRANGE ---
    let (device, stats) = software_device(kernel_library());
    let clone = device.clone();
    let _buffer = clone
        .create_buffer(&BufferDescriptor::new("kept", 16, BufferUsage::VERTEX))
        .unwrap();

    // --- 2. ACT ---
    drop(device);

    // --- 3. ASSERT ---
    assert_eq!(stats.live(), 1);
    assert_eq!(clone.live_resource_count(), 1);
    drop(clone);
    assert_eq!(stats.live(), 0);
}

#[test]
fn test_software_rhi_renders_a_headless_frame() {
    // --- 1. ARRANGE ---
    let rhi = Rhi::with_kernels(
        RhiDescriptor {
            backend: BackendKind::Software,
            ..Default::default()
        },
        kernel_library(),
    )
    .unwrap();
    let adapter = rhi.request_adapter(&AdapterDescriptor::default()).unwrap();
    let device = adapter
        .request_device(&DeviceDescriptor {
            label: Some("rhi device".into()),
        })
        .unwrap();
    let mut surface = rhi
        .request_surface(
            &device,
            &SurfaceDescriptor {
                label: Some("rhi surface".into()),
                target: SurfaceTarget::Headless(HeadlessTarget::new(2, 2)),
                present_mode: PresentMode::Fifo,
                frames_in_flight: 2,
            },
        )
        .unwrap();

    // --- 2. ACT ---
    let frame = surface.get_current_texture().unwrap();
    let index = frame.frame_index();
    frame.skip();

    // --- 3. ASSERT ---
    assert_eq!(adapter.backend(), BackendKind::Software);
    assert_eq!(index, 1);
    assert_eq!(surface.last_frame_state(), Some(FrameState::Skipped));
    assert_eq!(device.live_resource_count(), 0);
}
