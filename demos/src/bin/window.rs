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


// Opens a window and presents an animated clear color with a triangle on
// top, acquiring, rendering and presenting one frame per redraw.
//
//     cargo run -p lyra-demos --bin window -- --config lyra.json

use anyhow::{Context, Result};
use lyra_core::math::LinearRgba;
use lyra_core::platform::event::{EventDispatcher, WindowInfo};
use lyra_core::platform::input::KeyCode;
use lyra_core::platform::window::LyraWindow;
use lyra_core::renderer::api::command::{
    BarrierSync, CommandBufferDescriptor, Operations, RenderPassColorAttachment,
    RenderPassDescriptor,
};
use lyra_core::renderer::api::core::DeviceDescriptor;
use lyra_core::renderer::api::pipeline::{ColorTargetStateDescriptor, RenderPipelineId};
use lyra_core::renderer::api::resource::{BufferId, BufferUsage, ResourceState, StateTransition};
use lyra_core::renderer::FrameState;
use lyra_core::{Device, RhiConfig, Surface};
use lyra_demos::{init_logging, kernel_library, triangle_pipeline, DemoArgs, Vertex};
use lyra_infra::platform::winit::{run_event_loop, WinitWindow};
use lyra_infra::Rhi;

const VERTICES: &[Vertex] = &[
    Vertex::new([0.0, 0.5, 0.0], [1.0, 0.0, 0.0]),
    Vertex::new([-0.5, -0.5, 0.0], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, -0.5, 0.0], [0.0, 0.0, 1.0]),
];

struct WindowDemo {
    device: Device,
    surface: Surface,
    pipeline: RenderPipelineId,
    vertex_buffer: BufferId,
    time: f32,
    presented: u64,
    skipped: u64,
}

impl WindowDemo {
    fn new(config: &RhiConfig, window: &WinitWindow) -> Result<Self> {
        log::info!("WindowDemo: Initializing GPU resources...");
        let rhi = Rhi::with_kernels(
            config.rhi_descriptor(Some(window.clone_handle_arc())),
            kernel_library(),
        )?;
        let adapter = rhi.request_adapter(&config.adapter_descriptor())?;
        log::info!("WindowDemo: running on {} ({})", adapter.info().name, adapter.backend());
        let device = adapter.request_device(&DeviceDescriptor {
            label: Some("window device".into()),
        })?;

        let target = rhi
            .window_target(window.inner_size())
            .context("the RHI was initialized without a window")?;
        let surface = rhi.request_surface(&device, &config.surface_descriptor(target))?;

        let compiler = adapter.create_compiler();
        let pipeline = triangle_pipeline(
            &device,
            compiler.as_ref(),
            "Window Triangle Pipeline",
            ColorTargetStateDescriptor::replace(surface.format()),
            None,
        )?;
        let vertex_buffer = device.create_buffer_init(
            "Window Triangle Vertices",
            BufferUsage::VERTEX,
            bytemuck::cast_slice(VERTICES),
        )?;

        Ok(Self {
            device,
            surface,
            pipeline,
            vertex_buffer,
            time: 0.0,
            presented: 0,
            skipped: 0,
        })
    }

    fn clear_color(&self) -> LinearRgba {
        let pulse = 0.5 + 0.5 * self.time.sin();
        LinearRgba::rgb(0.05, 0.05 + 0.15 * pulse, 0.1 + 0.2 * pulse)
    }

    fn render(&mut self) -> Result<()> {
        let clear = self.clear_color();
        let frame = self.surface.get_current_texture()?;
        if frame.is_suboptimal() {
            log::debug!("WindowDemo: frame {} is suboptimal, skipping", frame.frame_index());
            frame.skip();
            self.skipped += 1;
            return Ok(());
        }

        let mut recorder = self.device.create_command_buffer(&CommandBufferDescriptor {
            label: Some("Window Frame".into()),
            ..Default::default()
        });
        recorder.wait(frame.available(), BarrierSync::RENDER_TARGET)?;
        recorder.resource_barrier(StateTransition::new(
            frame.texture(),
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))?;
        recorder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Window Pass"),
            color_attachments: &[RenderPassColorAttachment {
                view: frame.view(),
                resolve_target: None,
                ops: Operations::clear_store(clear),
            }],
            depth_stencil_attachment: None,
        })?;
        recorder.set_pipeline(self.pipeline)?;
        recorder.set_vertex_buffer(0, self.vertex_buffer, 0)?;
        recorder.draw(0..VERTICES.len() as u32, 0..1)?;
        recorder.end_render_pass()?;
        recorder.resource_barrier(StateTransition::new(
            frame.texture(),
            ResourceState::ColorAttachment,
            ResourceState::PresentSource,
        ))?;
        recorder.signal(frame.complete(), BarrierSync::ALL)?;
        recorder.submit()?;
        frame.present()?;

        if self.surface.last_frame_state() == Some(FrameState::Presented) {
            self.presented += 1;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    init_logging();
    let config = DemoArgs::from_env()?.resolve_config()?;

    let mut dispatcher = EventDispatcher::<WindowDemo>::new();
    dispatcher.bind_start(|demo| {
        log::info!(
            "WindowDemo: surface ready at {}x{}",
            demo.surface.extent().width,
            demo.surface.extent().height
        );
        Ok(())
    });
    dispatcher.bind_update(|demo, input| {
        demo.time += input.delta_time;
        if input.is_key_down(KeyCode::Space) {
            demo.time = 0.0;
        }
        Ok(())
    });
    dispatcher.bind_render(|demo| demo.render());
    dispatcher.bind_resize(|demo, info: WindowInfo| {
        demo.surface.resize(info.width, info.height)?;
        Ok(())
    });
    dispatcher.bind_close(|demo| {
        demo.device.wait()?;
        log::info!(
            "WindowDemo: {} frames presented, {} skipped",
            demo.presented,
            demo.skipped
        );
        Ok(())
    });

    let factory_config = config.clone();
    run_event_loop(
        &config,
        move |window| WindowDemo::new(&factory_config, window),
        dispatcher,
    )
}
