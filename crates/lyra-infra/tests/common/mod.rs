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


//! Fixtures shared by the software backend integration tests.

#![allow(dead_code)]

use lyra_core::renderer::api::command::{
    BarrierSync, CommandBufferDescriptor, Operations, RenderPassColorAttachment,
    RenderPassDescriptor,
};
use lyra_core::renderer::api::command::BindGroupLayoutId;
use lyra_core::renderer::api::core::{
    CompileDescriptor, CompileFlags, DeviceDescriptor, PresentMode, ShaderModuleDescriptor,
    ShaderModuleId, SurfaceDescriptor,
};
use lyra_core::renderer::api::pipeline::{
    ColorTargetStateDescriptor, DepthStencilStateDescriptor, FragmentStateDescriptor,
    MultisampleStateDescriptor, PipelineLayoutDescriptor, PipelineLayoutId, PrimitiveStateDescriptor,
    RenderPipelineDescriptor, RenderPipelineId, VertexAttributeDescriptor,
    VertexBufferLayoutDescriptor, VertexFormat, VertexStateDescriptor, VertexStepMode,
};
use lyra_core::renderer::api::resource::{
    BufferId, BufferUsage, ResourceState, StateTransition, TextureDescriptor, TextureId,
    TextureUsage, TextureViewDescriptor, TextureViewId,
};
use lyra_core::renderer::api::util::TextureFormat;
use lyra_core::renderer::traits::ShaderCompiler;
use lyra_core::math::LinearRgba;
use lyra_core::platform::window::{HeadlessTarget, SurfaceTarget};
use lyra_core::renderer::error::RenderError;
use lyra_core::{Device, Surface, SurfaceTexture};
use lyra_infra::graphics::software::{kernels, KernelLibrary, SoftwareDevice, SoftwareStats};
use lyra_infra::shader::SoftwareCompiler;
use std::borrow::Cow;
use std::sync::Arc;

/// A 2D position and an RGB color per vertex.
pub const COLORED_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) color: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position, 0.0, 1.0);
    out.color = vec4<f32>(color, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// The `colored` module with a 3D position, as the samples upload it.
pub const POSITIONED_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) color: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position, 1.0);
    out.color = vec4<f32>(color, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// The `colored` module, with its position transformed by a uniform matrix.
pub const TRANSFORMED_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> transform: mat4x4<f32>;

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) color: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = transform * vec4<f32>(position, 0.0, 1.0);
    out.color = vec4<f32>(color, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Bytes between two vertices of [`vertex_bytes`].
pub const VERTEX_STRIDE: u64 = 20;

/// Position at location 0, color at location 1.
pub const ATTRIBUTES: [VertexAttributeDescriptor; 2] = [
    VertexAttributeDescriptor {
        shader_location: 0,
        format: VertexFormat::Float32x2,
        offset: 0,
    },
    VertexAttributeDescriptor {
        shader_location: 1,
        format: VertexFormat::Float32x3,
        offset: 8,
    },
];

/// Bytes between two `[x, y, z, r, g, b]` vertices.
pub const POSITIONED_STRIDE: u64 = 24;

/// Position at location 0, color at location 1, both three floats.
pub const POSITIONED_ATTRIBUTES: [VertexAttributeDescriptor; 2] = [
    VertexAttributeDescriptor {
        shader_location: 0,
        format: VertexFormat::Float32x3,
        offset: 0,
    },
    VertexAttributeDescriptor {
        shader_location: 1,
        format: VertexFormat::Float32x3,
        offset: 12,
    },
];

/// Kernels for the `colored`, `positioned` and `transformed` modules.
pub fn kernel_library() -> Arc<KernelLibrary> {
    let library = KernelLibrary::new();
    library.register_vertex("colored", "vs_main", kernels::pass_through);
    library.register_fragment("colored", "fs_main", kernels::varying_color);
    library.register_vertex("positioned", "vs_main", kernels::pass_through);
    library.register_fragment("positioned", "fs_main", kernels::varying_color);
    library.register_vertex("transformed", "vs_main", kernels::transformed);
    library.register_fragment("transformed", "fs_main", kernels::varying_color);
    Arc::new(library)
}

/// A device on the software rasterizer, with its counters.
pub fn software_device(library: Arc<KernelLibrary>) -> (Device, Arc<SoftwareStats>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = SoftwareDevice::new(library).expect("the software device starts");
    let stats = backend.stats();
    let device = Device::new(
        Box::new(backend),
        &DeviceDescriptor {
            label: Some("test device".into()),
        },
    );
    (device, stats)
}

/// Like [`software_device`], also handing back a clone of the backend so a
/// test can act on it behind the device's back.
pub fn software_device_with_backend(
    library: Arc<KernelLibrary>,
) -> (Device, SoftwareDevice, Arc<SoftwareStats>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = SoftwareDevice::new(library).expect("the software device starts");
    let stats = backend.stats();
    let device = Device::new(
        Box::new(backend.clone()),
        &DeviceDescriptor {
            label: Some("test device".into()),
        },
    );
    (device, backend, stats)
}

/// Packs vertices of `N` floats, such as `[x, y, r, g, b]`.
pub fn vertex_bytes<const N: usize>(vertices: &[[f32; N]]) -> Vec<u8> {
    vertices
        .iter()
        .flatten()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

/// Uploads vertices into a vertex buffer.
pub fn vertex_buffer<const N: usize>(device: &Device, vertices: &[[f32; N]]) -> BufferId {
    device
        .create_buffer_init("vertices", BufferUsage::VERTEX, &vertex_bytes(vertices))
        .expect("vertex buffer")
}

/// Uploads 32-bit indices into an index buffer.
pub fn index_buffer(device: &Device, indices: &[u32]) -> BufferId {
    let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
    device
        .create_buffer_init("indices", BufferUsage::INDEX, &bytes)
        .expect("index buffer")
}

/// Compiles `source` as `module` and creates its `vs_main` and `fs_main`
/// shader modules.
pub fn shader_stages(
    device: &Device,
    library: Arc<KernelLibrary>,
    module: &str,
    source: &str,
) -> (ShaderModuleId, ShaderModuleId) {
    let compiler = SoftwareCompiler::new(library, CompileFlags::REFLECT);
    let compiled = compiler
        .compile(&CompileDescriptor {
            module: module.into(),
            path: None,
            source: Some(source.into()),
        })
        .expect("the module compiles");
    let stage = |entry_point: &str| {
        let blob = compiled.get_shader_blob(entry_point).expect("entry point");
        device
            .create_shader_module(&ShaderModuleDescriptor {
                label: Some(format!("{module}::{entry_point}").into()),
                blob: &blob,
            })
            .expect("shader module")
    };
    (stage("vs_main"), stage("fs_main"))
}

/// A single-buffer pipeline descriptor with one `format` target.
pub fn pipeline_descriptor<'a>(
    layout: PipelineLayoutId,
    (vs, fs): (ShaderModuleId, ShaderModuleId),
    attributes: &'a [VertexAttributeDescriptor],
    format: TextureFormat,
    depth_stencil: Option<DepthStencilStateDescriptor>,
) -> RenderPipelineDescriptor<'a> {
    RenderPipelineDescriptor {
        label: Some("test pipeline".into()),
        layout,
        primitive: PrimitiveStateDescriptor::default(),
        depth_stencil,
        multisample: MultisampleStateDescriptor::default(),
        vertex: VertexStateDescriptor {
            module: vs,
            buffers: Cow::Owned(vec![VertexBufferLayoutDescriptor {
                array_stride: VERTEX_STRIDE,
                step_mode: VertexStepMode::Vertex,
                attributes: Cow::Borrowed(attributes),
            }]),
        },
        fragment: Some(FragmentStateDescriptor {
            module: fs,
            targets: Cow::Owned(vec![ColorTargetStateDescriptor::replace(format)]),
        }),
    }
}

/// A pipeline layout over `bind_group_layouts`.
pub fn pipeline_layout(device: &Device, bind_group_layouts: &[BindGroupLayoutId]) -> PipelineLayoutId {
    device
        .create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("test layout".into()),
            bind_group_layouts,
        })
        .expect("pipeline layout")
}

/// A pipeline drawing the `colored` module into one `format` target.
pub fn colored_pipeline(
    device: &Device,
    library: Arc<KernelLibrary>,
    format: TextureFormat,
    depth_stencil: Option<DepthStencilStateDescriptor>,
) -> RenderPipelineId {
    let stages = shader_stages(device, library, "colored", COLORED_WGSL);
    let layout = pipeline_layout(device, &[]);
    device
        .create_render_pipeline(&pipeline_descriptor(
            layout,
            stages,
            &ATTRIBUTES,
            format,
            depth_stencil,
        ))
        .expect("render pipeline")
}

/// A pipeline drawing `[x, y, z, r, g, b]` vertices into one color target.
pub fn positioned_pipeline(
    device: &Device,
    library: Arc<KernelLibrary>,
    target: ColorTargetStateDescriptor,
    depth_stencil: Option<DepthStencilStateDescriptor>,
) -> RenderPipelineId {
    let (vs, fs) = shader_stages(device, library, "positioned", POSITIONED_WGSL);
    let layout = pipeline_layout(device, &[]);
    device
        .create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("positioned pipeline".into()),
            layout,
            primitive: PrimitiveStateDescriptor::default(),
            depth_stencil,
            multisample: MultisampleStateDescriptor::default(),
            vertex: VertexStateDescriptor {
                module: vs,
                buffers: Cow::Owned(vec![VertexBufferLayoutDescriptor {
                    array_stride: POSITIONED_STRIDE,
                    step_mode: VertexStepMode::Vertex,
                    attributes: Cow::Borrowed(&POSITIONED_ATTRIBUTES),
                }]),
            },
            fragment: Some(FragmentStateDescriptor {
                module: fs,
                targets: Cow::Owned(vec![target]),
            }),
        })
        .expect("render pipeline")
}

/// A readable 2D texture and a view of it.
pub fn texture(
    device: &Device,
    label: &str,
    format: TextureFormat,
    width: u32,
    height: u32,
) -> (TextureId, TextureViewId) {
    let texture = device
        .create_texture(&TextureDescriptor::new_2d(
            label,
            format,
            width,
            height,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
        ))
        .expect("texture");
    let view = device
        .create_view(texture, &TextureViewDescriptor::default())
        .expect("texture view");
    (texture, view)
}

/// Clears a fresh color target to `color` in its own submission, leaving
/// it in `ColorAttachment`.
pub fn clear(device: &Device, texture: TextureId, view: TextureViewId, color: LinearRgba) {
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor {
        label: Some("clear".into()),
        ..Default::default()
    });
    recorder
        .resource_barrier(StateTransition::new(
            texture,
            ResourceState::Undefined,
            ResourceState::ColorAttachment,
        ))
        .unwrap();
    recorder
        .begin_render_pass(&RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations::clear_store(color),
            }],
            depth_stencil_attachment: None,
        })
        .unwrap();
    recorder.end_render_pass().unwrap();
    recorder.submit().unwrap();
}

/// The RGBA8 texel at `(x, y)` of a tightly packed readback.
pub fn texel(bytes: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]
}

/// A headless surface over `target`.
pub fn headless_surface(device: &Device, target: &HeadlessTarget, frames_in_flight: u32) -> Surface {
    device
        .create_surface(&SurfaceDescriptor {
            label: Some("test surface".into()),
            target: SurfaceTarget::Headless(target.clone()),
            present_mode: PresentMode::Fifo,
            frames_in_flight,
        })
        .expect("headless surface")
}

/// Waits for the image, clears it and signals `complete`, the way every
/// frame that reaches the screen is rendered.
pub fn render(device: &Device, frame: &SurfaceTexture<'_>, color: LinearRgba) -> Result<(), RenderError> {
    let mut recorder = device.create_command_buffer(&CommandBufferDescriptor {
        label: Some("frame".into()),
        ..Default::default()
    });
    recorder.wait(frame.available(), BarrierSync::RENDER_TARGET)?;
    recorder.resource_barrier(StateTransition::new(
        frame.texture(),
        ResourceState::Undefined,
        ResourceState::ColorAttachment,
    ))?;
    recorder.begin_render_pass(&RenderPassDescriptor {
        label: Some("clear frame"),
        color_attachments: &[RenderPassColorAttachment {
            view: frame.view(),
            resolve_target: None,
            ops: Operations::clear_store(color),
        }],
        depth_stencil_attachment: None,
    })?;
    recorder.end_render_pass()?;
    recorder.resource_barrier(StateTransition::new(
        frame.texture(),
        ResourceState::ColorAttachment,
        ResourceState::PresentSource,
    ))?;
    recorder.signal(frame.complete(), BarrierSync::ALL)?;
    recorder.submit()
}
