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


//! Shared pieces of the Lyra sample programs.
//!
//! Every demo accepts `--backend <name>` and `--config <file.json>`; the
//! backend given on the command line wins over the one in the file.

use anyhow::{bail, Context, Result};
use lyra_core::renderer::api::core::{
    BackendKind, CompileDescriptor, ShaderModuleDescriptor, ShaderModuleId,
};
use lyra_core::renderer::api::pipeline::{
    ColorTargetStateDescriptor, DepthStencilStateDescriptor, FragmentStateDescriptor,
    MultisampleStateDescriptor, PipelineLayoutDescriptor, PrimitiveStateDescriptor,
    RenderPipelineDescriptor, RenderPipelineId, VertexAttributeDescriptor,
    VertexBufferLayoutDescriptor, VertexFormat, VertexStateDescriptor, VertexStepMode,
};
use lyra_core::renderer::traits::ShaderCompiler;
use lyra_core::{Device, RhiConfig};
use lyra_infra::graphics::software::{kernels, KernelLibrary};
use std::borrow::Cow;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

/// The shader every demo draws with: a position and a color per vertex.
pub const TRIANGLE_WGSL: &str = r#"
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

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    pub fn buffer_layout() -> VertexBufferLayoutDescriptor<'static> {
        VertexBufferLayoutDescriptor {
            array_stride: mem::size_of::<Vertex>() as u64,
            step_mode: VertexStepMode::Vertex,
            attributes: Cow::Borrowed(&[
                // @location(0) in shader: position
                VertexAttributeDescriptor {
                    shader_location: 0,
                    format: VertexFormat::Float32x3,
                    offset: 0,
                },
                // @location(1) in shader: color
                VertexAttributeDescriptor {
                    shader_location: 1,
                    format: VertexFormat::Float32x3,
                    offset: mem::size_of::<[f32; 3]>() as u64,
                },
            ]),
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DemoArgs {
    pub backend: Option<BackendKind>,
    pub config: Option<PathBuf>,
}

impl DemoArgs {
    /// Parses the process arguments.
    pub fn from_env() -> Result<Self> {
        Self::parse(std::env::args().skip(1))
    }

    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--backend" => {
                    let name = args.next().context("--backend needs a value")?;
                    let backend = name.parse::<BackendKind>().map_err(anyhow::Error::msg)?;
                    parsed.backend = Some(backend);
                }
                "--config" => {
                    let path = args.next().context("--config needs a file")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                other => bail!("unknown argument '{other}' (expected --backend or --config)"),
            }
        }
        Ok(parsed)
    }

    /// The configuration file, or the defaults, with the command-line
    /// backend applied.
    pub fn resolve_config(&self) -> Result<RhiConfig> {
        let mut config = match &self.config {
            Some(path) => RhiConfig::load(path)?,
            None => RhiConfig::default(),
        };
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        Ok(config)
    }
}

/// Sets up `env_logger` at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .filter_module("naga", log::LevelFilter::Warn)
        .init();
}

/// The kernels the software backend runs [`TRIANGLE_WGSL`] with.
pub fn kernel_library() -> Arc<KernelLibrary> {
    let library = KernelLibrary::new();
    library.register_vertex("triangle", "vs_main", kernels::pass_through);
    library.register_fragment("triangle", "fs_main", kernels::varying_color);
    Arc::new(library)
}

/// Compiles [`TRIANGLE_WGSL`] and returns its vertex and fragment modules.
pub fn triangle_shaders(
    device: &Device,
    compiler: &dyn ShaderCompiler,
) -> Result<(ShaderModuleId, ShaderModuleId)> {
    let compiled = compiler.compile(&CompileDescriptor {
        module: "triangle".into(),
        path: None,
        source: Some(TRIANGLE_WGSL.into()),
    })?;
    let stage = |entry_point: &str| -> Result<ShaderModuleId> {
        let blob = compiled.get_shader_blob(entry_point)?;
        let module = device.create_shader_module(&ShaderModuleDescriptor {
            label: Some(format!("triangle::{entry_point}").into()),
            blob: &blob,
        })?;
        log::info!(" -> Shader module created: {module:?}");
        Ok(module)
    };
    Ok((stage("vs_main")?, stage("fs_main")?))
}

/// A pipeline drawing [`Vertex`] lists with the triangle shader into one
/// color target.
pub fn triangle_pipeline(
    device: &Device,
    compiler: &dyn ShaderCompiler,
    label: &str,
    target: ColorTargetStateDescriptor,
    depth_stencil: Option<DepthStencilStateDescriptor>,
) -> Result<RenderPipelineId> {
    let (vertex, fragment) = triangle_shaders(device, compiler)?;
    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("empty layout".into()),
        bind_group_layouts: &[],
    })?;
    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label.into()),
        layout,
        primitive: PrimitiveStateDescriptor::default(),
        depth_stencil,
        multisample: MultisampleStateDescriptor::default(),
        vertex: VertexStateDescriptor {
            module: vertex,
            buffers: Cow::Owned(vec![Vertex::buffer_layout()]),
        },
        fragment: Some(FragmentStateDescriptor {
            module: fragment,
            targets: Cow::Owned(vec![target]),
        }),
    })?;
    log::info!(" -> Render pipeline '{label}' created: {pipeline:?}");
    Ok(pipeline)
}

/// Renders an RGBA8 readback as a compact ASCII picture, one character
/// per texel.
pub fn ascii_art(pixels: &[u8], width: u32) -> Vec<String> {
    pixels
        .chunks_exact(4 * width as usize)
        .map(|row| {
            row.chunks_exact(4)
                .map(|p| match (p[0] > 127, p[1] > 127, p[2] > 127) {
                    (false, false, false) => '.',
                    (true, false, false) => 'R',
                    (false, true, false) => 'G',
                    (false, false, true) => 'B',
                    (true, true, false) => 'Y',
                    _ => '#',
                })
                .collect()
        })
        .collect()
}
