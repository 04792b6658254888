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

//! Shader blobs, reflection data and the inputs of the shader compiler.

use super::backend::BackendKind;
use crate::lyra_bitflags;
use crate::renderer::api::command::{BufferBindingType, SamplerBindingType};
use crate::renderer::api::handle::lyra_handle;
use crate::renderer::api::pipeline::ScalarKind;
use crate::renderer::api::resource::TextureViewDimension;
use crate::renderer::api::util::{ShaderStage, TextureSampleKind};
use crate::renderer::error::ShaderError;
use std::borrow::Cow;
use std::sync::Arc;

lyra_handle! {
    /// An opaque handle to a shader module: one compiled entry point.
    ShaderModuleId
}

/// A located value crossing a shader stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderInterfaceVariable {
    /// `@location(n)`.
    pub location: u32,
    /// Scalar type.
    pub kind: ScalarKind,
    /// Number of components (1 to 4).
    pub components: u32,
}

/// The resource type a shader declares at a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectedBindingType {
    /// A uniform or storage buffer.
    Buffer(BufferBindingType),
    /// A sampled texture.
    Texture {
        /// Scalar type of the texels.
        sample_kind: TextureSampleKind,
        /// View dimension.
        dimension: TextureViewDimension,
        /// Multisampled texture.
        multisampled: bool,
    },
    /// A sampler.
    Sampler {
        /// Comparison sampler.
        comparison: bool,
    },
}

impl ReflectedBindingType {
    /// `true` if a sampler binding type satisfies this declaration.
    pub fn accepts_sampler(&self, ty: SamplerBindingType) -> bool {
        match self {
            ReflectedBindingType::Sampler { comparison } => {
                *comparison == (ty == SamplerBindingType::Comparison)
            }
            _ => false,
        }
    }
}

/// A resource binding used by an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReflectedBinding {
    /// `@group(n)`.
    pub group: u32,
    /// `@binding(n)`.
    pub binding: u32,
    /// Declared type.
    pub ty: ReflectedBindingType,
}

/// The interface of one entry point, as seen by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    /// Located inputs. For a vertex shader these are the vertex attributes.
    pub inputs: Vec<ShaderInterfaceVariable>,
    /// Located outputs. For a fragment shader these are the color targets.
    pub outputs: Vec<ShaderInterfaceVariable>,
    /// Resource bindings reachable from the entry point.
    pub bindings: Vec<ReflectedBinding>,
}

/// The compiled code of a single entry point.
///
/// The bytes are backend specific: WGSL text for native backends, a kernel
/// key for the software backend. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBlob {
    /// The entry point name.
    pub entry_point: String,
    /// The stage the entry point runs in.
    pub stage: ShaderStage,
    /// Backend-specific code.
    pub data: Arc<[u8]>,
    /// Interface description, present when compiled with `CompileFlags::REFLECT`.
    pub reflection: Option<ShaderReflection>,
}

impl ShaderBlob {
    /// Size of the code in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The code bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Describes a shader module to create from a blob.
#[derive(Debug, Clone)]
pub struct ShaderModuleDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The compiled entry point.
    pub blob: &'a ShaderBlob,
}

lyra_bitflags! {
    /// Options for the shader compiler.
    pub struct CompileFlags: u32 {
        /// Keep debug information in the output.
        const DEBUG = 1 << 0;
        /// Produce reflection data for pipeline validation.
        const REFLECT = 1 << 1;
    }
}

/// Configures a shader compiler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerDescriptor {
    /// The backend the output is for.
    pub target: BackendKind,
    /// Compile options.
    pub flags: CompileFlags,
}

/// A shader source to compile.
#[derive(Debug, Clone)]
pub struct CompileDescriptor<'a> {
    /// The module name, used in diagnostics.
    pub module: Cow<'a, str>,
    /// The source path. Read when `source` is `None`.
    pub path: Option<Cow<'a, str>>,
    /// The source text.
    pub source: Option<Cow<'a, str>>,
}

/// The output of one compilation: a blob per entry point.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    name: String,
    blobs: Vec<ShaderBlob>,
}

impl CompiledModule {
    /// Bundles the blobs of a module.
    pub fn new(name: impl Into<String>, blobs: Vec<ShaderBlob>) -> Self {
        Self {
            name: name.into(),
            blobs,
        }
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of every entry point in the module.
    pub fn entry_points(&self) -> impl Iterator<Item = &str> {
        self.blobs.iter().map(|b| b.entry_point.as_str())
    }

    /// Extracts the blob of a named entry point.
    pub fn get_shader_blob(&self, entry_point: &str) -> Result<ShaderBlob, ShaderError> {
        self.blobs
            .iter()
            .find(|b| b.entry_point == entry_point)
            .cloned()
            .ok_or_else(|| ShaderError::EntryPointNotFound {
                module: self.name.clone(),
                entry_point: entry_point.to_string(),
            })
    }
}
