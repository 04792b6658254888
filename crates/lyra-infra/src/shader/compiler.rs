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

//! The shader compilers behind [`ShaderCompiler`].

#[cfg(not(feature = "wgpu"))]
use super::wgsl;
use super::wgsl::EntryPoint;
use crate::graphics::software::{kernel_key, Kernel, KernelLibrary};
use lyra_core::renderer::api::core::{
    BackendKind, CompileDescriptor, CompileFlags, CompiledModule, ShaderBlob,
};
use lyra_core::renderer::api::util::ShaderStage;
use lyra_core::renderer::error::ShaderError;
use lyra_core::renderer::traits::ShaderCompiler;
use std::borrow::Cow;
use std::sync::Arc;

/// Reads the source text of a module, from the descriptor or from disk.
fn load_source<'a>(descriptor: &'a CompileDescriptor<'_>) -> Result<Cow<'a, str>, ShaderError> {
    if let Some(source) = &descriptor.source {
        return Ok(Cow::Borrowed(source.as_ref()));
    }
    let Some(path) = &descriptor.path else {
        return Err(ShaderError::CompilationError {
            label: descriptor.module.to_string(),
            details: "neither source text nor a source path was given".to_string(),
        });
    };
    log::debug!("ShaderCompiler: reading '{path}'");
    std::fs::read_to_string(&**path)
        .map(Cow::Owned)
        .map_err(|e| ShaderError::LoadError {
            path: path.to_string(),
            source_error: e.to_string(),
        })
}

fn parse_module(descriptor: &CompileDescriptor<'_>, source: &str) -> Result<Vec<EntryPoint>, ShaderError> {
    #[cfg(feature = "wgpu")]
    let entry_points = super::reflect::reflect(source);
    #[cfg(not(feature = "wgpu"))]
    let entry_points = wgsl::scan(source).map_err(|err| err.to_string());

    entry_points.map_err(|details| ShaderError::CompilationError {
        label: descriptor.module.to_string(),
        details,
    })
}

/// Compiles WGSL for the native backends.
///
/// Each blob carries the full module text; the backend selects the entry
/// point by name when it builds a pipeline.
#[derive(Debug, Clone)]
pub struct WgslCompiler {
    target: BackendKind,
    flags: CompileFlags,
}

impl WgslCompiler {
    /// A compiler producing blobs for `target`.
    pub fn new(target: BackendKind, flags: CompileFlags) -> Self {
        Self { target, flags }
    }
}

impl ShaderCompiler for WgslCompiler {
    fn target(&self) -> BackendKind {
        self.target
    }

    fn compile(&self, descriptor: &CompileDescriptor) -> Result<CompiledModule, ShaderError> {
        let source = load_source(descriptor)?;
        let entry_points = parse_module(descriptor, &source)?;
        let data: Arc<[u8]> = Arc::from(source.as_bytes());

        let blobs = entry_points
            .into_iter()
            .map(|entry| ShaderBlob {
                entry_point: entry.name,
                stage: entry.stage,
                data: Arc::clone(&data),
                reflection: self.flags.contains(CompileFlags::REFLECT).then_some(entry.reflection),
            })
            .collect::<Vec<_>>();

        log::debug!(
            "WgslCompiler: compiled '{}' for {} ({} entry point(s))",
            descriptor.module,
            self.target,
            blobs.len()
        );
        Ok(CompiledModule::new(descriptor.module.to_string(), blobs))
    }
}

/// Compiles for the software backend.
///
/// The WGSL source still describes the interface, but every entry point must
/// have a native kernel registered in the [`KernelLibrary`] under
/// `"<module>::<entry_point>"`. The blob is that key.
#[derive(Debug, Clone)]
pub struct SoftwareCompiler {
    library: Arc<KernelLibrary>,
    flags: CompileFlags,
}

impl SoftwareCompiler {
    /// A compiler resolving kernels in `library`.
    pub fn new(library: Arc<KernelLibrary>, flags: CompileFlags) -> Self {
        Self { library, flags }
    }
}

impl ShaderCompiler for SoftwareCompiler {
    fn target(&self) -> BackendKind {
        BackendKind::Software
    }

    fn compile(&self, descriptor: &CompileDescriptor) -> Result<CompiledModule, ShaderError> {
        let source = load_source(descriptor)?;
        let entry_points = parse_module(descriptor, &source)?;

        let mut blobs = Vec::with_capacity(entry_points.len());
        for entry in entry_points {
            let key = kernel_key(&descriptor.module, &entry.name);
            let fail = |details: String| ShaderError::CompilationError {
                label: descriptor.module.to_string(),
                details,
            };
            match (entry.stage, self.library.get(&key)) {
                (ShaderStage::Vertex, Some(Kernel::Vertex(_)))
                | (ShaderStage::Fragment, Some(Kernel::Fragment(_))) => {}
                (ShaderStage::Compute, _) => {
                    return Err(fail(format!(
                        "compute entry point '{}' cannot run on the software backend",
                        entry.name
                    )))
                }
                (stage, Some(kernel)) => {
                    return Err(fail(format!(
                        "entry point '{}' is a {stage:?} shader but '{key}' is a {kernel:?}",
                        entry.name
                    )))
                }
                (_, None) => {
                    return Err(fail(format!(
                        "no software kernel is registered for entry point '{}' (key '{key}')",
                        entry.name
                    )))
                }
            }
            blobs.push(ShaderBlob {
                entry_point: entry.name,
                stage: entry.stage,
                data: Arc::from(key.into_bytes()),
                reflection: self.flags.contains(CompileFlags::REFLECT).then_some(entry.reflection),
            });
        }

        log::debug!(
            "SoftwareCompiler: bound {} kernel(s) of '{}'",
            blobs.len(),
            descriptor.module
        );
        Ok(CompiledModule::new(descriptor.module.to_string(), blobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::software::kernels;

    const SOURCE: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) color: vec4<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    fn descriptor(module: &str) -> CompileDescriptor<'_> {
        CompileDescriptor {
            module: module.into(),
            path: None,
            source: Some(SOURCE.into()),
        }
    }

    #[test]
    fn wgsl_blobs_share_the_module_text() {
        let compiler = WgslCompiler::new(BackendKind::Vulkan, CompileFlags::REFLECT);
        let module = compiler.compile(&descriptor("triangle")).unwrap();
        let vs = module.get_shader_blob("vs_main").unwrap();
        let fs = module.get_shader_blob("fs_main").unwrap();
        assert_eq!(vs.as_bytes(), SOURCE.as_bytes());
        assert!(Arc::ptr_eq(&vs.data, &fs.data));
        assert_eq!(vs.reflection.unwrap().inputs.len(), 2);
        assert!(matches!(
            module.get_shader_blob("cs_main"),
            Err(ShaderError::EntryPointNotFound { .. })
        ));
    }

    #[test]
    fn reflection_is_opt_in() {
        let compiler = WgslCompiler::new(BackendKind::Metal, CompileFlags::EMPTY);
        let module = compiler.compile(&descriptor("triangle")).unwrap();
        assert!(module.get_shader_blob("vs_main").unwrap().reflection.is_none());
    }

    #[test]
    fn software_blobs_name_their_kernel() {
        let library = Arc::new(KernelLibrary::new());
        library.register_vertex("triangle", "vs_main", kernels::pass_through);
        library.register_fragment("triangle", "fs_main", kernels::varying_color);
        let compiler = SoftwareCompiler::new(library, CompileFlags::REFLECT);

        let module = compiler.compile(&descriptor("triangle")).unwrap();
        assert_eq!(module.get_shader_blob("fs_main").unwrap().as_bytes(), b"triangle::fs_main");
    }

    #[test]
    fn missing_kernel_fails_the_whole_module() {
        let library = Arc::new(KernelLibrary::new());
        library.register_vertex("triangle", "vs_main", kernels::pass_through);
        let compiler = SoftwareCompiler::new(library, CompileFlags::EMPTY);

        let err = compiler.compile(&descriptor("triangle")).unwrap_err();
        assert!(err.to_string().contains("triangle::fs_main"), "{err}");
    }

    #[test]
    fn kernel_of_the_wrong_stage_is_rejected() {
        let library = Arc::new(KernelLibrary::new());
        library.register_fragment("triangle", "vs_main", kernels::varying_color);
        library.register_fragment("triangle", "fs_main", kernels::varying_color);
        let compiler = SoftwareCompiler::new(library, CompileFlags::EMPTY);
        assert!(compiler.compile(&descriptor("triangle")).is_err());
    }

    #[cfg(feature = "wgpu")]
    #[test]
    fn invalid_wgsl_fails_with_its_diagnostic() {
        let compiler = WgslCompiler::new(BackendKind::Vulkan, CompileFlags::REFLECT);
        let err = compiler
            .compile(&CompileDescriptor {
                module: "broken".into(),
                path: None,
                source: Some("@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return colour;\n}\n".into()),
            })
            .unwrap_err();
        assert!(
            matches!(&err, ShaderError::CompilationError { label, details } if label == "broken" && details.contains("colour")),
            "{err}"
        );
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let compiler = WgslCompiler::new(BackendKind::Gl, CompileFlags::EMPTY);
        let err = compiler
            .compile(&CompileDescriptor {
                module: "ghost".into(),
                path: Some("does/not/exist.wgsl".into()),
                source: None,
            })
            .unwrap_err();
        assert!(matches!(err, ShaderError::LoadError { .. }));
    }
}
