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

//! WGSL parsing and validation through naga.
//!
//! The module is parsed and validated in full, so type errors and unknown
//! identifiers fail compilation with naga's diagnostics. Entry point
//! interfaces are then read from the validated IR; a binding counts as used
//! only when the validator saw the entry point, or something it calls,
//! touch it.

use super::wgsl::EntryPoint;
use lyra_core::renderer::api::command::BufferBindingType;
use lyra_core::renderer::api::core::{
    ReflectedBinding, ReflectedBindingType, ShaderInterfaceVariable, ShaderReflection,
};
use lyra_core::renderer::api::pipeline::ScalarKind;
use lyra_core::renderer::api::resource::TextureViewDimension;
use lyra_core::renderer::api::util::{ShaderStage, TextureSampleKind};
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// Parses and validates a WGSL module, then describes every entry point in
/// source order.
///
/// ## Errors
/// * naga's rendered diagnostic for parse and validation failures.
/// * Modules without entry points, and entry points whose interface or
///   bindings have no RHI equivalent.
pub fn reflect(source: &str) -> Result<Vec<EntryPoint>, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| err.emit_to_string(source))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| err.emit_to_string(source))?;
    if module.entry_points.is_empty() {
        return Err("the module declares no @vertex, @fragment or @compute entry point".to_string());
    }

    let mut entry_points = Vec::with_capacity(module.entry_points.len());
    for (index, entry) in module.entry_points.iter().enumerate() {
        let stage = match entry.stage {
            naga::ShaderStage::Vertex => ShaderStage::Vertex,
            naga::ShaderStage::Fragment => ShaderStage::Fragment,
            naga::ShaderStage::Compute => ShaderStage::Compute,
            #[allow(unreachable_patterns)]
            other => return Err(format!("entry point '{}' is a {other:?} shader", entry.name)),
        };

        let mut inputs = Vec::new();
        for argument in &entry.function.arguments {
            interface(&module, argument.binding.as_ref(), argument.ty, &mut inputs).map_err(|message| {
                format!(
                    "parameter '{}' of '{}': {message}",
                    argument.name.as_deref().unwrap_or("_"),
                    entry.name
                )
            })?;
        }
        let mut outputs = Vec::new();
        if let Some(result) = &entry.function.result {
            interface(&module, result.binding.as_ref(), result.ty, &mut outputs)
                .map_err(|message| format!("result of '{}': {message}", entry.name))?;
        }
        inputs.sort_by_key(|v| v.location);
        outputs.sort_by_key(|v| v.location);

        let uses = info.get_entry_point(index);
        let mut bindings = Vec::new();
        for (handle, variable) in module.global_variables.iter() {
            let Some(resource) = &variable.binding else {
                continue;
            };
            if uses[handle].is_empty() {
                continue;
            }
            let ty = binding_type(&module, variable).ok_or_else(|| {
                format!(
                    "resource '{}' of '{}' has no bindable type",
                    variable.name.as_deref().unwrap_or("_"),
                    entry.name
                )
            })?;
            bindings.push(ReflectedBinding {
                group: resource.group,
                binding: resource.binding,
                ty,
            });
        }
        bindings.sort_by_key(|b| (b.group, b.binding));

        entry_points.push(EntryPoint {
            name: entry.name.clone(),
            stage,
            reflection: ShaderReflection {
                inputs,
                outputs,
                bindings,
            },
        });
    }
    Ok(entry_points)
}

/// Collects the located values of an argument or result, expanding structs.
fn interface(
    module: &naga::Module,
    binding: Option<&naga::Binding>,
    ty: naga::Handle<naga::Type>,
    out: &mut Vec<ShaderInterfaceVariable>,
) -> Result<(), String> {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            let (kind, components) = interface_type(&module.types[ty].inner)
                .ok_or_else(|| format!("@location({location}) has a type that cannot cross a stage boundary"))?;
            out.push(ShaderInterfaceVariable {
                location: *location,
                kind,
                components,
            });
            Ok(())
        }
        Some(_) => Ok(()),
        None => match &module.types[ty].inner {
            naga::TypeInner::Struct { members, .. } => members
                .iter()
                .try_for_each(|member| interface(module, member.binding.as_ref(), member.ty, out)),
            _ => Err("it has neither @location nor @builtin".to_string()),
        },
    }
}

fn scalar_kind(kind: naga::ScalarKind) -> Option<ScalarKind> {
    match kind {
        naga::ScalarKind::Float => Some(ScalarKind::Float),
        naga::ScalarKind::Sint => Some(ScalarKind::Sint),
        naga::ScalarKind::Uint => Some(ScalarKind::Uint),
        _ => None,
    }
}

/// The scalar kind and component count of a stage-boundary type.
fn interface_type(inner: &naga::TypeInner) -> Option<(ScalarKind, u32)> {
    match inner {
        naga::TypeInner::Scalar(scalar) => Some((scalar_kind(scalar.kind)?, 1)),
        naga::TypeInner::Vector { size, scalar } => Some((scalar_kind(scalar.kind)?, *size as u32)),
        _ => None,
    }
}

/// The binding type of a `@group @binding` variable.
fn binding_type(module: &naga::Module, variable: &naga::GlobalVariable) -> Option<ReflectedBindingType> {
    match variable.space {
        naga::AddressSpace::Uniform => {
            return Some(ReflectedBindingType::Buffer(BufferBindingType::Uniform))
        }
        naga::AddressSpace::Storage { access } => {
            return Some(ReflectedBindingType::Buffer(BufferBindingType::Storage {
                read_only: !access.contains(naga::StorageAccess::STORE),
            }))
        }
        naga::AddressSpace::Handle => {}
        _ => return None,
    }

    match &module.types[variable.ty].inner {
        naga::TypeInner::Sampler { comparison } => Some(ReflectedBindingType::Sampler {
            comparison: *comparison,
        }),
        naga::TypeInner::Image { dim, arrayed, class } => {
            let dimension = match (*dim, *arrayed) {
                (naga::ImageDimension::D1, false) => TextureViewDimension::D1,
                (naga::ImageDimension::D2, false) => TextureViewDimension::D2,
                (naga::ImageDimension::D2, true) => TextureViewDimension::D2Array,
                (naga::ImageDimension::D3, false) => TextureViewDimension::D3,
                (naga::ImageDimension::Cube, false) => TextureViewDimension::Cube,
                (naga::ImageDimension::Cube, true) => TextureViewDimension::CubeArray,
                _ => return None,
            };
            let (sample_kind, multisampled) = match class {
                naga::ImageClass::Sampled { kind, multi } => {
                    let sample_kind = match scalar_kind(*kind)? {
                        ScalarKind::Float => TextureSampleKind::Float,
                        ScalarKind::Sint => TextureSampleKind::Sint,
                        ScalarKind::Uint => TextureSampleKind::Uint,
                    };
                    (sample_kind, *multi)
                }
                naga::ImageClass::Depth { multi } => (TextureSampleKind::Depth, *multi),
                _ => return None,
            };
            Some(ReflectedBindingType::Texture {
                sample_kind,
                dimension,
                multisampled,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::wgsl;

    const TEXTURED: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0) var<uniform> transform: mat4x4<f32>;
@group(1) @binding(0) var albedo: texture_2d<f32>;
@group(1) @binding(1) var albedo_sampler: sampler;
@group(2) @binding(0) var<storage, read> unused: array<u32>;

fn shade(uv: vec2<f32>) -> vec4<f32> {
    return textureSample(albedo, albedo_sampler, uv);
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = transform * vec4<f32>(in.position, 1.0);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return shade(in.uv);
}
"#;

    #[test]
    fn interfaces_agree_with_the_scanner() {
        let validated = reflect(TEXTURED).unwrap();
        let scanned = wgsl::scan(TEXTURED).unwrap();
        assert_eq!(validated, scanned);

        let fs = &validated[1];
        assert_eq!(fs.stage, ShaderStage::Fragment);
        let bound: Vec<(u32, u32)> = fs.reflection.bindings.iter().map(|b| (b.group, b.binding)).collect();
        assert_eq!(bound, vec![(1, 0), (1, 1)]);
    }

    #[test]
    fn type_errors_fail_where_the_scanner_passes() {
        let source = "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    let a: f32 = 1u;\n    return vec4<f32>(a);\n}\n";
        assert!(wgsl::scan(source).is_ok());
        assert!(reflect(source).is_err());

        let source = "@fragment\nfn fs_main() -> @location(0) vec4<f32> {\n    return missing;\n}\n";
        let err = reflect(source).unwrap_err();
        assert!(err.contains("missing"), "{err}");
    }

    #[test]
    fn storage_access_and_integer_outputs() {
        let source = r#"
@group(0) @binding(0) var<storage, read_write> counters: array<atomic<u32>>;

@compute @workgroup_size(64)
fn cs_main(@builtin(global_invocation_id) id: vec3<u32>) {
    atomicAdd(&counters[id.x], 1u);
}

@fragment
fn fs_main(@location(2) @interpolate(flat) index: u32) -> @location(0) vec4<u32> {
    return vec4<u32>(index);
}
"#;
        let entry_points = reflect(source).unwrap();
        assert_eq!(entry_points[0].stage, ShaderStage::Compute);
        assert_eq!(
            entry_points[0].reflection.bindings[0].ty,
            ReflectedBindingType::Buffer(BufferBindingType::Storage { read_only: false })
        );
        let fs = &entry_points[1].reflection;
        assert!(fs.bindings.is_empty());
        assert_eq!(
            fs.inputs,
            vec![ShaderInterfaceVariable {
                location: 2,
                kind: ScalarKind::Uint,
                components: 1
            }]
        );
        assert_eq!(fs.outputs[0].kind, ScalarKind::Uint);
        assert_eq!(fs.outputs[0].components, 4);
    }

    #[test]
    fn module_without_entry_point_is_rejected() {
        let err = reflect("fn helper() -> f32 {\n    return 1.0;\n}\n").unwrap_err();
        assert!(err.contains("no @vertex"), "{err}");
    }
}
