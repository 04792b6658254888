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

//! Shader front-ends: WGSL reflection and the per-backend compilers.
//!
//! With the `wgpu` feature, modules are parsed and validated by naga.
//! Without it, the [`wgsl`] scanner reads their interfaces and leaves the
//! rest of the source unchecked.

mod compiler;
#[cfg(feature = "wgpu")]
pub mod reflect;
pub mod wgsl;

pub use self::compiler::{SoftwareCompiler, WgslCompiler};

use crate::graphics::software::KernelLibrary;
use lyra_core::renderer::api::core::{BackendKind, CompilerDescriptor};
use lyra_core::renderer::traits::ShaderCompiler;
use std::sync::Arc;

/// Creates the compiler matching `descriptor.target`.
///
/// `BackendKind::Auto` is treated as a native target; resolve it against the
/// active backend first when the software backend may be in use.
pub fn create_compiler(
    descriptor: &CompilerDescriptor,
    library: Arc<KernelLibrary>,
) -> Box<dyn ShaderCompiler> {
    match descriptor.target {
        BackendKind::Software => Box::new(SoftwareCompiler::new(library, descriptor.flags)),
        target => Box::new(WgslCompiler::new(target, descriptor.flags)),
    }
}
