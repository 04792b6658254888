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

use crate::renderer::api::core::{BackendKind, CompileDescriptor, CompiledModule};
use crate::renderer::error::ShaderError;

/// Turns shader source into per-entry-point blobs for one backend.
///
/// Compilation is all-or-nothing: on failure no blob of the module is returned.
pub trait ShaderCompiler: Send + Sync {
    /// The backend the produced blobs are meant for.
    fn target(&self) -> BackendKind;

    /// Compiles a module.
    ///
    /// # Arguments
    ///
    /// * `descriptor`: the module name and either its source text or a path to read it from.
    ///
    /// # Returns
    ///
    /// The compiled module, from which entry points are extracted with
    /// [`CompiledModule::get_shader_blob`].
    fn compile(&self, descriptor: &CompileDescriptor) -> Result<CompiledModule, ShaderError>;
}
