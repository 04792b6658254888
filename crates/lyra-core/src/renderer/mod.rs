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

//! Provides the public, backend-agnostic rendering contracts of Lyra.
//!
//! This module defines the "common language" of every GPU operation: the
//! descriptors and handles in [`api`], the error hierarchy in [`error`],
//! the backend seams in [`traits`], and the validating core in [`rhi`]
//! that sits between client code and a concrete backend from `lyra-infra`.

pub mod api;
pub mod error;
pub mod rhi;
pub mod traits;

pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError, ValidationError};
pub use self::rhi::{CommandRecorder, Device, FrameState, StateTracker, Surface, SurfaceTexture};
pub use self::traits::{DeviceBackend, GraphicsBackendSelector, ShaderCompiler, SurfaceBackend};
