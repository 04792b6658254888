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

//! Resource usage states and the transitions between them.

use crate::renderer::api::handle::ResourceId;
use std::fmt;

/// How a resource is currently being used by the GPU.
///
/// A resource must be in the state a command requires before that command
/// may use it. The only way to change a state is an explicit barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Contents are undefined. Every resource starts here, and so does a
    /// freshly acquired surface image.
    #[default]
    Undefined,
    /// Generic read access.
    Common,
    /// Written as a color attachment.
    ColorAttachment,
    /// Read and written as a depth-stencil attachment.
    DepthStencilAttachment,
    /// Tested against as a depth-stencil attachment without writes.
    DepthStencilReadOnly,
    /// Sampled or read from a shader.
    ShaderResource,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDestination,
    /// Ready to be presented by a surface.
    PresentSource,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An explicit declaration that a resource moves from one state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateTransition {
    /// The resource that changes state.
    pub resource: ResourceId,
    /// The state the caller believes the resource is in.
    pub before: ResourceState,
    /// The state the resource is in after the barrier.
    pub after: ResourceState,
}

impl StateTransition {
    /// A transition of `resource` from `before` to `after`.
    pub fn new(resource: impl Into<ResourceId>, before: ResourceState, after: ResourceState) -> Self {
        Self {
            resource: resource.into(),
            before,
            after,
        }
    }
}

/// What a finished command buffer expects from the tracker and leaves behind.
///
/// `expected` is the state the recording assumed for the resource on first
/// touch; `last` is the state the recording left it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRequirement {
    /// The resource.
    pub resource: ResourceId,
    /// State required when the command buffer starts executing.
    pub expected: ResourceState,
    /// State after the command buffer has executed.
    pub last: ResourceState,
}
