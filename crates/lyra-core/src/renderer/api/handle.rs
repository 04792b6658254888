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

//! Generation-tagged handles for every object the device owns.
//!
//! A handle is an index into one of the registry arenas plus the generation
//! of the slot at the time the object was created. Releasing an object bumps
//! the slot generation, so a stale handle can never alias a newer object.

use std::fmt;

use super::command::{BindGroupId, BindGroupLayoutId};
use super::core::ShaderModuleId;
use super::pipeline::{PipelineLayoutId, RenderPipelineId};
use super::resource::{BufferId, SamplerId, TextureId, TextureViewId};

/// An index into a registry arena, tagged with the slot generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index inside the arena.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// The generation of the slot when the handle was issued.
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Declares a typed, opaque id wrapping a [`Handle`].
macro_rules! lyra_handle {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) $crate::renderer::api::handle::Handle);

        impl $name {
            /// The underlying arena handle.
            pub const fn handle(&self) -> $crate::renderer::api::handle::Handle {
                self.0
            }
        }
    };
}

pub(crate) use lyra_handle;

/// A resource whose usage state is tracked by the state tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceId {
    /// A buffer.
    Buffer(BufferId),
    /// A texture (all subresources are tracked as one).
    Texture(TextureId),
}

impl From<BufferId> for ResourceId {
    fn from(id: BufferId) -> Self {
        ResourceId::Buffer(id)
    }
}

impl From<TextureId> for ResourceId {
    fn from(id: TextureId) -> Self {
        ResourceId::Texture(id)
    }
}

/// Any object that can be passed to `Device::destroy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyResource {
    /// A buffer.
    Buffer(BufferId),
    /// A texture. Destroying it also destroys its views.
    Texture(TextureId),
    /// A texture view.
    TextureView(TextureViewId),
    /// A sampler.
    Sampler(SamplerId),
    /// A shader module.
    ShaderModule(ShaderModuleId),
    /// A bind group layout.
    BindGroupLayout(BindGroupLayoutId),
    /// A pipeline layout.
    PipelineLayout(PipelineLayoutId),
    /// A bind group.
    BindGroup(BindGroupId),
    /// A render pipeline.
    RenderPipeline(RenderPipelineId),
}

macro_rules! any_resource_from {
    ($($id:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$id> for AnyResource {
                fn from(id: $id) -> Self {
                    AnyResource::$variant(id)
                }
            }
        )*
    };
}

any_resource_from! {
    BufferId => Buffer,
    TextureId => Texture,
    TextureViewId => TextureView,
    SamplerId => Sampler,
    ShaderModuleId => ShaderModule,
    BindGroupLayoutId => BindGroupLayout,
    PipelineLayoutId => PipelineLayout,
    BindGroupId => BindGroup,
    RenderPipelineId => RenderPipeline,
}

impl From<ResourceId> for AnyResource {
    fn from(id: ResourceId) -> Self {
        match id {
            ResourceId::Buffer(id) => AnyResource::Buffer(id),
            ResourceId::Texture(id) => AnyResource::Texture(id),
        }
    }
}
