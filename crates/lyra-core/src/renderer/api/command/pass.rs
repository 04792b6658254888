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

//! Render pass descriptors and in-pass dynamic state.

use crate::math::LinearRgba;
use crate::renderer::api::resource::TextureViewId;

/// Describes the operation to perform on an attachment at the start of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp<V> {
    /// The existing contents of the attachment will be loaded into the pass.
    Load,
    /// The attachment will be cleared to the specified value before the pass begins.
    Clear(V),
}

/// Describes the operation to perform on an attachment at the end of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// The results of the render pass will be stored to the attachment's memory.
    Store,
    /// The results of the render pass will be discarded, leaving the attachment's memory undefined.
    Discard,
}

/// Defines the load and store operations for a single attachment plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operations<V> {
    /// The operation to perform at the beginning of the pass.
    pub load: LoadOp<V>,
    /// The operation to perform at the end of the pass.
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Clear to `value`, then store.
    pub fn clear_store(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }

    /// Load, then store.
    pub fn load_store() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassColorAttachment {
    /// The view rendered to.
    pub view: TextureViewId,
    /// If the view is multisampled, the single-sample view receiving the resolved output.
    pub resolve_target: Option<TextureViewId>,
    /// Clear value and load/store policy.
    pub ops: Operations<LinearRgba>,
}

/// The depth-stencil attachment of a render pass.
///
/// Depth and stencil planes have independent operations. A plane marked
/// read-only may be tested against but never written during the pass; its
/// operations are then ignored and its contents preserved. A plane whose
/// operations are `None` is loaded and stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDepthStencilAttachment {
    /// The depth-stencil view.
    pub view: TextureViewId,
    /// Operations on the depth plane.
    pub depth_ops: Option<Operations<f32>>,
    /// The depth plane cannot be written in this pass.
    pub depth_read_only: bool,
    /// Operations on the stencil plane.
    pub stencil_ops: Option<Operations<u32>>,
    /// The stencil plane cannot be written in this pass.
    pub stencil_read_only: bool,
}

/// A descriptor for a render pass.
#[derive(Debug, Default, Clone)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label for the render pass.
    pub label: Option<&'a str>,
    /// Color attachments, where position `i` receives fragment output `@location(i)`.
    pub color_attachments: &'a [RenderPassColorAttachment],
    /// An optional depth-stencil attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
}

/// The viewport transform of a render pass, in framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Depth mapped from NDC z = 0.
    pub min_depth: f32,
    /// Depth mapped from NDC z = 1.
    pub max_depth: f32,
}

/// The scissor rectangle of a render pass, in framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}
