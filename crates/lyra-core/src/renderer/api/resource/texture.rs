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

//! Textures, their views, and samplers.

use crate::lyra_bitflags;
use crate::math::Extent3D;
use crate::renderer::api::handle::lyra_handle;
use crate::renderer::api::pipeline::CompareFunction;
use crate::renderer::api::util::{SampleCount, TextureFormat};
use std::borrow::Cow;

lyra_handle! {
    /// An opaque handle to a GPU texture owned by the device.
    TextureId
}

lyra_handle! {
    /// An opaque handle to a texture view. Never outlives its texture.
    TextureViewId
}

lyra_handle! {
    /// An opaque handle to a sampler.
    SamplerId
}

lyra_bitflags! {
    /// How a texture may be used. Fixed at creation.
    pub struct TextureUsage: u32 {
        /// The texture can be the source of a copy (including readback).
        const COPY_SRC = 1 << 0;
        /// The texture can be the destination of a copy.
        const COPY_DST = 1 << 1;
        /// The texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// The texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// The texture can be a color or depth-stencil attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

/// The dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// A one-dimensional texture.
    D1,
    /// A two-dimensional texture.
    #[default]
    D2,
    /// A three-dimensional texture.
    D3,
}

/// How a view interprets the subresources of its texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewDimension {
    /// A 1D texture view.
    D1,
    /// A 2D texture view.
    D2,
    /// A 2D array texture view.
    D2Array,
    /// A cube texture view.
    Cube,
    /// A cube array texture view.
    CubeArray,
    /// A 3D texture view.
    D3,
}

/// Which planes of a texture a view or a copy refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageAspect {
    /// Every plane of the format.
    #[default]
    All,
    /// The stencil plane only.
    StencilOnly,
    /// The depth plane only.
    DepthOnly,
}

/// Describes a texture to create.
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// A debug label, only used in diagnostics.
    pub label: Option<Cow<'a, str>>,
    /// Texel format.
    pub format: TextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels, for 3D textures. Must be 1 otherwise.
    pub depth: u32,
    /// Number of array layers. Must be 1 for 3D textures.
    pub array_layers: u32,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Samples per texel.
    pub sample_count: SampleCount,
    /// Dimensionality.
    pub dimension: TextureDimension,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl<'a> TextureDescriptor<'a> {
    /// A single-level, single-sample 2D texture.
    pub fn new_2d(
        label: &'a str,
        format: TextureFormat,
        width: u32,
        height: u32,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            format,
            width,
            height,
            depth: 1,
            array_layers: 1,
            mip_levels: 1,
            sample_count: SampleCount::X1,
            dimension: TextureDimension::D2,
            usage,
        }
    }

    /// The size of mip level 0.
    pub fn extent(&self) -> Extent3D {
        Extent3D {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.depth.max(self.array_layers),
        }
    }
}

/// The subresource range and interpretation of a texture view.
#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor<'a> {
    /// A debug label, only used in diagnostics.
    pub label: Option<Cow<'a, str>>,
    /// The view format. `None` uses the texture format.
    pub format: Option<TextureFormat>,
    /// The view dimension. `None` derives it from the texture.
    pub dimension: Option<TextureViewDimension>,
    /// The planes visible through the view.
    pub aspect: ImageAspect,
    /// First mip level.
    pub base_mip_level: u32,
    /// Number of mip levels. `None` means all remaining levels.
    pub mip_level_count: Option<u32>,
    /// First array layer.
    pub base_array_layer: u32,
    /// Number of array layers. `None` means all remaining layers.
    pub array_layer_count: Option<u32>,
}

/// How texture coordinates outside `[0, 1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Repeat the texture.
    Repeat,
    /// Repeat the texture, mirroring every other tile.
    MirrorRepeat,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Linear interpolation between texels.
    Linear,
}

/// Describes a sampler to create.
#[derive(Debug, Clone, Default)]
pub struct SamplerDescriptor<'a> {
    /// A debug label, only used in diagnostics.
    pub label: Option<Cow<'a, str>>,
    /// Addressing along U.
    pub address_mode_u: AddressMode,
    /// Addressing along V.
    pub address_mode_v: AddressMode,
    /// Addressing along W.
    pub address_mode_w: AddressMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Filter between mip levels.
    pub mipmap_filter: FilterMode,
    /// If set, the sampler is a comparison sampler.
    pub compare: Option<CompareFunction>,
}
