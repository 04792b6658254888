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

//! CPU images: the storage behind software textures.
//!
//! Color texels are kept as linear `[f32; 4]`, depth as `f32` in `[0, 1]`
//! and stencil as `u8`. Writes are quantized to the precision of the
//! texture format, so blending and readback behave like a GPU would.

use lyra_core::renderer::api::resource::{ImageAspect, TextureDescriptor};
use lyra_core::renderer::api::util::TextureFormat;

/// One mip level of an image, every layer stacked.
#[derive(Debug, Clone)]
pub(crate) struct Level {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub color: Vec<[f32; 4]>,
    pub depth: Vec<f32>,
    pub stencil: Vec<u8>,
}

impl Level {
    fn new(format: TextureFormat, width: u32, height: u32, layers: u32) -> Self {
        let texels = (width * height * layers) as usize;
        let color_format = !format.is_depth_stencil();
        Self {
            width,
            height,
            layers,
            color: if color_format { vec![[0.0; 4]; texels] } else { Vec::new() },
            depth: if format.has_depth() { vec![0.0; texels] } else { Vec::new() },
            stencil: if format.has_stencil() { vec![0; texels] } else { Vec::new() },
        }
    }

    /// Index of texel `(x, y)` of `layer`.
    #[inline]
    pub fn index(&self, layer: u32, x: u32, y: u32) -> usize {
        ((layer * self.height + y) * self.width + x) as usize
    }

    fn layer_range(&self, layer: u32) -> std::ops::Range<usize> {
        let size = (self.width * self.height) as usize;
        let start = layer as usize * size;
        start..start + size
    }
}

/// The texel storage of one software texture.
#[derive(Debug, Clone)]
pub(crate) struct Image {
    pub format: TextureFormat,
    pub sample_count: u32,
    pub levels: Vec<Level>,
}

impl Image {
    /// A zero-initialized image for a texture descriptor.
    pub fn new(descriptor: &TextureDescriptor) -> Self {
        let layers = descriptor.depth.max(1) * descriptor.array_layers.max(1);
        let levels = (0..descriptor.mip_levels.max(1))
            .map(|level| {
                Level::new(
                    descriptor.format,
                    (descriptor.width >> level).max(1),
                    (descriptor.height >> level).max(1),
                    layers,
                )
            })
            .collect();
        Self {
            format: descriptor.format,
            sample_count: descriptor.sample_count.count(),
            levels,
        }
    }

    /// A single-level 2D image, as used for swapchain frames.
    pub fn frame(format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            sample_count: 1,
            levels: vec![Level::new(format, width, height, 1)],
        }
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    /// Writes a color texel, quantized to the format.
    #[inline]
    pub fn store_color(format: TextureFormat, level: &mut Level, index: usize, value: [f32; 4]) {
        level.color[index] = quantize(format, value);
    }

    /// Fills one layer of a level: the color, depth or stencil planes that
    /// are given.
    pub fn clear(
        &mut self,
        level: u32,
        layer: u32,
        color: Option<[f32; 4]>,
        depth: Option<f32>,
        stencil: Option<u8>,
    ) {
        let format = self.format;
        let Some(level) = self.levels.get_mut(level as usize) else {
            return;
        };
        let range = level.layer_range(layer);
        if let Some(color) = color {
            if !level.color.is_empty() {
                level.color[range.clone()].fill(quantize(format, color));
            }
        }
        if let Some(depth) = depth {
            if !level.depth.is_empty() {
                level.depth[range.clone()].fill(quantize_depth(format, depth));
            }
        }
        if let Some(stencil) = stencil {
            if !level.stencil.is_empty() {
                level.stencil[range].fill(stencil);
            }
        }
    }

    /// Encodes level 0, layer 0 of one aspect, tightly packed.
    pub fn read(&self, aspect: ImageAspect) -> Vec<u8> {
        let level = &self.levels[0];
        let range = level.layer_range(0);
        let stencil_only = aspect == ImageAspect::StencilOnly
            || (aspect == ImageAspect::All && self.format == TextureFormat::Stencil8);
        if stencil_only {
            return level.stencil[range].to_vec();
        }
        if self.format.has_depth() {
            let mut out = Vec::with_capacity(range.len() * 4);
            for depth in &level.depth[range] {
                encode_depth(self.format, *depth, &mut out);
            }
            return out;
        }
        let mut out = Vec::with_capacity(range.len() * self.format.bytes_per_pixel() as usize);
        for texel in &level.color[range] {
            encode_color(self.format, *texel, &mut out);
        }
        out
    }

    /// Resolves a multisampled layer into `target`. The rasterizer shades
    /// one sample per pixel, so this copies the stored value.
    pub fn resolve_into(&self, level: u32, layer: u32, target: &mut Image, target_level: u32, target_layer: u32) {
        let format = target.format;
        let Some(source) = self.levels.get(level as usize) else {
            return;
        };
        let Some(dest) = target.levels.get_mut(target_level as usize) else {
            return;
        };
        if source.width != dest.width || source.height != dest.height {
            return;
        }
        let from = source.layer_range(layer);
        let to = dest.layer_range(target_layer);
        for (d, s) in dest.color[to].iter_mut().zip(&source.color[from]) {
            *d = quantize(format, *s);
        }
    }
}

/// Linear to sRGB transfer function.
pub(crate) fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// sRGB to linear transfer function.
pub(crate) fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn unorm8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Rounds a color to what the format can store.
pub(crate) fn quantize(format: TextureFormat, value: [f32; 4]) -> [f32; 4] {
    let [r, g, b, a] = value;
    let q = |c: f32| unorm8(c) as f32 / 255.0;
    let q_srgb = |c: f32| srgb_to_linear(unorm8(linear_to_srgb(c)) as f32 / 255.0);
    match format {
        TextureFormat::R8Unorm => [q(r), 0.0, 0.0, 1.0],
        TextureFormat::Rg8Unorm => [q(r), q(g), 0.0, 1.0],
        TextureFormat::Rgba8Unorm | TextureFormat::Bgra8Unorm => [q(r), q(g), q(b), q(a)],
        TextureFormat::Rgba8UnormSrgb | TextureFormat::Bgra8UnormSrgb => {
            [q_srgb(r), q_srgb(g), q_srgb(b), q(a)]
        }
        TextureFormat::R32Uint => [r.max(0.0).round(), 0.0, 0.0, 1.0],
        TextureFormat::R32Float => [r, 0.0, 0.0, 1.0],
        TextureFormat::Rg32Float => [r, g, 0.0, 1.0],
        TextureFormat::Rgba32Float => value,
        _ => value,
    }
}

/// Rounds a depth value to what the format can store.
pub(crate) fn quantize_depth(format: TextureFormat, depth: f32) -> f32 {
    let depth = depth.clamp(0.0, 1.0);
    match format {
        TextureFormat::Depth16Unorm => (depth * 65535.0).round() / 65535.0,
        TextureFormat::Depth24Plus | TextureFormat::Depth24PlusStencil8 => {
            const MAX: f32 = ((1u32 << 24) - 1) as f32;
            ((depth * MAX).round() / MAX).clamp(0.0, 1.0)
        }
        _ => depth,
    }
}

/// Appends the byte encoding of a color texel.
pub(crate) fn encode_color(format: TextureFormat, value: [f32; 4], out: &mut Vec<u8>) {
    let [r, g, b, a] = value;
    let s = linear_to_srgb;
    match format {
        TextureFormat::R8Unorm => out.push(unorm8(r)),
        TextureFormat::Rg8Unorm => out.extend([unorm8(r), unorm8(g)]),
        TextureFormat::Rgba8Unorm => out.extend([unorm8(r), unorm8(g), unorm8(b), unorm8(a)]),
        TextureFormat::Rgba8UnormSrgb => {
            out.extend([unorm8(s(r)), unorm8(s(g)), unorm8(s(b)), unorm8(a)])
        }
        TextureFormat::Bgra8Unorm => out.extend([unorm8(b), unorm8(g), unorm8(r), unorm8(a)]),
        TextureFormat::Bgra8UnormSrgb => {
            out.extend([unorm8(s(b)), unorm8(s(g)), unorm8(s(r)), unorm8(a)])
        }
        TextureFormat::R32Uint => out.extend((r.max(0.0) as u32).to_le_bytes()),
        TextureFormat::R32Float => out.extend(r.to_le_bytes()),
        TextureFormat::Rg32Float => {
            out.extend(r.to_le_bytes());
            out.extend(g.to_le_bytes());
        }
        TextureFormat::Rgba32Float => {
            for c in value {
                out.extend(c.to_le_bytes());
            }
        }
        _ => {}
    }
}

/// Appends the byte encoding of a depth value.
pub(crate) fn encode_depth(format: TextureFormat, depth: f32, out: &mut Vec<u8>) {
    match format {
        TextureFormat::Depth16Unorm => out.extend(((depth * 65535.0).round() as u16).to_le_bytes()),
        TextureFormat::Depth24Plus | TextureFormat::Depth24PlusStencil8 => {
            let max = ((1u32 << 24) - 1) as f32;
            out.extend(((depth * max).round() as u32).to_le_bytes())
        }
        _ => out.extend(depth.to_le_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use lyra_core::renderer::api::resource::TextureUsage;

    fn image(format: TextureFormat) -> Image {
        Image::new(&TextureDescriptor::new_2d(
            "test",
            format,
            4,
            2,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
        ))
    }

    #[test]
    fn clear_then_read_bgra_swaps_channels() {
        let mut img = image(TextureFormat::Bgra8Unorm);
        img.clear(0, 0, Some([1.0, 0.5, 0.0, 1.0]), None, None);
        let bytes = img.read(ImageAspect::All);
        assert_eq!(bytes.len(), 4 * 2 * 4);
        assert_eq!(&bytes[..4], &[0, 128, 255, 255]);
    }

    #[test]
    fn srgb_round_trip_is_stable() {
        let stored = quantize(TextureFormat::Rgba8UnormSrgb, [0.2, 0.5, 0.8, 1.0]);
        assert_eq!(quantize(TextureFormat::Rgba8UnormSrgb, stored), stored);
        assert_abs_diff_eq!(stored[1], 0.5, epsilon = 0.01);
    }

    #[test]
    fn combined_depth_stencil_reads_each_aspect() {
        let mut img = image(TextureFormat::Depth24PlusStencil8);
        img.clear(0, 0, None, Some(1.0), Some(7));
        let stencil = img.read(ImageAspect::StencilOnly);
        assert_eq!(stencil, vec![7; 8]);
        let depth = img.read(ImageAspect::DepthOnly);
        assert_eq!(&depth[..4], &0x00ff_ffffu32.to_le_bytes());
    }

    #[test]
    fn mip_chain_halves_down_to_one() {
        let mut descriptor =
            TextureDescriptor::new_2d("mips", TextureFormat::R8Unorm, 5, 3, TextureUsage::COPY_SRC);
        descriptor.mip_levels = 3;
        let img = Image::new(&descriptor);
        let sizes: Vec<_> = img.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(5, 3), (2, 1), (1, 1)]);
    }
}
