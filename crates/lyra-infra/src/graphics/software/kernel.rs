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

//! Software shader kernels and the resources they can read.
//!
//! The software backend does not interpret shader code. Each entry point of
//! a module is bound, at compile time, to a native closure registered in a
//! [`KernelLibrary`] under the key `"<module>::<entry_point>"`.

use super::image::Level;
use lyra_core::math::Mat4;
use lyra_core::renderer::api::pipeline::CompareFunction;
use lyra_core::renderer::api::resource::{AddressMode, FilterMode, SamplerDescriptor};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// The most varyings a vertex kernel can hand to the fragment stage.
pub const MAX_VARYINGS: usize = 8;

/// The key a kernel is registered under.
pub fn kernel_key(module: &str, entry_point: &str) -> String {
    format!("{module}::{entry_point}")
}

/// Immutable sampler parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SamplerState {
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub mag_filter: FilterMode,
    pub compare: Option<CompareFunction>,
}

impl From<&SamplerDescriptor<'_>> for SamplerState {
    fn from(descriptor: &SamplerDescriptor<'_>) -> Self {
        Self {
            address_u: descriptor.address_mode_u,
            address_v: descriptor.address_mode_v,
            mag_filter: descriptor.mag_filter,
            compare: descriptor.compare,
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Bound<'a> {
    Buffer(&'a [u8]),
    Texture { level: &'a Level, layer: u32 },
    Sampler(SamplerState),
}

/// The resources bound for one draw, as seen by a kernel.
#[derive(Default)]
pub struct Bindings<'a> {
    entries: Vec<(u32, u32, Bound<'a>)>,
}

impl fmt::Debug for Bindings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(g, b, _)| (g, b)))
            .finish()
    }
}

impl<'a> Bindings<'a> {
    pub(crate) fn push(&mut self, group: u32, binding: u32, bound: Bound<'a>) {
        self.entries.push((group, binding, bound));
    }

    fn find(&self, group: u32, binding: u32) -> Option<&Bound<'a>> {
        self.entries
            .iter()
            .find(|(g, b, _)| *g == group && *b == binding)
            .map(|(_, _, bound)| bound)
    }

    /// The bytes of a bound buffer range.
    pub fn buffer(&self, group: u32, binding: u32) -> Option<&'a [u8]> {
        match self.find(group, binding) {
            Some(Bound::Buffer(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Reads a `T` from the start of a bound buffer.
    pub fn uniform<T: bytemuck::Pod>(&self, group: u32, binding: u32) -> Option<T> {
        let bytes = self.buffer(group, binding)?;
        bytes
            .get(..std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
    }

    /// Fetches texel `(x, y)` of a bound texture, clamped to its edges.
    /// Depth textures return the depth in the red channel.
    pub fn load(&self, group: u32, binding: u32, x: i32, y: i32) -> [f32; 4] {
        match self.find(group, binding) {
            Some(Bound::Texture { level, layer }) => fetch(level, *layer, x, y),
            _ => [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Samples a bound texture with a bound sampler at normalized `uv`.
    pub fn sample(&self, group: u32, texture: u32, sampler: u32, uv: [f32; 2]) -> [f32; 4] {
        let (Some(Bound::Texture { level, layer }), Some(Bound::Sampler(state))) =
            (self.find(group, texture), self.find(group, sampler))
        else {
            return [0.0, 0.0, 0.0, 1.0];
        };
        let (w, h) = (level.width as f32, level.height as f32);
        let u = address(state.address_u, uv[0]) * w - 0.5;
        let v = address(state.address_v, uv[1]) * h - 0.5;
        match state.mag_filter {
            FilterMode::Nearest => fetch(level, *layer, (u + 0.5).floor() as i32, (v + 0.5).floor() as i32),
            FilterMode::Linear => {
                let (x0, y0) = (u.floor(), v.floor());
                let (fx, fy) = (u - x0, v - y0);
                let (x0, y0) = (x0 as i32, y0 as i32);
                let t00 = fetch(level, *layer, x0, y0);
                let t10 = fetch(level, *layer, x0 + 1, y0);
                let t01 = fetch(level, *layer, x0, y0 + 1);
                let t11 = fetch(level, *layer, x0 + 1, y0 + 1);
                std::array::from_fn(|i| {
                    let top = t00[i] + (t10[i] - t00[i]) * fx;
                    let bottom = t01[i] + (t11[i] - t01[i]) * fx;
                    top + (bottom - top) * fy
                })
            }
        }
    }

    /// Compares `reference` against a bound depth texture with a comparison
    /// sampler. Returns 1.0 when the comparison passes.
    pub fn sample_compare(&self, group: u32, texture: u32, sampler: u32, uv: [f32; 2], reference: f32) -> f32 {
        let Some(Bound::Sampler(state)) = self.find(group, sampler) else {
            return 0.0;
        };
        let stored = self.sample(group, texture, sampler, uv)[0];
        let compare = state.compare.unwrap_or(CompareFunction::Always);
        if compare.passes(reference, stored) {
            1.0
        } else {
            0.0
        }
    }
}

fn address(mode: AddressMode, c: f32) -> f32 {
    match mode {
        AddressMode::ClampToEdge => c.clamp(0.0, 1.0),
        AddressMode::Repeat => c.rem_euclid(1.0),
        AddressMode::MirrorRepeat => {
            let t = c.rem_euclid(2.0);
            if t > 1.0 {
                2.0 - t
            } else {
                t
            }
        }
    }
}

fn fetch(level: &Level, layer: u32, x: i32, y: i32) -> [f32; 4] {
    let x = x.clamp(0, level.width as i32 - 1) as u32;
    let y = y.clamp(0, level.height as i32 - 1) as u32;
    let index = level.index(layer, x, y);
    if let Some(depth) = level.depth.get(index) {
        return [*depth, 0.0, 0.0, 1.0];
    }
    if let Some(color) = level.color.get(index) {
        return *color;
    }
    match level.stencil.get(index) {
        Some(s) => [*s as f32, 0.0, 0.0, 1.0],
        None => [0.0, 0.0, 0.0, 1.0],
    }
}

/// What a vertex kernel sees.
pub struct VertexInput<'a> {
    /// `@builtin(vertex_index)`.
    pub vertex_index: u32,
    /// `@builtin(instance_index)`.
    pub instance_index: u32,
    pub(crate) attributes: &'a [[f32; 4]],
    /// Bound resources.
    pub bindings: &'a Bindings<'a>,
}

impl VertexInput<'_> {
    /// The attribute at `@location(location)`. Missing components are
    /// `(0, 0, 0, 1)`.
    pub fn attribute(&self, location: u32) -> [f32; 4] {
        self.attributes
            .get(location as usize)
            .copied()
            .unwrap_or([0.0, 0.0, 0.0, 1.0])
    }
}

/// What a vertex kernel produces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexOutput {
    /// `@builtin(position)` in clip space.
    pub position: [f32; 4],
    /// Values interpolated across the primitive, by location.
    pub varyings: [[f32; 4]; MAX_VARYINGS],
}

impl Default for VertexOutput {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0, 1.0],
            varyings: [[0.0; 4]; MAX_VARYINGS],
        }
    }
}

/// What a fragment kernel sees.
pub struct FragmentInput<'a> {
    /// `@builtin(position)`: pixel center, depth and `1/w`.
    pub position: [f32; 4],
    /// `@builtin(front_facing)`.
    pub front_facing: bool,
    pub(crate) varyings: &'a [[f32; 4]; MAX_VARYINGS],
    /// Bound resources.
    pub bindings: &'a Bindings<'a>,
}

impl FragmentInput<'_> {
    /// The interpolated varying at `@location(location)`.
    pub fn varying(&self, location: u32) -> [f32; 4] {
        self.varyings
            .get(location as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// A vertex entry point.
pub type VertexKernel = Arc<dyn Fn(&VertexInput<'_>, &mut VertexOutput) + Send + Sync>;

/// A fragment entry point. Writes one color per target; returning `false`
/// discards the fragment.
pub type FragmentKernel = Arc<dyn Fn(&FragmentInput<'_>, &mut [[f32; 4]]) -> bool + Send + Sync>;

/// A registered entry point.
#[derive(Clone)]
pub enum Kernel {
    /// A vertex kernel.
    Vertex(VertexKernel),
    /// A fragment kernel.
    Fragment(FragmentKernel),
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Vertex(_) => f.write_str("Kernel::Vertex"),
            Kernel::Fragment(_) => f.write_str("Kernel::Fragment"),
        }
    }
}

/// Registered kernels, shared between the software compiler and device.
#[derive(Default)]
pub struct KernelLibrary {
    kernels: RwLock<HashMap<String, Kernel>>,
}

impl fmt::Debug for KernelLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelLibrary")
            .field("kernels", &self.len())
            .finish()
    }
}

impl KernelLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the vertex kernel of `module::entry_point`.
    pub fn register_vertex(
        &self,
        module: &str,
        entry_point: &str,
        kernel: impl Fn(&VertexInput<'_>, &mut VertexOutput) + Send + Sync + 'static,
    ) {
        self.insert(kernel_key(module, entry_point), Kernel::Vertex(Arc::new(kernel)));
    }

    /// Registers the fragment kernel of `module::entry_point`.
    pub fn register_fragment(
        &self,
        module: &str,
        entry_point: &str,
        kernel: impl Fn(&FragmentInput<'_>, &mut [[f32; 4]]) -> bool + Send + Sync + 'static,
    ) {
        self.insert(kernel_key(module, entry_point), Kernel::Fragment(Arc::new(kernel)));
    }

    fn insert(&self, key: String, kernel: Kernel) {
        log::debug!("KernelLibrary: registered {kernel:?} '{key}'");
        self.kernels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, kernel);
    }

    /// The kernel registered under `key`.
    pub fn get(&self, key: &str) -> Option<Kernel> {
        self.kernels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of registered kernels.
    pub fn len(&self) -> usize {
        self.kernels.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ready-made kernels for common shaders.
pub mod kernels {
    use super::*;

    /// Position from `@location(0)`, `@location(1)` forwarded as varying 0.
    pub fn pass_through(input: &VertexInput<'_>, out: &mut VertexOutput) {
        let [x, y, z, _] = input.attribute(0);
        out.position = [x, y, z, 1.0];
        out.varyings[0] = input.attribute(1);
    }

    /// Like [`pass_through`], with the position multiplied by the `Mat4`
    /// uniform at `@group(0) @binding(0)`.
    pub fn transformed(input: &VertexInput<'_>, out: &mut VertexOutput) {
        let [x, y, z, _] = input.attribute(0);
        let matrix = input.bindings.uniform::<Mat4>(0, 0).unwrap_or_default();
        out.position = matrix.transform([x, y, z, 1.0]);
        out.varyings[0] = input.attribute(1);
    }

    /// Writes varying 0 to the first target.
    pub fn varying_color(input: &FragmentInput<'_>, out: &mut [[f32; 4]]) -> bool {
        if let Some(target) = out.first_mut() {
            *target = input.varying(0);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_looks_kernels_up_by_module_and_entry() {
        let library = KernelLibrary::new();
        library.register_vertex("triangle", "vs_main", kernels::pass_through);
        library.register_fragment("triangle", "fs_main", kernels::varying_color);
        assert_eq!(library.len(), 2);
        assert!(matches!(library.get("triangle::vs_main"), Some(Kernel::Vertex(_))));
        assert!(matches!(library.get("triangle::fs_main"), Some(Kernel::Fragment(_))));
        assert!(library.get("other::vs_main").is_none());
    }

    #[test]
    fn uniform_reads_pod_values() {
        let matrix = Mat4::from_translation(lyra_core::math::Vec3::new(1.0, 2.0, 3.0));
        let bytes = bytemuck::bytes_of(&matrix).to_vec();
        let mut bindings = Bindings::default();
        bindings.push(0, 0, Bound::Buffer(&bytes));
        assert_eq!(bindings.uniform::<Mat4>(0, 0), Some(matrix));
        assert_eq!(bindings.uniform::<Mat4>(0, 1), None);
    }

    #[test]
    fn pass_through_promotes_position() {
        let bindings = Bindings::default();
        let attributes = [[0.5, -0.5, 0.25, 1.0], [1.0, 0.0, 0.0, 1.0]];
        let input = VertexInput {
            vertex_index: 0,
            instance_index: 0,
            attributes: &attributes,
            bindings: &bindings,
        };
        let mut out = VertexOutput::default();
        kernels::pass_through(&input, &mut out);
        assert_eq!(out.position, [0.5, -0.5, 0.25, 1.0]);
        assert_eq!(out.varyings[0], [1.0, 0.0, 0.0, 1.0]);
    }
}
