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

//! A CPU rasterizer implementing the device backend contract.
//!
//! It needs no GPU and no window, which makes it the reference backend for
//! tests and headless rendering.

mod device;
mod image;
pub mod kernel;
mod queue;
mod raster;
mod resources;
mod surface;

pub use self::device::{SoftwareDevice, SoftwareStats};
pub use self::kernel::{
    kernel_key, kernels, Bindings, FragmentInput, FragmentKernel, Kernel, KernelLibrary,
    VertexInput, VertexKernel, VertexOutput, MAX_VARYINGS,
};
pub use self::queue::PresentedFrame;
pub use self::surface::SOFTWARE_SURFACE_FORMAT;
