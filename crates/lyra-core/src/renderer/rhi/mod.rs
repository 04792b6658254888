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

//! The RHI core: the device, its resource registry and state tracker,
//! command recording and presentation surfaces.
//!
//! Everything here is backend-agnostic. Native work is delegated to a
//! [`DeviceBackend`](crate::renderer::traits::DeviceBackend).

mod arena;
mod device;
mod factory;
mod recorder;
mod registry;
mod surface;
mod tracker;

pub use self::device::Device;
pub use self::factory::{BUFFER_OFFSET_ALIGNMENT, MAX_VERTEX_BUFFER_STRIDE};
pub use self::recorder::CommandRecorder;
pub use self::surface::{FrameState, Surface, SurfaceTexture};
pub use self::tracker::StateTracker;
