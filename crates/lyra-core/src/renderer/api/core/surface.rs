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

//! Presentation surfaces.

use crate::math::Extent2D;
use crate::platform::window::SurfaceTarget;
use crate::renderer::api::util::TextureFormat;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Default number of frames that may be in flight before acquisition blocks.
pub const DEFAULT_FRAMES_IN_FLIGHT: u32 = 2;

/// How presented images are queued for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentMode {
    /// Wait for vertical blank, never tear. Always supported.
    #[default]
    Fifo,
    /// Replace the queued image, never tear.
    Mailbox,
    /// Present immediately, may tear.
    Immediate,
}

/// Describes a surface to create.
#[derive(Debug, Clone)]
pub struct SurfaceDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// What the surface presents to.
    pub target: SurfaceTarget,
    /// Presentation mode.
    pub present_mode: PresentMode,
    /// Frames that may be in flight before `get_current_texture` blocks.
    pub frames_in_flight: u32,
}

/// The live configuration of a surface backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfiguration {
    /// Format of the swapchain images.
    pub format: TextureFormat,
    /// Size of the swapchain images.
    pub extent: Extent2D,
    /// Presentation mode.
    pub present_mode: PresentMode,
}
