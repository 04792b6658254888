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

//! Runtime backend selection.

use crate::lyra_bitflags;
use crate::platform::window::LyraWindowHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The native graphics API a device runs on. Chosen at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pick the best native backend, falling back to software.
    #[default]
    Auto,
    /// The CPU reference backend.
    Software,
    /// Vulkan.
    Vulkan,
    /// Metal.
    Metal,
    /// Direct3D 12.
    Dx12,
    /// OpenGL / OpenGL ES.
    Gl,
}

impl BackendKind {
    /// `true` for backends driving a real GPU through a native API.
    pub fn is_native(&self) -> bool {
        !matches!(self, BackendKind::Software | BackendKind::Auto)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Auto => "auto",
            BackendKind::Software => "software",
            BackendKind::Vulkan => "vulkan",
            BackendKind::Metal => "metal",
            BackendKind::Dx12 => "dx12",
            BackendKind::Gl => "gl",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "software" | "cpu" => Ok(BackendKind::Software),
            "vulkan" | "vk" => Ok(BackendKind::Vulkan),
            "metal" => Ok(BackendKind::Metal),
            "dx12" | "d3d12" => Ok(BackendKind::Dx12),
            "gl" | "opengl" | "gles" => Ok(BackendKind::Gl),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

lyra_bitflags! {
    /// Debugging aids requested at initialization.
    pub struct RhiFlags: u32 {
        /// Attach debug names and verbose logs.
        const DEBUG = 1 << 0;
        /// Enable native API validation layers.
        const VALIDATION = 1 << 1;
    }
}

/// Everything needed to initialize the RHI.
#[derive(Clone, Default)]
pub struct RhiDescriptor {
    /// The backend to use.
    pub backend: BackendKind,
    /// Debug and validation flags.
    pub flags: RhiFlags,
    /// The window surfaces will be created for, if any. Native backends use
    /// it to find an adapter able to present to it.
    pub window: Option<LyraWindowHandle>,
}

impl fmt::Debug for RhiDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhiDescriptor")
            .field("backend", &self.backend)
            .field("flags", &self.flags)
            .field("window", &self.window.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_round_trip_through_display() {
        for kind in [
            BackendKind::Auto,
            BackendKind::Software,
            BackendKind::Vulkan,
            BackendKind::Metal,
            BackendKind::Dx12,
            BackendKind::Gl,
        ] {
            assert_eq!(kind.to_string().parse::<BackendKind>(), Ok(kind));
        }
        assert_eq!("D3D12".parse::<BackendKind>(), Ok(BackendKind::Dx12));
        assert!("glide".parse::<BackendKind>().is_err());
    }

    #[test]
    fn rhi_descriptor_debug_reports_window_presence() {
        let descriptor = RhiDescriptor {
            backend: BackendKind::Software,
            flags: RhiFlags::VALIDATION,
            window: None,
        };
        assert_eq!(
            format!("{descriptor:?}"),
            "RhiDescriptor { backend: Software, flags: RhiFlags(VALIDATION), window: false }"
        );
    }
}
