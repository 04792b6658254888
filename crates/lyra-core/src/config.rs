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

//! Runtime configuration of the RHI and the windowing collaborator.

use crate::math::Extent2D;
use crate::platform::window::{LyraWindowHandle, SurfaceTarget};
use crate::renderer::api::core::{
    AdapterDescriptor, BackendKind, PowerPreference, PresentMode, RhiDescriptor, RhiFlags,
    SurfaceDescriptor, DEFAULT_FRAMES_IN_FLIGHT,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings resolved once at startup. Missing JSON fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhiConfig {
    /// Which backend to initialize.
    pub backend: BackendKind,
    /// Enable native validation layers.
    pub validation: bool,
    /// Attach debug names and verbose logging.
    pub debug: bool,
    /// Adapter power preference.
    pub power_preference: PowerPreference,
    /// Surface presentation mode.
    pub present_mode: PresentMode,
    /// Frames that may be in flight before acquisition blocks.
    pub frames_in_flight: u32,
    /// Title of the window the demos open.
    pub window_title: String,
    /// Initial window size.
    pub window_size: Extent2D,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            validation: cfg!(debug_assertions),
            debug: false,
            power_preference: PowerPreference::HighPerformance,
            present_mode: PresentMode::Fifo,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            window_title: "Lyra".to_owned(),
            window_size: Extent2D::new(1280, 720),
        }
    }
}

impl RhiConfig {
    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse RHI configuration")
    }

    /// Reads and parses a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?;
        log::info!("Loaded RHI configuration from {}", path.display());
        Ok(config)
    }

    /// The flags implied by `validation` and `debug`.
    pub fn flags(&self) -> RhiFlags {
        let mut flags = RhiFlags::EMPTY;
        if self.validation {
            flags.insert(RhiFlags::VALIDATION);
        }
        if self.debug {
            flags.insert(RhiFlags::DEBUG);
        }
        flags
    }

    /// The descriptor handed to `Rhi::init`.
    pub fn rhi_descriptor(&self, window: Option<LyraWindowHandle>) -> RhiDescriptor {
        RhiDescriptor {
            backend: self.backend,
            flags: self.flags(),
            window,
        }
    }

    /// The descriptor handed to `Rhi::request_adapter`.
    pub fn adapter_descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor {
            power_preference: self.power_preference,
            force_fallback_adapter: false,
        }
    }

    /// The descriptor of a surface presenting to `target`.
    pub fn surface_descriptor(&self, target: SurfaceTarget) -> SurfaceDescriptor<'static> {
        SurfaceDescriptor {
            label: Some("Main Surface".into()),
            target,
            present_mode: self.present_mode,
            frames_in_flight: self.frames_in_flight.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::window::HeadlessTarget;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RhiConfig::from_json_str(r#"{ "backend": "software", "frames_in_flight": 3 }"#).unwrap();
        assert_eq!(config.backend, BackendKind::Software);
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.present_mode, PresentMode::Fifo);
        assert_eq!(config.window_size, Extent2D::new(1280, 720));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(RhiConfig::from_json_str(r#"{ "backend": "glide" }"#).is_err());
    }

    #[test]
    fn descriptors_follow_the_config() {
        let config = RhiConfig {
            validation: true,
            debug: true,
            frames_in_flight: 0,
            ..Default::default()
        };
        let rhi = config.rhi_descriptor(None);
        assert!(rhi.flags.contains(RhiFlags::VALIDATION | RhiFlags::DEBUG));

        let surface = config.surface_descriptor(SurfaceTarget::Headless(HeadlessTarget::new(8, 8)));
        assert_eq!(surface.frames_in_flight, 1);
        assert_eq!(surface.target.extent(), Extent2D::new(8, 8));
    }
}
