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

//! Physical adapters and logical device requests.

use super::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The physical type of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceType {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized GPU.
    VirtualGpu,
    /// A renderer running on the CPU.
    Cpu,
    /// An unknown device type.
    #[default]
    Unknown,
}

/// Power preference when choosing among several adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    /// No preference.
    #[default]
    None,
    /// Prefer an integrated or otherwise low-power adapter.
    LowPower,
    /// Prefer a discrete adapter.
    HighPerformance,
}

/// Options for `Rhi::request_adapter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdapterDescriptor {
    /// Power preference.
    pub power_preference: PowerPreference,
    /// Ask for a fallback (software) adapter.
    pub force_fallback_adapter: bool,
}

/// Information about a physical adapter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdapterInfo {
    /// The adapter name reported by the driver.
    pub name: String,
    /// The native API the adapter runs on.
    pub backend: BackendKind,
    /// The device type.
    pub device_type: DeviceType,
    /// Driver description, possibly empty.
    pub driver: String,
}

/// Options for `Adapter::request_device`.
#[derive(Debug, Clone, Default)]
pub struct DeviceDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
}
