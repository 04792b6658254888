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

//! # Lyra Core
//!
//! A backend-agnostic render hardware interface. Client code describes
//! devices, resources, pipelines and command sequences through uniform
//! descriptors; the core validates them, tracks resource states and frame
//! pacing, and hands the result to a native backend.

#![warn(missing_docs)]

pub mod config;
pub mod math;
pub mod platform;
pub mod renderer;
pub mod utils;

pub use config::RhiConfig;
pub use renderer::{Device, Surface, SurfaceTexture};
