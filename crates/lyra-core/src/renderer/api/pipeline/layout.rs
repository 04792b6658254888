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

//! Pipeline layout descriptors.

use crate::renderer::api::command::BindGroupLayoutId;
use crate::renderer::api::handle::lyra_handle;
use std::borrow::Cow;

lyra_handle! {
    /// An opaque handle to a pipeline layout.
    PipelineLayoutId
}

/// The most bind groups a pipeline layout may declare.
pub const MAX_BIND_GROUPS: usize = 4;

/// Describes a [`PipelineLayoutId`]: the bind group layouts a pipeline can
/// access, indexed by group number.
#[derive(Debug, Clone)]
pub struct PipelineLayoutDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Bind group layouts, where position `i` describes `@group(i)`.
    pub bind_group_layouts: &'a [BindGroupLayoutId],
}
