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

//! Buffer descriptors and usage flags.

use crate::lyra_bitflags;
use crate::renderer::api::handle::lyra_handle;
use std::borrow::Cow;

lyra_handle! {
    /// An opaque handle to a GPU buffer owned by the device.
    BufferId
}

lyra_bitflags! {
    /// How a buffer may be used. Fixed at creation.
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for CPU reads.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for CPU writes.
        const MAP_WRITE = 1 << 1;
        /// The buffer can be the source of a copy.
        const COPY_SRC = 1 << 2;
        /// The buffer can be the destination of a copy or a queue write.
        const COPY_DST = 1 << 3;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 4;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 5;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 6;
        /// The buffer can be bound as a storage buffer.
        const STORAGE = 1 << 7;
    }
}

/// Describes a buffer to create.
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// A debug label, only used in diagnostics.
    pub label: Option<Cow<'a, str>>,
    /// Size of the buffer in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
    /// If `true`, the buffer starts mapped and can be written with
    /// `Device::write_mapped` until it is unmapped or first submitted.
    /// The size must then be a multiple of 4.
    pub mapped_at_creation: bool,
}

impl<'a> BufferDescriptor<'a> {
    /// A descriptor for a buffer of `size` bytes.
    pub fn new(label: &'a str, size: u64, usage: BufferUsage) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            size,
            usage,
            mapped_at_creation: false,
        }
    }

    /// Same descriptor, starting mapped.
    pub fn mapped(mut self) -> Self {
        self.mapped_at_creation = true;
        self
    }
}
