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

//! The recorded command stream handed to a backend queue.

use super::pass::{
    RenderPassColorAttachment, RenderPassDepthStencilAttachment, ScissorRect, Viewport,
};
use super::sync::{BarrierSync, Signal};
use super::BindGroupId;
use crate::math::Extent2D;
use crate::renderer::api::pipeline::RenderPipelineId;
use crate::renderer::api::handle::AnyResource;
use crate::renderer::api::resource::{BufferId, StateRequirement, StateTransition};
use crate::renderer::api::util::IndexFormat;
use std::borrow::Cow;
use std::ops::Range;

/// The queue a command buffer is recorded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueueType {
    /// The general-purpose graphics queue.
    #[default]
    Default,
    /// A compute-only queue.
    Compute,
    /// A copy-only queue.
    Transfer,
}

/// Describes a command buffer to create.
#[derive(Debug, Clone, Default)]
pub struct CommandBufferDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The queue the buffer will be submitted to.
    pub queue: QueueType,
}

/// An owned render pass description, as stored in the command stream.
#[derive(Debug, Clone)]
pub struct RenderPassCommand {
    /// Debug label.
    pub label: Option<String>,
    /// Color attachments.
    pub color_attachments: Vec<RenderPassColorAttachment>,
    /// Depth-stencil attachment.
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment>,
    /// Extent shared by every attachment.
    pub extent: Extent2D,
}

/// One recorded command.
#[derive(Debug, Clone)]
pub enum Command {
    /// A validated state transition.
    Barrier(StateTransition),
    /// Wait for a signal before executing the given stages.
    Wait {
        /// The signal waited on.
        signal: Signal,
        /// The stages that must not start before the signal is set.
        stage: BarrierSync,
    },
    /// Set a signal once the given stages of all prior commands completed.
    Signal {
        /// The signal to set.
        signal: Signal,
        /// The stages that must complete first.
        stage: BarrierSync,
    },
    /// Start a render pass.
    BeginRenderPass(RenderPassCommand),
    /// End the current render pass.
    EndRenderPass,
    /// Set the viewport.
    SetViewport(Viewport),
    /// Set the scissor rectangle.
    SetScissorRect(ScissorRect),
    /// Bind a render pipeline.
    SetPipeline(RenderPipelineId),
    /// Bind a bind group.
    SetBindGroup {
        /// The group index.
        index: u32,
        /// The bind group.
        bind_group: BindGroupId,
        /// Offsets for dynamic buffer slots, in slot order.
        dynamic_offsets: Vec<u32>,
    },
    /// Bind a vertex buffer to a slot.
    SetVertexBuffer {
        /// The slot.
        slot: u32,
        /// The buffer.
        buffer: BufferId,
        /// Byte offset of the first element.
        offset: u64,
    },
    /// Bind the index buffer.
    SetIndexBuffer {
        /// The buffer.
        buffer: BufferId,
        /// Index type.
        format: IndexFormat,
        /// Byte offset of the first index.
        offset: u64,
    },
    /// Set the stencil reference value.
    SetStencilReference(u32),
    /// Draw non-indexed primitives.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// Draw indexed primitives.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Value added to each index before fetching vertices.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
    /// Copy bytes between buffers.
    CopyBufferToBuffer {
        /// Source buffer.
        source: BufferId,
        /// Source offset.
        source_offset: u64,
        /// Destination buffer.
        destination: BufferId,
        /// Destination offset.
        destination_offset: u64,
        /// Byte count.
        size: u64,
    },
}

/// A finished, immutable recording. It can be submitted exactly once.
#[derive(Debug)]
pub struct CommandBuffer {
    pub(crate) label: Option<String>,
    pub(crate) queue: QueueType,
    pub(crate) commands: Vec<Command>,
    pub(crate) requirements: Vec<StateRequirement>,
    pub(crate) referenced: Vec<AnyResource>,
}

impl CommandBuffer {
    /// The debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The target queue.
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    /// The recorded commands, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Tracker expectations and final states of every touched resource.
    pub fn requirements(&self) -> &[StateRequirement] {
        &self.requirements
    }

    /// Every object the commands use, each listed once.
    pub fn referenced(&self) -> &[AnyResource] {
        &self.referenced
    }

    /// Every buffer the commands use.
    pub fn referenced_buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.referenced.iter().filter_map(|r| match r {
            AnyResource::Buffer(id) => Some(*id),
            _ => None,
        })
    }

    /// Every signal this buffer waits on.
    pub fn waits(&self) -> impl Iterator<Item = &Signal> {
        self.commands.iter().filter_map(|c| match c {
            Command::Wait { signal, .. } => Some(signal),
            _ => None,
        })
    }

    /// Every signal this buffer sets.
    pub fn signals(&self) -> impl Iterator<Item = &Signal> {
        self.commands.iter().filter_map(|c| match c {
            Command::Signal { signal, .. } => Some(signal),
            _ => None,
        })
    }
}
