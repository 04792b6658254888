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

//! Defines the hierarchy of error types for the RHI.
//!
//! * [`ValidationError`]: the caller broke a rule (malformed descriptor, wrong
//!   barrier, mismatched bind group...). Always fatal to the operation.
//! * [`ResourceError`] and [`RenderError`]: creation, allocation and device
//!   failures, wrapping the two above where an operation can fail both ways.
//!
//! A suboptimal surface image is not an error; see `SurfaceTexture::is_suboptimal`.

use crate::renderer::api::core::ShaderModuleId;
use crate::renderer::api::handle::{AnyResource, ResourceId};
use crate::renderer::api::resource::{BufferId, ResourceState};
use crate::renderer::api::util::{ShaderStage, TextureFormat};
use std::fmt;

fn label_or_unknown(label: &Option<String>) -> &str {
    label.as_deref().unwrap_or("Unknown")
}

/// An error related to the loading or compilation of a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// An error occurred while trying to load the shader source from a path.
    LoadError {
        /// The path of the file that failed to load.
        path: String,
        /// The underlying I/O error.
        source_error: String,
    },
    /// The shader source failed to compile. No blob is produced.
    CompilationError {
        /// The module name.
        label: String,
        /// Compiler diagnostics.
        details: String,
    },
    /// The compiled module has no entry point with this name.
    EntryPointNotFound {
        /// The module name.
        module: String,
        /// The requested entry point.
        entry_point: String,
    },
    /// The requested shader module could not be found.
    NotFound {
        /// The ID of the shader module that was not found.
        id: ShaderModuleId,
    },
    /// A blob carries no code.
    EmptyBlob {
        /// The entry point of the blob.
        entry_point: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::LoadError { path, source_error } => {
                write!(f, "Failed to load shader source from '{path}': {source_error}")
            }
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::EntryPointNotFound {
                module,
                entry_point,
            } => {
                write!(f, "Entry point '{entry_point}' not found in module '{module}'")
            }
            ShaderError::NotFound { id } => {
                write!(f, "Shader module not found for ID: {id:?}")
            }
            ShaderError::EmptyBlob { entry_point } => {
                write!(f, "Shader blob for entry point '{entry_point}' is empty")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error raised while linking shader stages and fixed-function state into a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A shader module provided for the pipeline was invalid or missing.
    InvalidShaderModuleForPipeline {
        /// The ID of the invalid shader module.
        id: ShaderModuleId,
        /// The label of the pipeline being created.
        pipeline_label: Option<String>,
    },
    /// A shader module was used for a stage it was not compiled for.
    StageMismatch {
        /// The label of the pipeline being created.
        pipeline_label: Option<String>,
        /// The stage the module was plugged into.
        expected: ShaderStage,
        /// The stage of the module's entry point.
        found: ShaderStage,
    },
    /// The vertex buffer layouts do not feed the vertex shader inputs.
    VertexInputMismatch {
        /// The label of the pipeline being created.
        pipeline_label: Option<String>,
        /// The offending shader location.
        location: u32,
        /// What is wrong.
        reason: String,
    },
    /// A shader binding is missing from, or incompatible with, the pipeline layout.
    BindSlotMismatch {
        /// The label of the pipeline being created.
        pipeline_label: Option<String>,
        /// The bind group index.
        group: u32,
        /// The binding index.
        binding: u32,
        /// What is wrong.
        reason: String,
    },
    /// The color targets do not match the fragment outputs or the device.
    IncompatibleColorTarget(String),
    /// The depth/stencil state is not compatible with its format.
    IncompatibleDepthStencilFormat(String),
    /// A required graphics feature is not supported by the backend.
    FeatureNotSupported(String),
    /// The backend failed to build the pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidShaderModuleForPipeline { id, pipeline_label } => write!(
                f,
                "Invalid shader module {id:?} for pipeline '{}'",
                label_or_unknown(pipeline_label)
            ),
            PipelineError::StageMismatch {
                pipeline_label,
                expected,
                found,
            } => write!(
                f,
                "Pipeline '{}' expects a {expected:?} shader but the module is a {found:?} shader",
                label_or_unknown(pipeline_label)
            ),
            PipelineError::VertexInputMismatch {
                pipeline_label,
                location,
                reason,
            } => write!(
                f,
                "Vertex input @location({location}) of pipeline '{}': {reason}",
                label_or_unknown(pipeline_label)
            ),
            PipelineError::BindSlotMismatch {
                pipeline_label,
                group,
                binding,
                reason,
            } => write!(
                f,
                "Binding @group({group}) @binding({binding}) of pipeline '{}': {reason}",
                label_or_unknown(pipeline_label)
            ),
            PipelineError::IncompatibleColorTarget(msg) => {
                write!(f, "Incompatible color target: {msg}")
            }
            PipelineError::IncompatibleDepthStencilFormat(msg) => {
                write!(f, "Incompatible depth/stencil format: {msg}")
            }
            PipelineError::FeatureNotSupported(msg) => {
                write!(f, "Feature not supported: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => write!(
                f,
                "Pipeline compilation failed for '{}': {details}",
                label_or_unknown(label)
            ),
        }
    }
}

impl std::error::Error for PipelineError {}

/// A broken usage rule. Fatal to the operation, never corrected silently.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A descriptor is malformed.
    InvalidDescriptor {
        /// The label of the object being created.
        label: Option<String>,
        /// What is wrong.
        reason: String,
    },
    /// A handle refers to an object that does not exist (anymore).
    StaleHandle(AnyResource),
    /// A barrier declared a "before" state different from the tracked state.
    StateMismatch {
        /// The resource.
        resource: ResourceId,
        /// The state declared by the barrier.
        declared: ResourceState,
        /// The state recorded by the tracker.
        tracked: ResourceState,
    },
    /// A command needs the resource in a state it is not in.
    UnexpectedState {
        /// The resource.
        resource: ResourceId,
        /// Every state the command accepts.
        required: Vec<ResourceState>,
        /// The state recorded by the tracker.
        tracked: ResourceState,
    },
    /// A bind group does not match its layout.
    BindGroupMismatch {
        /// The label of the bind group.
        label: Option<String>,
        /// What is wrong.
        reason: String,
    },
    /// A resource lacks the usage flag an operation needs.
    MissingUsage {
        /// The resource.
        resource: AnyResource,
        /// The missing usage.
        usage: String,
    },
    /// A command was recorded where it is not allowed.
    RecordingOrder(String),
    /// The depth-stencil format of a pipeline differs from the pass attachment.
    DepthStencilFormatMismatch {
        /// The pipeline label.
        pipeline: Option<String>,
        /// The format the pipeline was built for.
        pipeline_format: Option<TextureFormat>,
        /// The format of the attachment of the current pass.
        attachment_format: Option<TextureFormat>,
    },
    /// The color targets of a pipeline differ from the pass attachments.
    ColorTargetMismatch {
        /// The pipeline label.
        pipeline: Option<String>,
        /// What is wrong.
        reason: String,
    },
    /// A draw was issued without the state it needs.
    IncompleteDrawState(String),
    /// An access falls outside a resource.
    OutOfBounds(String),
    /// A CPU write targets a buffer whose mapping is closed.
    BufferNotMapped(BufferId),
    /// A frame cannot be presented yet, or at all.
    PresentNotReady(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidDescriptor { label, reason } => write!(
                f,
                "Invalid descriptor for '{}': {reason}",
                label_or_unknown(label)
            ),
            ValidationError::StaleHandle(resource) => {
                write!(f, "Handle {resource:?} does not refer to a live object")
            }
            ValidationError::StateMismatch {
                resource,
                declared,
                tracked,
            } => write!(
                f,
                "Barrier on {resource:?} declares state {declared} but the tracked state is {tracked}"
            ),
            ValidationError::UnexpectedState {
                resource,
                required,
                tracked,
            } => {
                let accepted = required
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ");
                write!(
                    f,
                    "{resource:?} must be in state {accepted} but the tracked state is {tracked}"
                )
            }
            ValidationError::BindGroupMismatch { label, reason } => write!(
                f,
                "Bind group '{}' does not match its layout: {reason}",
                label_or_unknown(label)
            ),
            ValidationError::MissingUsage { resource, usage } => {
                write!(f, "{resource:?} was not created with usage {usage}")
            }
            ValidationError::RecordingOrder(msg) => write!(f, "Invalid command order: {msg}"),
            ValidationError::DepthStencilFormatMismatch {
                pipeline,
                pipeline_format,
                attachment_format,
            } => write!(
                f,
                "Pipeline '{}' uses depth-stencil format {pipeline_format:?} but the pass attachment is {attachment_format:?}",
                label_or_unknown(pipeline)
            ),
            ValidationError::ColorTargetMismatch { pipeline, reason } => write!(
                f,
                "Pipeline '{}' does not match the pass color attachments: {reason}",
                label_or_unknown(pipeline)
            ),
            ValidationError::IncompleteDrawState(msg) => write!(f, "Incomplete draw state: {msg}"),
            ValidationError::OutOfBounds(msg) => write!(f, "Out of bounds: {msg}"),
            ValidationError::BufferNotMapped(id) => {
                write!(f, "Buffer {id:?} is not mapped for CPU writes")
            }
            ValidationError::PresentNotReady(msg) => write!(f, "Cannot present: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// An error related to the creation or use of a GPU object.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// A usage rule was broken.
    Validation(ValidationError),
    /// The device could not allocate memory for the object.
    OutOfMemory {
        /// The label of the object being created.
        label: Option<String>,
        /// The requested size in bytes.
        requested: u64,
    },
    /// The backend does not support what was asked.
    Unsupported(String),
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::Validation(err) => write!(f, "Validation error: {err}"),
            ResourceError::OutOfMemory { label, requested } => write!(
                f,
                "Out of memory while creating '{}' ({requested} bytes)",
                label_or_unknown(label)
            ),
            ResourceError::Unsupported(msg) => write!(f, "Unsupported by backend: {msg}"),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            ResourceError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

impl From<ValidationError> for ResourceError {
    fn from(err: ValidationError) -> Self {
        ResourceError::Validation(err)
    }
}

/// A high-level error of the device, its queue or a surface.
#[derive(Debug)]
pub enum RenderError {
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// No adapter matched the request.
    AdapterRequestFailed(String),
    /// The adapter refused to create a logical device.
    DeviceRequestFailed(String),
    /// Failed to acquire the next frame from the surface for a non-transient reason.
    SurfaceAcquisitionFailed(String),
    /// A usage rule was broken.
    Validation(ValidationError),
    /// An error occurred while managing a GPU object.
    ResourceError(ResourceError),
    /// The graphics device was lost. Unrecoverable within a session.
    DeviceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::AdapterRequestFailed(msg) => {
                write!(f, "No suitable graphics adapter: {msg}")
            }
            RenderError::DeviceRequestFailed(msg) => {
                write!(f, "Failed to create the logical device: {msg}")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::Validation(err) => write!(f, "Validation error: {err}"),
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Validation(err) => Some(err),
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Validation(err) => RenderError::Validation(err),
            other => RenderError::ResourceError(other),
        }
    }
}

impl From<ValidationError> for RenderError {
    fn from(err: ValidationError) -> Self {
        RenderError::Validation(err)
    }
}

impl From<ShaderError> for RenderError {
    fn from(err: ShaderError) -> Self {
        RenderError::ResourceError(ResourceError::Shader(err))
    }
}

impl RenderError {
    /// The validation error inside, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            RenderError::Validation(err) => Some(err),
            RenderError::ResourceError(ResourceError::Validation(err)) => Some(err),
            _ => None,
        }
    }
}

impl ResourceError {
    /// The validation error inside, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ResourceError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::LoadError {
            path: "shaders/triangle.wgsl".to_string(),
            source_error: "File not found".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to load shader source from 'shaders/triangle.wgsl': File not found"
        );

        let err = ShaderError::EntryPointNotFound {
            module: "Triangle".to_string(),
            entry_point: "vsmain".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Entry point 'vsmain' not found in module 'Triangle'"
        );
    }

    #[test]
    fn pipeline_error_names_the_location() {
        let err = PipelineError::VertexInputMismatch {
            pipeline_label: Some("Mask".to_string()),
            location: 1,
            reason: "no attribute".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Vertex input @location(1) of pipeline 'Mask': no attribute"
        );
    }

    #[test]
    fn resource_error_chains_its_source() {
        let res_err: ResourceError = ShaderError::CompilationError {
            label: "Window".to_string(),
            details: "unbalanced braces".to_string(),
        }
        .into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader compilation failed for 'Window': unbalanced braces"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn validation_errors_stay_validation_errors_when_widened() {
        let err = ValidationError::RecordingOrder("draw outside of a render pass".to_string());
        let render: RenderError = ResourceError::from(err.clone()).into();
        assert_eq!(render.as_validation(), Some(&err));
        assert_eq!(
            format!("{render}"),
            "Validation error: Invalid command order: draw outside of a render pass"
        );
    }

    #[test]
    fn unexpected_state_lists_every_accepted_state() {
        use crate::renderer::api::handle::Handle;
        use crate::renderer::api::resource::TextureId;

        let err = ValidationError::UnexpectedState {
            resource: TextureId(Handle::new(3, 0)).into(),
            required: vec![
                ResourceState::DepthStencilReadOnly,
                ResourceState::DepthStencilAttachment,
            ],
            tracked: ResourceState::Undefined,
        };
        let message = format!("{err}");
        assert!(
            message.ends_with(
                "must be in state DepthStencilReadOnly or DepthStencilAttachment but the tracked state is Undefined"
            ),
            "{message}"
        );
    }

    #[test]
    fn render_error_display() {
        assert_eq!(
            format!("{}", RenderError::DeviceLost),
            "The graphics device was lost and needs to be reinitialized."
        );
        let err = RenderError::AdapterRequestFailed("no Vulkan driver".to_string());
        assert_eq!(format!("{err}"), "No suitable graphics adapter: no Vulkan driver");
        assert!(err.source().is_none());
    }
}
