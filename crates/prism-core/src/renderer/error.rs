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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::command::ViewId;
use crate::renderer::api::resource::{ProgramHandle, TextureHandle};
use crate::renderer::traits::Fatal;
use std::fmt;

/// An error reported by a native graphics device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The host ran out of memory.
    OutOfHostMemory,
    /// The device ran out of memory.
    OutOfDeviceMemory,
    /// The device was lost (driver reset, removal).
    DeviceLost,
    /// The swap chain no longer matches the surface and must be recreated.
    OutOfDate,
    /// The surface backing a swap chain is gone.
    SurfaceLost,
    /// The swap chain still works but no longer matches the surface exactly.
    Suboptimal,
    /// A wait did not complete within its timeout.
    Timeout,
    /// The device could not be initialized.
    InitializationFailed(String),
    /// The device does not support a requested feature.
    Unsupported(String),
    /// Any other failure.
    Other(String),
}

impl NativeError {
    /// Returns `true` for the errors that only require the swap chain to be recreated.
    pub fn needs_swap_chain_refresh(&self) -> bool {
        matches!(
            self,
            NativeError::OutOfDate | NativeError::SurfaceLost | NativeError::Suboptimal
        )
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeError::OutOfHostMemory => write!(f, "Out of host memory."),
            NativeError::OutOfDeviceMemory => write!(f, "Out of device memory."),
            NativeError::DeviceLost => write!(f, "The native device was lost."),
            NativeError::OutOfDate => write!(f, "The swap chain is out of date."),
            NativeError::SurfaceLost => write!(f, "The presentation surface was lost."),
            NativeError::Suboptimal => write!(f, "The swap chain is suboptimal."),
            NativeError::Timeout => write!(f, "A wait operation timed out."),
            NativeError::InitializationFailed(msg) => {
                write!(f, "Native initialization failed: {msg}")
            }
            NativeError::Unsupported(msg) => write!(f, "Unsupported feature: {msg}"),
            NativeError::Other(msg) => write!(f, "Native error: {msg}"),
        }
    }
}

impl std::error::Error for NativeError {}

/// An error raised while parsing a shader container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The container does not start with a known magic.
    InvalidMagic([u8; 3]),
    /// The container version is newer than this parser understands.
    UnsupportedVersion(u8),
    /// The container ended before a field could be read.
    Truncated(&'static str),
    /// A uniform entry uses an unknown type tag.
    InvalidUniformType(u8),
    /// A uniform name is not valid UTF-8.
    InvalidName,
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::InvalidMagic(magic) => {
                write!(f, "Invalid shader magic: {magic:?}")
            }
            ShaderError::UnsupportedVersion(version) => {
                write!(f, "Unsupported shader container version: {version}")
            }
            ShaderError::Truncated(field) => {
                write!(f, "Shader container truncated while reading {field}")
            }
            ShaderError::InvalidUniformType(tag) => {
                write!(f, "Invalid uniform type tag: {tag:#x}")
            }
            ShaderError::InvalidName => write!(f, "Uniform name is not valid UTF-8"),
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader container could not be parsed.
    Shader(ShaderError),
    /// The native device refused to create or update the resource.
    Native(NativeError),
    /// The handle does not reference a live resource.
    InvalidHandle,
    /// An update went past the end of the resource.
    OutOfBounds,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Native(err) => write!(f, "Native resource error: {err}"),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Native(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<NativeError> for ResourceError {
    fn from(err: NativeError) -> Self {
        ResourceError::Native(err)
    }
}

/// A misuse of the API that is detected while a frame is translated.
///
/// The offending item is skipped and the violation is counted in the frame
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractViolation {
    /// A blit between textures with different sample counts.
    BlitSampleCountMismatch {
        /// The view the blit was recorded on.
        view: ViewId,
    },
    /// A blit region outside the source or destination texture.
    BlitOutOfRange {
        /// The view the blit was recorded on.
        view: ViewId,
    },
    /// A texture is sampled while attached to the frame buffer being rendered.
    FeedbackLoop {
        /// The sampled texture.
        texture: TextureHandle,
    },
    /// The program consumes vertex attributes but no vertex stream is bound.
    MissingVertexStream {
        /// The program of the draw.
        program: ProgramHandle,
    },
    /// The item references a resource that does not exist on the backend.
    UnknownResource,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::BlitSampleCountMismatch { view } => {
                write!(f, "Blit on view {view} mixes sample counts")
            }
            ContractViolation::BlitOutOfRange { view } => {
                write!(f, "Blit on view {view} is out of range")
            }
            ContractViolation::FeedbackLoop { texture } => {
                write!(
                    f,
                    "Texture {texture:?} is sampled while bound as a render target"
                )
            }
            ContractViolation::MissingVertexStream { program } => {
                write!(f, "Program {program:?} needs a vertex stream but none is bound")
            }
            ContractViolation::UnknownResource => {
                write!(f, "Render item references an unknown resource")
            }
        }
    }
}

/// A high-level error returned by a renderer backend.
#[derive(Debug)]
pub enum RenderError {
    /// The backend was shut down or never initialized.
    NotInitialized,
    /// An unrecoverable failure, already reported to the host callback.
    Fatal {
        /// The failure class.
        code: Fatal,
        /// A description of the failure.
        message: String,
    },
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The native device was lost. The backend must be reinitialized.
    DeviceLost,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The renderer is not initialized.")
            }
            RenderError::Fatal { code, message } => {
                write!(f, "Fatal renderer error ({code:?}): {message}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<NativeError> for RenderError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::DeviceLost => RenderError::DeviceLost,
            other => RenderError::ResourceError(ResourceError::Native(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn refresh_errors_are_classified() {
        assert!(NativeError::OutOfDate.needs_swap_chain_refresh());
        assert!(NativeError::SurfaceLost.needs_swap_chain_refresh());
        assert!(!NativeError::DeviceLost.needs_swap_chain_refresh());
    }

    #[test]
    fn resource_error_wraps_shader_error() {
        let res_err: ResourceError = ShaderError::Truncated("uniform name").into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader container truncated while reading uniform name"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn device_lost_maps_to_dedicated_variant() {
        let err: RenderError = NativeError::DeviceLost.into();
        assert!(matches!(err, RenderError::DeviceLost));

        let err: RenderError = NativeError::OutOfDeviceMemory.into();
        assert_eq!(
            format!("{err}"),
            "Graphics resource operation failed: Native resource error: Out of device memory."
        );
        assert!(err.source().and_then(|e| e.source()).is_some());
    }
}
