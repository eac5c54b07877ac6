//! Error types for the Nebula renderer
//!
//! This module defines the error types used throughout the renderer,
//! including validation, capability, native API and initialization failures.

use std::fmt;

/// Result type for Nebula renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a native graphics API (OpenGL or Vulkan)
///
/// Carried as the cause of [`Error::Native`] so callers see both the
/// driver diagnostic and the abstraction-level context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Native API name ("OpenGL", "Vulkan")
    pub api: &'static str,
    /// Raw error code returned by the driver (GLenum or VkResult)
    pub code: i64,
    /// Driver-provided description
    pub message: String,
}

impl NativeError {
    pub fn new(api: &'static str, code: i64, message: impl Into<String>) -> Self {
        Self {
            api,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error {}: {}", self.api, self.code, self.message)
    }
}

impl std::error::Error for NativeError {}

/// Nebula renderer errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, OpenGL, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (unknown handle, destroyed resource, wrong type)
    InvalidResource(String),

    /// Initialization failed (engine, renderer, subsystems)
    InitializationFailed(String),

    /// Invalid argument (bad dimensions, zero size, out of bounds)
    InvalidArgument(String),

    /// Operation called in the wrong phase (command buffer not recording, etc.)
    InvalidState(String),

    /// Capability not available on the active device
    Unsupported(String),

    /// Native API call failed
    Native {
        /// What the renderer was doing when the call failed
        context: String,
        /// Native diagnostic
        cause: NativeError,
    },
}

impl Error {
    /// Wrap a native API failure with renderer-level context
    pub fn native(context: impl Into<String>, cause: NativeError) -> Self {
        Error::Native {
            context: context.into(),
            cause,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported: {}", msg),
            Error::Native { context, cause } => write!(f, "{} ({})", context, cause),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Native { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
