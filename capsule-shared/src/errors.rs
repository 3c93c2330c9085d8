//! Error taxonomy shared by the builder, the launcher and the CLI.
//!
//! Errors are categorized by the phase that raises them:
//! - Build-time: [`CapsuleError::BaseImageUnavailable`], [`CapsuleError::ContextCopy`],
//!   [`CapsuleError::DependencyResolution`]. All of them abort the build with no image.
//! - Launch-time: [`CapsuleError::EntrypointMissing`], [`CapsuleError::Execution`].
//! - Everything else is storage or argument trouble surfaced from either side.
//!
//! Every kind maps to a stable process exit code via [`CapsuleError::exit_code`].

use thiserror::Error;

use crate::constants::exit_codes;

/// Result alias used across the workspace.
pub type CapsuleResult<T> = Result<T, CapsuleError>;

#[derive(Debug, Error)]
pub enum CapsuleError {
    /// The pinned base runtime could not be resolved from the runtime catalog.
    #[error("base image unavailable: {0}")]
    BaseImageUnavailable(String),

    /// A declared source file, the manifest or the entrypoint file is missing
    /// from the build context, or copying it failed.
    #[error("context copy failed: {0}")]
    ContextCopy(String),

    /// The dependency manifest could not be parsed, resolved or installed.
    #[error("dependency resolution failed: {0}")]
    DependencyResolution(String),

    /// The frozen entrypoint is absent from the image at launch time.
    #[error("entrypoint missing: {0}")]
    EntrypointMissing(String),

    /// No image matches the given reference.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// The entrypoint exists but the process could not be started.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Caller supplied a malformed argument (reference, tag, recipe field).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation is not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Filesystem or serialization failure in the home directory.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CapsuleError {
    /// Process exit code reported when this error ends a CLI invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            CapsuleError::BaseImageUnavailable(_) => exit_codes::BASE_IMAGE_UNAVAILABLE,
            CapsuleError::ContextCopy(_) => exit_codes::CONTEXT_COPY,
            CapsuleError::DependencyResolution(_) => exit_codes::DEPENDENCY_RESOLUTION,
            CapsuleError::ImageNotFound(_) => exit_codes::IMAGE_NOT_FOUND,
            CapsuleError::Execution(_) => exit_codes::CANNOT_EXECUTE,
            CapsuleError::EntrypointMissing(_) => exit_codes::ENTRYPOINT_MISSING,
            CapsuleError::InvalidArgument(_)
            | CapsuleError::InvalidState(_)
            | CapsuleError::Storage(_)
            | CapsuleError::Internal(_) => exit_codes::GENERAL_FAILURE,
        }
    }

    /// Whether this error was raised by one of the build stages.
    pub fn is_build_failure(&self) -> bool {
        matches!(
            self,
            CapsuleError::BaseImageUnavailable(_)
                | CapsuleError::ContextCopy(_)
                | CapsuleError::DependencyResolution(_)
        )
    }
}

impl From<serde_json::Error> for CapsuleError {
    fn from(err: serde_json::Error) -> Self {
        CapsuleError::Storage(format!("json: {err}"))
    }
}
