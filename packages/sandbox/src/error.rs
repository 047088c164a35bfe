// ABOUTME: Error taxonomy for sandbox backends and session lifecycle
// ABOUTME: Distinguishes retryable provisioning failures from terminal client errors

use crate::types::BackendKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    /// The backend could not create a sandbox (bad image/template, quota,
    /// network). Retryable.
    #[error("Provisioning failed: {0}")]
    Provision(String),

    /// The interpreter or runtime inside a sandbox failed. User-code
    /// runtime errors are not this; they surface in the execution output.
    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    UnsupportedOperation {
        operation: &'static str,
        backend: BackendKind,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SandboxError {
    pub fn unsupported(operation: &'static str, backend: BackendKind) -> Self {
        SandboxError::UnsupportedOperation { operation, backend }
    }

    /// Transient errors are worth retrying with backoff; validation and
    /// not-found errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, SandboxError::Provision(_))
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
