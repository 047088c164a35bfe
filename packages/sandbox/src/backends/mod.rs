// ABOUTME: Backend trait and implementations for sandbox execution environments
// ABOUTME: Capability-set interface selected once at session-bind time

use crate::error::{Result, SandboxError};
use crate::types::{BackendKind, ExecutionOutput, SandboxHandle};
use async_trait::async_trait;

pub mod docker;
pub mod remote;

pub use docker::DockerBackend;
pub use remote::RemoteBackend;

/// Capability set implemented once per backend kind.
///
/// Operations a backend does not support keep the default implementation,
/// which fails with `UnsupportedOperation` naming the operation and the
/// backend kind.
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Create a sandbox for a session from an environment spec (container
    /// image or service template id).
    async fn create(&self, session_id: &str, environment: &str) -> Result<SandboxHandle>;

    /// Destroy a sandbox. Idempotent: destroying an already-destroyed or
    /// unknown handle returns `false`, never an error.
    async fn destroy(&self, handle: &SandboxHandle) -> Result<bool>;

    async fn execute(&self, _handle: &SandboxHandle, _code: &str) -> Result<ExecutionOutput> {
        Err(SandboxError::unsupported("execute", self.kind()))
    }

    async fn read_file(&self, _handle: &SandboxHandle, _path: &str) -> Result<Vec<u8>> {
        Err(SandboxError::unsupported("read_file", self.kind()))
    }

    async fn write_file(
        &self,
        _handle: &SandboxHandle,
        _path: &str,
        _content: &[u8],
    ) -> Result<()> {
        Err(SandboxError::unsupported("write_file", self.kind()))
    }

    /// List entries of a directory. A nonexistent directory yields an empty
    /// list, not an error.
    async fn list_files(&self, _handle: &SandboxHandle, _path: &str) -> Result<Vec<String>> {
        Err(SandboxError::unsupported("list_files", self.kind()))
    }

    /// Reachable URL for the sandbox, for backends that expose one.
    async fn url(&self, _handle: &SandboxHandle) -> Result<Option<String>> {
        Err(SandboxError::unsupported("url", self.kind()))
    }
}
