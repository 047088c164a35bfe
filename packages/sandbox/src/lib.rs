// ABOUTME: Sandbox backend management and session lifecycle package for Skiff
// ABOUTME: Provides interchangeable execution backends behind a unified routing manager

pub mod backends;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod types;

pub use backends::{DockerBackend, RemoteBackend, SandboxBackend};
pub use error::{Result, SandboxError};
pub use lifecycle::LifecycleOrchestrator;
pub use manager::UnifiedSandboxManager;
pub use types::{
    BackendKind, ExecutionArtifact, ExecutionOutput, SandboxHandle, SessionInfo, StartedSandbox,
};
