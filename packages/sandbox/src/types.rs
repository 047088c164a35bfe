// ABOUTME: Core type definitions for sandbox sessions and execution results
// ABOUTME: Defines backend kinds, handles, execution output, and session info

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend kind a session can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Containers on a local runtime (Docker)
    LocalContainer,
    /// Hosted sandbox service with code execution and a file API
    RemoteManaged,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::LocalContainer => write!(f, "local-container"),
            BackendKind::RemoteManaged => write!(f, "remote-managed"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local-container" => Ok(BackendKind::LocalContainer),
            "remote-managed" => Ok(BackendKind::RemoteManaged),
            other => Err(format!("Unknown backend kind: {}", other)),
        }
    }
}

/// Backend-specific sandbox identifier plus optional reachable URL.
///
/// Created and owned by the backend; everything else holds a reference copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SandboxHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Binary artifact produced by a sandbox execution (e.g. a rendered chart).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionArtifact {
    pub content_type: String,
    /// Base64-encoded payload
    pub data: String,
}

/// Result of running code inside a sandbox.
///
/// User-code runtime errors land in `error`/`stderr`; only interpreter
/// failures surface as `SandboxError::Execution`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<ExecutionArtifact>,
}

impl ExecutionOutput {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of binding a session to a backend.
#[derive(Debug, Clone, Serialize)]
pub struct StartedSandbox {
    pub handle: SandboxHandle,
    pub backend: BackendKind,
}

/// Session identity and sandbox binding returned by the lifecycle
/// orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub handle: SandboxHandle,
    pub backend: BackendKind,
    pub status: String,
}
