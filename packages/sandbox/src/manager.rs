// ABOUTME: Unified sandbox manager routing sessions to their bound backend
// ABOUTME: Holds the session-to-backend binding map and backend registry

use crate::backends::SandboxBackend;
use crate::error::{Result, SandboxError};
use crate::types::{BackendKind, ExecutionOutput, SandboxHandle, StartedSandbox};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Clone)]
struct Binding {
    kind: BackendKind,
    handle: SandboxHandle,
}

/// Routes sessions to backends. One session binds to exactly one backend
/// kind for its lifetime; the binding changes only through stop + start.
///
/// Process-scoped: constructed at orchestrator startup and passed by
/// reference into collaborators.
pub struct UnifiedSandboxManager {
    backends: RwLock<HashMap<BackendKind, Arc<dyn SandboxBackend>>>,
    bindings: RwLock<HashMap<String, Binding>>,
}

impl UnifiedSandboxManager {
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Register a backend implementation, keyed by its kind.
    pub async fn register_backend(&self, backend: Arc<dyn SandboxBackend>) {
        let kind = backend.kind();
        let mut backends = self.backends.write().await;
        backends.insert(kind, backend);
        info!("Registered {} backend", kind);
    }

    pub async fn backend(&self, kind: BackendKind) -> Result<Arc<dyn SandboxBackend>> {
        let backends = self.backends.read().await;
        backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| SandboxError::Validation(format!("No {} backend registered", kind)))
    }

    /// Backend kind a session is bound to, if any.
    pub async fn backend_for(&self, session_id: &str) -> Option<BackendKind> {
        let bindings = self.bindings.read().await;
        bindings.get(session_id).map(|b| b.kind)
    }

    /// Create a sandbox for a session on the chosen backend and record the
    /// binding. A session that already holds a binding must be stopped
    /// before it can be started again.
    pub async fn start(
        &self,
        session_id: &str,
        environment: &str,
        kind: BackendKind,
    ) -> Result<StartedSandbox> {
        {
            let bindings = self.bindings.read().await;
            if let Some(existing) = bindings.get(session_id) {
                return Err(SandboxError::Validation(format!(
                    "Session {} is already bound to the {} backend",
                    session_id, existing.kind
                )));
            }
        }

        let backend = self.backend(kind).await?;
        let handle = backend.create(session_id, environment).await?;

        let mut bindings = self.bindings.write().await;
        bindings.insert(
            session_id.to_string(),
            Binding {
                kind,
                handle: handle.clone(),
            },
        );
        info!("Session {} bound to {} backend", session_id, kind);

        Ok(StartedSandbox {
            handle,
            backend: kind,
        })
    }

    /// Destroy the session's sandbox and drop the binding. A session with
    /// no recorded binding is a defensive no-op returning `false`.
    pub async fn stop(&self, session_id: &str, handle: &SandboxHandle) -> Result<bool> {
        let kind = {
            let bindings = self.bindings.read().await;
            match bindings.get(session_id) {
                Some(binding) => binding.kind,
                None => {
                    debug!("Stop requested for unbound session {}", session_id);
                    return Ok(false);
                }
            }
        };

        let backend = self.backend(kind).await?;
        let destroyed = backend.destroy(handle).await?;

        let mut bindings = self.bindings.write().await;
        bindings.remove(session_id);

        Ok(destroyed)
    }

    pub async fn execute(&self, session_id: &str, code: &str) -> Result<ExecutionOutput> {
        let (backend, handle) = self.route(session_id).await?;
        backend.execute(&handle, code).await
    }

    pub async fn read_file(&self, session_id: &str, path: &str) -> Result<Vec<u8>> {
        let (backend, handle) = self.route(session_id).await?;
        backend.read_file(&handle, path).await
    }

    pub async fn write_file(&self, session_id: &str, path: &str, content: &[u8]) -> Result<()> {
        let (backend, handle) = self.route(session_id).await?;
        backend.write_file(&handle, path, content).await
    }

    pub async fn list_files(&self, session_id: &str, path: &str) -> Result<Vec<String>> {
        let (backend, handle) = self.route(session_id).await?;
        backend.list_files(&handle, path).await
    }

    pub async fn url(&self, session_id: &str) -> Result<Option<String>> {
        let (backend, handle) = self.route(session_id).await?;
        backend.url(&handle).await
    }

    async fn route(&self, session_id: &str) -> Result<(Arc<dyn SandboxBackend>, SandboxHandle)> {
        let binding = {
            let bindings = self.bindings.read().await;
            bindings.get(session_id).cloned().ok_or_else(|| {
                SandboxError::NotFound(format!("No sandbox bound to session {}", session_id))
            })?
        };

        let backend = self.backend(binding.kind).await?;
        Ok((backend, binding.handle))
    }
}

impl Default for UnifiedSandboxManager {
    fn default() -> Self {
        Self::new()
    }
}
