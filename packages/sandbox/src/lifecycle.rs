// ABOUTME: Lifecycle orchestrator composing session identity, sandbox binding, and state snapshots
// ABOUTME: Stop is best-effort by design; suppressed failures are logged and counted

use crate::error::{Result, SandboxError};
use crate::manager::UnifiedSandboxManager;
use crate::types::{BackendKind, SandboxHandle, SessionInfo};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const CONFIG_SNAPSHOT: &str = "config.json";

/// Orchestrates session create/destroy flows: identity allocation, on-disk
/// session namespace, and sandbox binding through the unified manager.
pub struct LifecycleOrchestrator {
    sandboxes: Arc<UnifiedSandboxManager>,
    storage_root: PathBuf,
    failed_cleanups: AtomicU64,
}

impl LifecycleOrchestrator {
    pub fn new(
        sandboxes: Arc<UnifiedSandboxManager>,
        storage_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let storage_root = storage_root.into();
        std::fs::create_dir_all(storage_root.join("sessions"))
            .map_err(|e| SandboxError::Internal(e.to_string()))?;

        Ok(Self {
            sandboxes,
            storage_root,
            failed_cleanups: AtomicU64::new(0),
        })
    }

    /// Allocate a session, persist its config snapshot, and bind a sandbox.
    ///
    /// No transaction spans the two steps: a crash after sandbox creation
    /// but before the caller records the returned info orphans the sandbox.
    pub async fn start(
        &self,
        agent_config: Value,
        environment: &str,
        backend: BackendKind,
    ) -> Result<SessionInfo> {
        let session_id = Uuid::new_v4().to_string();
        info!("Starting session {} on {} backend", session_id, backend);

        let dir = self.session_dir(&session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SandboxError::Internal(e.to_string()))?;

        let snapshot = serde_json::to_vec_pretty(&agent_config)
            .map_err(|e| SandboxError::Internal(e.to_string()))?;
        tokio::fs::write(dir.join(CONFIG_SNAPSHOT), snapshot)
            .await
            .map_err(|e| SandboxError::Internal(e.to_string()))?;

        let started = self.sandboxes.start(&session_id, environment, backend).await?;

        Ok(SessionInfo {
            session_id,
            created_at: chrono::Utc::now(),
            handle: started.handle,
            backend,
            status: "running".to_string(),
        })
    }

    /// Tear down a session. Always reports `true` once both the destroy and
    /// the namespace cleanup have been attempted, so a partially-cleaned
    /// session never blocks deletion from the caller's perspective.
    /// Suppressed failures show up in logs and `failed_cleanups`.
    pub async fn stop(&self, session_id: &str, handle: &SandboxHandle) -> bool {
        match self.sandboxes.stop(session_id, handle).await {
            Ok(true) => info!("Destroyed sandbox for session {}", session_id),
            Ok(false) => info!("No sandbox to destroy for session {}", session_id),
            Err(e) => {
                warn!("Failed to destroy sandbox for session {}: {}", session_id, e);
                self.failed_cleanups.fetch_add(1, Ordering::Relaxed);
            }
        }

        let dir = self.session_dir(session_id);
        if dir.exists() {
            let marker = self
                .storage_root
                .join("sessions")
                .join(format!("session_{}.deleted", session_id));
            if let Err(e) = tokio::fs::rename(&dir, &marker).await {
                warn!(
                    "Failed to mark session namespace {} for cleanup: {}",
                    session_id, e
                );
                self.failed_cleanups.fetch_add(1, Ordering::Relaxed);
            }
        }

        true
    }

    /// Read back the persisted agent-config snapshot for a session.
    pub async fn session_state(&self, session_id: &str) -> Result<Value> {
        let path = self.session_dir(session_id).join(CONFIG_SNAPSHOT);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SandboxError::NotFound(format!("Unknown session: {}", session_id))
            } else {
                SandboxError::Internal(e.to_string())
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|e| SandboxError::Internal(e.to_string()))
    }

    /// Backend kind the session is currently bound to, if any.
    pub async fn backend_for(&self, session_id: &str) -> Option<BackendKind> {
        self.sandboxes.backend_for(session_id).await
    }

    /// Count of destroy/cleanup failures suppressed by `stop`.
    pub fn failed_cleanups(&self) -> u64 {
        self.failed_cleanups.load(Ordering::Relaxed)
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.storage_root
            .join("sessions")
            .join(format!("session_{}", session_id))
    }
}
