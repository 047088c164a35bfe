// ABOUTME: Tests for session-to-backend routing through the unified manager
// ABOUTME: Verifies binding invariants, unsupported-operation failures, and stop idempotence

use async_trait::async_trait;
use skiff_sandbox::backends::SandboxBackend;
use skiff_sandbox::{
    BackendKind, ExecutionOutput, SandboxError, SandboxHandle, UnifiedSandboxManager,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted backend that tracks live handles so destroy is observable.
struct ScriptedBackend {
    kind: BackendKind,
    live: Mutex<HashSet<String>>,
    created: AtomicUsize,
}

impl ScriptedBackend {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            live: Mutex::new(HashSet::new()),
            created: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SandboxBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn create(
        &self,
        session_id: &str,
        _environment: &str,
    ) -> skiff_sandbox::Result<SandboxHandle> {
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let id = format!("sbx-{}-{}", session_id, n);
        self.live.lock().unwrap().insert(id.clone());
        Ok(SandboxHandle::new(id))
    }

    async fn destroy(&self, handle: &SandboxHandle) -> skiff_sandbox::Result<bool> {
        Ok(self.live.lock().unwrap().remove(&handle.id))
    }

    async fn execute(
        &self,
        _handle: &SandboxHandle,
        code: &str,
    ) -> skiff_sandbox::Result<ExecutionOutput> {
        if self.kind != BackendKind::RemoteManaged {
            return Err(SandboxError::unsupported("execute", self.kind));
        }
        Ok(ExecutionOutput {
            stdout: format!("ran: {}", code),
            ..Default::default()
        })
    }
}

async fn manager_with_both_backends() -> Arc<UnifiedSandboxManager> {
    let manager = Arc::new(UnifiedSandboxManager::new());
    manager
        .register_backend(Arc::new(ScriptedBackend::new(BackendKind::LocalContainer)))
        .await;
    manager
        .register_backend(Arc::new(ScriptedBackend::new(BackendKind::RemoteManaged)))
        .await;
    manager
}

#[tokio::test]
async fn test_start_records_binding() {
    let manager = manager_with_both_backends().await;

    let started = manager
        .start("s1", "py-env", BackendKind::RemoteManaged)
        .await
        .expect("start failed");

    assert_eq!(started.backend, BackendKind::RemoteManaged);
    assert_eq!(
        manager.backend_for("s1").await,
        Some(BackendKind::RemoteManaged)
    );
}

#[tokio::test]
async fn test_rebinding_is_rejected() {
    let manager = manager_with_both_backends().await;

    manager
        .start("s1", "py-env", BackendKind::RemoteManaged)
        .await
        .expect("start failed");

    let second = manager
        .start("s1", "ubuntu:22.04", BackendKind::LocalContainer)
        .await;
    assert!(matches!(second, Err(SandboxError::Validation(_))));

    // The original binding is untouched
    assert_eq!(
        manager.backend_for("s1").await,
        Some(BackendKind::RemoteManaged)
    );
}

/// Operations route to the bound backend; unsupported ones fail naming
/// the operation and the bound kind, never silently rerouting.
#[tokio::test]
async fn test_execute_on_local_container_is_unsupported() {
    let manager = manager_with_both_backends().await;

    manager
        .start("local", "ubuntu:22.04", BackendKind::LocalContainer)
        .await
        .expect("start failed");

    let err = manager
        .execute("local", "print(1)")
        .await
        .expect_err("execute should fail on local-container");

    match err {
        SandboxError::UnsupportedOperation { operation, backend } => {
            assert_eq!(operation, "execute");
            assert_eq!(backend, BackendKind::LocalContainer);
        }
        other => panic!("Expected UnsupportedOperation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_execute_routes_to_remote_backend() {
    let manager = manager_with_both_backends().await;

    manager
        .start("remote", "py-env", BackendKind::RemoteManaged)
        .await
        .expect("start failed");

    let output = manager
        .execute("remote", "print(1+1)")
        .await
        .expect("execute failed");
    assert!(output.stdout.contains("print(1+1)"));
}

#[tokio::test]
async fn test_file_ops_unsupported_on_local_container() {
    let manager = manager_with_both_backends().await;

    manager
        .start("local", "ubuntu:22.04", BackendKind::LocalContainer)
        .await
        .expect("start failed");

    assert!(matches!(
        manager.read_file("local", "/tmp/x").await,
        Err(SandboxError::UnsupportedOperation { .. })
    ));
    assert!(matches!(
        manager.write_file("local", "/tmp/x", b"data").await,
        Err(SandboxError::UnsupportedOperation { .. })
    ));
    assert!(matches!(
        manager.list_files("local", "/tmp").await,
        Err(SandboxError::UnsupportedOperation { .. })
    ));
}

#[tokio::test]
async fn test_operations_on_unbound_session_are_not_found() {
    let manager = manager_with_both_backends().await;

    assert!(matches!(
        manager.execute("ghost", "print(1)").await,
        Err(SandboxError::NotFound(_))
    ));
}

/// Stopping twice returns `false` the second time and raises no error.
#[tokio::test]
async fn test_stop_is_idempotent() {
    let manager = manager_with_both_backends().await;

    let started = manager
        .start("s1", "py-env", BackendKind::RemoteManaged)
        .await
        .expect("start failed");

    let first = manager.stop("s1", &started.handle).await.expect("stop failed");
    assert!(first);

    let second = manager.stop("s1", &started.handle).await.expect("stop failed");
    assert!(!second);
}

#[tokio::test]
async fn test_stop_without_binding_is_defensive_noop() {
    let manager = manager_with_both_backends().await;

    let result = manager
        .stop("never-started", &SandboxHandle::new("sbx-x"))
        .await
        .expect("stop failed");
    assert!(!result);
}

#[tokio::test]
async fn test_stop_allows_recreate() {
    let manager = manager_with_both_backends().await;

    let first = manager
        .start("s1", "py-env", BackendKind::RemoteManaged)
        .await
        .expect("start failed");
    manager.stop("s1", &first.handle).await.expect("stop failed");

    let second = manager
        .start("s1", "ubuntu:22.04", BackendKind::LocalContainer)
        .await
        .expect("recreate failed");
    assert_eq!(second.backend, BackendKind::LocalContainer);
}

#[tokio::test]
async fn test_start_with_unregistered_backend_fails() {
    let manager = Arc::new(UnifiedSandboxManager::new());

    let result = manager.start("s1", "py-env", BackendKind::RemoteManaged).await;
    assert!(matches!(result, Err(SandboxError::Validation(_))));
}
