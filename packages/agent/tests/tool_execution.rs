// ABOUTME: Tests for tool resolution, validation, and structured failure capture
// ABOUTME: The executor must never propagate an error out of execute

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use skiff_agent::tools::Tool;
use skiff_agent::{ToolDefinition, ToolExecutor, ToolRegistry, ToolResult};
use skiff_sandbox::backends::SandboxBackend;
use skiff_sandbox::{
    BackendKind, ExecutionOutput, SandboxError, SandboxHandle, UnifiedSandboxManager,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Remote-managed backend double with canned execution and file behavior.
struct CannedBackend;

#[async_trait]
impl SandboxBackend for CannedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteManaged
    }

    async fn create(
        &self,
        session_id: &str,
        _environment: &str,
    ) -> skiff_sandbox::Result<SandboxHandle> {
        Ok(SandboxHandle::new(format!("sbx-{}", session_id)))
    }

    async fn destroy(&self, _handle: &SandboxHandle) -> skiff_sandbox::Result<bool> {
        Ok(true)
    }

    async fn execute(
        &self,
        _handle: &SandboxHandle,
        code: &str,
    ) -> skiff_sandbox::Result<ExecutionOutput> {
        if code.contains("print(1+1)") {
            Ok(ExecutionOutput {
                stdout: "2\n".to_string(),
                ..Default::default()
            })
        } else if code.contains("import pandas") {
            Ok(ExecutionOutput {
                stdout: "Shape: (100, 2)\n".to_string(),
                ..Default::default()
            })
        } else {
            Ok(ExecutionOutput {
                error: Some("NameError: name 'x' is not defined".to_string()),
                stderr: "Traceback ...".to_string(),
                ..Default::default()
            })
        }
    }

    async fn read_file(
        &self,
        _handle: &SandboxHandle,
        path: &str,
    ) -> skiff_sandbox::Result<Vec<u8>> {
        if path == "/data/points.csv" {
            Ok(b"x,y\n1,2\n".to_vec())
        } else {
            Err(SandboxError::NotFound(format!("No such file: {}", path)))
        }
    }

    async fn write_file(
        &self,
        _handle: &SandboxHandle,
        _path: &str,
        _content: &[u8],
    ) -> skiff_sandbox::Result<()> {
        Ok(())
    }

    async fn list_files(
        &self,
        _handle: &SandboxHandle,
        _path: &str,
    ) -> skiff_sandbox::Result<Vec<String>> {
        Ok(vec!["points.csv".to_string()])
    }
}

async fn executor_with_sandbox() -> ToolExecutor {
    let manager = Arc::new(UnifiedSandboxManager::new());
    manager.register_backend(Arc::new(CannedBackend)).await;
    manager
        .start("s1", "py-env", BackendKind::RemoteManaged)
        .await
        .expect("start failed");
    ToolExecutor::with_builtins(manager).await
}

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echo the provided text".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
            examples: None,
        }
    }

    async fn run(&self, _session_id: &str, arguments: &Value) -> skiff_sandbox::Result<ToolResult> {
        let mut payload = Map::new();
        payload.insert("echoed".to_string(), arguments["text"].clone());
        Ok(ToolResult::ok(payload))
    }
}

/// A registered tool resolves; an unregistered name yields a failed result
/// mentioning "not found" without raising.
#[tokio::test]
async fn test_unknown_tool_mentions_not_found() {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(EchoTool)).await;
    let executor = ToolExecutor::new(registry);

    let echoed = executor
        .execute("s1", "echo", &json!({"text": "hello"}))
        .await;
    assert!(echoed.success);
    assert_eq!(echoed.payload["echoed"], json!("hello"));

    let result = executor.execute("s1", "nonexistent", &json!({})).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("not found"));
}

struct CountingTool {
    invocations: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "counting".to_string(),
            description: "Counts invocations".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"value": {"type": "integer"}},
                "required": ["value"]
            }),
            examples: None,
        }
    }

    async fn run(&self, _session_id: &str, _arguments: &Value) -> skiff_sandbox::Result<ToolResult> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(ToolResult::ok(Map::new()))
    }
}

/// Invalid arguments short-circuit before the tool body runs.
#[tokio::test]
async fn test_invalid_arguments_skip_tool_body() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(Arc::new(CountingTool {
            invocations: invocations.clone(),
        }))
        .await;
    let executor = ToolExecutor::new(registry);

    let missing = executor.execute("s1", "counting", &json!({})).await;
    assert!(!missing.success);
    assert!(missing.error.unwrap().contains("value"));

    let wrong_type = executor
        .execute("s1", "counting", &json!({"value": "three"}))
        .await;
    assert!(!wrong_type.success);

    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    let valid = executor.execute("s1", "counting", &json!({"value": 3})).await;
    assert!(valid.success);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "failing".to_string(),
            description: "Always fails".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
            examples: None,
        }
    }

    async fn run(&self, _session_id: &str, _arguments: &Value) -> skiff_sandbox::Result<ToolResult> {
        Err(SandboxError::Internal("tool body exploded".to_string()))
    }
}

/// A tool body error is captured as a failed result with a non-empty
/// description, never propagated.
#[tokio::test]
async fn test_tool_body_error_is_captured() {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(FailingTool)).await;
    let executor = ToolExecutor::new(registry);

    let result = executor.execute("s1", "failing", &json!({})).await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(!error.is_empty());
    assert!(error.contains("tool body exploded"));
}

#[tokio::test]
async fn test_execute_code_returns_stdout() {
    let executor = executor_with_sandbox().await;

    let result = executor
        .execute("s1", "execute_code", &json!({"code": "print(1+1)"}))
        .await;
    assert!(result.success);
    assert_eq!(result.payload["stdout"], json!("2\n"));
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_execute_code_surfaces_user_error_as_failed_result() {
    let executor = executor_with_sandbox().await;

    let result = executor
        .execute("s1", "execute_code", &json!({"code": "print(x)"}))
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("NameError"));
}

#[tokio::test]
async fn test_file_operations_dispatch() {
    let executor = executor_with_sandbox().await;

    let read = executor
        .execute(
            "s1",
            "file_operations",
            &json!({"operation": "read", "path": "/data/points.csv"}),
        )
        .await;
    assert!(read.success);
    assert_eq!(read.payload["content"], json!("x,y\n1,2\n"));

    let list = executor
        .execute(
            "s1",
            "file_operations",
            &json!({"operation": "list", "path": "/data"}),
        )
        .await;
    assert!(list.success);
    assert_eq!(list.payload["files"], json!(["points.csv"]));

    let write_without_content = executor
        .execute(
            "s1",
            "file_operations",
            &json!({"operation": "write", "path": "/data/out.txt"}),
        )
        .await;
    assert!(!write_without_content.success);
    assert!(write_without_content
        .error
        .unwrap()
        .contains("Content required"));
}

#[tokio::test]
async fn test_file_operations_invalid_operation_rejected_by_schema() {
    let executor = executor_with_sandbox().await;

    let result = executor
        .execute(
            "s1",
            "file_operations",
            &json!({"operation": "delete", "path": "/data"}),
        )
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("operation"));
}

#[tokio::test]
async fn test_missing_file_read_is_failed_result() {
    let executor = executor_with_sandbox().await;

    let result = executor
        .execute(
            "s1",
            "file_operations",
            &json!({"operation": "read", "path": "/missing.csv"}),
        )
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("No such file"));
}

#[tokio::test]
async fn test_web_search_returns_canned_result() {
    let executor = executor_with_sandbox().await;

    let result = executor
        .execute("s1", "web_search", &json!({"query": "rust sandboxes"}))
        .await;
    assert!(result.success);
    assert_eq!(result.payload["query"], json!("rust sandboxes"));
    assert!(result.payload["results"].as_array().unwrap().len() == 1);
}

#[tokio::test]
async fn test_analyze_data_runs_synthesized_code() {
    let executor = executor_with_sandbox().await;

    let result = executor
        .execute(
            "s1",
            "analyze_data",
            &json!({"file_path": "/data/points.csv", "analysis_type": "summary"}),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.payload["analysis_type"], json!("summary"));
    assert!(result.payload["output"]
        .as_str()
        .unwrap()
        .contains("Shape"));
}

#[tokio::test]
async fn test_schemas_list_all_builtins() {
    let executor = executor_with_sandbox().await;

    let mut names: Vec<String> = executor
        .schemas()
        .await
        .into_iter()
        .map(|d| d.name)
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["analyze_data", "execute_code", "file_operations", "web_search"]
    );
}
