// ABOUTME: Tool interface and result types for agent tool invocation
// ABOUTME: Tools wrap sandbox operations behind declared JSON-schema contracts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use skiff_sandbox::Result as SandboxResult;

pub mod builtin;
pub mod executor;
pub mod registry;

pub use builtin::{CodeExecutionTool, DataAnalysisTool, FileOperationsTool, WebSearchTool};
pub use executor::ToolExecutor;
pub use registry::ToolRegistry;

/// Tool contract advertised to the model for function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema-shaped parameter spec
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,
}

/// Structured outcome of a tool invocation. The payload carries
/// human-readable output fields (stdout/stderr-style text or a
/// domain-specific shape) plus optional artifact references.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub success: bool,
    pub payload: Map<String, Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(payload: Map<String, Value>) -> Self {
        Self {
            success: true,
            payload,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: Map::new(),
            error: Some(error.into()),
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("success".to_string(), json!(self.success));
        for (key, value) in &self.payload {
            map.insert(key.clone(), value.clone());
        }
        if let Some(error) = &self.error {
            map.insert("error".to_string(), json!(error));
        }
        Value::Object(map)
    }
}

/// An invocable tool. Bodies may call into the bound sandbox backend; any
/// error they return is converted by the executor into a failed result.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn run(&self, session_id: &str, arguments: &Value) -> SandboxResult<ToolResult>;
}
