// ABOUTME: Tool executor resolving, validating, and invoking tools with structured error capture
// ABOUTME: A failing tool never aborts the enclosing conversation turn

use super::builtin::{CodeExecutionTool, DataAnalysisTool, FileOperationsTool, WebSearchTool};
use super::{ToolDefinition, ToolRegistry, ToolResult};
use serde_json::Value;
use skiff_sandbox::UnifiedSandboxManager;
use std::sync::Arc;
use tracing::{error, info};

/// Executes tools by name with argument validation and error capture.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Executor preloaded with the built-in tools, all backed by the
    /// unified sandbox manager.
    pub async fn with_builtins(sandboxes: Arc<UnifiedSandboxManager>) -> Self {
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(Arc::new(CodeExecutionTool::new(sandboxes.clone())))
            .await;
        registry
            .register(Arc::new(FileOperationsTool::new(sandboxes.clone())))
            .await;
        registry.register(Arc::new(WebSearchTool::new())).await;
        registry
            .register(Arc::new(DataAnalysisTool::new(sandboxes)))
            .await;
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a tool. Never returns an error: unknown names, invalid
    /// arguments, and tool-body failures all come back as a failed result
    /// with a non-empty error description.
    pub async fn execute(&self, session_id: &str, tool_name: &str, arguments: &Value) -> ToolResult {
        info!("Executing tool: {}", tool_name);

        let Some(tool) = self.registry.get(tool_name).await else {
            return ToolResult::fail(format!("Tool not found: {}", tool_name));
        };

        if let Err(reason) = validate_arguments(&tool.definition(), arguments) {
            return ToolResult::fail(format!("Invalid arguments for {}: {}", tool_name, reason));
        }

        match tool.run(session_id, arguments).await {
            Ok(result) => {
                info!("Tool {} completed: success={}", tool_name, result.success);
                result
            }
            Err(e) => {
                error!("Tool execution failed: {}", e);
                ToolResult::fail(e.to_string())
            }
        }
    }

    pub async fn schemas(&self) -> Vec<ToolDefinition> {
        self.registry.definitions().await
    }
}

/// Validate arguments against the declared parameter schema: required keys
/// must be present, and declared primitive types and enums must match.
fn validate_arguments(definition: &ToolDefinition, arguments: &Value) -> Result<(), String> {
    let Some(object) = arguments.as_object() else {
        return Err("arguments must be a JSON object".to_string());
    };

    let schema = &definition.parameters;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for name in required.iter().filter_map(|v| v.as_str()) {
            if !object.contains_key(name) {
                return Err(format!("missing required argument '{}'", name));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in object {
            let Some(spec) = properties.get(key) else {
                continue;
            };
            if let Some(expected) = spec.get("type").and_then(|t| t.as_str()) {
                if !type_matches(expected, value) {
                    return Err(format!("argument '{}' must be of type {}", key, expected));
                }
            }
            if let Some(allowed) = spec.get("enum").and_then(|e| e.as_array()) {
                if !allowed.contains(value) {
                    return Err(format!("argument '{}' is not an allowed value", key));
                }
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "sample".to_string(),
            description: "sample tool".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "operation": {"type": "string", "enum": ["read", "write"]},
                    "count": {"type": "integer"}
                },
                "required": ["operation"]
            }),
            examples: None,
        }
    }

    #[test]
    fn test_missing_required_argument() {
        let err = validate_arguments(&definition(), &json!({"count": 1})).unwrap_err();
        assert!(err.contains("operation"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err =
            validate_arguments(&definition(), &json!({"operation": "read", "count": "three"}))
                .unwrap_err();
        assert!(err.contains("count"));
    }

    #[test]
    fn test_enum_violation_rejected() {
        let err = validate_arguments(&definition(), &json!({"operation": "delete"})).unwrap_err();
        assert!(err.contains("operation"));
    }

    #[test]
    fn test_valid_arguments_accepted() {
        assert!(validate_arguments(&definition(), &json!({"operation": "read", "count": 3})).is_ok());
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        assert!(validate_arguments(&definition(), &json!("read")).is_err());
    }

    #[test]
    fn test_undeclared_arguments_pass_through() {
        assert!(
            validate_arguments(&definition(), &json!({"operation": "read", "extra": true})).is_ok()
        );
    }
}
