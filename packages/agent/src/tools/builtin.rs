// ABOUTME: Built-in tool implementations: code execution, file operations, search, data analysis
// ABOUTME: Each wraps sandbox backend operations routed through the unified manager

use super::{Tool, ToolDefinition, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use skiff_sandbox::{Result as SandboxResult, UnifiedSandboxManager};
use std::sync::Arc;

fn artifacts_value(artifacts: &[skiff_sandbox::ExecutionArtifact]) -> Value {
    json!(artifacts
        .iter()
        .map(|a| json!({"type": a.content_type, "data": a.data}))
        .collect::<Vec<_>>())
}

/// Execute code in the session's sandbox.
pub struct CodeExecutionTool {
    sandboxes: Arc<UnifiedSandboxManager>,
}

impl CodeExecutionTool {
    pub fn new(sandboxes: Arc<UnifiedSandboxManager>) -> Self {
        Self { sandboxes }
    }
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "execute_code".to_string(),
            description: "Execute Python code in a secure sandbox. Returns stdout, stderr, \
                          and any generated artifacts."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Python code to execute"
                    }
                },
                "required": ["code"]
            }),
            examples: None,
        }
    }

    async fn run(&self, session_id: &str, arguments: &Value) -> SandboxResult<ToolResult> {
        let code = arguments["code"].as_str().unwrap_or_default();
        let output = self.sandboxes.execute(session_id, code).await?;

        let mut payload = Map::new();
        payload.insert("stdout".to_string(), json!(output.stdout));
        payload.insert("stderr".to_string(), json!(output.stderr));
        payload.insert("artifacts".to_string(), artifacts_value(&output.artifacts));

        Ok(ToolResult {
            success: output.succeeded(),
            payload,
            error: output.error,
        })
    }
}

/// Read, write, or list files in the session's sandbox.
pub struct FileOperationsTool {
    sandboxes: Arc<UnifiedSandboxManager>,
}

impl FileOperationsTool {
    pub fn new(sandboxes: Arc<UnifiedSandboxManager>) -> Self {
        Self { sandboxes }
    }
}

#[async_trait]
impl Tool for FileOperationsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "file_operations".to_string(),
            description: "Read, write, or list files in the sandbox filesystem".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": ["read", "write", "list"],
                        "description": "File operation to perform"
                    },
                    "path": {
                        "type": "string",
                        "description": "File or directory path"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to write (for write operation)"
                    }
                },
                "required": ["operation", "path"]
            }),
            examples: None,
        }
    }

    async fn run(&self, session_id: &str, arguments: &Value) -> SandboxResult<ToolResult> {
        let operation = arguments["operation"].as_str().unwrap_or_default();
        let path = arguments["path"].as_str().unwrap_or_default();

        match operation {
            "read" => {
                let data = self.sandboxes.read_file(session_id, path).await?;
                let mut payload = Map::new();
                payload.insert(
                    "content".to_string(),
                    json!(String::from_utf8_lossy(&data)),
                );
                payload.insert("path".to_string(), json!(path));
                Ok(ToolResult::ok(payload))
            }
            "write" => {
                let Some(content) = arguments["content"].as_str() else {
                    return Ok(ToolResult::fail("Content required for write"));
                };
                self.sandboxes
                    .write_file(session_id, path, content.as_bytes())
                    .await?;
                let mut payload = Map::new();
                payload.insert("path".to_string(), json!(path));
                payload.insert(
                    "message".to_string(),
                    json!(format!("File written to {}", path)),
                );
                Ok(ToolResult::ok(payload))
            }
            "list" => {
                let files = self.sandboxes.list_files(session_id, path).await?;
                let mut payload = Map::new();
                payload.insert("files".to_string(), json!(files));
                payload.insert("directory".to_string(), json!(path));
                Ok(ToolResult::ok(payload))
            }
            other => Ok(ToolResult::fail(format!("Unknown operation: {}", other))),
        }
    }
}

/// Web search stub. Always returns a canned structured result.
pub struct WebSearchTool;

impl WebSearchTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".to_string(),
            description: "Search the web for information".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    }
                },
                "required": ["query"]
            }),
            examples: None,
        }
    }

    async fn run(&self, _session_id: &str, arguments: &Value) -> SandboxResult<ToolResult> {
        let query = arguments["query"].as_str().unwrap_or_default();

        let mut payload = Map::new();
        payload.insert(
            "results".to_string(),
            json!([{
                "title": format!("Search result for: {}", query),
                "snippet": "This is a placeholder. Integrate with a real search API.",
                "url": "https://example.com"
            }]),
        );
        payload.insert("query".to_string(), json!(query));
        Ok(ToolResult::ok(payload))
    }
}

/// Analyze tabular data by synthesizing pandas code and executing it in
/// the session's sandbox. The captured stdout is the analysis report.
pub struct DataAnalysisTool {
    sandboxes: Arc<UnifiedSandboxManager>,
}

impl DataAnalysisTool {
    pub fn new(sandboxes: Arc<UnifiedSandboxManager>) -> Self {
        Self { sandboxes }
    }

    fn analysis_code(analysis_type: &str, file_path: &str) -> Option<String> {
        match analysis_type {
            "summary" => Some(format!(
                r#"
import pandas as pd
df = pd.read_csv('{file_path}')
print("Shape:", df.shape)
print("\nColumn Types:")
print(df.dtypes)
print("\nSummary Statistics:")
print(df.describe())
print("\nMissing Values:")
print(df.isnull().sum())
"#
            )),
            "visualize" => Some(format!(
                r#"
import pandas as pd
import matplotlib.pyplot as plt
df = pd.read_csv('{file_path}')
df.hist(figsize=(12, 8), bins=20)
plt.tight_layout()
plt.savefig('/tmp/visualization.png')
print("Visualization saved to /tmp/visualization.png")
"#
            )),
            "correlate" => Some(format!(
                r#"
import pandas as pd
df = pd.read_csv('{file_path}')
numeric = df.select_dtypes(include='number')
print("Correlation Matrix:")
print(numeric.corr())
"#
            )),
            _ => None,
        }
    }
}

#[async_trait]
impl Tool for DataAnalysisTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "analyze_data".to_string(),
            description: "Analyze CSV data with pandas - get summary statistics, correlations, \
                          visualizations"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Path to CSV file"
                    },
                    "analysis_type": {
                        "type": "string",
                        "enum": ["summary", "visualize", "correlate"],
                        "description": "Type of analysis to perform"
                    }
                },
                "required": ["file_path"]
            }),
            examples: None,
        }
    }

    async fn run(&self, session_id: &str, arguments: &Value) -> SandboxResult<ToolResult> {
        let file_path = arguments["file_path"].as_str().unwrap_or_default();
        let analysis_type = arguments["analysis_type"].as_str().unwrap_or("summary");

        let Some(code) = Self::analysis_code(analysis_type, file_path) else {
            return Ok(ToolResult::fail(format!(
                "Unknown analysis type: {}",
                analysis_type
            )));
        };

        let output = self.sandboxes.execute(session_id, &code).await?;

        let mut payload = Map::new();
        payload.insert("analysis_type".to_string(), json!(analysis_type));
        payload.insert("output".to_string(), json!(output.stdout));
        payload.insert("artifacts".to_string(), artifacts_value(&output.artifacts));

        Ok(ToolResult {
            success: output.succeeded(),
            payload,
            error: output.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_templates_cover_all_declared_types() {
        for analysis_type in ["summary", "visualize", "correlate"] {
            let code = DataAnalysisTool::analysis_code(analysis_type, "/data/points.csv")
                .expect("template missing");
            assert!(code.contains("/data/points.csv"));
            assert!(code.contains("import pandas"));
        }
        assert!(DataAnalysisTool::analysis_code("cluster", "/data/x.csv").is_none());
    }
}
