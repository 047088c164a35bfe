// ABOUTME: Model client speaking the Anthropic messages API with tool use
// ABOUTME: Handles request assembly from conversation history, SSE streaming, and usage tracking

use crate::tools::ToolDefinition;
use futures::stream::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skiff_memory::{ConversationMessage, MessageRole};
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No API key configured")]
    NoApiKey,
}

impl LlmError {
    /// Network failures and overload/server statuses are worth retrying;
    /// everything else is terminal for the request.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type LlmResult<T> = Result<T, LlmError>;

/// Tool invocation requested by the model, correlated by its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<RequestBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ResponseBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Unknown,
}

/// Client for chat completions against the model provider.
pub struct LlmClient {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    fn create_client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default()
    }

    /// API key from `ANTHROPIC_API_KEY`, model overridable with
    /// `ANTHROPIC_MODEL`.
    pub fn new() -> Self {
        let api_key = env::var("ANTHROPIC_API_KEY").ok();
        if api_key.is_none() {
            info!("ANTHROPIC_API_KEY not set - model calls will fail until a key is provided");
        }

        let model = env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        if model != DEFAULT_MODEL {
            info!("Using custom model: {}", model);
        }

        Self {
            client: Self::create_client(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key,
            model,
        }
    }

    pub fn with_api_key(api_key: String) -> Self {
        let model = env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            client: Self::create_client(),
            api_url: DEFAULT_API_URL.to_string(),
            api_key: Some(api_key),
            model,
        }
    }

    /// Point the client at a different endpoint. Used by tests and
    /// self-hosted gateways.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One chat completion over the full message sequence. Returns the
    /// assistant text, any requested tool calls, and usage if reported.
    pub async fn chat(
        &self,
        messages: &[ConversationMessage],
        model: &str,
        temperature: f32,
        max_tokens: Option<u32>,
        tools: &[ToolDefinition],
    ) -> LlmResult<ChatResponse> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::NoApiKey)?;

        let request = ApiRequest {
            model: model.to_string(),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature,
            system: extract_system(messages),
            messages: convert_messages(messages),
            tools: convert_tools(tools),
            stream: None,
        };

        info!(
            "Chat completion: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            tools.len()
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Model API error: {} - {}", status, body);
            return Err(LlmError::Api { status, body });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in api_response.content {
            match block {
                ResponseBlock::Text { text } => content.push_str(&text),
                ResponseBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest {
                        id,
                        name,
                        arguments: input,
                    });
                }
                ResponseBlock::Unknown => {}
            }
        }

        if !tool_calls.is_empty() {
            info!("Model requested {} tool calls", tool_calls.len());
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            usage: api_response.usage,
        })
    }

    /// Streaming completion yielding text chunks as they arrive. The
    /// stream is finite and not restartable.
    pub async fn stream(
        &self,
        messages: &[ConversationMessage],
        model: &str,
        temperature: f32,
    ) -> LlmResult<impl Stream<Item = LlmResult<String>>> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::NoApiKey)?;

        let request = ApiRequest {
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature,
            system: extract_system(messages),
            messages: convert_messages(messages),
            tools: None,
            stream: Some(true),
        };

        info!("Streaming completion: model={}", request.model);

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Model API error: {} - {}", status, body);
            return Err(LlmError::Api { status, body });
        }

        let stream = async_stream::stream! {
            use futures::StreamExt;
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        // Process complete SSE events
                        while let Some(event_end) = buffer.find("\n\n") {
                            let event = buffer[..event_end].to_string();
                            buffer = buffer[event_end + 2..].to_string();

                            for line in event.lines() {
                                if let Some(data) = line.strip_prefix("data: ") {
                                    if let Ok(event_json) = serde_json::from_str::<Value>(data) {
                                        if event_json["type"] == "content_block_delta" {
                                            if let Some(text) = event_json["delta"]["text"].as_str() {
                                                yield Ok(text.to_string());
                                            }
                                        } else if event_json["type"] == "error" {
                                            let message = event_json["error"]["message"]
                                                .as_str()
                                                .unwrap_or("Unknown streaming error");
                                            yield Err(LlmError::Api { status: 0, body: message.to_string() });
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(LlmError::RequestFailed(e));
                        return;
                    }
                }
            }
        };

        Ok(stream)
    }
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A leading system message becomes the request's top-level system field.
fn extract_system(messages: &[ConversationMessage]) -> Option<String> {
    messages
        .first()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.clone())
}

/// Convert conversation history to wire messages. Assistant tool calls are
/// replayed as tool_use blocks; tool-role messages become tool_result
/// blocks, with consecutive results merged into one user message.
fn convert_messages(messages: &[ConversationMessage]) -> Vec<ApiMessage> {
    let mut converted: Vec<ApiMessage> = Vec::new();

    for message in messages {
        match message.role {
            MessageRole::System => continue,
            MessageRole::User => converted.push(ApiMessage {
                role: "user",
                content: vec![RequestBlock::Text {
                    text: message.content.clone(),
                }],
            }),
            MessageRole::Assistant => {
                let mut content = Vec::new();
                if !message.content.is_empty() {
                    content.push(RequestBlock::Text {
                        text: message.content.clone(),
                    });
                }
                for call in tool_calls_from_metadata(message) {
                    content.push(RequestBlock::ToolUse {
                        id: call.id,
                        name: call.name,
                        input: call.arguments,
                    });
                }
                if content.is_empty() {
                    content.push(RequestBlock::Text {
                        text: String::new(),
                    });
                }
                converted.push(ApiMessage {
                    role: "assistant",
                    content,
                });
            }
            MessageRole::Tool => {
                let block = RequestBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content.clone(),
                };
                match converted.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && matches!(
                                last.content.first(),
                                Some(RequestBlock::ToolResult { .. })
                            ) =>
                    {
                        last.content.push(block);
                    }
                    _ => converted.push(ApiMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
        }
    }

    converted
}

fn tool_calls_from_metadata(message: &ConversationMessage) -> Vec<ToolCallRequest> {
    message
        .metadata
        .as_ref()
        .and_then(|m| m.get("tool_calls"))
        .and_then(|calls| serde_json::from_value(calls.clone()).ok())
        .unwrap_or_default()
}

fn convert_tools(tools: &[ToolDefinition]) -> Option<Vec<ApiTool>> {
    if tools.is_empty() {
        return None;
    }
    Some(
        tools
            .iter()
            .map(|t| ApiTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_message_becomes_system_field() {
        let messages = vec![
            ConversationMessage::new(MessageRole::System, "be terse"),
            ConversationMessage::new(MessageRole::User, "hi"),
        ];
        assert_eq!(extract_system(&messages).as_deref(), Some("be terse"));

        let converted = convert_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
    }

    #[test]
    fn test_assistant_tool_calls_replayed_as_tool_use() {
        let assistant = ConversationMessage::new(MessageRole::Assistant, "running it")
            .with_metadata(json!({
                "tool_calls": [{"id": "toolu_1", "name": "execute_code", "arguments": {"code": "print(1)"}}]
            }));
        let converted = convert_messages(&[assistant]);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].content.len(), 2);
        assert!(matches!(
            converted[0].content[1],
            RequestBlock::ToolUse { .. }
        ));
    }

    #[test]
    fn test_consecutive_tool_results_merge_into_one_message() {
        let messages = vec![
            ConversationMessage::new(MessageRole::Tool, "{\"success\":true}")
                .with_tool_call_id("toolu_1"),
            ConversationMessage::new(MessageRole::Tool, "{\"success\":false}")
                .with_tool_call_id("toolu_2"),
        ];
        let converted = convert_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[0].content.len(), 2);
    }

    #[test]
    fn test_transient_error_classification() {
        assert!(LlmError::Api {
            status: 529,
            body: "overloaded".into()
        }
        .is_transient());
        assert!(LlmError::Api {
            status: 429,
            body: "rate limited".into()
        }
        .is_transient());
        assert!(!LlmError::Api {
            status: 400,
            body: "bad request".into()
        }
        .is_transient());
        assert!(!LlmError::NoApiKey.is_transient());
    }
}
