// ABOUTME: Conversational agent driving the bounded model/tool-invocation loop
// ABOUTME: Persists only the user message and final assistant message per turn

use crate::llm::{ChatResponse, LlmClient, LlmError, ToolCallRequest, Usage, DEFAULT_MODEL};
use crate::retry::RetryPolicy;
use crate::tools::ToolExecutor;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use skiff_memory::{ConversationManager, ConversationMessage, MessageRole};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    #[error("Turn timed out after {0} seconds")]
    Timeout(u64),
}

impl AgentError {
    fn is_transient(&self) -> bool {
        match self {
            AgentError::Llm(e) => e.is_transient(),
            AgentError::Timeout(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub tools_enabled: bool,
    pub max_iterations: u32,
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: None,
            system_prompt: None,
            tools_enabled: true,
            max_iterations: 10,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub iterations: u32,
    pub usage: Option<Usage>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// AI agent with conversation management and tool execution.
pub struct Agent {
    config: AgentConfig,
    llm: Arc<LlmClient>,
    tools: Option<Arc<ToolExecutor>>,
    conversation: Arc<ConversationManager>,
    retry: RetryPolicy,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        llm: Arc<LlmClient>,
        tools: Option<Arc<ToolExecutor>>,
        conversation: Arc<ConversationManager>,
    ) -> Self {
        info!("Initialized agent: {}", config.name);
        Self {
            config,
            llm,
            tools,
            conversation,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run one conversation turn. Transient model errors are retried with
    /// backoff; the whole turn is bounded by the configured timeout.
    pub async fn run(&self, session_id: &str, message: &str) -> Result<AgentResponse, AgentError> {
        info!("Processing message for session {}", session_id);

        self.retry
            .run(AgentError::is_transient, || async {
                let turn = self.run_turn(session_id, message);
                match tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), turn)
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::Timeout(self.config.timeout_secs)),
                }
            })
            .await
    }

    async fn run_turn(&self, session_id: &str, message: &str) -> Result<AgentResponse, AgentError> {
        // Working set for this turn; only the user message and the final
        // assistant message are persisted below
        let mut messages = self.conversation.get_messages(session_id).await;

        if messages.is_empty() {
            if let Some(prompt) = &self.config.system_prompt {
                messages.push(ConversationMessage::new(MessageRole::System, prompt.clone()));
            }
        }

        messages.push(ConversationMessage::new(MessageRole::User, message));

        let schemas = match (&self.tools, self.config.tools_enabled) {
            (Some(tools), true) => tools.schemas().await,
            _ => Vec::new(),
        };

        let mut iterations = 0;
        let mut all_tool_calls: Vec<ToolCallRequest> = Vec::new();
        let mut final_response: Option<ChatResponse> = None;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let response = self
                .llm
                .chat(
                    &messages,
                    &self.config.model,
                    self.config.temperature,
                    self.config.max_tokens,
                    &schemas,
                )
                .await?;

            let mut assistant =
                ConversationMessage::new(MessageRole::Assistant, response.content.clone());
            if !response.tool_calls.is_empty() {
                assistant = assistant.with_metadata(json!({"tool_calls": response.tool_calls}));
            }
            messages.push(assistant);

            if response.tool_calls.is_empty() {
                final_response = Some(response);
                break;
            }

            info!("Executing {} tool calls", response.tool_calls.len());

            // Sequential execution in model order; tool calls share one
            // sandbox, so no intra-turn parallelism
            for call in &response.tool_calls {
                let result = match &self.tools {
                    Some(tools) => tools.execute(session_id, &call.name, &call.arguments).await,
                    None => {
                        warn!("Tool call {} requested but no executor configured", call.name);
                        crate::tools::ToolResult::fail(format!("Tool not found: {}", call.name))
                    }
                };

                messages.push(
                    ConversationMessage::new(MessageRole::Tool, result.to_value().to_string())
                        .with_tool_call_id(call.id.clone()),
                );
            }

            all_tool_calls.extend(response.tool_calls.iter().cloned());
            final_response = Some(response);
        }

        let content = final_response
            .as_ref()
            .map(|r| r.content.clone())
            .unwrap_or_default();

        self.conversation
            .add_message(session_id, MessageRole::User, message, None)
            .await;
        self.conversation
            .add_message(session_id, MessageRole::Assistant, content.clone(), None)
            .await;

        Ok(AgentResponse {
            content,
            tool_calls: all_tool_calls,
            iterations,
            usage: final_response.and_then(|r| r.usage),
            timestamp: chrono::Utc::now(),
        })
    }

    /// Stream a response for a message. Tool calls are not available on
    /// this path; the stream is finite and not restartable.
    pub async fn stream(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<impl Stream<Item = Result<String, LlmError>>, AgentError> {
        let mut messages = self.conversation.get_messages(session_id).await;

        if messages.is_empty() {
            if let Some(prompt) = &self.config.system_prompt {
                messages.push(ConversationMessage::new(MessageRole::System, prompt.clone()));
            }
        }

        messages.push(ConversationMessage::new(MessageRole::User, message));

        let stream = self
            .llm
            .stream(&messages, &self.config.model, self.config.temperature)
            .await?;
        Ok(stream)
    }

    /// Clear the session's conversation history.
    pub async fn reset_session(&self, session_id: &str) {
        self.conversation.clear_session(session_id).await;
        info!("Reset session: {}", session_id);
    }
}
