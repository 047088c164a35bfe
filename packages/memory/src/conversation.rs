// ABOUTME: Bounded per-session conversation history built on the memory store
// ABOUTME: Keeps the most recent N messages while pinning a leading system message

use crate::store::MemoryStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    fn label(&self) -> &'static str {
        match self {
            MessageRole::System => "System",
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
            MessageRole::Tool => "Tool",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Correlates a tool-role message to the assistant tool call it answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
            tool_call_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }
}

/// Manages conversation history and context per session.
pub struct ConversationManager {
    memory: Arc<MemoryStore>,
    max_history: usize,
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    pub message_count: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub duration_seconds: Option<i64>,
    pub first_message_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl ConversationManager {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self::with_max_history(memory, DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(memory: Arc<MemoryStore>, max_history: usize) -> Self {
        Self {
            memory,
            max_history,
        }
    }

    /// Messages for a session, capped at the configured maximum. A pinned
    /// leading system message does not count against the cap.
    pub async fn get_messages(&self, session_id: &str) -> Vec<ConversationMessage> {
        let history = self.load(session_id).await;
        trim_history(history, self.max_history)
    }

    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        metadata: Option<Value>,
    ) {
        let mut message = ConversationMessage::new(role, content);
        message.metadata = metadata;

        let mut history = self.load(session_id).await;
        history.push(message);
        let history = trim_history(history, self.max_history);

        self.save(session_id, &history).await;
    }

    pub async fn clear_session(&self, session_id: &str) {
        debug!("Clearing conversation for session {}", session_id);
        self.memory.delete(&conversation_key(session_id)).await;
    }

    /// Render the last `window` messages as role-labeled text. Bodies are
    /// truncated to a fixed character budget; this is a display aid, not
    /// model input.
    pub async fn get_context(&self, session_id: &str, window: usize) -> String {
        const BODY_BUDGET: usize = 200;

        let messages = self.get_messages(session_id).await;
        let start = messages.len().saturating_sub(window);

        messages[start..]
            .iter()
            .map(|m| {
                let body: String = m.content.chars().take(BODY_BUDGET).collect();
                format!("{}: {}", m.role.label(), body)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn summary(&self, session_id: &str) -> ConversationSummary {
        let messages = self.get_messages(session_id).await;

        let duration_seconds = match (messages.first(), messages.last()) {
            (Some(first), Some(last)) => {
                Some((last.timestamp - first.timestamp).num_seconds())
            }
            _ => None,
        };

        ConversationSummary {
            message_count: messages.len(),
            user_messages: messages
                .iter()
                .filter(|m| m.role == MessageRole::User)
                .count(),
            assistant_messages: messages
                .iter()
                .filter(|m| m.role == MessageRole::Assistant)
                .count(),
            duration_seconds,
            first_message_at: messages.first().map(|m| m.timestamp),
            last_message_at: messages.last().map(|m| m.timestamp),
        }
    }

    async fn load(&self, session_id: &str) -> Vec<ConversationMessage> {
        match self.memory.get(&conversation_key(session_id)).await {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn save(&self, session_id: &str, history: &[ConversationMessage]) {
        match serde_json::to_value(history) {
            Ok(value) => self.memory.set(&conversation_key(session_id), value).await,
            Err(e) => debug!("Failed to encode history for {}: {}", session_id, e),
        }
    }
}

fn conversation_key(session_id: &str) -> String {
    format!("conversation:{}", session_id)
}

/// Keep the most recent `max` messages in original order, preserving a
/// leading system message at position 0 when present.
fn trim_history(history: Vec<ConversationMessage>, max: usize) -> Vec<ConversationMessage> {
    let has_pinned_system = history
        .first()
        .map(|m| m.role == MessageRole::System)
        .unwrap_or(false);

    if has_pinned_system {
        let mut rest = history;
        let system = rest.remove(0);
        let start = rest.len().saturating_sub(max);
        let mut trimmed = Vec::with_capacity(rest.len() - start + 1);
        trimmed.push(system);
        trimmed.extend(rest.into_iter().skip(start));
        trimmed
    } else {
        let start = history.len().saturating_sub(max);
        history.into_iter().skip(start).collect()
    }
}
