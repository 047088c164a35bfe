// ABOUTME: Memory store and conversation history package for Skiff
// ABOUTME: Provides key/value storage with disk snapshots and bounded per-session message history

pub mod conversation;
pub mod store;

pub use conversation::{ConversationManager, ConversationMessage, MessageRole};
pub use store::{MemoryError, MemoryStore};
