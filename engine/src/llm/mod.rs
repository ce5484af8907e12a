//! LLM Backend Abstraction Layer
//!
//! This module defines the conversation message type and the `ChatProvider`
//! trait that every generation backend implements. The chat client and the
//! agent depend only on the trait, so a fake backend can be substituted in
//! tests and an alternative API can be wired in without touching the agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod client;
pub mod openai;

pub use client::{ChatClient, ChatError};
pub use openai::OpenAIProvider;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur during a generation exchange.
///
/// The agent treats all variants identically (abort the turn, roll back
/// memory); they are distinguished for logging.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender (system, user, assistant)
    pub role: Role,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Serialize to the stored JSON form (`{"role": "...", "content": "..."}`).
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    /// Deserialize from the stored JSON form.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,

    /// User message
    User,

    /// Assistant message
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Generation backend trait.
///
/// One call performs exactly one request/response exchange. Implementations
/// must be safe for concurrent use by independent conversations.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Returns the name of the provider (for logging).
    fn name(&self) -> &str;

    /// Request one completion for the given ordered conversation history.
    ///
    /// Returns the assistant content. A well-formed response with missing or
    /// empty content yields `Ok("")` — the chat client decides how to record
    /// it; only transport and API failures are errors.
    async fn complete(&self, messages: &[Message], temperature: f32) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.content, "Hello");

        let assistant_msg = Message::assistant("Hi there");
        assert_eq!(assistant_msg.role, Role::Assistant);
        assert_eq!(assistant_msg.content, "Hi there");

        let system_msg = Message::system("You are a helpful assistant");
        assert_eq!(system_msg.role, Role::System);
    }

    #[test]
    fn test_message_json_round_trip() {
        let msg = Message::user("test");
        let json = msg.to_json();
        let deserialized = Message::from_json(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::system("s");
        let json = msg.to_json();
        assert!(json.contains(r#""role":"system"#));

        let msg = Message::assistant("a");
        assert!(msg.to_json().contains(r#""role":"assistant"#));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
