//! Chat client.
//!
//! Wraps a single conversational exchange: append the user turn to memory,
//! call the backend once, append the assistant turn — or roll the user turn
//! back so a failed exchange leaves memory exactly as it was. Retries, if
//! any, are a caller policy.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{ChatProvider, LlmError, Message};
use crate::memory::{Memory, MemoryError};

/// Errors crossing the chat client boundary.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// One conversation against one backend, with memory kept consistent with
/// what was actually sent and received.
pub struct ChatClient {
    provider: Arc<dyn ChatProvider>,
    memory: Box<dyn Memory>,
    system_prompt: Message,
    temperature: f32,
}

impl ChatClient {
    /// Create a client and seed the system prompt into memory.
    pub async fn new(
        provider: Arc<dyn ChatProvider>,
        mut memory: Box<dyn Memory>,
        system_prompt: &str,
        temperature: f32,
    ) -> Result<Self, ChatError> {
        let system_prompt = Message::system(system_prompt);
        memory.add(system_prompt.clone()).await?;
        Ok(Self {
            provider,
            memory,
            system_prompt,
            temperature,
        })
    }

    /// Send one user message and return the assistant's reply.
    ///
    /// On backend failure the just-added user turn is removed again, so
    /// later turns are not polluted by an orphaned user message with no
    /// matching reply.
    pub async fn chat(&mut self, user_text: &str) -> Result<String, ChatError> {
        self.memory.add(Message::user(user_text)).await?;

        let messages = match self.memory.all().await {
            Ok(messages) => messages,
            Err(e) => {
                self.rollback_user_turn().await;
                return Err(e.into());
            }
        };

        debug!(
            provider = self.provider.name(),
            context_len = messages.len(),
            "Requesting completion"
        );

        match self.provider.complete(&messages, self.temperature).await {
            Ok(content) => {
                if content.is_empty() {
                    // Keep turn parity even for a malformed upstream
                    // response: record an empty assistant turn.
                    warn!("Received response with missing message content");
                }
                self.memory.add(Message::assistant(content.clone())).await?;
                Ok(content)
            }
            Err(e) => {
                self.rollback_user_turn().await;
                Err(e.into())
            }
        }
    }

    /// Discard the conversation, retaining the system prompt.
    pub async fn clear_history(&mut self) -> Result<(), ChatError> {
        self.memory
            .clear(Some(self.system_prompt.clone()))
            .await
            .map_err(Into::into)
    }

    /// The current ordered message history.
    pub async fn history(&self) -> Result<Vec<Message>, ChatError> {
        self.memory.all().await.map_err(Into::into)
    }

    async fn rollback_user_turn(&mut self) {
        if let Err(e) = self.memory.remove_last().await {
            // The turn already failed; a failing rollback means the store
            // is down and the orphaned turn is the lesser problem.
            warn!("Failed to roll back user turn: {}", e);
        }
    }
}
