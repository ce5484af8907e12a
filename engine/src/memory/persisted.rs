//! Persisted sliding-window memory.
//!
//! Stores the conversation as an ordered list of JSON-serialized messages in
//! the backing store, keyed by conversation identifier, so history survives
//! process restarts. Every mutation is written through immediately — no
//! write buffering. Window enforcement and rollback rebuild the stored list,
//! an accepted O(W) cost since evictions are infrequent relative to reads.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Memory, MemoryError, Result, DEFAULT_WINDOW_SIZE};
use crate::llm::{Message, Role};
use crate::storage::{ListStore, StorageError};

const KEY_PREFIX: &str = "chat:memory:";

impl From<StorageError> for MemoryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => MemoryError::StorageUnavailable(msg),
        }
    }
}

/// Window-buffered conversation log persisted in a backing list store.
pub struct PersistedWindowBufferMemory<S> {
    store: S,
    key: String,
    window_size: usize,
}

impl<S: ListStore> PersistedWindowBufferMemory<S> {
    /// Create a persisted history for `conversation_id` with the default
    /// window size.
    pub fn new(store: S, conversation_id: &str) -> Self {
        Self::with_window_size(store, conversation_id, DEFAULT_WINDOW_SIZE)
    }

    /// Create a persisted history retaining at most `window_size` non-system
    /// messages.
    pub fn with_window_size(store: S, conversation_id: &str, window_size: usize) -> Self {
        Self {
            store,
            key: format!("{KEY_PREFIX}{conversation_id}"),
            window_size,
        }
    }

    /// The backing-store key holding this conversation.
    pub fn key(&self) -> &str {
        &self.key
    }

    async fn read_all(&self) -> Result<Vec<Message>> {
        let raw = self.store.lrange_all(&self.key).await?;
        let mut messages = Vec::with_capacity(raw.len());
        for entry in &raw {
            match Message::from_json(entry) {
                Ok(msg) => messages.push(msg),
                // A corrupt entry is dropped rather than poisoning the
                // whole conversation.
                Err(e) => warn!(key = %self.key, "Skipping undecodable stored message: {}", e),
            }
        }
        Ok(messages)
    }

    /// Delete the stored list and write `messages` back in order.
    async fn rewrite(&self, messages: &[Message]) -> Result<()> {
        self.store.delete(&self.key).await?;
        for msg in messages {
            self.store.rpush(&self.key, &msg.to_json()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: ListStore> Memory for PersistedWindowBufferMemory<S> {
    async fn add(&mut self, message: Message) -> Result<()> {
        if message.role == Role::System {
            // Replace the single system slot: rebuild with the new system
            // message first, then the surviving non-system messages.
            let mut messages: Vec<Message> = self
                .read_all()
                .await?
                .into_iter()
                .filter(|m| m.role != Role::System)
                .collect();
            messages.insert(0, message);
            return self.rewrite(&messages).await;
        }

        self.store.rpush(&self.key, &message.to_json()).await?;

        let all = self.read_all().await?;
        let non_system = all.iter().filter(|m| m.role != Role::System).count();
        if non_system <= self.window_size {
            return Ok(());
        }

        debug!(
            key = %self.key,
            non_system,
            window = self.window_size,
            "Window exceeded, pruning oldest messages"
        );

        let system: Vec<Message> = all
            .iter()
            .filter(|m| m.role == Role::System)
            .cloned()
            .collect();
        let recent: Vec<Message> = all
            .iter()
            .filter(|m| m.role != Role::System)
            .skip(non_system - self.window_size)
            .cloned()
            .collect();

        let mut preserved = system;
        preserved.extend(recent);
        self.rewrite(&preserved).await
    }

    async fn all(&self) -> Result<Vec<Message>> {
        self.read_all().await
    }

    async fn clear(&mut self, system_prompt: Option<Message>) -> Result<()> {
        self.store.delete(&self.key).await?;
        if let Some(system) = system_prompt.filter(|m| m.role == Role::System) {
            self.store.rpush(&self.key, &system.to_json()).await?;
        }
        Ok(())
    }

    async fn remove_last(&mut self) -> Result<()> {
        let messages = self.read_all().await?;
        match messages.last() {
            Some(last) if last.role != Role::System => {
                self.rewrite(&messages[..messages.len() - 1]).await
            }
            _ => Ok(()),
        }
    }
}
