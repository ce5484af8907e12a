//! Conversation Memory
//!
//! The memory owns the ordered conversation log, enforces the retention
//! policy (one system slot, at most `W` non-system messages with FIFO
//! eviction) and supplies the exact message list sent to the generation
//! backend. Variants implement the `Memory` trait; the chat client and the
//! agent never depend on a concrete one.

use async_trait::async_trait;

use crate::llm::Message;

pub mod persisted;
pub mod window;

pub use persisted::PersistedWindowBufferMemory;
pub use window::WindowBufferMemory;

/// Default maximum number of retained non-system messages.
pub const DEFAULT_WINDOW_SIZE: usize = 20;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors that can occur while touching the conversation log.
///
/// A failing backing store is fatal for the current turn: the agent must not
/// silently proceed with empty memory, which would corrupt conversation
/// continuity.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Conversation store unavailable: {0}")]
    StorageUnavailable(String),
}

/// Ordered conversation log with a bounded window.
///
/// Invariants all implementations uphold:
/// - at most one system message is retained; adding another replaces it;
/// - the count of non-system messages never exceeds the window size, the
///   oldest non-system messages being evicted first;
/// - `all()` returns an independent copy, system message first.
///
/// Implementations do not serialize concurrent turns on the same
/// conversation; the calling layer must ensure at most one in-flight turn
/// per conversation.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Insert a message at the end of the non-system sequence, or replace
    /// the system slot if the message has the system role.
    async fn add(&mut self, message: Message) -> Result<()>;

    /// Return the system message (if set) followed by the retained
    /// non-system messages in insertion order.
    async fn all(&self) -> Result<Vec<Message>>;

    /// Discard all non-system messages; set or clear the system slot.
    async fn clear(&mut self, system_prompt: Option<Message>) -> Result<()>;

    /// Delete the most recently added non-system message. No-op when the
    /// history is empty or only the system message remains. Used to roll
    /// back a user turn that failed to produce a response.
    async fn remove_last(&mut self) -> Result<()>;
}
