//! In-process sliding-window memory.
//!
//! Backing store is the process's own memory; contents are lost on restart.
//! The system prompt lives in a dedicated slot so it is never subject to
//! window eviction and at most one can exist.

use async_trait::async_trait;
use std::collections::VecDeque;

use super::{Memory, Result, DEFAULT_WINDOW_SIZE};
use crate::llm::{Message, Role};

/// Window-buffered conversation log held in process memory.
#[derive(Debug, Clone)]
pub struct WindowBufferMemory {
    window_size: usize,
    messages: VecDeque<Message>,
    system_message: Option<Message>,
}

impl WindowBufferMemory {
    /// Create an empty history with the default window size.
    pub fn new() -> Self {
        Self::with_window_size(DEFAULT_WINDOW_SIZE)
    }

    /// Create an empty history retaining at most `window_size` non-system
    /// messages.
    pub fn with_window_size(window_size: usize) -> Self {
        Self {
            window_size,
            messages: VecDeque::new(),
            system_message: None,
        }
    }

    /// Maximum number of retained non-system messages.
    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

impl Default for WindowBufferMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Memory for WindowBufferMemory {
    async fn add(&mut self, message: Message) -> Result<()> {
        if message.role == Role::System {
            // Replace the existing system message or set a new one.
            self.system_message = Some(message);
            return Ok(());
        }

        self.messages.push_back(message);
        while self.messages.len() > self.window_size {
            self.messages.pop_front();
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Message>> {
        let mut all = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system_message {
            all.push(system.clone());
        }
        all.extend(self.messages.iter().cloned());
        Ok(all)
    }

    async fn clear(&mut self, system_prompt: Option<Message>) -> Result<()> {
        self.messages.clear();
        self.system_message = system_prompt.filter(|m| m.role == Role::System);
        Ok(())
    }

    async fn remove_last(&mut self) -> Result<()> {
        self.messages.pop_back();
        Ok(())
    }
}
