//! Update handlers.
//!
//! Routes incoming updates to commands or the agent, producing the reply
//! to deliver. Turns for the same chat are serialized with a per-chat
//! lock so concurrent webhook deliveries cannot interleave one
//! conversation's generate-and-store sequence.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::{Incoming, Update, User};
use crate::agent::Agent;
use crate::llm::ChatProvider;
use crate::memory::{Memory, PersistedWindowBufferMemory};
use crate::storage::ListStore;
use crate::tools::ToolRegistry;

const UNAUTHORIZED_REPLY: &str = "You are not authorized to use this bot.";
const FAILURE_REPLY: &str =
    "Oopsie! It seems you broke something with your request :(. Please try again later!";

/// A reply ready to be delivered back to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: i64,
    pub text: String,
}

/// Shared handler state: backend, store, and authorization policy.
pub struct BotContext<S> {
    provider: Arc<dyn ChatProvider>,
    store: S,
    authorized_username: Option<String>,
    temperature: f32,
    window_size: usize,
    chat_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl<S: ListStore + Clone + 'static> BotContext<S> {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        store: S,
        authorized_username: Option<String>,
        temperature: f32,
        window_size: usize,
    ) -> Self {
        Self {
            provider,
            store,
            authorized_username,
            temperature,
            window_size,
            chat_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one update, returning the reply to send (if any).
    ///
    /// Updates without a text message are ignored.
    pub async fn handle_update(&self, update: Update) -> Option<Reply> {
        let message = update.message?;
        let chat_id = message.chat.id;
        let text = message.text.clone()?;

        if !self.is_authorized(message.from.as_ref()) {
            warn!(chat_id, "Unauthorized user attempted to use the bot");
            return Some(Reply {
                chat_id,
                text: UNAUTHORIZED_REPLY.to_string(),
            });
        }

        info!(chat_id, "Received message");

        let reply_text = if text.starts_with('/') {
            self.handle_command(&message, &text).await
        } else {
            self.handle_conversation(chat_id, &text).await
        };

        Some(Reply {
            chat_id,
            text: reply_text,
        })
    }

    fn is_authorized(&self, from: Option<&User>) -> bool {
        match &self.authorized_username {
            // No username configured means the bot is open.
            None => true,
            Some(expected) => {
                from.and_then(|u| u.username.as_deref()) == Some(expected.as_str())
            }
        }
    }

    async fn handle_command(&self, message: &Incoming, text: &str) -> String {
        match text.split_whitespace().next().unwrap_or("") {
            "/start" => {
                "Beep bop. Burrow's awake! Ready to organize, assist, and maybe drop a joke or two."
                    .to_string()
            }
            "/help" => "Available commands:\n\
                 /start   - Wake the bot up\n\
                 /amnesia - Forget this conversation\n\
                 /help    - Show this help\n\n\
                 Send any text to chat."
                .to_string(),
            "/amnesia" => self.handle_amnesia(message.chat.id).await,
            other => format!("Unknown command: {}", other),
        }
    }

    /// Drop the chat's persisted history.
    async fn handle_amnesia(&self, chat_id: i64) -> String {
        // Wait out any in-flight turn; a concurrent wipe could interleave
        // with that turn's rewrite and resurrect the cleared history.
        let lock = self.chat_lock(chat_id).await;
        let _guard = lock.lock().await;

        let mut memory = PersistedWindowBufferMemory::with_window_size(
            self.store.clone(),
            &chat_id.to_string(),
            self.window_size,
        );
        match memory.clear(None).await {
            Ok(()) => "Zzzzzap! All gone. I feel... strangely empty.".to_string(),
            Err(e) => {
                error!(chat_id, "Failed to clear conversation memory: {}", e);
                FAILURE_REPLY.to_string()
            }
        }
    }

    /// Run one agent turn against the chat's persisted history.
    async fn handle_conversation(&self, chat_id: i64, text: &str) -> String {
        // Serialize turns per chat; different chats proceed concurrently.
        let lock = self.chat_lock(chat_id).await;
        let _guard = lock.lock().await;

        let memory = PersistedWindowBufferMemory::with_window_size(
            self.store.clone(),
            &chat_id.to_string(),
            self.window_size,
        );

        let agent = Agent::new(
            Arc::clone(&self.provider),
            Box::new(memory),
            ToolRegistry::with_builtins(),
            self.temperature,
        )
        .await;

        let mut agent = match agent {
            Ok(agent) => agent,
            Err(e) => {
                error!(chat_id, "Failed to initialize agent: {}", e);
                return FAILURE_REPLY.to_string();
            }
        };

        match agent.process(text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(chat_id, "Failed to process message: {}", e);
                FAILURE_REPLY.to_string()
            }
        }
    }

    async fn chat_lock(&self, chat_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().await;
        // Drop locks no turn is holding so the map tracks active chats only.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(chat_id).or_default())
    }

    #[cfg(test)]
    async fn tracked_chats(&self) -> usize {
        self.chat_locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::Chat;
    use crate::llm::{LlmError, Message};
    use crate::storage::{MemoryStore, Result as StorageResult, StorageError};
    use async_trait::async_trait;

    /// Store where every operation fails.
    #[derive(Clone)]
    struct DownStore;

    #[async_trait]
    impl ListStore for DownStore {
        async fn set(&self, _: &str, _: &str, _: Option<u64>) -> StorageResult<()> {
            Err(StorageError::Unavailable("down".to_string()))
        }
        async fn get(&self, _: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable("down".to_string()))
        }
        async fn delete(&self, _: &str) -> StorageResult<bool> {
            Err(StorageError::Unavailable("down".to_string()))
        }
        async fn exists(&self, _: &str) -> StorageResult<bool> {
            Err(StorageError::Unavailable("down".to_string()))
        }
        async fn rpush(&self, _: &str, _: &str) -> StorageResult<usize> {
            Err(StorageError::Unavailable("down".to_string()))
        }
        async fn lrange_all(&self, _: &str) -> StorageResult<Vec<String>> {
            Err(StorageError::Unavailable("down".to_string()))
        }
        async fn llen(&self, _: &str) -> StorageResult<usize> {
            Err(StorageError::Unavailable("down".to_string()))
        }
    }

    struct FixedProvider {
        reply: String,
    }

    #[async_trait]
    impl ChatProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _: &[Message], _: f32) -> Result<String, LlmError> {
            Ok(self.reply.clone())
        }
    }

    /// Provider that parks in `complete` until released.
    struct GatedProvider {
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl ChatProvider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        async fn complete(&self, _: &[Message], _: f32) -> Result<String, LlmError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok("finally".to_string())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ChatProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _: &[Message], _: f32) -> Result<String, LlmError> {
            Err(LlmError::RateLimited)
        }
    }

    fn context(
        provider: Arc<dyn ChatProvider>,
        authorized: Option<&str>,
    ) -> BotContext<MemoryStore> {
        BotContext::new(
            provider,
            MemoryStore::default(),
            authorized.map(str::to_string),
            0.1,
            10,
        )
    }

    fn update(chat_id: i64, username: Option<&str>, text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(Incoming {
                chat: Chat { id: chat_id },
                text: Some(text.to_string()),
                from: username.map(|name| User {
                    id: 7,
                    username: Some(name.to_string()),
                }),
            }),
        }
    }

    #[tokio::test]
    async fn test_plain_message_gets_agent_reply() {
        let provider = Arc::new(FixedProvider {
            reply: "Hello there!".to_string(),
        });
        let ctx = context(provider, None);

        let reply = ctx.handle_update(update(10, Some("bob"), "hi")).await.unwrap();
        assert_eq!(reply.chat_id, 10);
        assert_eq!(reply.text, "Hello there!");
    }

    #[tokio::test]
    async fn test_unauthorized_username_rejected() {
        let provider = Arc::new(FixedProvider {
            reply: "nope".to_string(),
        });
        let ctx = context(provider, Some("alice"));

        let reply = ctx.handle_update(update(10, Some("bob"), "hi")).await.unwrap();
        assert_eq!(reply.text, UNAUTHORIZED_REPLY);

        // Missing user info is also rejected when a username is required.
        let ctx2 = context(
            Arc::new(FixedProvider {
                reply: "nope".to_string(),
            }),
            Some("alice"),
        );
        let reply = ctx2.handle_update(update(10, None, "hi")).await.unwrap();
        assert_eq!(reply.text, UNAUTHORIZED_REPLY);
    }

    #[tokio::test]
    async fn test_authorized_username_accepted() {
        let provider = Arc::new(FixedProvider {
            reply: "welcome".to_string(),
        });
        let ctx = context(provider, Some("alice"));

        let reply = ctx
            .handle_update(update(10, Some("alice"), "hi"))
            .await
            .unwrap();
        assert_eq!(reply.text, "welcome");
    }

    #[tokio::test]
    async fn test_start_and_help_commands() {
        let provider = Arc::new(FixedProvider {
            reply: "unused".to_string(),
        });
        let ctx = context(provider, None);

        let reply = ctx
            .handle_update(update(10, Some("bob"), "/start"))
            .await
            .unwrap();
        assert!(reply.text.contains("Burrow's awake"));

        let reply = ctx
            .handle_update(update(10, Some("bob"), "/help"))
            .await
            .unwrap();
        assert!(reply.text.contains("/amnesia"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let provider = Arc::new(FixedProvider {
            reply: "unused".to_string(),
        });
        let ctx = context(provider, None);

        let reply = ctx
            .handle_update(update(10, Some("bob"), "/dance"))
            .await
            .unwrap();
        assert_eq!(reply.text, "Unknown command: /dance");
    }

    #[tokio::test]
    async fn test_amnesia_clears_persisted_history() {
        let provider = Arc::new(FixedProvider {
            reply: "remembered".to_string(),
        });
        let store = MemoryStore::default();
        let ctx = BotContext::new(provider, store.clone(), None, 0.1, 10);

        ctx.handle_update(update(10, Some("bob"), "remember me"))
            .await
            .unwrap();
        assert!(store.exists("chat:memory:10").await.unwrap());

        let reply = ctx
            .handle_update(update(10, Some("bob"), "/amnesia"))
            .await
            .unwrap();
        assert!(reply.text.contains("Zzzzzap"));
        assert!(!store.exists("chat:memory:10").await.unwrap());
    }

    #[tokio::test]
    async fn test_amnesia_waits_for_in_flight_turn() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let provider = Arc::new(GatedProvider {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        });
        let store = MemoryStore::default();
        let ctx = Arc::new(BotContext::new(provider, store.clone(), None, 0.1, 10));

        let turn = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_update(update(10, Some("bob"), "remember me")).await }
        });
        entered.notified().await;

        // The turn holds the chat lock, so the wipe must not run yet.
        let mut amnesia = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { ctx.handle_update(update(10, Some("bob"), "/amnesia")).await }
        });
        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(50), &mut amnesia).await;
        assert!(blocked.is_err());

        release.notify_one();
        turn.await.unwrap().unwrap();
        let reply = amnesia.await.unwrap().unwrap();
        assert!(reply.text.contains("Zzzzzap"));

        // The finished turn's messages must not outlive the wipe.
        assert!(!store.exists("chat:memory:10").await.unwrap());
    }

    #[tokio::test]
    async fn test_idle_chat_locks_are_pruned() {
        let provider = Arc::new(FixedProvider {
            reply: "ok".to_string(),
        });
        let ctx = context(provider, None);

        for chat_id in 0..20 {
            ctx.handle_update(update(chat_id, Some("bob"), "hi"))
                .await
                .unwrap();
        }

        // Sequential turns leave every lock idle; each acquisition clears
        // the idle ones out, so only the latest chat remains tracked.
        assert_eq!(ctx.tracked_chats().await, 1);
    }

    #[tokio::test]
    async fn test_chats_use_separate_keys() {
        let provider = Arc::new(FixedProvider {
            reply: "ok".to_string(),
        });
        let store = MemoryStore::default();
        let ctx = BotContext::new(provider, store.clone(), None, 0.1, 10);

        ctx.handle_update(update(1, Some("bob"), "one")).await.unwrap();
        ctx.handle_update(update(2, Some("bob"), "two")).await.unwrap();

        assert!(store.exists("chat:memory:1").await.unwrap());
        assert!(store.exists("chat:memory:2").await.unwrap());
    }

    #[tokio::test]
    async fn test_backend_failure_yields_apology() {
        let ctx = context(Arc::new(FailingProvider), None);
        let reply = ctx.handle_update(update(10, Some("bob"), "hi")).await.unwrap();
        assert_eq!(reply.text, FAILURE_REPLY);
    }

    #[tokio::test]
    async fn test_storage_failure_yields_apology() {
        let provider = Arc::new(FixedProvider {
            reply: "unused".to_string(),
        });
        let ctx = BotContext::new(provider, DownStore, None, 0.1, 10);
        let reply = ctx.handle_update(update(10, Some("bob"), "hi")).await.unwrap();
        assert_eq!(reply.text, FAILURE_REPLY);
    }

    #[tokio::test]
    async fn test_non_text_update_ignored() {
        let provider = Arc::new(FixedProvider {
            reply: "unused".to_string(),
        });
        let ctx = context(provider, None);

        let no_message = Update {
            update_id: 1,
            message: None,
        };
        assert!(ctx.handle_update(no_message).await.is_none());

        let no_text = Update {
            update_id: 2,
            message: Some(Incoming {
                chat: Chat { id: 5 },
                text: None,
                from: None,
            }),
        };
        assert!(ctx.handle_update(no_text).await.is_none());
    }
}
