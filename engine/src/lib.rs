//! Burrow Engine Library
//!
//! Core functionality of the Burrow conversational assistant.
//! Used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// LLM provider abstraction layer
pub mod llm;

/// Conversation memory module
pub mod memory;

/// Backing-store abstraction for persisted memory
pub mod storage;

/// Callable tools
pub mod tools;

/// Agent orchestration module
pub mod agent;

/// Telegram bot module
pub mod bot;

/// Webhook server module
pub mod server;

/// Telemetry and Observability
pub mod telemetry;
