//! Webhook server.
//!
//! Axum server receiving Telegram updates at POST /telegram/webhook and a
//! GET /ping liveness probe. The webhook endpoint always answers 200:
//! Telegram retries non-2xx deliveries, and redelivering a malformed or
//! failed update would not help.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{error, info, warn};

use crate::bot::{BotContext, TelegramApi, Update};
use crate::config::Config;
use crate::llm::OpenAIProvider;
use crate::storage::{ListStore, MemoryStore, RedisStore};

/// Shared server state.
pub struct AppState<S> {
    pub bot: BotContext<S>,
    pub api: TelegramApi,
}

/// Build the router over any backing store.
pub fn router<S: ListStore + Clone + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/telegram/webhook", post(telegram_webhook::<S>))
        .with_state(state)
}

/// Run the webhook server until shutdown.
///
/// Connects to the configured backing store, registers the webhook with
/// Telegram, then serves until SIGINT.
pub async fn run(config: Config, bind_override: Option<String>) -> anyhow::Result<()> {
    if config.memory.backend == "memory" {
        warn!("Using process-local memory; conversation history is lost on restart");
        return serve(config, bind_override, MemoryStore::new()).await;
    }

    let store = RedisStore::connect(&config.redis.url).await?;
    info!(url = %config.redis.url, "Connected to Redis");
    serve(config, bind_override, store).await
}

async fn serve<S: ListStore + Clone + 'static>(
    config: Config,
    bind_override: Option<String>,
    store: S,
) -> anyhow::Result<()> {
    let api = TelegramApi::new(config.telegram.bot_token.clone());
    let provider = Arc::new(OpenAIProvider::new(config.llm.clone()));
    let bot = BotContext::new(
        provider,
        store,
        config.telegram.authorized_username.clone(),
        config.llm.temperature,
        config.memory.window_size,
    );
    let state = Arc::new(AppState {
        bot,
        api: api.clone(),
    });

    api.set_webhook(&config.telegram.webhook_url).await?;
    info!(url = %config.telegram.webhook_url, "Webhook registered");

    let addr = bind_override.unwrap_or(config.telegram.bind_addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Webhook server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Webhook server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

async fn ping() -> &'static str {
    "pong"
}

/// Receive one Telegram update.
///
/// The body is parsed by hand rather than through the JSON extractor so a
/// malformed payload is logged and dropped instead of rejected with a 4xx.
async fn telegram_webhook<S: ListStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: String,
) -> StatusCode {
    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Dropping malformed update: {}", e);
            return StatusCode::OK;
        }
    };

    if let Some(reply) = state.bot.handle_update(update).await {
        if let Err(e) = state.api.send_message(reply.chat_id, &reply.text).await {
            error!(chat_id = reply.chat_id, "Failed to send reply: {}", e);
        }
    }

    StatusCode::OK
}
