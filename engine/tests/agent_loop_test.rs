//! End-to-end agent loop tests against a mocked chat completions API.
//!
//! These drive the real HTTP provider, chat client, memory, and tool
//! dispatch together; no live API is required.

use std::sync::Arc;

use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use burrow_engine::agent::Agent;
use burrow_engine::config::LlmConfig;
use burrow_engine::llm::{ChatError, LlmError, OpenAIProvider, Role};
use burrow_engine::memory::WindowBufferMemory;
use burrow_engine::tools::ToolRegistry;

fn provider_for(server: &MockServer) -> Arc<OpenAIProvider> {
    Arc::new(OpenAIProvider::new(LlmConfig {
        base_url: server.uri(),
        model: "test-model".to_string(),
        api_key: "sk-test".to_string(),
        temperature: 0.1,
    }))
}

async fn agent_for(server: &MockServer) -> Agent {
    Agent::new(
        provider_for(server),
        Box::new(WindowBufferMemory::with_window_size(20)),
        ToolRegistry::with_builtins(),
        0.1,
    )
    .await
    .expect("agent construction against in-process memory cannot fail")
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn test_plain_reply_passthrough() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("Hi! How can I help?"))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = agent_for(&server).await;
    let reply = agent.process("Hello").await.unwrap();
    assert_eq!(reply, "Hi! How can I help?");
}

#[tokio::test]
async fn test_tool_round_trip_over_http() {
    let server = MockServer::start().await;

    // First completion asks for the calculator; the follow-up answers.
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion(
            "```tool\n{\"name\": \"calculator\", \"parameters\": {\"expression\": \"6 * 7\"}}\n```",
        ))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("Six times seven is 42."))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = agent_for(&server).await;
    let reply = agent.process("What is 6 * 7?").await.unwrap();
    assert_eq!(reply, "Six times seven is 42.");

    // History holds both generations plus the synthetic tool-result turn.
    let history = agent.history().await.unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert!(contents.contains(&"Tool 'calculator' returned: 42"));
    assert_eq!(history.last().unwrap().content, "Six times seven is 42.");
}

#[tokio::test]
async fn test_rate_limit_rolls_back_memory() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = agent_for(&server).await;
    let before = agent.history().await.unwrap();

    let err = agent.process("Hello").await.unwrap_err();
    assert!(matches!(err, ChatError::Llm(LlmError::RateLimited)));

    // The failed user turn must not linger in memory.
    assert_eq!(agent.history().await.unwrap(), before);
}

#[tokio::test]
async fn test_server_error_surfaces_as_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut agent = agent_for(&server).await;
    let err = agent.process("Hello").await.unwrap_err();
    match err {
        ChatError::Llm(LlmError::Api(msg)) => assert!(msg.contains("500")),
        other => panic!("Expected Api error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_content_yields_empty_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut agent = agent_for(&server).await;
    let reply = agent.process("Hello").await.unwrap();
    assert_eq!(reply, "");

    // Turn parity is preserved with an empty assistant message.
    let history = agent.history().await.unwrap();
    assert_eq!(history.last().unwrap().role, Role::Assistant);
    assert_eq!(history.last().unwrap().content, "");
}
