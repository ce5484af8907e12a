//! Agent orchestration.
//!
//! The agent owns one chat client and a tool registry and runs the
//! tool-use loop: generate, look for a fenced tool-call block, execute at
//! most one tool, feed the result back for a final generation. Tool
//! faults are turned into result strings the model can react to; only
//! backend and storage failures cross the boundary to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm::{ChatClient, ChatError, ChatProvider, Message};
use crate::memory::Memory;
use crate::tools::{ToolCall, ToolRegistry};

const BASE_SYSTEM_PROMPT: &str = r#"You are Burrow, an AI assistant capable of using tools to answer questions and fulfill requests.

**Tool Usage Guidelines:**
1.  **Assess Necessity:** Evaluate the request. Only use a tool if the request requires external information (e.g., current time, calculations, specific data lookup) that you cannot provide from your internal knowledge or if it requires performing an action.
2.  **Identify Tool:** Choose the most appropriate tool from the list provided below.
3.  **Strict Format:** To call a tool, you MUST respond *only* with a single JSON object enclosed in a markdown code block tagged with `tool`. The JSON structure must be exactly:
    ```tool
    {
      "name": "tool_name",
      "parameters": {
        "param_name_1": "value1",
        "param_name_2": "value2"
      }
    }
    ```
    - Replace `tool_name` with the exact name of the tool you intend to use.
    - Fill the `parameters` object with the specific arguments required by that tool, ensuring the values are of the correct type. Ensure the JSON is valid.
    - **Crucial:** Your response must contain *only* this ` ```tool ... ``` ` block when you decide to use a tool. Do not include any introductory text, explanations, or conversational filler before or after the block.
4.  **Await Result:** After you send the tool call in the correct format, the system will execute the tool and provide you with its output in the next turn. The message will look like: "Tool '[tool_name]' returned: [result]".
5.  **Formulate Final Answer:** Use the information from the tool's result to formulate your final response. Address the original query directly, incorporating the tool's output naturally into your answer. Do not simply repeat the tool output; synthesize it into a helpful response.

If you can answer the request directly without needing a tool, do so.

**Available Tools:**
The following tools are available for you to use:"#;

/// Build the full system prompt from the base instructions and the
/// registry's tool descriptors.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let mut prompt = String::from(BASE_SYSTEM_PROMPT);

    for tool in tools.iter() {
        prompt.push_str(&format!("\n- {}: {}", tool.name(), tool.description()));
        if !tool.parameters().is_empty() {
            prompt.push_str("\n  Parameters:");
            for param in tool.parameters() {
                prompt.push_str(&format!("\n  - {}: {}", param.name, param.description));
            }
        }
    }

    if tools.is_empty() {
        prompt.push_str("\nNo tools are currently available.");
        warn!("No tools available for the agent");
    }

    prompt
}

/// Conversational agent with a bounded tool-use loop.
pub struct Agent {
    client: ChatClient,
    tools: ToolRegistry,
    tool_block: Regex,
}

impl Agent {
    /// Create an agent over the given backend, memory, and tools.
    ///
    /// The system prompt is derived from the registry and seeded into
    /// memory before the first turn.
    pub async fn new(
        provider: Arc<dyn ChatProvider>,
        memory: Box<dyn Memory>,
        tools: ToolRegistry,
        temperature: f32,
    ) -> Result<Self, ChatError> {
        info!(tool_count = tools.len(), "Initializing agent");
        let system_prompt = build_system_prompt(&tools);
        let client = ChatClient::new(provider, memory, &system_prompt, temperature).await?;
        Ok(Self {
            client,
            tools,
            tool_block: Regex::new(r"(?s)```tool\s*\n(.*?)\n```").expect("Invalid tool block pattern"),
        })
    }

    /// Process one user message, running at most one tool round-trip, and
    /// return the final reply text.
    pub async fn process(&mut self, user_message: &str) -> Result<String, ChatError> {
        debug!("Processing user message");
        let response = self.client.chat(user_message).await?;

        let Some(tool_call) = self.parse_tool_call(&response) else {
            debug!("No tool call detected, returning response as is");
            return Ok(response);
        };

        let tool_result = self.execute_tool(&tool_call);

        // The second generation's output is returned as-is even if it
        // contains another tool-call block: one round-trip per message.
        let result_message = format!("Tool '{}' returned: {}", tool_call.name, tool_result);
        debug!(result = %result_message, "Sending tool result back");
        self.client.chat(&result_message).await
    }

    /// Extract a tool call from generated text.
    ///
    /// Anything short of a well-formed block — no fence, invalid JSON, a
    /// missing or non-string `name` — means the text is a plain reply.
    pub fn parse_tool_call(&self, text: &str) -> Option<ToolCall> {
        let captures = self.tool_block.captures(text)?;
        let body = captures.get(1)?.as_str();

        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to parse tool JSON: {}", e);
                return None;
            }
        };

        let name = value.get("name")?.as_str()?.to_string();
        let mut parameters = BTreeMap::new();
        if let Some(params) = value.get("parameters").and_then(Value::as_object) {
            for (key, val) in params {
                parameters.insert(key.clone(), stringify_argument(val));
            }
        }

        info!(tool = %name, "Tool call detected");
        Some(ToolCall { name, parameters })
    }

    /// Dispatch a parsed tool call.
    ///
    /// Unknown names and tool faults come back as error strings, never as
    /// errors: the model gets a chance to explain or recover.
    pub fn execute_tool(&self, tool_call: &ToolCall) -> String {
        info!(tool = %tool_call.name, params = ?tool_call.parameters, "Executing tool");

        let Some(tool) = self.tools.get(&tool_call.name) else {
            let error_msg = format!("Error: Tool '{}' not found.", tool_call.name);
            warn!("{}", error_msg);
            return error_msg;
        };

        match tool.execute(&tool_call.parameters) {
            Ok(result) => {
                debug!(result = %result, "Tool execution succeeded");
                result
            }
            Err(e) => {
                let error_msg = format!("Error executing tool '{}': {}", tool_call.name, e);
                warn!("{}", error_msg);
                error_msg
            }
        }
    }

    /// Discard conversation history, keeping the system prompt.
    pub async fn reset(&mut self) -> Result<(), ChatError> {
        self.client.clear_history().await
    }

    /// The current ordered message history.
    pub async fn history(&self) -> Result<Vec<Message>, ChatError> {
        self.client.history().await
    }
}

/// Render a JSON argument value as the string a tool receives.
fn stringify_argument(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
