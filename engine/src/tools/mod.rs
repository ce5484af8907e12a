//! Callable tools.
//!
//! A tool is a named, described, parameterized unit of deterministic
//! computation the agent can invoke by name with string-typed arguments.
//! Parameter descriptors are declared statically per tool — they feed the
//! system prompt and documentation, not runtime validation.

use std::collections::BTreeMap;

pub mod calculator;
pub mod clock;

pub use calculator::CalculatorTool;
pub use clock::ClockTool;

/// Error raised by a tool's `execute`.
///
/// The message is human-readable: the agent feeds it back to the model as
/// the tool result, it is never shown raw to the end user and never aborts
/// the conversation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ToolError(pub String);

impl ToolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Statically declared descriptor for one tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolParameter {
    /// Parameter name as it appears in the tool-call block.
    pub name: &'static str,

    /// Declared value type (informational).
    pub kind: &'static str,

    /// Human-readable description for the system prompt.
    pub description: &'static str,
}

/// A tool invocation parsed from generated text.
///
/// Ephemeral: consumed once by execution, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
}

/// Contract every callable tool implements.
pub trait Tool: Send + Sync {
    /// Unique, stable identifier used for dispatch.
    fn name(&self) -> &str;

    /// Description used for system-prompt construction.
    fn description(&self) -> &str;

    /// Declared parameters, in declaration order.
    fn parameters(&self) -> &[ToolParameter];

    /// Run the tool with named string arguments.
    fn execute(&self, args: &BTreeMap<String, String>) -> Result<String, ToolError>;
}

/// Registry of available tools, keyed by tool name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CalculatorTool));
        registry.register(Box::new(ClockTool));
        registry
    }

    /// Register a tool under its own name, replacing any previous tool with
    /// the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    /// Iterate over the registered tools in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.values().map(Box::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("calculator").is_some());
        assert!(registry.get("get_current_time").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CalculatorTool));
        registry.register(Box::new(CalculatorTool));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_descriptors_are_introspectable_without_executing() {
        let registry = ToolRegistry::with_builtins();
        let calc = registry.get("calculator").unwrap();
        assert_eq!(calc.description(), "Evaluates mathematical expressions. Use this for calculations.");
        assert_eq!(calc.parameters().len(), 1);
        assert_eq!(calc.parameters()[0].name, "expression");
        assert_eq!(calc.parameters()[0].kind, "string");
    }
}
