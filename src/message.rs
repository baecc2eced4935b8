use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool invocation requested by the model.
///
/// Carried on an assistant [`Message`]; the tool execution node resolves each
/// request against the registry and appends one correlated tool-result
/// message per request, in request order.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation id echoed back on the matching tool-result message.
    pub id: String,
    /// Name of a registered tool.
    pub name: String,
    /// Raw argument payload; validated against the tool's schema before the
    /// handler ever sees it.
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Creates a new tool-call request.
    #[must_use]
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }
}

/// A message in the conversation: a role, text content, and (for assistant
/// messages) zero or more tool-call requests.
///
/// Messages are immutable once created; the conversation is an ordered,
/// append-only sequence managed by the messages channel.
///
/// # Examples
///
/// ```
/// use ledgerweave::message::Message;
///
/// let user_msg = Message::user("I spent $100 on food");
/// let assistant_msg = Message::assistant("Recorded it for you.");
/// let tool_msg = Message::tool("call_1", "Successfully saved your spending of $100.");
///
/// assert!(user_msg.has_role(Message::USER));
/// assert!(!assistant_msg.requests_tools());
/// assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender. Use the constants on [`Message`]
    /// for standardized values.
    pub role: String,
    /// The text content of the message.
    pub content: String,
    /// Tool-call requests carried by an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// For tool-result messages, the id of the originating request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool-result message role.
    pub const TOOL: &'static str = "tool";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with no tool-call requests.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates an assistant message carrying tool-call requests.
    #[must_use]
    pub fn assistant_with_tool_calls(content: &str, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Self::ASSISTANT.to_string(),
            content: content.to_string(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Creates a tool-result message correlated to the originating request.
    #[must_use]
    pub fn tool(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Self::TOOL.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Returns true if this is an assistant message carrying at least one
    /// tool-call request. This predicate alone drives routing.
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        self.role == Self::ASSISTANT && !self.tool_calls.is_empty()
    }
}
