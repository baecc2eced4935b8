use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A recoverable error recorded on the errors channel.
///
/// Fatal failures abort the invocation through `Result`; everything the loop
/// can survive (unknown tool names, argument validation failures) lands here
/// instead, so the conversation keeps a durable record of what went wrong.
///
/// # Examples
///
/// ```
/// use ledgerweave::channels::errors::ErrorEvent;
/// use serde_json::json;
///
/// let event = ErrorEvent::tool("save_spending", "call_1", "missing required argument: amount")
///     .with_context(json!({"arguments": {}}));
/// assert_eq!(event.message, "missing required argument: amount");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    pub message: String,
    #[serde(default)]
    pub context: Value,
}

impl ErrorEvent {
    /// Error attributed to a node execution at a given step.
    pub fn node<K: Into<String>, M: Into<String>>(kind: K, step: u64, message: M) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Node {
                kind: kind.into(),
                step,
            },
            message: message.into(),
            context: Value::Null,
        }
    }

    /// Error attributed to the runner loop for a session.
    pub fn runner<S: Into<String>, M: Into<String>>(session: S, step: u64, message: M) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Runner {
                session: session.into(),
                step,
            },
            message: message.into(),
            context: Value::Null,
        }
    }

    /// Error attributed to a single tool-call request.
    pub fn tool<N: Into<String>, C: Into<String>, M: Into<String>>(
        name: N,
        call_id: C,
        message: M,
    ) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Tool {
                name: name.into(),
                call_id: call_id.into(),
            },
            message: message.into(),
            context: Value::Null,
        }
    }

    /// Attach structured context to this event.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

/// Where in the system an [`ErrorEvent`] originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    Node {
        kind: String,
        step: u64,
    },
    Runner {
        session: String,
        step: u64,
    },
    Tool {
        name: String,
        call_id: String,
    },
    #[default]
    App,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_serializes_as_tagged_union() {
        let event = ErrorEvent::tool("log_expense", "call_3", "handler failed");
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["scope"]["scope"], "tool");
        assert_eq!(value["scope"]["name"], "log_expense");
        assert_eq!(value["scope"]["call_id"], "call_3");
    }

    #[test]
    fn roundtrip_preserves_context() {
        let event = ErrorEvent::node("agent", 2, "model unavailable")
            .with_context(json!({"provider": "scripted"}));
        let json = serde_json::to_string(&event).expect("serialize");
        let parsed: ErrorEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, parsed);
    }
}
