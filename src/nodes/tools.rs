use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::channels::errors::ErrorEvent;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::tools::{ToolError, ToolRegistry};

/// The tool-execution node.
///
/// Reads the tool-call requests off the last assistant message and runs each
/// through the registry, in request order. Every request gets exactly one
/// correlated tool-result message: the tool's text on success, an error
/// description when the request was unknown or failed validation. Handler,
/// model, and store failures abort the invocation instead.
pub struct ToolsNode {
    registry: Arc<ToolRegistry>,
}

impl ToolsNode {
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Node for ToolsNode {
    #[instrument(skip(self, snapshot, ctx), fields(node = %ctx.node_id, step = ctx.step))]
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        let Some(last) = snapshot.last_message() else {
            return Err(NodeError::MissingInput {
                what: "conversation messages",
            });
        };
        if !last.requests_tools() {
            return Err(NodeError::MissingInput {
                what: "assistant tool-call requests",
            });
        }

        let mut messages = Vec::with_capacity(last.tool_calls.len());
        let mut expenses = Vec::new();
        let mut spending_limits = Vec::new();
        let mut spending_categories = Vec::new();
        let mut alerts = Vec::new();
        let mut errors = Vec::new();

        for request in &last.tool_calls {
            ctx.emit("tools", &format!("dispatching '{}'", request.name));
            match self.registry.dispatch(request).await {
                Ok(output) => {
                    messages.push(Message::tool(&request.id, &output.text));
                    expenses.extend(output.expenses);
                    spending_limits.extend(output.spending_limits);
                    spending_categories.extend(output.spending_categories);
                    alerts.extend(output.alerts);
                }
                Err(err) if err.is_recoverable() => {
                    messages.push(Message::tool(&request.id, &format!("Error: {err}")));
                    errors.push(ErrorEvent::tool(
                        &request.name,
                        &request.id,
                        &err.to_string(),
                    ));
                }
                Err(ToolError::Model(source)) => return Err(NodeError::Model(source)),
                Err(err) => {
                    return Err(NodeError::Tool {
                        name: request.name.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let mut partial = NodePartial::new().with_messages(messages);
        if !expenses.is_empty() {
            partial = partial.with_expenses(expenses);
        }
        if !spending_limits.is_empty() {
            partial = partial.with_spending_limits(spending_limits);
        }
        if !spending_categories.is_empty() {
            partial = partial.with_spending_categories(spending_categories);
        }
        if !alerts.is_empty() {
            partial = partial.with_alerts(alerts);
        }
        if !errors.is_empty() {
            partial = partial.with_errors(errors);
        }
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::message::ToolCallRequest;
    use crate::state::AgentState;
    use crate::store::InMemoryExpenseStore;
    use crate::tools::finance::finance_tools;
    use serde_json::json;

    fn ctx() -> NodeContext {
        NodeContext {
            node_id: "tools".to_string(),
            step: 2,
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let store = Arc::new(InMemoryExpenseStore::new());
        let model = Arc::new(ScriptedModel::new(vec![Message::assistant("food")]));
        Arc::new(finance_tools(store, model))
    }

    fn state_with_calls(calls: Vec<ToolCallRequest>) -> AgentState {
        AgentState::builder()
            .with_user_message("spent $40, limit $500")
            .with_message(Message::assistant_with_tool_calls("", calls))
            .build()
    }

    #[tokio::test]
    async fn one_result_message_per_request_in_order() {
        let node = ToolsNode::new(registry());
        let state = state_with_calls(vec![
            ToolCallRequest::new("c1", "save_spending", json!({"amount": 40.0})),
            ToolCallRequest::new("c2", "set_spending_limit", json!({"limit": 500.0})),
        ]);

        let partial = node.run(state.snapshot(), ctx()).await.expect("run");
        let messages = partial.messages.expect("messages delta");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[0].content, "Successfully saved your spending of $40.");
        assert_eq!(messages[1].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(messages[1].content, "Successfully set a spending limit of $500.");
        assert_eq!(partial.expenses.map(|e| e.len()), Some(1));
        assert_eq!(partial.spending_limits.map(|l| l.len()), Some(1));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_result_message_and_error_event() {
        let node = ToolsNode::new(registry());
        let state = state_with_calls(vec![ToolCallRequest::new(
            "c1",
            "transfer_funds",
            json!({}),
        )]);

        let partial = node.run(state.snapshot(), ctx()).await.expect("run");
        let messages = partial.messages.expect("messages delta");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("Error: unknown tool"));
        assert_eq!(partial.errors.map(|e| e.len()), Some(1));
    }

    #[tokio::test]
    async fn validation_failure_keeps_the_loop_alive() {
        let node = ToolsNode::new(registry());
        let state = state_with_calls(vec![ToolCallRequest::new(
            "c1",
            "save_spending",
            json!({"amount": "forty"}),
        )]);

        let partial = node.run(state.snapshot(), ctx()).await.expect("run");
        let messages = partial.messages.expect("messages delta");
        assert!(messages[0].content.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn last_message_without_tool_calls_is_fatal() {
        let node = ToolsNode::new(registry());
        let state = AgentState::builder()
            .with_user_message("hi")
            .with_assistant_message("FINAL ANSWER: hello")
            .build();
        let err = node.run(state.snapshot(), ctx()).await.expect_err("fatal");
        assert!(matches!(err, NodeError::MissingInput { .. }));
    }

    #[tokio::test]
    async fn model_failure_inside_tool_aborts() {
        // LogExpense needs a model response; an empty script makes it fail.
        let store = Arc::new(InMemoryExpenseStore::new());
        let model = Arc::new(ScriptedModel::new(vec![]));
        let node = ToolsNode::new(Arc::new(finance_tools(store, model)));
        let state = state_with_calls(vec![ToolCallRequest::new(
            "c1",
            "log_expense",
            json!({"amount": 12.0}),
        )]);

        let err = node.run(state.snapshot(), ctx()).await.expect_err("fatal");
        assert!(matches!(err, NodeError::Model(_)));
    }
}
