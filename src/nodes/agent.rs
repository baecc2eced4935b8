use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;

use crate::llm::ChatModel;
use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::tools::ToolRegistry;

/// Sentinel phrase the model is instructed to include when it considers the
/// task complete. Advisory only: routing never inspects message text.
pub const FINAL_ANSWER: &str = "FINAL ANSWER";

/// The model-calling node.
///
/// Prepends a system directive to the conversation, invokes the chat model
/// once, and returns the reply as a single-message delta. Whether that reply
/// carries tool calls is the router's business, not this node's.
pub struct AgentNode {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
}

impl AgentNode {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<ToolRegistry>) -> Self {
        Self { model, registry }
    }

    fn system_directive(&self) -> String {
        let tool_list = self
            .registry
            .names()
            .iter()
            .map(|name| {
                let description = self
                    .registry
                    .get(name)
                    .map(|t| t.description().to_string())
                    .unwrap_or_default();
                format!("- {name}: {description}")
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a personal finance assistant. Help the user track spending, \
             log expenses, manage spending limits, and get financial tips. Use the \
             available tools to read and record data; never invent figures.\n\
             When you have fully answered the user, prefix your reply with \
             '{FINAL_ANSWER}'.\n\
             Available tools:\n{tool_list}\n\
             Current time: {now}",
            now = Utc::now().to_rfc3339()
        )
    }
}

#[async_trait]
impl Node for AgentNode {
    #[instrument(skip(self, snapshot, ctx), fields(node = %ctx.node_id, step = ctx.step))]
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        if snapshot.messages.is_empty() {
            return Err(NodeError::MissingInput {
                what: "conversation messages",
            });
        }

        let mut prompt = Vec::with_capacity(snapshot.messages.len() + 1);
        prompt.push(Message::system(&self.system_directive()));
        prompt.extend(snapshot.messages.iter().cloned());

        ctx.emit("model", "invoking chat model");
        let reply = self.model.invoke(&prompt).await?;
        ctx.emit(
            "model",
            &format!("model replied with {} tool call(s)", reply.tool_calls.len()),
        );

        Ok(NodePartial::new().with_messages(vec![reply]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::message::ToolCallRequest;
    use crate::state::AgentState;
    use serde_json::json;

    fn ctx() -> NodeContext {
        NodeContext {
            node_id: "agent".to_string(),
            step: 1,
        }
    }

    #[tokio::test]
    async fn appends_exactly_one_assistant_message() {
        let model = Arc::new(ScriptedModel::new(vec![Message::assistant_with_tool_calls(
            "",
            vec![ToolCallRequest::new(
                "c1",
                "save_spending",
                json!({"amount": 10.0}),
            )],
        )]));
        let node = AgentNode::new(model, Arc::new(ToolRegistry::new()));

        let state = AgentState::new_with_user_message("I spent $10");
        let partial = node.run(state.snapshot(), ctx()).await.expect("run");

        let messages = partial.messages.expect("messages delta");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].requests_tools());
        assert!(partial.expenses.is_none());
    }

    #[tokio::test]
    async fn empty_conversation_is_fatal() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let node = AgentNode::new(model, Arc::new(ToolRegistry::new()));
        let err = node
            .run(AgentState::default().snapshot(), ctx())
            .await
            .expect_err("no messages");
        assert!(matches!(err, NodeError::MissingInput { .. }));
    }

    #[test]
    fn directive_lists_registered_tools() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let store: Arc<dyn crate::store::ExpenseStore> =
            Arc::new(crate::store::InMemoryExpenseStore::new());
        let registry = crate::tools::finance::finance_tools(store, model.clone());
        let node = AgentNode::new(model, Arc::new(registry));

        let directive = node.system_directive();
        assert!(directive.contains(FINAL_ANSWER));
        assert!(directive.contains("- save_spending:"));
        assert!(directive.contains("- set_spending_limit:"));
    }
}
