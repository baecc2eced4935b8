//! High-level finance agent facade.
//!
//! [`FinanceAgent`] wires the whole loop together: the two nodes, the
//! router, the tool registry, and a shared checkpointer so conversation
//! threads survive across calls. [`FinanceAgent::call_agent`] is the
//! request/response surface: one user query in, the agent's final reply out.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

use crate::app::App;
use crate::graphs::{EdgePredicate, GraphBuilder};
use crate::llm::ChatModel;
use crate::message::Message;
use crate::nodes::{AgentNode, ToolsNode};
use crate::runtimes::runner::RunnerError;
use crate::runtimes::runtime_config::DEFAULT_STEP_LIMIT;
use crate::runtimes::{AppRunner, Checkpointer, CheckpointerError, CheckpointerType};
use crate::state::AgentState;
use crate::store::{ExpenseStore, InMemoryExpenseStore};
use crate::tools::ToolRegistry;
use crate::tools::finance::finance_tools;
use crate::types::NodeKind;
use crate::utils::id_generator::IdGenerator;

/// Name of the model-calling node.
pub const AGENT: &str = "agent";
/// Name of the tool-execution node.
pub const TOOLS: &str = "tools";

/// The routing rule of the loop: an assistant message carrying tool calls
/// goes to the tool node, anything else ends the invocation. Message text,
/// including the FINAL ANSWER sentinel, is never consulted.
#[must_use]
pub fn agent_router() -> EdgePredicate {
    Arc::new(|snapshot| {
        if snapshot
            .last_message()
            .is_some_and(Message::requests_tools)
        {
            TOOLS.to_string()
        } else {
            "End".to_string()
        }
    })
}

#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    #[error(transparent)]
    #[diagnostic(code(ledgerweave::agent::runner))]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    #[diagnostic(code(ledgerweave::agent::checkpointer))]
    Checkpointer(#[from] CheckpointerError),

    /// The run finished with an empty conversation.
    #[error("the agent produced no reply")]
    #[diagnostic(code(ledgerweave::agent::no_reply))]
    NoReply,

    #[error("no chat model configured")]
    #[diagnostic(
        code(ledgerweave::agent::missing_model),
        help("Call FinanceAgentBuilder::with_model before build.")
    )]
    MissingModel,
}

/// A compiled finance agent bound to a persistence backend.
///
/// Cheap to clone; clones share the graph and the checkpointer, so every
/// clone sees the same threads.
#[derive(Clone)]
pub struct FinanceAgent {
    app: Arc<App>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    step_limit: u64,
}

impl FinanceAgent {
    #[must_use]
    pub fn builder() -> FinanceAgentBuilder {
        FinanceAgentBuilder::default()
    }

    /// The compiled graph, mainly for tests and custom runners.
    #[must_use]
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// A fresh thread id for starting a new conversation.
    #[must_use]
    pub fn new_thread_id(&self) -> String {
        IdGenerator::new().generate_thread_id()
    }

    /// Run one conversational turn on the given thread.
    ///
    /// A new thread starts fresh; an existing one resumes from its
    /// checkpoint with the query appended to the restored conversation.
    /// Returns the content of the conversation's final message.
    #[instrument(skip(self, query), fields(thread = %thread_id), err)]
    pub async fn call_agent(&self, query: &str, thread_id: &str) -> Result<String, AgentError> {
        let mut runner = AppRunner::with_shared_checkpointer(
            Arc::clone(&self.app),
            self.checkpointer.clone(),
            self.step_limit,
        );
        runner
            .create_session(
                thread_id.to_string(),
                AgentState::new_with_user_message(query),
            )
            .await?;
        let final_state = runner.run_until_complete(thread_id).await?;

        final_state
            .snapshot()
            .last_message()
            .map(|m| m.content.clone())
            .ok_or(AgentError::NoReply)
    }
}

/// Builder for [`FinanceAgent`].
///
/// Only the model is mandatory; the store defaults to in-memory, the
/// checkpointer to in-memory, the step limit to [`DEFAULT_STEP_LIMIT`].
pub struct FinanceAgentBuilder {
    model: Option<Arc<dyn ChatModel>>,
    store: Option<Arc<dyn ExpenseStore>>,
    registry: Option<ToolRegistry>,
    checkpointer: Option<CheckpointerType>,
    sqlite_db_name: Option<String>,
    step_limit: u64,
}

impl Default for FinanceAgentBuilder {
    fn default() -> Self {
        Self {
            model: None,
            store: None,
            registry: None,
            checkpointer: Some(CheckpointerType::InMemory),
            sqlite_db_name: None,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

impl FinanceAgentBuilder {
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.model = Some(model);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ExpenseStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the default finance tool set entirely.
    #[must_use]
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Pick the persistence backend; `None` disables checkpointing.
    #[must_use]
    pub fn with_checkpointer(mut self, checkpointer: Option<CheckpointerType>) -> Self {
        self.checkpointer = checkpointer;
        self
    }

    #[must_use]
    pub fn with_sqlite_db_name(mut self, name: impl Into<String>) -> Self {
        self.sqlite_db_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Compile the graph and build the checkpointer. Fails only when the
    /// persistence backend cannot be built.
    pub async fn build(self) -> Result<FinanceAgent, AgentError> {
        let Some(model) = self.model else {
            return Err(AgentError::MissingModel);
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryExpenseStore::new()) as Arc<dyn ExpenseStore>);
        let registry = Arc::new(
            self.registry
                .unwrap_or_else(|| finance_tools(store, Arc::clone(&model))),
        );

        let app = GraphBuilder::new()
            .add_node(
                NodeKind::Custom(AGENT.into()),
                AgentNode::new(model, Arc::clone(&registry)),
            )
            .add_node(NodeKind::Custom(TOOLS.into()), ToolsNode::new(registry))
            .add_edge(NodeKind::Start, NodeKind::Custom(AGENT.into()))
            .add_conditional_edge(NodeKind::Custom(AGENT.into()), agent_router())
            .add_edge(NodeKind::Custom(TOOLS.into()), NodeKind::Custom(AGENT.into()))
            .compile();

        let checkpointer = match &self.checkpointer {
            Some(kind) => Some(kind.build(self.sqlite_db_name.clone()).await?),
            None => None,
        };

        Ok(FinanceAgent {
            app: Arc::new(app),
            checkpointer,
            step_limit: self.step_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCallRequest;
    use crate::state::AgentState;
    use serde_json::json;

    #[test]
    fn router_sends_tool_requests_to_tools() {
        let router = agent_router();
        let state = AgentState::builder()
            .with_user_message("spend $5")
            .with_message(Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new(
                    "c1",
                    "save_spending",
                    json!({"amount": 5.0}),
                )],
            ))
            .build();
        assert_eq!(router(state.snapshot()), TOOLS);
    }

    #[test]
    fn router_ends_on_plain_reply_regardless_of_sentinel() {
        let router = agent_router();
        let with_sentinel = AgentState::builder()
            .with_user_message("hi")
            .with_assistant_message("FINAL ANSWER: hello")
            .build();
        assert_eq!(router(with_sentinel.snapshot()), "End");

        let without_sentinel = AgentState::builder()
            .with_user_message("hi")
            .with_assistant_message("hello")
            .build();
        assert_eq!(router(without_sentinel.snapshot()), "End");
    }

    #[test]
    fn router_ends_on_empty_conversation() {
        let router = agent_router();
        assert_eq!(router(AgentState::default().snapshot()), "End");
    }
}
