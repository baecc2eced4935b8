//! Node execution framework.
//!
//! A node is one unit of computation in the agent loop. Nodes read an
//! immutable [`StateSnapshot`](crate::state::StateSnapshot), do their work,
//! and return a [`NodePartial`] delta that the barrier merges through the
//! reducer registry. Nodes never mutate state directly.

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::channels::errors::ErrorEvent;
use crate::llm::ModelError;
use crate::message::Message;
use crate::state::StateSnapshot;

/// Core trait for executable nodes.
///
/// # Error Handling
///
/// Two tiers, decided by whether the loop can continue:
/// 1. Fatal: return `Err(NodeError)` to abort the invocation.
/// 2. Recoverable: record an [`ErrorEvent`] in `NodePartial.errors` and
///    return `Ok`, letting the conversation carry on.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute this node against the given snapshot.
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError>;
}

/// Execution context handed to a node for one run.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Name of the node being executed.
    pub node_id: String,
    /// Superstep number within the current invocation.
    pub step: u64,
}

impl NodeContext {
    /// Emit a structured progress event tagged with this node's identity.
    pub fn emit(&self, scope: &str, message: &str) {
        tracing::debug!(
            node = %self.node_id,
            step = self.step,
            scope,
            "{message}"
        );
    }
}

/// The delta a node wants applied to state.
///
/// Every field is optional; `None` means "no update for this channel".
/// Reducers only append, so a partial can add entries but never rewrite
/// history.
#[derive(Clone, Debug, Default)]
pub struct NodePartial {
    pub messages: Option<Vec<Message>>,
    pub expenses: Option<Vec<Value>>,
    pub spending_limits: Option<Vec<Value>>,
    pub spending_categories: Option<Vec<Value>>,
    pub alerts: Option<Vec<Value>>,
    pub errors: Option<Vec<ErrorEvent>>,
}

impl NodePartial {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    #[must_use]
    pub fn with_expenses(mut self, expenses: Vec<Value>) -> Self {
        self.expenses = Some(expenses);
        self
    }

    #[must_use]
    pub fn with_spending_limits(mut self, limits: Vec<Value>) -> Self {
        self.spending_limits = Some(limits);
        self
    }

    #[must_use]
    pub fn with_spending_categories(mut self, categories: Vec<Value>) -> Self {
        self.spending_categories = Some(categories);
        self
    }

    #[must_use]
    pub fn with_alerts(mut self, alerts: Vec<Value>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    #[must_use]
    pub fn with_errors(mut self, errors: Vec<ErrorEvent>) -> Self {
        self.errors = Some(errors);
        self
    }
}

/// Fatal node execution errors. Anything recoverable belongs on the errors
/// channel instead.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(ledgerweave::node::missing_input),
        help("Check that the previous node produced the required data.")
    )]
    MissingInput { what: &'static str },

    /// The chat model call failed.
    #[error(transparent)]
    #[diagnostic(code(ledgerweave::node::model))]
    Model(#[from] ModelError),

    /// A tool handler failed in a way the loop cannot absorb.
    #[error("tool '{name}' failed: {message}")]
    #[diagnostic(code(ledgerweave::node::tool))]
    Tool { name: String, message: String },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(ledgerweave::node::serde_json))]
    Serde(#[from] serde_json::Error),
}
