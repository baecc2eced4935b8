//! Tool registry and dispatch.
//!
//! Tools are the only way the agent touches the outside world. Each tool
//! declares a name, a description, and an [`ArgSchema`]; the registry owns
//! dispatch, resolving a [`ToolCallRequest`] to a handler only after its
//! arguments validate against the schema.

pub mod finance;
pub mod schema;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::llm::ModelError;
use crate::message::ToolCallRequest;
use crate::store::StoreError;
use schema::ArgSchema;

/// What a tool hands back to the loop.
///
/// `text` becomes the content of the correlated tool-result message. The
/// remaining fields are channel deltas the tool node folds into its
/// partial, so tool side effects surface in durable state.
#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    pub text: String,
    pub expenses: Vec<Value>,
    pub spending_limits: Vec<Value>,
    pub spending_categories: Vec<Value>,
    pub alerts: Vec<Value>,
}

impl ToolOutput {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_expense(mut self, expense: Value) -> Self {
        self.expenses.push(expense);
        self
    }

    #[must_use]
    pub fn with_spending_limit(mut self, limit: Value) -> Self {
        self.spending_limits.push(limit);
        self
    }

    #[must_use]
    pub fn with_spending_category(mut self, category: Value) -> Self {
        self.spending_categories.push(category);
        self
    }

    #[must_use]
    pub fn with_alert(mut self, alert: Value) -> Self {
        self.alerts.push(alert);
        self
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// The model asked for a tool nobody registered.
    #[error("unknown tool: {name}")]
    #[diagnostic(
        code(ledgerweave::tools::unknown),
        help("Register the tool before compiling the graph, or fix the model's tool list.")
    )]
    Unknown { name: String },

    /// Arguments did not validate against the tool's schema.
    #[error("invalid arguments for tool '{tool}': {message}")]
    #[diagnostic(code(ledgerweave::tools::validation))]
    Validation { tool: String, message: String },

    /// The handler itself failed.
    #[error("tool '{tool}' failed: {message}")]
    #[diagnostic(code(ledgerweave::tools::handler))]
    Handler { tool: String, message: String },

    #[error(transparent)]
    #[diagnostic(code(ledgerweave::tools::model))]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(code(ledgerweave::tools::store))]
    Store(#[from] StoreError),
}

impl ToolError {
    /// Validation and unknown-tool failures are reported back to the model
    /// as tool-result text; everything else aborts the invocation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ToolError::Unknown { .. } | ToolError::Validation { .. })
    }
}

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable name the model addresses this tool by.
    fn name(&self) -> &str;
    /// One-line description advertised to the model.
    fn description(&self) -> &str;
    /// Argument schema; dispatch validates against it before calling.
    fn schema(&self) -> ArgSchema;
    /// Run the tool. Arguments have already passed schema validation.
    async fn call(&self, args: &Map<String, Value>) -> Result<ToolOutput, ToolError>;
}

/// Name-keyed tool collection with schema-checked dispatch.
///
/// Registration order is preserved so the system directive can list tools
/// deterministically.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: FxHashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name replaces the handler and
    /// keeps its original position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        } else {
            tracing::warn!(tool = %name, "replacing registered tool");
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Tool names in registration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Resolve and run one tool-call request: lookup, schema validation,
    /// then the handler.
    #[instrument(skip(self, request), fields(tool = %request.name, call_id = %request.id))]
    pub async fn dispatch(&self, request: &ToolCallRequest) -> Result<ToolOutput, ToolError> {
        let Some(tool) = self.tools.get(&request.name) else {
            return Err(ToolError::Unknown {
                name: request.name.clone(),
            });
        };

        let args = coerce_args(&request.arguments).ok_or_else(|| ToolError::Validation {
            tool: request.name.clone(),
            message: "arguments must be a JSON object".to_string(),
        })?;
        tool.schema()
            .validate(&args)
            .map_err(|message| ToolError::Validation {
                tool: request.name.clone(),
                message,
            })?;

        tool.call(&args).await
    }
}

/// Models send `null` or omit arguments entirely for zero-argument tools;
/// treat both as an empty object.
fn coerce_args(arguments: &Value) -> Option<Map<String, Value>> {
    match arguments {
        Value::Object(map) => Some(map.clone()),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}
