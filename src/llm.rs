//! Chat model abstraction.
//!
//! The agent loop calls the model through the [`ChatModel`] trait so the
//! provider is an injected capability rather than a hardwired client. The
//! crate ships a [`ScriptedModel`] for tests and demos; real providers live
//! behind the same trait in application code.

use std::collections::VecDeque;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::message::Message;

/// A chat model the agent node can invoke with the full conversation.
///
/// The returned message is expected to be assistant-role. Whether it carries
/// tool-call requests decides what the router does next.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> Result<Message, ModelError>;
}

/// Errors surfaced by chat model providers.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    /// Provider-side failure (network, auth, rate limit, malformed reply).
    #[error("model provider error ({provider}): {message}")]
    #[diagnostic(code(ledgerweave::llm::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// The scripted model ran out of queued responses.
    #[error("scripted model exhausted after {served} responses")]
    #[diagnostic(
        code(ledgerweave::llm::script_exhausted),
        help("Queue one response per expected model turn.")
    )]
    ScriptExhausted { served: usize },
}

/// Deterministic model that replays a fixed queue of responses.
///
/// Each `invoke` pops the next queued message. Useful for exercising the
/// loop without a provider: queue an assistant message with tool calls, then
/// a plain assistant message, and the loop runs model, tools, model, end.
///
/// # Examples
///
/// ```rust
/// use ledgerweave::llm::ScriptedModel;
/// use ledgerweave::message::Message;
///
/// let model = ScriptedModel::new(vec![
///     Message::assistant("FINAL ANSWER: you spent $40 this week."),
/// ]);
/// ```
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Message>>,
    served: Mutex<usize>,
}

impl ScriptedModel {
    #[must_use]
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            served: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn invoke(&self, _messages: &[Message]) -> Result<Message, ModelError> {
        let mut queue = self.responses.lock().await;
        match queue.pop_front() {
            Some(message) => {
                *self.served.lock().await += 1;
                Ok(message)
            }
            None => {
                let served = *self.served.lock().await;
                Err(ModelError::ScriptExhausted { served })
            }
        }
    }
}
