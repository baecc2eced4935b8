//! # Ledgerweave: a conversational personal-finance agent
//!
//! Ledgerweave runs a bounded model-and-tools loop over a versioned,
//! channel-based state: the model proposes, tools execute, a barrier merges
//! their deltas, and a checkpointer keeps every conversation thread durable
//! so a later call picks up exactly where the last one stopped.
//!
//! ## Core Concepts
//!
//! - **Messages**: the ordered conversation, including correlated tool results
//! - **Channels**: append-only, versioned state collections merged at barriers
//! - **Nodes**: the model-calling agent node and the tool-execution node
//! - **Router**: a conditional edge keyed purely on tool-call presence
//! - **Tools**: schema-validated handlers over an expense store
//! - **Checkpointing**: one durable snapshot per thread, overwritten in place
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ledgerweave::agent::FinanceAgent;
//! use ledgerweave::llm::ScriptedModel;
//! use ledgerweave::message::Message;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = Arc::new(ScriptedModel::new(vec![
//!     Message::assistant("FINAL ANSWER: nothing recorded yet."),
//! ]));
//!
//! let agent = FinanceAgent::builder().with_model(model).build().await?;
//! let reply = agent.call_agent("What did I spend this week?", "thread-1").await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```
//!
//! Lower layers are public too: build custom graphs with
//! [`graphs::GraphBuilder`], drive them with [`runtimes::AppRunner`], or
//! register your own [`tools::Tool`] implementations alongside the built-in
//! finance set.

pub mod agent;
pub mod app;
pub mod channels;
pub mod graphs;
pub mod llm;
pub mod message;
pub mod node;
pub mod nodes;
pub mod reducers;
pub mod runtimes;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod tools;
pub mod types;
pub mod utils;
