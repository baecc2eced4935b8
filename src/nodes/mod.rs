//! The two nodes of the agent loop.
//!
//! [`AgentNode`] invokes the chat model over the conversation;
//! [`ToolsNode`] executes whatever tool calls the model requested. The
//! router between them lives on the graph as a conditional edge.

mod agent;
mod tools;

pub use agent::AgentNode;
pub use tools::ToolsNode;
