//! Graph definition and compilation.
//!
//! The agent loop is a small directed graph: virtual `Start` and `End`
//! endpoints, executable nodes in between, static edges for unconditional
//! flow, and conditional edges for routing decided at runtime from a
//! [`StateSnapshot`](crate::state::StateSnapshot). [`GraphBuilder`] builds
//! the topology and compiles it into an executable
//! [`App`](crate::app::App).
//!
//! ```
//! use ledgerweave::graphs::GraphBuilder;
//! use ledgerweave::types::NodeKind;
//!
//! # struct MyNode;
//! # #[async_trait::async_trait]
//! # impl ledgerweave::node::Node for MyNode {
//! #     async fn run(&self, _: ledgerweave::state::StateSnapshot, _: ledgerweave::node::NodeContext) -> Result<ledgerweave::node::NodePartial, ledgerweave::node::NodeError> {
//! #         Ok(ledgerweave::node::NodePartial::default())
//! #     }
//! # }
//! let app = GraphBuilder::new()
//!     .add_node(NodeKind::Custom("worker".into()), MyNode)
//!     .add_edge(NodeKind::Start, NodeKind::Custom("worker".into()))
//!     .add_edge(NodeKind::Custom("worker".into()), NodeKind::End)
//!     .compile();
//! ```

mod builder;
mod edges;

pub use builder::GraphBuilder;
pub use edges::{ConditionalEdge, EdgePredicate};
