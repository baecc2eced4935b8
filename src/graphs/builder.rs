//! GraphBuilder: fluent construction of executable graphs.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::edges::{ConditionalEdge, EdgePredicate};
use crate::app::App;
use crate::node::Node;
use crate::runtimes::RuntimeConfig;
use crate::types::NodeKind;

/// Builder for the execution graph.
///
/// Every graph needs at least one executable node, an edge from
/// `NodeKind::Start` to define the entry point, and a path to
/// `NodeKind::End`. Start and End are virtual: they anchor topology and are
/// never registered or executed.
pub struct GraphBuilder {
    /// Registered executable nodes, keyed by identifier.
    pub nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    /// Unconditional edges.
    pub edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    /// Conditional edges evaluated against the live state.
    pub conditional_edges: Vec<ConditionalEdge>,
    /// Runtime configuration baked into the compiled app.
    pub runtime_config: RuntimeConfig,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Registers a node. Attempts to register the virtual `Start`/`End`
    /// endpoints are ignored with a warning.
    #[must_use]
    pub fn add_node(mut self, id: NodeKind, node: impl Node + 'static) -> Self {
        match id {
            NodeKind::Start | NodeKind::End => {
                tracing::warn!(?id, "ignoring registration of virtual node kind");
            }
            _ => {
                self.nodes.insert(id, Arc::new(node));
            }
        }
        self
    }

    /// Adds an unconditional edge.
    #[must_use]
    pub fn add_edge(mut self, from: NodeKind, to: NodeKind) -> Self {
        self.edges.entry(from).or_default().push(to);
        self
    }

    /// Adds a conditional edge; the predicate picks the successor of `from`
    /// at runtime. A node with a conditional edge should not also carry
    /// static edges, the conditional one wins.
    #[must_use]
    pub fn add_conditional_edge(mut self, from: NodeKind, predicate: EdgePredicate) -> Self {
        self.conditional_edges
            .push(ConditionalEdge::new(from, predicate));
        self
    }

    #[must_use]
    pub fn with_runtime_config(mut self, runtime_config: RuntimeConfig) -> Self {
        self.runtime_config = runtime_config;
        self
    }

    /// Compiles the graph into an executable [`App`].
    pub fn compile(self) -> App {
        App::from_parts(
            self.nodes,
            self.edges,
            self.conditional_edges,
            self.runtime_config,
        )
    }
}
