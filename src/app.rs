//! Compiled application: the executable form of a graph.

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::channels::Channel;
use crate::channels::errors::ErrorEvent;
use crate::graphs::ConditionalEdge;
use crate::node::{Node, NodePartial};
use crate::reducers::{ReducerError, ReducerRegistry};
use crate::runtimes::runner::RunnerError;
use crate::runtimes::{AppRunner, RuntimeConfig, SessionInit};
use crate::state::AgentState;
use crate::types::{ChannelType, NodeKind};
use crate::utils::id_generator::IdGenerator;
use tracing::instrument;

/// Orchestrates graph execution and applies reducers at barriers.
///
/// `App` holds the compiled topology plus the reducer registry. Execution
/// itself is driven by [`AppRunner`]; [`App::invoke`] is the one-shot
/// convenience that wires a runner up from the runtime configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use ledgerweave::graphs::GraphBuilder;
/// use ledgerweave::state::AgentState;
/// use ledgerweave::types::NodeKind;
/// use ledgerweave::node::{Node, NodeContext, NodeError, NodePartial};
/// use async_trait::async_trait;
///
/// # struct MyNode;
/// # #[async_trait]
/// # impl Node for MyNode {
/// #     async fn run(&self, _: ledgerweave::state::StateSnapshot, _: NodeContext) -> Result<NodePartial, NodeError> {
/// #         Ok(NodePartial::default())
/// #     }
/// # }
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let app = GraphBuilder::new()
///     .add_node(NodeKind::Custom("process".into()), MyNode)
///     .add_edge(NodeKind::Start, NodeKind::Custom("process".into()))
///     .add_edge(NodeKind::Custom("process".into()), NodeKind::End)
///     .compile();
///
/// let final_state = app.invoke(AgentState::new_with_user_message("Hello")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct App {
    nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    conditional_edges: Vec<ConditionalEdge>,
    reducer_registry: ReducerRegistry,
    runtime_config: RuntimeConfig,
}

/// Result of applying node partials at a barrier.
///
/// Channel names and errors are reported in a stable order so the runner,
/// checkpointers, and tests observe identical behaviour across runs.
#[derive(Debug, Clone, Default)]
pub struct BarrierOutcome {
    /// Channels whose contents (and therefore versions) changed.
    pub updated_channels: Vec<&'static str>,
    /// Recoverable errors emitted by nodes in this superstep.
    pub errors: Vec<ErrorEvent>,
}

impl App {
    /// Internal (crate) factory; keeps nodes and edges private.
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, Arc<dyn Node>>,
        edges: FxHashMap<NodeKind, Vec<NodeKind>>,
        conditional_edges: Vec<ConditionalEdge>,
        runtime_config: RuntimeConfig,
    ) -> Self {
        App {
            nodes,
            edges,
            conditional_edges,
            reducer_registry: ReducerRegistry::default(),
            runtime_config,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &FxHashMap<NodeKind, Arc<dyn Node>> {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &FxHashMap<NodeKind, Vec<NodeKind>> {
        &self.edges
    }

    #[must_use]
    pub fn conditional_edges(&self) -> &[ConditionalEdge] {
        &self.conditional_edges
    }

    #[must_use]
    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    /// Session id for the next invocation: the configured one, or a fresh
    /// random id when none was supplied.
    fn next_session_id(&self) -> String {
        self.runtime_config
            .session_id
            .clone()
            .unwrap_or_else(|| IdGenerator::new().generate_run_id())
    }

    /// Execute the workflow to completion with a runner built from the
    /// runtime configuration.
    #[instrument(skip(self, initial_state), err)]
    pub async fn invoke(&self, initial_state: AgentState) -> Result<AgentState, RunnerError> {
        let mut runner = AppRunner::from_config(self.clone(), &self.runtime_config).await?;
        let session_id = self.next_session_id();

        let init = runner
            .create_session(session_id.clone(), initial_state)
            .await?;
        if let SessionInit::Resumed { checkpoint_step } = init {
            tracing::info!(
                session = %session_id,
                checkpoint_step,
                "resuming session from checkpoint"
            );
        }

        runner.run_until_complete(&session_id).await
    }

    /// Merge node outputs and apply reducers after a superstep.
    ///
    /// Deltas are concatenated in node execution order, then each channel's
    /// reducer folds the merged delta into state. Reducers never bump
    /// versions themselves; a channel's version is bumped here, once, when
    /// its contents actually changed.
    #[instrument(skip(self, state, run_ids, node_partials), err)]
    pub async fn apply_barrier(
        &self,
        state: &mut AgentState,
        run_ids: &[NodeKind],
        node_partials: Vec<NodePartial>,
    ) -> Result<BarrierOutcome, ReducerError> {
        let mut merged = NodePartial::default();

        fn extend<T: Clone>(into: &mut Option<Vec<T>>, from: &Option<Vec<T>>) {
            if let Some(items) = from
                && !items.is_empty()
            {
                into.get_or_insert_with(Vec::new).extend(items.iter().cloned());
            }
        }

        for (i, partial) in node_partials.iter().enumerate() {
            if let Some(nid) = run_ids.get(i) {
                tracing::debug!(node = %nid, "merging node partial");
            }
            extend(&mut merged.messages, &partial.messages);
            extend(&mut merged.expenses, &partial.expenses);
            extend(&mut merged.spending_limits, &partial.spending_limits);
            extend(&mut merged.spending_categories, &partial.spending_categories);
            extend(&mut merged.alerts, &partial.alerts);
            extend(&mut merged.errors, &partial.errors);
        }

        let errors = merged.errors.clone().unwrap_or_default();

        let mut updated: Vec<&'static str> = Vec::new();
        for channel in ChannelType::all() {
            let before_version = self.channel_version(state, &channel);
            let changed = self
                .reducer_registry
                .try_update(channel.clone(), state, &merged)?;
            if changed {
                self.set_channel_version(state, &channel, before_version.saturating_add(1));
                tracing::info!(
                    channel = channel.as_str(),
                    after_version = before_version.saturating_add(1),
                    "channel updated"
                );
                updated.push(channel.as_str());
            }
        }

        Ok(BarrierOutcome {
            updated_channels: updated,
            errors,
        })
    }

    fn channel_version(&self, state: &AgentState, channel: &ChannelType) -> u32 {
        match channel {
            ChannelType::Message => state.messages.version(),
            ChannelType::Expense => state.expenses.version(),
            ChannelType::SpendingLimit => state.spending_limits.version(),
            ChannelType::SpendingCategory => state.spending_categories.version(),
            ChannelType::Alert => state.alerts.version(),
            ChannelType::Error => state.errors.version(),
        }
    }

    fn set_channel_version(&self, state: &mut AgentState, channel: &ChannelType, version: u32) {
        match channel {
            ChannelType::Message => state.messages.set_version(version),
            ChannelType::Expense => state.expenses.set_version(version),
            ChannelType::SpendingLimit => state.spending_limits.set_version(version),
            ChannelType::SpendingCategory => state.spending_categories.set_version(version),
            ChannelType::Alert => state.alerts.set_version(version),
            ChannelType::Error => state.errors.set_version(version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::GraphBuilder;
    use crate::message::Message;
    use crate::node::{NodeContext, NodeError};
    use crate::state::StateSnapshot;
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopNode;

    #[async_trait]
    impl Node for NoopNode {
        async fn run(
            &self,
            _snapshot: StateSnapshot,
            _ctx: NodeContext,
        ) -> Result<NodePartial, NodeError> {
            Ok(NodePartial::default())
        }
    }

    fn test_app() -> App {
        GraphBuilder::new()
            .add_node(NodeKind::Custom("worker".into()), NoopNode)
            .add_edge(NodeKind::Start, NodeKind::Custom("worker".into()))
            .add_edge(NodeKind::Custom("worker".into()), NodeKind::End)
            .compile()
    }

    #[tokio::test]
    async fn barrier_bumps_only_touched_channels() {
        let app = test_app();
        let mut state = AgentState::new_with_user_message("hi");

        let partial = NodePartial::new()
            .with_messages(vec![Message::assistant("ok")])
            .with_expenses(vec![json!({"amount": 3.0})]);
        let outcome = app
            .apply_barrier(&mut state, &[NodeKind::Custom("worker".into())], vec![partial])
            .await
            .expect("barrier");

        assert_eq!(outcome.updated_channels, vec!["messages", "expenses"]);
        let versions = state.versions();
        assert_eq!(versions.messages, 2);
        assert_eq!(versions.expenses, 2);
        assert_eq!(versions.alerts, 1);
    }

    #[tokio::test]
    async fn barrier_merges_partials_in_node_order() {
        let app = test_app();
        let mut state = AgentState::default();

        let first = NodePartial::new().with_messages(vec![Message::assistant("first")]);
        let second = NodePartial::new().with_messages(vec![Message::assistant("second")]);
        app.apply_barrier(
            &mut state,
            &[
                NodeKind::Custom("a".into()),
                NodeKind::Custom("b".into()),
            ],
            vec![first, second],
        )
        .await
        .expect("barrier");

        let messages = state.messages.snapshot();
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
    }

    #[tokio::test]
    async fn empty_partials_leave_versions_alone() {
        let app = test_app();
        let mut state = AgentState::new_with_user_message("hi");
        let outcome = app
            .apply_barrier(
                &mut state,
                &[NodeKind::Custom("worker".into())],
                vec![NodePartial::default()],
            )
            .await
            .expect("barrier");
        assert!(outcome.updated_channels.is_empty());
        assert_eq!(state.versions().messages, 1);
    }
}
