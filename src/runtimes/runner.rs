use crate::app::{App, BarrierOutcome};
use crate::channels::Channel;
use crate::channels::errors::ErrorEvent;
use crate::node::{NodeContext, NodeError, NodePartial};
use crate::reducers::ReducerError;
use crate::runtimes::runtime_config::RuntimeConfig;
use crate::runtimes::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, restore_session_state,
};
use crate::state::AgentState;
use crate::types::NodeKind;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Result of executing one superstep in a session.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: u64,
    pub ran_nodes: Vec<NodeKind>,
    pub barrier_outcome: BarrierOutcome,
    pub next_frontier: Vec<NodeKind>,
    pub completed: bool,
}

/// Session state persisted across steps.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub state: AgentState,
    /// Cumulative superstep counter for this thread, across invocations.
    pub step: u64,
    /// Nodes due to run in the next superstep.
    pub frontier: Vec<NodeKind>,
    /// Visit counts for the current invocation, keyed by encoded node kind.
    /// Reset at the start of each invocation so the step bound applies per
    /// request, not per thread lifetime.
    pub node_visits: FxHashMap<String, u64>,
}

/// How a session was initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInit {
    /// A brand new session was created.
    Fresh,
    /// An existing session was resumed from a checkpoint.
    Resumed { checkpoint_step: u64 },
}

#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(ledgerweave::runner::session_not_found))]
    SessionNotFound { session_id: String },

    #[error("no nodes to run from Start (empty frontier)")]
    #[diagnostic(
        code(ledgerweave::runner::no_start_nodes),
        help("Add an edge from NodeKind::Start to the entry node.")
    )]
    NoStartNodes,

    #[error("exceeded maximum steps ({limit})")]
    #[diagnostic(
        code(ledgerweave::runner::step_limit),
        help("The loop did not converge. Raise the step limit or check tool/model behaviour.")
    )]
    StepLimitExceeded { limit: u64 },

    #[error(transparent)]
    #[diagnostic(code(ledgerweave::runner::checkpointer))]
    Checkpointer(#[from] CheckpointerError),

    #[error("node '{kind}' failed at step {step}: {source}")]
    #[diagnostic(code(ledgerweave::runner::node))]
    Node {
        kind: String,
        step: u64,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    #[diagnostic(code(ledgerweave::runner::barrier))]
    Barrier(#[from] ReducerError),
}

/// Runtime execution engine with session management and checkpointing.
///
/// `AppRunner` wraps an [`App`] and drives it superstep by superstep:
/// execute the frontier, merge deltas at the barrier, route, persist. The
/// split keeps the `App` a reusable graph description while each runner
/// owns its sessions and persistence.
pub struct AppRunner {
    app: Arc<App>,
    sessions: FxHashMap<String, SessionState>,
    checkpointer: Option<Arc<dyn Checkpointer>>,
    autosave: bool,
    step_limit: u64,
}

impl AppRunner {
    /// Create a runner with the given persistence backend and autosave on.
    pub async fn new(app: App, checkpointer_type: CheckpointerType) -> Result<Self, RunnerError> {
        let sqlite_db_name = app.runtime_config().sqlite_db_name.clone();
        let step_limit = app.runtime_config().step_limit;
        let checkpointer = checkpointer_type.build(sqlite_db_name).await?;
        Ok(Self {
            app: Arc::new(app),
            sessions: FxHashMap::default(),
            checkpointer: Some(checkpointer),
            autosave: true,
            step_limit,
        })
    }

    /// Create a runner from a runtime configuration. A `None` checkpointer
    /// in the config means no persistence at all.
    pub async fn from_config(app: App, config: &RuntimeConfig) -> Result<Self, RunnerError> {
        let checkpointer = match &config.checkpointer {
            Some(kind) => Some(kind.build(config.sqlite_db_name.clone()).await?),
            None => None,
        };
        Ok(Self {
            app: Arc::new(app),
            sessions: FxHashMap::default(),
            checkpointer,
            autosave: true,
            step_limit: config.step_limit,
        })
    }

    /// Create a runner around an existing checkpointer instance.
    ///
    /// This is how in-memory persistence survives across invocations: every
    /// call builds a fresh runner but hands it the same shared store.
    #[must_use]
    pub fn with_shared_checkpointer(
        app: Arc<App>,
        checkpointer: Option<Arc<dyn Checkpointer>>,
        step_limit: u64,
    ) -> Self {
        Self {
            app,
            sessions: FxHashMap::default(),
            checkpointer,
            autosave: true,
            step_limit,
        }
    }

    fn start_frontier(&self) -> Result<Vec<NodeKind>, RunnerError> {
        let frontier = self
            .app
            .edges()
            .get(&NodeKind::Start)
            .cloned()
            .unwrap_or_default();
        if frontier.is_empty() {
            return Err(RunnerError::NoStartNodes);
        }
        Ok(frontier)
    }

    /// Initialize a session, resuming from a checkpoint when one exists.
    ///
    /// On resume the seed messages from `initial_state` are appended to the
    /// restored conversation, visit counts reset for the new invocation,
    /// and the frontier is re-armed at the entry nodes so the thread takes
    /// another turn. Only an unseeded resume of an unfinished thread keeps
    /// the stored frontier.
    #[instrument(skip(self, initial_state, session_id), err)]
    pub async fn create_session(
        &mut self,
        session_id: String,
        initial_state: AgentState,
    ) -> Result<SessionInit, RunnerError> {
        let restored_checkpoint = if let Some(cp) = &self.checkpointer {
            cp.load_latest(&session_id).await?
        } else {
            None
        };

        if let Some(stored) = restored_checkpoint {
            let mut restored = restore_session_state(&stored);

            let seed_messages = initial_state.messages.snapshot();
            let seeded = !seed_messages.is_empty();
            if seeded {
                restored.state.messages.get_mut().extend(seed_messages);
            }
            restored.node_visits.clear();
            // A new user turn restarts the loop at the entry nodes: whatever
            // frontier a previous invocation left behind (End after a clean
            // finish, or a mid-loop node after a fatal failure) is answered
            // by the appended message, not replayed.
            let terminal = restored.frontier.is_empty()
                || restored.frontier.iter().all(NodeKind::is_end);
            if seeded || terminal {
                restored.frontier = self.start_frontier()?;
            }

            self.sessions.insert(session_id, restored);
            return Ok(SessionInit::Resumed {
                checkpoint_step: stored.step,
            });
        }

        let session_state = SessionState {
            state: initial_state,
            step: 0,
            frontier: self.start_frontier()?,
            node_visits: FxHashMap::default(),
        };
        self.sessions
            .insert(session_id.clone(), session_state.clone());
        self.maybe_checkpoint(&session_id).await?;
        Ok(SessionInit::Fresh)
    }

    /// Persist the session if autosave is on and a checkpointer is wired.
    ///
    /// A failed save is fatal for the invocation: the run must not report
    /// success without its durable footprint.
    async fn maybe_checkpoint(&self, session_id: &str) -> Result<(), CheckpointerError> {
        if self.autosave
            && let Some(checkpointer) = &self.checkpointer
            && let Some(session_state) = self.sessions.get(session_id)
        {
            checkpointer
                .save(Checkpoint::from_session(session_id, session_state))
                .await?;
        }
        Ok(())
    }

    fn is_terminal(frontier: &[NodeKind]) -> bool {
        frontier.is_empty() || frontier.iter().all(NodeKind::is_end)
    }

    /// Record a fatal failure on the errors channel so the checkpoint tells
    /// the story, then persist.
    async fn record_fatal(&mut self, session_id: &str, event: ErrorEvent) {
        let app = Arc::clone(&self.app);
        if let Some(session_state) = self.sessions.get_mut(session_id) {
            let partial = NodePartial::new().with_errors(vec![event]);
            let mut state = session_state.state.clone();
            if app
                .apply_barrier(&mut state, &[], vec![partial])
                .await
                .is_ok()
            {
                session_state.state = state;
            }
        }
        // A fatal error is already propagating; a save failure here can only
        // be logged.
        if let Err(e) = self.maybe_checkpoint(session_id).await {
            tracing::warn!(session = %session_id, error = %e, "checkpoint save failed");
        }
    }

    /// Compute successors for the nodes that just ran. A conditional edge
    /// takes precedence over static edges from the same node. Unknown
    /// targets are dropped with a warning; duplicates collapse.
    fn compute_next_frontier(
        &self,
        session_state: &SessionState,
        ran: &[NodeKind],
        step: u64,
    ) -> Vec<NodeKind> {
        let snapshot = session_state.state.snapshot();
        let mut next_frontier: Vec<NodeKind> = Vec::new();

        for id in ran {
            let conditional = self
                .app
                .conditional_edges()
                .iter()
                .find(|ce| ce.from() == id);

            let targets: Vec<NodeKind> = if let Some(edge) = conditional {
                let target_name = (edge.predicate())(snapshot.clone());
                tracing::debug!(from = %id, target = %target_name, step, "conditional edge routed");
                vec![NodeKind::from(target_name.as_str())]
            } else {
                self.app.edges().get(id).cloned().unwrap_or_default()
            };

            for target in targets {
                let valid = match &target {
                    NodeKind::End | NodeKind::Start => true,
                    NodeKind::Custom(_) => self.app.nodes().contains_key(&target),
                };
                if !valid {
                    tracing::warn!(
                        step,
                        origin = %id.encode(),
                        target = %target.encode(),
                        "frontier target not found; skipping"
                    );
                    continue;
                }
                if !next_frontier.contains(&target) {
                    next_frontier.push(target);
                }
            }
        }

        next_frontier
    }

    /// Execute one superstep for the given session.
    #[instrument(skip(self), err)]
    pub async fn run_step(&mut self, session_id: &str) -> Result<StepReport, RunnerError> {
        let (frontier, step) = {
            let session_state =
                self.sessions
                    .get(session_id)
                    .ok_or_else(|| RunnerError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;
            (session_state.frontier.clone(), session_state.step)
        };

        if Self::is_terminal(&frontier) {
            return Ok(StepReport {
                step,
                ran_nodes: vec![],
                barrier_outcome: BarrierOutcome::default(),
                next_frontier: vec![],
                completed: true,
            });
        }

        // Step bound: refuse to run any node past its visit budget. The
        // bound is per invocation, enforced before execution so the final
        // checkpoint reflects the state at the moment the loop was cut.
        for node in &frontier {
            if node.is_end() || node.is_start() {
                continue;
            }
            let visits = {
                let session_state = self
                    .sessions
                    .get(session_id)
                    .ok_or_else(|| RunnerError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;
                session_state
                    .node_visits
                    .get(&node.encode())
                    .copied()
                    .unwrap_or(0)
            };
            if visits >= self.step_limit {
                let event = ErrorEvent::runner(
                    session_id,
                    step,
                    format!("exceeded maximum steps ({})", self.step_limit),
                )
                .with_context(json!({ "node": node.encode(), "visits": visits }));
                self.record_fatal(session_id, event).await;
                return Err(RunnerError::StepLimitExceeded {
                    limit: self.step_limit,
                });
            }
        }

        let mut session_state = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| RunnerError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        session_state.step += 1;
        let step = session_state.step;
        tracing::debug!(step, frontier_len = frontier.len(), "starting superstep");

        // Run frontier nodes sequentially, in frontier order.
        let mut ran_nodes: Vec<NodeKind> = Vec::new();
        let mut partials: Vec<NodePartial> = Vec::new();
        for node_kind in &frontier {
            if node_kind.is_end() || node_kind.is_start() {
                continue;
            }
            let Some(node) = self.app.nodes().get(node_kind).cloned() else {
                tracing::warn!(node = %node_kind, "frontier node missing from registry; skipping");
                continue;
            };
            let snapshot = session_state.state.snapshot();
            let ctx = NodeContext {
                node_id: node_kind.to_string(),
                step,
            };
            match node.run(snapshot, ctx).await {
                Ok(partial) => {
                    *session_state
                        .node_visits
                        .entry(node_kind.encode())
                        .or_insert(0) += 1;
                    ran_nodes.push(node_kind.clone());
                    partials.push(partial);
                }
                Err(source) => {
                    let event = ErrorEvent::node(node_kind.to_string(), step, source.to_string());
                    self.sessions
                        .insert(session_id.to_string(), session_state);
                    self.record_fatal(session_id, event).await;
                    return Err(RunnerError::Node {
                        kind: node_kind.to_string(),
                        step,
                        source,
                    });
                }
            }
        }

        let barrier_outcome = self
            .app
            .apply_barrier(&mut session_state.state, &ran_nodes, partials)
            .await?;

        let next_frontier = self.compute_next_frontier(&session_state, &ran_nodes, step);
        tracing::debug!(
            step,
            updated_channels = ?barrier_outcome.updated_channels,
            next_frontier = ?next_frontier,
            "superstep complete"
        );

        let completed = Self::is_terminal(&next_frontier);
        session_state.frontier = next_frontier.clone();
        self.sessions.insert(session_id.to_string(), session_state);
        self.maybe_checkpoint(session_id).await?;

        Ok(StepReport {
            step,
            ran_nodes,
            barrier_outcome,
            next_frontier,
            completed,
        })
    }

    /// Run until the frontier reaches End or empties out.
    #[instrument(skip(self, session_id), err)]
    pub async fn run_until_complete(
        &mut self,
        session_id: &str,
    ) -> Result<AgentState, RunnerError> {
        tracing::info!(session = %session_id, "run started");

        loop {
            let report = self.run_step(session_id).await?;
            if report.completed {
                break;
            }
        }

        let session_state =
            self.sessions
                .get(session_id)
                .ok_or_else(|| RunnerError::SessionNotFound {
                    session_id: session_id.to_string(),
                })?;
        tracing::info!(
            session = %session_id,
            step = session_state.step,
            messages = session_state.state.messages.len(),
            "run completed"
        );
        Ok(session_state.state.clone())
    }

    /// Snapshot of a live session, if present.
    #[must_use]
    pub fn get_session(&self, session_id: &str) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    /// All session ids this runner currently holds in memory.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<&String> {
        self.sessions.keys().collect()
    }
}
