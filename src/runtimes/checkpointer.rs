//! Pluggable checkpoint persistence.
//!
//! A checkpoint is the full durable footprint of one thread: state, step
//! counter, frontier, and per-node visit counts. Each save overwrites the
//! previous checkpoint for that thread; the engine only ever resumes from
//! the latest snapshot.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::runtimes::runner::SessionState;
use crate::state::AgentState;
use crate::types::NodeKind;

pub type Result<T> = std::result::Result<T, CheckpointerError>;

/// Everything needed to resume a thread.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub session_id: String,
    /// Cumulative superstep counter across all invocations of this thread.
    pub step: u64,
    pub state: AgentState,
    /// Nodes due to run next. Empty or all-End means the last invocation
    /// finished cleanly.
    pub frontier: Vec<NodeKind>,
    /// Visit counts for the current invocation, keyed by encoded node kind.
    pub node_visits: FxHashMap<String, u64>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Capture a checkpoint from live session state.
    #[must_use]
    pub fn from_session(session_id: &str, session: &SessionState) -> Self {
        Self {
            session_id: session_id.to_string(),
            step: session.step,
            state: session.state.clone(),
            frontier: session.frontier.clone(),
            node_visits: session.node_visits.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Rebuild live session state from a stored checkpoint.
#[must_use]
pub fn restore_session_state(checkpoint: &Checkpoint) -> SessionState {
    SessionState {
        state: checkpoint.state.clone(),
        step: checkpoint.step,
        frontier: checkpoint.frontier.clone(),
        node_visits: checkpoint.node_visits.clone(),
    }
}

/// Persistence seam for thread checkpoints.
///
/// Implementations overwrite in place: `save` replaces whatever was stored
/// for the checkpoint's session id.
#[async_trait::async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()>;
    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>>;
    async fn list_sessions(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointerError {
    #[error("checkpoint backend error: {message}")]
    #[diagnostic(code(ledgerweave::checkpointer::backend))]
    Backend { message: String },

    #[error("checkpoint serialization error: {message}")]
    #[diagnostic(
        code(ledgerweave::checkpointer::serde),
        help("Stored JSON does not match the persisted checkpoint shape.")
    )]
    Serde { message: String },

    #[error("checkpointer error: {message}")]
    #[diagnostic(code(ledgerweave::checkpointer::other))]
    Other { message: String },
}

/// Which persistence backend a runner should use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckpointerType {
    /// Volatile storage; threads live as long as the checkpointer instance.
    InMemory,
    /// Durable SQLite-backed storage.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl CheckpointerType {
    /// Build the concrete checkpointer for this type.
    ///
    /// For SQLite the database URL resolves in order: the
    /// `LEDGERWEAVE_SQLITE_URL` environment variable, then
    /// `sqlite://<sqlite_db_name>`, then `sqlite://ledgerweave.db`. The
    /// database file is created up front so a fresh URL connects cleanly.
    pub async fn build(
        &self,
        sqlite_db_name: Option<String>,
    ) -> Result<Arc<dyn Checkpointer>> {
        match self {
            CheckpointerType::InMemory => Ok(Arc::new(InMemoryCheckpointer::new())),
            #[cfg(feature = "sqlite")]
            CheckpointerType::Sqlite => {
                let db_url = std::env::var("LEDGERWEAVE_SQLITE_URL")
                    .ok()
                    .or_else(|| {
                        sqlite_db_name
                            .as_ref()
                            .map(|name| format!("sqlite://{name}"))
                    })
                    .unwrap_or_else(|| "sqlite://ledgerweave.db".to_string());
                if let Some(path) = db_url.strip_prefix("sqlite://") {
                    let path = path.trim();
                    if !path.is_empty() && path != ":memory:" {
                        let p = std::path::Path::new(path);
                        if let Some(parent) = p.parent() {
                            let _ = std::fs::create_dir_all(parent);
                        }
                        if !p.exists() {
                            let _ = std::fs::File::create_new(p);
                        }
                    }
                }
                let cp = crate::runtimes::SqliteCheckpointer::connect(&db_url).await?;
                Ok(Arc::new(cp) as Arc<dyn Checkpointer>)
            }
        }
    }
}

/// Volatile checkpointer keyed by session id, one checkpoint per thread.
#[derive(Default)]
pub struct InMemoryCheckpointer {
    store: RwLock<FxHashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        self.store
            .write()
            .await
            .insert(checkpoint.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.store.read().await.get(session_id).cloned())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.store.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
