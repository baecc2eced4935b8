/*!
Persistence primitives for serializing runtime state and checkpoints.

Serde-friendly shapes are kept separate from the in-memory types so the
stored format can evolve without touching execution code. Conversion logic
lives here (From / TryFrom impls), keeping checkpointer code lean. This
module performs no I/O.

Unknown NodeKind encodings round-trip as `NodeKind::Custom(encoded_string)`
for forward compatibility.
*/

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    channels::{Channel, ErrorsChannel, LogChannel, MessagesChannel, errors::ErrorEvent},
    message::Message,
    runtimes::checkpointer::Checkpoint,
    state::AgentState,
    types::NodeKind,
};

/// Versioned vector channel in its stored form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedVecChannel<T> {
    pub version: u32,
    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> Default for PersistedVecChannel<T> {
    fn default() -> Self {
        Self {
            version: 1,
            items: Vec::new(),
        }
    }
}

/// Complete persisted shape of the in-memory [`AgentState`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PersistedState {
    pub messages: PersistedVecChannel<Message>,
    #[serde(default)]
    pub expenses: PersistedVecChannel<Value>,
    #[serde(default)]
    pub spending_limits: PersistedVecChannel<Value>,
    #[serde(default)]
    pub spending_categories: PersistedVecChannel<Value>,
    #[serde(default)]
    pub alerts: PersistedVecChannel<Value>,
    #[serde(default)]
    pub errors: PersistedVecChannel<ErrorEvent>,
}

/// Full persisted checkpoint representation: one row per thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub session_id: String,
    pub step: u64,
    pub state: PersistedState,
    /// Frontier encoded via `NodeKind::encode()`.
    pub frontier: Vec<String>,
    /// Per-node visit counts, keyed by encoded node kind.
    #[serde(default)]
    pub node_visits: FxHashMap<String, u64>,
    /// RFC3339 creation time, keeping chrono out of the serialized shape.
    pub created_at: String,
}

#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("missing field: {0}")]
    #[diagnostic(
        code(ledgerweave::persistence::missing_field),
        help("Populate the field in the persisted JSON before conversion.")
    )]
    MissingField(&'static str),

    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(ledgerweave::persistence::serde),
        help("Ensure the JSON structure matches the Persisted* types.")
    )]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

fn persist_vec<T: Clone>(channel: &impl Channel<Item = T>) -> PersistedVecChannel<T> {
    PersistedVecChannel {
        version: channel.version(),
        items: channel.snapshot(),
    }
}

impl From<&AgentState> for PersistedState {
    fn from(s: &AgentState) -> Self {
        PersistedState {
            messages: persist_vec(&s.messages),
            expenses: persist_vec(&s.expenses),
            spending_limits: persist_vec(&s.spending_limits),
            spending_categories: persist_vec(&s.spending_categories),
            alerts: persist_vec(&s.alerts),
            errors: persist_vec(&s.errors),
        }
    }
}

impl From<PersistedState> for AgentState {
    fn from(p: PersistedState) -> Self {
        AgentState {
            messages: MessagesChannel::new(p.messages.items, p.messages.version),
            expenses: LogChannel::new(p.expenses.items, p.expenses.version),
            spending_limits: LogChannel::new(p.spending_limits.items, p.spending_limits.version),
            spending_categories: LogChannel::new(
                p.spending_categories.items,
                p.spending_categories.version,
            ),
            alerts: LogChannel::new(p.alerts.items, p.alerts.version),
            errors: ErrorsChannel::new(p.errors.items, p.errors.version),
        }
    }
}

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            session_id: cp.session_id.clone(),
            step: cp.step,
            state: PersistedState::from(&cp.state),
            frontier: cp.frontier.iter().map(NodeKind::encode).collect(),
            node_visits: cp.node_visits.clone(),
            created_at: cp.created_at.to_rfc3339(),
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(p: PersistedCheckpoint) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Checkpoint {
            session_id: p.session_id,
            step: p.step,
            state: AgentState::from(p.state),
            frontier: p.frontier.iter().map(|s| NodeKind::decode(s)).collect(),
            node_visits: p.node_visits,
            created_at,
        }
    }
}
