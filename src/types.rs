//! Core identifiers for the ledgerweave execution graph.
//!
//! This module defines the fundamental types used throughout the crate for
//! identifying nodes and state channels. For runtime execution types
//! (checkpoints, session state), see [`crate::runtimes`].
//!
//! # Key Types
//!
//! - [`NodeKind`]: Identifies a node in the execution graph
//! - [`ChannelType`]: Identifies a state channel and its merge policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within the execution graph.
///
/// `Start` and `End` are virtual endpoints: they are never registered or
/// executed, they only anchor the graph topology. Every executable node is a
/// `Custom` variant named by the application (for the agent loop: `"agent"`
/// and `"tools"`).
///
/// # Persistence
///
/// `NodeKind` supports serde serialization for checkpointing, plus the
/// [`encode`](Self::encode)/[`decode`](Self::decode) string form used in
/// stored frontiers.
///
/// # Examples
///
/// ```rust
/// use ledgerweave::types::NodeKind;
///
/// let agent = NodeKind::Custom("agent".to_string());
/// assert_eq!(agent.encode(), "Custom:agent");
/// assert_eq!(NodeKind::decode("Custom:agent"), agent);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual entry point; the initial frontier is whatever `Start` points at.
    Start,
    /// Virtual terminal node; reaching it completes the invocation.
    End,
    /// Executable node identified by a user-defined name, unique per graph.
    Custom(String),
}

impl NodeKind {
    /// Encode a NodeKind into its persisted string form.
    ///
    /// - `Start` → `"Start"`
    /// - `End` → `"End"`
    /// - `Custom("X")` → `"Custom:X"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => "Start".to_string(),
            NodeKind::End => "End".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode a persisted string form back into a NodeKind.
    ///
    /// Unrecognized formats fall back to `Custom(s)` so older checkpoints
    /// keep round-tripping.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            NodeKind::Start
        } else if s == "End" {
            NodeKind::End
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    /// Returns `true` if this is the virtual [`Start`](Self::Start) node.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is the virtual [`End`](Self::End) node.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

// Allow string literals where a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

/// Identifies a state channel within [`AgentState`](crate::state::AgentState).
///
/// Every channel has exactly one merge policy, applied by the reducer
/// registered for it. All channels in this system append: corrections are
/// expressed as new entries, never as mutation of history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// The ordered conversation: user, assistant, and tool-result messages.
    Message,
    /// Expense records produced by tool executions.
    Expense,
    /// Spending-limit entries. Semantically single-valued but kept as an
    /// append-only log; the current limit is the last entry.
    SpendingLimit,
    /// Category labels assigned while logging expenses.
    SpendingCategory,
    /// Budget alerts raised by tools.
    Alert,
    /// Recoverable error events collected during execution.
    Error,
}

impl ChannelType {
    /// Stable channel name used in logs and barrier reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "messages",
            Self::Expense => "expenses",
            Self::SpendingLimit => "spending_limits",
            Self::SpendingCategory => "spending_categories",
            Self::Alert => "alerts",
            Self::Error => "errors",
        }
    }

    /// All channels, in the order barriers report them.
    #[must_use]
    pub fn all() -> [ChannelType; 6] {
        [
            Self::Message,
            Self::Expense,
            Self::SpendingLimit,
            Self::SpendingCategory,
            Self::Alert,
            Self::Error,
        ]
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kind_encode_decode_roundtrip() {
        for kind in [
            NodeKind::Start,
            NodeKind::End,
            NodeKind::Custom("agent".into()),
        ] {
            assert_eq!(NodeKind::decode(&kind.encode()), kind);
        }
    }

    #[test]
    fn unknown_encoding_becomes_custom() {
        assert_eq!(NodeKind::decode("agent"), NodeKind::Custom("agent".into()));
    }

    #[test]
    fn from_str_recognizes_virtual_endpoints() {
        assert_eq!(NodeKind::from("Start"), NodeKind::Start);
        assert_eq!(NodeKind::from("End"), NodeKind::End);
        assert_eq!(NodeKind::from("tools"), NodeKind::Custom("tools".into()));
    }
}
