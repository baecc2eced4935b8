//! Versioned agent state.
//!
//! The agent's memory is split into independent channels, each an append-only
//! versioned collection. Nodes never touch state directly: they read an
//! immutable [`StateSnapshot`] and return deltas that the barrier merges via
//! registered reducers.
//!
//! # Channels
//!
//! - **messages**: the ordered conversation
//! - **expenses**: expense records produced by tools
//! - **spending_limits**: limit entries; the current limit is the last one
//! - **spending_categories**: category labels assigned while logging expenses
//! - **alerts**: budget alerts raised by tools
//! - **errors**: recoverable error events

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::{Channel, ErrorsChannel, LogChannel, MessagesChannel, errors::ErrorEvent};
use crate::message::Message;

/// The complete mutable state of one agent thread.
///
/// # Examples
///
/// ```rust
/// use ledgerweave::state::AgentState;
///
/// let state = AgentState::new_with_user_message("I spent $40 on groceries");
/// let snapshot = state.snapshot();
/// assert_eq!(snapshot.messages.len(), 1);
/// assert_eq!(snapshot.versions.messages, 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AgentState {
    pub messages: MessagesChannel,
    pub expenses: LogChannel,
    pub spending_limits: LogChannel,
    pub spending_categories: LogChannel,
    pub alerts: LogChannel,
    pub errors: ErrorsChannel,
}

/// Version numbers for every channel, captured together so a snapshot or a
/// checkpoint can tell exactly which channels have moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVersions {
    pub messages: u32,
    pub expenses: u32,
    pub spending_limits: u32,
    pub spending_categories: u32,
    pub alerts: u32,
    pub errors: u32,
}

impl Default for ChannelVersions {
    fn default() -> Self {
        Self {
            messages: 1,
            expenses: 1,
            spending_limits: 1,
            spending_categories: 1,
            alerts: 1,
            errors: 1,
        }
    }
}

/// Immutable point-in-time view of an [`AgentState`].
///
/// Handed to nodes and edge predicates during execution. Snapshots are
/// independent clones, so later barrier merges never change what a node saw.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    pub messages: Vec<Message>,
    pub expenses: Vec<Value>,
    pub spending_limits: Vec<Value>,
    pub spending_categories: Vec<Value>,
    pub alerts: Vec<Value>,
    pub errors: Vec<ErrorEvent>,
    pub versions: ChannelVersions,
}

impl StateSnapshot {
    /// The most recent message, if any. Routing decisions key off this.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

impl AgentState {
    /// Creates a state seeded with a single user message.
    ///
    /// This is the entry point for a fresh thread: one user message, every
    /// other channel empty, all versions at 1.
    pub fn new_with_user_message(user_text: &str) -> Self {
        Self {
            messages: MessagesChannel::new(vec![Message::user(user_text)], 1),
            ..Self::default()
        }
    }

    /// Fluent builder for states with richer initial contents, mostly used
    /// by tests and demos.
    pub fn builder() -> AgentStateBuilder {
        AgentStateBuilder::default()
    }

    /// Appends a message without bumping the channel version; version bumps
    /// belong to the barrier.
    pub fn add_message(&mut self, message: Message) -> &mut Self {
        self.messages.get_mut().push(message);
        self
    }

    /// Clones out an immutable snapshot of every channel plus versions.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            messages: self.messages.snapshot(),
            expenses: self.expenses.snapshot(),
            spending_limits: self.spending_limits.snapshot(),
            spending_categories: self.spending_categories.snapshot(),
            alerts: self.alerts.snapshot(),
            errors: self.errors.snapshot(),
            versions: self.versions(),
        }
    }

    /// Current version of every channel.
    #[must_use]
    pub fn versions(&self) -> ChannelVersions {
        ChannelVersions {
            messages: self.messages.version(),
            expenses: self.expenses.version(),
            spending_limits: self.spending_limits.version(),
            spending_categories: self.spending_categories.version(),
            alerts: self.alerts.version(),
            errors: self.errors.version(),
        }
    }
}

/// Builder for [`AgentState`] with pre-populated channels.
///
/// ```rust
/// use ledgerweave::state::AgentState;
/// use serde_json::json;
///
/// let state = AgentState::builder()
///     .with_user_message("How much did I spend this week?")
///     .with_expense(json!({"amount": 25.0, "category": "food"}))
///     .with_spending_limit(json!({"limit": 500.0}))
///     .build();
///
/// let snapshot = state.snapshot();
/// assert_eq!(snapshot.expenses.len(), 1);
/// assert_eq!(snapshot.spending_limits.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AgentStateBuilder {
    messages: Vec<Message>,
    expenses: Vec<Value>,
    spending_limits: Vec<Value>,
    spending_categories: Vec<Value>,
    alerts: Vec<Value>,
}

impl AgentStateBuilder {
    pub fn with_user_message(mut self, content: &str) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn with_assistant_message(mut self, content: &str) -> Self {
        self.messages.push(Message::assistant(content));
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_expense(mut self, expense: Value) -> Self {
        self.expenses.push(expense);
        self
    }

    pub fn with_spending_limit(mut self, limit: Value) -> Self {
        self.spending_limits.push(limit);
        self
    }

    pub fn with_spending_category(mut self, category: Value) -> Self {
        self.spending_categories.push(category);
        self
    }

    pub fn with_alert(mut self, alert: Value) -> Self {
        self.alerts.push(alert);
        self
    }

    pub fn build(self) -> AgentState {
        AgentState {
            messages: MessagesChannel::new(self.messages, 1),
            expenses: LogChannel::new(self.expenses, 1),
            spending_limits: LogChannel::new(self.spending_limits, 1),
            spending_categories: LogChannel::new(self.spending_categories, 1),
            alerts: LogChannel::new(self.alerts, 1),
            errors: ErrorsChannel::default(),
        }
    }
}
