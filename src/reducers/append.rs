use super::Reducer;
use crate::{node::NodePartial, state::AgentState, types::ChannelType};

/// Appends delta messages to the conversation in delta order.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddMessages;

impl Reducer for AddMessages {
    fn apply(&self, state: &mut AgentState, update: &NodePartial) {
        if let Some(messages) = &update.messages
            && !messages.is_empty()
        {
            state.messages.get_mut().extend(messages.iter().cloned());
        }
    }
}

/// Appends recoverable error events.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AddErrors;

impl Reducer for AddErrors {
    fn apply(&self, state: &mut AgentState, update: &NodePartial) {
        if let Some(errors) = &update.errors
            && !errors.is_empty()
        {
            state.errors.get_mut().extend(errors.iter().cloned());
        }
    }
}

/// Append reducer for the JSON log channels, parameterized by which channel
/// it serves. One instance per log channel is registered by the default
/// registry.
///
/// The spending-limits channel is deliberately included: although the limit
/// is semantically single-valued, it is stored as a log and the newest entry
/// wins on read.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct AppendLog {
    channel: ChannelType,
}

impl AppendLog {
    /// Builds an append reducer for one of the JSON log channels. Passing a
    /// non-log channel yields a reducer that never applies anything.
    #[must_use]
    pub fn for_channel(channel: ChannelType) -> Self {
        Self { channel }
    }
}

impl Reducer for AppendLog {
    fn apply(&self, state: &mut AgentState, update: &NodePartial) {
        let (delta, target) = match self.channel {
            ChannelType::Expense => (&update.expenses, &mut state.expenses),
            ChannelType::SpendingLimit => (&update.spending_limits, &mut state.spending_limits),
            ChannelType::SpendingCategory => {
                (&update.spending_categories, &mut state.spending_categories)
            }
            ChannelType::Alert => (&update.alerts, &mut state.alerts),
            ChannelType::Message | ChannelType::Error => return,
        };
        if let Some(values) = delta
            && !values.is_empty()
        {
            target.get_mut().extend(values.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Channel;
    use crate::message::Message;
    use serde_json::json;

    #[test]
    fn add_messages_appends_in_delta_order() {
        let mut state = AgentState::new_with_user_message("hi");
        let update = NodePartial::new().with_messages(vec![
            Message::assistant("one"),
            Message::tool("c1", "two"),
        ]);
        AddMessages.apply(&mut state, &update);

        let messages = state.messages.snapshot();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "one");
        assert_eq!(messages[2].content, "two");
    }

    #[test]
    fn append_log_targets_its_own_channel() {
        let mut state = AgentState::default();
        let update = NodePartial::new()
            .with_expenses(vec![json!({"amount": 12.5})])
            .with_alerts(vec![json!({"message": "over budget"})]);

        AppendLog::for_channel(ChannelType::Expense).apply(&mut state, &update);
        assert_eq!(state.expenses.len(), 1);
        assert!(state.alerts.is_empty());

        AppendLog::for_channel(ChannelType::Alert).apply(&mut state, &update);
        assert_eq!(state.alerts.len(), 1);
    }

    #[test]
    fn spending_limits_accumulate_as_a_log() {
        let mut state = AgentState::default();
        let reducer = AppendLog::for_channel(ChannelType::SpendingLimit);
        reducer.apply(
            &mut state,
            &NodePartial::new().with_spending_limits(vec![json!({"limit": 500.0})]),
        );
        reducer.apply(
            &mut state,
            &NodePartial::new().with_spending_limits(vec![json!({"limit": 300.0})]),
        );

        let limits = state.spending_limits.snapshot();
        assert_eq!(limits.len(), 2);
        // Newest entry wins on read.
        assert_eq!(limits.last(), Some(&json!({"limit": 300.0})));
    }
}
