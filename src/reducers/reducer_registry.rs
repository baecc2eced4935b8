use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::{
    node::NodePartial,
    reducers::{AddErrors, AddMessages, AppendLog, Reducer, ReducerError},
    state::AgentState,
    types::ChannelType,
};
use tracing::instrument;

/// Maps each channel to its reducer. The default registry wires every
/// channel to its append reducer; applications normally never rebuild it.
#[derive(Clone)]
pub struct ReducerRegistry {
    reducer_map: FxHashMap<ChannelType, Arc<dyn Reducer>>,
}

/// Whether a partial carries data for this channel. Lets the registry skip
/// reducers with nothing to do, which also keeps versions from bumping on
/// empty updates.
fn channel_guard(channel: &ChannelType, partial: &NodePartial) -> bool {
    fn some_nonempty<T>(v: &Option<Vec<T>>) -> bool {
        v.as_ref().is_some_and(|v| !v.is_empty())
    }
    match channel {
        ChannelType::Message => some_nonempty(&partial.messages),
        ChannelType::Expense => some_nonempty(&partial.expenses),
        ChannelType::SpendingLimit => some_nonempty(&partial.spending_limits),
        ChannelType::SpendingCategory => some_nonempty(&partial.spending_categories),
        ChannelType::Alert => some_nonempty(&partial.alerts),
        ChannelType::Error => some_nonempty(&partial.errors),
    }
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry
            .register(ChannelType::Message, Arc::new(AddMessages))
            .register(
                ChannelType::Expense,
                Arc::new(AppendLog::for_channel(ChannelType::Expense)),
            )
            .register(
                ChannelType::SpendingLimit,
                Arc::new(AppendLog::for_channel(ChannelType::SpendingLimit)),
            )
            .register(
                ChannelType::SpendingCategory,
                Arc::new(AppendLog::for_channel(ChannelType::SpendingCategory)),
            )
            .register(
                ChannelType::Alert,
                Arc::new(AppendLog::for_channel(ChannelType::Alert)),
            )
            .register(ChannelType::Error, Arc::new(AddErrors));
        registry
    }
}

impl ReducerRegistry {
    pub fn new() -> Self {
        Self {
            reducer_map: FxHashMap::default(),
        }
    }

    /// Registers a reducer for a channel, replacing any existing one.
    pub fn register(&mut self, channel: ChannelType, reducer: Arc<dyn Reducer>) -> &mut Self {
        self.reducer_map.insert(channel, reducer);
        self
    }

    /// Applies the reducer for one channel if the partial has data for it.
    ///
    /// Returns `true` when the channel was actually updated, so the barrier
    /// knows whether to bump its version.
    #[instrument(skip(self, state, to_update), err)]
    pub fn try_update(
        &self,
        channel_type: ChannelType,
        state: &mut AgentState,
        to_update: &NodePartial,
    ) -> Result<bool, ReducerError> {
        if !channel_guard(&channel_type, to_update) {
            return Ok(false);
        }

        match self.reducer_map.get(&channel_type) {
            Some(reducer) => {
                reducer.apply(state, to_update);
                Ok(true)
            }
            None => Err(ReducerError::UnknownChannel(channel_type)),
        }
    }
}
