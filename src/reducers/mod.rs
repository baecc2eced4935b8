//! Merge policy for state channels.
//!
//! Each channel has exactly one registered reducer, and every reducer in
//! this system appends. Corrections are new entries, never edits. That keeps
//! the merge deterministic: concatenate deltas in node order, no clobbering.

mod append;
mod reducer_registry;

pub use append::{AddErrors, AddMessages, AppendLog};
pub use reducer_registry::ReducerRegistry;

use crate::node::NodePartial;
use crate::state::AgentState;
use crate::types::ChannelType;
use std::fmt;

/// A reducer folds one channel's slice of a [`NodePartial`] into state.
pub trait Reducer: Send + Sync {
    fn apply(&self, state: &mut AgentState, update: &NodePartial);
}

#[derive(Debug)]
pub enum ReducerError {
    UnknownChannel(ChannelType),
}

impl fmt::Display for ReducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReducerError::UnknownChannel(channel) => {
                write!(f, "no reducer registered for channel: {channel}")
            }
        }
    }
}

impl std::error::Error for ReducerError {}
