//! Versioned state channels.
//!
//! A channel is an append-only collection with a version number. The version
//! is bumped by the barrier when a step actually updates the channel, which
//! gives checkpoints and tests a cheap way to detect change without diffing
//! contents.

pub mod errors;

use serde_json::Value;

use crate::message::Message;
use errors::ErrorEvent;

/// Common surface shared by all state channels.
pub trait Channel {
    type Item: Clone;

    /// Clone out the channel contents.
    fn snapshot(&self) -> Vec<Self::Item>;
    /// Current channel version. Starts at 1; bumped per updating barrier.
    fn version(&self) -> u32;
    /// Overwrite the version (used by barriers and checkpoint restore).
    fn set_version(&mut self, version: u32);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only versioned vector, the single channel representation used by
/// every state field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VecChannel<T> {
    items: Vec<T>,
    version: u32,
}

impl<T: Clone> VecChannel<T> {
    /// Creates a channel from existing items at the given version.
    #[must_use]
    pub fn new(items: Vec<T>, version: u32) -> Self {
        Self { items, version }
    }

    /// Read access to the underlying items.
    #[must_use]
    pub fn get(&self) -> &[T] {
        &self.items
    }

    /// Mutable access to the underlying items. Versions are not bumped here;
    /// that is the barrier's job.
    pub fn get_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }

    /// The most recently appended item, if any.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }
}

impl<T> Default for VecChannel<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            version: 1,
        }
    }
}

impl<T: Clone> Channel for VecChannel<T> {
    type Item = T;

    fn snapshot(&self) -> Vec<T> {
        self.items.clone()
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// The conversation history channel.
pub type MessagesChannel = VecChannel<Message>;
/// Domain accumulator channel: an append-only log of JSON values.
pub type LogChannel = VecChannel<Value>;
/// Recoverable error events collected during execution.
pub type ErrorsChannel = VecChannel<ErrorEvent>;
