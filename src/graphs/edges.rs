//! Edge types and routing predicates.

use crate::types::NodeKind;
use std::sync::Arc;

/// Predicate for conditional routing.
///
/// Takes a [`StateSnapshot`](crate::state::StateSnapshot) and returns the
/// name of the single next node. Returning `"End"` terminates the
/// invocation. The predicate must be pure: same snapshot, same answer.
///
/// # Examples
///
/// ```
/// use ledgerweave::graphs::EdgePredicate;
/// use std::sync::Arc;
///
/// // The agent-loop router: tools if the model asked for them, else End.
/// let route: EdgePredicate = Arc::new(|snapshot| {
///     match snapshot.last_message() {
///         Some(m) if m.requests_tools() => "tools".to_string(),
///         _ => "End".to_string(),
///     }
/// });
/// ```
pub type EdgePredicate =
    Arc<dyn Fn(crate::state::StateSnapshot) -> String + Send + Sync + 'static>;

/// A conditional edge: when execution leaves `from`, the predicate picks the
/// next node from the current state.
#[derive(Clone)]
pub struct ConditionalEdge {
    from: NodeKind,
    predicate: EdgePredicate,
}

impl ConditionalEdge {
    pub fn new(from: impl Into<NodeKind>, predicate: EdgePredicate) -> Self {
        Self {
            from: from.into(),
            predicate,
        }
    }

    pub fn from(&self) -> &NodeKind {
        &self.from
    }

    pub fn predicate(&self) -> &EdgePredicate {
        &self.predicate
    }
}
