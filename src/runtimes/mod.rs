//! Runtime infrastructure: sessions, checkpointing, and the execution loop.
//!
//! The runtime layer drives a compiled [`App`](crate::app::App) step by step
//! and persists progress so a thread can be resumed later:
//!
//! - **[`AppRunner`]** owns sessions and executes supersteps
//! - **[`Checkpointer`]** is the pluggable persistence seam
//! - **[`InMemoryCheckpointer`]** for tests and ephemeral runs
//! - **[`SqliteCheckpointer`]** for durable thread storage
//!
//! ```rust,no_run
//! use ledgerweave::runtimes::{AppRunner, CheckpointerType};
//! use ledgerweave::state::AgentState;
//! # use ledgerweave::app::App;
//! # async fn example(app: App) -> Result<(), Box<dyn std::error::Error>> {
//! let mut runner = AppRunner::new(app, CheckpointerType::InMemory).await?;
//! runner
//!     .create_session("thread-1".to_string(), AgentState::new_with_user_message("Hello"))
//!     .await?;
//! let final_state = runner.run_until_complete("thread-1").await?;
//! # Ok(())
//! # }
//! ```

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod persistence;
pub mod runner;
pub mod runtime_config;

pub use checkpointer::{
    Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, InMemoryCheckpointer,
    restore_session_state,
};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SqliteCheckpointer;
pub use persistence::{PersistedCheckpoint, PersistedState, PersistedVecChannel, PersistenceError};
pub use runner::{AppRunner, SessionInit, SessionState, StepReport};
pub use runtime_config::RuntimeConfig;
