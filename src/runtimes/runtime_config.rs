use crate::utils::id_generator::IdGenerator;

use super::CheckpointerType;

/// Default bound on per-node visits within one invocation.
pub const DEFAULT_STEP_LIMIT: u64 = 15;

/// Runtime settings baked into a compiled app.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Thread id for the next invocation; a random id is generated when
    /// absent.
    pub session_id: Option<String>,
    pub checkpointer: Option<CheckpointerType>,
    /// Database file name for the SQLite backend.
    pub sqlite_db_name: Option<String>,
    /// Invocation aborts once any node would exceed this many visits.
    pub step_limit: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_id: Some(IdGenerator::new().generate_run_id()),
            checkpointer: Some(CheckpointerType::InMemory),
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("SQLITE_DB_NAME").unwrap_or_else(|_| "ledgerweave.db".to_string()))
    }

    pub fn new(
        session_id: Option<String>,
        checkpointer: Option<CheckpointerType>,
        sqlite_db_name: Option<String>,
    ) -> Self {
        Self {
            session_id,
            checkpointer,
            sqlite_db_name: Self::resolve_sqlite_db_name(sqlite_db_name),
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    #[must_use]
    pub fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }
}
