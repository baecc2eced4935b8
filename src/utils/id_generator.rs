use uuid::Uuid;

/// Generates unique identifiers for runs and sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// A fresh run id, e.g. `run-6f9619ff-8b86-4d01-b42d-00c04fc964ff`.
    #[must_use]
    pub fn generate_run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4())
    }

    /// A fresh thread id for conversational sessions.
    #[must_use]
    pub fn generate_thread_id(&self) -> String {
        format!("thread-{}", Uuid::new_v4())
    }
}
