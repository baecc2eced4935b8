/*!
SQLite checkpointer.

Durable thread storage backed by a single `threads` table, one row per
thread, overwritten in place on every save. The engine never needs step
history; resuming only reads the latest snapshot.

Serialization goes through the persistence models (see
`runtimes::persistence`); this module is database I/O only.

When the `sqlite-migrations` feature is enabled (default), embedded
migrations run on connect. Disabling the feature assumes external schema
management.
*/

use std::sync::Arc;

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;

use crate::runtimes::checkpointer::{Checkpoint, Checkpointer, CheckpointerError, Result};
use crate::runtimes::persistence::{PersistedCheckpoint, PersistedState};

/// SQLite-backed checkpointer, one row per thread.
pub struct SqliteCheckpointer {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteCheckpointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointer").finish()
    }
}

fn backend_err(context: &str, e: impl std::fmt::Display) -> CheckpointerError {
    CheckpointerError::Backend {
        message: format!("{context}: {e}"),
    }
}

fn serde_err(context: &str, e: impl std::fmt::Display) -> CheckpointerError {
    CheckpointerError::Serde {
        message: format!("{context}: {e}"),
    }
}

impl SqliteCheckpointer {
    /// Connect to (or create) a SQLite database.
    /// Example URL: `sqlite://ledgerweave.db`.
    #[must_use = "checkpointer must be used to persist state"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| backend_err("connect", e))?;
        #[cfg(feature = "sqlite-migrations")]
        {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| backend_err("migration", e))?;
        }
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait::async_trait]
impl Checkpointer for SqliteCheckpointer {
    #[instrument(skip(self, checkpoint), err)]
    async fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let persisted = PersistedCheckpoint::from(&checkpoint);
        let state_json =
            serde_json::to_string(&persisted.state).map_err(|e| serde_err("state", e))?;
        let frontier_json =
            serde_json::to_string(&persisted.frontier).map_err(|e| serde_err("frontier", e))?;
        let node_visits_json = serde_json::to_string(&persisted.node_visits)
            .map_err(|e| serde_err("node_visits", e))?;

        sqlx::query(
            r#"
            INSERT INTO threads (id, step, state_json, frontier_json, node_visits_json, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                step = excluded.step,
                state_json = excluded.state_json,
                frontier_json = excluded.frontier_json,
                node_visits_json = excluded.node_visits_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&persisted.session_id)
        .bind(persisted.step as i64)
        .bind(&state_json)
        .bind(&frontier_json)
        .bind(&node_visits_json)
        .bind(&persisted.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| backend_err("upsert thread", e))?;

        Ok(())
    }

    #[instrument(skip(self, session_id), err)]
    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let row_opt: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT id, step, state_json, frontier_json, node_visits_json, updated_at
            FROM threads
            WHERE id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| backend_err("select thread", e))?;

        let Some(row) = row_opt else {
            return Ok(None);
        };

        let step: i64 = row.get("step");
        let state_json: String = row.get("state_json");
        let frontier_json: String = row.get("frontier_json");
        let node_visits_json: String = row.get("node_visits_json");
        let updated_at: String = row.get("updated_at");

        let state: PersistedState =
            serde_json::from_str(&state_json).map_err(|e| serde_err("state", e))?;
        let frontier: Vec<String> =
            serde_json::from_str(&frontier_json).map_err(|e| serde_err("frontier", e))?;
        let node_visits =
            serde_json::from_str(&node_visits_json).map_err(|e| serde_err("node_visits", e))?;

        let persisted = PersistedCheckpoint {
            session_id: session_id.to_string(),
            step: step as u64,
            state,
            frontier,
            node_visits,
            created_at: updated_at,
        };
        Ok(Some(Checkpoint::from(persisted)))
    }

    #[instrument(skip(self), err)]
    async fn list_sessions(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM threads
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| backend_err("list threads", e))?;

        Ok(rows.into_iter().map(|r| r.get::<String, _>("id")).collect())
    }
}
