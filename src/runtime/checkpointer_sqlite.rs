//! SQLite-backed checkpointer.
//!
//! Stores the full step history (`steps`) plus a denormalized latest row per
//! session (`sessions`), so `load_latest` is a single-row read. Serialization
//! goes through the persistence models in [`super::persistence`]; this module
//! is database I/O only.
//!
//! With the default `sqlite-migrations` feature, embedded migrations run on
//! connect (idempotent). Disabling the feature assumes the schema is managed
//! externally.
//!
//! Storage grows with `sessions × steps × state size`; long-running
//! deployments should prune old step rows (`created_at` supports time-based
//! policies) and `VACUUM` periodically.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};
use tracing::instrument;

use crate::state::Domain;

use super::checkpointer::{Checkpoint, Checkpointer, CheckpointerError, Result};
use super::persistence::{PersistedCheckpoint, PersistedState, from_json, to_json};

/// Bounded-pool defaults; exhaustion surfaces as a retryable backend error.
const MAX_CONNECTIONS: u32 = 8;
const ACQUIRE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Durable checkpointer over a SQLite connection pool.
pub struct SqliteCheckpointer<S> {
    pool: Arc<SqlitePool>,
    _domain: PhantomData<fn() -> S>,
}

impl<S> std::fmt::Debug for SqliteCheckpointer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointer").finish()
    }
}

impl<S: Domain> SqliteCheckpointer<S> {
    /// Connect (or create) a SQLite database at `database_url`, e.g.
    /// `sqlite://civicflow.db`.
    #[must_use = "checkpointer must be used to persist state"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        // The sqlite driver will not create the file on its own.
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.trim();
            if !path.is_empty() && path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if !p.exists() {
                    let _ = std::fs::File::create_new(p);
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("connect error: {e}"),
            })?;

        #[cfg(feature = "sqlite-migrations")]
        {
            if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
                return Err(CheckpointerError::Backend {
                    message: format!("migration failure: {e}"),
                });
            }
        }

        Ok(Self {
            pool: Arc::new(pool),
            _domain: PhantomData,
        })
    }
}

#[async_trait]
impl<S: Domain> Checkpointer<S> for SqliteCheckpointer<S> {
    #[instrument(skip(self, checkpoint), fields(session = %checkpoint.session_id, step = checkpoint.step), err)]
    async fn save(&self, checkpoint: Checkpoint<S>) -> Result<()> {
        let state_json = to_json(&PersistedState::from(&checkpoint.state), "state")?;
        let cursor = checkpoint.cursor.encode();
        let created_at = checkpoint.created_at.to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("tx begin: {e}"),
            })?;

        sqlx::query("INSERT OR IGNORE INTO sessions (id) VALUES (?1)")
            .bind(&checkpoint.session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("insert session: {e}"),
            })?;

        // Idempotent re-save of the same step is allowed (retry after a crash
        // between the step write and the session update).
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO steps (session_id, step, cursor, state_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&checkpoint.session_id)
        .bind(checkpoint.step as i64)
        .bind(&cursor)
        .bind(&state_json)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("insert step: {e}"),
        })?;

        sqlx::query(
            r#"
            UPDATE sessions
            SET last_step = ?2, last_cursor = ?3, last_state_json = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&checkpoint.session_id)
        .bind(checkpoint.step as i64)
        .bind(&cursor)
        .bind(&state_json)
        .bind(&created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("update session: {e}"),
        })?;

        tx.commit().await.map_err(|e| CheckpointerError::Backend {
            message: format!("tx commit: {e}"),
        })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn load_latest(&self, session_id: &str) -> Result<Option<Checkpoint<S>>> {
        let row = sqlx::query(
            r#"
            SELECT last_step, last_cursor, last_state_json, updated_at
            FROM sessions WHERE id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointerError::Backend {
            message: format!("select latest: {e}"),
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_json: Option<String> = row.get("last_state_json");
        let cursor: Option<String> = row.get("last_cursor");
        let (Some(state_json), Some(cursor)) = (state_json, cursor) else {
            // Session row exists but nothing has been checkpointed yet.
            return Ok(None);
        };

        let last_step: i64 = row.get("last_step");
        let updated_at: String = row.get("updated_at");

        let persisted: PersistedState<S> = from_json(&state_json, "state")?;
        let restored = PersistedCheckpoint {
            session_id: session_id.to_string(),
            step: last_step as u64,
            state: persisted,
            cursor,
            created_at: updated_at,
        };
        Ok(Some(Checkpoint::from(restored)))
    }

    #[instrument(skip(self), err)]
    async fn list_sessions(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM sessions ORDER BY updated_at DESC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| CheckpointerError::Backend {
                message: format!("list sessions: {e}"),
            })?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("id")).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
