//! Runtime configuration.
//!
//! Resolution order for the SQLite database name: explicit value, then the
//! `SQLITE_DB_NAME` environment variable (a `.env` file is honored via
//! `dotenvy`), then `civicflow.db`.

use uuid::Uuid;

use super::checkpointer::CheckpointerType;

/// Configuration attached to a compiled graph.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Session identifier used by [`App::invoke`](crate::app::App); façades
    /// supply their own composite keys instead.
    pub session_id: Option<String>,
    /// Which checkpointer backend to construct.
    pub checkpointer: Option<CheckpointerType>,
    /// Database name for the SQLite backend.
    pub sqlite_db_name: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            session_id: Some(format!("run-{}", Uuid::new_v4())),
            checkpointer: Some(CheckpointerType::InMemory),
            sqlite_db_name: Self::resolve_sqlite_db_name(None),
        }
    }
}

impl RuntimeConfig {
    fn resolve_sqlite_db_name(provided: Option<String>) -> Option<String> {
        if let Some(name) = provided {
            return Some(name);
        }
        dotenvy::dotenv().ok();
        Some(std::env::var("SQLITE_DB_NAME").unwrap_or_else(|_| "civicflow.db".to_string()))
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
        }
    }
}
