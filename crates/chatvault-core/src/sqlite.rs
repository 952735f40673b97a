//! SQLite backend.
//!
//! The engine contract is blocking, while sqlx is async. The backend owns a
//! current-thread tokio runtime and drives every query with `block_on`, so it
//! must not be called from inside another tokio runtime.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendConfig};
use crate::error::{Error, Result};
use crate::schema::SCHEMA;
use crate::session::Session;

/// Session storage in a single SQLite database file.
#[derive(Debug)]
pub struct SqliteBackend {
    pool: SqlitePool,
    runtime: Runtime,
    path: PathBuf,
}

impl SqliteBackend {
    pub const TYPE: &'static str = "sqlite";

    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::io("starting database runtime", e))?;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = runtime.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;
            sqlx::raw_sql(SCHEMA).execute(&pool).await?;
            Ok::<_, Error>(pool)
        })?;

        info!(path = %path.display(), "SQLite session store ready");
        Ok(Self {
            pool,
            runtime,
            path: path.to_path_buf(),
        })
    }

    /// Registry constructor; reads the `path` setting.
    pub fn from_config(config: &BackendConfig) -> Result<Box<dyn Backend>> {
        Ok(Box::new(Self::open(&config.path()?)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored sessions.
    pub fn count(&self) -> Result<i64> {
        let count: (i64,) = self.runtime.block_on(
            sqlx::query_as("SELECT COUNT(*) FROM sessions").fetch_one(&self.pool),
        )?;
        Ok(count.0)
    }
}

impl Drop for SqliteBackend {
    fn drop(&mut self) {
        // block_on panics inside a runtime; let the pool drop on its own there.
        if tokio::runtime::Handle::try_current().is_err() {
            self.runtime.block_on(self.pool.close());
        }
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        Self::TYPE
    }

    fn save(&self, session: &mut Session) -> Result<()> {
        session.touch();
        let data = serde_json::to_string(session)?;

        self.runtime.block_on(
            sqlx::query(
                r#"
                INSERT INTO sessions (id, name, parent_id, created_at, updated_at, data)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    parent_id = excluded.parent_id,
                    updated_at = excluded.updated_at,
                    data = excluded.data
                "#,
            )
            .bind(&session.id)
            .bind(&session.name)
            .bind(&session.parent_id)
            .bind(session.created.timestamp())
            .bind(session.updated.timestamp())
            .bind(data)
            .execute(&self.pool),
        )?;

        debug!(session_id = %session.id, "Session saved");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Session> {
        let row = self.runtime.block_on(
            sqlx::query("SELECT data FROM sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool),
        )?;

        let Some(row) = row else {
            return Err(Error::session_not_found(id));
        };
        let session = serde_json::from_str(row.try_get::<&str, _>("data")?)?;
        debug!(session_id = %id, "Session loaded");
        Ok(session)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let result = self.runtime.block_on(
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(&self.pool),
        )?;

        if result.rows_affected() == 0 {
            return Err(Error::session_not_found(id));
        }
        debug!(session_id = %id, "Session deleted");
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let row = self.runtime.block_on(
            sqlx::query("SELECT 1 FROM sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool),
        )?;
        Ok(row.is_some())
    }

    fn load_all(&self) -> Result<Vec<Session>> {
        let rows = self.runtime.block_on(
            sqlx::query("SELECT id, data FROM sessions ORDER BY updated_at DESC")
                .fetch_all(&self.pool),
        )?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            match decode_row(&row) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    let id = row.try_get::<Option<String>, _>("id").ok().flatten();
                    warn!(
                        session_id = id.as_deref().unwrap_or("<unreadable>"),
                        error = %e,
                        "Skipping undecodable session row"
                    );
                }
            }
        }
        Ok(sessions)
    }
}

fn decode_row(row: &SqliteRow) -> Result<Session> {
    let data: &str = row.try_get("data")?;
    Ok(serde_json::from_str(data)?)
}
