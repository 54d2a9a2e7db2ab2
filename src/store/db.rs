//! PostgreSQL-backed cursor store.
//!
//! Table `sync_cursors` holds one row per job, the value as ISO-8601 text.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::error::{SyncError, SyncResult};
use crate::sync::CursorStore;

pub struct PgCursorStore {
    pool: PgPool,
}

impl PgCursorStore {
    pub async fn new(db_url: &str) -> SyncResult<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .map_err(|e| SyncError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> SyncResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_cursors (
                job_name        TEXT PRIMARY KEY,
                last_sync_time  TEXT NOT NULL,
                updated_at      TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CursorStore for PgCursorStore {
    async fn load(&self, job: &str) -> SyncResult<Option<String>> {
        let row = sqlx::query("SELECT last_sync_time FROM sync_cursors WHERE job_name = $1")
            .bind(job)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get(0)))
    }

    async fn save(&self, job: &str, value: &str) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_cursors (job_name, last_sync_time)
            VALUES ($1, $2)
            ON CONFLICT (job_name)
            DO UPDATE SET
                last_sync_time = EXCLUDED.last_sync_time,
                updated_at = NOW()
            "#,
        )
        .bind(job)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
