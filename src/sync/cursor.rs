//! Per-job high-water marks for delta synchronisation.
//!
//! A cursor is read before a run to get the lower bound of the fetch window
//! and written after a clean run with the upper bound. It never moves
//! backwards.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};

/// Key-value persistence for cursors: job name to ISO-8601 timestamp.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// The raw stored value, if any.
    async fn load(&self, job: &str) -> SyncResult<Option<String>>;

    async fn save(&self, job: &str, value: &str) -> SyncResult<()>;
}

pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_timestamp(job: &str, raw: &str) -> SyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SyncError::Cursor(format!("stored cursor for {job} is not a timestamp ({raw:?}): {e}")))
}

/// Cursor access with a default start date and the no-regression rule.
#[derive(Clone)]
pub struct SyncCursor {
    store: Arc<dyn CursorStore>,
    default_start: DateTime<Utc>,
}

impl SyncCursor {
    pub fn new(store: Arc<dyn CursorStore>, default_start: DateTime<Utc>) -> Self {
        Self {
            store,
            default_start,
        }
    }

    async fn stored(&self, job: &str) -> SyncResult<Option<DateTime<Utc>>> {
        match self.store.load(job).await? {
            Some(raw) => decode_timestamp(job, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Lower bound for the next window of `job`.
    pub async fn get_last_run(&self, job: &str) -> SyncResult<DateTime<Utc>> {
        Ok(self.stored(job).await?.unwrap_or(self.default_start))
    }

    /// Record `at` as the new high-water mark for `job`.
    ///
    /// Returns `false` without writing when `at` is older than the stored value.
    pub async fn set_last_run(&self, job: &str, at: DateTime<Utc>) -> SyncResult<bool> {
        if let Some(current) = self.stored(job).await? {
            if at < current {
                warn!(
                    "Ignoring cursor regression for {job}: {} is older than {}",
                    encode_timestamp(at),
                    encode_timestamp(current)
                );
                return Ok(false);
            }
        }

        self.store.save(job, &encode_timestamp(at)).await?;
        info!("Cursor for {job} advanced to {}", encode_timestamp(at));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCursorStore;
    use chrono::{Duration, TimeZone};

    fn default_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn cursor() -> (Arc<MemoryCursorStore>, SyncCursor) {
        let store = Arc::new(MemoryCursorStore::new());
        (store.clone(), SyncCursor::new(store, default_start()))
    }

    #[tokio::test]
    async fn test_missing_cursor_uses_default_start() {
        let (_, cursor) = cursor();
        assert_eq!(cursor.get_last_run("update-rrepw-prns").await.unwrap(), default_start());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (store, cursor) = cursor();
        let at = default_start() + Duration::days(3);

        assert!(cursor.set_last_run("update-rrepw-prns", at).await.unwrap());
        assert_eq!(cursor.get_last_run("update-rrepw-prns").await.unwrap(), at);
        assert_eq!(
            store.load("update-rrepw-prns").await.unwrap().as_deref(),
            Some("2024-01-04T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_cursor_never_regresses() {
        let (_, cursor) = cursor();
        let later = default_start() + Duration::days(5);

        cursor.set_last_run("job", later).await.unwrap();
        let advanced = cursor
            .set_last_run("job", later - Duration::hours(1))
            .await
            .unwrap();

        assert!(!advanced);
        assert_eq!(cursor.get_last_run("job").await.unwrap(), later);
    }

    #[tokio::test]
    async fn test_cursors_are_per_job() {
        let (_, cursor) = cursor();
        let at = default_start() + Duration::days(1);

        cursor.set_last_run("a", at).await.unwrap();
        assert_eq!(cursor.get_last_run("b").await.unwrap(), default_start());
    }

    #[tokio::test]
    async fn test_corrupt_cursor_is_an_error() {
        let (store, cursor) = cursor();
        store.save("job", "yesterday").await.unwrap();

        let err = cursor.get_last_run("job").await.unwrap_err();
        assert!(matches!(err, SyncError::Cursor(_)));
    }
}
