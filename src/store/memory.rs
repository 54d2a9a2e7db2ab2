use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::SyncResult;
use crate::sync::CursorStore;

/// Process-local cursor store. Cursors are lost on restart, so every job
/// starts again from the default start date.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, job: &str) -> SyncResult<Option<String>> {
        Ok(self.values.read().await.get(job).cloned())
    }

    async fn save(&self, job: &str, value: &str) -> SyncResult<()> {
        self.values
            .write()
            .await
            .insert(job.to_string(), value.to_string());
        Ok(())
    }
}
