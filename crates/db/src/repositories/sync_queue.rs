use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{RepositoryError, SyncQueueRepository};
use crate::DbPool;

/// Best-effort outbound sync record. Enqueue failures are the caller's to log;
/// nothing downstream retries synchronously.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSyncRecord {
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub action: String,
    pub payload: serde_json::Value,
}

pub struct SqlSyncQueueRepository {
    pool: DbPool,
}

impl SqlSyncQueueRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SyncQueueRepository for SqlSyncQueueRepository {
    async fn enqueue(&self, record: NewSyncRecord) -> Result<i64, RepositoryError> {
        let payload = serde_json::to_string(&record.payload)
            .map_err(|err| RepositoryError::Decode(format!("sync_queue.payload: {err}")))?;

        let result = sqlx::query(
            "INSERT INTO sync_queue (entity_type, entity_id, action, payload, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.action)
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::Row;

    use super::{NewSyncRecord, SqlSyncQueueRepository};
    use crate::fixtures::test_pool;
    use crate::repositories::SyncQueueRepository;

    #[tokio::test]
    async fn enqueue_writes_a_pending_record() {
        let pool = test_pool().await;
        let repo = SqlSyncQueueRepository::new(pool.clone());

        let id = repo
            .enqueue(NewSyncRecord {
                entity_type: "QUOTE_REQUEST".to_string(),
                entity_id: Some("7".to_string()),
                action: "CREATE_QUOTE_REQUEST".to_string(),
                payload: json!({ "vendorIds": [5] }),
            })
            .await
            .expect("enqueue");

        let row = sqlx::query("SELECT entity_type, status FROM sync_queue WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .expect("read back");

        assert_eq!(row.get::<String, _>("entity_type"), "QUOTE_REQUEST");
        assert_eq!(row.get::<String, _>("status"), "PENDING");
    }
}
