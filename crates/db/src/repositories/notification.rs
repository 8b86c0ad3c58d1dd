use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use lanehaul_core::domain::party::UserId;

use super::{parse_required_datetime, NotificationRepository, RepositoryError};
use crate::DbPool;

/// In-app notification row as surfaced to the owning user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub metadata: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub metadata: Option<serde_json::Value>,
}

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_notification(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<NotificationRecord, RepositoryError> {
    let decode = |err: sqlx::Error| RepositoryError::Decode(err.to_string());

    let metadata_str: Option<String> = row.try_get("metadata").map_err(decode)?;
    let metadata = metadata_str
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|err| RepositoryError::Decode(format!("notification.metadata: {err}")))
        })
        .transpose()?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;

    Ok(NotificationRecord {
        id: row.try_get("id").map_err(decode)?,
        user_id: UserId(row.try_get("user_id").map_err(decode)?),
        title: row.try_get("title").map_err(decode)?,
        message: row.try_get("message").map_err(decode)?,
        kind: row.try_get("kind").map_err(decode)?,
        metadata,
        is_read: row.try_get::<i64, _>("is_read").map_err(decode)? != 0,
        created_at: parse_required_datetime("notification.created_at", created_at_str)?,
    })
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn create(&self, notification: NewNotification) -> Result<i64, RepositoryError> {
        let metadata = notification
            .metadata
            .as_ref()
            .map(|value| serde_json::to_string(value))
            .transpose()
            .map_err(|err| RepositoryError::Decode(format!("notification.metadata: {err}")))?;

        let result = sqlx::query(
            "INSERT INTO notification (user_id, title, message, kind, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(notification.user_id.0)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.kind)
        .bind(&metadata)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<NotificationRecord>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user_id, title, message, kind, metadata, is_read, created_at
             FROM notification WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect::<Result<Vec<_>, _>>()
    }
}
