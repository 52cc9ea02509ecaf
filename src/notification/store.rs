//! Notification store collaborator used by the catch-up replayer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use uuid::Uuid;

use crate::config::DatabaseConfig;

use super::{Notification, Category, Priority, Status};

/// Errors surfaced by the notification store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid row: {0}")]
    Decode(String),
}

/// Read access to persisted notifications.
///
/// The hub only ever lists notifications created since a given instant; all
/// other persistence concerns belong to the upstream service owning the table.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// List notifications for (subscriber, tenant) created after `since`, in
    /// ascending creation order, capped at `limit` rows.
    async fn list_since(
        &self,
        subscriber_id: Uuid,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError>;
}

/// PostgreSQL-backed notification store.
pub struct PgNotificationStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    tenant_id: Uuid,
    subscriber_id: Uuid,
    category: String,
    priority: String,
    title: String,
    summary: String,
    full_analysis: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            tenant_id: row.tenant_id,
            subscriber_id: row.subscriber_id,
            category: row.category.parse::<Category>().map_err(StoreError::Decode)?,
            priority: row.priority.parse::<Priority>().map_err(StoreError::Decode)?,
            title: row.title,
            summary: row.summary,
            full_analysis: row.full_analysis,
            status: row.status.parse::<Status>().map_err(StoreError::Decode)?,
            created_at: row.created_at,
        })
    }
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a bounded pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await?;

        tracing::info!(pool_size = config.pool_size, "PostgreSQL connection pool created");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn list_since(
        &self,
        subscriber_id: Uuid,
        tenant_id: Uuid,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, tenant_id, subscriber_id, category, priority,
                   title, summary, full_analysis, status, created_at
            FROM notifications
            WHERE subscriber_id = $1 AND tenant_id = $2 AND created_at > $3
            ORDER BY created_at ASC
            LIMIT $4
            "#,
        )
        .bind(subscriber_id)
        .bind(tenant_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }
}
