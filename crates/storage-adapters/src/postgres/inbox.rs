use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{DomainError, Notification, NotificationRepo, Result};
use sqlx::FromRow;
use uuid::Uuid;

use super::{parse_enum, DbResultExt, PgStore};

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    message: String,
    link: Option<String>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind: parse_enum("kind", row.kind)?,
            title: row.title,
            message: row.message,
            link: row.link,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn push(&self, n: &Notification) -> Result<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, link, read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.link)
        .bind(n.read)
        .bind(n.created_at)
        .execute(&self.pool)
        .await
        .db()?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            "SELECT id, user_id, kind, title, message, link, read, created_at \
             FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .db()?;
        rows.into_iter().map(Notification::try_from).collect()
    }
}
