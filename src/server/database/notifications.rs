use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use super::{query_failed, Database, Page};
use crate::errors::StaffroomResult;
use crate::notification::NotificationKind;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub reference_id: Option<String>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}

impl Notification {
    pub fn kind(&self) -> StaffroomResult<NotificationKind> {
        self.kind.parse()
    }
}

impl Database {
    pub async fn insert_notification(&self, notification: &Notification) -> StaffroomResult<()> {
        with_pool!(self, pool => {
            sqlx::query(
                "INSERT INTO notifications
                    (id, recipient_id, kind, title, body, reference_id, is_read, created_at, read_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&notification.id)
            .bind(&notification.recipient_id)
            .bind(&notification.kind)
            .bind(&notification.title)
            .bind(&notification.body)
            .bind(&notification.reference_id)
            .bind(notification.is_read)
            .bind(notification.created_at)
            .bind(notification.read_at)
            .execute(pool)
            .await
            .map_err(query_failed("insert_notification"))?;
        });
        Ok(())
    }

    pub async fn get_notification(&self, id: &str) -> StaffroomResult<Option<Notification>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_notification"))
        })
    }

    /// Newest first.
    pub async fn list_notifications(
        &self,
        recipient_id: &str,
        unread_only: bool,
        page: Page,
    ) -> StaffroomResult<(Vec<Notification>, i64)> {
        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, Notification>(
                "SELECT * FROM notifications
                 WHERE recipient_id = $1 AND ($2 = FALSE OR is_read = FALSE)
                 ORDER BY created_at DESC, id
                 LIMIT $3 OFFSET $4",
            )
            .bind(recipient_id)
            .bind(unread_only)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_notifications"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM notifications
                 WHERE recipient_id = $1 AND ($2 = FALSE OR is_read = FALSE)",
            )
            .bind(recipient_id)
            .bind(unread_only)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_notifications"))?;

            Ok((items, total))
        })
    }

    pub async fn count_unread_notifications(&self, recipient_id: &str) -> StaffroomResult<i64> {
        with_pool!(self, pool => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
            )
            .bind(recipient_id)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_unread_notifications"))
        })
    }

    /// Mark one notification read. Already-read rows keep their original `read_at`.
    pub async fn mark_notification_read(
        &self,
        id: &str,
        at: NaiveDateTime,
    ) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query(
                "UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE id = $1 AND is_read = FALSE",
            )
            .bind(id)
            .bind(at)
            .execute(pool)
            .await
            .map_err(query_failed("mark_notification_read"))?
            .rows_affected()
        });
        Ok(result > 0)
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_notifications_read(
        &self,
        recipient_id: &str,
        at: NaiveDateTime,
    ) -> StaffroomResult<u64> {
        let result = with_pool!(self, pool => {
            sqlx::query(
                "UPDATE notifications SET is_read = TRUE, read_at = $2
                 WHERE recipient_id = $1 AND is_read = FALSE",
            )
            .bind(recipient_id)
            .bind(at)
            .execute(pool)
            .await
            .map_err(query_failed("mark_all_notifications_read"))?
            .rows_affected()
        });
        Ok(result)
    }

    pub async fn delete_notification(&self, id: &str) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query("DELETE FROM notifications WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(query_failed("delete_notification"))?
                .rows_affected()
        });
        Ok(result > 0)
    }

    /// Delete read notifications created before `before`.
    pub async fn purge_read_notifications(&self, before: NaiveDateTime) -> StaffroomResult<u64> {
        let result = with_pool!(self, pool => {
            sqlx::query("DELETE FROM notifications WHERE is_read = TRUE AND created_at < $1")
                .bind(before)
                .execute(pool)
                .await
                .map_err(query_failed("purge_read_notifications"))?
                .rows_affected()
        });
        Ok(result)
    }
}
