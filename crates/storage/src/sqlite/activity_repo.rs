use sprite_core::model::{ActivityEvent, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_event_row, ser};
use crate::repository::{ActivityRepository, StorageError};

#[async_trait::async_trait]
impl ActivityRepository for SqliteRepository {
    async fn events_for_user(&self, user_id: UserId) -> Result<Vec<ActivityEvent>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, event_type, points_delta, quiz_id, attempt_id,
                       lesson_id, achievement_id, created_at
                FROM activity_events
                WHERE user_id = ?1
                ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_event_row(&row)?);
        }
        Ok(out)
    }

    async fn total_points(&self, user_id: UserId) -> Result<i64, StorageError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(points_delta), 0) AS points FROM activity_events WHERE user_id = ?1",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        row.try_get::<i64, _>("points").map_err(ser)
    }
}
