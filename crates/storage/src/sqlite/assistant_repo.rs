use sprite_core::model::{Assistant, AssistantId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{assistant_id_from_i64, db_err, id_i64, ser};
use crate::repository::{AssistantRepository, StorageError};

fn assistant_from_row(row: &SqliteRow) -> Result<Assistant, StorageError> {
    Assistant::new(
        assistant_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<String>, _>("avatar_url").map_err(ser)?,
        row.try_get::<Option<String>, _>("tagline").map_err(ser)?,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl AssistantRepository for SqliteRepository {
    async fn upsert_assistant(&self, assistant: &Assistant) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO assistants (id, name, avatar_url, tagline)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                avatar_url = excluded.avatar_url,
                tagline = excluded.tagline
            ",
        )
        .bind(id_i64("assistant_id", assistant.id().value())?)
        .bind(assistant.name())
        .bind(assistant.avatar_url())
        .bind(assistant.tagline())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_assistant(&self, id: AssistantId) -> Result<Option<Assistant>, StorageError> {
        let row = sqlx::query("SELECT id, name, avatar_url, tagline FROM assistants WHERE id = ?1")
            .bind(id_i64("assistant_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => assistant_from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_assistants(&self) -> Result<Vec<Assistant>, StorageError> {
        let rows = sqlx::query("SELECT id, name, avatar_url, tagline FROM assistants ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut assistants = Vec::with_capacity(rows.len());
        for row in rows {
            assistants.push(assistant_from_row(&row)?);
        }
        Ok(assistants)
    }
}
