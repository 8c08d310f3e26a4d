use sprite_core::model::{UserId, UserOnboardingState};
use sqlx::SqliteConnection;

use super::SqliteRepository;
use super::mapping::{db_err, id_i64, map_onboarding_row, user_id_from_i64};
use crate::repository::{NewUserRecord, StorageError, UserRepository};

/// Write every onboarding column of one user; shared with the attempt transaction.
pub(crate) async fn write_onboarding(
    conn: &mut SqliteConnection,
    id: UserId,
    state: &UserOnboardingState,
) -> Result<(), StorageError> {
    let assistant_id = state
        .assistant_id()
        .map(|a| id_i64("assistant_id", a.value()))
        .transpose()?;

    let res = sqlx::query(
        r"
            UPDATE users SET
                assistant_id = ?2,
                assistant_persona = ?3,
                skill_level = ?4,
                onboarding_step = ?5,
                onboarding_completed_at = ?6
            WHERE id = ?1
        ",
    )
    .bind(id_i64("user_id", id.value())?)
    .bind(assistant_id)
    .bind(state.assistant_persona().map(|p| p.as_str()))
    .bind(state.skill_level().as_str())
    .bind(state.onboarding_step().map(|s| s.as_str()))
    .bind(state.onboarding_completed_at())
    .execute(conn)
    .await
    .map_err(db_err)?;

    if res.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO users (display_name, created_at, skill_level)
                VALUES (?1, ?2, 'beginner')
            ",
        )
        .bind(user.display_name)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        user_id_from_i64(res.last_insert_rowid())
    }

    async fn get_onboarding(
        &self,
        id: UserId,
    ) -> Result<Option<UserOnboardingState>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT assistant_id, assistant_persona, skill_level,
                       onboarding_step, onboarding_completed_at
                FROM users
                WHERE id = ?1
            ",
        )
        .bind(id_i64("user_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_onboarding_row).transpose()
    }

    async fn save_onboarding(
        &self,
        id: UserId,
        state: &UserOnboardingState,
    ) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        write_onboarding(&mut conn, id, state).await
    }
}
