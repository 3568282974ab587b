use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::{settings::UserSettings, user::User},
    use_cases::user::UserRepo,
};

const USER_COLUMNS: &str =
    "id, email, locale, timezone, default_currency, reminder_days_before, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "reminder_days_before, default_currency, locale, timezone";

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Uuid> {
        // Try find
        if let Some(id) = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(id);
        }
        // Insert; settings columns come from the table defaults.
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
            .bind(id)
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let rec = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let rec = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rec)
    }

    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO magic_links (token_hash, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_valid_magic_link(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>> {
        let rec = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT user_id FROM magic_links
               WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > $2"#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn consume_magic_link(&self, token_hash: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE magic_links SET consumed_at = $2 WHERE token_hash = $1 AND consumed_at IS NULL",
        )
        .bind(token_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_settings(&self, user_id: Uuid) -> AppResult<Option<UserSettings>> {
        let rec = sqlx::query_as::<_, UserSettings>(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn update_settings(
        &self,
        user_id: Uuid,
        settings: &UserSettings,
    ) -> AppResult<UserSettings> {
        let rec = sqlx::query_as::<_, UserSettings>(&format!(
            r#"UPDATE users
               SET reminder_days_before = $2,
                   default_currency = $3,
                   locale = $4,
                   timezone = $5,
                   updated_at = now()
               WHERE id = $1
               RETURNING {SETTINGS_COLUMNS}"#,
        ))
        .bind(user_id)
        .bind(settings.reminder_days_before)
        .bind(settings.default_currency)
        .bind(&settings.locale)
        .bind(&settings.timezone)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound)?;

        Ok(rec)
    }
}
