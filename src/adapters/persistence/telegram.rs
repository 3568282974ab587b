use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppResult,
    domain::entities::telegram::{TelegramAccount, TelegramLinkToken},
    use_cases::telegram::TelegramRepo,
};

const ACCOUNT_COLUMNS: &str = "id, user_id, telegram_chat_id, linked_at, is_active";

#[async_trait]
impl TelegramRepo for PostgresPersistence {
    async fn create_link_token(&self, token: &TelegramLinkToken) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO telegram_link_tokens (id, user_id, token, expires_at, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_link_token(&self, token: &str) -> AppResult<Option<TelegramLinkToken>> {
        let rec = sqlx::query_as::<_, TelegramLinkToken>(
            r#"SELECT id, user_id, token, expires_at, used_at, created_at
               FROM telegram_link_tokens
               WHERE token = $1"#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn mark_token_used(&self, token: &str, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE telegram_link_tokens SET used_at = $2 WHERE token = $1 AND used_at IS NULL",
        )
        .bind(token)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_account(
        &self,
        user_id: Uuid,
        chat_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<TelegramAccount> {
        let rec = sqlx::query_as::<_, TelegramAccount>(&format!(
            r#"INSERT INTO telegram_accounts (id, user_id, telegram_chat_id, linked_at, is_active)
               VALUES ($1, $2, $3, $4, TRUE)
               ON CONFLICT (user_id) DO UPDATE
               SET telegram_chat_id = EXCLUDED.telegram_chat_id,
                   linked_at = EXCLUDED.linked_at,
                   is_active = TRUE
               RETURNING {ACCOUNT_COLUMNS}"#,
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(chat_id)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn get_account_for_user(&self, user_id: Uuid) -> AppResult<Option<TelegramAccount>> {
        let rec = sqlx::query_as::<_, TelegramAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM telegram_accounts WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn deactivate_account(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE telegram_accounts SET is_active = FALSE WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
