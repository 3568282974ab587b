use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TelegramAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub telegram_chat_id: i64,
    pub linked_at: DateTime<Utc>,
    pub is_active: bool,
}

/// One-time token handed to the Telegram deep link.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TelegramLinkToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
