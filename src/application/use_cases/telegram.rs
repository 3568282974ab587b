use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{AuditRepo, user::generate_token};
use crate::domain::entities::audit::{AuditAction, AuditEntry};
use crate::domain::entities::telegram::{TelegramAccount, TelegramLinkToken};

pub const LINK_TOKEN_TTL_MINUTES: i64 = 10;

#[async_trait]
pub trait TelegramRepo: Send + Sync {
    async fn create_link_token(&self, token: &TelegramLinkToken) -> AppResult<()>;
    async fn get_link_token(&self, token: &str) -> AppResult<Option<TelegramLinkToken>>;
    async fn mark_token_used(&self, token: &str, at: DateTime<Utc>) -> AppResult<()>;
    async fn upsert_account(
        &self,
        user_id: Uuid,
        chat_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<TelegramAccount>;
    async fn get_account_for_user(&self, user_id: Uuid) -> AppResult<Option<TelegramAccount>>;
    async fn deactivate_account(&self, user_id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTokenIssued {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub deep_link: String,
}

#[derive(Clone)]
pub struct TelegramUseCases {
    repo: Arc<dyn TelegramRepo>,
    audit: Arc<dyn AuditRepo>,
    bot_name: Option<String>,
    app_origin: String,
}

impl TelegramUseCases {
    pub fn new(
        repo: Arc<dyn TelegramRepo>,
        audit: Arc<dyn AuditRepo>,
        bot_name: Option<String>,
        app_origin: String,
    ) -> Self {
        Self {
            repo,
            audit,
            bot_name,
            app_origin,
        }
    }

    fn deep_link(&self, token: &str) -> String {
        match &self.bot_name {
            Some(bot) => format!("https://t.me/{bot}?start={token}"),
            None => format!(
                "{}/telegram/link?token={token}",
                self.app_origin.trim_end_matches('/')
            ),
        }
    }

    #[instrument(skip(self))]
    pub async fn create_link_token(&self, user_id: Uuid) -> AppResult<LinkTokenIssued> {
        let now = Utc::now();
        let token = TelegramLinkToken {
            id: Uuid::new_v4(),
            user_id,
            token: generate_token(),
            expires_at: now + Duration::minutes(LINK_TOKEN_TTL_MINUTES),
            used_at: None,
            created_at: now,
        };
        self.repo.create_link_token(&token).await?;
        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::TelegramLinkCreated)
                    .entity("telegram_link_token", token.id),
            )
            .await?;

        Ok(LinkTokenIssued {
            deep_link: self.deep_link(&token.token),
            token: token.token,
            expires_at: token.expires_at,
        })
    }

    /// Consume a one-time token from the deep link and attach the chat.
    #[instrument(skip(self, raw_token))]
    pub async fn complete_link(&self, raw_token: &str, chat_id: i64) -> AppResult<TelegramAccount> {
        if chat_id <= 0 {
            return Err(AppError::InvalidInput("Invalid Telegram chat id".into()));
        }
        let now = Utc::now();
        let token = self
            .repo
            .get_link_token(raw_token)
            .await?
            .filter(|t| t.used_at.is_none() && t.expires_at > now)
            .ok_or_else(|| AppError::InvalidInput("Invalid or expired link token".into()))?;

        self.repo.mark_token_used(raw_token, now).await?;
        let account = self.repo.upsert_account(token.user_id, chat_id, now).await?;
        self.audit
            .record(
                &AuditEntry::new(token.user_id, AuditAction::TelegramLinkCompleted)
                    .entity("telegram_account", account.id),
            )
            .await?;
        Ok(account)
    }

    #[instrument(skip(self))]
    pub async fn unlink(&self, user_id: Uuid) -> AppResult<()> {
        self.repo.deactivate_account(user_id).await
    }

    pub async fn linked_account(&self, user_id: Uuid) -> AppResult<Option<TelegramAccount>> {
        Ok(self
            .repo
            .get_account_for_user(user_id)
            .await?
            .filter(|account| account.is_active))
    }
}
