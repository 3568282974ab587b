use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::AuditRepo;
use crate::domain::entities::audit::{AuditAction, AuditEntry};
use crate::domain::entities::settings::UserSettings;
use crate::domain::entities::user::User;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Uuid>;
    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;
    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>>;
    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn get_valid_magic_link(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>>;
    async fn consume_magic_link(&self, token_hash: &str) -> AppResult<()>;
    async fn get_settings(&self, user_id: Uuid) -> AppResult<Option<UserSettings>>;
    async fn update_settings(&self, user_id: Uuid, settings: &UserSettings) -> AppResult<UserSettings>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct AuthUseCases {
    repo: Arc<dyn UserRepo>,
    email: Arc<dyn EmailSender>,
    audit: Arc<dyn AuditRepo>,
    app_origin: String,
}

impl AuthUseCases {
    pub fn new(
        repo: Arc<dyn UserRepo>,
        email: Arc<dyn EmailSender>,
        audit: Arc<dyn AuditRepo>,
        app_origin: String,
    ) -> Self {
        Self {
            repo,
            email,
            audit,
            app_origin,
        }
    }

    #[instrument(skip(self))]
    pub async fn request_magic_link(&self, email: &str, ttl_minutes: i64) -> AppResult<()> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }

        let user_id = self.repo.find_or_create_by_email(&email).await?;
        let raw = generate_token();
        let token_hash = hash_token(&raw);
        let expires_at = Utc::now() + chrono::Duration::minutes(ttl_minutes);
        self.repo
            .create_magic_link(user_id, &token_hash, expires_at)
            .await?;
        let link = format!("{}/magic?token={}", self.app_origin, raw);
        self.email
            .send(
                &email,
                "Your login link",
                &format!("<a href=\"{}\">Sign in</a>", link),
            )
            .await
    }

    #[instrument(skip(self, raw_token))]
    pub async fn consume_magic_link(&self, raw_token: &str) -> AppResult<Option<Uuid>> {
        let token_hash = hash_token(raw_token);
        let now = Utc::now();
        if let Some(user_id) = self.repo.get_valid_magic_link(&token_hash, now).await? {
            self.repo.consume_magic_link(&token_hash).await?;
            self.audit
                .record(&AuditEntry::new(user_id, AuditAction::Login))
                .await?;
            return Ok(Some(user_id));
        }
        Ok(None)
    }

    pub async fn profile(&self, user_id: Uuid) -> AppResult<User> {
        self.repo.get_by_id(user_id).await?.ok_or(AppError::NotFound)
    }

    pub async fn settings(&self, user_id: Uuid) -> AppResult<UserSettings> {
        self.repo
            .get_settings(user_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    #[instrument(skip(self))]
    pub async fn update_settings(
        &self,
        user_id: Uuid,
        settings: UserSettings,
    ) -> AppResult<UserSettings> {
        if settings.reminder_days_before < 0 {
            return Err(AppError::InvalidInput(
                "reminderDaysBefore must be zero or greater".into(),
            ));
        }
        if settings.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(AppError::InvalidInput(format!(
                "Unknown timezone: {}",
                settings.timezone
            )));
        }
        self.repo.update_settings(user_id, &settings).await
    }
}

pub(crate) fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
