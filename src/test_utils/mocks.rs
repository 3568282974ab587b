use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        audit::AuditEntry,
        notification::{Notification, NotificationChannel, NotificationStatus},
        settings::UserSettings,
        subscription::Subscription,
        telegram::{TelegramAccount, TelegramLinkToken},
        user::User,
    },
    infra::rate_limit::RateLimiterTrait,
    use_cases::{
        AuditRepo,
        reminders::{ReminderCandidate, ReminderNotifier, ReminderRepo},
        subscriptions::SubscriptionRepo,
        telegram::TelegramRepo,
        user::{EmailSender, UserRepo},
    },
};

// ============================================================================
// Users
// ============================================================================

struct MagicLinkRow {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    consumed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryUserRepo {
    users: Mutex<HashMap<Uuid, User>>,
    magic_links: Mutex<HashMap<String, MagicLinkRow>>,
}

impl InMemoryUserRepo {
    pub fn seed_user(&self, email: &str) -> Uuid {
        let now = Utc::now();
        let settings = UserSettings::default();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            locale: settings.locale,
            timezone: settings.timezone,
            default_currency: settings.default_currency,
            reminder_days_before: settings.reminder_days_before,
            created_at: now,
            updated_at: now,
        };
        let id = user.id;
        self.users.lock().unwrap().insert(id, user);
        id
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Uuid> {
        if let Some(user) = self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.email == email)
        {
            return Ok(user.id);
        }
        Ok(self.seed_user(email))
    }

    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|user| user.email.clone()))
    }

    async fn create_magic_link(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.magic_links.lock().unwrap().insert(
            token_hash.to_string(),
            MagicLinkRow {
                user_id,
                expires_at,
                consumed_at: None,
            },
        );
        Ok(())
    }

    async fn get_valid_magic_link(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>> {
        Ok(self
            .magic_links
            .lock()
            .unwrap()
            .get(token_hash)
            .filter(|row| row.consumed_at.is_none() && row.expires_at > now)
            .map(|row| row.user_id))
    }

    async fn consume_magic_link(&self, token_hash: &str) -> AppResult<()> {
        if let Some(row) = self.magic_links.lock().unwrap().get_mut(token_hash) {
            row.consumed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn get_settings(&self, user_id: Uuid) -> AppResult<Option<UserSettings>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|user| user.settings()))
    }

    async fn update_settings(
        &self,
        user_id: Uuid,
        settings: &UserSettings,
    ) -> AppResult<UserSettings> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.reminder_days_before = settings.reminder_days_before;
        user.default_currency = settings.default_currency;
        user.locale = settings.locale.clone();
        user.timezone = settings.timezone.clone();
        user.updated_at = Utc::now();
        Ok(user.settings())
    }
}

// ============================================================================
// Email / notifier doubles
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderNotifier for RecordingNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Always fails, for delivery-error paths.
pub struct FailingNotifier;

#[async_trait]
impl ReminderNotifier for FailingNotifier {
    async fn send(&self, _chat_id: i64, _text: &str) -> AppResult<()> {
        Err(AppError::Internal("telegram unreachable".into()))
    }
}

// ============================================================================
// Audit
// ============================================================================

#[derive(Default)]
pub struct InMemoryAuditRepo {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditRepo {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditRepo for InMemoryAuditRepo {
    async fn record(&self, entry: &AuditEntry) -> AppResult<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    subs: Mutex<HashMap<Uuid, Subscription>>,
}

fn matches_query(sub: &Subscription, q: &str) -> bool {
    let needle = q.trim().to_lowercase();
    let haystacks = [
        Some(sub.name.as_str()),
        sub.vendor.as_deref(),
        sub.category.as_deref(),
    ];
    haystacks
        .into_iter()
        .flatten()
        .any(|hay| hay.to_lowercase().contains(&needle))
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn list_for_user(&self, user_id: Uuid, q: Option<&str>) -> AppResult<Vec<Subscription>> {
        Ok(self
            .subs
            .lock()
            .unwrap()
            .values()
            .filter(|sub| sub.user_id == user_id)
            .filter(|sub| q.is_none_or(|q| matches_query(sub, q)))
            .cloned()
            .collect())
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self
            .subs
            .lock()
            .unwrap()
            .get(&id)
            .filter(|sub| sub.user_id == user_id)
            .cloned())
    }

    async fn insert(&self, sub: &Subscription) -> AppResult<Subscription> {
        self.subs.lock().unwrap().insert(sub.id, sub.clone());
        Ok(sub.clone())
    }

    async fn update(&self, sub: &Subscription) -> AppResult<Subscription> {
        let mut subs = self.subs.lock().unwrap();
        match subs.get(&sub.id) {
            Some(existing) if existing.user_id == sub.user_id => {
                subs.insert(sub.id, sub.clone());
                Ok(sub.clone())
            }
            _ => Err(AppError::NotFound),
        }
    }

    async fn upsert(&self, sub: &Subscription) -> AppResult<Subscription> {
        let mut subs = self.subs.lock().unwrap();
        if let Some(existing) = subs.get(&sub.id) {
            if existing.user_id != sub.user_id {
                return Err(AppError::InvalidInput("Conflicting subscription id".into()));
            }
        }
        subs.insert(sub.id, sub.clone());
        Ok(sub.clone())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<bool> {
        let mut subs = self.subs.lock().unwrap();
        match subs.get(&id) {
            Some(existing) if existing.user_id == user_id => {
                subs.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Telegram
// ============================================================================

#[derive(Default)]
pub struct InMemoryTelegramRepo {
    tokens: Mutex<HashMap<String, TelegramLinkToken>>,
    accounts: Mutex<HashMap<Uuid, TelegramAccount>>,
}

impl InMemoryTelegramRepo {
    /// Force a stored token into the past.
    pub fn expire_token(&self, token: &str) {
        if let Some(row) = self.tokens.lock().unwrap().get_mut(token) {
            row.expires_at = Utc::now() - Duration::minutes(1);
        }
    }
}

#[async_trait]
impl TelegramRepo for InMemoryTelegramRepo {
    async fn create_link_token(&self, token: &TelegramLinkToken) -> AppResult<()> {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn get_link_token(&self, token: &str) -> AppResult<Option<TelegramLinkToken>> {
        Ok(self.tokens.lock().unwrap().get(token).cloned())
    }

    async fn mark_token_used(&self, token: &str, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(row) = self.tokens.lock().unwrap().get_mut(token) {
            row.used_at = Some(at);
        }
        Ok(())
    }

    async fn upsert_account(
        &self,
        user_id: Uuid,
        chat_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<TelegramAccount> {
        let account = TelegramAccount {
            id: Uuid::new_v4(),
            user_id,
            telegram_chat_id: chat_id,
            linked_at: at,
            is_active: true,
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(user_id, account.clone());
        Ok(account)
    }

    async fn get_account_for_user(&self, user_id: Uuid) -> AppResult<Option<TelegramAccount>> {
        Ok(self.accounts.lock().unwrap().get(&user_id).cloned())
    }

    async fn deactivate_account(&self, user_id: Uuid) -> AppResult<()> {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(&user_id) {
            account.is_active = false;
        }
        Ok(())
    }
}

// ============================================================================
// Reminders
// ============================================================================

#[derive(Default)]
pub struct InMemoryReminderRepo {
    candidates: Mutex<Vec<ReminderCandidate>>,
    notifications: Mutex<Vec<Notification>>,
    notified: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl InMemoryReminderRepo {
    pub fn seed_candidate(&self, candidate: ReminderCandidate) {
        self.candidates.lock().unwrap().push(candidate);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderRepo for InMemoryReminderRepo {
    async fn list_candidates(&self) -> AppResult<Vec<ReminderCandidate>> {
        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn record_notification(&self, notification: &Notification) -> AppResult<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn last_sent_at(
        &self,
        subscription_id: Uuid,
        channel: NotificationChannel,
    ) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| {
                n.subscription_id == Some(subscription_id)
                    && n.channel == channel
                    && n.status == NotificationStatus::Sent
            })
            .filter_map(|n| n.sent_at)
            .max())
    }

    async fn mark_notified(&self, subscription_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        self.notified.lock().unwrap().insert(subscription_id, at);
        Ok(())
    }
}

// ============================================================================
// Rate limiting
// ============================================================================

/// No-op limiter for tests.
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiterTrait for NoopRateLimiter {
    async fn check(&self, _ip: &str, _email: Option<&str>) -> AppResult<()> {
        Ok(())
    }
}
