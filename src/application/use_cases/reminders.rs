use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::status::{days_until, should_show_in_reminders};
use crate::application::use_cases::{
    AuditRepo,
    telegram::TelegramRepo,
    user::{EmailSender, UserRepo},
};
use crate::domain::entities::audit::{AuditAction, AuditEntry};
use crate::domain::entities::notification::{
    Notification, NotificationChannel, NotificationStatus,
};
use crate::domain::entities::settings::UserSettings;
use crate::domain::entities::subscription::Subscription;

/// A subscription of a user with an active Telegram link, paired with what
/// dispatch needs to evaluate and deliver it.
#[derive(Debug, Clone)]
pub struct ReminderCandidate {
    pub subscription: Subscription,
    pub settings: UserSettings,
    pub chat_id: i64,
}

#[async_trait]
pub trait ReminderRepo: Send + Sync {
    async fn list_candidates(&self) -> AppResult<Vec<ReminderCandidate>>;
    async fn record_notification(&self, notification: &Notification) -> AppResult<()>;
    async fn last_sent_at(
        &self,
        subscription_id: Uuid,
        channel: NotificationChannel,
    ) -> AppResult<Option<DateTime<Utc>>>;
    async fn mark_notified(&self, subscription_id: Uuid, at: DateTime<Utc>) -> AppResult<()>;
}

#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> AppResult<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNotificationRequest {
    pub channel: NotificationChannel,
    #[serde(default)]
    pub subscription_id: Option<Uuid>,
    pub message: String,
}

#[derive(Clone)]
pub struct ReminderUseCases {
    repo: Arc<dyn ReminderRepo>,
    notifier: Arc<dyn ReminderNotifier>,
    email: Arc<dyn EmailSender>,
    users: Arc<dyn UserRepo>,
    telegram: Arc<dyn TelegramRepo>,
    audit: Arc<dyn AuditRepo>,
    cooldown: Duration,
}

impl ReminderUseCases {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn ReminderRepo>,
        notifier: Arc<dyn ReminderNotifier>,
        email: Arc<dyn EmailSender>,
        users: Arc<dyn UserRepo>,
        telegram: Arc<dyn TelegramRepo>,
        audit: Arc<dyn AuditRepo>,
        cooldown_hours: i64,
    ) -> Self {
        Self {
            repo,
            notifier,
            email,
            users,
            telegram,
            audit,
            cooldown: Duration::hours(cooldown_hours),
        }
    }

    /// One dispatch tick: re-evaluate eligibility for every candidate, skip
    /// anything notified within the cooldown window, deliver the rest.
    /// Returns the number of reminders sent; delivery failures are recorded
    /// and never abort the tick.
    #[instrument(skip(self))]
    pub async fn dispatch_due(&self) -> AppResult<usize> {
        let now = Utc::now();
        let mut sent = 0usize;

        for candidate in self.repo.list_candidates().await? {
            let sub = &candidate.subscription;
            if !should_show_in_reminders(sub, &candidate.settings, now) {
                continue;
            }
            if let Some(last) = self
                .repo
                .last_sent_at(sub.id, NotificationChannel::Telegram)
                .await?
            {
                if last > now - self.cooldown {
                    continue;
                }
            }

            let text = format_reminder(sub, &candidate.settings, now);
            match self.notifier.send(candidate.chat_id, &text).await {
                Ok(()) => {
                    self.repo
                        .record_notification(&notification(sub.id, NotificationChannel::Telegram, now, None))
                        .await?;
                    self.repo.mark_notified(sub.id, now).await?;
                    sent += 1;
                }
                Err(err) => {
                    tracing::error!(
                        subscription_id = %sub.id,
                        error = %err,
                        "reminder delivery failed"
                    );
                    self.repo
                        .record_notification(&notification(
                            sub.id,
                            NotificationChannel::Telegram,
                            now,
                            Some(err.to_string()),
                        ))
                        .await?;
                }
            }
        }

        if sent > 0 {
            tracing::info!(sent, "dispatched due reminders");
        }
        Ok(sent)
    }

    /// Manual delivery check from the settings page.
    #[instrument(skip(self, request))]
    pub async fn send_test(
        &self,
        user_id: Uuid,
        request: TestNotificationRequest,
    ) -> AppResult<Notification> {
        if request.message.trim().is_empty() {
            return Err(AppError::InvalidInput("Message must not be empty".into()));
        }
        let now = Utc::now();

        let outcome = match request.channel {
            NotificationChannel::Email => {
                let to = self
                    .users
                    .get_email_by_id(user_id)
                    .await?
                    .ok_or(AppError::InvalidCredentials)?;
                self.email
                    .send(&to, "Test notification", &request.message)
                    .await
            }
            NotificationChannel::Telegram => {
                let account = self
                    .telegram
                    .get_account_for_user(user_id)
                    .await?
                    .filter(|account| account.is_active)
                    .ok_or_else(|| {
                        AppError::InvalidInput("No linked Telegram account".into())
                    })?;
                self.notifier
                    .send(account.telegram_chat_id, &request.message)
                    .await
            }
        };

        let record = notification(
            request.subscription_id.unwrap_or_else(Uuid::nil),
            request.channel,
            now,
            outcome.as_ref().err().map(|err| err.to_string()),
        );
        let record = Notification {
            subscription_id: request.subscription_id,
            ..record
        };
        self.repo.record_notification(&record).await?;

        self.audit
            .record(
                &AuditEntry::new(user_id, AuditAction::NotificationTest)
                    .entity("notification", record.id)
                    .meta(serde_json::json!({ "channel": request.channel.as_str() })),
            )
            .await?;

        outcome?;
        Ok(record)
    }
}

fn notification(
    subscription_id: Uuid,
    channel: NotificationChannel,
    now: DateTime<Utc>,
    error: Option<String>,
) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        subscription_id: Some(subscription_id),
        channel,
        status: if error.is_none() {
            NotificationStatus::Sent
        } else {
            NotificationStatus::Failed
        },
        sent_at: Some(now),
        error,
        created_at: now,
    }
}

fn format_reminder(sub: &Subscription, settings: &UserSettings, now: DateTime<Utc>) -> String {
    let price = format!("{} {}", sub.price, sub.currency.as_str());
    let Some(end) = sub.end_at else {
        return format!("{}: {}", sub.name, price);
    };
    let tz = settings.tz();
    let date = end.with_timezone(&tz).format("%Y-%m-%d");
    match days_until(end, now, tz) {
        d if d < 0 => format!("{} ({price}) expired on {date}", sub.name),
        0 => format!("{} ({price}) renews today", sub.name),
        1 => format!("{} ({price}) renews tomorrow, {date}", sub.name),
        d => format!("{} ({price}) renews in {d} days, on {date}", sub.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use crate::domain::entities::subscription::{Currency, SubscriptionStatus};
    use crate::test_utils::{
        FailingNotifier, InMemoryAuditRepo, InMemoryReminderRepo, InMemoryTelegramRepo,
        InMemoryUserRepo, RecordingEmailSender, RecordingNotifier,
    };

    fn sub(name: &str, end_in_days: i64) -> Subscription {
        let now = Utc::now();
        Subscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            price: dec!(9.99),
            currency: Currency::Usd,
            end_at: Some(now + Duration::days(end_in_days)),
            status: SubscriptionStatus::Active,
            category: None,
            vendor: None,
            notes: None,
            next_reminder_at: None,
            last_notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn candidate(sub: Subscription) -> ReminderCandidate {
        ReminderCandidate {
            subscription: sub,
            settings: UserSettings::default(),
            chat_id: 42,
        }
    }

    struct Fixture {
        use_cases: ReminderUseCases,
        repo: Arc<InMemoryReminderRepo>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryReminderRepo::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let use_cases = ReminderUseCases::new(
            repo.clone(),
            notifier.clone(),
            Arc::new(RecordingEmailSender::default()),
            Arc::new(InMemoryUserRepo::default()),
            Arc::new(InMemoryTelegramRepo::default()),
            Arc::new(InMemoryAuditRepo::default()),
            24,
        );
        Fixture {
            use_cases,
            repo,
            notifier,
        }
    }

    #[tokio::test]
    async fn dispatches_only_eligible_candidates() {
        let f = fixture();
        f.repo.seed_candidate(candidate(sub("due", 3)));
        f.repo.seed_candidate(candidate(sub("far away", 60)));

        let mut snoozed = sub("snoozed", 2);
        snoozed.next_reminder_at = Some(Utc::now() + Duration::days(1));
        f.repo.seed_candidate(candidate(snoozed));

        let sent = f.use_cases.dispatch_due().await.unwrap();
        assert_eq!(sent, 1);

        let messages = f.notifier.sent();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].text.contains("due"));
    }

    #[tokio::test]
    async fn cooldown_suppresses_repeat_sends() {
        let f = fixture();
        f.repo.seed_candidate(candidate(sub("due", 1)));

        assert_eq!(f.use_cases.dispatch_due().await.unwrap(), 1);
        // Second tick inside the cooldown window sends nothing.
        assert_eq!(f.use_cases.dispatch_due().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delivery_failure_is_recorded_not_fatal() {
        let repo = Arc::new(InMemoryReminderRepo::default());
        let use_cases = ReminderUseCases::new(
            repo.clone(),
            Arc::new(FailingNotifier),
            Arc::new(RecordingEmailSender::default()),
            Arc::new(InMemoryUserRepo::default()),
            Arc::new(InMemoryTelegramRepo::default()),
            Arc::new(InMemoryAuditRepo::default()),
            24,
        );
        repo.seed_candidate(candidate(sub("due", 1)));

        let sent = use_cases.dispatch_due().await.unwrap();
        assert_eq!(sent, 0);

        let recorded = repo.notifications();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, NotificationStatus::Failed);
        assert!(recorded[0].error.is_some());
    }

    #[tokio::test]
    async fn overdue_message_mentions_expiry() {
        let sub = sub("Old", -3);
        let text = format_reminder(&sub, &UserSettings::default(), Utc::now());
        assert!(text.contains("expired on"), "{text}");
    }

    #[tokio::test]
    async fn due_today_message() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 10, 0, 0).unwrap();
        let mut s = sub("Netflix", 0);
        s.end_at = Some(Utc.with_ymd_and_hms(2026, 6, 15, 20, 0, 0).unwrap());
        let text = format_reminder(&s, &UserSettings::default(), now);
        assert!(text.contains("renews today"), "{text}");
    }

    #[tokio::test]
    async fn test_notification_requires_linked_telegram() {
        let f = fixture();
        let outcome = f
            .use_cases
            .send_test(
                Uuid::new_v4(),
                TestNotificationRequest {
                    channel: NotificationChannel::Telegram,
                    subscription_id: None,
                    message: "ping".to_string(),
                },
            )
            .await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn test_notification_over_email() {
        let repo = Arc::new(InMemoryReminderRepo::default());
        let users = Arc::new(InMemoryUserRepo::default());
        let email = Arc::new(RecordingEmailSender::default());
        let user_id = users.seed_user("box@example.com");

        let use_cases = ReminderUseCases::new(
            repo.clone(),
            Arc::new(RecordingNotifier::default()),
            email.clone(),
            users,
            Arc::new(InMemoryTelegramRepo::default()),
            Arc::new(InMemoryAuditRepo::default()),
            24,
        );

        let record = use_cases
            .send_test(
                user_id,
                TestNotificationRequest {
                    channel: NotificationChannel::Email,
                    subscription_id: None,
                    message: "hello".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(record.status, NotificationStatus::Sent);
        assert_eq!(email.sent().len(), 1);
        assert_eq!(repo.notifications().len(), 1);
    }
}
