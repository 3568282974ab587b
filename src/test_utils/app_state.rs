//! Builder producing an `AppState` wired to in-memory mocks, for HTTP-level
//! tests that drive the real routers without Postgres or Redis.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    infra::config::AppConfig,
    test_utils::{
        InMemoryAuditRepo, InMemoryReminderRepo, InMemorySubscriptionRepo, InMemoryTelegramRepo,
        InMemoryUserRepo, NoopRateLimiter, RecordingEmailSender, RecordingNotifier,
    },
    use_cases::{
        reminders::ReminderUseCases, subscriptions::SubscriptionUseCases,
        telegram::TelegramUseCases, user::AuthUseCases,
    },
};

fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        redis_url: "redis://unused".to_string(),
        jwt_secret: SecretString::new("test-jwt-secret".to_string().into()),
        access_token_ttl: Duration::hours(1),
        refresh_token_ttl: Duration::days(30),
        app_origin: "https://app.example.com".parse().unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:5173"),
        magic_link_ttl_minutes: 15,
        resend_api_key: SecretString::new("re_test".to_string().into()),
        email_from: "noreply@example.com".to_string(),
        telegram_bot_token: None,
        telegram_bot_name: Some("subtrack_bot".to_string()),
        reminder_poll_seconds: 3600,
        notification_cooldown_hours: 24,
        rate_limit_window_secs: 60,
        rate_limit_per_ip: 60,
        rate_limit_per_email: 30,
    }
}

pub struct TestAppStateBuilder {
    user_emails: Vec<String>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            user_emails: Vec::new(),
        }
    }

    pub fn with_user(mut self, email: &str) -> Self {
        self.user_emails.push(email.to_string());
        self
    }

    /// Build the state; returns the id of the first seeded user (a fresh one
    /// is seeded when none was requested) for issuing auth tokens.
    pub fn build(self) -> (AppState, Uuid) {
        let users = Arc::new(InMemoryUserRepo::default());
        let mut first_user = None;
        for email in &self.user_emails {
            let id = users.seed_user(email);
            first_user.get_or_insert(id);
        }
        let first_user = first_user.unwrap_or_else(|| users.seed_user("user@example.com"));

        let subscriptions = Arc::new(InMemorySubscriptionRepo::default());
        let telegram = Arc::new(InMemoryTelegramRepo::default());
        let reminders = Arc::new(InMemoryReminderRepo::default());
        let audit = Arc::new(InMemoryAuditRepo::default());
        let email = Arc::new(RecordingEmailSender::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let config = Arc::new(test_config());

        let auth_use_cases = AuthUseCases::new(
            users.clone(),
            email.clone(),
            audit.clone(),
            config.app_origin.to_string(),
        );
        let subscription_use_cases =
            SubscriptionUseCases::new(subscriptions, users.clone(), audit.clone());
        let telegram_use_cases = TelegramUseCases::new(
            telegram.clone(),
            audit.clone(),
            config.telegram_bot_name.clone(),
            config.app_origin.to_string(),
        );
        let reminder_use_cases = ReminderUseCases::new(
            reminders,
            notifier,
            email,
            users,
            telegram,
            audit,
            config.notification_cooldown_hours,
        );

        let app_state = AppState {
            config,
            auth_use_cases: Arc::new(auth_use_cases),
            subscription_use_cases: Arc::new(subscription_use_cases),
            telegram_use_cases: Arc::new(telegram_use_cases),
            reminder_use_cases: Arc::new(reminder_use_cases),
            rate_limiter: Arc::new(NoopRateLimiter),
        };

        (app_state, first_user)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
